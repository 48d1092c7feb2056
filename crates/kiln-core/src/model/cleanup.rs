//! 旧イメージのクリーンアップポリシー

use serde::{Deserialize, Serialize};

/// リビルド後に置き換えられた旧イメージをどう扱うか
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CleanupMode {
    /// 旧イメージを残す
    None,
    /// 旧イメージを削除する（失敗したらビルドもエラー）
    Remove,
    /// 旧イメージの削除を試みる（失敗しても警告のみ）
    TryToRemove,
}

impl Default for CleanupMode {
    fn default() -> Self {
        Self::Remove
    }
}

impl CleanupMode {
    /// 文字列からパース
    ///
    /// 旧来の真偽値表記（true/false）も受け付ける。
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "none" | "false" => Some(Self::None),
            "remove" | "true" => Some(Self::Remove),
            "try" | "try-to-remove" | "try_to_remove" => Some(Self::TryToRemove),
            _ => None,
        }
    }

    /// 削除を行うモードかどうか
    pub fn is_remove(&self) -> bool {
        matches!(self, Self::Remove | Self::TryToRemove)
    }

    /// 削除失敗を許容するモードかどうか
    pub fn tolerates_failure(&self) -> bool {
        matches!(self, Self::TryToRemove)
    }

    /// 設定ファイルで使用する文字列に変換
    pub fn as_config_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Remove => "remove",
            Self::TryToRemove => "try-to-remove",
        }
    }
}
