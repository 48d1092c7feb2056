//! イメージ定義

use super::cleanup::CleanupMode;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// マニフェスト (kiln.yaml) 全体
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Manifest {
    /// プロジェクト名
    pub name: Option<String>,
    /// ビルド対象イメージ（記述順にビルドされる）
    #[serde(default)]
    pub images: Vec<ImageSpec>,
}

impl Manifest {
    /// 名前でイメージ定義を検索
    pub fn image(&self, name: &str) -> Option<&ImageSpec> {
        self.images.iter().find(|i| i.name == name)
    }
}

/// イメージ定義
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImageSpec {
    /// イメージ参照（例: ghcr.io/org/app:v1.0）
    pub name: String,
    /// ログ表示用のラベル
    pub description: Option<String>,
    /// ビルド設定
    #[serde(default)]
    pub build: BuildSpec,
}

impl ImageSpec {
    /// ログ行で使用するラベル（description がなければイメージ名）
    pub fn label(&self) -> &str {
        self.description.as_deref().unwrap_or(&self.name)
    }
}

/// ビルド設定
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuildSpec {
    /// 旧イメージのクリーンアップポリシー
    #[serde(default)]
    pub cleanup: CleanupMode,
    /// ビルド引数
    #[serde(default)]
    pub args: HashMap<String, String>,
    /// Dockerfileのパス（プロジェクトルートからの相対パス）
    /// 未指定の場合はエンジンのデフォルトを使用
    pub dockerfile: Option<PathBuf>,
    /// ビルドコンテキストのパス（プロジェクトルートからの相対パス）
    /// 未指定の場合はプロジェクトルート
    pub context: Option<PathBuf>,
}

impl BuildSpec {
    /// 明示的な Dockerfile が指定されているかどうか
    pub fn has_dockerfile(&self) -> bool {
        self.dockerfile.is_some()
    }

    /// エンジンに渡す Dockerfile 名
    ///
    /// パスの末端のファイル名のみを返す。未指定なら None。
    pub fn dockerfile_name(&self) -> Option<String> {
        self.dockerfile
            .as_ref()
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
    }
}
