use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("YAMLパースエラー: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("ファイル読み込みエラー: {0}")]
    Io(#[from] std::io::Error),

    #[error(
        "プロジェクトルートが見つかりません\n探索開始位置: {0}\nヒント: kiln.yaml ファイルを含むディレクトリで実行してください"
    )]
    ProjectRootNotFound(PathBuf),

    #[error("無効なマニフェスト: {0}")]
    InvalidManifest(String),
}

pub type Result<T> = std::result::Result<T, ManifestError>;
