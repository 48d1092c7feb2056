use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("無効なイメージ参照 '{name}': {reason}")]
    InvalidReference { name: String, reason: String },

    #[error("Dockerfileが見つかりません: {0}")]
    DockerfileNotFound(PathBuf),

    #[error("ビルドコンテキストが見つかりません: {0}")]
    ContextNotFound(PathBuf),

    #[error("ビルドコンテキストがディレクトリではありません: {0}")]
    ContextNotADirectory(PathBuf),

    #[error("Dockerエンジンエラー: {0}")]
    Engine(#[from] EngineError),

    #[error("IOエラー: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, BuildError>;

/// Dockerエンジン呼び出しの失敗
///
/// ネストした原因があればメッセージとして保持する。TRY_TO_REMOVE の
/// 警告ログで原因を角括弧付きで表示するために使う。
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct EngineError {
    message: String,
    cause: Option<String>,
}

impl EngineError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            cause: None,
        }
    }

    pub fn with_cause(message: impl Into<String>, cause: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            cause: Some(cause.into()),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn cause(&self) -> Option<&str> {
        self.cause.as_deref()
    }
}

impl From<bollard::errors::Error> for EngineError {
    fn from(err: bollard::errors::Error) -> Self {
        let cause = std::error::Error::source(&err).map(|source| source.to_string());
        Self {
            message: err.to_string(),
            cause,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_error_without_cause() {
        let err = EngineError::new("busy");
        assert_eq!(err.message(), "busy");
        assert_eq!(err.cause(), None);
        assert_eq!(err.to_string(), "busy");
    }

    #[test]
    fn test_engine_error_with_cause() {
        let err = EngineError::with_cause("busy", "container X");
        assert_eq!(err.message(), "busy");
        assert_eq!(err.cause(), Some("container X"));
    }

    #[test]
    fn test_engine_error_propagates_into_build_error() {
        let err = BuildError::from(EngineError::new("boom"));
        match err {
            BuildError::Engine(e) => assert_eq!(e.message(), "boom"),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
