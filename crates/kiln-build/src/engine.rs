//! Dockerエンジンクライアント
//!
//! コーディネータが利用するエンジン操作をトレイトとして切り出し、
//! bollard ベースの実装を提供する。テストではこのトレイトの
//! 記録用ダブルに差し替えられる。

use crate::error::EngineError;
use async_trait::async_trait;
use bollard::Docker;
use futures_util::stream::StreamExt;
use std::collections::HashMap;
use std::path::PathBuf;

/// 1回のビルド呼び出しでエンジンに渡す値
#[derive(Debug, Clone, PartialEq)]
pub struct BuildRequest {
    /// ビルド結果に付けるイメージ参照
    pub image_name: String,
    /// ビルドコンテキストアーカイブ (tar.gz) のパス
    pub archive: PathBuf,
    /// アーカイブ内の Dockerfile 名（未指定ならエンジンのデフォルト）
    pub dockerfile_name: Option<String>,
    /// 中間コンテナを常に削除するか
    pub force_remove_intermediate: bool,
    /// レイヤーキャッシュを無効化するか
    pub no_cache: bool,
    /// マージ済みビルド引数
    pub build_args: HashMap<String, String>,
}

/// イメージのビルドと削除を行うエンジン操作
#[async_trait]
pub trait EngineClient: Send + Sync {
    /// コンテキストアーカイブからイメージをビルド
    async fn build_image(&self, request: &BuildRequest) -> Result<(), EngineError>;

    /// イメージIDを指定して削除
    async fn remove_image(&self, image_id: &str, force: bool) -> Result<(), EngineError>;
}

/// イメージIDの照会
#[async_trait]
pub trait ImageQuery: Send + Sync {
    /// 参照名に対応する現在のイメージIDを返す（存在しなければ None）
    async fn image_id(&self, name: &str) -> Result<Option<String>, EngineError>;
}

/// bollard ベースのエンジンクライアント
pub struct DockerEngine {
    docker: Docker,
}

impl DockerEngine {
    pub fn new(docker: Docker) -> Self {
        Self { docker }
    }

    /// ビルド出力の処理
    fn handle_build_output(&self, output: bollard::models::BuildInfo) -> Result<(), EngineError> {
        if let Some(stream) = output.stream {
            // ビルドステップの出力
            print!("{}", stream);
        }

        if let Some(error) = output.error {
            return Err(EngineError::new(error));
        }

        if let Some(error_detail) = output.error_detail {
            let message = error_detail
                .message
                .unwrap_or_else(|| "Unknown build error".to_string());
            return Err(EngineError::new(message));
        }

        if let Some(status) = output.status {
            // ステータスメッセージ（pull等）
            tracing::debug!("{}", status);
        }

        Ok(())
    }
}

#[async_trait]
impl EngineClient for DockerEngine {
    async fn build_image(&self, request: &BuildRequest) -> Result<(), EngineError> {
        tracing::debug!(
            image = %request.image_name,
            archive = %request.archive.display(),
            "Starting engine build"
        );

        let context = tokio::fs::read(&request.archive).await.map_err(|e| {
            EngineError::new(format!(
                "ビルドコンテキストを読み込めません: {}: {}",
                request.archive.display(),
                e
            ))
        })?;

        // build_argsを&str型に変換
        let build_args_refs: HashMap<&str, &str> = request
            .build_args
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();

        #[allow(deprecated)]
        let options = bollard::image::BuildImageOptions {
            dockerfile: request.dockerfile_name.as_deref().unwrap_or_default(),
            t: request.image_name.as_str(),
            buildargs: build_args_refs,
            nocache: request.no_cache,
            rm: true,
            forcerm: request.force_remove_intermediate,
            ..Default::default()
        };

        use bytes::Bytes;
        use http_body_util::{Either, Full};
        let body = Full::new(Bytes::from(context));
        let mut stream = self
            .docker
            .build_image(options, None, Some(Either::Left(body)));

        while let Some(msg) = stream.next().await {
            match msg {
                Ok(output) => {
                    self.handle_build_output(output)?;
                }
                Err(e) => {
                    return Err(EngineError::from(e));
                }
            }
        }

        Ok(())
    }

    async fn remove_image(&self, image_id: &str, force: bool) -> Result<(), EngineError> {
        #[allow(deprecated)]
        let options = bollard::image::RemoveImageOptions {
            force,
            noprune: false,
        };

        self.docker
            .remove_image(image_id, Some(options), None)
            .await
            .map_err(EngineError::from)?;

        Ok(())
    }
}

#[async_trait]
impl ImageQuery for DockerEngine {
    async fn image_id(&self, name: &str) -> Result<Option<String>, EngineError> {
        match self.docker.inspect_image(name).await {
            Ok(inspect) => Ok(inspect.id),
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 404, ..
            }) => Ok(None),
            Err(e) => Err(EngineError::from(e)),
        }
    }
}
