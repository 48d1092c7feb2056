//! ビルドコンテキストのアーカイブ作成

use crate::error::{BuildError, Result};
use async_trait::async_trait;
use flate2::Compression;
use flate2::write::GzEncoder;
use kiln_core::{BuildSpec, ProjectLayout};
use std::fs::File;
use std::path::PathBuf;
use tempfile::TempDir;

/// コンテキストサイズの警告しきい値
const MAX_CONTEXT_SIZE: u64 = 500 * 1024 * 1024; // 500MB

/// ビルドコンテキストをアーカイブとして実体化する
#[async_trait]
pub trait ContextArchiver: Send + Sync {
    /// コンテキストアーカイブを作成してそのパスを返す
    ///
    /// 作成されたアーカイブはアーキバ自身が所有する。呼び出し側が
    /// 削除する必要はない。
    async fn create_archive(
        &self,
        image_name: &str,
        build: &BuildSpec,
        layout: &ProjectLayout,
    ) -> Result<PathBuf>;
}

/// tar.gz 形式でコンテキストを作成するアーキバ
///
/// アーカイブは専用の一時ディレクトリに書き出され、アーキバの
/// ドロップとともに削除される。
pub struct TarContextBuilder {
    scratch: TempDir,
}

impl TarContextBuilder {
    pub fn new() -> Result<Self> {
        Ok(Self {
            scratch: TempDir::new()?,
        })
    }

    /// イメージ参照をファイル名に使える形に変換
    fn archive_file_name(image_name: &str) -> String {
        let sanitized: String = image_name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
            .collect();
        format!("{}.tar.gz", sanitized)
    }
}

#[async_trait]
impl ContextArchiver for TarContextBuilder {
    async fn create_archive(
        &self,
        image_name: &str,
        build: &BuildSpec,
        layout: &ProjectLayout,
    ) -> Result<PathBuf> {
        // コンテキストディレクトリの解決と存在確認
        let context_dir = match &build.context {
            Some(context) => layout.resolve(context),
            None => layout.root().to_path_buf(),
        };
        if !context_dir.exists() {
            return Err(BuildError::ContextNotFound(context_dir));
        }
        if !context_dir.is_dir() {
            return Err(BuildError::ContextNotADirectory(context_dir));
        }

        // Dockerfileの解決と存在確認
        let dockerfile = match &build.dockerfile {
            Some(raw) => {
                let path = layout.resolve(raw);
                if !path.is_file() {
                    return Err(BuildError::DockerfileNotFound(path));
                }
                let leaf = build
                    .dockerfile_name()
                    .ok_or_else(|| BuildError::DockerfileNotFound(path.clone()))?;
                Some((path, leaf))
            }
            None => None,
        };

        let archive_path = self.scratch.path().join(Self::archive_file_name(image_name));
        tracing::debug!(
            context = %context_dir.display(),
            archive = %archive_path.display(),
            "Creating build context archive"
        );

        {
            let encoder = GzEncoder::new(File::create(&archive_path)?, Compression::default());
            let mut tar = tar::Builder::new(encoder);

            // コンテキストディレクトリを再帰的に追加
            tar.append_dir_all(".", &context_dir)?;

            // 指定された Dockerfile をアーカイブ直下に末端名で追加
            if let Some((dockerfile, leaf)) = dockerfile {
                let content = std::fs::read(&dockerfile)?;

                let mut header = tar::Header::new_gnu();
                header.set_path(&leaf)?;
                header.set_size(content.len() as u64);
                header.set_mode(0o644);
                header.set_cksum();

                tar.append(&header, &content[..])?;
            }

            let encoder = tar.into_inner()?;
            encoder.finish()?;
        }

        // コンテキストサイズの警告
        let size = std::fs::metadata(&archive_path)?.len();
        tracing::debug!(bytes = size, "Build context archive created");
        if size > MAX_CONTEXT_SIZE {
            tracing::warn!(
                "警告: ビルドコンテキストが大きすぎます（{}MB）\n\
                 .dockerignoreファイルで不要なファイルを除外することを推奨します。",
                size / 1024 / 1024
            );
        }

        Ok(archive_path)
    }
}
