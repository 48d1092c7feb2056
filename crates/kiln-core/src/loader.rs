//! マニフェストローダー
//!
//! ファイル発見、パース、検証を統合

use crate::discovery::{find_project_root, manifest_path};
use crate::error::{ManifestError, Result};
use crate::model::Manifest;
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info};

/// プロジェクトルートを検出してマニフェストをロード
pub fn load_manifest() -> Result<Manifest> {
    let project_root = find_project_root()?;
    load_manifest_from_root(&project_root)
}

/// 指定されたルートディレクトリからマニフェストをロード
pub fn load_manifest_from_root(project_root: &Path) -> Result<Manifest> {
    let path = manifest_path(project_root)
        .ok_or_else(|| ManifestError::ProjectRootNotFound(project_root.to_path_buf()))?;

    debug!(manifest = %path.display(), "Loading manifest");
    let content = std::fs::read_to_string(&path)?;
    let manifest: Manifest = serde_yaml::from_str(&content)?;

    validate_manifest(&manifest)?;
    info!(images = manifest.images.len(), "Manifest loaded successfully");

    Ok(manifest)
}

/// マニフェストの整合性チェック
///
/// イメージ名の欠落と重複を検出する。参照文法の検証はビルド側で行う。
fn validate_manifest(manifest: &Manifest) -> Result<()> {
    let mut seen = HashSet::new();

    for image in &manifest.images {
        if image.name.trim().is_empty() {
            return Err(ManifestError::InvalidManifest(
                "イメージ名が指定されていません".to_string(),
            ));
        }
        if !seen.insert(image.name.as_str()) {
            return Err(ManifestError::InvalidManifest(format!(
                "イメージ名が重複しています: {}",
                image.name
            )));
        }
    }

    Ok(())
}
