//! マニフェスト自動発見機能
//!
//! カレントディレクトリから上に向かって kiln.yaml を探します。

use crate::error::{ManifestError, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// マニフェストのファイル名
pub const MANIFEST_FILE: &str = "kiln.yaml";

/// プロジェクトルートを検出
///
/// 以下の優先順位で検索:
/// 1. 環境変数 KILN_PROJECT_ROOT
/// 2. カレントディレクトリから上に向かって以下を探す:
///    - kiln.yaml
///    - .kiln/kiln.yaml
pub fn find_project_root() -> Result<PathBuf> {
    // 1. 環境変数
    if let Ok(root) = std::env::var("KILN_PROJECT_ROOT") {
        let path = PathBuf::from(&root);
        debug!(env_root = %root, "Checking KILN_PROJECT_ROOT");
        if manifest_path(&path).is_some() {
            info!(project_root = %path.display(), "Found project root from environment variable");
            return Ok(path);
        }
    }

    // 2. カレントディレクトリから上に向かって探す
    let start_dir = std::env::current_dir()?;
    let mut current = start_dir.clone();
    debug!(start_dir = %start_dir.display(), "Searching for project root");

    loop {
        if manifest_path(&current).is_some() {
            info!(project_root = %current.display(), "Found project root");
            return Ok(current);
        }

        // 親ディレクトリへ
        if !current.pop() {
            break;
        }
    }

    warn!(start_dir = %start_dir.display(), "Project root not found");
    Err(ManifestError::ProjectRootNotFound(start_dir))
}

/// ルートディレクトリ内のマニフェストファイルのパスを返す
///
/// kiln.yaml → .kiln/kiln.yaml の順でチェックし、存在しなければ None。
pub fn manifest_path(root: &Path) -> Option<PathBuf> {
    let direct = root.join(MANIFEST_FILE);
    if direct.exists() {
        return Some(direct);
    }

    let nested = root.join(".kiln").join(MANIFEST_FILE);
    if nested.exists() {
        return Some(nested);
    }

    None
}
