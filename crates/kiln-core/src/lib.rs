//! Kiln core model
//!
//! This crate provides the declarative model shared by the Kiln build
//! coordinator and the CLI: image specifications, the cleanup policy,
//! project layout, and manifest discovery/loading.

pub mod discovery;
pub mod error;
pub mod loader;
pub mod model;

pub use discovery::{find_project_root, manifest_path};
pub use error::{ManifestError, Result};
pub use loader::{load_manifest, load_manifest_from_root};
pub use model::{BuildSpec, CleanupMode, ImageSpec, Manifest, ProjectLayout};
