//! Kiln Docker image build coordination
//!
//! This crate coordinates a single declarative image build: reference
//! validation, build-context archiving, build-argument merging, engine
//! invocation, and removal of the superseded image under the configured
//! cleanup policy.

pub mod args;
pub mod builder;
pub mod context;
pub mod engine;
pub mod error;
pub mod reference;

pub use args::merge_build_args;
pub use builder::ImageBuilder;
pub use context::{ContextArchiver, TarContextBuilder};
pub use engine::{BuildRequest, DockerEngine, EngineClient, ImageQuery};
pub use error::{BuildError, EngineError, Result};
pub use reference::validate;
