// src/step/mod.rs

//! File-processing leaves of the task graph.
//!
//! - [`sources`] evaluates input globs afresh on every run.
//! - [`transform`] defines the [`Transform`] contract and built-in transforms.
//! - [`executor`] holds [`Step`]: read -> transform -> write.
//! - [`clean`] holds [`CleanStep`]: empty a set of directories.
//! - [`stamp`] persists per-step "last successful run" times.

pub mod clean;
pub mod executor;
pub mod sources;
pub mod stamp;
pub mod transform;

pub use clean::CleanStep;
pub use executor::{Step, StepReport};
pub use sources::{SourceFile, SourceSet};
pub use stamp::{
    open_stamp_store, state_dir, FileStampStore, MemoryStampStore, SharedStampStore, StampStore,
};
pub use transform::{build_transform, FileEntry, FileSet, Transform, TransformError};
