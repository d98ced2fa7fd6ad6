//! Rebranch Core Library
//!
//! Migrates a hosted repository's default branch (for example `master` to
//! `main`) together with the pipelines and branch policies that reference
//! it, keeping both branches mirrored while consumers move over.
//!
//! ## Layer 1 - Migration
//!
//! - `RemoteState`: read-only queries of branches, files and pipelines
//! - `RefMutator`: compare-and-swap branch updates and default branch switch
//! - `MirrorPublisher`: commits the `/mirror.yml` descriptor
//! - `PipelineManager`: mirroring pipeline and trigger rewrites
//! - `PolicyCloner`: copies branch policies onto the new branch
//! - `Migrator`: the six-step workflow and its explicit rollback

mod error;
pub mod mirror;
pub mod obs;
pub mod options;
pub mod pipelines;
pub mod policies;
pub mod ref_ops;
pub mod refs;
pub mod state;
pub mod telemetry;
pub mod workflow;

pub use error::{MigrationError, Result};
pub use mirror::{render_mirror_file, MirrorPublisher, MIRROR_FILE_PATH};
pub use obs::{
    emit_migration_finished, emit_migration_started, emit_policy_rejected, emit_step,
    migration_span,
};
pub use options::{MigrationOptions, DEFAULT_NEW_BRANCH, DEFAULT_OLD_BRANCH};
pub use pipelines::{
    mirroring_pipeline_name, rewrite_branch_filter, rewrite_definition, PipelineManager,
};
pub use policies::{retarget_policy, PolicyCloneReport, PolicyCloner};
pub use ref_ops::RefMutator;
pub use refs::{normalize, BranchRef, HEADS_PREFIX};
pub use state::RemoteState;
pub use telemetry::init_tracing;
pub use workflow::{
    MigrationOutcome, MigrationStep, Migrator, RollbackOutcome, StepRecord, StepStatus,
};

/// Rebranch version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
