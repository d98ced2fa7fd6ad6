//! Rebranch-Remote: hosting service contracts for rebranch
//!
//! This crate describes everything the migration needs from the service
//! that hosts the repository, its pipelines and its branch policies.
//!
//! ## Layer 0 - Remote State
//!
//! Focus: typed access to live remote state, compare-and-swap ref updates,
//! and lossless pass-through of loosely-typed payloads.
//!
//! ## Key Components
//!
//! - `GitService`, `BuildService`, `PolicyService`: async service traits
//! - `AzureDevOpsClient`: REST implementation of all three
//! - `fakes::MemoryDevOps`: in-memory implementation for tests

pub mod azure;
mod error;
pub mod fakes;
mod schema;
pub mod service_traits;

pub use azure::{AzureDevOpsClient, ConnectionConfig};
pub use error::{RemoteError, POLICY_REJECTION_MESSAGE};
pub use schema::{
    Branch, Change, ChangeItem, ChangeType, CommitRef, DefinitionReference, FilterTrigger,
    GitItem, ItemContent, ObjectId, PipelineDefinition, PipelineRepository, PolicyConfiguration,
    PolicyScope, PolicySettings, PolicyTypeRef, ProjectReference, Push, PushCommit, PushRef,
    RecursionLevel, RefUpdate, RefUpdateResult, Repository, Trigger, HOSTED_GIT_REPOSITORY_TYPE,
};
pub use service_traits::{BuildService, GitService, PolicyService, RemoteResult};

/// Result type for rebranch-remote operations
pub type Result<T> = std::result::Result<T, RemoteError>;
