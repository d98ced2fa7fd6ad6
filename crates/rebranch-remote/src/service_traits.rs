//! Remote service trait definitions for rebranch
//!
//! These traits define the operations the migration needs from the hosting
//! service:
//! - `GitService`: repositories, branches, refs, items and pushes
//! - `BuildService`: pipeline definitions
//! - `PolicyService`: branch policy configurations
//!
//! All traits are async and transport-agnostic. An HTTP implementation lives
//! in the `azure` module; in-memory fakes are provided for testing via the
//! `fakes` module.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::RemoteError;
use crate::schema::*;

/// Result type for remote operations
pub type RemoteResult<T> = std::result::Result<T, RemoteError>;

/// Version control operations.
///
/// Guarantees:
/// - `update_refs` applies each update with compare-and-swap semantics: an
///   update whose `old_object_id` differs from the ref's current value is
///   reported as unsuccessful in its `RefUpdateResult`.
/// - `get_branch` returns `RemoteError::NotFound` for unknown branches.
#[async_trait]
pub trait GitService: Send + Sync {
    /// List all repositories visible to the caller.
    async fn list_repositories(&self) -> RemoteResult<Vec<Repository>>;

    /// Fetch a single repository by id.
    async fn get_repository(&self, repository_id: Uuid) -> RemoteResult<Repository>;

    /// Set the repository's default branch (fully-qualified ref name).
    async fn update_default_branch(
        &self,
        repository_id: Uuid,
        default_branch: &str,
    ) -> RemoteResult<Repository>;

    /// Look up a branch by short name.
    async fn get_branch(&self, repository_id: Uuid, name: &str) -> RemoteResult<Branch>;

    /// List all branches.
    async fn list_branches(&self, repository_id: Uuid) -> RemoteResult<Vec<Branch>>;

    /// Apply compare-and-swap ref updates.
    async fn update_refs(
        &self,
        repository_id: Uuid,
        updates: Vec<RefUpdate>,
    ) -> RemoteResult<Vec<RefUpdateResult>>;

    /// List items under `scope_path` on the default branch.
    async fn list_items(
        &self,
        repository_id: Uuid,
        scope_path: &str,
        recursion: RecursionLevel,
    ) -> RemoteResult<Vec<GitItem>>;

    /// Create commits with file content and advance the given refs.
    async fn create_push(&self, repository_id: Uuid, push: Push) -> RemoteResult<()>;
}

/// Pipeline definition operations.
#[async_trait]
pub trait BuildService: Send + Sync {
    /// Find definitions with exactly this name in a project.
    async fn find_definitions(
        &self,
        project_id: Uuid,
        name: &str,
    ) -> RemoteResult<Vec<DefinitionReference>>;

    /// List full definitions bound to a repository.
    async fn list_full_definitions(
        &self,
        project_id: Uuid,
        repository_id: Uuid,
        repository_type: &str,
    ) -> RemoteResult<Vec<PipelineDefinition>>;

    /// Create a definition, returning it with its assigned id.
    async fn create_definition(
        &self,
        project: &str,
        definition: PipelineDefinition,
    ) -> RemoteResult<PipelineDefinition>;

    /// Replace an existing definition.
    async fn update_definition(
        &self,
        project: &str,
        definition: PipelineDefinition,
    ) -> RemoteResult<PipelineDefinition>;

    /// Delete a definition. Fails with `NotFound` if absent.
    async fn delete_definition(&self, project_id: Uuid, definition_id: u32) -> RemoteResult<()>;
}

/// Branch policy operations.
#[async_trait]
pub trait PolicyService: Send + Sync {
    /// List policy configurations whose scope covers `ref_name`.
    async fn list_configurations(
        &self,
        project_id: Uuid,
        repository_id: Uuid,
        ref_name: &str,
    ) -> RemoteResult<Vec<PolicyConfiguration>>;

    /// Create a policy configuration. A write blocked by an existing policy
    /// fails with `RemoteError::PolicyRejected`.
    async fn create_configuration(
        &self,
        project: &str,
        configuration: PolicyConfiguration,
    ) -> RemoteResult<PolicyConfiguration>;
}
