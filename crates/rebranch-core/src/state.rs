//! Read-only queries of live remote state.
//!
//! Every workflow step asks these questions before acting, which is what
//! makes a migration safe to re-run after a partial failure.

use rebranch_remote::{
    Branch, BuildService, DefinitionReference, GitService, RecursionLevel, Repository,
};
use tracing::warn;
use uuid::Uuid;

use crate::error::Result;
use crate::refs::BranchRef;

/// Remote state queries for one repository's hosting service.
pub struct RemoteState<'a> {
    git: &'a dyn GitService,
    build: &'a dyn BuildService,
}

impl<'a> RemoteState<'a> {
    pub fn new(git: &'a dyn GitService, build: &'a dyn BuildService) -> Self {
        RemoteState { git, build }
    }

    /// Re-read the repository, including its current default branch.
    pub async fn repository(&self, repository_id: Uuid) -> Result<Repository> {
        Ok(self.git.get_repository(repository_id).await?)
    }

    /// Whether the repository's default branch is `branch`.
    pub fn is_default_branch(repository: &Repository, branch: &BranchRef) -> bool {
        repository
            .default_branch
            .as_deref()
            .is_some_and(|current| branch.matches(current))
    }

    pub async fn branch(&self, repository_id: Uuid, branch: &BranchRef) -> Result<Branch> {
        Ok(self
            .git
            .get_branch(repository_id, branch.short_name())
            .await?)
    }

    pub async fn branch_exists(&self, repository_id: Uuid, branch: &BranchRef) -> Result<bool> {
        let branches = self.git.list_branches(repository_id).await?;
        Ok(branches.iter().any(|b| branch.matches(&b.name)))
    }

    /// Whether a file exists at `path` directly under the repository root.
    pub async fn root_file_exists(&self, repository_id: Uuid, path: &str) -> Result<bool> {
        let items = self
            .git
            .list_items(repository_id, "/", RecursionLevel::OneLevel)
            .await?;
        Ok(items.iter().any(|item| !item.is_folder && item.path == path))
    }

    /// Pipeline definition with exactly this name in the repository's project.
    pub async fn find_pipeline(
        &self,
        repository: &Repository,
        name: &str,
    ) -> Result<Option<DefinitionReference>> {
        let mut definitions = self
            .build
            .find_definitions(repository.project.id, name)
            .await?;
        if definitions.len() > 1 {
            warn!(
                pipeline = %name,
                count = definitions.len(),
                "Multiple pipeline definitions share this name; using the first"
            );
        }
        Ok(if definitions.is_empty() {
            None
        } else {
            Some(definitions.swap_remove(0))
        })
    }
}
