//! Branch mutations through compare-and-swap ref updates.

use rebranch_remote::{GitService, ObjectId, RefUpdate, RemoteError, Repository};
use tracing::debug;
use uuid::Uuid;

use crate::error::Result;
use crate::refs::BranchRef;

/// Creates, moves and deletes branches and switches the default branch.
pub struct RefMutator<'a> {
    git: &'a dyn GitService,
}

impl<'a> RefMutator<'a> {
    pub fn new(git: &'a dyn GitService) -> Self {
        RefMutator { git }
    }

    /// Create `branch` at `target`. Fails if the branch already exists.
    pub async fn create_branch(
        &self,
        repository_id: Uuid,
        branch: &BranchRef,
        target: ObjectId,
    ) -> Result<()> {
        debug!(branch = %branch, target = %target.short(), "Creating branch");
        self.apply(repository_id, RefUpdate::create(branch.full_name(), target))
            .await
    }

    /// Move `branch` from `current` to `target`.
    pub async fn move_branch(
        &self,
        repository_id: Uuid,
        branch: &BranchRef,
        current: ObjectId,
        target: ObjectId,
    ) -> Result<()> {
        debug!(branch = %branch, from = %current.short(), to = %target.short(), "Moving branch");
        self.apply(
            repository_id,
            RefUpdate::advance(branch.full_name(), current, target),
        )
        .await
    }

    /// Delete `branch`, which must still point at `current`.
    pub async fn delete_branch(
        &self,
        repository_id: Uuid,
        branch: &BranchRef,
        current: ObjectId,
    ) -> Result<()> {
        debug!(branch = %branch, head = %current.short(), "Deleting branch");
        self.apply(repository_id, RefUpdate::delete(branch.full_name(), current))
            .await
    }

    /// Point the repository's default branch at `branch`.
    pub async fn set_default_branch(
        &self,
        repository_id: Uuid,
        branch: &BranchRef,
    ) -> Result<Repository> {
        debug!(branch = %branch, "Setting default branch");
        Ok(self
            .git
            .update_default_branch(repository_id, branch.full_name())
            .await?)
    }

    async fn apply(&self, repository_id: Uuid, update: RefUpdate) -> Result<()> {
        let name = update.name.clone();
        let results = self.git.update_refs(repository_id, vec![update]).await?;
        match results.into_iter().find(|r| r.name == name) {
            Some(result) if result.success => Ok(()),
            Some(result) => Err(RemoteError::RefUpdateRejected {
                name,
                status: result
                    .custom_message
                    .unwrap_or(result.update_status),
            }
            .into()),
            None => Err(RemoteError::RefUpdateRejected {
                name,
                status: "no result returned".to_string(),
            }
            .into()),
        }
    }
}
