//! Migration options: which branch is being renamed to what.

use crate::error::{MigrationError, Result};
use crate::refs::BranchRef;

/// Branch most repositories are migrated away from.
pub const DEFAULT_OLD_BRANCH: &str = "master";

/// Branch most repositories are migrated to.
pub const DEFAULT_NEW_BRANCH: &str = "main";

/// Validated old/new branch pair for one migration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationOptions {
    pub old_branch: BranchRef,
    pub new_branch: BranchRef,
}

impl MigrationOptions {
    /// Both names may be given with or without `refs/heads/`; they must not
    /// name the same branch.
    pub fn new(old_branch: &str, new_branch: &str) -> Result<Self> {
        let old_branch = BranchRef::new(old_branch)?;
        let new_branch = BranchRef::new(new_branch)?;
        if old_branch == new_branch {
            return Err(MigrationError::SameBranch(old_branch.to_string()));
        }
        Ok(MigrationOptions {
            old_branch,
            new_branch,
        })
    }
}

impl Default for MigrationOptions {
    fn default() -> Self {
        MigrationOptions {
            old_branch: BranchRef::from_valid(DEFAULT_OLD_BRANCH),
            new_branch: BranchRef::from_valid(DEFAULT_NEW_BRANCH),
        }
    }
}
