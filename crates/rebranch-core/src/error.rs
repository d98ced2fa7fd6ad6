//! Error taxonomy for the migration workflow.

use rebranch_remote::RemoteError;

/// Migration errors.
#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    #[error("invalid branch name: {0:?}")]
    InvalidBranchName(String),

    #[error("old and new branch are both {0}")]
    SameBranch(String),

    #[error("default branch of {repository} is {actual}, expected {expected}")]
    UnexpectedDefaultBranch {
        repository: String,
        expected: String,
        actual: String,
    },

    #[error("invalid selection: {0}")]
    InvalidSelection(String),

    #[error("remote error: {0}")]
    Remote(#[from] RemoteError),
}

impl MigrationError {
    /// Authorization failures abort the whole migration attempt.
    pub fn is_fatal(&self) -> bool {
        matches!(self, MigrationError::Remote(e) if e.is_unauthorized())
    }
}

/// Result type for migration operations.
pub type Result<T> = std::result::Result<T, MigrationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migration_error_display() {
        let err = MigrationError::InvalidBranchName(" ".to_string());
        assert!(err.to_string().contains("invalid branch name"));

        let err = MigrationError::SameBranch("refs/heads/main".to_string());
        assert!(err.to_string().contains("refs/heads/main"));
    }

    #[test]
    fn test_unexpected_default_branch_mentions_both_refs() {
        let err = MigrationError::UnexpectedDefaultBranch {
            repository: "R".to_string(),
            expected: "refs/heads/master".to_string(),
            actual: "refs/heads/develop".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("refs/heads/master"));
        assert!(msg.contains("refs/heads/develop"));
    }

    #[test]
    fn test_only_authorization_failures_are_fatal() {
        let fatal = MigrationError::from(RemoteError::Unauthorized("401".to_string()));
        assert!(fatal.is_fatal());

        let rejected = MigrationError::from(RemoteError::PolicyRejected("no".to_string()));
        assert!(!rejected.is_fatal());
        assert!(!MigrationError::InvalidSelection("0".to_string()).is_fatal());
    }
}
