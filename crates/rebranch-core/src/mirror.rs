//! Mirror pipeline descriptor.
//!
//! `/mirror.yml` triggers on pushes to either branch and pushes the built
//! head to both, keeping old and new branch in step while consumers move
//! over.

use rebranch_remote::{Change, GitService, Push, PushCommit, PushRef};
use tracing::debug;
use uuid::Uuid;

use crate::error::Result;
use crate::refs::BranchRef;

/// Repository path of the mirror pipeline descriptor.
pub const MIRROR_FILE_PATH: &str = "/mirror.yml";

const COMMIT_COMMENT: &str = "Add mirroring pipeline";

/// Render the pipeline descriptor mirroring `old` and `new`.
pub fn render_mirror_file(old: &BranchRef, new: &BranchRef) -> String {
    let old = old.short_name();
    let new = new.short_name();
    format!(
        "trigger:
  branches:
    include:
    - {old}
    - {new}

pool: {{ vmImage: ubuntu-latest }}
steps:
- checkout: self
  persistCredentials: true
- script: |
    git checkout $(Build.SourceBranchName)
    git push origin HEAD:{old} HEAD:{new}
  displayName: Mirror old and new default branches
"
    )
}

/// Commits the mirror descriptor to a branch.
pub struct MirrorPublisher<'a> {
    git: &'a dyn GitService,
}

impl<'a> MirrorPublisher<'a> {
    pub fn new(git: &'a dyn GitService) -> Self {
        MirrorPublisher { git }
    }

    /// Commit the descriptor onto `target`, on top of its current head.
    pub async fn publish(
        &self,
        repository_id: Uuid,
        old: &BranchRef,
        new: &BranchRef,
        target: &BranchRef,
    ) -> Result<()> {
        let branch = self
            .git
            .get_branch(repository_id, target.short_name())
            .await?;
        debug!(branch = %target, head = %branch.head().short(), "Committing mirror descriptor");

        let push = Push {
            ref_updates: vec![PushRef {
                name: target.full_name().to_string(),
                old_object_id: branch.head().clone(),
            }],
            commits: vec![PushCommit {
                comment: COMMIT_COMMENT.to_string(),
                changes: vec![Change::add_text(
                    MIRROR_FILE_PATH,
                    render_mirror_file(old, new),
                )],
            }],
        };
        Ok(self.git.create_push(repository_id, push).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rebranch_remote::fakes::MemoryDevOps;

    fn pair() -> (BranchRef, BranchRef) {
        (
            BranchRef::new("master").unwrap(),
            BranchRef::new("main").unwrap(),
        )
    }

    #[test]
    fn test_descriptor_triggers_on_both_branches() {
        let (old, new) = pair();
        let yaml = render_mirror_file(&old, &new);
        assert!(yaml.contains("    - master\n    - main\n"));
        assert!(yaml.contains("git push origin HEAD:master HEAD:main"));
        assert!(yaml.contains("pool: { vmImage: ubuntu-latest }"));
    }

    #[test]
    fn test_descriptor_uses_short_names_for_full_refs() {
        let old = BranchRef::new("refs/heads/trunk").unwrap();
        let new = BranchRef::new("refs/heads/main").unwrap();
        let yaml = render_mirror_file(&old, &new);
        assert!(yaml.contains("HEAD:trunk HEAD:main"));
        assert!(!yaml.contains("refs/heads"));
    }

    #[tokio::test]
    async fn test_publish_commits_onto_target_branch() {
        let service = MemoryDevOps::new();
        let repo = service.add_repository("R", "P", Some("master"));
        service.add_branch(repo.id, "main", "master");
        let (old, new) = pair();

        MirrorPublisher::new(&service)
            .publish(repo.id, &old, &new, &new)
            .await
            .unwrap();

        let content = service
            .file_content(repo.id, "main", MIRROR_FILE_PATH)
            .unwrap();
        assert_eq!(content, render_mirror_file(&old, &new));
        assert!(service
            .file_content(repo.id, "master", MIRROR_FILE_PATH)
            .is_none());
    }
}
