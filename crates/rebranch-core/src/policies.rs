//! Branch policy cloning.
//!
//! Policy settings differ per policy type. Only the scope list is
//! interpreted; every other settings field is copied as-is.

use rebranch_remote::{PolicyConfiguration, PolicyService, Repository};
use serde::Serialize;
use serde_json::Map;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::obs::emit_policy_rejected;
use crate::refs::BranchRef;

/// Result of cloning one branch's policies onto another.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PolicyCloneReport {
    /// Ids of the newly created policies
    pub cloned: Vec<u32>,
    /// Source policies whose clone already exists on the target branch
    pub skipped_existing: Vec<u32>,
    /// Source policies the service rejected
    pub rejected: Vec<u32>,
    /// Source policies that failed for any other reason
    pub failed: Vec<u32>,
    /// Scope entries copied without a ref rewrite
    pub unmodified_scopes: usize,
}

impl PolicyCloneReport {
    pub fn has_failures(&self) -> bool {
        !self.rejected.is_empty() || !self.failed.is_empty()
    }
}

/// Copy `policy` with every ref-matching scope entry pointed at `target`.
///
/// A policy listed for the source branch may also name other refs; those
/// entries are retargeted too so the clone applies to `target` only.
/// Returns the new configuration and the number of scope entries left
/// unchanged (entries without a ref matcher).
pub fn retarget_policy(
    policy: &PolicyConfiguration,
    target: &BranchRef,
) -> (PolicyConfiguration, usize) {
    let mut settings = policy.settings.clone();
    let mut unmodified = 0;

    for scope in settings.scopes_mut() {
        if scope.ref_name().is_some() {
            scope.set_ref_name(target.full_name());
        } else {
            debug!(
                policy_id = ?policy.id,
                scope = ?scope.as_map(),
                "Scope not modified"
            );
            unmodified += 1;
        }
    }

    let clone = PolicyConfiguration {
        id: None,
        policy_type: policy.policy_type.clone(),
        is_enabled: policy.is_enabled,
        is_blocking: policy.is_blocking,
        is_deleted: false,
        settings,
        extra: Map::new(),
    };
    (clone, unmodified)
}

/// Clones branch policies from one branch of a repository to another.
pub struct PolicyCloner<'a> {
    policy: &'a dyn PolicyService,
}

impl<'a> PolicyCloner<'a> {
    pub fn new(policy: &'a dyn PolicyService) -> Self {
        PolicyCloner { policy }
    }

    /// Clone every policy scoped to `source` onto `target`.
    ///
    /// Failures are recorded per policy and do not stop the remaining
    /// clones. Authorization failures are returned immediately.
    pub async fn clone_policies(
        &self,
        repository: &Repository,
        source: &BranchRef,
        target: &BranchRef,
    ) -> Result<PolicyCloneReport> {
        let project_id = repository.project.id;
        let policies = self
            .policy
            .list_configurations(project_id, repository.id, source.full_name())
            .await?;
        let existing = self
            .policy
            .list_configurations(project_id, repository.id, target.full_name())
            .await?;
        debug!(
            source = %source,
            count = policies.len(),
            existing = existing.len(),
            "Cloning branch policies"
        );

        let mut report = PolicyCloneReport::default();
        for policy in policies {
            let source_id = policy.id.unwrap_or_default();
            let (clone, unmodified) = retarget_policy(&policy, target);
            report.unmodified_scopes += unmodified;

            let already_cloned = existing.iter().any(|e| {
                e.policy_type.id == clone.policy_type.id && e.settings == clone.settings
            });
            if already_cloned {
                debug!(policy_id = source_id, "Policy already present on target branch");
                report.skipped_existing.push(source_id);
                continue;
            }

            let serialized = serde_json::to_string(&clone).unwrap_or_default();
            match self
                .policy
                .create_configuration(&repository.project.name, clone)
                .await
            {
                Ok(created) => {
                    let created_id = created.id.unwrap_or_default();
                    info!(policy_id = source_id, clone_id = created_id, "Cloned policy");
                    report.cloned.push(created_id);
                }
                Err(e) if e.is_unauthorized() => return Err(e.into()),
                Err(e) if e.is_policy_rejection() => {
                    debug!(policy_id = source_id, policy = %serialized, "Policy rejected");
                    emit_policy_rejected(
                        &repository.name,
                        source_id,
                        policy.policy_type.display_name.as_deref().unwrap_or("unknown"),
                    );
                    report.rejected.push(source_id);
                }
                Err(e) => {
                    warn!(policy_id = source_id, error = %e, "Failed to clone policy");
                    report.failed.push(source_id);
                }
            }
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rebranch_remote::fakes::MemoryDevOps;
    use rebranch_remote::{PolicyScope, PolicySettings, PolicyTypeRef};
    use serde_json::json;
    use tracing_test::traced_test;
    use uuid::Uuid;

    fn refs() -> (BranchRef, BranchRef) {
        (
            BranchRef::new("master").unwrap(),
            BranchRef::new("main").unwrap(),
        )
    }

    fn policy(scopes: Vec<PolicyScope>) -> PolicyConfiguration {
        let mut rest = Map::new();
        rest.insert("minimumApproverCount".to_string(), json!(2));
        rest.insert("creatorVoteCounts".to_string(), json!(false));
        PolicyConfiguration {
            id: Some(7),
            policy_type: PolicyTypeRef {
                id: Uuid::new_v4(),
                display_name: Some("Minimum number of reviewers".to_string()),
            },
            is_enabled: true,
            is_blocking: false,
            is_deleted: false,
            settings: PolicySettings {
                scope: Some(scopes),
                rest,
            },
            extra: Map::from_iter([("revision".to_string(), json!(3))]),
        }
    }

    #[test]
    fn test_every_ref_matcher_is_rewritten() {
        let (_, new) = refs();
        let repo_id = Uuid::new_v4();
        let wide = PolicyScope::repository_wide(None);
        let original = policy(vec![
            PolicyScope::for_ref(repo_id, "refs/heads/master"),
            PolicyScope::for_ref(repo_id, "refs/heads/release"),
            wide.clone(),
        ]);

        let (clone, unmodified) = retarget_policy(&original, &new);
        let scopes = clone.settings.scopes();
        assert_eq!(unmodified, 1);
        assert_eq!(scopes[0].ref_name(), Some("refs/heads/main"));
        assert_eq!(scopes[0].as_map()["matchKind"], json!("Exact"));
        assert_eq!(scopes[1].ref_name(), Some("refs/heads/main"));
        assert_eq!(scopes[1].as_map()["repositoryId"], json!(repo_id.to_string()));
        assert_eq!(scopes[2], wide);
    }

    #[tokio::test]
    async fn test_multi_branch_policy_is_not_duplicated_on_other_branch() {
        let service = MemoryDevOps::new();
        let repo = service.add_repository("R", "P", Some("master"));
        service.add_policy(
            "P",
            policy(vec![
                PolicyScope::for_ref(repo.id, "refs/heads/master"),
                PolicyScope::for_ref(repo.id, "refs/heads/release"),
            ]),
        );
        let (old, new) = refs();

        let report = PolicyCloner::new(&service)
            .clone_policies(&repo, &old, &new)
            .await
            .unwrap();
        assert_eq!(report.cloned.len(), 1);
        assert_eq!(report.unmodified_scopes, 0);

        let on_release = service
            .list_configurations(repo.project.id, repo.id, "refs/heads/release")
            .await
            .unwrap();
        assert_eq!(on_release.len(), 1);
        let on_main = service
            .list_configurations(repo.project.id, repo.id, "refs/heads/main")
            .await
            .unwrap();
        assert_eq!(on_main.len(), 1);
        assert!(on_main[0]
            .settings
            .scopes()
            .iter()
            .all(|s| s.ref_name() == Some("refs/heads/main")));
    }

    #[test]
    fn test_clone_keeps_type_flags_and_opaque_settings() {
        let (_, new) = refs();
        let original = policy(vec![PolicyScope::for_ref(Uuid::new_v4(), "refs/heads/master")]);

        let (clone, _) = retarget_policy(&original, &new);
        assert_eq!(clone.id, None);
        assert_eq!(clone.policy_type, original.policy_type);
        assert_eq!(clone.is_enabled, original.is_enabled);
        assert_eq!(clone.is_blocking, original.is_blocking);
        assert_eq!(clone.settings.rest, original.settings.rest);
        assert!(clone.extra.is_empty());
        // the source is untouched
        assert_eq!(
            original.settings.scopes()[0].ref_name(),
            Some("refs/heads/master")
        );
    }

    #[test]
    fn test_policy_without_scope_list() {
        let (_, new) = refs();
        let mut original = policy(Vec::new());
        original.settings.scope = None;

        let (clone, unmodified) = retarget_policy(&original, &new);
        assert_eq!(unmodified, 0);
        assert!(clone.settings.scope.is_none());
    }

    #[traced_test]
    #[tokio::test]
    async fn test_rejected_policy_is_logged_and_skipped() {
        let service = MemoryDevOps::new();
        let repo = service.add_repository("R", "P", Some("master"));
        let rejected = service.add_policy(
            "P",
            policy(vec![PolicyScope::for_ref(repo.id, "refs/heads/master")]),
        );
        service.add_policy(
            "P",
            policy(vec![PolicyScope::for_ref(repo.id, "refs/heads/master")]),
        );
        service.reject_policy_type(rejected.policy_type.id);

        let (old, new) = refs();
        let report = PolicyCloner::new(&service)
            .clone_policies(&repo, &old, &new)
            .await
            .unwrap();

        assert_eq!(report.cloned.len(), 1);
        assert_eq!(report.rejected, vec![rejected.id.unwrap()]);
        assert!(report.has_failures());
        assert!(logs_contain("Policy rejected"));
        assert!(logs_contain("policy.rejected"));
    }

    #[tokio::test]
    async fn test_second_clone_finds_existing_policies() {
        let service = MemoryDevOps::new();
        let repo = service.add_repository("R", "P", Some("master"));
        service.add_policy(
            "P",
            policy(vec![PolicyScope::for_ref(repo.id, "refs/heads/master")]),
        );
        let (old, new) = refs();
        let cloner = PolicyCloner::new(&service);

        let first = cloner.clone_policies(&repo, &old, &new).await.unwrap();
        assert_eq!(first.cloned.len(), 1);
        let mutations = service.mutation_count();

        let second = cloner.clone_policies(&repo, &old, &new).await.unwrap();
        assert!(second.cloned.is_empty());
        assert_eq!(second.skipped_existing.len(), 1);
        assert_eq!(service.mutation_count(), mutations);
    }
}
