//! Default-branch migration workflow.
//!
//! `Migrator::migrate` runs six steps in order. Each step first inspects
//! live remote state and is skipped when its effect is already present, so
//! an interrupted migration is resumed by running it again.
//!
//! The mirror file is committed before any policy is cloned onto the new
//! branch; a required-reviewer policy there would otherwise block the push.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use rebranch_remote::{BuildService, GitService, PolicyService, Repository};
use serde::Serialize;
use tracing::{debug, info, warn, Instrument};

use crate::error::{MigrationError, Result};
use crate::mirror::{MirrorPublisher, MIRROR_FILE_PATH};
use crate::obs::{emit_migration_finished, emit_migration_started, emit_step, migration_span};
use crate::options::MigrationOptions;
use crate::pipelines::{mirroring_pipeline_name, PipelineManager};
use crate::policies::{PolicyCloneReport, PolicyCloner};
use crate::ref_ops::RefMutator;
use crate::state::RemoteState;

/// Workflow steps, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationStep {
    CreateBranch,
    SetDefaultBranch,
    PublishMirrorFile,
    CreateMirroringPipeline,
    ClonePolicies,
    UpdatePipelines,
}

impl MigrationStep {
    pub const ALL: [MigrationStep; 6] = [
        MigrationStep::CreateBranch,
        MigrationStep::SetDefaultBranch,
        MigrationStep::PublishMirrorFile,
        MigrationStep::CreateMirroringPipeline,
        MigrationStep::ClonePolicies,
        MigrationStep::UpdatePipelines,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MigrationStep::CreateBranch => "create_branch",
            MigrationStep::SetDefaultBranch => "set_default_branch",
            MigrationStep::PublishMirrorFile => "publish_mirror_file",
            MigrationStep::CreateMirroringPipeline => "create_mirroring_pipeline",
            MigrationStep::ClonePolicies => "clone_policies",
            MigrationStep::UpdatePipelines => "update_pipelines",
        }
    }
}

impl fmt::Display for MigrationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a step changed remote state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Applied,
    /// The remote state already satisfied the step
    Skipped,
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepStatus::Applied => f.write_str("applied"),
            StepStatus::Skipped => f.write_str("skipped"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepRecord {
    pub step: MigrationStep,
    pub status: StepStatus,
}

/// What a migration run did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationOutcome {
    pub repository: String,
    /// Executed steps, in order. Empty when the repository was skipped.
    pub steps: Vec<StepRecord>,
    pub policies: PolicyCloneReport,
    pub updated_pipelines: Vec<String>,
    /// The repository has no default branch (it is empty)
    pub skipped_no_default_branch: bool,
}

impl MigrationOutcome {
    fn new(repository: &str) -> Self {
        MigrationOutcome {
            repository: repository.to_string(),
            steps: Vec::with_capacity(MigrationStep::ALL.len()),
            policies: PolicyCloneReport::default(),
            updated_pipelines: Vec::new(),
            skipped_no_default_branch: false,
        }
    }

    pub fn status(&self, step: MigrationStep) -> Option<StepStatus> {
        self.steps.iter().find(|r| r.step == step).map(|r| r.status)
    }

    /// No step changed anything.
    pub fn is_noop(&self) -> bool {
        self.steps.iter().all(|r| r.status == StepStatus::Skipped)
    }

    fn record(&mut self, step: MigrationStep, applied: bool) {
        let status = if applied {
            StepStatus::Applied
        } else {
            StepStatus::Skipped
        };
        emit_step(&self.repository, step, status);
        self.steps.push(StepRecord { step, status });
    }
}

/// What an explicit rollback did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RollbackOutcome {
    pub restored_default_branch: bool,
    pub deleted_mirroring_pipeline: bool,
    pub deleted_branch: bool,
}

/// Runs default-branch migrations against a hosting service.
#[derive(Clone)]
pub struct Migrator {
    git: Arc<dyn GitService>,
    build: Arc<dyn BuildService>,
    policy: Arc<dyn PolicyService>,
    options: MigrationOptions,
}

impl Migrator {
    pub fn new(
        git: Arc<dyn GitService>,
        build: Arc<dyn BuildService>,
        policy: Arc<dyn PolicyService>,
        options: MigrationOptions,
    ) -> Self {
        Migrator {
            git,
            build,
            policy,
            options,
        }
    }

    /// Build a migrator from one client implementing every service.
    pub fn from_service<S>(service: Arc<S>, options: MigrationOptions) -> Self
    where
        S: GitService + BuildService + PolicyService + 'static,
    {
        Migrator::new(service.clone(), service.clone(), service, options)
    }

    pub fn options(&self) -> &MigrationOptions {
        &self.options
    }

    /// Migrate `repository` from the old to the new default branch.
    pub async fn migrate(&self, repository: &Repository) -> Result<MigrationOutcome> {
        let started = Instant::now();
        async {
            emit_migration_started(
                &repository.name,
                self.options.old_branch.full_name(),
                self.options.new_branch.full_name(),
            );
            let result = self.run_steps(repository).await;
            emit_migration_finished(
                &repository.name,
                started.elapsed().as_millis() as u64,
                result.is_ok(),
            );
            result
        }
        .instrument(migration_span(&repository.name, "migrate"))
        .await
    }

    async fn run_steps(&self, repository: &Repository) -> Result<MigrationOutcome> {
        let old = &self.options.old_branch;
        let new = &self.options.new_branch;
        let state = RemoteState::new(self.git.as_ref(), self.build.as_ref());
        let refs = RefMutator::new(self.git.as_ref());

        let mut repository = state.repository(repository.id).await?;
        let mut outcome = MigrationOutcome::new(&repository.name);

        let Some(current) = repository.default_branch.clone() else {
            warn!("Repository has no default branch; skipping");
            outcome.skipped_no_default_branch = true;
            return Ok(outcome);
        };
        if !old.matches(&current) && !new.matches(&current) {
            return Err(MigrationError::UnexpectedDefaultBranch {
                repository: repository.name.clone(),
                expected: old.full_name().to_string(),
                actual: current,
            });
        }

        // 1. create the new branch at the old branch's head
        let create = RemoteState::is_default_branch(&repository, old)
            && !state.branch_exists(repository.id, new).await?;
        if create {
            let head = state.branch(repository.id, old).await?.head().clone();
            refs.create_branch(repository.id, new, head).await?;
        }
        outcome.record(MigrationStep::CreateBranch, create);

        // 2. switch the default branch
        let switch = RemoteState::is_default_branch(&repository, old);
        if switch {
            repository = refs.set_default_branch(repository.id, new).await?;
        }
        outcome.record(MigrationStep::SetDefaultBranch, switch);

        // 3. commit the mirror descriptor onto the new branch
        let publish = !state
            .root_file_exists(repository.id, MIRROR_FILE_PATH)
            .await?;
        if publish {
            MirrorPublisher::new(self.git.as_ref())
                .publish(repository.id, old, new, new)
                .await?;
        }
        outcome.record(MigrationStep::PublishMirrorFile, publish);

        // 4. create the pipeline that runs it
        let pipelines = PipelineManager::new(self.build.as_ref());
        let pipeline_name = mirroring_pipeline_name(&repository.name);
        let create_pipeline = state.find_pipeline(&repository, &pipeline_name).await?.is_none();
        if create_pipeline {
            pipelines
                .create_mirroring_pipeline(&repository, MIRROR_FILE_PATH, new)
                .await?;
        }
        outcome.record(MigrationStep::CreateMirroringPipeline, create_pipeline);

        // 5. clone branch policies; failures are isolated per policy
        outcome.policies = PolicyCloner::new(self.policy.as_ref())
            .clone_policies(&repository, old, new)
            .await?;
        if outcome.policies.has_failures() {
            warn!(
                rejected = outcome.policies.rejected.len(),
                failed = outcome.policies.failed.len(),
                "Some policies were not cloned"
            );
        }
        let cloned = !outcome.policies.cloned.is_empty();
        outcome.record(MigrationStep::ClonePolicies, cloned);

        // 6. retarget existing pipelines
        outcome.updated_pipelines = pipelines.update_pipelines(&repository, old, new).await?;
        let updated = !outcome.updated_pipelines.is_empty();
        outcome.record(MigrationStep::UpdatePipelines, updated);

        info!(
            applied = outcome
                .steps
                .iter()
                .filter(|r| r.status == StepStatus::Applied)
                .count(),
            "Migration complete"
        );
        Ok(outcome)
    }

    /// Undo the branch changes of a migration.
    ///
    /// Restores the old default branch if the new one is current, deletes
    /// the mirroring pipeline and then the new branch. Cloned policies and
    /// rewritten pipelines are left in place. Never run by `migrate`.
    pub async fn rollback(&self, repository: &Repository) -> Result<RollbackOutcome> {
        self.run_rollback(repository)
            .instrument(migration_span(&repository.name, "rollback"))
            .await
    }

    async fn run_rollback(&self, repository: &Repository) -> Result<RollbackOutcome> {
        let old = &self.options.old_branch;
        let new = &self.options.new_branch;
        let state = RemoteState::new(self.git.as_ref(), self.build.as_ref());
        let refs = RefMutator::new(self.git.as_ref());
        let mut outcome = RollbackOutcome::default();

        let repository = state.repository(repository.id).await?;

        if RemoteState::is_default_branch(&repository, new) {
            refs.set_default_branch(repository.id, old).await?;
            outcome.restored_default_branch = true;
        } else {
            debug!(default_branch = ?repository.default_branch, "Default branch not restored");
        }

        outcome.deleted_mirroring_pipeline = PipelineManager::new(self.build.as_ref())
            .delete_pipeline(&repository, &mirroring_pipeline_name(&repository.name))
            .await?;

        if state.branch_exists(repository.id, new).await? {
            let head = state.branch(repository.id, new).await?.head().clone();
            refs.delete_branch(repository.id, new, head).await?;
            outcome.deleted_branch = true;
        }

        info!(?outcome, "Rollback complete");
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_steps_in_execution_order() {
        let names: Vec<&str> = MigrationStep::ALL.iter().map(|s| s.as_str()).collect();
        assert_eq!(
            names,
            [
                "create_branch",
                "set_default_branch",
                "publish_mirror_file",
                "create_mirroring_pipeline",
                "clone_policies",
                "update_pipelines",
            ]
        );
    }

    #[test]
    fn test_outcome_status_lookup() {
        let mut outcome = MigrationOutcome::new("R");
        outcome.record(MigrationStep::CreateBranch, true);
        outcome.record(MigrationStep::SetDefaultBranch, false);

        assert_eq!(
            outcome.status(MigrationStep::CreateBranch),
            Some(StepStatus::Applied)
        );
        assert_eq!(
            outcome.status(MigrationStep::SetDefaultBranch),
            Some(StepStatus::Skipped)
        );
        assert_eq!(outcome.status(MigrationStep::UpdatePipelines), None);
        assert!(!outcome.is_noop());
    }

    #[test]
    fn test_step_status_serializes_snake_case() {
        let record = StepRecord {
            step: MigrationStep::PublishMirrorFile,
            status: StepStatus::Skipped,
        };
        assert_eq!(
            serde_json::to_value(&record).unwrap(),
            serde_json::json!({ "step": "publish_mirror_file", "status": "skipped" })
        );
    }
}
