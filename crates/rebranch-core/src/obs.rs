//! Structured observability hooks for migration lifecycle events.
//!
//! This module provides:
//! - Repository-scoped tracing spans via `migration_span`
//! - Emission functions for key lifecycle events: start, step, policy rejection, finish
//!
//! Events are emitted at `info!` level; rejections and failures at `warn!`.

use tracing::{info, warn};

use crate::workflow::{MigrationStep, StepStatus};

/// Span scoping every event of one migration or rollback to its repository.
///
/// Attach it to the operation's future with `tracing::Instrument`:
///
/// ```ignore
/// run(repository).instrument(migration_span("R", "migrate")).await
/// ```
pub fn migration_span(repository: &str, operation: &str) -> tracing::Span {
    tracing::info_span!(
        "rebranch.migration",
        repository = %repository,
        operation = %operation
    )
}

/// Emit event: migration started.
pub fn emit_migration_started(repository: &str, old_branch: &str, new_branch: &str) {
    info!(
        event = "migration.started",
        repository = %repository,
        old_branch = %old_branch,
        new_branch = %new_branch,
    );
}

/// Emit event: a workflow step was applied or skipped.
pub fn emit_step(repository: &str, step: MigrationStep, status: StepStatus) {
    info!(
        event = "migration.step",
        repository = %repository,
        step = %step,
        status = %status,
    );
}

/// Emit event: a cloned policy was rejected by the service (warning level).
pub fn emit_policy_rejected(repository: &str, policy_id: u32, policy_type: &str) {
    warn!(
        event = "policy.rejected",
        repository = %repository,
        policy_id = policy_id,
        policy_type = %policy_type,
    );
}

/// Emit event: migration finished with duration and success status.
pub fn emit_migration_finished(repository: &str, duration_ms: u64, success: bool) {
    info!(
        event = "migration.finished",
        repository = %repository,
        duration_ms = duration_ms,
        success = success,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migration_span_is_named() {
        let span = migration_span("R", "migrate");
        let _entered = span.enter();
        emit_migration_started("R", "refs/heads/master", "refs/heads/main");
    }
}
