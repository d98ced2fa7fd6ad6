//! Pipeline definition management.
//!
//! Creates the mirroring pipeline and rewrites branch references in every
//! existing definition bound to the repository.

use rebranch_remote::{
    BuildService, PipelineDefinition, PipelineRepository, Repository, Trigger,
    HOSTED_GIT_REPOSITORY_TYPE,
};
use serde_json::Map;
use tracing::{debug, error, info};

use crate::error::Result;
use crate::refs::BranchRef;

/// Name of the mirroring pipeline for a repository.
pub fn mirroring_pipeline_name(repository_name: &str) -> String {
    format!("{repository_name} mirroring pipeline")
}

/// Replace `old` with `new` in a trigger branch filter.
///
/// Returns `None` when the filter does not reference `old`.
pub fn rewrite_branch_filter(filter: &str, old: &BranchRef, new: &BranchRef) -> Option<String> {
    filter
        .contains(old.full_name())
        .then(|| filter.replace(old.full_name(), new.full_name()))
}

/// Retarget a definition's default branch and trigger filters in place.
///
/// Returns whether anything changed.
pub fn rewrite_definition(
    definition: &mut PipelineDefinition,
    old: &BranchRef,
    new: &BranchRef,
) -> bool {
    let mut changed = false;

    if definition.repository.default_branch.as_deref() == Some(old.full_name()) {
        definition.repository.default_branch = Some(new.full_name().to_string());
        changed = true;
    }

    for trigger in &mut definition.triggers {
        if let Trigger::Other(raw) = trigger {
            debug!(
                pipeline = %definition.name,
                trigger_type = raw.get("triggerType").and_then(|t| t.as_str()).unwrap_or("unknown"),
                "Trigger not processed"
            );
            continue;
        }
        let Some(filters) = trigger.branch_filters_mut() else {
            continue;
        };
        for filter in filters.iter_mut() {
            if let Some(rewritten) = rewrite_branch_filter(filter, old, new) {
                *filter = rewritten;
                changed = true;
            }
        }
    }

    changed
}

/// Creates, updates and deletes pipeline definitions of one repository.
pub struct PipelineManager<'a> {
    build: &'a dyn BuildService,
}

impl<'a> PipelineManager<'a> {
    pub fn new(build: &'a dyn BuildService) -> Self {
        PipelineManager { build }
    }

    /// Create the descriptor-driven pipeline that runs `mirror_file_path`.
    pub async fn create_mirroring_pipeline(
        &self,
        repository: &Repository,
        mirror_file_path: &str,
        default_branch: &BranchRef,
    ) -> Result<PipelineDefinition> {
        let binding = PipelineRepository {
            id: Some(repository.id.to_string()),
            name: repository.name.clone(),
            kind: HOSTED_GIT_REPOSITORY_TYPE.to_string(),
            default_branch: Some(default_branch.full_name().to_string()),
            extra: Map::new(),
        };
        let definition = PipelineDefinition::yaml(
            mirroring_pipeline_name(&repository.name),
            binding,
            mirror_file_path,
        );

        match self
            .build
            .create_definition(&repository.project.name, definition)
            .await
        {
            Ok(created) => {
                info!(pipeline = %created.name, id = ?created.id, "Created mirroring pipeline");
                Ok(created)
            }
            Err(e) => {
                if e.is_unauthorized() {
                    error!(
                        repository = %repository.name,
                        error = %e,
                        "Not authorized to create the mirroring pipeline"
                    );
                }
                Err(e.into())
            }
        }
    }

    /// Delete the pipeline named `name`, returning whether one existed.
    pub async fn delete_pipeline(&self, repository: &Repository, name: &str) -> Result<bool> {
        let definitions = self
            .build
            .find_definitions(repository.project.id, name)
            .await?;
        let Some(definition) = definitions.first() else {
            return Ok(false);
        };
        self.build
            .delete_definition(repository.project.id, definition.id)
            .await?;
        info!(pipeline = %name, id = definition.id, "Deleted pipeline");
        Ok(true)
    }

    /// Rewrite `old` to `new` across every pipeline bound to the repository.
    ///
    /// Only definitions that actually changed are sent back. Returns their
    /// names.
    pub async fn update_pipelines(
        &self,
        repository: &Repository,
        old: &BranchRef,
        new: &BranchRef,
    ) -> Result<Vec<String>> {
        let definitions = self
            .build
            .list_full_definitions(
                repository.project.id,
                repository.id,
                HOSTED_GIT_REPOSITORY_TYPE,
            )
            .await?;

        let mut updated = Vec::new();
        for mut definition in definitions {
            if !rewrite_definition(&mut definition, old, new) {
                debug!(pipeline = %definition.name, "Pipeline already up to date");
                continue;
            }
            let definition = self
                .build
                .update_definition(&repository.project.name, definition)
                .await?;
            info!(pipeline = %definition.name, "Updated pipeline");
            updated.push(definition.name);
        }
        Ok(updated)
    }
}
