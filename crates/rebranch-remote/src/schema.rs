//! Schema definitions for objects exchanged with the remote service
//!
//! Objects:
//! - repositories, branches and refs (version control)
//! - pushes carrying file content
//! - pipeline definitions and their triggers (build service)
//! - policy configurations and their scopes (policy service)
//!
//! Field names follow the service's camelCase wire format. Payloads whose
//! shape varies per type (policy settings, trigger bodies, unmodelled
//! definition fields) are kept as `serde_json` maps so they pass through a
//! read-modify-write cycle untouched.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::RemoteError;

/// Repository type tag for Git repositories hosted by the service.
pub const HOSTED_GIT_REPOSITORY_TYPE: &str = "TfsGit";

// ---------------------------------------------------------------------------
// Version control
// ---------------------------------------------------------------------------

/// Git object id (40 lowercase hex chars).
///
/// The all-zero id is a sentinel: as the expected previous value of a ref
/// update it means "must not exist yet"; as the new value it means "delete".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ObjectId(String);

impl ObjectId {
    /// The all-zero sentinel id.
    pub fn zero() -> Self {
        ObjectId("0".repeat(40))
    }

    pub fn is_zero(&self) -> bool {
        self.0.bytes().all(|b| b == b'0')
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short form (first 8 hex chars).
    pub fn short(&self) -> &str {
        &self.0[..8.min(self.0.len())]
    }
}

impl TryFrom<String> for ObjectId {
    type Error = RemoteError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        if s.len() != 40 || !s.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(RemoteError::Serialization(format!(
                "invalid object id: {s}"
            )));
        }
        Ok(ObjectId(s.to_ascii_lowercase()))
    }
}

impl TryFrom<&str> for ObjectId {
    type Error = RemoteError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        ObjectId::try_from(s.to_string())
    }
}

impl From<ObjectId> for String {
    fn from(id: ObjectId) -> Self {
        id.0
    }
}

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Project a repository belongs to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectReference {
    pub id: Uuid,
    pub name: String,
}

/// Hosted Git repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Repository {
    pub id: Uuid,
    pub name: String,
    pub project: ProjectReference,
    /// Fully-qualified ref of the default branch; `None` for empty repositories
    #[serde(default)]
    pub default_branch: Option<String>,
}

/// Commit a branch points at
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitRef {
    pub commit_id: ObjectId,
}

/// Branch as reported by the branch statistics endpoint.
///
/// `name` is the short branch name (`main`, not `refs/heads/main`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    pub name: String,
    pub commit: CommitRef,
}

impl Branch {
    pub fn new(name: impl Into<String>, head: ObjectId) -> Self {
        Branch {
            name: name.into(),
            commit: CommitRef { commit_id: head },
        }
    }

    /// Head commit of the branch.
    pub fn head(&self) -> &ObjectId {
        &self.commit.commit_id
    }
}

/// Compare-and-swap update of a single ref
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefUpdate {
    /// Fully-qualified ref name
    pub name: String,
    /// Value the ref must currently hold (zero = must not exist)
    pub old_object_id: ObjectId,
    /// Value to store (zero = delete)
    pub new_object_id: ObjectId,
}

impl RefUpdate {
    /// Create `name` at `target`; fails if the ref already exists.
    pub fn create(name: impl Into<String>, target: ObjectId) -> Self {
        RefUpdate {
            name: name.into(),
            old_object_id: ObjectId::zero(),
            new_object_id: target,
        }
    }

    /// Move `name` from `current` to `target`.
    pub fn advance(name: impl Into<String>, current: ObjectId, target: ObjectId) -> Self {
        RefUpdate {
            name: name.into(),
            old_object_id: current,
            new_object_id: target,
        }
    }

    /// Delete `name`, which must currently point at `current`.
    pub fn delete(name: impl Into<String>, current: ObjectId) -> Self {
        RefUpdate {
            name: name.into(),
            old_object_id: current,
            new_object_id: ObjectId::zero(),
        }
    }

    pub fn is_create(&self) -> bool {
        self.old_object_id.is_zero()
    }

    pub fn is_delete(&self) -> bool {
        self.new_object_id.is_zero()
    }
}

/// Per-ref outcome of a ref update request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefUpdateResult {
    pub name: String,
    pub new_object_id: ObjectId,
    pub success: bool,
    /// Service status code, e.g. `succeeded` or `staleOldObjectId`
    pub update_status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_message: Option<String>,
}

/// Depth of an item listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RecursionLevel {
    None,
    OneLevel,
    Full,
}

impl RecursionLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecursionLevel::None => "none",
            RecursionLevel::OneLevel => "oneLevel",
            RecursionLevel::Full => "full",
        }
    }
}

/// File or folder in a repository tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GitItem {
    /// Absolute path from the repository root, e.g. `/mirror.yml`
    pub path: String,
    #[serde(default)]
    pub is_folder: bool,
}

/// Kind of change carried by a pushed commit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChangeType {
    Add,
    Edit,
    Delete,
}

/// Target path of a change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeItem {
    pub path: String,
}

/// Inline file content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemContent {
    pub content: String,
    /// `rawtext` or `base64encoded`
    pub content_type: String,
}

/// Single file change inside a pushed commit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Change {
    pub change_type: ChangeType,
    pub item: ChangeItem,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_content: Option<ItemContent>,
}

impl Change {
    /// Add a new text file at `path`.
    pub fn add_text(path: impl Into<String>, content: impl Into<String>) -> Self {
        Change {
            change_type: ChangeType::Add,
            item: ChangeItem { path: path.into() },
            new_content: Some(ItemContent {
                content: content.into(),
                content_type: "rawtext".to_string(),
            }),
        }
    }
}

/// Commit created server-side as part of a push
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushCommit {
    pub comment: String,
    pub changes: Vec<Change>,
}

/// Ref a push advances; the new value is the commit the push creates
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushRef {
    pub name: String,
    pub old_object_id: ObjectId,
}

/// One or more commits applied on top of the given refs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Push {
    pub ref_updates: Vec<PushRef>,
    pub commits: Vec<PushCommit>,
}

// ---------------------------------------------------------------------------
// Build service
// ---------------------------------------------------------------------------

/// Lightweight pipeline definition entry returned by name lookups
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefinitionReference {
    pub id: u32,
    pub name: String,
}

/// Source repository bound to a pipeline definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineRepository {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_branch: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Full pipeline definition.
///
/// Only the fields the migration touches are typed; everything else
/// (variables, queue, revision, links) lives in `extra` and is sent back
/// verbatim on update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u32>,
    pub name: String,
    pub repository: PipelineRepository,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub process: Option<Value>,
    #[serde(default)]
    pub triggers: Vec<Trigger>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PipelineDefinition {
    /// New build definition driven by a YAML descriptor at `yaml_path`.
    pub fn yaml(name: impl Into<String>, repository: PipelineRepository, yaml_path: &str) -> Self {
        let mut extra = Map::new();
        extra.insert("type".to_string(), Value::String("build".to_string()));
        PipelineDefinition {
            id: None,
            name: name.into(),
            repository,
            process: Some(serde_json::json!({ "type": 2, "yamlFilename": yaml_path })),
            triggers: Vec::new(),
            extra,
        }
    }

    /// YAML file the definition runs, if it is descriptor-driven.
    pub fn yaml_filename(&self) -> Option<&str> {
        self.process
            .as_ref()
            .and_then(|p| p.get("yamlFilename"))
            .and_then(Value::as_str)
    }
}

/// Trigger with a list of branch filters (`+refs/heads/main`, `-refs/heads/tmp/*`)
///
/// `fields` keeps the full original object, including its `branchFilters`
/// key, so the serialized form retains the original key order.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterTrigger {
    pub branch_filters: Vec<String>,
    fields: Map<String, Value>,
}

impl FilterTrigger {
    pub fn new(trigger_type: &str, branch_filters: Vec<String>) -> Self {
        let mut fields = Map::new();
        fields.insert(
            "triggerType".to_string(),
            Value::String(trigger_type.to_string()),
        );
        FilterTrigger {
            branch_filters,
            fields,
        }
    }

    /// Any field other than the branch filters.
    pub fn field(&self, key: &str) -> Option<&Value> {
        if key == "branchFilters" {
            return None;
        }
        self.fields.get(key)
    }
}

/// Pipeline trigger
///
/// The two kinds carrying branch filters are modelled; every other kind
/// (schedules, gated check-in, build completion) is kept as raw JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Value", into = "Value")]
pub enum Trigger {
    ContinuousIntegration(FilterTrigger),
    PullRequest(FilterTrigger),
    Other(Value),
}

impl Trigger {
    pub const CONTINUOUS_INTEGRATION: &'static str = "continuousIntegration";
    pub const PULL_REQUEST: &'static str = "pullRequest";

    pub fn continuous_integration(branch_filters: Vec<String>) -> Self {
        Trigger::ContinuousIntegration(FilterTrigger::new(
            Self::CONTINUOUS_INTEGRATION,
            branch_filters,
        ))
    }

    pub fn pull_request(branch_filters: Vec<String>) -> Self {
        Trigger::PullRequest(FilterTrigger::new(Self::PULL_REQUEST, branch_filters))
    }

    /// Branch filters of the trigger kinds that carry them.
    pub fn branch_filters_mut(&mut self) -> Option<&mut Vec<String>> {
        match self {
            Trigger::ContinuousIntegration(t) | Trigger::PullRequest(t) => {
                Some(&mut t.branch_filters)
            }
            Trigger::Other(_) => None,
        }
    }

    pub fn branch_filters(&self) -> Option<&[String]> {
        match self {
            Trigger::ContinuousIntegration(t) | Trigger::PullRequest(t) => {
                Some(&t.branch_filters)
            }
            Trigger::Other(_) => None,
        }
    }
}

impl From<Value> for Trigger {
    fn from(value: Value) -> Self {
        let Value::Object(fields) = value else {
            return Trigger::Other(value);
        };
        let kind = fields.get("triggerType").and_then(Value::as_str);
        let is_ci = kind == Some(Self::CONTINUOUS_INTEGRATION);
        if !is_ci && kind != Some(Self::PULL_REQUEST) {
            return Trigger::Other(Value::Object(fields));
        }

        let branch_filters = match fields.get("branchFilters") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => {
                let filters: Option<Vec<String>> = items
                    .iter()
                    .map(|v| v.as_str().map(str::to_string))
                    .collect();
                match filters {
                    Some(filters) => filters,
                    None => return Trigger::Other(Value::Object(fields)),
                }
            }
            Some(_) => return Trigger::Other(Value::Object(fields)),
        };

        let trigger = FilterTrigger {
            branch_filters,
            fields,
        };
        if is_ci {
            Trigger::ContinuousIntegration(trigger)
        } else {
            Trigger::PullRequest(trigger)
        }
    }
}

impl From<Trigger> for Value {
    fn from(trigger: Trigger) -> Self {
        match trigger {
            Trigger::ContinuousIntegration(t) | Trigger::PullRequest(t) => {
                let mut fields = t.fields;
                // An empty list leaves a missing or null key as it was received.
                let absent = matches!(fields.get("branchFilters"), None | Some(Value::Null));
                if !(absent && t.branch_filters.is_empty()) {
                    fields.insert(
                        "branchFilters".to_string(),
                        Value::Array(t.branch_filters.into_iter().map(Value::String).collect()),
                    );
                }
                Value::Object(fields)
            }
            Trigger::Other(value) => value,
        }
    }
}

// ---------------------------------------------------------------------------
// Policy service
// ---------------------------------------------------------------------------

/// Reference to a policy type (required reviewers, build validation, ...)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyTypeRef {
    pub id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

/// One entry of a policy's scope list.
///
/// An entry with a `refName` applies to that ref (or ref prefix); an entry
/// without one applies repository- or project-wide. The entry is stored as
/// the raw JSON object so untouched entries serialize exactly as received.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PolicyScope(Map<String, Value>);

impl PolicyScope {
    /// Scope matching a single ref in the given repository.
    pub fn for_ref(repository_id: Uuid, ref_name: &str) -> Self {
        let mut fields = Map::new();
        fields.insert(
            "repositoryId".to_string(),
            Value::String(repository_id.to_string()),
        );
        fields.insert("refName".to_string(), Value::String(ref_name.to_string()));
        fields.insert("matchKind".to_string(), Value::String("Exact".to_string()));
        PolicyScope(fields)
    }

    /// Scope without a ref matcher (repository- or project-wide).
    pub fn repository_wide(repository_id: Option<Uuid>) -> Self {
        let mut fields = Map::new();
        fields.insert(
            "repositoryId".to_string(),
            repository_id
                .map(|id| Value::String(id.to_string()))
                .unwrap_or(Value::Null),
        );
        PolicyScope(fields)
    }

    /// Ref matcher, if the entry carries one.
    pub fn ref_name(&self) -> Option<&str> {
        self.0.get("refName").and_then(Value::as_str)
    }

    pub fn set_ref_name(&mut self, ref_name: &str) {
        self.0
            .insert("refName".to_string(), Value::String(ref_name.to_string()));
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

/// Policy settings: a typed scope list plus the type-specific remainder
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PolicySettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<Vec<PolicyScope>>,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

impl PolicySettings {
    pub fn scopes(&self) -> &[PolicyScope] {
        self.scope.as_deref().unwrap_or(&[])
    }

    pub fn scopes_mut(&mut self) -> &mut [PolicyScope] {
        self.scope.as_deref_mut().unwrap_or(&mut [])
    }
}

/// Branch protection policy configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyConfiguration {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u32>,
    #[serde(rename = "type")]
    pub policy_type: PolicyTypeRef,
    pub is_enabled: bool,
    pub is_blocking: bool,
    #[serde(default)]
    pub is_deleted: bool,
    pub settings: PolicySettings,
    /// Server bookkeeping (revision, created by/date, links)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_object_id_validation() {
        assert!(ObjectId::try_from("a".repeat(40)).is_ok());
        assert!(ObjectId::try_from("abc").is_err());
        assert!(ObjectId::try_from("z".repeat(40)).is_err());
        assert!(ObjectId::zero().is_zero());
        assert_eq!(ObjectId::zero().as_str().len(), 40);
    }

    #[test]
    fn test_object_id_is_lowercased() {
        let id = ObjectId::try_from("ABCDEF".repeat(6) + "ABCD").unwrap();
        assert_eq!(id.as_str(), "abcdef".repeat(6) + "abcd");
    }

    #[test]
    fn test_trigger_kinds_from_json() {
        let ci: Trigger = serde_json::from_value(json!({
            "triggerType": "continuousIntegration",
            "branchFilters": ["+refs/heads/master"],
            "batchChanges": false
        }))
        .unwrap();
        assert!(matches!(ci, Trigger::ContinuousIntegration(_)));
        assert_eq!(ci.branch_filters().unwrap(), ["+refs/heads/master"]);

        let pr: Trigger = serde_json::from_value(json!({
            "triggerType": "pullRequest",
            "branchFilters": ["+refs/heads/*"]
        }))
        .unwrap();
        assert!(matches!(pr, Trigger::PullRequest(_)));

        let schedule: Trigger = serde_json::from_value(json!({
            "triggerType": "schedule",
            "schedules": []
        }))
        .unwrap();
        assert!(matches!(schedule, Trigger::Other(_)));
    }

    #[test]
    fn test_trigger_keeps_unmodelled_fields() {
        let raw = json!({
            "triggerType": "continuousIntegration",
            "branchFilters": ["+refs/heads/master"],
            "pathFilters": ["+/src"],
            "maxConcurrentBuildsPerBranch": 1
        });
        let mut trigger: Trigger = serde_json::from_value(raw).unwrap();
        trigger.branch_filters_mut().unwrap()[0] = "+refs/heads/main".to_string();

        let out = serde_json::to_value(&trigger).unwrap();
        assert_eq!(
            out,
            json!({
                "triggerType": "continuousIntegration",
                "branchFilters": ["+refs/heads/main"],
                "pathFilters": ["+/src"],
                "maxConcurrentBuildsPerBranch": 1
            })
        );
    }

    #[test]
    fn test_trigger_without_filters_serializes_as_received() {
        for raw in [
            json!({ "triggerType": "continuousIntegration", "settingsSourceType": 2 }),
            json!({ "triggerType": "pullRequest", "branchFilters": null, "forks": {} }),
            json!({ "triggerType": "pullRequest", "branchFilters": [] }),
        ] {
            let trigger: Trigger = serde_json::from_value(raw.clone()).unwrap();
            assert_eq!(trigger.branch_filters().unwrap().len(), 0);
            assert_eq!(serde_json::to_value(&trigger).unwrap(), raw);
        }
    }

    #[test]
    fn test_filters_added_to_trigger_without_key_are_written() {
        let mut trigger: Trigger = serde_json::from_value(json!({
            "triggerType": "continuousIntegration",
            "settingsSourceType": 2
        }))
        .unwrap();
        trigger
            .branch_filters_mut()
            .unwrap()
            .push("+refs/heads/main".to_string());

        let out = serde_json::to_value(&trigger).unwrap();
        assert_eq!(out["branchFilters"], json!(["+refs/heads/main"]));
        assert_eq!(out["settingsSourceType"], json!(2));
    }

    #[test]
    fn test_ci_and_pr_kinds_are_not_swapped() {
        let ci: Trigger =
            serde_json::from_value(json!({ "triggerType": "continuousIntegration" })).unwrap();
        let pr: Trigger = serde_json::from_value(json!({ "triggerType": "pullRequest" })).unwrap();
        assert!(matches!(ci, Trigger::ContinuousIntegration(_)));
        assert!(matches!(pr, Trigger::PullRequest(_)));
    }

    #[test]
    fn test_malformed_filters_fall_back_to_other() {
        let trigger: Trigger = serde_json::from_value(json!({
            "triggerType": "continuousIntegration",
            "branchFilters": [1, 2]
        }))
        .unwrap();
        assert!(matches!(trigger, Trigger::Other(_)));
    }

    #[test]
    fn test_policy_settings_scope_accessors() {
        let settings: PolicySettings = serde_json::from_value(json!({
            "minimumApproverCount": 2,
            "scope": [
                { "refName": "refs/heads/master", "matchKind": "Exact", "repositoryId": "x" },
                { "repositoryId": null }
            ]
        }))
        .unwrap();

        assert_eq!(settings.scopes().len(), 2);
        assert_eq!(settings.scopes()[0].ref_name(), Some("refs/heads/master"));
        assert_eq!(settings.scopes()[1].ref_name(), None);
        assert_eq!(settings.rest["minimumApproverCount"], json!(2));
    }

    #[test]
    fn test_policy_settings_without_scope() {
        let settings: PolicySettings =
            serde_json::from_value(json!({ "buildDefinitionId": 7 })).unwrap();
        assert!(settings.scopes().is_empty());
        let out = serde_json::to_value(&settings).unwrap();
        assert_eq!(out, json!({ "buildDefinitionId": 7 }));
    }

    #[test]
    fn test_pipeline_definition_passes_extra_through() {
        let raw = json!({
            "id": 12,
            "name": "CI",
            "revision": 4,
            "queue": { "id": 9 },
            "repository": {
                "id": "5f1c",
                "name": "R",
                "type": "TfsGit",
                "defaultBranch": "refs/heads/master",
                "clean": "true"
            },
            "triggers": []
        });
        let def: PipelineDefinition = serde_json::from_value(raw).unwrap();
        assert_eq!(def.extra["revision"], json!(4));
        assert_eq!(def.repository.extra["clean"], json!("true"));

        let out = serde_json::to_value(&def).unwrap();
        assert_eq!(out["queue"], json!({ "id": 9 }));
        assert_eq!(out["repository"]["defaultBranch"], json!("refs/heads/master"));
    }

    #[test]
    fn test_yaml_definition_shape() {
        let repo = PipelineRepository {
            id: None,
            name: "R".to_string(),
            kind: HOSTED_GIT_REPOSITORY_TYPE.to_string(),
            default_branch: None,
            extra: Map::new(),
        };
        let def = PipelineDefinition::yaml("R mirroring pipeline", repo, "/mirror.yml");
        assert_eq!(def.yaml_filename(), Some("/mirror.yml"));
        let out = serde_json::to_value(&def).unwrap();
        assert_eq!(out["type"], json!("build"));
        assert_eq!(out["repository"]["type"], json!("TfsGit"));
    }

    #[test]
    fn test_ref_update_constructors() {
        let head = ObjectId::try_from("1".repeat(40)).unwrap();
        assert!(RefUpdate::create("refs/heads/main", head.clone()).is_create());
        assert!(RefUpdate::delete("refs/heads/main", head.clone()).is_delete());
        let moved = RefUpdate::advance("refs/heads/main", head.clone(), head);
        assert!(!moved.is_create() && !moved.is_delete());
    }
}
