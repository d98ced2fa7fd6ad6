//! In-memory fakes for the remote service traits (testing only)
//!
//! `MemoryDevOps` implements `GitService`, `BuildService` and
//! `PolicyService` against a single shared state, so a migration driven
//! through it observes its own earlier writes the way it would against the
//! real service. It enforces compare-and-swap ref semantics, rejects direct
//! pushes to refs guarded by an enabled blocking policy, and records every
//! mutating call for idempotence assertions.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::RemoteError;
use crate::schema::*;
use crate::service_traits::*;

const HEADS_PREFIX: &str = "refs/heads/";

fn full_ref(name: &str) -> String {
    if name.starts_with(HEADS_PREFIX) {
        name.to_string()
    } else {
        format!("{HEADS_PREFIX}{name}")
    }
}

#[derive(Debug)]
struct RepoState {
    repository: Repository,
    refs: BTreeMap<String, ObjectId>,
}

#[derive(Debug, Default)]
struct State {
    repos: HashMap<Uuid, RepoState>,
    /// Tree of every commit: path -> content
    commits: HashMap<ObjectId, BTreeMap<String, String>>,
    next_commit: u64,
    definitions: BTreeMap<u32, (Uuid, PipelineDefinition)>,
    next_definition_id: u32,
    policies: Vec<(Uuid, PolicyConfiguration)>,
    next_policy_id: u32,
    rejected_policy_types: HashSet<Uuid>,
    deny_build_writes: bool,
    mutations: Vec<String>,
}

impl State {
    fn new_commit(&mut self, tree: BTreeMap<String, String>) -> ObjectId {
        self.next_commit += 1;
        let id = ObjectId::try_from(format!("{:040x}", self.next_commit))
            .unwrap_or_else(|_| ObjectId::zero());
        self.commits.insert(id.clone(), tree);
        id
    }

    fn repo(&self, repository_id: Uuid) -> Result<&RepoState, RemoteError> {
        self.repos
            .get(&repository_id)
            .ok_or_else(|| RemoteError::not_found("Repository", repository_id.to_string()))
    }

    fn repo_mut(&mut self, repository_id: Uuid) -> Result<&mut RepoState, RemoteError> {
        self.repos
            .get_mut(&repository_id)
            .ok_or_else(|| RemoteError::not_found("Repository", repository_id.to_string()))
    }

    /// Accepts a project id or a project name.
    fn resolve_project(&self, project: &str) -> Result<Uuid, RemoteError> {
        self.repos
            .values()
            .map(|r| &r.repository.project)
            .find(|p| p.name == project || p.id.to_string() == project)
            .map(|p| p.id)
            .ok_or_else(|| RemoteError::not_found("Project", project))
    }

    fn ref_is_protected(&self, repository_id: Uuid, ref_name: &str) -> bool {
        self.policies.iter().any(|(_, policy)| {
            policy.is_enabled
                && policy.is_blocking
                && !policy.is_deleted
                && policy.settings.scopes().iter().any(|scope| {
                    scope.ref_name() == Some(ref_name) && scope_repository_matches(scope, repository_id)
                })
        })
    }
}

fn scope_repository_matches(scope: &PolicyScope, repository_id: Uuid) -> bool {
    match scope.as_map().get("repositoryId") {
        None | Some(serde_json::Value::Null) => true,
        Some(value) => value.as_str() == Some(repository_id.to_string().as_str()),
    }
}

/// In-memory hosting service covering repositories, pipelines and policies.
#[derive(Debug, Default)]
pub struct MemoryDevOps {
    state: Mutex<State>,
}

impl MemoryDevOps {
    pub fn new() -> Self {
        Self::default()
    }

    // -- seeding ------------------------------------------------------------

    /// Add a repository. When `default_branch` is given, the branch is created
    /// with an initial commit containing `/README.md`.
    pub fn add_repository(
        &self,
        name: &str,
        project: &str,
        default_branch: Option<&str>,
    ) -> Repository {
        let mut state = self.state.lock().unwrap();
        let project_id = state
            .repos
            .values()
            .map(|r| &r.repository.project)
            .find(|p| p.name == project)
            .map(|p| p.id)
            .unwrap_or_else(Uuid::new_v4);

        let repository = Repository {
            id: Uuid::new_v4(),
            name: name.to_string(),
            project: ProjectReference {
                id: project_id,
                name: project.to_string(),
            },
            default_branch: default_branch.map(full_ref),
        };

        let mut refs = BTreeMap::new();
        if let Some(branch) = default_branch {
            let mut tree = BTreeMap::new();
            tree.insert("/README.md".to_string(), format!("# {name}\n"));
            let head = state.new_commit(tree);
            refs.insert(full_ref(branch), head);
        }

        state.repos.insert(
            repository.id,
            RepoState {
                repository: repository.clone(),
                refs,
            },
        );
        repository
    }

    /// Add a branch pointing at the head of `from`.
    pub fn add_branch(&self, repository_id: Uuid, name: &str, from: &str) -> ObjectId {
        let mut state = self.state.lock().unwrap();
        let repo = state.repo_mut(repository_id).unwrap();
        let head = repo.refs[&full_ref(from)].clone();
        repo.refs.insert(full_ref(name), head.clone());
        head
    }

    /// Add a pipeline definition without recording a mutation.
    pub fn add_definition(&self, project: &str, mut definition: PipelineDefinition) -> PipelineDefinition {
        let mut state = self.state.lock().unwrap();
        let project_id = state.resolve_project(project).unwrap();
        state.next_definition_id += 1;
        let id = state.next_definition_id;
        definition.id = Some(id);
        state.definitions.insert(id, (project_id, definition.clone()));
        definition
    }

    /// Add a policy configuration without recording a mutation.
    pub fn add_policy(&self, project: &str, mut policy: PolicyConfiguration) -> PolicyConfiguration {
        let mut state = self.state.lock().unwrap();
        let project_id = state.resolve_project(project).unwrap();
        state.next_policy_id += 1;
        policy.id = Some(state.next_policy_id);
        state.policies.push((project_id, policy.clone()));
        policy
    }

    // -- fault injection ----------------------------------------------------

    /// Reject creation of any policy of this type as "rejected by policy".
    pub fn reject_policy_type(&self, type_id: Uuid) {
        self.state.lock().unwrap().rejected_policy_types.insert(type_id);
    }

    /// Fail every pipeline definition write with `Unauthorized`.
    pub fn deny_build_writes(&self) {
        self.state.lock().unwrap().deny_build_writes = true;
    }

    // -- inspection ---------------------------------------------------------

    /// Names of the mutating calls made through the service traits, in order.
    pub fn mutations(&self) -> Vec<String> {
        self.state.lock().unwrap().mutations.clone()
    }

    pub fn mutation_count(&self) -> usize {
        self.state.lock().unwrap().mutations.len()
    }

    pub fn repository(&self, repository_id: Uuid) -> Option<Repository> {
        let state = self.state.lock().unwrap();
        state.repos.get(&repository_id).map(|r| r.repository.clone())
    }

    pub fn branch_head(&self, repository_id: Uuid, name: &str) -> Option<ObjectId> {
        let state = self.state.lock().unwrap();
        state
            .repos
            .get(&repository_id)
            .and_then(|r| r.refs.get(&full_ref(name)).cloned())
    }

    /// Content of `path` at the head of `branch`.
    pub fn file_content(&self, repository_id: Uuid, branch: &str, path: &str) -> Option<String> {
        let state = self.state.lock().unwrap();
        let head = state.repos.get(&repository_id)?.refs.get(&full_ref(branch))?;
        state.commits.get(head)?.get(path).cloned()
    }

    pub fn definitions(&self) -> Vec<PipelineDefinition> {
        let state = self.state.lock().unwrap();
        state.definitions.values().map(|(_, d)| d.clone()).collect()
    }

    pub fn policies(&self) -> Vec<PolicyConfiguration> {
        let state = self.state.lock().unwrap();
        state.policies.iter().map(|(_, p)| p.clone()).collect()
    }
}

#[async_trait]
impl GitService for MemoryDevOps {
    async fn list_repositories(&self) -> RemoteResult<Vec<Repository>> {
        let state = self.state.lock().unwrap();
        let mut repos: Vec<Repository> =
            state.repos.values().map(|r| r.repository.clone()).collect();
        repos.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(repos)
    }

    async fn get_repository(&self, repository_id: Uuid) -> RemoteResult<Repository> {
        let state = self.state.lock().unwrap();
        Ok(state.repo(repository_id)?.repository.clone())
    }

    async fn update_default_branch(
        &self,
        repository_id: Uuid,
        default_branch: &str,
    ) -> RemoteResult<Repository> {
        let mut state = self.state.lock().unwrap();
        state.mutations.push("update_default_branch".to_string());
        let repo = state.repo_mut(repository_id)?;
        if !repo.refs.contains_key(default_branch) {
            return Err(RemoteError::not_found("Branch", default_branch));
        }
        repo.repository.default_branch = Some(default_branch.to_string());
        Ok(repo.repository.clone())
    }

    async fn get_branch(&self, repository_id: Uuid, name: &str) -> RemoteResult<Branch> {
        let state = self.state.lock().unwrap();
        let repo = state.repo(repository_id)?;
        let full = full_ref(name);
        repo.refs
            .get(&full)
            .map(|head| Branch::new(&full[HEADS_PREFIX.len()..], head.clone()))
            .ok_or_else(|| RemoteError::not_found("Branch", name))
    }

    async fn list_branches(&self, repository_id: Uuid) -> RemoteResult<Vec<Branch>> {
        let state = self.state.lock().unwrap();
        let repo = state.repo(repository_id)?;
        Ok(repo
            .refs
            .iter()
            .filter_map(|(name, head)| {
                name.strip_prefix(HEADS_PREFIX)
                    .map(|short| Branch::new(short, head.clone()))
            })
            .collect())
    }

    async fn update_refs(
        &self,
        repository_id: Uuid,
        updates: Vec<RefUpdate>,
    ) -> RemoteResult<Vec<RefUpdateResult>> {
        let mut state = self.state.lock().unwrap();
        state.mutations.push("update_refs".to_string());
        let known_commits: HashSet<ObjectId> = state.commits.keys().cloned().collect();
        let repo = state.repo_mut(repository_id)?;

        let mut results = Vec::with_capacity(updates.len());
        for update in updates {
            let current = repo.refs.get(&update.name);
            let status = match current {
                None if !update.old_object_id.is_zero() => "staleOldObjectId",
                Some(_) if update.old_object_id.is_zero() => "staleOldObjectId",
                Some(head) if *head != update.old_object_id => "staleOldObjectId",
                _ if !update.new_object_id.is_zero()
                    && !known_commits.contains(&update.new_object_id) =>
                {
                    "invalidObjectId"
                }
                _ => "succeeded",
            };

            let success = status == "succeeded";
            if success {
                if update.new_object_id.is_zero() {
                    repo.refs.remove(&update.name);
                } else {
                    repo.refs
                        .insert(update.name.clone(), update.new_object_id.clone());
                }
            }
            results.push(RefUpdateResult {
                name: update.name,
                new_object_id: update.new_object_id,
                success,
                update_status: status.to_string(),
                custom_message: None,
            });
        }
        Ok(results)
    }

    async fn list_items(
        &self,
        repository_id: Uuid,
        scope_path: &str,
        recursion: RecursionLevel,
    ) -> RemoteResult<Vec<GitItem>> {
        let state = self.state.lock().unwrap();
        let repo = state.repo(repository_id)?;
        let Some(head) = repo
            .repository
            .default_branch
            .as_ref()
            .and_then(|b| repo.refs.get(b))
        else {
            return Ok(Vec::new());
        };
        let tree = &state.commits[head];

        let scope = scope_path.trim_end_matches('/');
        let mut items = vec![GitItem {
            path: if scope.is_empty() { "/".to_string() } else { scope.to_string() },
            is_folder: true,
        }];
        if recursion == RecursionLevel::None {
            return Ok(items);
        }

        let mut folders = HashSet::new();
        for path in tree.keys() {
            let Some(rest) = path.strip_prefix(&format!("{scope}/")) else {
                continue;
            };
            match (recursion, rest.split_once('/')) {
                (RecursionLevel::OneLevel, Some((folder, _))) => {
                    if folders.insert(folder.to_string()) {
                        items.push(GitItem {
                            path: format!("{scope}/{folder}"),
                            is_folder: true,
                        });
                    }
                }
                _ => items.push(GitItem {
                    path: path.clone(),
                    is_folder: false,
                }),
            }
        }
        Ok(items)
    }

    async fn create_push(&self, repository_id: Uuid, push: Push) -> RemoteResult<()> {
        let mut state = self.state.lock().unwrap();
        state.mutations.push("create_push".to_string());

        for push_ref in &push.ref_updates {
            let current = state.repo(repository_id)?.refs.get(&push_ref.name).cloned();
            if current.as_ref() != Some(&push_ref.old_object_id) {
                return Err(RemoteError::RefUpdateRejected {
                    name: push_ref.name.clone(),
                    status: "staleOldObjectId".to_string(),
                });
            }
            if state.ref_is_protected(repository_id, &push_ref.name) {
                return Err(RemoteError::PolicyRejected(format!(
                    "TF402455: Pushes to {} are not permitted; you must use a pull request",
                    push_ref.name
                )));
            }
        }

        for push_ref in push.ref_updates {
            let mut tree = state.commits[&push_ref.old_object_id].clone();
            for commit in &push.commits {
                for change in &commit.changes {
                    let path = change.item.path.clone();
                    match change.change_type {
                        ChangeType::Add if tree.contains_key(&path) => {
                            return Err(RemoteError::Service {
                                status: 409,
                                message: format!("{path} already exists"),
                            });
                        }
                        ChangeType::Add | ChangeType::Edit => {
                            let content = change
                                .new_content
                                .as_ref()
                                .map(|c| c.content.clone())
                                .unwrap_or_default();
                            tree.insert(path, content);
                        }
                        ChangeType::Delete => {
                            tree.remove(&path);
                        }
                    }
                }
            }
            let head = state.new_commit(tree);
            state.repo_mut(repository_id)?.refs.insert(push_ref.name, head);
        }
        Ok(())
    }
}

#[async_trait]
impl BuildService for MemoryDevOps {
    async fn find_definitions(
        &self,
        project_id: Uuid,
        name: &str,
    ) -> RemoteResult<Vec<DefinitionReference>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .definitions
            .iter()
            .filter(|(_, (project, d))| *project == project_id && d.name == name)
            .map(|(id, (_, d))| DefinitionReference {
                id: *id,
                name: d.name.clone(),
            })
            .collect())
    }

    async fn list_full_definitions(
        &self,
        project_id: Uuid,
        repository_id: Uuid,
        repository_type: &str,
    ) -> RemoteResult<Vec<PipelineDefinition>> {
        let state = self.state.lock().unwrap();
        let repo_id = repository_id.to_string();
        Ok(state
            .definitions
            .values()
            .filter(|(project, d)| {
                *project == project_id
                    && d.repository.kind == repository_type
                    && d.repository.id.as_deref() == Some(repo_id.as_str())
            })
            .map(|(_, d)| d.clone())
            .collect())
    }

    async fn create_definition(
        &self,
        project: &str,
        mut definition: PipelineDefinition,
    ) -> RemoteResult<PipelineDefinition> {
        let mut state = self.state.lock().unwrap();
        state.mutations.push("create_definition".to_string());
        if state.deny_build_writes {
            return Err(RemoteError::Unauthorized(
                "build definitions: write access denied".to_string(),
            ));
        }
        let project_id = state.resolve_project(project)?;
        state.next_definition_id += 1;
        let id = state.next_definition_id;
        definition.id = Some(id);
        state.definitions.insert(id, (project_id, definition.clone()));
        Ok(definition)
    }

    async fn update_definition(
        &self,
        project: &str,
        definition: PipelineDefinition,
    ) -> RemoteResult<PipelineDefinition> {
        let mut state = self.state.lock().unwrap();
        state.mutations.push("update_definition".to_string());
        if state.deny_build_writes {
            return Err(RemoteError::Unauthorized(
                "build definitions: write access denied".to_string(),
            ));
        }
        let project_id = state.resolve_project(project)?;
        let id = definition
            .id
            .ok_or_else(|| RemoteError::not_found("Definition", definition.name.clone()))?;
        match state.definitions.get_mut(&id) {
            Some(entry) if entry.0 == project_id => {
                entry.1 = definition.clone();
                Ok(definition)
            }
            _ => Err(RemoteError::not_found("Definition", id.to_string())),
        }
    }

    async fn delete_definition(&self, project_id: Uuid, definition_id: u32) -> RemoteResult<()> {
        let mut state = self.state.lock().unwrap();
        state.mutations.push("delete_definition".to_string());
        if state.deny_build_writes {
            return Err(RemoteError::Unauthorized(
                "build definitions: write access denied".to_string(),
            ));
        }
        match state.definitions.get(&definition_id) {
            Some((project, _)) if *project == project_id => {
                state.definitions.remove(&definition_id);
                Ok(())
            }
            _ => Err(RemoteError::not_found(
                "Definition",
                definition_id.to_string(),
            )),
        }
    }
}

#[async_trait]
impl PolicyService for MemoryDevOps {
    async fn list_configurations(
        &self,
        project_id: Uuid,
        repository_id: Uuid,
        ref_name: &str,
    ) -> RemoteResult<Vec<PolicyConfiguration>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .policies
            .iter()
            .filter(|(project, policy)| {
                *project == project_id
                    && !policy.is_deleted
                    && policy.settings.scopes().iter().any(|scope| {
                        scope.ref_name() == Some(ref_name)
                            && scope_repository_matches(scope, repository_id)
                    })
            })
            .map(|(_, p)| p.clone())
            .collect())
    }

    async fn create_configuration(
        &self,
        project: &str,
        mut configuration: PolicyConfiguration,
    ) -> RemoteResult<PolicyConfiguration> {
        let mut state = self.state.lock().unwrap();
        state.mutations.push("create_configuration".to_string());
        if state
            .rejected_policy_types
            .contains(&configuration.policy_type.id)
        {
            return Err(RemoteError::PolicyRejected(
                crate::error::POLICY_REJECTION_MESSAGE.to_string(),
            ));
        }
        let project_id = state.resolve_project(project)?;
        state.next_policy_id += 1;
        configuration.id = Some(state.next_policy_id);
        state.policies.push((project_id, configuration.clone()));
        Ok(configuration)
    }
}
