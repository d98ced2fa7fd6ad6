//! Azure DevOps REST client
//!
//! Implements the service traits over the Azure DevOps REST API. The client
//! holds an already-issued personal access token; acquiring one is the
//! caller's concern.

use reqwest::{Method, RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use async_trait::async_trait;

use crate::error::{RemoteError, POLICY_REJECTION_MESSAGE};
use crate::schema::*;
use crate::service_traits::*;

const DEFAULT_API_VERSION: &str = "7.1";

/// Connection settings for an Azure DevOps organization
#[derive(Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Organization URL, e.g. `https://dev.azure.com/contoso`
    pub organization_url: String,
    /// Personal access token
    pub token: Option<String>,
    /// REST API version sent with every request
    pub api_version: String,
}

impl ConnectionConfig {
    /// Create a config for an organization name or URL.
    pub fn new(organization: &str) -> Self {
        let organization_url = if organization.starts_with("http://")
            || organization.starts_with("https://")
        {
            organization.trim_end_matches('/').to_string()
        } else {
            format!("https://dev.azure.com/{organization}")
        };
        ConnectionConfig {
            organization_url,
            token: None,
            api_version: DEFAULT_API_VERSION.to_string(),
        }
    }

    /// Read `AZURE_DEVOPS_ORG` and `AZURE_DEVOPS_PAT`.
    pub fn from_env() -> Option<Self> {
        let organization = std::env::var("AZURE_DEVOPS_ORG").ok()?;
        let config = Self::new(&organization);
        Some(match std::env::var("AZURE_DEVOPS_PAT") {
            Ok(token) => config.with_token(&token),
            Err(_) => config,
        })
    }

    /// Set the personal access token
    pub fn with_token(mut self, token: &str) -> Self {
        self.token = Some(token.to_string());
        self
    }
}

impl std::fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("organization_url", &self.organization_url)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("api_version", &self.api_version)
            .finish()
    }
}

#[derive(Deserialize)]
struct ValueList<T> {
    value: Vec<T>,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

/// Map a non-success response to the remote error taxonomy.
///
/// The service answers an invalid token with `203 Non-Authoritative` and a
/// sign-in page rather than `401`, so 203 counts as an authorization failure.
pub fn classify_failure(status: u16, body: &str) -> RemoteError {
    let message = serde_json::from_str::<ErrorBody>(body)
        .map(|b| b.message)
        .unwrap_or_else(|_| body.trim().to_string());

    match status {
        203 | 401 | 403 => RemoteError::Unauthorized(if message.is_empty() {
            format!("HTTP {status}")
        } else {
            message
        }),
        _ if message.contains(POLICY_REJECTION_MESSAGE) => RemoteError::PolicyRejected(message),
        404 => RemoteError::NotFound {
            kind: "Resource",
            name: message,
        },
        _ => RemoteError::Service { status, message },
    }
}

/// Azure DevOps client for the Git, build and policy services
pub struct AzureDevOpsClient {
    config: ConnectionConfig,
    base_url: Url,
    http_client: reqwest::Client,
}

impl AzureDevOpsClient {
    /// Create a new client
    pub fn new(config: ConnectionConfig) -> RemoteResult<Self> {
        let base_url = Url::parse(&config.organization_url)
            .map_err(|e| RemoteError::Http(format!("invalid organization URL: {e}")))?;
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("rebranch/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(AzureDevOpsClient {
            config,
            base_url,
            http_client,
        })
    }

    /// Build an endpoint URL below the organization, percent-encoding each
    /// path segment (project names may contain spaces).
    pub fn endpoint(&self, segments: &[&str]) -> RemoteResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| RemoteError::Http("organization URL cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let request = self
            .http_client
            .request(method, url)
            .query(&[("api-version", self.config.api_version.as_str())]);
        match &self.config.token {
            Some(token) => request.basic_auth("", Some(token)),
            None => request,
        }
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> RemoteResult<T> {
        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;
        debug!(status = status.as_u16(), "azure devops response");

        if status == StatusCode::NON_AUTHORITATIVE_INFORMATION || !status.is_success() {
            return Err(classify_failure(status.as_u16(), &text));
        }
        serde_json::from_str(&text).map_err(RemoteError::from)
    }

    async fn send_empty(&self, request: RequestBuilder) -> RemoteResult<()> {
        let response = request.send().await?;
        let status = response.status();
        if status == StatusCode::NON_AUTHORITATIVE_INFORMATION || !status.is_success() {
            let text = response.text().await?;
            return Err(classify_failure(status.as_u16(), &text));
        }
        Ok(())
    }

    fn repo_segment(repository_id: Uuid) -> String {
        repository_id.to_string()
    }
}

#[async_trait]
impl GitService for AzureDevOpsClient {
    async fn list_repositories(&self) -> RemoteResult<Vec<Repository>> {
        let url = self.endpoint(&["_apis", "git", "repositories"])?;
        let list: ValueList<Repository> = self.send(self.request(Method::GET, url)).await?;
        Ok(list.value)
    }

    async fn get_repository(&self, repository_id: Uuid) -> RemoteResult<Repository> {
        let id = Self::repo_segment(repository_id);
        let url = self.endpoint(&["_apis", "git", "repositories", &id])?;
        self.send(self.request(Method::GET, url)).await
    }

    async fn update_default_branch(
        &self,
        repository_id: Uuid,
        default_branch: &str,
    ) -> RemoteResult<Repository> {
        let id = Self::repo_segment(repository_id);
        let url = self.endpoint(&["_apis", "git", "repositories", &id])?;
        let body = serde_json::json!({ "defaultBranch": default_branch });
        self.send(self.request(Method::PATCH, url).json(&body)).await
    }

    async fn get_branch(&self, repository_id: Uuid, name: &str) -> RemoteResult<Branch> {
        let id = Self::repo_segment(repository_id);
        let url = self.endpoint(&["_apis", "git", "repositories", &id, "stats", "branches"])?;
        let short = name.strip_prefix("refs/heads/").unwrap_or(name);
        let request = self.request(Method::GET, url).query(&[("name", short)]);
        self.send(request).await.map_err(|e| match e {
            RemoteError::NotFound { .. } => RemoteError::not_found("Branch", name),
            other => other,
        })
    }

    async fn list_branches(&self, repository_id: Uuid) -> RemoteResult<Vec<Branch>> {
        let id = Self::repo_segment(repository_id);
        let url = self.endpoint(&["_apis", "git", "repositories", &id, "stats", "branches"])?;
        let list: ValueList<Branch> = self.send(self.request(Method::GET, url)).await?;
        Ok(list.value)
    }

    async fn update_refs(
        &self,
        repository_id: Uuid,
        updates: Vec<RefUpdate>,
    ) -> RemoteResult<Vec<RefUpdateResult>> {
        let id = Self::repo_segment(repository_id);
        let url = self.endpoint(&["_apis", "git", "repositories", &id, "refs"])?;
        let list: ValueList<RefUpdateResult> = self
            .send(self.request(Method::POST, url).json(&updates))
            .await?;
        Ok(list.value)
    }

    async fn list_items(
        &self,
        repository_id: Uuid,
        scope_path: &str,
        recursion: RecursionLevel,
    ) -> RemoteResult<Vec<GitItem>> {
        let id = Self::repo_segment(repository_id);
        let url = self.endpoint(&["_apis", "git", "repositories", &id, "items"])?;
        let request = self.request(Method::GET, url).query(&[
            ("scopePath", scope_path),
            ("recursionLevel", recursion.as_str()),
        ]);
        let list: ValueList<GitItem> = self.send(request).await?;
        Ok(list.value)
    }

    async fn create_push(&self, repository_id: Uuid, push: Push) -> RemoteResult<()> {
        let id = Self::repo_segment(repository_id);
        let url = self.endpoint(&["_apis", "git", "repositories", &id, "pushes"])?;
        let _: serde_json::Value = self
            .send(self.request(Method::POST, url).json(&push))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl BuildService for AzureDevOpsClient {
    async fn find_definitions(
        &self,
        project_id: Uuid,
        name: &str,
    ) -> RemoteResult<Vec<DefinitionReference>> {
        let project = project_id.to_string();
        let url = self.endpoint(&[&project, "_apis", "build", "definitions"])?;
        let request = self.request(Method::GET, url).query(&[("name", name)]);
        let list: ValueList<DefinitionReference> = self.send(request).await?;
        Ok(list.value)
    }

    async fn list_full_definitions(
        &self,
        project_id: Uuid,
        repository_id: Uuid,
        repository_type: &str,
    ) -> RemoteResult<Vec<PipelineDefinition>> {
        let project = project_id.to_string();
        let repository = repository_id.to_string();
        let url = self.endpoint(&[&project, "_apis", "build", "definitions"])?;
        let request = self.request(Method::GET, url).query(&[
            ("repositoryId", repository.as_str()),
            ("repositoryType", repository_type),
            ("includeAllProperties", "true"),
        ]);
        let list: ValueList<PipelineDefinition> = self.send(request).await?;
        Ok(list.value)
    }

    async fn create_definition(
        &self,
        project: &str,
        definition: PipelineDefinition,
    ) -> RemoteResult<PipelineDefinition> {
        let url = self.endpoint(&[project, "_apis", "build", "definitions"])?;
        self.send(self.request(Method::POST, url).json(&definition))
            .await
    }

    async fn update_definition(
        &self,
        project: &str,
        definition: PipelineDefinition,
    ) -> RemoteResult<PipelineDefinition> {
        let id = definition
            .id
            .ok_or_else(|| RemoteError::not_found("Definition", definition.name.clone()))?
            .to_string();
        let url = self.endpoint(&[project, "_apis", "build", "definitions", &id])?;
        self.send(self.request(Method::PUT, url).json(&definition))
            .await
    }

    async fn delete_definition(&self, project_id: Uuid, definition_id: u32) -> RemoteResult<()> {
        let project = project_id.to_string();
        let id = definition_id.to_string();
        let url = self.endpoint(&[&project, "_apis", "build", "definitions", &id])?;
        self.send_empty(self.request(Method::DELETE, url)).await
    }
}

#[async_trait]
impl PolicyService for AzureDevOpsClient {
    async fn list_configurations(
        &self,
        project_id: Uuid,
        repository_id: Uuid,
        ref_name: &str,
    ) -> RemoteResult<Vec<PolicyConfiguration>> {
        let project = project_id.to_string();
        let repository = repository_id.to_string();
        let url = self.endpoint(&[&project, "_apis", "git", "policy", "configurations"])?;
        let request = self.request(Method::GET, url).query(&[
            ("repositoryId", repository.as_str()),
            ("refName", ref_name),
        ]);
        let list: ValueList<PolicyConfiguration> = self.send(request).await?;
        Ok(list.value)
    }

    async fn create_configuration(
        &self,
        project: &str,
        configuration: PolicyConfiguration,
    ) -> RemoteResult<PolicyConfiguration> {
        let url = self.endpoint(&[project, "_apis", "policy", "configurations"])?;
        self.send(self.request(Method::POST, url).json(&configuration))
            .await
    }
}
