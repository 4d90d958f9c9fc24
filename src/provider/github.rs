//! GitHub REST API provider
//!
//! Revision handles are blob SHAs. When a bot token is configured the bot
//! acts (commits, opens pull requests) while the user token is used for
//! repository administration such as inviting the bot as a collaborator.

use crate::domain::{ChangeRequest, RequestState};
use crate::error::ProviderError;
use crate::provider::{
    EntryType, FileRevision, Identity, NewCommit, NewPullRequest, Provider, TreeEntry,
};
use crate::registry::DEFAULT_USER_AGENT;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use log::{debug, error, info, warn};
use reqwest::{Client, Method, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::sync::OnceCell;

/// GitHub API base URL
const GITHUB_API_URL: &str = "https://api.github.com";

/// Request timeout
const TIMEOUT: Duration = Duration::from_secs(50);

/// Attempts for a rejected commit before giving up
const COMMIT_ATTEMPTS: u64 = 6;

/// Longest pull request body GitHub accepts
const MAX_BODY_CHARS: usize = 65_535;

/// Color of labels created by the bot
const LABEL_COLOR: &str = "1BB0CE";

const PAGE_SIZE: usize = 100;

/// GitHub provider bound to one repository
pub struct GitHubProvider {
    client: Client,
    base_url: String,
    repo: String,
    user_token: String,
    bot_token: Option<String>,
    /// App installations cannot look up their own login
    integration: bool,
    identity: OnceCell<Option<Identity>>,
}

#[derive(Debug, Deserialize)]
struct RepoResponse {
    default_branch: String,
}

#[derive(Debug, Deserialize)]
struct TreeResponse {
    tree: Vec<TreeItem>,
}

#[derive(Debug, Deserialize)]
struct TreeItem {
    path: String,
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Deserialize)]
struct ContentResponse {
    content: String,
    sha: String,
}

#[derive(Debug, Deserialize)]
struct RefResponse {
    object: RefObject,
}

#[derive(Debug, Deserialize)]
struct RefObject {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct CompareResponse {
    ahead_by: u64,
}

#[derive(Debug, Deserialize)]
struct CommitResponse {
    content: CommitContent,
}

#[derive(Debug, Deserialize)]
struct CommitContent {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct PullResponse {
    number: u64,
    title: String,
    html_url: String,
    state: String,
    head: PullHead,
}

#[derive(Debug, Deserialize)]
struct PullHead {
    #[serde(rename = "ref")]
    branch: String,
}

#[derive(Debug, Deserialize)]
struct IssueResponse {
    number: u64,
    title: String,
    html_url: String,
    state: String,
    #[serde(default)]
    pull_request: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct PullCommit {
    committer: Option<UserResponse>,
}

#[derive(Debug, Deserialize)]
struct UserResponse {
    login: String,
}

#[derive(Debug, Deserialize)]
struct InvitationResponse {
    id: u64,
}

/// Truncate a body to what GitHub accepts
fn truncate_body(body: &str) -> String {
    if body.chars().count() > MAX_BODY_CHARS {
        warn!("pull request body exceeds {} characters, truncating", MAX_BODY_CHARS);
        body.chars().take(MAX_BODY_CHARS).collect()
    } else {
        body.to_string()
    }
}

/// The `message` field of a GitHub error body
fn error_message(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        _ => value
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
    }
}

/// Map a rejected `git/refs` creation to an error
fn classify_branch_status(status: StatusCode, message: &str, branch: &str) -> ProviderError {
    if status == StatusCode::UNPROCESSABLE_ENTITY && message.contains("Reference already exists") {
        ProviderError::branch_exists(branch)
    } else {
        ProviderError::http(format!(
            "unable to create branch {}: {} {}",
            branch, status, message
        ))
    }
}

/// Map a rejected pull request creation to an error.
///
/// Only 403 and 404 mean the acting identity lacks access; everything else
/// is reported as is.
fn classify_pull_status(status: StatusCode, message: &str, repo: &str) -> ProviderError {
    if status == StatusCode::FORBIDDEN || status == StatusCode::NOT_FOUND {
        ProviderError::no_permission(format!(
            "unable to create pull request on {}: {} {}",
            repo, status, message
        ))
    } else {
        ProviderError::http(format!(
            "unable to create pull request on {}: {} {}",
            repo, status, message
        ))
    }
}

/// The contents API rejected a commit because the file moved underneath it
fn is_commit_conflict(status: StatusCode, message: &str) -> bool {
    status == StatusCode::CONFLICT
        || (status == StatusCode::UNPROCESSABLE_ENTITY && message.contains("sha"))
}

/// Delay before retrying a conflicting commit: 1s, 2s, 4s, ...
fn commit_backoff(attempt: u64) -> Duration {
    Duration::from_secs(1 << (attempt - 1))
}

/// Decode the base64 payload of the contents API (wrapped at 60 columns)
fn decode_content(encoded: &str) -> Result<String, ProviderError> {
    let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = STANDARD
        .decode(compact)
        .map_err(|e| ProviderError::http(format!("invalid base64 content: {}", e)))?;
    String::from_utf8(bytes).map_err(|e| ProviderError::http(format!("file is not UTF-8: {}", e)))
}

impl GitHubProvider {
    /// Create a provider for `repo` (`owner/name`)
    pub fn new(
        repo: impl Into<String>,
        user_token: impl Into<String>,
        bot_token: Option<String>,
    ) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(TIMEOUT)
            .user_agent(DEFAULT_USER_AGENT)
            .build()
            .map_err(|e| ProviderError::http(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: GITHUB_API_URL.to_string(),
            repo: repo.into(),
            user_token: user_token.into(),
            bot_token,
            integration: false,
            identity: OnceCell::new(),
        })
    }

    /// Use a GitHub Enterprise API root
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// The acting token belongs to an app installation
    pub fn with_integration(mut self, integration: bool) -> Self {
        self.integration = integration;
        self
    }

    fn acting_token(&self) -> &str {
        self.bot_token.as_deref().unwrap_or(&self.user_token)
    }

    fn repo_url(&self, path: &str) -> String {
        format!("{}/repos/{}/{}", self.base_url, self.repo, path)
    }

    async fn call(
        &self,
        method: Method,
        url: &str,
        token: &str,
        body: Option<&Value>,
    ) -> Result<(StatusCode, Value), ProviderError> {
        debug!("{} {}", method, url);
        let mut request = self
            .client
            .request(method, url)
            .bearer_auth(token)
            .header("Accept", "application/vnd.github+json");
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request.send().await.map_err(|e| ProviderError::http(e.to_string()))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ProviderError::http(e.to_string()))?;
        let value = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };
        Ok((status, value))
    }

    async fn call_ok<T: serde::de::DeserializeOwned>(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
    ) -> Result<T, ProviderError> {
        let (status, value) = self.call(method, url, self.acting_token(), body).await?;
        if status == StatusCode::NOT_FOUND {
            return Err(ProviderError::not_found(url.to_string()));
        }
        if !status.is_success() {
            return Err(ProviderError::http(format!("{} returned {}", url, status)));
        }
        serde_json::from_value(value)
            .map_err(|e| ProviderError::http(format!("unexpected response from {}: {}", url, e)))
    }

    /// Collect every page of a list endpoint
    async fn get_pages<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<Vec<T>, ProviderError> {
        let separator = if path.contains('?') { '&' } else { '?' };
        let mut items = Vec::new();
        for page in 1.. {
            let url = self.repo_url(&format!(
                "{}{}per_page={}&page={}",
                path, separator, PAGE_SIZE, page
            ));
            let batch: Vec<T> = self.call_ok(Method::GET, &url, None).await?;
            let count = batch.len();
            items.extend(batch);
            if count < PAGE_SIZE {
                break;
            }
        }
        Ok(items)
    }

    async fn get_pull(&self, number: u64) -> Result<PullResponse, ProviderError> {
        self.call_ok(Method::GET, &self.repo_url(&format!("pulls/{}", number)), None)
            .await
    }

    /// Look up a label, creating it when missing; `None` when not permitted
    async fn get_or_create_label(&self, name: &str) -> Option<String> {
        let url = self.repo_url(&format!("labels/{}", name));
        match self.call(Method::GET, &url, self.acting_token(), None).await {
            Ok((status, _)) if status.is_success() => return Some(name.to_string()),
            Ok((status, _)) if status == StatusCode::NOT_FOUND => {}
            Ok((status, _)) => {
                warn!("unable to look up label {}: {}", name, status);
                return None;
            }
            Err(e) => {
                warn!("unable to look up label {}: {}", name, e);
                return None;
            }
        }

        info!("label {} does not exist, creating", name);
        let body = json!({"name": name, "color": LABEL_COLOR});
        match self
            .call(Method::POST, &self.repo_url("labels"), self.acting_token(), Some(&body))
            .await
        {
            Ok((status, _)) if status.is_success() => Some(name.to_string()),
            _ => {
                warn!("unable to create label {} due to permissions", name);
                None
            }
        }
    }
}

#[async_trait]
impl Provider for GitHubProvider {
    fn provider_name(&self) -> &'static str {
        "GitHub"
    }

    fn repo_name(&self) -> String {
        self.repo.clone()
    }

    async fn get_default_branch(&self) -> Result<String, ProviderError> {
        let url = format!("{}/repos/{}", self.base_url, self.repo);
        match self.call_ok::<RepoResponse>(Method::GET, &url, None).await {
            Ok(repo) => Ok(repo.default_branch),
            Err(ProviderError::NotFound { .. }) => {
                error!("repository {} does not exist", self.repo);
                Err(ProviderError::RepoDoesNotExist {
                    repo: self.repo.clone(),
                })
            }
            Err(e) => Err(e),
        }
    }

    async fn iter_tree(&self, branch: &str) -> Result<Vec<TreeEntry>, ProviderError> {
        let url = self.repo_url(&format!("git/trees/{}?recursive=1", branch));
        let (status, value) = self.call(Method::GET, &url, self.acting_token(), None).await?;
        // an empty repository has no tree to list
        if status == StatusCode::CONFLICT {
            return Ok(Vec::new());
        }
        if !status.is_success() {
            return Err(ProviderError::http(format!("{} returned {}", url, status)));
        }
        let tree: TreeResponse = serde_json::from_value(value)
            .map_err(|e| ProviderError::http(format!("unexpected tree response: {}", e)))?;

        Ok(tree
            .tree
            .into_iter()
            .map(|item| TreeEntry {
                entry_type: if item.kind == "tree" {
                    EntryType::Tree
                } else {
                    EntryType::Blob
                },
                path: item.path,
            })
            .collect())
    }

    async fn get_file(&self, path: &str, branch: &str) -> Result<FileRevision, ProviderError> {
        info!("getting file at {} for branch {}", path, branch);
        let url = self.repo_url(&format!(
            "contents/{}?ref={}",
            path.trim_start_matches('/'),
            branch
        ));
        match self.call_ok::<ContentResponse>(Method::GET, &url, None).await {
            Ok(file) => Ok(FileRevision::new(decode_content(&file.content)?, file.sha)),
            Err(e) => {
                warn!("unable to get {} on {}: {}", path, self.repo, e);
                Ok(FileRevision::missing())
            }
        }
    }

    async fn create_branch(&self, base: &str, new_branch: &str) -> Result<(), ProviderError> {
        let head: RefResponse = self
            .call_ok(Method::GET, &self.repo_url(&format!("git/ref/heads/{}", base)), None)
            .await?;
        let body = json!({"ref": format!("refs/heads/{}", new_branch), "sha": head.object.sha});
        let (status, value) = self
            .call(Method::POST, &self.repo_url("git/refs"), self.acting_token(), Some(&body))
            .await?;
        if status.is_success() {
            Ok(())
        } else {
            Err(classify_branch_status(status, &error_message(&value), new_branch))
        }
    }

    async fn is_empty_branch(&self, base: &str, branch: &str) -> Result<bool, ProviderError> {
        let comparison: CompareResponse = self
            .call_ok(
                Method::GET,
                &self.repo_url(&format!("compare/{}...{}", base, branch)),
                None,
            )
            .await?;
        info!("got a total of {} commits in {}", comparison.ahead_by, branch);
        Ok(comparison.ahead_by == 0)
    }

    async fn delete_branch(&self, branch: &str) -> Result<(), ProviderError> {
        let url = self.repo_url(&format!("git/refs/heads/{}", branch));
        let (status, _) = self.call(Method::DELETE, &url, self.acting_token(), None).await?;
        if status.is_success() {
            Ok(())
        } else {
            Err(ProviderError::http(format!("unable to delete {}: {}", branch, status)))
        }
    }

    async fn create_commit(&self, commit: &NewCommit) -> Result<String, ProviderError> {
        let path = commit.path.trim_start_matches('/');
        let url = self.repo_url(&format!("contents/{}", path));
        let mut body = json!({
            "message": commit.message,
            "content": STANDARD.encode(commit.content.as_bytes()),
            "branch": commit.branch,
        });
        if let Some(revision) = &commit.revision {
            body["sha"] = Value::String(revision.clone());
        }

        let mut last_message = String::from("commit rejected");
        for attempt in 1..=COMMIT_ATTEMPTS {
            let (status, value) = self
                .call(Method::PUT, &url, self.acting_token(), Some(&body))
                .await?;
            if status.is_success() {
                let response: CommitResponse = serde_json::from_value(value).map_err(|e| {
                    ProviderError::http(format!("unexpected commit response: {}", e))
                })?;
                return Ok(response.content.sha);
            }

            let message = error_message(&value);
            if !is_commit_conflict(status, &message) {
                error!("unable to create commit on {} for path {}: {}", self.repo, path, status);
                return Err(ProviderError::http(format!(
                    "commit to {} failed: {} {}",
                    path, status, message
                )));
            }
            warn!("commit to {} rejected (attempt {}): {}", path, attempt, message);
            last_message = format!("{} {}", status, message);
            if attempt < COMMIT_ATTEMPTS {
                tokio::time::sleep(commit_backoff(attempt)).await;
            }
        }

        error!("unable to create commit on {} for path {}", self.repo, path);
        Err(ProviderError::Conflict {
            path: path.to_string(),
            message: last_message,
        })
    }

    async fn create_pull_request(
        &self,
        request: &NewPullRequest,
    ) -> Result<ChangeRequest, ProviderError> {
        let body = json!({
            "title": request.title,
            "body": truncate_body(&request.body),
            "base": request.base,
            "head": request.head,
        });
        let (status, value) = self
            .call(Method::POST, &self.repo_url("pulls"), self.acting_token(), Some(&body))
            .await?;
        if !status.is_success() {
            return Err(classify_pull_status(status, &error_message(&value), &self.repo));
        }
        let pull: PullResponse = serde_json::from_value(value)
            .map_err(|e| ProviderError::http(format!("unexpected pull response: {}", e)))?;

        let mut labels = Vec::new();
        for name in &request.labels {
            if let Some(label) = self.get_or_create_label(name).await {
                labels.push(label);
            }
        }
        if !labels.is_empty() {
            let url = self.repo_url(&format!("issues/{}/labels", pull.number));
            let body = json!({ "labels": labels });
            if let Err(e) = self.call(Method::POST, &url, self.acting_token(), Some(&body)).await {
                warn!("unable to label #{}: {}", pull.number, e);
            }
        }
        if !request.assignees.is_empty() {
            let url = self.repo_url(&format!("issues/{}/assignees", pull.number));
            let body = json!({ "assignees": request.assignees });
            if let Err(e) = self.call(Method::POST, &url, self.acting_token(), Some(&body)).await {
                warn!("unable to assign #{}: {}", pull.number, e);
            }
        }

        Ok(ChangeRequest::new(pull.number, pull.title, pull.html_url)
            .with_state(RequestState::from_provider(&pull.state))
            .with_branch(pull.head.branch))
    }

    async fn create_issue(
        &self,
        title: &str,
        body: &str,
    ) -> Result<Option<ChangeRequest>, ProviderError> {
        let payload = json!({"title": title, "body": body});
        let (status, value) = self
            .call(Method::POST, &self.repo_url("issues"), self.acting_token(), Some(&payload))
            .await?;
        // issues are disabled on this repository
        if status == StatusCode::NOT_FOUND || status == StatusCode::GONE {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(ProviderError::http(format!("unable to create issue: {}", status)));
        }
        let issue: IssueResponse = serde_json::from_value(value)
            .map_err(|e| ProviderError::http(format!("unexpected issue response: {}", e)))?;
        Ok(Some(
            ChangeRequest::new(issue.number, issue.title, issue.html_url).as_issue(),
        ))
    }

    async fn iter_open_requests(&self) -> Result<Vec<ChangeRequest>, ProviderError> {
        let creator = match self.service_identity().await? {
            Some(identity) => format!("&creator={}", identity.login),
            None => String::new(),
        };

        let items: Vec<IssueResponse> = self
            .get_pages(&format!("issues?state=open{}", creator))
            .await?;
        Ok(items
            .into_iter()
            .map(|item| {
                let request = ChangeRequest::new(item.number, item.title, item.html_url)
                    .with_state(RequestState::from_provider(&item.state));
                if item.pull_request.is_some() {
                    request
                } else {
                    request.as_issue()
                }
            })
            .collect())
    }

    async fn close_pull_request(
        &self,
        request: &ChangeRequest,
        comment: &str,
        branch_prefix: &str,
    ) -> Result<(), ProviderError> {
        let pull = match self.get_pull(request.number).await {
            Ok(pull) => pull,
            Err(ProviderError::NotFound { .. }) => return Ok(()),
            Err(e) => return Err(e),
        };

        let comment_url = self.repo_url(&format!("issues/{}/comments", request.number));
        self.call(
            Method::POST,
            &comment_url,
            self.acting_token(),
            Some(&json!({ "body": comment })),
        )
        .await?;

        let pull_url = self.repo_url(&format!("pulls/{}", request.number));
        let (status, _) = self
            .call(
                Method::PATCH,
                &pull_url,
                self.acting_token(),
                Some(&json!({"state": "closed"})),
            )
            .await?;
        if !status.is_success() {
            return Err(ProviderError::http(format!(
                "unable to close #{}: {}",
                request.number, status
            )));
        }

        if pull.head.branch.starts_with(branch_prefix) {
            self.delete_branch(&pull.head.branch).await?;
        }
        Ok(())
    }

    async fn get_pull_request_committers(
        &self,
        request: &ChangeRequest,
    ) -> Result<Vec<Identity>, ProviderError> {
        let path = format!("pulls/{}/commits", request.number);
        match self.get_pages::<PullCommit>(&path).await {
            Ok(commits) => Ok(commits
                .into_iter()
                .map(|commit| {
                    commit
                        .committer
                        .map(|user| Identity::new(user.login))
                        .unwrap_or_else(|| Identity::new(""))
                })
                .collect()),
            Err(ProviderError::NotFound { .. }) => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    async fn grant_pull_request_permissions(&self) -> Result<(), ProviderError> {
        if self.integration {
            return Ok(());
        }
        let Some(bot_token) = self.bot_token.as_deref() else {
            return Ok(());
        };
        let Some(bot) = self.service_identity().await? else {
            return Ok(());
        };

        let url = self.repo_url(&format!("collaborators/{}", bot.login));
        let (status, value) = self.call(Method::PUT, &url, &self.user_token, None).await?;
        let message = format!("unable to add {} as a collaborator on {}", bot.login, self.repo);
        if !status.is_success() {
            error!("{}", message);
            return Err(ProviderError::no_permission(message));
        }

        // 204 means the bot already is a collaborator
        if status == StatusCode::CREATED {
            let invitation: InvitationResponse = serde_json::from_value(value)
                .map_err(|_| ProviderError::no_permission(message.clone()))?;
            let url = format!("{}/user/repository_invitations/{}", self.base_url, invitation.id);
            let (status, _) = self.call(Method::PATCH, &url, bot_token, None).await?;
            if !status.is_success() {
                error!("{}", message);
                return Err(ProviderError::no_permission(message));
            }
        }
        Ok(())
    }

    async fn service_identity(&self) -> Result<Option<Identity>, ProviderError> {
        if self.integration {
            return Ok(None);
        }
        let identity = self
            .identity
            .get_or_try_init(|| async {
                let url = format!("{}/user", self.base_url);
                let user: UserResponse = self.call_ok(Method::GET, &url, None).await?;
                Ok::<_, ProviderError>(Some(Identity::new(user.login)))
            })
            .await?;
        Ok(identity.clone())
    }
}
