//! In-memory provider
//!
//! Keeps branches, files and change-requests in process memory. Used by the
//! test suites and by offline runs against fixture repositories. Revision
//! handles are checked on commit just like a real provider does.

use crate::domain::{ChangeRequest, RequestState};
use crate::error::ProviderError;
use crate::provider::{
    FileRevision, Identity, NewCommit, NewPullRequest, Provider, TreeEntry,
};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Clone)]
struct StoredFile {
    content: String,
    revision: String,
}

#[derive(Debug, Clone, Default)]
struct Branch {
    files: BTreeMap<String, StoredFile>,
    /// Commits made on this branch after it was created
    commits: Vec<Identity>,
}

#[derive(Debug, Default)]
struct State {
    exists: bool,
    default_branch: String,
    branches: HashMap<String, Branch>,
    requests: Vec<ChangeRequest>,
    committers: HashMap<u64, Vec<Identity>>,
    comments: Vec<(u64, String)>,
    opened: Vec<NewPullRequest>,
    commits: Vec<NewCommit>,
    deleted_branches: Vec<String>,
    next_number: u64,
    next_revision: u64,
    issues_enabled: bool,
    needs_permission: bool,
    identity: Option<Identity>,
}

impl State {
    fn revision(&mut self) -> String {
        self.next_revision += 1;
        format!("rev-{}", self.next_revision)
    }

    fn number(&mut self) -> u64 {
        self.next_number += 1;
        self.next_number
    }
}

/// Provider backed by process memory
#[derive(Debug)]
pub struct InMemoryProvider {
    repo: String,
    state: Mutex<State>,
}

fn normalize(path: &str) -> String {
    path.trim_start_matches('/').to_string()
}

impl InMemoryProvider {
    /// Empty repository with one default branch
    pub fn new(repo: impl Into<String>, default_branch: impl Into<String>) -> Self {
        let default_branch = default_branch.into();
        let mut branches = HashMap::new();
        branches.insert(default_branch.clone(), Branch::default());
        Self {
            repo: repo.into(),
            state: Mutex::new(State {
                exists: true,
                default_branch,
                branches,
                issues_enabled: true,
                identity: Some(Identity::new("reqbot")),
                ..State::default()
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn repo(&self) -> &str {
        &self.repo
    }

    /// Add a file to the default branch
    pub fn with_file(self, path: &str, content: impl Into<String>) -> Self {
        {
            let mut state = self.lock();
            let revision = state.revision();
            let branch = state.default_branch.clone();
            state.branches.entry(branch).or_default().files.insert(
                normalize(path),
                StoredFile {
                    content: content.into(),
                    revision,
                },
            );
        }
        self
    }

    /// Load every UTF-8 file below `root` onto the default branch
    ///
    /// `.git` directories are skipped; other dot files such as the
    /// repository configuration are kept.
    pub fn from_dir(
        repo: impl Into<String>,
        default_branch: impl Into<String>,
        root: &Path,
    ) -> std::io::Result<Self> {
        let mut provider = Self::new(repo, default_branch);
        let mut pending = vec![root.to_path_buf()];
        while let Some(dir) = pending.pop() {
            for entry in std::fs::read_dir(&dir)? {
                let path = entry?.path();
                if path.is_dir() {
                    if path.file_name().is_some_and(|n| n != ".git") {
                        pending.push(path);
                    }
                    continue;
                }
                let Ok(content) = std::fs::read_to_string(&path) else {
                    continue;
                };
                let Ok(relative) = path.strip_prefix(root) else {
                    continue;
                };
                let relative = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                provider = provider.with_file(&relative, content);
            }
        }
        Ok(provider)
    }

    /// Add an existing change-request with its committers
    pub fn with_request(self, request: ChangeRequest, committers: &[&str]) -> Self {
        {
            let mut state = self.lock();
            state.next_number = state.next_number.max(request.number);
            state.committers.insert(
                request.number,
                committers.iter().map(|login| Identity::new(*login)).collect(),
            );
            state.requests.push(request);
        }
        self
    }

    /// Add a branch forked from the default branch carrying `commits` commits
    pub fn with_branch(self, name: &str, commits: usize) -> Self {
        {
            let mut state = self.lock();
            let base = state.default_branch.clone();
            let mut branch = state.branches.get(&base).cloned().unwrap_or_default();
            branch.commits = vec![Identity::new("someone"); commits];
            state.branches.insert(name.to_string(), branch);
        }
        self
    }

    /// Set the acting identity; `None` hides it like an app installation does
    pub fn with_identity(self, identity: Option<&str>) -> Self {
        self.lock().identity = identity.map(Identity::new);
        self
    }

    /// Issues are disabled on the repository
    pub fn without_issues(self) -> Self {
        self.lock().issues_enabled = false;
        self
    }

    /// The first pull request fails until permissions are granted
    pub fn requiring_permission(self) -> Self {
        self.lock().needs_permission = true;
        self
    }

    /// The repository cannot be resolved
    pub fn missing(self) -> Self {
        self.lock().exists = false;
        self
    }

    /// Content of a file on a branch
    pub fn file(&self, branch: &str, path: &str) -> Option<String> {
        self.lock()
            .branches
            .get(branch)
            .and_then(|b| b.files.get(&normalize(path)))
            .map(|f| f.content.clone())
    }

    pub fn branch_names(&self) -> BTreeSet<String> {
        self.lock().branches.keys().cloned().collect()
    }

    /// Pull requests opened through this provider
    pub fn opened_pull_requests(&self) -> Vec<NewPullRequest> {
        self.lock().opened.clone()
    }

    /// Every commit made through this provider
    pub fn commits(&self) -> Vec<NewCommit> {
        self.lock().commits.clone()
    }

    /// All change-requests including closed ones
    pub fn requests(&self) -> Vec<ChangeRequest> {
        self.lock().requests.clone()
    }

    pub fn issues(&self) -> Vec<ChangeRequest> {
        self.lock()
            .requests
            .iter()
            .filter(|r| r.is_issue)
            .cloned()
            .collect()
    }

    /// Numbers of closed change-requests
    pub fn closed_numbers(&self) -> Vec<u64> {
        self.lock()
            .requests
            .iter()
            .filter(|r| r.state == RequestState::Closed)
            .map(|r| r.number)
            .collect()
    }

    pub fn comments(&self) -> Vec<(u64, String)> {
        self.lock().comments.clone()
    }

    pub fn deleted_branches(&self) -> Vec<String> {
        self.lock().deleted_branches.clone()
    }

    fn ensure_exists(&self, state: &State) -> Result<(), ProviderError> {
        if state.exists {
            Ok(())
        } else {
            Err(ProviderError::RepoDoesNotExist {
                repo: self.repo.clone(),
            })
        }
    }
}

#[async_trait]
impl Provider for InMemoryProvider {
    fn provider_name(&self) -> &'static str {
        "in-memory"
    }

    fn repo_name(&self) -> String {
        self.repo.clone()
    }

    async fn get_default_branch(&self) -> Result<String, ProviderError> {
        let state = self.lock();
        self.ensure_exists(&state)?;
        Ok(state.default_branch.clone())
    }

    async fn iter_tree(&self, branch: &str) -> Result<Vec<TreeEntry>, ProviderError> {
        let state = self.lock();
        self.ensure_exists(&state)?;
        let Some(branch) = state.branches.get(branch) else {
            return Err(ProviderError::not_found(format!("branch {}", branch)));
        };

        let mut directories = BTreeSet::new();
        let mut entries = Vec::new();
        for path in branch.files.keys() {
            let mut parent = path.as_str();
            while let Some((dir, _)) = parent.rsplit_once('/') {
                directories.insert(dir.to_string());
                parent = dir;
            }
            entries.push(TreeEntry::blob(path.clone()));
        }
        entries.extend(directories.into_iter().map(TreeEntry::tree));
        Ok(entries)
    }

    async fn get_file(&self, path: &str, branch: &str) -> Result<FileRevision, ProviderError> {
        let state = self.lock();
        self.ensure_exists(&state)?;
        Ok(state
            .branches
            .get(branch)
            .and_then(|b| b.files.get(&normalize(path)))
            .map(|f| FileRevision::new(f.content.clone(), f.revision.clone()))
            .unwrap_or_else(FileRevision::missing))
    }

    async fn create_branch(&self, base: &str, new_branch: &str) -> Result<(), ProviderError> {
        let mut state = self.lock();
        self.ensure_exists(&state)?;
        if state.branches.contains_key(new_branch) {
            return Err(ProviderError::branch_exists(new_branch));
        }
        let Some(base) = state.branches.get(base) else {
            return Err(ProviderError::not_found(format!("branch {}", base)));
        };
        let branch = Branch {
            files: base.files.clone(),
            commits: Vec::new(),
        };
        state.branches.insert(new_branch.to_string(), branch);
        Ok(())
    }

    async fn is_empty_branch(&self, _base: &str, branch: &str) -> Result<bool, ProviderError> {
        let state = self.lock();
        state
            .branches
            .get(branch)
            .map(|b| b.commits.is_empty())
            .ok_or_else(|| ProviderError::not_found(format!("branch {}", branch)))
    }

    async fn delete_branch(&self, branch: &str) -> Result<(), ProviderError> {
        let mut state = self.lock();
        if state.branches.remove(branch).is_none() {
            return Err(ProviderError::not_found(format!("branch {}", branch)));
        }
        state.deleted_branches.push(branch.to_string());
        Ok(())
    }

    async fn create_commit(&self, commit: &NewCommit) -> Result<String, ProviderError> {
        let mut state = self.lock();
        self.ensure_exists(&state)?;
        let path = normalize(&commit.path);
        let revision = state.revision();
        let identity = state
            .identity
            .clone()
            .unwrap_or_else(|| Identity::new("app"));

        let Some(branch) = state.branches.get_mut(&commit.branch) else {
            return Err(ProviderError::not_found(format!("branch {}", commit.branch)));
        };
        let current = branch.files.get(&path).map(|f| f.revision.clone());
        if current != commit.revision {
            return Err(ProviderError::Conflict {
                path,
                message: "revision does not match the branch head".to_string(),
            });
        }
        branch.files.insert(
            path,
            StoredFile {
                content: commit.content.clone(),
                revision: revision.clone(),
            },
        );
        branch.commits.push(identity);
        state.commits.push(commit.clone());
        Ok(revision)
    }

    async fn create_pull_request(
        &self,
        request: &NewPullRequest,
    ) -> Result<ChangeRequest, ProviderError> {
        let mut state = self.lock();
        self.ensure_exists(&state)?;
        if state.needs_permission {
            return Err(ProviderError::no_permission(format!(
                "unable to create pull request on {}",
                self.repo
            )));
        }
        let committers = state
            .branches
            .get(&request.head)
            .map(|b| b.commits.clone())
            .ok_or_else(|| ProviderError::not_found(format!("branch {}", request.head)))?;

        let number = state.number();
        let created = ChangeRequest::new(
            number,
            request.title.clone(),
            format!("https://example.invalid/{}/pull/{}", self.repo, number),
        )
        .with_branch(request.head.clone());
        state.committers.insert(number, committers);
        state.requests.push(created.clone());
        state.opened.push(request.clone());
        Ok(created)
    }

    async fn create_issue(
        &self,
        title: &str,
        _body: &str,
    ) -> Result<Option<ChangeRequest>, ProviderError> {
        let mut state = self.lock();
        self.ensure_exists(&state)?;
        if !state.issues_enabled {
            return Ok(None);
        }
        let number = state.number();
        let issue = ChangeRequest::new(
            number,
            title,
            format!("https://example.invalid/{}/issues/{}", self.repo, number),
        )
        .as_issue();
        state.requests.push(issue.clone());
        Ok(Some(issue))
    }

    async fn iter_open_requests(&self) -> Result<Vec<ChangeRequest>, ProviderError> {
        let state = self.lock();
        self.ensure_exists(&state)?;
        Ok(state
            .requests
            .iter()
            .filter(|r| r.is_open())
            .cloned()
            .collect())
    }

    async fn close_pull_request(
        &self,
        request: &ChangeRequest,
        comment: &str,
        branch_prefix: &str,
    ) -> Result<(), ProviderError> {
        let mut state = self.lock();
        let Some(stored) = state.requests.iter_mut().find(|r| r.number == request.number) else {
            return Err(ProviderError::not_found(format!("pull request #{}", request.number)));
        };
        stored.state = RequestState::Closed;
        let branch = stored.branch.clone();
        state.comments.push((request.number, comment.to_string()));

        if let Some(branch) = branch.filter(|b| b.starts_with(branch_prefix)) {
            if state.branches.remove(&branch).is_some() {
                state.deleted_branches.push(branch);
            }
        }
        Ok(())
    }

    async fn get_pull_request_committers(
        &self,
        request: &ChangeRequest,
    ) -> Result<Vec<Identity>, ProviderError> {
        Ok(self
            .lock()
            .committers
            .get(&request.number)
            .cloned()
            .unwrap_or_default())
    }

    async fn grant_pull_request_permissions(&self) -> Result<(), ProviderError> {
        self.lock().needs_permission = false;
        Ok(())
    }

    async fn service_identity(&self) -> Result<Option<Identity>, ProviderError> {
        Ok(self.lock().identity.clone())
    }
}
