//! Hosting provider collaborators
//!
//! A `Provider` is bound to one repository and exposes the branch, commit,
//! pull request and issue operations an update run needs:
//! - GitHub REST API backend
//! - In-memory backend for tests and dry runs

mod github;
mod memory;

pub use github::GitHubProvider;
pub use memory::InMemoryProvider;

use crate::domain::ChangeRequest;
use crate::error::ProviderError;
use async_trait::async_trait;

/// Kind of a repository tree entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryType {
    Blob,
    Tree,
}

/// One entry of a recursive tree listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    pub entry_type: EntryType,
    pub path: String,
}

impl TreeEntry {
    pub fn blob(path: impl Into<String>) -> Self {
        Self {
            entry_type: EntryType::Blob,
            path: path.into(),
        }
    }

    pub fn tree(path: impl Into<String>) -> Self {
        Self {
            entry_type: EntryType::Tree,
            path: path.into(),
        }
    }

    pub fn is_blob(&self) -> bool {
        self.entry_type == EntryType::Blob
    }
}

/// File content with its revision handle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileRevision {
    pub content: Option<String>,
    pub revision: Option<String>,
}

impl FileRevision {
    pub fn new(content: impl Into<String>, revision: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            revision: Some(revision.into()),
        }
    }

    /// The file does not exist on the branch
    pub fn missing() -> Self {
        Self::default()
    }
}

/// An account as seen by the provider
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity {
    pub login: String,
}

impl Identity {
    pub fn new(login: impl Into<String>) -> Self {
        Self {
            login: login.into(),
        }
    }
}

/// One file update on a branch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCommit {
    pub path: String,
    pub branch: String,
    pub content: String,
    pub message: String,
    /// Revision the content was derived from
    pub revision: Option<String>,
}

/// A change-request to open
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPullRequest {
    pub title: String,
    pub body: String,
    pub base: String,
    pub head: String,
    pub labels: Vec<String>,
    pub assignees: Vec<String>,
}

/// Operations on the hosting provider of one repository
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Provider: Send + Sync {
    /// Provider name for logs
    fn provider_name(&self) -> &'static str;

    /// Repository this provider is bound to
    fn repo_name(&self) -> String;

    /// Default branch; `RepoDoesNotExist` when the repository is unknown
    async fn get_default_branch(&self) -> Result<String, ProviderError>;

    /// Recursive tree listing of `branch`
    async fn iter_tree(&self, branch: &str) -> Result<Vec<TreeEntry>, ProviderError>;

    /// File content and revision handle; both `None` when absent
    async fn get_file(&self, path: &str, branch: &str) -> Result<FileRevision, ProviderError>;

    /// Create `new_branch` at the head of `base`; `BranchExists` when taken
    async fn create_branch(&self, base: &str, new_branch: &str) -> Result<(), ProviderError>;

    /// True when `branch` has no commits beyond `base`
    async fn is_empty_branch(&self, base: &str, branch: &str) -> Result<bool, ProviderError>;

    async fn delete_branch(&self, branch: &str) -> Result<(), ProviderError>;

    /// Commit new content; returns the new revision handle
    async fn create_commit(&self, commit: &NewCommit) -> Result<String, ProviderError>;

    async fn create_pull_request(
        &self,
        request: &NewPullRequest,
    ) -> Result<ChangeRequest, ProviderError>;

    /// Open an issue; `Ok(None)` when issues are disabled
    async fn create_issue(
        &self,
        title: &str,
        body: &str,
    ) -> Result<Option<ChangeRequest>, ProviderError>;

    /// Open pull requests and issues created by the acting identity
    async fn iter_open_requests(&self) -> Result<Vec<ChangeRequest>, ProviderError>;

    /// Comment on and close a pull request, deleting its branch when it
    /// carries `branch_prefix`
    async fn close_pull_request(
        &self,
        request: &ChangeRequest,
        comment: &str,
        branch_prefix: &str,
    ) -> Result<(), ProviderError>;

    /// Committers of every commit on the pull request
    async fn get_pull_request_committers(
        &self,
        request: &ChangeRequest,
    ) -> Result<Vec<Identity>, ProviderError>;

    /// Make the acting identity a collaborator so it may open pull requests
    async fn grant_pull_request_permissions(&self) -> Result<(), ProviderError>;

    /// The acting identity; `None` when the backend cannot tell
    async fn service_identity(&self) -> Result<Option<Identity>, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tree_entry_kinds() {
        assert!(TreeEntry::blob("requirements.txt").is_blob());
        assert!(!TreeEntry::tree("requirements").is_blob());
    }

    #[test]
    fn test_missing_file() {
        let file = FileRevision::missing();
        assert!(file.content.is_none());
        assert!(file.revision.is_none());
    }
}
