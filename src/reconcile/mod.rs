//! Change-request reconciliation
//!
//! Matches update units against the change-requests already open on the
//! provider:
//! - Titles are compared after stripping the configured `pr_prefix`
//! - An open initial update gates every other unit of the run
//! - Superseded update PRs are closed, but only when the service identity
//!   is their sole committer and no other unit of the run disagrees on the
//!   target version of the same package

use crate::config::Config;
use crate::domain::{canonical_title, ChangeRequest};
use crate::error::ProviderError;
use crate::provider::{Identity, Provider};
use crate::update::{RequirementUpdate, UpdateUnit, INITIAL_TITLE};
use log::{debug, info, warn};

/// True when `update` disagrees with another edit of the same package
/// across the sequential units of the run
pub fn has_conflicting_update(update: &RequirementUpdate, sequential: &[UpdateUnit]) -> bool {
    for other in sequential.iter().flat_map(|unit| unit.updates.iter()) {
        if other.key() == update.key()
            && (other.commit_message != update.commit_message || other.target != update.target)
        {
            info!(
                "{} conflicting with {}/{}",
                update.key(),
                update.target,
                other.target
            );
            return true;
        }
    }
    false
}

/// True when `service` made every commit of a pull request.
///
/// Backends that cannot name the acting identity pass `None`; a single
/// distinct committer is then accepted.
pub fn is_service_only_committer(committers: &[Identity], service: Option<&Identity>) -> bool {
    let mut logins: Vec<String> = committers.iter().map(|c| c.login.to_lowercase()).collect();
    logins.sort();
    logins.dedup();
    if logins.len() != 1 {
        return false;
    }
    match service {
        Some(service) => logins[0] == service.login.to_lowercase(),
        None => true,
    }
}

/// Open change-requests of one run
pub struct Reconciler<'a> {
    provider: &'a dyn Provider,
    config: &'a Config,
    open: Vec<ChangeRequest>,
    /// Sequential grouping of every candidate, for the conflict guard
    sequential: Vec<UpdateUnit>,
    service: Option<Identity>,
}

impl<'a> Reconciler<'a> {
    /// Load the open change-requests this tool recognises
    pub async fn load(
        provider: &'a dyn Provider,
        config: &'a Config,
        sequential: Vec<UpdateUnit>,
    ) -> Result<Self, ProviderError> {
        let open: Vec<ChangeRequest> = provider
            .iter_open_requests()
            .await?
            .into_iter()
            .filter(|r| r.is_open() && r.is_recognised())
            .collect();
        debug!("found {} open change-requests", open.len());
        let service = provider.service_identity().await.unwrap_or_else(|e| {
            warn!("unable to resolve the service identity: {}", e);
            None
        });
        Ok(Self::with_requests(provider, config, open, sequential, service))
    }

    /// Build from an already fetched list
    pub fn with_requests(
        provider: &'a dyn Provider,
        config: &'a Config,
        open: Vec<ChangeRequest>,
        sequential: Vec<UpdateUnit>,
        service: Option<Identity>,
    ) -> Self {
        Self {
            provider,
            config,
            open,
            sequential,
            service,
        }
    }

    pub fn open_requests(&self) -> &[ChangeRequest] {
        &self.open
    }

    /// Open initial update pull request, if any
    pub fn initial_gate(&self) -> Option<&ChangeRequest> {
        self.open.iter().find(|r| {
            !r.is_issue && r.is_open() && r.canonical_title(&self.config.pr_prefix) == INITIAL_TITLE
        })
    }

    /// Open change-request whose canonical title equals `title`'s
    pub fn find_by_title(&self, title: &str) -> Option<&ChangeRequest> {
        let prefix = &self.config.pr_prefix;
        let wanted = canonical_title(title, prefix);
        self.open
            .iter()
            .find(|r| r.canonical_title(prefix) == wanted)
    }

    /// Record a change-request created during this run
    pub fn track(&mut self, request: ChangeRequest) {
        if !self.open.contains(&request) {
            self.open.push(request);
        }
    }

    pub fn has_conflicting_update(&self, update: &RequirementUpdate) -> bool {
        has_conflicting_update(update, &self.sequential)
    }

    async fn is_service_only(&self, request: &ChangeRequest) -> bool {
        match self.provider.get_pull_request_committers(request).await {
            Ok(committers) => is_service_only_committer(&committers, self.service.as_ref()),
            Err(e) => {
                warn!("unable to list committers of #{}: {}", request.number, e);
                false
            }
        }
    }

    /// Close the pull requests `resolved` supersedes for one of its edits.
    ///
    /// Returns the numbers of the closed pull requests; they are dropped
    /// from the working set.
    pub async fn close_stale(
        &mut self,
        update: &RequirementUpdate,
        resolved: &ChangeRequest,
        scheduled: bool,
    ) -> Vec<u64> {
        if resolved.is_issue || resolved.is_initial() {
            return Vec::new();
        }
        let prefix = self.config.pr_prefix.clone();
        let resolved_title = resolved.canonical_title(&prefix);

        let mut stale = Vec::new();
        for candidate in &self.open {
            if candidate.is_issue || !candidate.is_open() || candidate.number == resolved.number {
                continue;
            }
            let same_title = candidate.canonical_title(&prefix) == resolved_title;
            if same_title {
                continue;
            }
            let close = if scheduled && resolved.is_scheduled() {
                candidate.is_scheduled() || candidate.is_update()
            } else if resolved.is_update() {
                candidate.is_update()
                    && candidate.requirement_key(&prefix).as_deref() == Some(update.key())
                    && !self.has_conflicting_update(update)
            } else {
                false
            };
            if close {
                stale.push(candidate.clone());
            }
        }

        let mut closed = Vec::new();
        for candidate in stale {
            if !self.is_service_only(&candidate).await {
                debug!("#{} has foreign commits, leaving it open", candidate.number);
                continue;
            }
            info!(
                "closing stale PR {} for {}",
                candidate.title, resolved.title
            );
            let comment = format!("Closing this in favor of #{}", resolved.number);
            match self
                .provider
                .close_pull_request(&candidate, &comment, &self.config.branch_prefix)
                .await
            {
                Ok(()) => closed.push(candidate.number),
                Err(e) => warn!("unable to close #{}: {}", candidate.number, e),
            }
        }

        self.open.retain(|r| !closed.contains(&r.number));
        closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FileType, Requirement};
    use crate::provider::{InMemoryProvider, MockProvider};
    use crate::update::{GroupingStrategy, UpdateGrouper};

    fn update(line: &str, path: &str, target: &str) -> RequirementUpdate {
        let requirement = Requirement::parse(line, 1, FileType::RequirementsTxt).unwrap();
        RequirementUpdate::new(requirement, path, None, target)
    }

    fn sequential(config: &Config, candidates: &[RequirementUpdate]) -> Vec<UpdateUnit> {
        UpdateGrouper::new(config).group(GroupingStrategy::Sequential, candidates)
    }

    fn pr(number: u64, title: &str) -> ChangeRequest {
        ChangeRequest::new(number, title, format!("https://example.com/pull/{}", number))
            .with_branch(format!("reqbot-branch-{}", number))
    }

    #[test]
    fn test_conflicting_targets() {
        let config = Config::default();
        let a = update("django==1.0", "a.txt", "1.1");
        let b = update("django==1.0", "b.txt", "1.2");
        let units = sequential(&config, &[a.clone(), b.clone()]);
        assert_eq!(units.len(), 2);
        assert!(has_conflicting_update(&a, &units));
        assert!(has_conflicting_update(&b, &units));
    }

    #[test]
    fn test_conflicting_commit_messages() {
        let config = Config::default();
        let a = update("django==1.0", "a.txt", "1.2");
        let b = update("django==1.1", "b.txt", "1.2");
        let units = sequential(&config, &[a.clone(), b]);
        assert!(has_conflicting_update(&a, &units));
    }

    #[test]
    fn test_no_conflict_for_collapsed_units() {
        let config = Config::default();
        let a = update("django==1.0", "a.txt", "1.1");
        let b = update("django==1.0", "b.txt", "1.1");
        let c = update("six==1.0", "a.txt", "1.2");
        let units = sequential(&config, &[a.clone(), b, c]);
        assert!(!has_conflicting_update(&a, &units));
    }

    #[test]
    fn test_service_only_committer() {
        let bot = Identity::new("reqbot");
        assert!(is_service_only_committer(
            &[Identity::new("reqbot"), Identity::new("ReqBot")],
            Some(&bot)
        ));
        assert!(!is_service_only_committer(
            &[Identity::new("reqbot"), Identity::new("alice")],
            Some(&bot)
        ));
        assert!(!is_service_only_committer(&[Identity::new("alice")], Some(&bot)));
        assert!(!is_service_only_committer(&[], Some(&bot)));
        assert!(is_service_only_committer(&[Identity::new("alice")], None));
        assert!(!is_service_only_committer(
            &[Identity::new("alice"), Identity::new("bob")],
            None
        ));
    }

    #[tokio::test]
    async fn test_find_by_canonical_title() {
        let provider = InMemoryProvider::new("acme/app", "main");
        let config = Config {
            pr_prefix: "[deps]".to_string(),
            ..Config::default()
        };
        let reconciler = Reconciler::with_requests(
            &provider,
            &config,
            vec![pr(3, "[deps] Update django to 1.1")],
            Vec::new(),
            None,
        );
        assert_eq!(
            reconciler.find_by_title("[deps] Update django to 1.1").map(|r| r.number),
            Some(3)
        );
        assert_eq!(
            reconciler.find_by_title("Update django to 1.1").map(|r| r.number),
            Some(3)
        );
        assert!(reconciler.find_by_title("Update django to 1.2").is_none());
    }

    #[tokio::test]
    async fn test_initial_gate() {
        let provider = InMemoryProvider::new("acme/app", "main");
        let config = Config::default();
        let reconciler = Reconciler::with_requests(
            &provider,
            &config,
            vec![pr(1, "Update six to 1.2"), pr(2, "Initial Update")],
            Vec::new(),
            None,
        );
        assert_eq!(reconciler.initial_gate().map(|r| r.number), Some(2));
    }

    #[tokio::test]
    async fn test_initial_issue_is_not_a_gate() {
        let provider = InMemoryProvider::new("acme/app", "main");
        let config = Config::default();
        let reconciler = Reconciler::with_requests(
            &provider,
            &config,
            vec![pr(2, "Initial Update").as_issue()],
            Vec::new(),
            None,
        );
        assert!(reconciler.initial_gate().is_none());
    }

    #[tokio::test]
    async fn test_load_skips_unrecognised_requests() {
        let provider = InMemoryProvider::new("acme/app", "main")
            .with_request(pr(1, "Update six to 1.2"), &["reqbot"])
            .with_request(pr(2, "Fix the frobnicator"), &["alice"]);
        let config = Config::default();
        let reconciler = Reconciler::load(&provider, &config, Vec::new()).await.unwrap();
        let numbers: Vec<u64> = reconciler.open_requests().iter().map(|r| r.number).collect();
        assert_eq!(numbers, vec![1]);
    }

    #[tokio::test]
    async fn test_close_stale_update() {
        let provider = InMemoryProvider::new("acme/app", "main")
            .with_request(pr(1, "Update django to 1.1"), &["reqbot"])
            .with_request(pr(2, "Update six to 1.2"), &["reqbot"])
            .with_request(pr(3, "Update django to 1.2"), &["reqbot"])
            .with_branch("reqbot-branch-1", 1);
        let config = Config::default();
        let current = update("django==1.0", "requirements.txt", "1.2");
        let units = sequential(&config, &[current.clone()]);
        let mut reconciler = Reconciler::load(&provider, &config, units).await.unwrap();

        let resolved = pr(3, "Update django to 1.2");
        let closed = reconciler.close_stale(&current, &resolved, false).await;

        assert_eq!(closed, vec![1]);
        assert_eq!(provider.closed_numbers(), vec![1]);
        assert_eq!(
            provider.comments(),
            vec![(1, "Closing this in favor of #3".to_string())]
        );
        assert!(provider.deleted_branches().contains(&"reqbot-branch-1".to_string()));
        assert!(reconciler.open_requests().iter().all(|r| r.number != 1));
    }

    #[tokio::test]
    async fn test_close_stale_keeps_human_touched_pr() {
        let provider = InMemoryProvider::new("acme/app", "main")
            .with_request(pr(1, "Update django to 1.1"), &["reqbot", "alice"])
            .with_request(pr(3, "Update django to 1.2"), &["reqbot"]);
        let config = Config::default();
        let current = update("django==1.0", "requirements.txt", "1.2");
        let units = sequential(&config, &[current.clone()]);
        let mut reconciler = Reconciler::load(&provider, &config, units).await.unwrap();

        let closed = reconciler
            .close_stale(&current, &pr(3, "Update django to 1.2"), false)
            .await;
        assert!(closed.is_empty());
        assert!(provider.closed_numbers().is_empty());
    }

    #[tokio::test]
    async fn test_close_stale_respects_conflicts() {
        let provider = InMemoryProvider::new("acme/app", "main")
            .with_request(pr(1, "Update django to 1.1"), &["reqbot"])
            .with_request(pr(3, "Update django to 1.2"), &["reqbot"]);
        let config = Config::default();
        let current = update("django==1.0", "a.txt", "1.2");
        let other = update("django==1.0", "b.txt", "1.1");
        let units = sequential(&config, &[current.clone(), other]);
        let mut reconciler = Reconciler::load(&provider, &config, units).await.unwrap();

        let closed = reconciler
            .close_stale(&current, &pr(3, "Update django to 1.2"), false)
            .await;
        assert!(closed.is_empty());
    }

    #[tokio::test]
    async fn test_close_stale_scheduled_supersedes_updates() {
        let provider = InMemoryProvider::new("acme/app", "main")
            .with_request(pr(1, "Update django to 1.1"), &["reqbot"])
            .with_request(pr(2, "Scheduled weekly dependency update for week 08"), &["reqbot"])
            .with_request(pr(3, "Pin six to latest version 1.2"), &["reqbot"])
            .with_request(pr(4, "Scheduled weekly dependency update for week 09"), &["reqbot"]);
        let config = Config::default();
        let current = update("django==1.0", "requirements.txt", "1.2");
        let mut reconciler = Reconciler::load(&provider, &config, Vec::new()).await.unwrap();

        let resolved = pr(4, "Scheduled weekly dependency update for week 09");
        let closed = reconciler.close_stale(&current, &resolved, true).await;
        assert_eq!(closed, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_close_stale_with_mock_provider() {
        let mut provider = MockProvider::new();
        provider
            .expect_get_pull_request_committers()
            .returning(|_| Ok(vec![Identity::new("someone")]));
        provider
            .expect_close_pull_request()
            .times(1)
            .returning(|_, _, _| Ok(()));
        let config = Config::default();
        let current = update("django==1.0", "requirements.txt", "1.2");
        let mut reconciler = Reconciler::with_requests(
            &provider,
            &config,
            vec![pr(1, "Update django to 1.1"), pr(3, "Update django to 1.2")],
            Vec::new(),
            None,
        );

        let closed = reconciler
            .close_stale(&current, &pr(3, "Update django to 1.2"), false)
            .await;
        assert_eq!(closed, vec![1]);
    }
}
