//! Bot run orchestration
//!
//! This module provides:
//! - Workflow coordination: configure → discover → evaluate → group → reconcile → commit
//! - Repository configuration loading with error reporting through an issue
//! - Branch creation with an optional delete-if-empty retry
//! - Per-unit commits chained through the latest revision of each manifest
//! - Pull request creation with a one-time permission remediation
//! - Dry-run mode support
//!
//! Only repository and default-branch resolution abort a run. Every other
//! failure is logged and limited to the manifest, edit or unit it hit.

use crate::config::{Config, CONFIG_FILE};
use crate::domain::{
    prefixed_title, ChangeRequest, EditSummary, PackageVersions, RunSummary, UnitOutcome,
    UnitSummary, CONFIG_ERROR_TITLE,
};
use crate::error::{AppError, ConfigError, ProviderError};
use crate::manifest::{discover, ManifestSet};
use crate::progress::Progress;
use crate::provider::{NewCommit, NewPullRequest, Provider};
use crate::reconcile::Reconciler;
use crate::registry::{AdvisorySource, NoAdvisories, VersionOracle};
use crate::rewriter::rewrite;
use crate::update::{
    select_grouping, GroupingStrategy, RequirementUpdate, UpdateGrouper, UpdateUnit,
    EMPTY_INITIAL_BODY, INITIAL_TITLE,
};
use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use std::collections::HashMap;
use std::sync::Arc;

/// Switches of one run
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// First run for the repository: bundle everything into one unit
    pub initial: bool,
    /// Scheduled run: bundle according to the configured cadence
    pub scheduled: bool,
    /// Compute and log everything, write nothing
    pub dry_run: bool,
    /// Show progress spinners
    pub show_progress: bool,
}

/// Latest content and revision of a manifest on the working branch
struct WorkingFile {
    content: String,
    revision: Option<String>,
}

/// Dependency update bot bound to one repository
pub struct Bot {
    provider: Arc<dyn Provider>,
    oracle: Arc<dyn VersionOracle>,
    advisories: Arc<dyn AdvisorySource>,
    config: Config,
    /// Current time for inline filter expiry and scheduled titles
    now: DateTime<Utc>,
}

impl Bot {
    pub fn new(provider: Arc<dyn Provider>, oracle: Arc<dyn VersionOracle>, config: Config) -> Self {
        Self {
            provider,
            oracle,
            advisories: Arc::new(NoAdvisories),
            config,
            now: Utc::now(),
        }
    }

    pub fn with_advisories(mut self, advisories: Arc<dyn AdvisorySource>) -> Self {
        self.advisories = advisories;
        self
    }

    /// Use a fixed current time (for testing)
    pub fn with_time(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    /// Effective configuration after `configure`
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run the whole update workflow
    pub async fn run(&mut self, options: &RunOptions) -> Result<RunSummary, AppError> {
        let mut progress = Progress::new(options.show_progress);
        let mut summary = RunSummary::new(self.provider.repo_name(), options.dry_run);

        progress.spinner("Loading configuration...");
        let configured = self.configure(options.dry_run, &mut summary).await;
        progress.finish_and_clear();
        configured?;

        let strategy = select_grouping(options.initial, options.scheduled, &self.config)?;
        debug!("grouping strategy: {:?}", strategy);

        progress.spinner("Discovering requirement files...");
        let branch = self.config.base_branch().to_string();
        let manifests = discover(self.provider.as_ref(), &self.config, &branch).await;
        progress.finish_and_clear();
        summary.manifests = manifests.iter().map(|m| m.path.clone()).collect();
        info!("found {} requirement files", manifests.len());

        let candidates = self.evaluate(&manifests, &mut progress).await;

        let grouper = UpdateGrouper::with_time(&self.config, self.now);
        let units = grouper.group(strategy, &candidates);
        let sequential = if strategy == GroupingStrategy::Sequential {
            units.clone()
        } else {
            grouper.group(GroupingStrategy::Sequential, &candidates)
        };

        if options.initial && units.is_empty() {
            self.report_up_to_date(options.dry_run, &mut summary).await;
            return Ok(summary);
        }

        progress.spinner("Reconciling change-requests...");
        self.apply_updates(units, sequential, &manifests, options, &mut summary)
            .await;
        progress.finish_and_clear();

        Ok(summary)
    }

    /// Resolve the base branch and merge the repository configuration file.
    ///
    /// A broken configuration file is reported through an issue and the run
    /// continues with the configuration it had before.
    async fn configure(&mut self, dry_run: bool, summary: &mut RunSummary) -> Result<(), AppError> {
        if self.config.branch.is_none() {
            let branch = self.provider.get_default_branch().await?;
            self.config.branch = Some(branch);
        } else {
            // still fails fast on unknown repositories
            self.provider.get_default_branch().await?;
        }

        let file = match self
            .provider
            .get_file(CONFIG_FILE, self.config.base_branch())
            .await
        {
            Ok(file) => file,
            Err(e) => {
                warn!("unable to fetch {}: {}", CONFIG_FILE, e);
                return Ok(());
            }
        };
        let Some(content) = file.content else {
            debug!("no {} on {}", CONFIG_FILE, self.config.base_branch());
            return Ok(());
        };

        match self.config.apply_file(&content) {
            Ok(()) => info!("using configuration {}", self.config),
            Err(e) => {
                warn!("{}", e);
                summary.add_error(e.to_string());
                self.report_config_error(&e, dry_run, summary).await;
            }
        }
        Ok(())
    }

    async fn report_config_error(&self, e: &ConfigError, dry_run: bool, summary: &mut RunSummary) {
        let open = match self.provider.iter_open_requests().await {
            Ok(open) => open,
            Err(e) => {
                warn!("unable to list open change-requests: {}", e);
                Vec::new()
            }
        };
        if open.iter().any(|r| r.is_issue && r.title == CONFIG_ERROR_TITLE) {
            debug!("issue '{}' is already open", CONFIG_ERROR_TITLE);
            return;
        }
        let body = format!(
            "The configuration in `{}` could not be read:\n\n```\n{}\n```\n\nThis run used the default configuration.",
            CONFIG_FILE, e
        );
        self.create_issue(CONFIG_ERROR_TITLE, &body, dry_run, summary)
            .await;
    }

    async fn report_up_to_date(&self, dry_run: bool, summary: &mut RunSummary) {
        info!("initial run found nothing to update");
        let title = prefixed_title(INITIAL_TITLE, &self.config.pr_prefix);
        self.create_issue(&title, EMPTY_INITIAL_BODY, dry_run, summary)
            .await;
    }

    async fn create_issue(&self, title: &str, body: &str, dry_run: bool, summary: &mut RunSummary) {
        if dry_run {
            info!("dry run: would open issue '{}'", title);
            summary.issues.push(title.to_string());
            return;
        }
        match self.provider.create_issue(title, body).await {
            Ok(Some(issue)) => {
                info!("opened issue #{} '{}'", issue.number, title);
                summary.issues.push(title.to_string());
            }
            Ok(None) => info!("issues are disabled, unable to open '{}'", title),
            Err(e) => {
                warn!("unable to open issue '{}': {}", title, e);
                summary.add_error(e.to_string());
            }
        }
    }

    /// Turn every requirement needing an update into a candidate edit
    async fn evaluate(&self, manifests: &ManifestSet, progress: &mut Progress) -> Vec<RequirementUpdate> {
        let total = manifests.requirements().count();
        progress.start(total as u64, "Checking requirements");

        let mut cache: HashMap<(String, Option<String>), Option<PackageVersions>> = HashMap::new();
        let mut candidates = Vec::new();

        for (manifest, requirement) in manifests.requirements() {
            progress.set_message(&format!("Checking {}", requirement.name));
            let cache_key = (requirement.key.clone(), requirement.index_url.clone());
            if !cache.contains_key(&cache_key) {
                let versions = match self
                    .oracle
                    .fetch(&requirement.key, requirement.index_url.clone())
                    .await
                {
                    Ok(versions) => versions,
                    Err(e) => {
                        warn!("unable to fetch versions of {}: {}", requirement.key, e);
                        None
                    }
                };
                cache.insert(cache_key.clone(), versions);
            }
            let package = cache.get(&cache_key).and_then(|p| p.as_ref());

            let evaluation = requirement.evaluate(package, self.now);
            progress.inc();
            let Some(target) = evaluation.target.filter(|_| evaluation.needs_update) else {
                continue;
            };
            let insecure = self
                .advisories
                .is_insecure(requirement, evaluation.current.as_deref())
                .await;
            debug!(
                "{} in {} can be updated to {}",
                requirement.key, manifest.path, target
            );
            candidates.push(
                RequirementUpdate::new(
                    requirement.clone(),
                    manifest.path.clone(),
                    evaluation.current,
                    target,
                )
                .with_insecure(insecure),
            );
        }
        progress.finish_and_clear();
        candidates
    }

    /// Whether this run may open change-requests at all
    fn can_pull(&self, initial: bool, scheduled: bool) -> bool {
        if !initial && self.config.is_valid_schedule() {
            return scheduled;
        }
        true
    }

    async fn apply_updates(
        &self,
        units: Vec<UpdateUnit>,
        sequential: Vec<UpdateUnit>,
        manifests: &ManifestSet,
        options: &RunOptions,
        summary: &mut RunSummary,
    ) {
        let mut reconciler =
            match Reconciler::load(self.provider.as_ref(), &self.config, sequential.clone()).await {
                Ok(reconciler) => reconciler,
                Err(e) => {
                    warn!("unable to list open change-requests: {}", e);
                    Reconciler::with_requests(
                        self.provider.as_ref(),
                        &self.config,
                        Vec::new(),
                        sequential,
                        None,
                    )
                }
            };
        let initial_gate = reconciler.initial_gate().cloned();
        let can_pull = self.can_pull(options.initial, options.scheduled);

        for mut unit in units {
            if unit.updates.is_empty() {
                continue;
            }
            let title = prefixed_title(&unit.title, &self.config.pr_prefix);
            let branch = format!("{}{}", self.config.branch_prefix, unit.branch);

            let (outcome, resolved) = if let Some(gate) = &initial_gate {
                debug!("initial update #{} is open, attaching {}", gate.number, title);
                (UnitOutcome::Gated { number: gate.number }, Some(gate.clone()))
            } else if let Some(existing) = reconciler.find_by_title(&title) {
                debug!("reusing #{} for {}", existing.number, title);
                (
                    UnitOutcome::Reused {
                        number: existing.number,
                    },
                    Some(existing.clone()),
                )
            } else if !can_pull {
                (
                    UnitOutcome::Skipped {
                        reason: "pull requests are only opened by scheduled runs".to_string(),
                    },
                    None,
                )
            } else if options.dry_run {
                info!("dry run: would open '{}' from {}", title, branch);
                (UnitOutcome::Planned, None)
            } else {
                match self
                    .commit_and_pull(&unit, &title, &branch, manifests, summary)
                    .await
                {
                    Ok(Some(request)) => {
                        reconciler.track(request.clone());
                        (
                            UnitOutcome::Created {
                                number: request.number,
                                url: request.url.clone(),
                            },
                            Some(request),
                        )
                    }
                    Ok(None) => (
                        UnitOutcome::Skipped {
                            reason: "nothing was committed".to_string(),
                        },
                        None,
                    ),
                    Err(e) => {
                        error!("unable to open '{}': {}", title, e);
                        (
                            UnitOutcome::Failed {
                                message: e.to_string(),
                            },
                            None,
                        )
                    }
                }
            };

            if let Some(request) = &resolved {
                for update in unit.updates.iter_mut() {
                    update.requirement.attach_change_request(request.number);
                }
                if self.config.close_prs && !options.initial && !options.dry_run {
                    for update in &unit.updates {
                        let closed = reconciler
                            .close_stale(update, request, options.scheduled)
                            .await;
                        summary.closed.extend(closed);
                        // a bundle supersedes everything at once
                        if request.is_scheduled() {
                            break;
                        }
                    }
                }
            }

            summary.add_unit(UnitSummary {
                title,
                branch,
                edits: unit
                    .updates
                    .iter()
                    .map(|u| EditSummary {
                        key: u.key().to_string(),
                        path: u.manifest_path.clone(),
                        from: u.pinned_version().map(str::to_string),
                        to: u.target.clone(),
                    })
                    .collect(),
                outcome,
            });
        }
    }

    /// Create `branch` from the base branch.
    ///
    /// Returns `Ok(false)` when the branch already exists and was kept. With
    /// `delete_empty` an existing branch without commits is deleted and
    /// created once more.
    pub async fn create_branch(&self, branch: &str, delete_empty: bool) -> Result<bool, ProviderError> {
        let base = self.config.base_branch();
        info!("preparing to create branch {} from {}", branch, base);
        let mut delete_empty = delete_empty;
        loop {
            match self.provider.create_branch(base, branch).await {
                Ok(()) => {
                    info!("created branch {} from {}", branch, base);
                    return Ok(true);
                }
                Err(ProviderError::BranchExists { .. }) => {
                    info!("branch {} exists", branch);
                    if !delete_empty {
                        return Ok(false);
                    }
                    if !self.provider.is_empty_branch(base, branch).await? {
                        info!("branch {} is not empty", branch);
                        return Ok(false);
                    }
                    self.provider.delete_branch(branch).await?;
                    info!("branch {} was empty and has been deleted", branch);
                    delete_empty = false;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Commit every edit of `unit` on `branch` and open the pull request.
    ///
    /// Returns `Ok(None)` when the branch was taken or no edit produced a commit.
    async fn commit_and_pull(
        &self,
        unit: &UpdateUnit,
        title: &str,
        branch: &str,
        manifests: &ManifestSet,
        summary: &mut RunSummary,
    ) -> Result<Option<ChangeRequest>, ProviderError> {
        info!("preparing commit {}", title);
        if !self.create_branch(branch, true).await? {
            return Ok(None);
        }

        let mut working: HashMap<String, WorkingFile> = HashMap::new();
        let mut committed = 0usize;

        for update in &unit.updates {
            let path = update.manifest_path.as_str();
            if !working.contains_key(path) {
                let Some(manifest) = manifests.get(path) else {
                    warn!("{} is not a known requirement file", path);
                    continue;
                };
                working.insert(
                    path.to_string(),
                    WorkingFile {
                        content: manifest.content.clone(),
                        revision: manifest.revision.clone(),
                    },
                );
            }
            let Some(file) = working.get_mut(path) else {
                continue;
            };

            let hashes = if self.config.update_hashes && !update.requirement.hashes.is_empty() {
                match self.oracle.fetch_hashes(update.key(), &update.target).await {
                    Ok(hashes) => hashes,
                    Err(e) => {
                        error!("unable to fetch hashes of {} {}: {}", update.key(), update.target, e);
                        summary.add_error(e.to_string());
                        continue;
                    }
                }
            } else {
                Vec::new()
            };

            let content = rewrite(&file.content, &update.requirement, &update.target, &hashes);
            if content == file.content {
                error!(
                    "empty commit at {}, unable to update {} in {}",
                    branch, update.key(), path
                );
                summary.empty_edits += 1;
                continue;
            }

            let commit = NewCommit {
                path: path.to_string(),
                branch: branch.to_string(),
                content,
                message: update.commit_message.clone(),
                revision: file.revision.clone(),
            };
            match self.provider.create_commit(&commit).await {
                Ok(revision) => {
                    file.content = commit.content;
                    file.revision = Some(revision);
                    committed += 1;
                }
                Err(e) => {
                    error!("unable to commit {} on {}: {}", path, branch, e);
                    summary.add_error(e.to_string());
                }
            }
        }

        if committed == 0 {
            return Ok(None);
        }
        let request = NewPullRequest {
            title: title.to_string(),
            body: unit.body.clone(),
            base: self.config.base_branch().to_string(),
            head: branch.to_string(),
            labels: self.config.label_prs.iter().cloned().collect(),
            assignees: self.config.assignees.clone(),
        };
        self.create_pull_request(&request).await.map(Some)
    }

    /// Open a pull request, granting permissions and retrying once when
    /// the acting identity is not allowed to
    async fn create_pull_request(
        &self,
        request: &NewPullRequest,
    ) -> Result<ChangeRequest, ProviderError> {
        match self.provider.create_pull_request(request).await {
            Err(ProviderError::NoPermission { message }) => {
                warn!("no permission to open '{}': {}", request.title, message);
                self.provider.grant_pull_request_permissions().await?;
                self.provider.create_pull_request(request).await
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::InMemoryProvider;
    use crate::registry::InMemoryOracle;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 3, 12, 0, 0).unwrap()
    }

    fn bot(provider: &Arc<InMemoryProvider>, oracle: InMemoryOracle, config: Config) -> Bot {
        Bot::new(provider.clone(), Arc::new(oracle), config).with_time(now())
    }

    fn options() -> RunOptions {
        RunOptions::default()
    }

    #[tokio::test]
    async fn test_can_pull() {
        let provider = Arc::new(InMemoryProvider::new("acme/app", "main"));
        let plain = bot(&provider, InMemoryOracle::new(), Config::default());
        assert!(plain.can_pull(false, false));

        let scheduled = bot(
            &provider,
            InMemoryOracle::new(),
            Config {
                schedule: "every day".to_string(),
                ..Config::default()
            },
        );
        assert!(!scheduled.can_pull(false, false));
        assert!(scheduled.can_pull(false, true));
        assert!(scheduled.can_pull(true, false));
    }

    #[tokio::test]
    async fn test_configure_merges_file() {
        let provider = Arc::new(
            InMemoryProvider::new("acme/app", "main")
                .with_file(".reqbot.yml", "close_prs: false\npr_prefix: \"[deps]\"\n"),
        );
        let mut bot = bot(&provider, InMemoryOracle::new(), Config::default());
        let summary = bot.run(&options()).await.unwrap();
        assert!(summary.errors.is_empty());
        assert_eq!(bot.config().base_branch(), "main");
        assert!(!bot.config().close_prs);
        assert_eq!(bot.config().pr_prefix, "[deps]");
    }

    #[tokio::test]
    async fn test_invalid_config_opens_issue_once() {
        let provider = Arc::new(
            InMemoryProvider::new("acme/app", "main").with_file(".reqbot.yml", "update: [\n"),
        );
        let mut first = bot(&provider, InMemoryOracle::new(), Config::default());
        let summary = first.run(&options()).await.unwrap();
        assert_eq!(summary.issues, vec![CONFIG_ERROR_TITLE.to_string()]);
        assert_eq!(summary.errors.len(), 1);

        let mut second = bot(&provider, InMemoryOracle::new(), Config::default());
        let summary = second.run(&options()).await.unwrap();
        assert!(summary.issues.is_empty());
        assert_eq!(provider.issues().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_repository_is_fatal() {
        let provider = Arc::new(InMemoryProvider::new("acme/app", "main").missing());
        let mut bot = bot(&provider, InMemoryOracle::new(), Config::default());
        let result = bot.run(&options()).await;
        assert!(matches!(
            result,
            Err(AppError::Provider(ProviderError::RepoDoesNotExist { .. }))
        ));
    }

    #[tokio::test]
    async fn test_create_branch_delete_empty() {
        let provider = Arc::new(
            InMemoryProvider::new("acme/app", "main")
                .with_branch("reqbot-empty", 0)
                .with_branch("reqbot-busy", 2),
        );
        let bot = bot(
            &provider,
            InMemoryOracle::new(),
            Config {
                branch: Some("main".to_string()),
                ..Config::default()
            },
        );

        assert!(!bot.create_branch("reqbot-empty", false).await.unwrap());
        assert!(bot.create_branch("reqbot-empty", true).await.unwrap());
        assert_eq!(provider.deleted_branches(), vec!["reqbot-empty".to_string()]);
        assert!(!bot.create_branch("reqbot-busy", true).await.unwrap());
        assert!(bot.create_branch("reqbot-new", true).await.unwrap());
    }

    #[tokio::test]
    async fn test_sequential_run_opens_pull_request() {
        let provider = Arc::new(
            InMemoryProvider::new("acme/app", "main")
                .with_file("requirements.txt", "Django==1.4.1\nsix==1.16.0\n"),
        );
        let oracle = InMemoryOracle::new()
            .with_package("django", ["1.4.1", "1.4.2"])
            .with_package("six", ["1.16.0"]);
        let mut bot = bot(&provider, oracle, Config::default());

        let summary = bot.run(&options()).await.unwrap();

        assert_eq!(summary.created_count(), 1);
        let opened = provider.opened_pull_requests();
        assert_eq!(opened.len(), 1);
        assert_eq!(opened[0].title, "Update django to 1.4.2");
        assert_eq!(opened[0].head, "reqbot-update-django-1.4.1-to-1.4.2");
        assert_eq!(opened[0].base, "main");
        assert_eq!(
            provider
                .file("reqbot-update-django-1.4.1-to-1.4.2", "requirements.txt")
                .unwrap(),
            "Django==1.4.2\nsix==1.16.0\n"
        );
        assert_eq!(
            provider.commits()[0].message,
            "Update django from 1.4.1 to 1.4.2"
        );
    }

    #[tokio::test]
    async fn test_dry_run_writes_nothing() {
        let provider = Arc::new(
            InMemoryProvider::new("acme/app", "main").with_file("requirements.txt", "Django==1.4.1\n"),
        );
        let oracle = InMemoryOracle::new().with_package("django", ["1.4.1", "1.4.2"]);
        let mut bot = bot(&provider, oracle, Config::default());

        let summary = bot
            .run(&RunOptions {
                dry_run: true,
                ..RunOptions::default()
            })
            .await
            .unwrap();

        assert_eq!(summary.units.len(), 1);
        assert_eq!(summary.units[0].outcome, UnitOutcome::Planned);
        assert!(provider.commits().is_empty());
        assert!(provider.opened_pull_requests().is_empty());
        assert_eq!(provider.branch_names().len(), 1);
    }

    #[tokio::test]
    async fn test_schedule_blocks_unscheduled_runs() {
        let provider = Arc::new(
            InMemoryProvider::new("acme/app", "main")
                .with_file("requirements.txt", "Django==1.4.1\n")
                .with_file(".reqbot.yml", "schedule: every week\n"),
        );
        let oracle = InMemoryOracle::new().with_package("django", ["1.4.1", "1.4.2"]);
        let mut bot = bot(&provider, oracle, Config::default());

        let summary = bot.run(&options()).await.unwrap();
        assert!(matches!(
            summary.units[0].outcome,
            UnitOutcome::Skipped { .. }
        ));
        assert!(provider.opened_pull_requests().is_empty());
    }

    #[tokio::test]
    async fn test_no_permission_is_remediated_once() {
        let provider = Arc::new(
            InMemoryProvider::new("acme/app", "main")
                .with_file("requirements.txt", "Django==1.4.1\n")
                .requiring_permission(),
        );
        let oracle = InMemoryOracle::new().with_package("django", ["1.4.1", "1.4.2"]);
        let mut bot = bot(&provider, oracle, Config::default());

        let summary = bot.run(&options()).await.unwrap();
        assert_eq!(summary.created_count(), 1);
        assert_eq!(provider.opened_pull_requests().len(), 1);
    }
}
