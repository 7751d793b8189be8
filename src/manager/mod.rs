//! Routing manager: keeps every repository's prefix file current.
//!
//! # Data Flow
//! ```text
//! periodic tick / repository events / admin requests
//!     → KeyedExecutor (one job per repository id)
//!         → hosted: local crawl
//!         → proxy:  remote strategies, merged with the local crawl
//!         → group:  union of member prefix files
//!     → publish / unpublish (FilePrefixSource)
//!     → PrefixFilePublished / PrefixFileUnpublished event
//!     → propagation to containing groups
//!
//! item stored / deleted in a hosted repository
//!     → PrefixSourceEditor offer / revoke → publish
//! ```
//!
//! # Propagation
//! - Membership changes republish the group and all its ancestors inline,
//!   members before groups, each once
//! - A background publish queues the containing groups as coalesced
//!   follow-up jobs, so concurrent member updates converge. Each queued job
//!   carries the ids already republished on its way up, and a group on that
//!   trail is not queued again, so membership cycles terminate
//! - A group's entries are the union over its leaf members, reached through
//!   nested groups with a visited set

pub mod dispatcher;
pub mod executor;
pub mod status;

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::runtime::Handle;
use tokio::sync::broadcast;

pub use dispatcher::EventDispatcher;
pub use executor::{Job, JobTicket, KeyedExecutor};
pub use status::{DStatus, DiscoveryStatus, PStatus, PublishingStatus, RoutingStatus, StatusTracker};

use crate::config::RoutingConfig;
use crate::discovery::{
    HttpTransport, LocalContentDiscoverer, PrefixFileStrategy, RemoteContentDiscoverer, RemoteStrategy, ScrapeStrategy,
};
use crate::error::{RoutingError, RoutingResult};
use crate::events::{EventBus, EventListener, RoutingEvent};
use crate::observability::metrics;
use crate::prefix::{path, FilePrefixSource, PrefixFileCodec, PrefixSource, PrefixSourceEditor, WritablePrefixSource};
use crate::repository::{Repository, RepositoryRegistry};

/// How a publish reaches the groups containing the repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Propagation {
    /// Republish every ancestor group inline, members first.
    Sync,
    /// Queue the direct groups as background follow-ups.
    Async,
    /// Do not touch groups.
    Skip,
}

/// What a proxy update decided.
enum ProxyUpdate {
    /// Blocked; the stored file is left as it is.
    Blocked,
    /// Replaced by a newer job for the same repository.
    Superseded,
    Computed(Option<Vec<String>>),
}

pub(crate) struct ManagerInner {
    config: RoutingConfig,
    registry: Arc<RepositoryRegistry>,
    events: Arc<EventBus>,
    codec: PrefixFileCodec,
    local: LocalContentDiscoverer,
    remote: RemoteContentDiscoverer,
    executor: KeyedExecutor,
    status: StatusTracker,
    publish_locks: DashMap<String, Arc<Mutex<()>>>,
    periodic_ran: AtomicBool,
    shutdown: broadcast::Sender<()>,
    dispatcher: OnceLock<Arc<dyn EventListener>>,
    runtime: Handle,
}

/// Cheap to clone handle to the routing subsystem.
#[derive(Clone)]
pub struct Manager {
    inner: Arc<ManagerInner>,
}

impl Manager {
    pub fn new(
        config: RoutingConfig,
        registry: Arc<RepositoryRegistry>,
        transport: HttpTransport,
        runtime: Handle,
    ) -> Self {
        let codec = PrefixFileCodec::from_config(&config);
        let remote = RemoteContentDiscoverer::new(vec![
            RemoteStrategy::PrefixFile(PrefixFileStrategy::new(
                transport.clone(),
                codec.clone(),
                config.prefix_file_path.clone(),
            )),
            RemoteStrategy::Scrape(ScrapeStrategy::new(transport, config.remote_scrape_depth)),
        ]);
        let (shutdown, _) = broadcast::channel(1);
        Self {
            inner: Arc::new(ManagerInner {
                local: LocalContentDiscoverer::new(config.local_scrape_depth),
                events: registry.events().clone(),
                executor: KeyedExecutor::new(runtime.clone()),
                status: StatusTracker::new(),
                publish_locks: DashMap::new(),
                periodic_ran: AtomicBool::new(false),
                dispatcher: OnceLock::new(),
                shutdown,
                runtime,
                registry,
                codec,
                remote,
                config,
            }),
        }
    }

    pub(crate) fn from_inner(inner: Arc<ManagerInner>) -> Self {
        Self { inner }
    }

    pub(crate) fn downgrade(&self) -> std::sync::Weak<ManagerInner> {
        Arc::downgrade(&self.inner)
    }

    pub fn config(&self) -> &RoutingConfig {
        &self.inner.config
    }

    pub fn registry(&self) -> &Arc<RepositoryRegistry> {
        &self.inner.registry
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.config.enabled
    }

    // == lifecycle

    /// Announce existing prefix files, start reacting to events and start the
    /// periodic updater (first pass runs immediately).
    pub fn startup(&self) {
        if !self.is_enabled() {
            tracing::info!("Automatic routing disabled");
            return;
        }
        for repository in self.inner.registry.all() {
            if !repository.in_service {
                continue;
            }
            let source = self.file_source(&repository);
            if source.exists() {
                tracing::debug!(repository = %repository.id, "Initializing prefix file");
                let event = if source.supported() {
                    RoutingEvent::PrefixFilePublished {
                        repository: repository.id.clone(),
                    }
                } else {
                    RoutingEvent::PrefixFileUnpublished {
                        repository: repository.id.clone(),
                    }
                };
                self.inner.events.emit(event);
            }
        }

        let dispatcher: Arc<dyn EventListener> = Arc::new(EventDispatcher::new(self));
        if self.inner.dispatcher.set(dispatcher.clone()).is_ok() {
            self.inner.events.register(dispatcher);
        }
        self.spawn_periodic_updater();
        tracing::info!(
            interval_secs = self.inner.config.update_interval_secs,
            "Automatic routing started"
        );
    }

    pub fn shutdown(&self) {
        if let Some(dispatcher) = self.inner.dispatcher.get() {
            self.inner.events.unregister(dispatcher);
        }
        let _ = self.inner.shutdown.send(());
        self.inner.executor.cancel_all();
        tracing::info!("Automatic routing stopped");
    }

    fn spawn_periodic_updater(&self) {
        let manager = self.clone();
        let mut shutdown = self.inner.shutdown.subscribe();
        let period = Duration::from_secs(self.inner.config.update_interval_secs.max(1));
        self.inner.runtime.spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        manager.may_update_all_prefix_files();
                        manager.inner.periodic_ran.store(true, Ordering::SeqCst);
                    }
                    _ = shutdown.recv() => break,
                }
            }
            tracing::debug!("Periodic updater stopped");
        });
    }

    /// One periodic pass: initialize repositories without a prefix file,
    /// refresh proxies whose discovery is due.
    fn may_update_all_prefix_files(&self) {
        tracing::trace!("Periodic prefix file update pass");
        for repository in self.inner.registry.all() {
            if !repository.in_service {
                tracing::trace!(repository = %repository.id, "Out of service, not updating");
                continue;
            }
            if !self.file_source(&repository).exists() {
                self.spawn_update(&repository.id, true);
            } else if repository.is_proxy() {
                self.may_update_proxy_prefix_file(&repository);
            }
        }
    }

    fn may_update_proxy_prefix_file(&self, repository: &Repository) -> bool {
        let discovery = self.discovery_status(repository);
        if !discovery.status.is_enabled() {
            tracing::debug!(repository = %repository.id, "Remote discovery disabled, not updating");
            return false;
        }
        let due = match discovery.status {
            DStatus::Error | DStatus::EnabledNotPossible => true,
            _ => match discovery.last_run {
                None => true,
                Some(last_run) => {
                    let elapsed = Utc::now().signed_duration_since(last_run);
                    elapsed.to_std().map(|e| e > repository.discovery.interval).unwrap_or(false)
                }
            },
        };
        if !due {
            tracing::debug!(repository = %repository.id, "Prefix file is up to date");
            return false;
        }
        let spawned = self.spawn_update(&repository.id, false);
        if !spawned {
            tracing::info!(
                repository = %repository.id,
                "Periodic remote discovery skipped as there is an ongoing job updating it, consider raising the update interval"
            );
        }
        spawned
    }

    // == public operations

    /// The stored prefix file of a repository. For groups it holds the union
    /// of the member files, kept current by propagation.
    pub fn prefix_source_for(&self, id: &str) -> RoutingResult<FilePrefixSource> {
        let repository = self.inner.registry.require(id)?;
        Ok(self.file_source(&repository))
    }

    /// Queue a rediscovery unless one is already running. Returns whether a job started.
    pub fn update_prefix_file(&self, id: &str) -> RoutingResult<bool> {
        self.check_update_conditions(id)?;
        Ok(self.spawn_update(id, false))
    }

    /// Restart rediscovery, cancelling a running job. Returns whether one was cancelled.
    pub fn force_update_prefix_file(&self, id: &str) -> RoutingResult<bool> {
        self.check_update_conditions(id)?;
        Ok(self.spawn_update(id, true))
    }

    /// Best-effort liveness: true until the first periodic pass completed,
    /// then while any job runs.
    pub fn is_update_job_running(&self) -> bool {
        if self.is_enabled() && !self.inner.periodic_ran.load(Ordering::SeqCst) {
            tracing::debug!("Periodic updater did not finish a pass yet");
            return true;
        }
        !self.inner.executor.running_keys().is_empty()
    }

    /// Ids of repositories with a running job.
    pub fn running_jobs(&self) -> Vec<String> {
        self.inner.executor.running_keys()
    }

    /// Poll until no update job runs. Returns false on timeout.
    pub async fn wait_for_quiescence(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.is_update_job_running() {
            if Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        true
    }

    pub fn status_for(&self, id: &str) -> RoutingResult<RoutingStatus> {
        let repository = self.inner.registry.require(id)?;
        let source = self.file_source(&repository);

        let publishing = if source.supported() {
            PublishingStatus {
                status: PStatus::Published,
                message: "Prefix file published successfully.".to_string(),
                published_at: source.last_modified().map(DateTime::<Utc>::from),
                path: Some(format!("/repositories/{}{}", repository.id, self.inner.config.prefix_file_path)),
            }
        } else {
            PublishingStatus {
                status: PStatus::NotPublished,
                message: self.not_published_message(&repository),
                published_at: None,
                path: None,
            }
        };

        Ok(RoutingStatus {
            publishing,
            discovery: self.discovery_status(&repository),
        })
    }

    /// Whether `path` is the prefix file itself.
    pub fn is_prefix_file(&self, item_path: &str) -> bool {
        path::normalize(item_path) == path::normalize(&self.inner.config.prefix_file_path)
    }

    /// Record a newly stored hosted item. Returns whether the prefix file changed.
    pub fn offer_entry(&self, id: &str, item_path: &str) -> RoutingResult<bool> {
        let normalized = path::normalize(item_path);
        let entry = if path::depth(&normalized) <= 1 {
            normalized.clone()
        } else {
            path::parent(&normalized).unwrap_or_else(|| normalized.clone())
        };
        self.edit_hosted(id, &normalized, |editor| editor.offer_entry(&entry))
    }

    /// Record a deleted hosted item or folder. Returns whether the prefix file changed.
    pub fn revoke_entry(&self, id: &str, item_path: &str) -> RoutingResult<bool> {
        let normalized = path::normalize(item_path);
        self.edit_hosted(id, &normalized, |editor| editor.revoke_entry(&normalized))
    }

    fn edit_hosted<F>(&self, id: &str, item_path: &str, edit: F) -> RoutingResult<bool>
    where
        F: FnOnce(&mut PrefixSourceEditor<'_, FilePrefixSource>) -> bool,
    {
        let repository = self.inner.registry.require(id)?;
        if !self.is_enabled() || !repository.is_hosted() || !repository.in_service {
            return Ok(false);
        }
        if self.is_prefix_file(item_path) || path::is_hidden(item_path) {
            return Ok(false);
        }
        // a full discovery in flight will overwrite any edit made now
        if self.inner.executor.has_running(id) {
            return Ok(false);
        }

        let source = self.file_source(&repository);
        let changed = {
            let lock = self.lock_for(id);
            let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
            if !source.supported() {
                return Ok(false);
            }
            let mut editor = PrefixSourceEditor::new(&source, self.inner.config.local_scrape_depth)?;
            if !edit(&mut editor) {
                return Ok(false);
            }
            editor.apply()?
        };
        if changed {
            tracing::debug!(repository = %id, item = %item_path, "Prefix file edited");
            self.announce(&repository, true, Propagation::Async);
        }
        Ok(changed)
    }

    // == publishing

    /// Persist `entries` as the repository's prefix file and announce it.
    pub fn publish(&self, repository: &Repository, entries: &[String], propagation: Propagation) -> RoutingResult<()> {
        let source = self.file_source(repository);
        let written = {
            let lock = self.lock_for(&repository.id);
            let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
            source.write_entries(entries)
        };
        if let Err(e) = written {
            metrics::record_publish("failed");
            tracing::warn!(repository = %repository.id, error = %e, "Prefix file could not be written, unpublishing");
            if matches!(e, RoutingError::InvalidInput(_)) {
                self.unpublish(repository, propagation)?;
            }
            return Err(e);
        }
        metrics::record_publish("published");
        self.announce(repository, true, propagation);
        Ok(())
    }

    /// Mark the repository as having no usable prefix file and announce it.
    pub fn unpublish(&self, repository: &Repository, propagation: Propagation) -> RoutingResult<()> {
        let source = self.file_source(repository);
        {
            let lock = self.lock_for(&repository.id);
            let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
            source.write_unsupported()?;
        }
        metrics::record_publish("unpublished");
        self.announce(repository, false, propagation);
        Ok(())
    }

    fn announce(&self, repository: &Repository, published: bool, propagation: Propagation) {
        let id = repository.id.clone();
        self.inner.events.emit(if published {
            RoutingEvent::PrefixFilePublished { repository: id }
        } else {
            RoutingEvent::PrefixFileUnpublished { repository: id }
        });
        self.propagate(&repository.id, propagation);
    }

    fn propagate(&self, id: &str, propagation: Propagation) {
        match propagation {
            Propagation::Skip => {}
            Propagation::Async => self.propagate_async(id, &[]),
            Propagation::Sync => {
                for group in self.inner.registry.ancestors_of(id) {
                    if let Err(e) = self.republish_group(&group) {
                        tracing::warn!(repository = %group.id, error = %e, "Group prefix file update failed");
                    }
                }
            }
        }
    }

    /// Queue the groups directly containing `id`, except those already on
    /// `trail` (the ids republished on the way here).
    fn propagate_async(&self, id: &str, trail: &[String]) {
        let mut trail = trail.to_vec();
        trail.push(id.to_string());
        for group in self.inner.registry.groups_of(id) {
            if trail.contains(&group.id) {
                tracing::debug!(repository = %group.id, member = %id, "Group membership cycle, not queueing again");
                continue;
            }
            tracing::debug!(repository = %group.id, member = %id, "Queueing group prefix file update");
            let job = self.job(group.id.clone(), trail.clone());
            self.inner.executor.execute_after(&group.id, job);
        }
    }

    /// Recompute a group and every group containing it, inline.
    pub fn republish_group_tree(&self, id: &str) -> RoutingResult<()> {
        let group = self.inner.registry.require(id)?;
        if !self.is_enabled() || !group.is_group() {
            return Ok(());
        }
        if group.in_service {
            self.republish_group(&group)?;
        }
        self.propagate(id, Propagation::Sync);
        Ok(())
    }

    fn republish_group(&self, group: &Repository) -> RoutingResult<()> {
        if !group.in_service {
            return Ok(());
        }
        match self.compute_group(group)? {
            Some(entries) => self.publish(group, &entries, Propagation::Skip),
            None => self.unpublish(group, Propagation::Skip),
        }
    }

    // == update jobs

    fn check_update_conditions(&self, id: &str) -> RoutingResult<Arc<Repository>> {
        let repository = self.inner.registry.require(id)?;
        if !self.is_enabled() {
            return Err(RoutingError::NotApplicable("Automatic routing is disabled".to_string()));
        }
        if !repository.in_service {
            return Err(RoutingError::NotApplicable(format!("Repository out of service '{}'", id)));
        }
        Ok(repository)
    }

    fn spawn_update(&self, id: &str, forced: bool) -> bool {
        let job = self.job(id.to_string(), Vec::new());
        if forced {
            let cancelled = self.inner.executor.must_execute(id, job);
            if cancelled {
                tracing::debug!(repository = %id, "Forced update cancelled a running discovery job");
            }
            cancelled
        } else {
            self.inner.executor.may_execute(id, job)
        }
    }

    fn job(&self, id: String, trail: Vec<String>) -> Job {
        let manager = self.clone();
        Box::pin(async move {
            if let Err(e) = manager.update_and_publish(&id, &trail).await {
                tracing::warn!(repository = %id, error = %e, "Problem during prefix file update");
            }
        })
    }

    /// Run `work` on the blocking pool; crawls and file writes never hold a
    /// runtime worker.
    async fn blocking<T, F>(&self, work: F) -> RoutingResult<T>
    where
        F: FnOnce(Manager) -> RoutingResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let manager = self.clone();
        self.inner
            .runtime
            .spawn_blocking(move || work(manager))
            .await
            .map_err(|e| RoutingError::Io(std::io::Error::other(e)))?
    }

    async fn update_and_publish(&self, id: &str, trail: &[String]) -> RoutingResult<()> {
        let ticket = JobTicket::current();
        let Some(repository) = self.inner.registry.get(id) else {
            tracing::debug!(repository = %id, "Repository gone, nothing to update");
            return Ok(());
        };
        if !repository.in_service {
            tracing::debug!(repository = %id, "Repository not in state for prefix file update");
            return Ok(());
        }
        tracing::debug!(repository = %id, kind = ?repository.kind, "Updating prefix file");

        let computed = if repository.is_group() {
            let group = repository.clone();
            self.blocking(move |manager| manager.compute_group(&group)).await?
        } else if repository.is_proxy() {
            match self.update_proxy(&repository, &ticket).await? {
                ProxyUpdate::Blocked | ProxyUpdate::Superseded => return Ok(()),
                ProxyUpdate::Computed(entries) => entries,
            }
        } else {
            let hosted = repository.clone();
            self.blocking(move |manager| manager.update_hosted(&hosted)).await?
        };

        let persisted = {
            let repository = repository.clone();
            let ticket = ticket.clone();
            self.blocking(move |manager| manager.persist(&repository, computed, &ticket))
                .await?
        };
        if persisted {
            self.propagate_async(id, trail);
        }
        Ok(())
    }

    /// Publish or unpublish the computed entries unless the job was replaced
    /// meanwhile. Returns whether anything was written.
    fn persist(&self, repository: &Repository, computed: Option<Vec<String>>, ticket: &JobTicket) -> RoutingResult<bool> {
        if ticket.is_cancelled() {
            tracing::debug!(repository = %repository.id, "Update superseded, not publishing");
            return Ok(false);
        }
        let was_supported = self.file_source(repository).supported();
        match computed {
            Some(entries) => {
                if !was_supported {
                    tracing::info!(repository = %repository.id, entries = entries.len(), "Updated and published prefix file");
                }
                // invalid entries leave the file unpublished, which groups must still see
                if let Err(e) = self.publish(repository, &entries, Propagation::Skip) {
                    if !matches!(e, RoutingError::InvalidInput(_)) {
                        return Err(e);
                    }
                }
            }
            None => {
                if was_supported {
                    tracing::info!(repository = %repository.id, "Unpublished prefix file (and is marked for noscrape)");
                }
                self.unpublish(repository, Propagation::Skip)?;
            }
        }
        Ok(true)
    }

    fn update_hosted(&self, repository: &Repository) -> RoutingResult<Option<Vec<String>>> {
        let result = self.inner.local.discover(repository)?;
        if result.is_successful() {
            Ok(result.into_prefix_source().map(|s| s.into_entries()))
        } else {
            tracing::debug!(repository = %repository.id, "Local discovery unsuccessful");
            Ok(None)
        }
    }

    async fn update_proxy(&self, repository: &Arc<Repository>, ticket: &JobTicket) -> RoutingResult<ProxyUpdate> {
        if !repository.proxy_mode.should_proxy() {
            self.inner.status.record_discovery(
                &repository.id,
                DiscoveryStatus::with_outcome(DStatus::EnabledNotPossible, "none", "Proxy repository is blocked."),
            );
            tracing::debug!(repository = %repository.id, "Not in state to be updated (is blocked)");
            return Ok(ProxyUpdate::Blocked);
        }
        if !self.discovery_enabled(repository) {
            tracing::info!(repository = %repository.id, "Remote discovery disabled");
            return Ok(ProxyUpdate::Computed(None));
        }

        let result = self.inner.remote.discover(repository).await;
        tracing::debug!(repository = %repository.id, outcomes = ?result.outcomes(), "Remote discovery finished");

        if ticket.is_cancelled() {
            tracing::debug!(repository = %repository.id, "Remote discovery superseded");
            return Ok(ProxyUpdate::Superseded);
        }

        let mut entries = None;
        if let Some(remote) = result.prefix_source().filter(|_| result.is_successful()) {
            if remote.supported() {
                let proxy = repository.clone();
                let remote = remote.entries().to_vec();
                entries = Some(
                    self.blocking(move |manager| Ok(manager.merge_with_local(&proxy, &remote)))
                        .await?,
                );
            }
        }

        if let Some(last) = result.last_outcome() {
            let status = if last.successful {
                DStatus::Successful
            } else if last.error {
                DStatus::Error
            } else {
                DStatus::Unsuccessful
            };
            self.inner.status.record_discovery(
                &repository.id,
                DiscoveryStatus::with_outcome(status, last.strategy_id.clone(), last.message.clone()),
            );
        }
        Ok(ProxyUpdate::Computed(entries))
    }

    /// Remote entries plus whatever is cached locally.
    fn merge_with_local(&self, repository: &Repository, remote: &[String]) -> Vec<String> {
        let mut seen: HashSet<String> = HashSet::new();
        let mut merged: Vec<String> = Vec::with_capacity(remote.len());
        for entry in remote {
            if seen.insert(entry.clone()) {
                merged.push(entry.clone());
            }
        }
        match self.inner.local.discover(repository) {
            Ok(local) => {
                if let Some(source) = local.prefix_source().filter(|_| local.is_successful()) {
                    for entry in source.entries() {
                        if seen.insert(entry.clone()) {
                            merged.push(entry.clone());
                        }
                    }
                }
            }
            Err(e) => {
                tracing::warn!(repository = %repository.id, error = %e, "Local discovery failed, using remote entries only");
            }
        }
        merged
    }

    /// Union of the prefix files of the group's leaf members, reached
    /// depth-first through nested groups. `None` when a leaf has none.
    fn compute_group(&self, group: &Repository) -> RoutingResult<Option<Vec<String>>> {
        let mut visited: HashSet<String> = HashSet::from([group.id.clone()]);
        let mut seen: HashSet<String> = HashSet::new();
        let mut entries = Vec::new();
        if self.collect_members(group, &mut visited, &mut seen, &mut entries)? {
            Ok(Some(entries))
        } else {
            Ok(None)
        }
    }

    fn collect_members(
        &self,
        group: &Repository,
        visited: &mut HashSet<String>,
        seen: &mut HashSet<String>,
        entries: &mut Vec<String>,
    ) -> RoutingResult<bool> {
        for member_id in &group.members {
            if !visited.insert(member_id.clone()) {
                tracing::debug!(repository = %group.id, member = %member_id, "Member already visited, skipping");
                continue;
            }
            let Some(member) = self.inner.registry.get(member_id) else {
                tracing::debug!(repository = %group.id, member = %member_id, "Unknown group member ignored");
                continue;
            };
            if !member.in_service {
                continue;
            }
            if member.is_group() {
                if !self.collect_members(&member, visited, seen, entries)? {
                    return Ok(false);
                }
                continue;
            }
            let source = self.file_source(&member);
            if !source.supported() {
                tracing::debug!(repository = %group.id, member = %member_id, "Member has no published prefix file");
                return Ok(false);
            }
            for entry in source.read_entries()? {
                if seen.insert(entry.clone()) {
                    entries.push(entry);
                }
            }
        }
        Ok(true)
    }

    // == status helpers

    fn discovery_enabled(&self, repository: &Repository) -> bool {
        self.inner.config.enabled && repository.is_proxy() && repository.discovery.enabled
    }

    fn discovery_status(&self, repository: &Repository) -> DiscoveryStatus {
        if !repository.is_proxy() {
            return DiscoveryStatus::new(DStatus::NotAProxy);
        }
        if !self.discovery_enabled(repository) {
            return DiscoveryStatus::new(DStatus::Disabled);
        }
        if self.inner.executor.has_running(&repository.id) {
            return DiscoveryStatus::new(DStatus::EnabledInProgress);
        }
        match self.inner.status.discovery(&repository.id) {
            Some(status) => status,
            None if !repository.in_service => DiscoveryStatus::with_outcome(
                DStatus::EnabledNotPossible,
                "none",
                "Repository is out of service.",
            ),
            None => DiscoveryStatus::new(DStatus::EnabledInProgress),
        }
    }

    fn not_published_message(&self, repository: &Repository) -> String {
        if repository.is_group() {
            let missing: Vec<String> = repository
                .members
                .iter()
                .filter_map(|m| self.inner.registry.get(m))
                .filter(|member| !self.file_source(member).supported())
                .map(|member| member.name.clone())
                .collect();
            format!(
                "Publishing not possible, following members have no published prefix file: {}",
                missing.join(", ")
            )
        } else if repository.is_proxy() {
            if self.discovery_enabled(repository) {
                "Discovery in progress or unable to discover remote content (see discovery status).".to_string()
            } else {
                "Remote discovery not enabled.".to_string()
            }
        } else {
            "Check logs for more details.".to_string()
        }
    }

    pub(crate) fn prefix_source_exists(&self, repository: &Repository) -> bool {
        self.file_source(repository).exists()
    }

    /// Update without the in-service checks of the public entry points.
    pub(crate) fn request_update(&self, id: &str, forced: bool) {
        if self.is_enabled() {
            self.spawn_update(id, forced);
        }
    }

    pub(crate) fn propagate_from(&self, id: &str, propagation: Propagation) {
        if self.is_enabled() {
            self.propagate(id, propagation);
        }
    }

    pub(crate) fn forget(&self, id: &str) {
        self.inner.executor.cancel(id);
        self.inner.status.reset(id);
        self.inner.publish_locks.remove(id);
    }

    fn file_source(&self, repository: &Repository) -> FilePrefixSource {
        FilePrefixSource::new(
            repository.store.clone(),
            self.inner.config.prefix_file_path.clone(),
            self.inner.codec.clone(),
        )
    }

    fn lock_for(&self, id: &str) -> Arc<Mutex<()>> {
        self.inner
            .publish_locks
            .entry(id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone()
    }
}
