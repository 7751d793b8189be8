//! Repository registry.
//!
//! # Responsibilities
//! - Resolve a repository id to its kind, members, proxy mode and remote URL
//! - Own each repository's content store
//! - Turn configuration changes and content changes into routing events
//!
//! # Design Decisions
//! - Repositories are immutable snapshots (`Arc<Repository>`); an update
//!   swaps the whole entry
//! - Events are emitted after the map is updated, never while a shard lock
//!   is held, so listeners may read the registry

use std::collections::{BTreeSet, HashSet, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use url::Url;

pub use crate::config::{ProxyMode, RepositoryKind};
use crate::config::{RepositoryConfig, RouterConfig, StorageConfig};
use crate::error::{RoutingError, RoutingResult};
use crate::events::{EventBus, RepositoryChanges, RoutingEvent};
use crate::storage::{ContentStore, FsContentStore, MemoryContentStore};

/// Remote discovery settings of a proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscoveryConfig {
    pub enabled: bool,
    pub interval: Duration,
}

#[derive(Debug, Clone)]
pub struct Repository {
    pub id: String,
    pub name: String,
    pub kind: RepositoryKind,
    /// Member ids, groups only.
    pub members: Vec<String>,
    pub remote_url: Option<Url>,
    pub proxy_mode: ProxyMode,
    pub in_service: bool,
    pub discovery: DiscoveryConfig,
    pub store: Arc<dyn ContentStore>,
}

impl Repository {
    /// Hosted repository without members or remote.
    pub fn hosted(id: &str, store: Arc<dyn ContentStore>) -> Self {
        Self {
            id: id.to_string(),
            name: id.to_string(),
            kind: RepositoryKind::Hosted,
            members: Vec::new(),
            remote_url: None,
            proxy_mode: ProxyMode::Allow,
            in_service: true,
            discovery: DiscoveryConfig {
                enabled: false,
                interval: Duration::from_secs(24 * 3600),
            },
            store,
        }
    }

    pub fn proxy(id: &str, remote_url: Url, store: Arc<dyn ContentStore>) -> Self {
        Self {
            kind: RepositoryKind::Proxy,
            remote_url: Some(remote_url),
            discovery: DiscoveryConfig {
                enabled: true,
                interval: Duration::from_secs(24 * 3600),
            },
            ..Self::hosted(id, store)
        }
    }

    pub fn group(id: &str, members: &[&str], store: Arc<dyn ContentStore>) -> Self {
        Self {
            kind: RepositoryKind::Group,
            members: members.iter().map(|m| m.to_string()).collect(),
            ..Self::hosted(id, store)
        }
    }

    pub fn from_config(
        config: &RepositoryConfig,
        default_interval: Duration,
        store: Arc<dyn ContentStore>,
    ) -> RoutingResult<Self> {
        let remote_url = match config.remote_url.as_deref() {
            Some(raw) => Some(Url::parse(raw).map_err(|e| {
                RoutingError::InvalidInput(format!("Repository '{}' remote URL '{}': {}", config.id, raw, e))
            })?),
            None => None,
        };
        Ok(Self {
            id: config.id.clone(),
            name: config.name.clone().unwrap_or_else(|| config.id.clone()),
            kind: config.kind,
            members: config.members.clone(),
            remote_url,
            proxy_mode: config.proxy_mode,
            in_service: config.in_service,
            discovery: DiscoveryConfig {
                enabled: config.kind == RepositoryKind::Proxy && config.discovery_enabled,
                interval: config
                    .discovery_interval_secs
                    .map(Duration::from_secs)
                    .unwrap_or(default_interval),
            },
            store,
        })
    }

    pub fn is_group(&self) -> bool {
        self.kind == RepositoryKind::Group
    }

    pub fn is_proxy(&self) -> bool {
        self.kind == RepositoryKind::Proxy
    }

    pub fn is_hosted(&self) -> bool {
        self.kind == RepositoryKind::Hosted
    }

    /// Settings that differ from `previous`, as far as routing cares.
    pub fn changes_since(&self, previous: &Repository) -> RepositoryChanges {
        RepositoryChanges {
            remote_url: self.remote_url != previous.remote_url,
            proxy_mode: self.proxy_mode != previous.proxy_mode,
            discovery: self.discovery != previous.discovery,
            in_service: self.in_service != previous.in_service,
            members: self.members != previous.members,
        }
    }

    /// Builder-style overrides, handy when wiring repositories by hand.
    pub fn with_proxy_mode(mut self, proxy_mode: ProxyMode) -> Self {
        self.proxy_mode = proxy_mode;
        self
    }

    pub fn with_in_service(mut self, in_service: bool) -> Self {
        self.in_service = in_service;
        self
    }

    pub fn with_discovery(mut self, enabled: bool, interval: Duration) -> Self {
        self.discovery = DiscoveryConfig { enabled, interval };
        self
    }

    pub fn with_members(mut self, members: &[&str]) -> Self {
        self.members = members.iter().map(|m| m.to_string()).collect();
        self
    }
}

/// Creates content stores for repositories defined in configuration.
#[derive(Debug, Clone)]
pub enum StoreFactory {
    Memory,
    Fs(PathBuf),
}

impl StoreFactory {
    pub fn from_config(config: &StorageConfig) -> Self {
        match &config.root {
            Some(root) => StoreFactory::Fs(PathBuf::from(root)),
            None => StoreFactory::Memory,
        }
    }

    pub fn create(&self, id: &str) -> RoutingResult<Arc<dyn ContentStore>> {
        match self {
            StoreFactory::Memory => Ok(Arc::new(MemoryContentStore::new())),
            StoreFactory::Fs(root) => {
                let dir = root.join(id);
                std::fs::create_dir_all(&dir)?;
                Ok(Arc::new(FsContentStore::new(dir)))
            }
        }
    }
}

pub struct RepositoryRegistry {
    repositories: DashMap<String, Arc<Repository>>,
    events: Arc<EventBus>,
}

impl RepositoryRegistry {
    pub fn new(events: Arc<EventBus>) -> Self {
        Self {
            repositories: DashMap::new(),
            events,
        }
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    pub fn get(&self, id: &str) -> Option<Arc<Repository>> {
        self.repositories.get(id).map(|r| r.value().clone())
    }

    pub fn require(&self, id: &str) -> RoutingResult<Arc<Repository>> {
        self.get(id)
            .ok_or_else(|| RoutingError::UnknownRepository(id.to_string()))
    }

    /// All repositories, ordered by id.
    pub fn all(&self) -> Vec<Arc<Repository>> {
        let mut all: Vec<Arc<Repository>> = self.repositories.iter().map(|r| r.value().clone()).collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }

    pub fn len(&self) -> usize {
        self.repositories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.repositories.is_empty()
    }

    /// Groups listing `id` as a direct member, ordered by id.
    pub fn groups_of(&self, id: &str) -> Vec<Arc<Repository>> {
        self.all()
            .into_iter()
            .filter(|r| r.is_group() && r.members.iter().any(|m| m == id))
            .collect()
    }

    /// Every group containing `id` directly or through nested groups,
    /// ordered so that a group always comes after the groups it contains.
    pub fn ancestors_of(&self, id: &str) -> Vec<Arc<Repository>> {
        let mut found: Vec<Arc<Repository>> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut queue = VecDeque::from([id.to_string()]);
        while let Some(current) = queue.pop_front() {
            for group in self.groups_of(&current) {
                if group.id == id {
                    tracing::warn!(repository = %id, "Group membership cycle detected, ignoring");
                    continue;
                }
                if seen.insert(group.id.clone()) {
                    queue.push_back(group.id.clone());
                    found.push(group);
                }
            }
        }
        topological(found)
    }

    pub fn add(&self, repository: Repository) {
        let id = repository.id.clone();
        let is_group = repository.is_group();
        self.repositories.insert(id.clone(), Arc::new(repository));
        tracing::info!(repository = %id, "Repository added");
        self.events.emit(RoutingEvent::RepositoryAdded { repository: id.clone() });
        if is_group {
            self.events.emit(RoutingEvent::GroupMembersChanged { repository: id });
        }
    }

    /// Replace an existing definition, emitting what changed.
    pub fn update(&self, repository: Repository) -> RoutingResult<RepositoryChanges> {
        let id = repository.id.clone();
        let previous = self.require(&id)?;
        let changes = repository.changes_since(&previous);
        let is_group = repository.is_group();
        self.repositories.insert(id.clone(), Arc::new(repository));
        if changes.any() {
            tracing::info!(repository = %id, ?changes, "Repository updated");
            self.events.emit(RoutingEvent::RepositoryUpdated {
                repository: id.clone(),
                changes,
            });
            if is_group && changes.members {
                self.events.emit(RoutingEvent::GroupMembersChanged { repository: id });
            }
        }
        Ok(changes)
    }

    /// Change only a group's member list.
    pub fn set_members(&self, group_id: &str, members: &[&str]) -> RoutingResult<()> {
        let group = self.require(group_id)?;
        if !group.is_group() {
            return Err(RoutingError::InvalidInput(format!(
                "Repository '{}' is not a group",
                group_id
            )));
        }
        self.update(Repository::clone(&group).with_members(members))?;
        Ok(())
    }

    /// Remove a repository and drop it from every group listing it.
    pub fn remove(&self, id: &str) -> Option<Arc<Repository>> {
        let (_, removed) = self.repositories.remove(id)?;
        tracing::info!(repository = %id, "Repository removed");
        self.events.emit(RoutingEvent::RepositoryRemoved { repository: id.to_string() });
        for group in self.groups_of(id) {
            let mut updated = Repository::clone(&group);
            updated.members.retain(|m| m != id);
            if let Err(e) = self.update(updated) {
                tracing::warn!(repository = %group.id, error = %e, "Failed to drop removed member");
            }
        }
        Some(removed)
    }

    /// Write an item into a repository, announcing it.
    pub fn store_item(&self, id: &str, path: &str, content: &[u8]) -> RoutingResult<()> {
        let repository = self.require(id)?;
        let path = crate::prefix::path::normalize(path);
        repository.store.write(&path, content)?;
        self.events.emit(RoutingEvent::ItemStored {
            repository: id.to_string(),
            path,
        });
        Ok(())
    }

    /// Delete an item or directory, announcing it when something was removed.
    pub fn delete_item(&self, id: &str, path: &str) -> RoutingResult<bool> {
        let repository = self.require(id)?;
        let path = crate::prefix::path::normalize(path);
        let deleted = repository.store.delete(&path)?;
        if deleted {
            self.events.emit(RoutingEvent::ItemDeleted {
                repository: id.to_string(),
                path,
            });
        }
        Ok(deleted)
    }

    /// Bring the registry in line with a (reloaded) configuration.
    ///
    /// Leaves are applied before groups so a new group sees its members.
    pub fn apply(&self, config: &RouterConfig, stores: &StoreFactory) -> RoutingResult<()> {
        let default_interval = Duration::from_secs(config.routing.default_discovery_interval_secs);
        let wanted: BTreeSet<&str> = config.repositories.iter().map(|r| r.id.as_str()).collect();

        let mut ordered: Vec<&RepositoryConfig> = config.repositories.iter().collect();
        ordered.sort_by_key(|r| r.kind == RepositoryKind::Group);

        for repo_config in ordered {
            match self.get(&repo_config.id) {
                Some(existing) => {
                    let repository = Repository::from_config(repo_config, default_interval, existing.store.clone())?;
                    self.update(repository)?;
                }
                None => {
                    let store = stores.create(&repo_config.id)?;
                    self.add(Repository::from_config(repo_config, default_interval, store)?);
                }
            }
        }

        let stale: Vec<String> = self
            .repositories
            .iter()
            .filter(|r| !wanted.contains(r.key().as_str()))
            .map(|r| r.key().clone())
            .collect();
        for id in stale {
            self.remove(&id);
        }
        Ok(())
    }
}

/// Order groups so members precede the groups containing them. Cycles are
/// broken by falling back to discovery order for the remainder.
fn topological(groups: Vec<Arc<Repository>>) -> Vec<Arc<Repository>> {
    let ids: HashSet<&str> = groups.iter().map(|g| g.id.as_str()).collect();
    let mut placed: HashSet<String> = HashSet::new();
    let mut ordered: Vec<Arc<Repository>> = Vec::with_capacity(groups.len());
    let mut pending: Vec<&Arc<Repository>> = groups.iter().collect();

    while !pending.is_empty() {
        let before = pending.len();
        pending.retain(|group| {
            let ready = group
                .members
                .iter()
                .all(|m| !ids.contains(m.as_str()) || placed.contains(m) || m == &group.id);
            if ready {
                placed.insert(group.id.clone());
                ordered.push(Arc::clone(group));
            }
            !ready
        });
        if pending.len() == before {
            tracing::warn!(
                groups = ?pending.iter().map(|g| g.id.as_str()).collect::<Vec<_>>(),
                "Group membership cycle detected, ordering broken"
            );
            ordered.extend(pending.drain(..).cloned());
        }
    }
    ordered
}
