//! Translates repository events into manager work.

use std::sync::Weak;

use crate::events::{EventListener, RoutingEvent};
use crate::manager::{Manager, ManagerInner, Propagation};
use crate::repository::Repository;

/// Registered on the event bus while the manager runs. Holds the manager
/// weakly so the bus does not keep it alive.
pub struct EventDispatcher {
    manager: Weak<ManagerInner>,
}

impl EventDispatcher {
    pub fn new(manager: &Manager) -> Self {
        Self {
            manager: manager.downgrade(),
        }
    }

    fn on_added(manager: &Manager, repository: &Repository) {
        // groups are handled by the members-changed event that follows
        if repository.is_group() || !repository.in_service {
            return;
        }
        let forced = !manager.prefix_source_exists(repository);
        manager.request_update(&repository.id, forced);
    }

    fn on_updated(manager: &Manager, repository: &Repository, event: &RoutingEvent) {
        let RoutingEvent::RepositoryUpdated { changes, .. } = event else {
            return;
        };
        if changes.in_service {
            if repository.in_service {
                manager.request_update(&repository.id, true);
            } else {
                manager.forget(&repository.id);
            }
            manager.propagate_from(&repository.id, Propagation::Sync);
            return;
        }
        if repository.is_proxy() && (changes.remote_url || changes.proxy_mode || changes.discovery) {
            manager.request_update(&repository.id, true);
        }
    }
}

impl EventListener for EventDispatcher {
    fn on_event(&self, event: &RoutingEvent) {
        let Some(inner) = self.manager.upgrade() else {
            return;
        };
        let manager = Manager::from_inner(inner);
        let id = event.repository();

        match event {
            RoutingEvent::RepositoryRemoved { .. } => {
                manager.forget(id);
            }
            RoutingEvent::GroupMembersChanged { .. } => {
                if let Err(e) = manager.republish_group_tree(id) {
                    tracing::warn!(repository = %id, error = %e, "Group prefix file update failed");
                }
            }
            RoutingEvent::ItemStored { path, .. } => {
                if let Err(e) = manager.offer_entry(id, path) {
                    tracing::warn!(repository = %id, item = %path, error = %e, "Could not offer entry");
                }
            }
            RoutingEvent::ItemDeleted { path, .. } => {
                if let Err(e) = manager.revoke_entry(id, path) {
                    tracing::warn!(repository = %id, item = %path, error = %e, "Could not revoke entry");
                }
            }
            RoutingEvent::RepositoryAdded { .. } | RoutingEvent::RepositoryUpdated { .. } => {
                let Some(repository) = manager.registry().get(id) else {
                    return;
                };
                if matches!(event, RoutingEvent::RepositoryAdded { .. }) {
                    Self::on_added(&manager, &repository);
                } else {
                    Self::on_updated(&manager, &repository, event);
                }
            }
            RoutingEvent::PrefixFilePublished { .. } | RoutingEvent::PrefixFileUnpublished { .. } => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RoutingConfig, TimeoutConfig};
    use crate::discovery::HttpTransport;
    use crate::events::EventBus;
    use crate::prefix::PrefixSource;
    use crate::repository::RepositoryRegistry;
    use crate::storage::{ContentStore, MemoryContentStore};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::runtime::Handle;

    fn manager() -> Manager {
        let registry = Arc::new(RepositoryRegistry::new(Arc::new(EventBus::new())));
        let transport = HttpTransport::new(&TimeoutConfig::default()).unwrap();
        Manager::new(RoutingConfig::default(), registry, transport, Handle::current())
    }

    fn hosted(id: &str, files: &[&str]) -> Repository {
        let mut store = MemoryContentStore::new();
        for file in files {
            store = store.with_file(file, b"x");
        }
        let store: Arc<dyn ContentStore> = Arc::new(store);
        Repository::hosted(id, store)
    }

    #[tokio::test]
    async fn test_added_repository_gets_published() {
        let manager = manager();
        manager.startup();
        manager
            .registry()
            .add(hosted("releases", &["/org/apache/maven/pom.xml"]));
        assert!(manager.wait_for_quiescence(Duration::from_secs(5)).await);

        let source = manager.prefix_source_for("releases").unwrap();
        assert!(source.supported());
        assert_eq!(source.read_entries().unwrap(), vec!["/org/apache"]);
    }

    #[tokio::test]
    async fn test_dropped_manager_ignores_events() {
        let events = Arc::new(EventBus::new());
        let registry = Arc::new(RepositoryRegistry::new(events.clone()));
        let transport = HttpTransport::new(&TimeoutConfig::default()).unwrap();
        let manager = Manager::new(RoutingConfig::default(), registry.clone(), transport, Handle::current());
        let dispatcher: Arc<dyn EventListener> = Arc::new(EventDispatcher::new(&manager));
        events.register(dispatcher);
        drop(manager);

        registry.add(hosted("releases", &["/org/foo.jar"]));
        let store = registry.get("releases").unwrap().store.clone();
        assert!(store.read("/.meta/prefixes.txt").unwrap().is_none());
    }
}
