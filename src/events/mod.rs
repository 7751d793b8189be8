//! Event bus connecting the repository registry, the routing manager and the
//! admission filter.
//!
//! # Data Flow
//! ```text
//! registry (add / update / remove / members / items)
//!     → EventBus::emit
//!         → listeners, inline on the emitting thread (manager, filter)
//!         → broadcast channel (observers, tests)
//!
//! manager (publish / unpublish)
//!     → EventBus::emit → filter rebuilds its matcher
//! ```
//!
//! # Design Decisions
//! - Listeners run synchronously so a caller changing group membership
//!   observes propagation completion before `emit` returns
//! - The listener list is swapped atomically; emitting never takes a lock
//! - Broadcast delivery is best effort (lagging receivers lose events)

use std::sync::Arc;

use arc_swap::ArcSwap;
use tokio::sync::broadcast;

/// Which routing-relevant settings differ between two versions of a repository.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepositoryChanges {
    pub remote_url: bool,
    pub proxy_mode: bool,
    pub discovery: bool,
    pub in_service: bool,
    pub members: bool,
}

impl RepositoryChanges {
    pub fn any(&self) -> bool {
        self.remote_url || self.proxy_mode || self.discovery || self.in_service || self.members
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoutingEvent {
    RepositoryAdded {
        repository: String,
    },
    RepositoryUpdated {
        repository: String,
        changes: RepositoryChanges,
    },
    RepositoryRemoved {
        repository: String,
    },
    /// Member list of a group changed.
    GroupMembersChanged {
        repository: String,
    },
    ItemStored {
        repository: String,
        path: String,
    },
    ItemDeleted {
        repository: String,
        path: String,
    },
    PrefixFilePublished {
        repository: String,
    },
    PrefixFileUnpublished {
        repository: String,
    },
}

impl RoutingEvent {
    /// Id of the repository the event is about.
    pub fn repository(&self) -> &str {
        match self {
            RoutingEvent::RepositoryAdded { repository }
            | RoutingEvent::RepositoryUpdated { repository, .. }
            | RoutingEvent::RepositoryRemoved { repository }
            | RoutingEvent::GroupMembersChanged { repository }
            | RoutingEvent::ItemStored { repository, .. }
            | RoutingEvent::ItemDeleted { repository, .. }
            | RoutingEvent::PrefixFilePublished { repository }
            | RoutingEvent::PrefixFileUnpublished { repository } => repository,
        }
    }
}

/// Receives every event, inline.
pub trait EventListener: Send + Sync {
    fn on_event(&self, event: &RoutingEvent);
}

pub struct EventBus {
    listeners: ArcSwap<Vec<Arc<dyn EventListener>>>,
    tx: broadcast::Sender<RoutingEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1024);
        Self {
            listeners: ArcSwap::from_pointee(Vec::new()),
            tx,
        }
    }

    pub fn register(&self, listener: Arc<dyn EventListener>) {
        self.listeners.rcu(|current| {
            let mut next = Vec::clone(current);
            next.push(listener.clone());
            next
        });
    }

    pub fn unregister(&self, listener: &Arc<dyn EventListener>) {
        self.listeners.rcu(|current| {
            current
                .iter()
                .filter(|l| Arc::as_ptr(l) as *const () != Arc::as_ptr(listener) as *const ())
                .cloned()
                .collect::<Vec<_>>()
        });
    }

    /// Observe events asynchronously.
    pub fn subscribe(&self) -> broadcast::Receiver<RoutingEvent> {
        self.tx.subscribe()
    }

    pub fn emit(&self, event: RoutingEvent) {
        tracing::trace!(?event, "Routing event");
        let listeners = self.listeners.load_full();
        for listener in listeners.iter() {
            listener.on_event(&event);
        }
        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<RoutingEvent>>);

    impl EventListener for Recorder {
        fn on_event(&self, event: &RoutingEvent) {
            self.0.lock().unwrap().push(event.clone());
        }
    }

    #[test]
    fn test_listeners_run_inline() {
        let bus = EventBus::new();
        let recorder = Arc::new(Recorder::default());
        bus.register(recorder.clone());

        bus.emit(RoutingEvent::PrefixFilePublished {
            repository: "central".into(),
        });
        assert_eq!(recorder.0.lock().unwrap().len(), 1);

        let as_listener: Arc<dyn EventListener> = recorder.clone();
        bus.unregister(&as_listener);
        bus.emit(RoutingEvent::RepositoryRemoved {
            repository: "central".into(),
        });
        assert_eq!(recorder.0.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_broadcast_subscribers() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        bus.emit(RoutingEvent::ItemStored {
            repository: "releases".into(),
            path: "/org/a.jar".into(),
        });
        let event = rx.recv().await.unwrap();
        assert_eq!(event.repository(), "releases");
    }
}
