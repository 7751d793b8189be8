//! Startup orchestration.
//!
//! # Responsibilities
//! - Build the registry, routing manager and admission filter from config
//! - Register repositories, then start the manager
//! - Apply reloaded repository definitions

use std::sync::Arc;

use arc_swap::ArcSwap;
use tokio::runtime::Handle;

use crate::config::{AdminConfig, RouterConfig};
use crate::discovery::HttpTransport;
use crate::error::RoutingResult;
use crate::events::EventBus;
use crate::filter::RequestAdmissionFilter;
use crate::http::AppState;
use crate::lifecycle::Shutdown;
use crate::manager::Manager;
use crate::repository::{RepositoryRegistry, StoreFactory};

/// The running routing subsystem.
pub struct Services {
    pub registry: Arc<RepositoryRegistry>,
    pub manager: Manager,
    pub filter: Arc<RequestAdmissionFilter>,
    pub admin: Arc<ArcSwap<AdminConfig>>,
    pub shutdown: Shutdown,
    stores: StoreFactory,
}

impl Services {
    /// Fail fast: any error here is fatal for the process.
    pub fn start(config: &RouterConfig, runtime: Handle) -> RoutingResult<Self> {
        let events = Arc::new(EventBus::new());
        let registry = Arc::new(RepositoryRegistry::new(events.clone()));
        let transport = HttpTransport::new(&config.timeouts)?;
        let manager = Manager::new(config.routing.clone(), registry.clone(), transport, runtime);

        let filter = Arc::new(RequestAdmissionFilter::new(manager.clone()));
        events.register(filter.clone());

        let stores = StoreFactory::from_config(&config.storage);
        registry.apply(config, &stores)?;
        tracing::info!(repositories = registry.len(), "Repositories registered");

        manager.startup();

        Ok(Self {
            admin: Arc::new(ArcSwap::from_pointee(config.admin.clone())),
            shutdown: Shutdown::new(),
            registry,
            manager,
            filter,
            stores,
        })
    }

    pub fn app_state(&self) -> AppState {
        AppState {
            manager: self.manager.clone(),
            filter: self.filter.clone(),
            admin: self.admin.clone(),
        }
    }

    /// Apply a reloaded configuration. Only repositories and admin
    /// credentials change live.
    pub fn reload(&self, config: &RouterConfig) -> RoutingResult<()> {
        self.registry.apply(config, &self.stores)?;
        self.admin.store(Arc::new(config.admin.clone()));
        tracing::info!(repositories = self.registry.len(), "Configuration reloaded");
        Ok(())
    }

    pub fn stop(&self) {
        self.shutdown.trigger();
        self.manager.shutdown();
    }
}
