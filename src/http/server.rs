//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router: published prefix files plus the admin API
//! - Wire up middleware (tracing, timeout)
//! - Serve until the shutdown coordinator fires, then drain

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::admin::setup_admin_router;
use crate::config::AdminConfig;
use crate::error::RoutingError;
use crate::filter::RequestAdmissionFilter;
use crate::lifecycle::Shutdown;
use crate::manager::Manager;
use crate::prefix::PrefixSource;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub manager: Manager,
    pub filter: Arc<RequestAdmissionFilter>,
    /// Swapped on configuration reload.
    pub admin: Arc<ArcSwap<AdminConfig>>,
}

/// HTTP server exposing prefix files and the admin API.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new(state: AppState, request_timeout: Duration) -> Self {
        let router = Self::build_router(state, request_timeout);
        Self { router }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(state: AppState, request_timeout: Duration) -> Router {
        let prefix_route = format!(
            "/repositories/{{id}}{}",
            state.manager.config().prefix_file_path
        );
        let mut router = Router::new()
            .route(&prefix_route, get(prefix_file_handler))
            .with_state(state.clone());
        if state.admin.load().enabled {
            router = router.merge(setup_admin_router(state));
        }
        router
            .layer(TimeoutLayer::new(request_timeout))
            .layer(TraceLayer::new_for_http())
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(self, listener: TcpListener, shutdown: &Shutdown) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let shutdown = shutdown.clone();
        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move { shutdown.triggered().await })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Serve a repository's stored prefix file, unsupported marker included, so
/// downstream instances can use this one as their remote.
async fn prefix_file_handler(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let source = match state.manager.prefix_source_for(&id) {
        Ok(source) => source,
        Err(RoutingError::UnknownRepository(_)) => return StatusCode::NOT_FOUND.into_response(),
        Err(e) => {
            tracing::warn!(repository = %id, error = %e, "Prefix file lookup failed");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    match source.raw() {
        Ok(Some(bytes)) => {
            let mut response = (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "text/plain; charset=us-ascii")],
                bytes,
            )
                .into_response();
            if let Some(modified) = source.last_modified() {
                let formatted = DateTime::<Utc>::from(modified)
                    .format("%a, %d %b %Y %H:%M:%S GMT")
                    .to_string();
                if let Ok(value) = formatted.parse() {
                    response.headers_mut().insert(header::LAST_MODIFIED, value);
                }
            }
            response
        }
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(e) => {
            tracing::warn!(repository = %id, error = %e, "Prefix file unreadable");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
