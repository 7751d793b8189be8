pub mod handlers;
pub mod auth;

use axum::{
    routing::{get, post},
    Router,
    middleware,
};
use crate::http::server::AppState;
use self::handlers::*;
use self::auth::admin_auth_middleware;

pub fn setup_admin_router(state: AppState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/routing", get(list_routing))
        .route("/admin/routing/jobs", get(get_jobs))
        .route("/admin/routing/{id}", get(get_routing))
        .route("/admin/routing/{id}/prefixes", get(get_prefixes))
        .route("/admin/routing/{id}/update", post(post_update))
        .route("/admin/routing/{id}/admit", get(get_admission))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .with_state(state)
}
