use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use crate::config::RepositoryKind;
use crate::error::RoutingError;
use crate::http::server::AppState;
use crate::manager::RoutingStatus;
use crate::prefix::PrefixSource;

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub routing_enabled: bool,
    pub repositories: usize,
    pub update_job_running: bool,
}

#[derive(Serialize)]
pub struct RepositoryRouting {
    pub id: String,
    pub name: String,
    pub kind: RepositoryKind,
    #[serde(flatten)]
    pub status: RoutingStatus,
}

#[derive(Serialize)]
pub struct PrefixList {
    pub id: String,
    pub supported: bool,
    pub entries: Vec<String>,
}

#[derive(Serialize)]
pub struct JobsSummary {
    pub running: bool,
    pub repositories: Vec<String>,
}

#[derive(Serialize)]
pub struct UpdateAccepted {
    pub id: String,
    pub forced: bool,
    /// Forced: a running job was cancelled. Otherwise: a new job started.
    pub replaced_or_started: bool,
}

#[derive(Serialize)]
pub struct AdmissionDecision {
    pub id: String,
    pub path: String,
    pub allowed: bool,
}

#[derive(Deserialize)]
pub struct UpdateParams {
    #[serde(default)]
    pub force: bool,
}

#[derive(Deserialize)]
pub struct AdmitParams {
    pub path: String,
}

/// Admin API error body.
pub struct ApiError(RoutingError);

impl From<RoutingError> for ApiError {
    fn from(e: RoutingError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            RoutingError::UnknownRepository(_) => StatusCode::NOT_FOUND,
            RoutingError::NotApplicable(_) => StatusCode::CONFLICT,
            RoutingError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(serde_json::json!({ "error": self.0.to_string() }))).into_response()
    }
}

pub async fn get_status(State(state): State<AppState>) -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        routing_enabled: state.manager.is_enabled(),
        repositories: state.manager.registry().len(),
        update_job_running: state.manager.is_update_job_running(),
    })
}

pub async fn list_routing(State(state): State<AppState>) -> Result<Json<Vec<RepositoryRouting>>, ApiError> {
    let mut statuses = Vec::new();
    for repository in state.manager.registry().all() {
        statuses.push(RepositoryRouting {
            status: state.manager.status_for(&repository.id)?,
            id: repository.id.clone(),
            name: repository.name.clone(),
            kind: repository.kind,
        });
    }
    Ok(Json(statuses))
}

pub async fn get_routing(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<RoutingStatus>, ApiError> {
    Ok(Json(state.manager.status_for(&id)?))
}

pub async fn get_prefixes(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PrefixList>, ApiError> {
    let source = state.manager.prefix_source_for(&id)?;
    Ok(Json(PrefixList {
        supported: source.supported(),
        entries: source.read_entries()?,
        id,
    }))
}

pub async fn post_update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<UpdateParams>,
) -> Result<(StatusCode, Json<UpdateAccepted>), ApiError> {
    let replaced_or_started = if params.force {
        state.manager.force_update_prefix_file(&id)?
    } else {
        state.manager.update_prefix_file(&id)?
    };
    tracing::info!(repository = %id, forced = params.force, "Prefix file update requested");
    Ok((
        StatusCode::ACCEPTED,
        Json(UpdateAccepted {
            id,
            forced: params.force,
            replaced_or_started,
        }),
    ))
}

pub async fn get_admission(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<AdmitParams>,
) -> Result<Json<AdmissionDecision>, ApiError> {
    state.manager.registry().require(&id)?;
    Ok(Json(AdmissionDecision {
        allowed: state.filter.allowed(&id, &params.path),
        path: params.path,
        id,
    }))
}

pub async fn get_jobs(State(state): State<AppState>) -> Json<JobsSummary> {
    Json(JobsSummary {
        running: state.manager.is_update_job_running(),
        repositories: state.manager.running_jobs(),
    })
}
