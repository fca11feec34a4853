use std::str::FromStr;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Router,
};
use serde::Deserialize;
use serde_json::json;

use super::clock::{Clock, SystemClock};
use super::domain::{SanctionId, SanctionKind, SubjectId};
use super::service::{ConductService, ConductServiceError, SanctionAmendment};
use super::store::{ConductStore, StoreError};
use super::worker::{RecomputeWorker, WorkerError};

/// Shared handler state. Cloning is shallow; both halves sit behind `Arc`.
pub struct EngineState<S, C = SystemClock> {
    pub service: Arc<ConductService<S, C>>,
    pub worker: Arc<RecomputeWorker<S, C>>,
}

impl<S, C> Clone for EngineState<S, C> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            worker: Arc::clone(&self.worker),
        }
    }
}

/// Router builder exposing HTTP endpoints for sanctions, classification and
/// the recomputation worker.
pub fn conduct_router<S, C>(state: EngineState<S, C>) -> Router
where
    S: ConductStore + 'static,
    C: Clock + 'static,
{
    Router::new()
        .route(
            "/api/v1/conduct/sanctions",
            post(register_sanction_handler::<S, C>),
        )
        .route(
            "/api/v1/conduct/sanctions/:sanction_id",
            patch(amend_sanction_handler::<S, C>).delete(remove_sanction_handler::<S, C>),
        )
        .route(
            "/api/v1/conduct/subjects/:subject_id/classification",
            get(classification_handler::<S, C>),
        )
        .route(
            "/api/v1/conduct/subjects/:subject_id/reclassify",
            post(reclassify_handler::<S, C>),
        )
        .route(
            "/api/v1/conduct/subjects/:subject_id/simulate",
            post(simulate_handler::<S, C>),
        )
        .route(
            "/api/v1/conduct/subjects/:subject_id/transitions",
            get(transitions_handler::<S, C>),
        )
        .route("/api/v1/conduct/dashboard", get(dashboard_handler::<S, C>))
        .route("/api/v1/conduct/recompute", post(recompute_handler::<S, C>))
        .route("/api/v1/conduct/worker", get(worker_status_handler::<S, C>))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct RegisterSanctionRequest {
    pub subject_id: String,
    pub kind: String,
    pub days: u32,
    pub reason: String,
    #[serde(default)]
    pub case_ref: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReclassifyRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SimulateRequest {
    pub kind: String,
    pub days: u32,
}

pub(crate) async fn register_sanction_handler<S, C>(
    State(state): State<EngineState<S, C>>,
    axum::Json(request): axum::Json<RegisterSanctionRequest>,
) -> Response
where
    S: ConductStore + 'static,
    C: Clock + 'static,
{
    let kind = match SanctionKind::from_str(&request.kind) {
        Ok(kind) => kind,
        Err(error) => {
            let payload = json!({ "error": error.to_string() });
            return (StatusCode::UNPROCESSABLE_ENTITY, axum::Json(payload)).into_response();
        }
    };
    let subject_id = SubjectId(request.subject_id);
    match state.service.register_sanction(
        &subject_id,
        kind,
        request.days,
        request.reason,
        request.case_ref,
    ) {
        Ok(sanction) => (StatusCode::CREATED, axum::Json(sanction)).into_response(),
        Err(error) => service_error_response(&error),
    }
}

pub(crate) async fn amend_sanction_handler<S, C>(
    State(state): State<EngineState<S, C>>,
    Path(sanction_id): Path<String>,
    axum::Json(amendment): axum::Json<SanctionAmendment>,
) -> Response
where
    S: ConductStore + 'static,
    C: Clock + 'static,
{
    let id = SanctionId(sanction_id);
    match state.service.amend_sanction(&id, amendment) {
        Ok(sanction) => (StatusCode::OK, axum::Json(sanction)).into_response(),
        Err(error) => service_error_response(&error),
    }
}

pub(crate) async fn remove_sanction_handler<S, C>(
    State(state): State<EngineState<S, C>>,
    Path(sanction_id): Path<String>,
) -> Response
where
    S: ConductStore + 'static,
    C: Clock + 'static,
{
    let id = SanctionId(sanction_id);
    match state.service.remove_sanction(&id) {
        Ok(sanction) => (StatusCode::OK, axum::Json(sanction)).into_response(),
        Err(error) => service_error_response(&error),
    }
}

pub(crate) async fn classification_handler<S, C>(
    State(state): State<EngineState<S, C>>,
    Path(subject_id): Path<String>,
) -> Response
where
    S: ConductStore + 'static,
    C: Clock + 'static,
{
    let id = SubjectId(subject_id);
    match state.service.get_current_classification(&id) {
        Ok(Some(classification)) => {
            (StatusCode::OK, axum::Json(classification.view())).into_response()
        }
        Ok(None) => {
            let payload = json!({
                "error": format!("no classification recorded for subject {}", id),
            });
            (StatusCode::NOT_FOUND, axum::Json(payload)).into_response()
        }
        Err(error) => service_error_response(&error),
    }
}

pub(crate) async fn reclassify_handler<S, C>(
    State(state): State<EngineState<S, C>>,
    Path(subject_id): Path<String>,
    request: Option<axum::Json<ReclassifyRequest>>,
) -> Response
where
    S: ConductStore + 'static,
    C: Clock + 'static,
{
    let id = SubjectId(subject_id);
    let trigger = request
        .and_then(|axum::Json(body)| body.reason)
        .unwrap_or_else(|| "manual reclassification".to_string());
    match state.service.reclassify(&id, &trigger, false) {
        Ok(classification) => (StatusCode::OK, axum::Json(classification.view())).into_response(),
        Err(error) => service_error_response(&error),
    }
}

pub(crate) async fn simulate_handler<S, C>(
    State(state): State<EngineState<S, C>>,
    Path(subject_id): Path<String>,
    axum::Json(request): axum::Json<SimulateRequest>,
) -> Response
where
    S: ConductStore + 'static,
    C: Clock + 'static,
{
    let kind = match SanctionKind::from_str(&request.kind) {
        Ok(kind) => kind,
        Err(error) => {
            let payload = json!({ "error": error.to_string() });
            return (StatusCode::UNPROCESSABLE_ENTITY, axum::Json(payload)).into_response();
        }
    };
    let id = SubjectId(subject_id);
    match state.service.simulate(&id, kind, request.days) {
        Ok(outcome) => (StatusCode::OK, axum::Json(outcome)).into_response(),
        Err(error) => service_error_response(&error),
    }
}

pub(crate) async fn transitions_handler<S, C>(
    State(state): State<EngineState<S, C>>,
    Path(subject_id): Path<String>,
) -> Response
where
    S: ConductStore + 'static,
    C: Clock + 'static,
{
    let id = SubjectId(subject_id);
    match state.service.list_transitions(&id) {
        Ok(transitions) => (StatusCode::OK, axum::Json(transitions)).into_response(),
        Err(error) => service_error_response(&error),
    }
}

pub(crate) async fn dashboard_handler<S, C>(State(state): State<EngineState<S, C>>) -> Response
where
    S: ConductStore + 'static,
    C: Clock + 'static,
{
    match state.service.dashboard() {
        Ok(dashboard) => (StatusCode::OK, axum::Json(dashboard)).into_response(),
        Err(error) => service_error_response(&error),
    }
}

pub(crate) async fn recompute_handler<S, C>(State(state): State<EngineState<S, C>>) -> Response
where
    S: ConductStore + 'static,
    C: Clock + 'static,
{
    let worker = Arc::clone(&state.worker);
    match tokio::task::spawn_blocking(move || worker.force_run()).await {
        Ok(Ok(summary)) => (StatusCode::OK, axum::Json(summary)).into_response(),
        Ok(Err(WorkerError::RunInFlight)) => {
            let payload = json!({
                "error": WorkerError::RunInFlight.to_string(),
            });
            (StatusCode::CONFLICT, axum::Json(payload)).into_response()
        }
        Ok(Err(WorkerError::Recompute(error))) => service_error_response(&error),
        Ok(Err(other)) => {
            let payload = json!({ "error": other.to_string() });
            (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(payload)).into_response()
        }
        Err(error) => {
            let payload = json!({ "error": error.to_string() });
            (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(payload)).into_response()
        }
    }
}

pub(crate) async fn worker_status_handler<S, C>(State(state): State<EngineState<S, C>>) -> Response
where
    S: ConductStore + 'static,
    C: Clock + 'static,
{
    (StatusCode::OK, axum::Json(state.worker.status())).into_response()
}

fn service_error_response(error: &ConductServiceError) -> Response {
    let status = match error {
        ConductServiceError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        ConductServiceError::SubjectNotFound(_)
        | ConductServiceError::SanctionNotFound(_)
        | ConductServiceError::Store(StoreError::NotFound) => StatusCode::NOT_FOUND,
        ConductServiceError::Store(StoreError::Conflict) => StatusCode::CONFLICT,
        ConductServiceError::Store(StoreError::Unavailable(_)) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    let payload = json!({ "error": error.to_string() });
    (status, axum::Json(payload)).into_response()
}
