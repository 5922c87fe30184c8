//! HTTP handlers.
//!
//! Load-record handlers read/write via `StateStore`; status handlers read
//! the watch channels the cycle driver publishes on.

use std::time::{SystemTime, UNIX_EPOCH};

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use tracing::debug;

use phil_core::LoadRecord;

use crate::ApiState;

/// Response wrapper for consistent API format.
#[derive(serde::Serialize)]
struct ApiResponse<T: serde::Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: serde::Serialize> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }
}

fn error_response(msg: &str, status: StatusCode) -> impl IntoResponse {
    (
        status,
        Json(ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(msg.to_string()),
        }),
    )
}

// ── Probes ─────────────────────────────────────────────────────

/// GET /healthz
pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

/// GET /readyz
pub async fn readyz(State(state): State<ApiState>) -> impl IntoResponse {
    if *state.ready.borrow() {
        (StatusCode::OK, "ready")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "starting")
    }
}

/// GET /api/v1/status
pub async fn get_status(State(state): State<ApiState>) -> impl IntoResponse {
    let status = state.status.borrow().clone();
    match status {
        Some(status) => ApiResponse::ok(status).into_response(),
        None => error_response("no autoscale cycle has finished yet", StatusCode::NOT_FOUND)
            .into_response(),
    }
}

// ── Load records ───────────────────────────────────────────────

/// Body a worker sends to report its load.
#[derive(serde::Deserialize)]
pub struct LoadReport {
    pub load: f64,
    #[serde(default)]
    pub paused: Option<bool>,
}

/// GET /api/v1/loads
pub async fn list_loads(State(state): State<ApiState>) -> impl IntoResponse {
    match state.store.list_load_records() {
        Ok(records) => ApiResponse::ok(records).into_response(),
        Err(e) => error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response(),
    }
}

/// GET /api/v1/loads/:name
pub async fn get_load(
    State(state): State<ApiState>,
    Path(name): Path<String>,
) -> impl IntoResponse {
    match state.store.get_load_record(&name) {
        Ok(Some(record)) => ApiResponse::ok(record).into_response(),
        Ok(None) => error_response("load record not found", StatusCode::NOT_FOUND).into_response(),
        Err(e) => error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response(),
    }
}

/// PUT /api/v1/loads/:name
pub async fn put_load(
    State(state): State<ApiState>,
    Path(name): Path<String>,
    Json(report): Json<LoadReport>,
) -> impl IntoResponse {
    if !report.load.is_finite() || report.load < 0.0 {
        return error_response("load must be a non-negative number", StatusCode::BAD_REQUEST)
            .into_response();
    }

    let record = LoadRecord {
        name,
        load: report.load,
        paused: report.paused,
        updated_at: epoch_secs(),
    };
    match state.store.put_load_record(&record) {
        Ok(()) => {
            debug!(name = %record.name, load = record.load, "load reported");
            ApiResponse::ok(record).into_response()
        }
        Err(e) => error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response(),
    }
}

/// DELETE /api/v1/loads/:name
pub async fn delete_load(
    State(state): State<ApiState>,
    Path(name): Path<String>,
) -> impl IntoResponse {
    match state.store.delete_load_record(&name) {
        Ok(true) => ApiResponse::ok("deleted").into_response(),
        Ok(false) => error_response("load record not found", StatusCode::NOT_FOUND).into_response(),
        Err(e) => error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response(),
    }
}

fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use phil_autoscale::{CycleOutcome, CycleStatus};
    use phil_store::StateStore;
    use tokio::sync::watch;

    fn test_state() -> (ApiState, watch::Sender<Option<CycleStatus>>) {
        let store = StateStore::open_in_memory().unwrap();
        let (_, ready) = watch::channel(true);
        let (status_tx, status) = watch::channel(None);
        (ApiState { store, ready, status }, status_tx)
    }

    #[tokio::test]
    async fn list_loads_empty() {
        let (state, _) = test_state();
        let resp = list_loads(State(state)).await.into_response();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn put_and_get_load() {
        let (state, _) = test_state();
        let report = LoadReport {
            load: 120.0,
            paused: None,
        };

        let resp = put_load(State(state.clone()), Path("will-1".to_string()), Json(report))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::OK);

        let record = state.store.get_load_record("will-1").unwrap().unwrap();
        assert_eq!(record.load, 120.0);
        assert!(record.updated_at > 0);

        let resp = get_load(State(state), Path("will-1".to_string()))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn negative_load_rejected() {
        let (state, _) = test_state();
        let report = LoadReport {
            load: -1.0,
            paused: None,
        };
        let resp = put_load(State(state.clone()), Path("will-1".to_string()), Json(report))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert!(state.store.get_load_record("will-1").unwrap().is_none());
    }

    #[tokio::test]
    async fn get_nonexistent_load() {
        let (state, _) = test_state();
        let resp = get_load(State(state), Path("nope".to_string()))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn delete_load_exists_then_missing() {
        let (state, _) = test_state();
        state
            .store
            .put_load_record(&LoadRecord::new("will-1", 1.0))
            .unwrap();

        let resp = delete_load(State(state.clone()), Path("will-1".to_string()))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = delete_load(State(state), Path("will-1".to_string()))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn status_before_and_after_first_cycle() {
        let (state, status_tx) = test_state();

        let resp = get_status(State(state.clone())).await.into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        status_tx
            .send(Some(CycleStatus {
                cycle: 1,
                finished_at: 1000,
                outcome: CycleOutcome::Skipped,
                report: None,
                error: Some("average load of the workers is 0".to_string()),
                previous_relative: 0.0,
            }))
            .unwrap();

        let resp = get_status(State(state)).await.into_response();
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
