//! phil-api — HTTP surface of the Phil daemon.
//!
//! Workers report their load here; operators and orchestrators probe
//! liveness/readiness and read the last autoscale cycle.
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/healthz` | Liveness |
//! | GET | `/readyz` | 200 once the autoscaler scheduled its first cycle |
//! | GET | `/api/v1/status` | Last autoscale cycle |
//! | GET | `/api/v1/loads` | List load records |
//! | GET | `/api/v1/loads/{name}` | Get one load record |
//! | PUT | `/api/v1/loads/{name}` | Report a worker's load |
//! | DELETE | `/api/v1/loads/{name}` | Remove a load record |

pub mod handlers;

use axum::Router;
use axum::routing::get;
use tokio::sync::watch;

use phil_autoscale::CycleStatus;
use phil_store::StateStore;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub store: StateStore,
    pub ready: watch::Receiver<bool>,
    pub status: watch::Receiver<Option<CycleStatus>>,
}

/// Build the complete API router.
pub fn build_router(state: ApiState) -> Router {
    let api_routes = Router::new()
        .route("/status", get(handlers::get_status))
        .route("/loads", get(handlers::list_loads))
        .route(
            "/loads/{name}",
            get(handlers::get_load)
                .put(handlers::put_load)
                .delete(handlers::delete_load),
        )
        .with_state(state.clone());

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/healthz", get(handlers::healthz))
        .route("/readyz", get(handlers::readyz).with_state(state))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn test_router() -> (Router, StateStore, watch::Sender<bool>) {
        let store = StateStore::open_in_memory().unwrap();
        let (ready_tx, ready) = watch::channel(false);
        let (_status_tx, status) = watch::channel(None);
        let router = build_router(ApiState {
            store: store.clone(),
            ready,
            status,
        });
        (router, store, ready_tx)
    }

    #[tokio::test]
    async fn healthz_is_always_ok() {
        let (router, _, _ready) = test_router();
        let req = Request::builder().uri("/healthz").body(Body::empty()).unwrap();
        let resp = router.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn readyz_follows_driver_readiness() {
        let (router, _, ready_tx) = test_router();

        let req = Request::builder().uri("/readyz").body(Body::empty()).unwrap();
        let resp = router.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);

        ready_tx.send(true).unwrap();
        let req = Request::builder().uri("/readyz").body(Body::empty()).unwrap();
        let resp = router.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn worker_reports_load_over_http() {
        let (router, store, _ready) = test_router();

        let req = Request::builder()
            .method("PUT")
            .uri("/api/v1/loads/will-1")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"load": 320, "paused": true}"#))
            .unwrap();
        let resp = router.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let record = store.get_load_record("will-1").unwrap().unwrap();
        assert_eq!(record.load, 320.0);
        assert!(record.is_paused());

        let req = Request::builder()
            .uri("/api/v1/loads/will-1")
            .body(Body::empty())
            .unwrap();
        let resp = router.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
