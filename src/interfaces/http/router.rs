//! Control surface router

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::trace::TraceLayer;

use super::control;
use crate::application::runtime::SharedRuntime;

/// Path and description of every route, served by `/list`.
pub const ENDPOINTS: [(&str, &str); 8] = [
    ("/list-db", "dump every store entry"),
    ("/preparing", "send Available then Preparing (?connectorId=N)"),
    ("/ev-stop", "stop the running transaction as EV disconnected"),
    ("/start", "boot the central system connection"),
    ("/stop", "close the central system connection"),
    ("/reboot", "stop then boot"),
    ("/list", "this list"),
    ("/metrics", "Prometheus metrics, when enabled"),
];

#[derive(Clone)]
pub struct ControlState {
    pub runtime: SharedRuntime,
    pub metrics: Option<PrometheusHandle>,
}

/// `GET /metrics`
async fn prometheus_metrics(State(state): State<ControlState>) -> impl IntoResponse {
    match state.metrics {
        Some(handle) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            handle.render(),
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, "metrics are disabled").into_response(),
    }
}

pub fn create_control_router(runtime: SharedRuntime, metrics: Option<PrometheusHandle>) -> Router {
    Router::new()
        .route("/list-db", get(control::list_db))
        .route("/preparing", get(control::preparing))
        .route("/ev-stop", get(control::ev_stop))
        .route("/start", get(control::start))
        .route("/stop", get(control::stop))
        .route("/reboot", get(control::reboot))
        .route("/list", get(control::list_endpoints))
        .route("/metrics", get(prometheus_metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(ControlState { runtime, metrics })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use serde_json::json;
    use tower::ServiceExt;

    use super::*;
    use crate::application::handlers::test_support::{booted_runtime, settled};
    use crate::testing::MockConnector;

    async fn get_path(router: &Router, path: &str) -> (StatusCode, String) {
        let response = router
            .clone()
            .oneshot(Request::builder().uri(path).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    async fn start_transaction(connector: &Arc<MockConnector>, runtime: &SharedRuntime) {
        let handler = connector.handler().unwrap();
        handler
            .handle(
                "RemoteStartTransaction",
                json!({ "connectorId": 1, "idTag": "TAG" }),
            )
            .await
            .unwrap();
        for _ in 0..200 {
            if runtime.transactions().current().await.unwrap().is_some() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        settled(runtime).await;
    }

    #[tokio::test]
    async fn list_db_dumps_seeded_entries() {
        let (_, _, runtime) = booted_runtime().await;
        let router = create_control_router(runtime, None);

        let (status, body) = get_path(&router, "/list-db").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.starts_with("KEY"));
        assert!(body.contains("CP-1"));
        assert!(body.contains("ws://cs.local/ocpp"));
    }

    #[tokio::test]
    async fn stop_then_start_cycle() {
        let (_, connector, runtime) = booted_runtime().await;
        let router = create_control_router(runtime.clone(), None);

        assert_eq!(get_path(&router, "/stop").await.0, StatusCode::NO_CONTENT);
        assert!(!runtime.is_connected().await);

        let (status, body) = get_path(&router, "/stop").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.contains("not connected"));

        assert_eq!(get_path(&router, "/start").await.0, StatusCode::NO_CONTENT);
        assert_eq!(connector.connects(), 2);
        assert_eq!(get_path(&router, "/start").await.0, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn reboot_reconnects() {
        let (_, connector, runtime) = booted_runtime().await;
        let router = create_control_router(runtime.clone(), None);

        assert_eq!(get_path(&router, "/reboot").await.0, StatusCode::NO_CONTENT);
        assert_eq!(connector.connects(), 2);
        assert!(runtime.is_connected().await);
    }

    #[tokio::test]
    async fn preparing_sends_both_statuses() {
        let (_, connector, runtime) = booted_runtime().await;
        let router = create_control_router(runtime, None);
        let client = connector.client();
        let before = client.statuses().len();

        let (status, _) = get_path(&router, "/preparing?connectorId=2").await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let statuses = client.statuses();
        assert_eq!(&statuses[before..], ["Available", "Preparing"]);
        let last = client.calls_for("StatusNotification").pop().unwrap();
        assert_eq!(last["connectorId"], 2);
    }

    #[tokio::test]
    async fn preparing_requires_connection() {
        let (_, _, runtime) = booted_runtime().await;
        runtime.stop().await.unwrap();
        let router = create_control_router(runtime, None);

        assert_eq!(
            get_path(&router, "/preparing?connectorId=1").await.0,
            StatusCode::BAD_REQUEST
        );
    }

    #[tokio::test]
    async fn ev_stop_without_transaction_is_bad_request() {
        let (_, _, runtime) = booted_runtime().await;
        let router = create_control_router(runtime, None);

        let (status, body) = get_path(&router, "/ev-stop").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.contains("no transaction is running"));
    }

    #[tokio::test]
    async fn ev_stop_ends_running_transaction() {
        let (_, connector, runtime) = booted_runtime().await;
        start_transaction(&connector, &runtime).await;
        let router = create_control_router(runtime.clone(), None);

        let (status, _) = get_path(&router, "/ev-stop").await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert!(runtime.transactions().current().await.unwrap().is_none());

        let stop = connector.client().calls_for("StopTransaction").pop().unwrap();
        assert_eq!(stop["reason"], "EVDisconnected");
    }

    #[tokio::test]
    async fn list_names_every_route() {
        let (_, _, runtime) = booted_runtime().await;
        let router = create_control_router(runtime, None);

        let (status, body) = get_path(&router, "/list").await;
        assert_eq!(status, StatusCode::OK);
        for (path, _) in ENDPOINTS {
            assert!(body.contains(path));
        }
    }

    #[tokio::test]
    async fn metrics_disabled_is_not_found() {
        let (_, _, runtime) = booted_runtime().await;
        let router = create_control_router(runtime, None);
        assert_eq!(get_path(&router, "/metrics").await.0, StatusCode::NOT_FOUND);
    }
}
