//! HTTP routes for the Stream Controller.
//!
//! Defines the Axum router and application state.

use crate::config::Config;
use crate::handlers;
use crate::middleware::http_metrics_middleware;
use crate::repositories::ViewerCounter;
use crate::services::{CredentialIssuer, SessionCoordinator};
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Service configuration.
    pub config: Config,

    /// Session start/end orchestration.
    pub coordinator: Arc<SessionCoordinator>,

    /// Publisher and viewer token issuance.
    pub credentials: Arc<CredentialIssuer>,

    /// Shared viewer counter.
    pub counter: Arc<dyn ViewerCounter>,
}

/// Build the application routes.
///
/// Creates an Axum router with:
/// - `/start`, `/end` - session lifecycle
/// - `/streamerToken`, `/audienceToken` - access tokens
/// - `/audienceCount` (+ `/join`, `/leave`) - viewer count
/// - `/health` - counter store ping
/// - `/metrics` - Prometheus metrics endpoint
/// - TraceLayer for request logging
/// - HTTP metrics middleware
/// - A request timeout that outlasts the longest session call chain
pub fn build_routes(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let request_timeout = state.config.request_timeout();

    let api_routes = Router::new()
        .route("/start", post(handlers::start_session))
        .route("/end", post(handlers::end_session))
        .route("/streamerToken", post(handlers::streamer_token))
        .route("/audienceToken", post(handlers::audience_token))
        .route("/audienceCount", get(handlers::audience_count))
        .route("/audienceCount/join", post(handlers::viewer_joined))
        .route("/audienceCount/leave", post(handlers::viewer_left))
        .route("/health", get(handlers::health_check))
        .with_state(state);

    // Metrics route with its own state
    let metrics_routes = Router::new()
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(metrics_handle);

    // Layer order (bottom-to-top execution):
    // 1. TraceLayer - Log request details (innermost)
    // 2. TimeoutLayer - Outlasts every bounded platform/counter call chain
    // 3. http_metrics_middleware - Record ALL responses (outermost)
    api_routes
        .merge(metrics_routes)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(request_timeout))
        .layer(middleware::from_fn(http_metrics_middleware))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::models::ResourceKind;
    use crate::repositories::InMemoryViewerCounter;
    use crate::services::platform::mock::{MockOperation, MockProvisioner};
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use common::jwt::AccessTokenSigner;
    use common::secret::SecretString;
    use http_body_util::BodyExt;
    use metrics_exporter_prometheus::PrometheusBuilder;
    use serde_json::json;
    use std::collections::HashMap;
    use std::time::Duration;
    use tower::ServiceExt;

    /// Platform calls take 11s each under a 20s per-call bound, so a
    /// session operation runs well past 30s without any call timing out.
    const SLOW_CALL: Duration = Duration::from_secs(11);

    fn slow_platform_config() -> Config {
        Config::from_vars(&HashMap::from([
            ("PLATFORM_ACCOUNT_SID".to_string(), "AC-test".to_string()),
            ("PLATFORM_API_KEY_SID".to_string(), "SK-test".to_string()),
            (
                "PLATFORM_API_KEY_SECRET".to_string(),
                "test-signing-secret".to_string(),
            ),
            (
                "PLATFORM_REQUEST_TIMEOUT_SECONDS".to_string(),
                "20".to_string(),
            ),
        ]))
        .expect("Config should load successfully")
    }

    fn test_router(
        provisioner: Arc<MockProvisioner>,
        counter: Arc<InMemoryViewerCounter>,
    ) -> Router {
        let config = slow_platform_config();
        let signer = AccessTokenSigner::new(
            config.account_sid.clone(),
            config.api_key_sid.clone(),
            SecretString::from("test-signing-secret"),
        );
        let coordinator = Arc::new(SessionCoordinator::new(
            provisioner.clone(),
            counter.clone(),
            config.platform_request_timeout,
        ));
        let credentials = Arc::new(CredentialIssuer::new(
            signer,
            provisioner,
            config.publisher_token_ttl,
            config.platform_request_timeout,
        ));
        let state = Arc::new(AppState {
            config,
            coordinator,
            credentials,
            counter,
        });

        build_routes(state, PrometheusBuilder::new().build_recorder().handle())
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn stream_details() -> serde_json::Value {
        json!({
            "streamDetails": {
                "roomId": "R1",
                "streamName": "demo-room",
                "playerStreamerId": "P1",
                "mediaProcessorId": "M1"
            }
        })
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_app_state_is_clone() {
        fn assert_clone<T: Clone>() {}
        assert_clone::<AppState>();
    }

    #[test]
    fn test_app_state_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<AppState>();
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_start_completes_instead_of_timing_out() {
        let provisioner = Arc::new(MockProvisioner::new("R1", "P1", "M1").with_delay(SLOW_CALL));
        let counter = Arc::new(InMemoryViewerCounter::new());
        let app = test_router(provisioner.clone(), counter.clone());

        let response = app
            .oneshot(post_json("/start", json!({"streamName": "demo-room"})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["roomId"], "R1");
        assert_eq!(body["playerStreamerId"], "P1");
        assert_eq!(body["mediaProcessorId"], "M1");

        assert_eq!(provisioner.calls().await.len(), 3);
        assert_eq!(counter.read().await.unwrap(), Some(0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_start_failure_still_reports_created_resources() {
        let provisioner = Arc::new(
            MockProvisioner::new("R1", "P1", "M1")
                .with_delay(SLOW_CALL)
                .failing_on(MockOperation::Create(ResourceKind::Processor)),
        );
        let app = test_router(provisioner, Arc::new(InMemoryViewerCounter::new()));

        let response = app
            .oneshot(post_json("/start", json!({"streamName": "demo-room"})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "PROVISION_FAILURE");
        assert_eq!(body["error"]["failed_step"], "processor");
        assert_eq!(body["error"]["created"][0]["id"], "R1");
        assert_eq!(body["error"]["created"][1]["id"], "P1");
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_partial_teardown_reports_completed_steps() {
        let provisioner = Arc::new(
            MockProvisioner::new("R1", "P1", "M1")
                .with_delay(SLOW_CALL)
                .failing_on(MockOperation::UpdateStatus(ResourceKind::Room)),
        );
        let app = test_router(provisioner, Arc::new(InMemoryViewerCounter::new()));

        let response = app.oneshot(post_json("/end", stream_details())).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "TEARDOWN_FAILURE");
        assert_eq!(body["error"]["failed_step"], "room");
        assert_eq!(
            body["error"]["completed_steps"],
            json!(["processor", "publisher_endpoint"])
        );
    }
}
