//! Test server harness for E2E testing
//!
//! Provides `TestStreamServer` for spawning real SC server instances in
//! tests, wired to a mock provisioner and an in-memory viewer counter.

use common::jwt::AccessTokenSigner;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};
use stream_controller::config::Config;
use stream_controller::observability::metrics::init_metrics_recorder;
use stream_controller::repositories::InMemoryViewerCounter;
use stream_controller::routes::{self, AppState};
use stream_controller::services::platform::mock::MockProvisioner;
use stream_controller::services::{CredentialIssuer, SessionCoordinator};
use tokio::task::JoinHandle;

/// Global metrics handle for test servers. The recorder can only be
/// installed once per process.
static TEST_METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn test_metrics_handle() -> PrometheusHandle {
    TEST_METRICS_HANDLE
        .get_or_init(|| {
            init_metrics_recorder()
                .unwrap_or_else(|_| PrometheusBuilder::new().build_recorder().handle())
        })
        .clone()
}

/// Environment used by every test server.
pub fn test_vars() -> HashMap<String, String> {
    HashMap::from([
        ("BIND_ADDRESS".to_string(), "127.0.0.1:0".to_string()),
        ("PLATFORM_ACCOUNT_SID".to_string(), "AC-test".to_string()),
        ("PLATFORM_API_KEY_SID".to_string(), "SK-test".to_string()),
        (
            "PLATFORM_API_KEY_SECRET".to_string(),
            "test-signing-secret".to_string(),
        ),
        (
            "PLATFORM_REQUEST_TIMEOUT_SECONDS".to_string(),
            "1".to_string(),
        ),
    ])
}

/// Test harness for spawning the Stream Controller in E2E tests.
///
/// # Example
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_health_flow_e2e() -> Result<()> {
///     let provisioner = Arc::new(MockProvisioner::new("R1", "P1", "M1"));
///     let counter = Arc::new(InMemoryViewerCounter::new());
///     let server = TestStreamServer::spawn(provisioner, counter).await?;
///
///     let response = reqwest::get(format!("{}/health", server.url())).await?;
///     assert_eq!(response.status(), 200);
///     Ok(())
/// }
/// ```
pub struct TestStreamServer {
    addr: SocketAddr,
    config: Config,
    provisioner: Arc<MockProvisioner>,
    counter: Arc<InMemoryViewerCounter>,
    _handle: JoinHandle<()>,
}

impl TestStreamServer {
    /// Spawn a new test server instance.
    ///
    /// The server will:
    /// - Bind to a random available port (127.0.0.1:0)
    /// - Use `provisioner` for every platform call
    /// - Use `counter` as the shared viewer counter
    pub async fn spawn(
        provisioner: Arc<MockProvisioner>,
        counter: Arc<InMemoryViewerCounter>,
    ) -> Result<Self, anyhow::Error> {
        let config = Config::from_vars(&test_vars())
            .map_err(|e| anyhow::anyhow!("Failed to create config: {}", e))?;

        let coordinator = Arc::new(SessionCoordinator::new(
            provisioner.clone(),
            counter.clone(),
            config.platform_request_timeout,
        ));
        let credentials = Arc::new(CredentialIssuer::new(
            signer_for(&config),
            provisioner.clone(),
            config.publisher_token_ttl,
            config.platform_request_timeout,
        ));

        let state = Arc::new(AppState {
            config: config.clone(),
            coordinator,
            credentials,
            counter: counter.clone(),
        });

        // Build routes using stream-controller's real route builder
        let app = routes::build_routes(state, test_metrics_handle());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind test server: {}", e))?;

        let addr = listener
            .local_addr()
            .map_err(|e| anyhow::anyhow!("Failed to get local address: {}", e))?;

        let handle = tokio::spawn(async move {
            let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
            if let Err(e) = axum::serve(listener, make_service).await {
                eprintln!("Test server error: {}", e);
            }
        });

        Ok(Self {
            addr,
            config,
            provisioner,
            counter,
            _handle: handle,
        })
    }

    /// Get the base URL of the test server.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Get the socket address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Get reference to the server configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The mock provisioner, for asserting on recorded calls.
    pub fn provisioner(&self) -> &MockProvisioner {
        &self.provisioner
    }

    /// The viewer counter, for seeding state or simulating an outage.
    pub fn counter(&self) -> &InMemoryViewerCounter {
        &self.counter
    }

    /// A signer with the server's key, for verifying issued tokens.
    pub fn signer(&self) -> AccessTokenSigner {
        signer_for(&self.config)
    }
}

fn signer_for(config: &Config) -> AccessTokenSigner {
    AccessTokenSigner::new(
        config.account_sid.clone(),
        config.api_key_sid.clone(),
        config.api_key_secret.clone(),
    )
}

impl Drop for TestStreamServer {
    fn drop(&mut self) {
        // Abort the HTTP server task so the port is released when the test ends
        self._handle.abort();
    }
}
