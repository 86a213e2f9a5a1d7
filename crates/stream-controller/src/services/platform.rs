//! Media platform REST client.
//!
//! Thin adapter over the platform's three resource-lifecycle APIs (rooms,
//! publisher endpoints, processors) plus the two reads the credential path
//! needs (started publisher endpoints, playback grants).
//!
//! # Behaviour
//!
//! - Every call is a single round-trip with no retry
//! - Every call is bounded by the configured request timeout
//! - Requests authenticate with HTTP basic auth (API key sid / secret)
//! - Failures are logged here and returned as [`PlatformError`]; callers
//!   decide how they surface

use crate::config::Config;
use crate::models::{ResourceKind, ResourceStatus};
use crate::observability::metrics::record_platform_call;
use async_trait::async_trait;
use common::secret::{ExposeSecret, SecretString};
use reqwest::Client;
use serde::Deserialize;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, instrument, warn};

/// Extension the processor runs to compose a room into a publisher endpoint.
pub const PROCESSOR_EXTENSION: &str = "video-composer-v1";

/// Room type requested for live sessions.
pub const ROOM_TYPE: &str = "go";

/// Status value used to list live publisher endpoints.
pub const STARTED_STATUS: &str = "started";

/// Connect timeout for platform requests.
const PLATFORM_CONNECT_TIMEOUT_SECS: u64 = 5;

/// Failure of a single platform call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlatformError {
    #[error("platform call timed out")]
    Timeout,

    #[error("platform unreachable: {0}")]
    Unavailable(String),

    #[error("platform rejected request with status {0}")]
    Rejected(u16),

    #[error("unexpected platform response: {0}")]
    InvalidResponse(String),
}

impl PlatformError {
    fn label(&self) -> &'static str {
        match self {
            PlatformError::Timeout => "timeout",
            PlatformError::Unavailable(_) => "unavailable",
            PlatformError::Rejected(_) => "rejected",
            PlatformError::InvalidResponse(_) => "invalid_response",
        }
    }
}

/// Link configuration handed to the processor at creation time.
///
/// The processor reads media from `room_id` and writes to
/// `publisher_endpoint_id`. The binding is fixed for the session lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessorBinding {
    pub room_id: String,
    pub publisher_endpoint_id: String,
}

impl ProcessorBinding {
    /// The extension context payload, serialized as the platform expects.
    pub fn extension_context(&self) -> serde_json::Value {
        serde_json::json!({
            "identity": PROCESSOR_EXTENSION,
            "room": { "name": self.room_id },
            "outputs": [self.publisher_endpoint_id],
        })
    }
}

/// Parameters for creating one resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateResource {
    Room { unique_name: String },
    PublisherEndpoint,
    Processor(ProcessorBinding),
}

impl CreateResource {
    pub fn kind(&self) -> ResourceKind {
        match self {
            CreateResource::Room { .. } => ResourceKind::Room,
            CreateResource::PublisherEndpoint => ResourceKind::PublisherEndpoint,
            CreateResource::Processor(_) => ResourceKind::Processor,
        }
    }
}

/// Resource lifecycle operations against the platform (enables mocking).
#[async_trait]
pub trait ResourceProvisioner: Send + Sync {
    /// Create a resource and return its platform identifier.
    async fn create(&self, request: CreateResource) -> Result<String, PlatformError>;

    /// Write a new status to an existing resource.
    async fn update_status(
        &self,
        kind: ResourceKind,
        id: &str,
        status: ResourceStatus,
    ) -> Result<(), PlatformError>;

    /// Identifiers of publisher endpoints currently in `started` status, in
    /// the platform's listing order.
    async fn list_started_publisher_endpoints(&self) -> Result<Vec<String>, PlatformError>;

    /// Mint a playback grant for one publisher endpoint.
    ///
    /// The grant payload is opaque and embedded verbatim in viewer tokens.
    async fn create_playback_grant(
        &self,
        publisher_endpoint_id: &str,
        ttl: Duration,
    ) -> Result<serde_json::Value, PlatformError>;
}

#[derive(Debug, Deserialize)]
struct ResourceBody {
    sid: String,
}

#[derive(Debug, Deserialize)]
struct PublisherEndpointPage {
    #[serde(default)]
    player_streamers: Vec<ResourceBody>,
}

#[derive(Debug, Deserialize)]
struct PlaybackGrantBody {
    grant: serde_json::Value,
}

/// HTTP client for the platform REST API.
#[derive(Clone)]
pub struct PlatformClient {
    client: Client,
    video_base_url: String,
    media_base_url: String,
    api_key_sid: String,
    api_key_secret: SecretString,
}

impl PlatformClient {
    /// Build a client from service configuration.
    ///
    /// # Errors
    ///
    /// Returns `PlatformError::Unavailable` if the HTTP client cannot be built.
    pub fn new(config: &Config) -> Result<Self, PlatformError> {
        let client = Client::builder()
            .timeout(config.platform_request_timeout)
            .connect_timeout(Duration::from_secs(PLATFORM_CONNECT_TIMEOUT_SECS))
            .build()
            .map_err(|e| {
                warn!(target: "sc.services.platform", error = %e, "Failed to build HTTP client");
                PlatformError::Unavailable(e.to_string())
            })?;

        Ok(Self {
            client,
            video_base_url: config.video_base_url.clone(),
            media_base_url: config.media_base_url.clone(),
            api_key_sid: config.api_key_sid.clone(),
            api_key_secret: config.api_key_secret.clone(),
        })
    }

    fn collection_url(&self, kind: ResourceKind) -> String {
        match kind {
            ResourceKind::Room => format!("{}/v1/Rooms", self.video_base_url),
            ResourceKind::PublisherEndpoint => format!("{}/v1/PlayerStreamers", self.media_base_url),
            ResourceKind::Processor => format!("{}/v1/MediaProcessors", self.media_base_url),
        }
    }

    fn form_request(&self, url: &str, form: &[(&str, String)]) -> reqwest::RequestBuilder {
        self.client
            .post(url)
            .basic_auth(&self.api_key_sid, Some(self.api_key_secret.expose_secret()))
            .form(form)
    }

    /// Send a request, record metrics, and decode the JSON body.
    async fn send_json<T: serde::de::DeserializeOwned>(
        &self,
        operation: &'static str,
        request: reqwest::RequestBuilder,
    ) -> Result<T, PlatformError> {
        let start = Instant::now();
        let result = Self::execute(request).await;

        let result = match result {
            Ok(response) => response.json::<T>().await.map_err(|e| {
                warn!(target: "sc.services.platform", operation, error = %e, "Failed to parse platform response");
                PlatformError::InvalidResponse(e.to_string())
            }),
            Err(e) => Err(e),
        };

        let status = match &result {
            Ok(_) => "success",
            Err(e) => e.label(),
        };
        record_platform_call(operation, status, start.elapsed());

        if let Err(e) = &result {
            warn!(target: "sc.services.platform", operation, error = %e, "Platform call failed");
        }
        result
    }

    async fn execute(request: reqwest::RequestBuilder) -> Result<reqwest::Response, PlatformError> {
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                PlatformError::Timeout
            } else {
                PlatformError::Unavailable(e.to_string())
            }
        })?;

        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            Err(PlatformError::Rejected(status.as_u16()))
        }
    }
}

#[async_trait]
impl ResourceProvisioner for PlatformClient {
    #[instrument(skip_all, fields(kind = %request.kind()))]
    async fn create(&self, request: CreateResource) -> Result<String, PlatformError> {
        let kind = request.kind();
        let url = self.collection_url(kind);

        let (operation, form) = match request {
            CreateResource::Room { unique_name } => (
                "create_room",
                vec![
                    ("UniqueName", unique_name),
                    ("Type", ROOM_TYPE.to_string()),
                ],
            ),
            CreateResource::PublisherEndpoint => ("create_publisher_endpoint", Vec::new()),
            CreateResource::Processor(binding) => (
                "create_processor",
                vec![
                    ("Extension", PROCESSOR_EXTENSION.to_string()),
                    ("ExtensionContext", binding.extension_context().to_string()),
                ],
            ),
        };

        let body: ResourceBody = self
            .send_json(operation, self.form_request(&url, &form))
            .await?;

        debug!(target: "sc.services.platform", kind = %kind, sid = %body.sid, "Resource created");
        Ok(body.sid)
    }

    #[instrument(skip_all, fields(kind = %kind, id = %id, status = %status))]
    async fn update_status(
        &self,
        kind: ResourceKind,
        id: &str,
        status: ResourceStatus,
    ) -> Result<(), PlatformError> {
        let url = format!("{}/{}", self.collection_url(kind), id);
        let form = [("Status", status.as_str().to_string())];

        let _: serde_json::Value = self
            .send_json("update_status", self.form_request(&url, &form))
            .await?;

        debug!(target: "sc.services.platform", kind = %kind, id = %id, status = %status, "Resource status updated");
        Ok(())
    }

    #[instrument(skip_all)]
    async fn list_started_publisher_endpoints(&self) -> Result<Vec<String>, PlatformError> {
        let url = self.collection_url(ResourceKind::PublisherEndpoint);
        let request = self
            .client
            .get(&url)
            .basic_auth(&self.api_key_sid, Some(self.api_key_secret.expose_secret()))
            .query(&[("Status", STARTED_STATUS)]);

        let page: PublisherEndpointPage = self
            .send_json("list_started_publisher_endpoints", request)
            .await?;

        Ok(page.player_streamers.into_iter().map(|p| p.sid).collect())
    }

    #[instrument(skip_all, fields(publisher_endpoint_id = %publisher_endpoint_id))]
    async fn create_playback_grant(
        &self,
        publisher_endpoint_id: &str,
        ttl: Duration,
    ) -> Result<serde_json::Value, PlatformError> {
        let url = format!(
            "{}/{}/PlaybackGrant",
            self.collection_url(ResourceKind::PublisherEndpoint),
            publisher_endpoint_id
        );
        let form = [("Ttl", ttl.as_secs().to_string())];

        let body: PlaybackGrantBody = self
            .send_json("create_playback_grant", self.form_request(&url, &form))
            .await?;

        Ok(body.grant)
    }
}

/// Mock provisioner module for testing.
///
/// Records every call in order so tests can assert on provisioning and
/// teardown sequencing.
pub mod mock {
    use super::*;
    use std::collections::HashSet;
    use tokio::sync::Mutex;

    /// One recorded provisioner call.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum ProvisionerCall {
        Create(CreateResource),
        UpdateStatus {
            kind: ResourceKind,
            id: String,
            status: ResourceStatus,
        },
        ListStarted,
        PlaybackGrant {
            publisher_endpoint_id: String,
            ttl_secs: u64,
        },
    }

    /// Operation a mock can be told to fail.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub enum MockOperation {
        Create(ResourceKind),
        UpdateStatus(ResourceKind),
        ListStarted,
        PlaybackGrant,
    }

    /// Mock provisioner for unit and integration tests.
    pub struct MockProvisioner {
        room_id: String,
        publisher_endpoint_id: String,
        processor_id: String,
        started_endpoints: Vec<String>,
        failing: HashSet<MockOperation>,
        delay: Option<Duration>,
        calls: Mutex<Vec<ProvisionerCall>>,
    }

    impl MockProvisioner {
        /// A provisioner that hands out `room_id`, `publisher_endpoint_id`
        /// and `processor_id` and has no started endpoints.
        pub fn new(room_id: &str, publisher_endpoint_id: &str, processor_id: &str) -> Self {
            Self {
                room_id: room_id.to_string(),
                publisher_endpoint_id: publisher_endpoint_id.to_string(),
                processor_id: processor_id.to_string(),
                started_endpoints: Vec::new(),
                failing: HashSet::new(),
                delay: None,
                calls: Mutex::new(Vec::new()),
            }
        }

        /// Publisher endpoints reported as started, in listing order.
        pub fn with_started_endpoints(mut self, endpoints: &[&str]) -> Self {
            self.started_endpoints = endpoints.iter().map(|e| (*e).to_string()).collect();
            self
        }

        /// Make `operation` fail with a 500 rejection.
        pub fn failing_on(mut self, operation: MockOperation) -> Self {
            self.failing.insert(operation);
            self
        }

        /// Delay every call (for timeout tests).
        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        /// Calls made so far, in order.
        pub async fn calls(&self) -> Vec<ProvisionerCall> {
            self.calls.lock().await.clone()
        }

        async fn record(&self, call: ProvisionerCall, operation: MockOperation) -> Result<(), PlatformError> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.calls.lock().await.push(call);

            if self.failing.contains(&operation) {
                return Err(PlatformError::Rejected(500));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl ResourceProvisioner for MockProvisioner {
        async fn create(&self, request: CreateResource) -> Result<String, PlatformError> {
            let kind = request.kind();
            self.record(ProvisionerCall::Create(request), MockOperation::Create(kind))
                .await?;

            Ok(match kind {
                ResourceKind::Room => self.room_id.clone(),
                ResourceKind::PublisherEndpoint => self.publisher_endpoint_id.clone(),
                ResourceKind::Processor => self.processor_id.clone(),
            })
        }

        async fn update_status(
            &self,
            kind: ResourceKind,
            id: &str,
            status: ResourceStatus,
        ) -> Result<(), PlatformError> {
            self.record(
                ProvisionerCall::UpdateStatus {
                    kind,
                    id: id.to_string(),
                    status,
                },
                MockOperation::UpdateStatus(kind),
            )
            .await
        }

        async fn list_started_publisher_endpoints(&self) -> Result<Vec<String>, PlatformError> {
            self.record(ProvisionerCall::ListStarted, MockOperation::ListStarted)
                .await?;
            Ok(self.started_endpoints.clone())
        }

        async fn create_playback_grant(
            &self,
            publisher_endpoint_id: &str,
            ttl: Duration,
        ) -> Result<serde_json::Value, PlatformError> {
            self.record(
                ProvisionerCall::PlaybackGrant {
                    publisher_endpoint_id: publisher_endpoint_id.to_string(),
                    ttl_secs: ttl.as_secs(),
                },
                MockOperation::PlaybackGrant,
            )
            .await?;

            Ok(serde_json::json!({
                "playbackUrl": format!("https://playback.example/{publisher_endpoint_id}"),
                "requestCredentials": null,
            }))
        }
    }
}
