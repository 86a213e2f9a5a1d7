//! Data models for the Stream Controller.
//!
//! Wire types for the session boundary plus the session handle, the session
//! state machine, and the failure records surfaced for manual reconciliation.

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Resources
// ============================================================================

/// The three platform resources backing one live session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// Video conference room the publisher joins.
    Room,
    /// Publisher endpoint ("player streamer") viewers play back from.
    PublisherEndpoint,
    /// Processor ("media processor") composing the room into the endpoint.
    Processor,
}

impl ResourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceKind::Room => "room",
            ResourceKind::PublisherEndpoint => "publisher_endpoint",
            ResourceKind::Processor => "processor",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal status written to a resource during teardown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceStatus {
    /// Publisher endpoints and processors stop with `ended`.
    Ended,
    /// Rooms close with `completed`.
    Completed,
}

impl ResourceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceStatus::Ended => "ended",
            ResourceStatus::Completed => "completed",
        }
    }

    /// The status that ends a resource of `kind`.
    pub fn terminal_for(kind: ResourceKind) -> Self {
        match kind {
            ResourceKind::Room => ResourceStatus::Completed,
            ResourceKind::PublisherEndpoint | ResourceKind::Processor => ResourceStatus::Ended,
        }
    }
}

impl fmt::Display for ResourceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Session handle
// ============================================================================

/// Caller-held bundle of resource identifiers for one provisioned session.
///
/// The server keeps no copy. Whoever started the session must send this back
/// verbatim to end it. Missing fields deserialize as empty strings so that
/// [`SessionHandle::missing_fields`] can reject them before any platform call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionHandle {
    #[serde(rename = "roomId", default)]
    pub room_id: String,

    #[serde(rename = "streamName", default)]
    pub stream_name: String,

    #[serde(rename = "playerStreamerId", default)]
    pub publisher_endpoint_id: String,

    #[serde(rename = "mediaProcessorId", default)]
    pub processor_id: String,
}

impl SessionHandle {
    /// Wire names of the identifiers that are absent or empty.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("roomId", &self.room_id),
            ("streamName", &self.stream_name),
            ("playerStreamerId", &self.publisher_endpoint_id),
            ("mediaProcessorId", &self.processor_id),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect()
    }

    /// Teardown plan: processor, then publisher endpoint, then room.
    ///
    /// Producers stop before the room closes so no media flows into a
    /// completed room.
    pub fn teardown_order(&self) -> [(ResourceKind, &str); 3] {
        [
            (ResourceKind::Processor, self.processor_id.as_str()),
            (
                ResourceKind::PublisherEndpoint,
                self.publisher_endpoint_id.as_str(),
            ),
            (ResourceKind::Room, self.room_id.as_str()),
        ]
    }
}

// ============================================================================
// Session state machine
// ============================================================================

/// Lifecycle of one session as seen by the handle holder.
///
/// ```text
/// NotStarted -> Starting -> Active -> Ending -> Ended
///                  |                    |
///                  v                    v
///                Failed           PartiallyEnded
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    NotStarted,
    Starting,
    Active,
    Ending,
    Ended,
    Failed,
    PartiallyEnded,
}

/// Rejected state transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid session transition {from:?} -> {to:?}")]
pub struct InvalidTransition {
    pub from: SessionState,
    pub to: SessionState,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SessionState::Ended | SessionState::Failed | SessionState::PartiallyEnded
        )
    }

    /// Move to `next` if the edge exists. No edge skips a state.
    pub fn transition(self, next: SessionState) -> Result<SessionState, InvalidTransition> {
        use SessionState::*;

        let allowed = matches!(
            (self, next),
            (NotStarted, Starting)
                | (Starting, Active)
                | (Starting, Failed)
                | (Active, Ending)
                | (Ending, Ended)
                | (Ending, PartiallyEnded)
        );

        if allowed {
            Ok(next)
        } else {
            Err(InvalidTransition {
                from: self,
                to: next,
            })
        }
    }
}

// ============================================================================
// Failure records
// ============================================================================

/// A resource that exists on the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreatedResource {
    pub kind: ResourceKind,
    pub id: String,
}

/// Step of session start that can fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvisionStep {
    Room,
    PublisherEndpoint,
    Processor,
    /// Resetting the viewer counter after all resources exist.
    CounterReset,
}

impl From<ResourceKind> for ProvisionStep {
    fn from(kind: ResourceKind) -> Self {
        match kind {
            ResourceKind::Room => ProvisionStep::Room,
            ResourceKind::PublisherEndpoint => ProvisionStep::PublisherEndpoint,
            ResourceKind::Processor => ProvisionStep::Processor,
        }
    }
}

impl fmt::Display for ProvisionStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ProvisionStep::Room => "room",
            ProvisionStep::PublisherEndpoint => "publisher_endpoint",
            ProvisionStep::Processor => "processor",
            ProvisionStep::CounterReset => "counter_reset",
        };
        f.write_str(label)
    }
}

/// Session start failed. Resources in `created` were not rolled back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionFailure {
    pub failed_step: ProvisionStep,
    pub created: Vec<CreatedResource>,
    /// Server-side detail; never sent to the client.
    pub reason: String,
}

impl fmt::Display for ProvisionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.failed_step, self.reason)
    }
}

/// Session end stopped part way. `completed_steps` already hold their
/// terminal status; `failed_step` and everything after it do not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeardownFailure {
    pub failed_step: ResourceKind,
    pub completed_steps: Vec<ResourceKind>,
    /// Server-side detail; never sent to the client.
    pub reason: String,
}

impl fmt::Display for TeardownFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.failed_step, self.reason)
    }
}

// ============================================================================
// Request / response bodies
// ============================================================================

/// Body of `POST /start`.
#[derive(Debug, Clone, Deserialize)]
pub struct StartSessionRequest {
    #[serde(rename = "streamName", default)]
    pub stream_name: String,
}

/// Body of `POST /end`.
#[derive(Debug, Clone, Deserialize)]
pub struct EndSessionRequest {
    #[serde(rename = "streamDetails", default)]
    pub stream_details: Option<SessionHandle>,
}

/// Plain `{message}` body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Body of `POST /streamerToken`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PublisherTokenRequest {
    #[serde(default)]
    pub identity: Option<String>,

    #[serde(default)]
    pub room: Option<String>,
}

/// `{token}` body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub token: String,
}

/// Body of `POST /audienceToken`: a token, or the "nobody is live" message.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ViewerTokenResponse {
    Token { token: String },
    NoActiveStream { message: String },
}

/// Body of the audience count endpoints. `null` means no session has
/// initialized the counter yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudienceCountResponse {
    pub count: Option<u64>,
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// "healthy" when the counter store answers, "unhealthy" otherwise.
    pub status: String,

    /// Counter store status.
    pub counter: String,
}
