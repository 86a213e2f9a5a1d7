//! HTTP request handlers for the Stream Controller.

pub mod audience;
pub mod health;
pub mod metrics;
pub mod sessions;
pub mod tokens;

pub use audience::{audience_count, viewer_joined, viewer_left};
pub use health::health_check;
pub use metrics::metrics_handler;
pub use sessions::{end_session, start_session};
pub use tokens::{audience_token, streamer_token, NO_ACTIVE_STREAM_MESSAGE};

use crate::errors::ScError;
use axum::body::Bytes;
use serde::de::DeserializeOwned;

/// Parse a JSON body, answering 400 (not axum's default 422) on failure.
pub(crate) fn parse_body<T: DeserializeOwned>(body: &Bytes) -> Result<T, ScError> {
    serde_json::from_slice(body).map_err(|e| {
        tracing::debug!(target: "sc.handlers", error = %e, "Invalid request body");
        ScError::BadRequest("Invalid request body".to_string())
    })
}
