//! Session handlers.
//!
//! - `POST /start` - provision a live session
//! - `POST /end` - tear a live session down

use crate::errors::ScError;
use crate::handlers::parse_body;
use crate::models::{EndSessionRequest, MessageResponse, SessionHandle, StartSessionRequest};
use crate::routes::AppState;
use axum::body::Bytes;
use axum::extract::State;
use axum::Json;
use std::sync::Arc;
use tracing::instrument;

/// Handler for POST /start
///
/// # Request Body
///
/// ```json
/// { "streamName": "demo-room" }
/// ```
///
/// # Response
///
/// - 200 OK: the session handle
///   `{roomId, streamName, playerStreamerId, mediaProcessorId}`
/// - 400 Bad Request: missing or empty `streamName`
/// - 502 Bad Gateway: a platform call failed; `error.created` lists the
///   resources left behind
#[instrument(
    skip_all,
    name = "sc.session.start",
    fields(method = "POST", endpoint = "/start")
)]
pub async fn start_session(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<SessionHandle>, ScError> {
    let request: StartSessionRequest = parse_body(&body)?;

    let handle = state.coordinator.start_session(&request.stream_name).await?;

    Ok(Json(handle))
}

/// Handler for POST /end
///
/// # Request Body
///
/// ```json
/// {
///   "streamDetails": {
///     "roomId": "RM...",
///     "streamName": "demo-room",
///     "playerStreamerId": "VJ...",
///     "mediaProcessorId": "ZX..."
///   }
/// }
/// ```
///
/// # Response
///
/// - 200 OK: `{"message": "Successfully ended stream demo-room"}`
/// - 400 Bad Request: `streamDetails` absent or incomplete (no platform call)
/// - 502 Bad Gateway: teardown stopped part way; `error.completed_steps`
///   lists what was already ended
#[instrument(
    skip_all,
    name = "sc.session.end",
    fields(method = "POST", endpoint = "/end")
)]
pub async fn end_session(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<MessageResponse>, ScError> {
    let request: EndSessionRequest = parse_body(&body)?;

    let handle = request
        .stream_details
        .ok_or_else(|| ScError::BadRequest("Missing stream details".to_string()))?;

    let message = state.coordinator.end_session(&handle).await?;

    Ok(Json(MessageResponse { message }))
}
