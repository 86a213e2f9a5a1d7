//! Access token handlers.

use crate::errors::ScError;
use crate::handlers::parse_body;
use crate::models::{PublisherTokenRequest, TokenResponse, ViewerTokenResponse};
use crate::routes::AppState;
use crate::services::ViewerCredential;
use axum::body::Bytes;
use axum::extract::State;
use axum::Json;
use std::sync::Arc;
use tracing::instrument;

/// Message returned to viewers when nothing is live.
pub const NO_ACTIVE_STREAM_MESSAGE: &str = "No one is streaming right now";

/// Handler for POST /streamerToken
///
/// Body: `{"identity": "...", "room": "..."}`. Both are required; either
/// missing yields 400 `{"message": "Missing identity or stream name"}`.
#[instrument(
    skip_all,
    name = "sc.token.publisher",
    fields(method = "POST", endpoint = "/streamerToken")
)]
pub async fn streamer_token(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<TokenResponse>, ScError> {
    let request: PublisherTokenRequest = parse_body(&body)?;

    let credential = state.credentials.issue_publisher_credential(
        request.identity.as_deref().unwrap_or_default(),
        request.room.as_deref().unwrap_or_default(),
    )?;

    Ok(Json(TokenResponse {
        token: credential.token,
    }))
}

/// Handler for POST /audienceToken
///
/// Returns `{"token": "..."}` for the live stream, or 200
/// `{"message": "No one is streaming right now"}` when nothing is live.
/// The request body is ignored.
#[instrument(
    skip_all,
    name = "sc.token.viewer",
    fields(method = "POST", endpoint = "/audienceToken")
)]
pub async fn audience_token(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ViewerTokenResponse>, ScError> {
    let response = match state.credentials.issue_viewer_credential().await? {
        ViewerCredential::Issued(credential) => ViewerTokenResponse::Token {
            token: credential.token,
        },
        ViewerCredential::NoActiveStream => ViewerTokenResponse::NoActiveStream {
            message: NO_ACTIVE_STREAM_MESSAGE.to_string(),
        },
    };

    Ok(Json(response))
}
