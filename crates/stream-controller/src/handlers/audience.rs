//! Viewer count handlers.
//!
//! - `GET /audienceCount` - read the live viewer count
//! - `POST /audienceCount/join` - a viewer started watching
//! - `POST /audienceCount/leave` - a viewer stopped watching
//!
//! All three answer `{"count": n}`, with `null` when no session has
//! initialized the counter. A store outage is 503, never a silent zero.

use crate::errors::ScError;
use crate::models::AudienceCountResponse;
use crate::observability::metrics::set_viewer_count;
use crate::routes::AppState;
use axum::extract::State;
use axum::Json;
use std::sync::Arc;
use tracing::instrument;

fn respond(count: Option<u64>) -> Json<AudienceCountResponse> {
    if let Some(count) = count {
        set_viewer_count(count);
    }
    Json(AudienceCountResponse { count })
}

/// Handler for GET /audienceCount
#[instrument(
    skip_all,
    name = "sc.audience.count",
    fields(method = "GET", endpoint = "/audienceCount")
)]
pub async fn audience_count(
    State(state): State<Arc<AppState>>,
) -> Result<Json<AudienceCountResponse>, ScError> {
    let count = state.counter.read().await?;
    Ok(respond(count))
}

/// Handler for POST /audienceCount/join
#[instrument(
    skip_all,
    name = "sc.audience.join",
    fields(method = "POST", endpoint = "/audienceCount/join")
)]
pub async fn viewer_joined(
    State(state): State<Arc<AppState>>,
) -> Result<Json<AudienceCountResponse>, ScError> {
    let count = state.counter.increment().await?;
    Ok(respond(count))
}

/// Handler for POST /audienceCount/leave
///
/// Leaving at zero keeps the count at zero.
#[instrument(
    skip_all,
    name = "sc.audience.leave",
    fields(method = "POST", endpoint = "/audienceCount/leave")
)]
pub async fn viewer_left(
    State(state): State<Arc<AppState>>,
) -> Result<Json<AudienceCountResponse>, ScError> {
    let count = state.counter.decrement().await?;
    Ok(respond(count))
}
