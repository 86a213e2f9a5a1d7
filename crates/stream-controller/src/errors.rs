//! Stream Controller error types.
//!
//! All errors map to HTTP status codes via the `IntoResponse` impl. Response
//! bodies follow the wire contract of the session boundary:
//!
//! ```json
//! { "message": "Unable to create livestream", "error": { "code": "PROVISION_FAILURE", ... } }
//! ```
//!
//! Client-facing messages stay generic; platform and store details are
//! logged server-side. Provisioning and teardown failures additionally
//! surface which resources were touched, because the operator has to
//! reconcile them by hand.

use crate::models::{ProvisionFailure, TeardownFailure};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Stream Controller error type.
///
/// Maps to HTTP status codes:
/// - BadRequest: 400 Bad Request
/// - ProvisionFailure, TeardownFailure, CredentialFailure: 502 Bad Gateway
/// - CounterUnavailable: 503 Service Unavailable
/// - Internal: 500 Internal Server Error
#[derive(Debug, Error)]
pub enum ScError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Provisioning failed at {0}")]
    ProvisionFailure(ProvisionFailure),

    #[error("Teardown failed at {0}")]
    TeardownFailure(TeardownFailure),

    #[error("Credential issuance failed: {0}")]
    CredentialFailure(String),

    #[error("Viewer counter unavailable: {0}")]
    CounterUnavailable(String),

    #[error("Internal server error")]
    Internal,
}

impl ScError {
    /// Returns the HTTP status code for this error (for metrics recording).
    pub fn status_code(&self) -> u16 {
        match self {
            ScError::BadRequest(_) => 400,
            ScError::ProvisionFailure(_)
            | ScError::TeardownFailure(_)
            | ScError::CredentialFailure(_) => 502,
            ScError::CounterUnavailable(_) => 503,
            ScError::Internal => 500,
        }
    }

    /// Bounded label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ScError::BadRequest(_) => "bad_request",
            ScError::ProvisionFailure(_) => "provision_failure",
            ScError::TeardownFailure(_) => "teardown_failure",
            ScError::CredentialFailure(_) => "credential_failure",
            ScError::CounterUnavailable(_) => "counter_unavailable",
            ScError::Internal => "internal",
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ErrorDetail>,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: &'static str,

    #[serde(skip_serializing_if = "Option::is_none")]
    failed_step: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    created: Option<serde_json::Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    completed_steps: Option<Vec<String>>,
}

impl ErrorDetail {
    fn code(code: &'static str) -> Self {
        Self {
            code,
            failed_step: None,
            created: None,
            completed_steps: None,
        }
    }
}

impl IntoResponse for ScError {
    fn into_response(self) -> Response {
        let (status, message, error) = match &self {
            ScError::BadRequest(reason) => (StatusCode::BAD_REQUEST, reason.clone(), None),
            ScError::ProvisionFailure(failure) => {
                tracing::error!(
                    target: "sc.errors",
                    failed_step = %failure.failed_step,
                    created = ?failure.created,
                    reason = %failure.reason,
                    "Session provisioning failed; created resources need manual reconciliation"
                );
                let mut detail = ErrorDetail::code("PROVISION_FAILURE");
                detail.failed_step = Some(failure.failed_step.to_string());
                detail.created = serde_json::to_value(&failure.created).ok();
                (
                    StatusCode::BAD_GATEWAY,
                    "Unable to create livestream".to_string(),
                    Some(detail),
                )
            }
            ScError::TeardownFailure(failure) => {
                tracing::error!(
                    target: "sc.errors",
                    failed_step = %failure.failed_step,
                    completed = ?failure.completed_steps,
                    reason = %failure.reason,
                    "Session teardown partially applied"
                );
                let mut detail = ErrorDetail::code("TEARDOWN_FAILURE");
                detail.failed_step = Some(failure.failed_step.to_string());
                detail.completed_steps = Some(
                    failure
                        .completed_steps
                        .iter()
                        .map(ToString::to_string)
                        .collect(),
                );
                (
                    StatusCode::BAD_GATEWAY,
                    "Unable to end stream".to_string(),
                    Some(detail),
                )
            }
            ScError::CredentialFailure(reason) => {
                tracing::warn!(target: "sc.errors", reason = %reason, "Credential issuance failed");
                (
                    StatusCode::BAD_GATEWAY,
                    "Unable to issue access token".to_string(),
                    Some(ErrorDetail::code("CREDENTIAL_FAILURE")),
                )
            }
            ScError::CounterUnavailable(reason) => {
                tracing::warn!(target: "sc.errors", reason = %reason, "Viewer counter unavailable");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "Viewer count temporarily unavailable".to_string(),
                    Some(ErrorDetail::code("COUNTER_UNAVAILABLE")),
                )
            }
            ScError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "An internal error occurred".to_string(),
                Some(ErrorDetail::code("INTERNAL_ERROR")),
            ),
        };

        (status, Json(ErrorResponse { message, error })).into_response()
    }
}
