//! Credential issuer.
//!
//! Mints short-lived access tokens for publishers (room access) and viewers
//! (playback of the live publisher endpoint).
//!
//! # Security
//!
//! - Viewer identities are 20 bytes from the system CSPRNG, hex-encoded, and
//!   generated per request so two viewer tokens cannot be linked
//! - Viewer tokens expire exactly 60 seconds after issuance and are never
//!   refreshed
//! - Token strings are redacted from `Debug` output

use crate::errors::ScError;
use crate::observability::metrics::record_credential;
use crate::services::platform::ResourceProvisioner;
use chrono::{DateTime, Utc};
use common::jwt::{AccessTokenSigner, Grant, SignedAccessToken};
use common::types::CredentialScope;
use ring::rand::{SecureRandom, SystemRandom};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, instrument, warn};

/// Lifetime of viewer credentials and of the playback grants they carry.
pub const VIEWER_CREDENTIAL_TTL: Duration = Duration::from_secs(60);

/// Random bytes in a viewer identity (40 hex characters).
const VIEWER_IDENTITY_BYTES: usize = 20;

/// An issued access token with the facts it encodes.
#[derive(Clone)]
pub struct Credential {
    pub identity: String,
    pub scope: CredentialScope,
    /// Room name for publishers, publisher endpoint id for viewers.
    pub target_resource_id: String,
    pub expires_at: DateTime<Utc>,
    pub token: String,
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("identity", &self.identity)
            .field("scope", &self.scope)
            .field("target_resource_id", &self.target_resource_id)
            .field("expires_at", &self.expires_at)
            .field("token", &"[REDACTED]")
            .finish()
    }
}

/// Outcome of a viewer credential request.
#[derive(Debug, Clone)]
pub enum ViewerCredential {
    Issued(Credential),
    /// No publisher endpoint is live. Expected, not an error.
    NoActiveStream,
}

/// Issues publisher and viewer credentials.
pub struct CredentialIssuer {
    signer: AccessTokenSigner,
    provisioner: Arc<dyn ResourceProvisioner>,
    publisher_ttl: Duration,
    call_timeout: Duration,
    rng: SystemRandom,
}

impl CredentialIssuer {
    pub fn new(
        signer: AccessTokenSigner,
        provisioner: Arc<dyn ResourceProvisioner>,
        publisher_ttl: Duration,
        call_timeout: Duration,
    ) -> Self {
        Self {
            signer,
            provisioner,
            publisher_ttl,
            call_timeout,
            rng: SystemRandom::new(),
        }
    }

    /// Issue a publisher credential for `room_name`, bound to `identity`.
    ///
    /// # Errors
    ///
    /// - `ScError::BadRequest` if either input is empty
    /// - `ScError::CredentialFailure` if signing fails
    #[instrument(skip_all, fields(room = %room_name))]
    pub fn issue_publisher_credential(
        &self,
        identity: &str,
        room_name: &str,
    ) -> Result<Credential, ScError> {
        let scope = CredentialScope::Publisher;

        if identity.trim().is_empty() || room_name.trim().is_empty() {
            record_credential(scope.as_str(), "bad_request");
            return Err(ScError::BadRequest(
                "Missing identity or stream name".to_string(),
            ));
        }

        let credential = self
            .sign(identity, Grant::video(room_name), self.publisher_ttl, room_name)
            .inspect_err(|_| record_credential(scope.as_str(), "error"))?;

        record_credential(scope.as_str(), "issued");
        debug!(target: "sc.services.credentials", room = %room_name, expires_at = %credential.expires_at, "Publisher credential issued");
        Ok(credential)
    }

    /// Issue a viewer credential for the live stream, if there is one.
    ///
    /// When several publisher endpoints are started, the first one listed
    /// by the platform is used.
    ///
    /// # Errors
    ///
    /// - `ScError::CredentialFailure` if the platform listing, the playback
    ///   grant, or signing fails
    /// - `ScError::Internal` if the system RNG fails
    #[instrument(skip_all)]
    pub async fn issue_viewer_credential(&self) -> Result<ViewerCredential, ScError> {
        let scope = CredentialScope::Viewer;

        let result = self.viewer_credential().await;
        let status = match &result {
            Ok(ViewerCredential::Issued(_)) => "issued",
            Ok(ViewerCredential::NoActiveStream) => "no_active_stream",
            Err(_) => "error",
        };
        record_credential(scope.as_str(), status);

        result
    }

    async fn viewer_credential(&self) -> Result<ViewerCredential, ScError> {
        let identity = self.viewer_identity()?;

        let started = tokio::time::timeout(
            self.call_timeout,
            self.provisioner.list_started_publisher_endpoints(),
        )
        .await
        .map_err(|_| ScError::CredentialFailure("listing publisher endpoints timed out".to_string()))?
        .map_err(|e| ScError::CredentialFailure(format!("listing publisher endpoints: {e}")))?;

        let Some(publisher_endpoint_id) = started.into_iter().next() else {
            debug!(target: "sc.services.credentials", "No started publisher endpoint");
            return Ok(ViewerCredential::NoActiveStream);
        };

        let grant = tokio::time::timeout(
            self.call_timeout,
            self.provisioner
                .create_playback_grant(&publisher_endpoint_id, VIEWER_CREDENTIAL_TTL),
        )
        .await
        .map_err(|_| ScError::CredentialFailure("playback grant timed out".to_string()))?
        .map_err(|e| ScError::CredentialFailure(format!("playback grant: {e}")))?;

        let credential = self.sign(
            &identity,
            Grant::Playback(grant),
            VIEWER_CREDENTIAL_TTL,
            &publisher_endpoint_id,
        )?;

        debug!(
            target: "sc.services.credentials",
            publisher_endpoint_id = %publisher_endpoint_id,
            expires_at = %credential.expires_at,
            "Viewer credential issued"
        );
        Ok(ViewerCredential::Issued(credential))
    }

    /// Fresh random viewer identity.
    fn viewer_identity(&self) -> Result<String, ScError> {
        let mut bytes = [0u8; VIEWER_IDENTITY_BYTES];
        self.rng.fill(&mut bytes).map_err(|_| {
            error!(target: "sc.services.credentials", "Failed to generate random bytes");
            ScError::Internal
        })?;
        Ok(hex::encode(bytes))
    }

    fn sign(
        &self,
        identity: &str,
        grant: Grant,
        ttl: Duration,
        target_resource_id: &str,
    ) -> Result<Credential, ScError> {
        let scope = grant.scope();
        let SignedAccessToken { token, claims } = self
            .signer
            .sign(identity, grant, ttl, Utc::now().timestamp())
            .map_err(|e| {
                warn!(target: "sc.services.credentials", scope = %scope, error = %e, "Token signing failed");
                ScError::CredentialFailure(e.to_string())
            })?;

        let expires_at = DateTime::<Utc>::from_timestamp(claims.exp, 0).ok_or_else(|| {
            error!(target: "sc.services.credentials", exp = claims.exp, "Token expiry out of range");
            ScError::Internal
        })?;

        Ok(Credential {
            identity: identity.to_string(),
            scope,
            target_resource_id: target_resource_id.to_string(),
            expires_at,
            token,
        })
    }
}
