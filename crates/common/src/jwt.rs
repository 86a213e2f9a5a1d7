//! Platform access tokens.
//!
//! The media platform accepts HS256 JWTs signed with an API key secret. Each
//! token names the API key (`iss`), the account (`sub`), and carries a
//! `grants` object with the bound identity plus exactly one scoped grant:
//!
//! - `video` for publishers (full media access to one room)
//! - `player` for viewers (a playback grant minted by the platform for one
//!   publisher endpoint)
//!
//! Signing is delegated to `jsonwebtoken`; this module only shapes claims.
//!
//! # Usage
//!
//! ```rust,ignore
//! use common::jwt::{AccessTokenSigner, Grant};
//!
//! let signer = AccessTokenSigner::new(account_sid, api_key_sid, api_key_secret);
//! let token = signer.sign("alice", Grant::video("demo-room"), ttl, now)?;
//! ```

use crate::secret::{ExposeSecret, SecretString};
use crate::types::CredentialScope;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

// =============================================================================
// Constants
// =============================================================================

/// Maximum accepted token size when decoding (8KB).
///
/// Checked before any base64 or signature work.
pub const MAX_JWT_SIZE_BYTES: usize = 8192;

/// Default lifetime of a token when the caller has no tighter bound (1 hour).
pub const DEFAULT_ACCESS_TOKEN_TTL: Duration = Duration::from_secs(3600);

/// Upper bound accepted for any token lifetime (24 hours).
pub const MAX_ACCESS_TOKEN_TTL: Duration = Duration::from_secs(86_400);

/// Content type header value the platform expects on access tokens.
pub const ACCESS_TOKEN_CONTENT_TYPE: &str = "twilio-fpa;v=1";

// =============================================================================
// Error Types
// =============================================================================

/// Errors raised while minting or decoding access tokens.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AccessTokenError {
    /// Identity was empty.
    #[error("Access token identity must not be empty")]
    EmptyIdentity,

    /// TTL was zero or above [`MAX_ACCESS_TOKEN_TTL`].
    #[error("Access token TTL out of range: {0}s")]
    InvalidTtl(u64),

    /// `jsonwebtoken` refused to encode.
    #[error("Failed to sign access token: {0}")]
    Signing(String),

    /// Token exceeds [`MAX_JWT_SIZE_BYTES`].
    #[error("The access token is invalid or expired")]
    TokenTooLarge,

    /// Signature, structure or expiry check failed.
    #[error("The access token is invalid or expired")]
    Invalid,
}

// =============================================================================
// Claims Types
// =============================================================================

/// Publisher grant: full read/write media access to one room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoGrant {
    /// Room name (or room id) the holder may join.
    pub room: String,
}

/// The single scoped grant carried by a token.
#[derive(Debug, Clone, PartialEq)]
pub enum Grant {
    /// Publisher access to a room.
    Video(VideoGrant),
    /// Viewer playback of one publisher endpoint. The payload is opaque and
    /// produced by the platform.
    Playback(serde_json::Value),
}

impl Grant {
    /// Convenience constructor for a room grant.
    #[must_use]
    pub fn video(room: impl Into<String>) -> Self {
        Grant::Video(VideoGrant { room: room.into() })
    }

    /// Scope this grant confers.
    #[must_use]
    pub fn scope(&self) -> CredentialScope {
        match self {
            Grant::Video(_) => CredentialScope::Publisher,
            Grant::Playback(_) => CredentialScope::Viewer,
        }
    }
}

/// The `grants` claim object.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Grants {
    /// Identity the token is bound to.
    pub identity: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video: Option<VideoGrant>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player: Option<serde_json::Value>,
}

impl fmt::Debug for Grants {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Grants")
            .field("identity", &"[REDACTED]")
            .field("video", &self.video)
            .field("player", &self.player.as_ref().map(|_| "[GRANT]"))
            .finish()
    }
}

/// Access token claims.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    /// Unique token id: `<api_key_sid>-<iat>`.
    pub jti: String,

    /// API key sid that signed the token.
    pub iss: String,

    /// Account sid the token belongs to.
    pub sub: String,

    /// Issued-at (Unix epoch seconds).
    pub iat: i64,

    /// Expiry (Unix epoch seconds).
    pub exp: i64,

    pub grants: Grants,
}

impl AccessTokenClaims {
    /// Scope implied by the grants, if exactly one scoped grant is present.
    #[must_use]
    pub fn scope(&self) -> Option<CredentialScope> {
        match (&self.grants.video, &self.grants.player) {
            (Some(_), None) => Some(CredentialScope::Publisher),
            (None, Some(_)) => Some(CredentialScope::Viewer),
            _ => None,
        }
    }
}

/// A freshly signed token plus the claims it carries.
#[derive(Debug, Clone)]
pub struct SignedAccessToken {
    pub token: String,
    pub claims: AccessTokenClaims,
}

// =============================================================================
// Signer
// =============================================================================

/// Mints access tokens with the account's API key.
///
/// The secret is held as [`SecretString`]; `Debug` never prints it.
#[derive(Clone)]
pub struct AccessTokenSigner {
    account_sid: String,
    api_key_sid: String,
    api_key_secret: SecretString,
}

impl fmt::Debug for AccessTokenSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessTokenSigner")
            .field("account_sid", &self.account_sid)
            .field("api_key_sid", &self.api_key_sid)
            .field("api_key_secret", &"[REDACTED]")
            .finish()
    }
}

impl AccessTokenSigner {
    #[must_use]
    pub fn new(account_sid: String, api_key_sid: String, api_key_secret: SecretString) -> Self {
        Self {
            account_sid,
            api_key_sid,
            api_key_secret,
        }
    }

    /// Sign a token binding `identity` to `grant`, valid for `ttl` from `now`.
    ///
    /// `now` is Unix epoch seconds; passing it in keeps expiry arithmetic
    /// testable.
    ///
    /// # Errors
    ///
    /// - `EmptyIdentity` if `identity` is empty
    /// - `InvalidTtl` if `ttl` is zero or above [`MAX_ACCESS_TOKEN_TTL`]
    /// - `Signing` if encoding fails
    pub fn sign(
        &self,
        identity: &str,
        grant: Grant,
        ttl: Duration,
        now: i64,
    ) -> Result<SignedAccessToken, AccessTokenError> {
        if identity.is_empty() {
            return Err(AccessTokenError::EmptyIdentity);
        }
        if ttl.is_zero() || ttl > MAX_ACCESS_TOKEN_TTL {
            return Err(AccessTokenError::InvalidTtl(ttl.as_secs()));
        }

        let (video, player) = match grant {
            Grant::Video(video) => (Some(video), None),
            Grant::Playback(player) => (None, Some(player)),
        };

        // Bounded by MAX_ACCESS_TOKEN_TTL above, so the cast cannot wrap.
        #[allow(clippy::cast_possible_wrap)]
        let ttl_secs = ttl.as_secs() as i64;

        let claims = AccessTokenClaims {
            jti: format!("{}-{}", self.api_key_sid, now),
            iss: self.api_key_sid.clone(),
            sub: self.account_sid.clone(),
            iat: now,
            exp: now + ttl_secs,
            grants: Grants {
                identity: identity.to_string(),
                video,
                player,
            },
        };

        let mut header = Header::new(Algorithm::HS256);
        header.typ = Some("JWT".to_string());
        header.cty = Some(ACCESS_TOKEN_CONTENT_TYPE.to_string());

        let key = EncodingKey::from_secret(self.api_key_secret.expose_secret().as_bytes());
        let token = encode(&header, &claims, &key).map_err(|e| {
            tracing::error!(target: "common.jwt", error = %e, "Access token encoding failed");
            AccessTokenError::Signing(e.to_string())
        })?;

        Ok(SignedAccessToken { token, claims })
    }

    /// Decode and verify a token signed by this key, rejecting expired ones.
    ///
    /// # Errors
    ///
    /// - `TokenTooLarge` if the token exceeds [`MAX_JWT_SIZE_BYTES`]
    /// - `Invalid` for any signature, structure or expiry failure
    pub fn verify(&self, token: &str) -> Result<AccessTokenClaims, AccessTokenError> {
        if token.len() > MAX_JWT_SIZE_BYTES {
            tracing::debug!(
                target: "common.jwt",
                token_size = token.len(),
                "Token rejected: size exceeds maximum allowed"
            );
            return Err(AccessTokenError::TokenTooLarge);
        }

        let key = DecodingKey::from_secret(self.api_key_secret.expose_secret().as_bytes());
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_issuer(&[self.api_key_sid.as_str()]);

        decode::<AccessTokenClaims>(token, &key, &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!(target: "common.jwt", error = %e, "Access token verification failed");
                AccessTokenError::Invalid
            })
    }
}

// =============================================================================
// Tests
// =============================================================================
