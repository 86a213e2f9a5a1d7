//! Secret types for protecting credential-signing material from accidental logging.
//!
//! Re-exports the [`secrecy`] crate's types. The platform API key secret and
//! any Redis URL carrying a password must be held as [`SecretString`] so that
//! `Debug` output and tracing fields show `[REDACTED]` instead of the value.
//!
//! # Example
//!
//! ```rust
//! use common::secret::{ExposeSecret, SecretString};
//!
//! #[derive(Debug)]
//! struct PlatformCredentials {
//!     api_key_sid: String,
//!     api_key_secret: SecretString,
//! }
//!
//! let creds = PlatformCredentials {
//!     api_key_sid: "SK123".to_string(),
//!     api_key_secret: SecretString::from("shh"),
//! };
//!
//! assert!(!format!("{creds:?}").contains("shh"));
//! assert_eq!(creds.api_key_secret.expose_secret(), "shh");
//! ```

pub use secrecy::{ExposeSecret, SecretString};
