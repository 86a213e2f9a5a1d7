//! Common utilities and types shared across the stream controller crates.

#![warn(clippy::pedantic)]

/// Module for common data types
pub mod types;

/// Module for secret types that prevent accidental logging
pub mod secret;

/// Module for platform access tokens (claims, signing, verification)
pub mod jwt;
