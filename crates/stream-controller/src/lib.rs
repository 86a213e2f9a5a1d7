//! Stream Controller (SC) Service Library
//!
//! Backend for a one-to-many live video service. The SC is stateless apart
//! from a shared viewer counter and is responsible for:
//!
//! - Provisioning and tearing down the platform resources behind a live
//!   session (room, publisher endpoint, processor)
//! - Issuing short-lived access tokens to publishers and viewers
//! - Tracking the live audience size
//!
//! # Architecture
//!
//! The SC follows the Handler -> Service -> Repository pattern:
//!
//! ```text
//! routes/mod.rs -> handlers/*.rs -> services/*.rs -> repositories/*.rs
//! ```
//!
//! # Modules
//!
//! - `config` - Service configuration from environment
//! - `errors` - Error types with HTTP status code mapping
//! - `handlers` - HTTP request handlers
//! - `middleware` - HTTP metrics middleware
//! - `models` - Session handle, state machine and wire types
//! - `observability` - Prometheus metrics
//! - `repositories` - Viewer counter storage
//! - `routes` - Axum router setup
//! - `services` - Session coordinator, credential issuer, platform client

pub mod config;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod observability;
pub mod repositories;
pub mod routes;
pub mod services;
