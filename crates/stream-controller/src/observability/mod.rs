//! Observability module for the Stream Controller.
//!
//! Provides metrics definitions and recording helpers.

pub mod metrics;
