//! # SC Test Utilities
//!
//! Shared test utilities for the Stream Controller (SC) service.
//!
//! This crate provides:
//! - Server test harness (`TestStreamServer` for E2E tests)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use sc_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() -> Result<()> {
//!     let provisioner = Arc::new(MockProvisioner::new("R1", "P1", "M1"));
//!     let counter = Arc::new(InMemoryViewerCounter::new());
//!     let server = TestStreamServer::spawn(provisioner, counter).await?;
//!
//!     let response = reqwest::Client::new()
//!         .get(format!("{}/audienceCount", server.url()))
//!         .send()
//!         .await?;
//!
//!     assert_eq!(response.status(), 200);
//!     Ok(())
//! }
//! ```

pub mod server_harness;

// Re-export commonly used items
pub use server_harness::*;
