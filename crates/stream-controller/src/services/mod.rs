//! Service layer for the Stream Controller.
//!
//! This module contains services that interact with external systems
//! and encapsulate business logic.
//!
//! # Components
//!
//! - `coordinator` - Session start/end orchestration
//! - `credentials` - Publisher and viewer access tokens
//! - `platform` - REST client for the media platform (resource provisioner)

pub mod coordinator;
pub mod credentials;
pub mod platform;

pub use coordinator::SessionCoordinator;
pub use credentials::{Credential, CredentialIssuer, ViewerCredential, VIEWER_CREDENTIAL_TTL};
pub use platform::{PlatformClient, PlatformError, ResourceProvisioner};
