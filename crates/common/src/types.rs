//! Common data types shared by the stream controller crates.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Role a credential is scoped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialScope {
    /// Full read/write media access to one room.
    Publisher,
    /// Playback of one publisher endpoint's output.
    Viewer,
}

impl CredentialScope {
    /// Stable label for logs and metrics.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            CredentialScope::Publisher => "publisher",
            CredentialScope::Viewer => "viewer",
        }
    }
}

impl fmt::Display for CredentialScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
