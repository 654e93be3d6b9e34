//! Construction-time settings for a `RequestClient`.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// How a client is built. Missing fields take their defaults when
/// deserialized, so `{}` is a valid configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Keep session cookies in a jar file for the client's lifetime.
    pub enable_cookies: bool,
    /// Verify TLS certificates.
    pub verify_tls: bool,
    /// Directory for the jar file. Defaults to the system temp dir.
    pub cookie_dir: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            enable_cookies: true,
            verify_tls: true,
            cookie_dir: None,
        }
    }
}

impl ClientConfig {
    pub fn new(enable_cookies: bool, verify_tls: bool) -> Self {
        Self {
            enable_cookies,
            verify_tls,
            cookie_dir: None,
        }
    }

    pub fn with_cookie_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cookie_dir = Some(dir.into());
        self
    }

    pub(crate) fn resolved_cookie_dir(&self) -> PathBuf {
        self.cookie_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}
