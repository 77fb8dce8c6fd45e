//! Client configuration.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Default catalog server address.
pub const DEFAULT_SERVER: &str = "http://localhost:8080";

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

fn default_server() -> String {
    DEFAULT_SERVER.to_string()
}

fn default_retry_status_codes() -> Vec<u16> {
    vec![429, 502, 503, 504]
}

fn default_retry_max_times() -> u32 {
    3
}

/// Connectivity configuration for a catalog client.
///
/// Timeout and retry policy configured here apply to every request the
/// client issues; no operation overrides them per call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the catalog server.
    pub server: String,
    /// Bearer token for authentication, if the server requires one.
    pub token: Option<String>,
    /// Request timeout in seconds.
    pub timeout_secs: Option<u64>,
    /// HTTP status codes that trigger a retry.
    pub retry_status_codes: Vec<u16>,
    /// Maximum number of retries per request.
    pub retry_max_times: u32,
    /// Additional headers to send with every request.
    pub extra_headers: HashMap<String, String>,
    /// Path to a PEM CA bundle for TLS verification.
    pub ca_certificate_path: Option<String>,
    /// Whether to skip TLS certificate verification.
    pub disable_tls_verification: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server: default_server(),
            token: None,
            timeout_secs: None,
            retry_status_codes: default_retry_status_codes(),
            retry_max_times: default_retry_max_times(),
            extra_headers: HashMap::new(),
            ca_certificate_path: None,
            disable_tls_verification: false,
        }
    }
}

impl ClientConfig {
    /// Creates a configuration pointing at the given server.
    pub fn new(server: impl Into<String>) -> Self {
        Self {
            server: server.into().trim_end_matches('/').to_string(),
            ..Self::default()
        }
    }

    /// Sets the bearer token.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Sets the request timeout.
    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = Some(timeout_secs);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.server, DEFAULT_SERVER);
        assert_eq!(config.retry_status_codes, vec![429, 502, 503, 504]);
        assert_eq!(config.retry_max_times, 3);
        assert!(!config.disable_tls_verification);
    }

    #[test]
    fn new_strips_trailing_slash() {
        let config = ClientConfig::new("https://catalog.example.com/");
        assert_eq!(config.server, "https://catalog.example.com");
    }

    #[test]
    fn deserializes_partial_config() {
        let config: ClientConfig =
            serde_json::from_str(r#"{"server": "https://catalog.example.com", "token": "t"}"#)
                .unwrap();
        assert_eq!(config.server, "https://catalog.example.com");
        assert_eq!(config.token.as_deref(), Some("t"));
        assert_eq!(config.retry_max_times, 3);
    }
}
