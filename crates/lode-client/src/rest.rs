//! REST request execution.
//!
//! [`RestExecutor`] is the seam between the catalog client and the HTTP
//! transport: every component issues its calls through this trait, and
//! tests substitute an in-process implementation. [`HttpExecutor`] is the
//! production implementation over a blocking reqwest client, owning the
//! retry policy configured at construction.

use crate::config::{ClientConfig, DEFAULT_TIMEOUT_SECS};
use crate::error::CatalogError;
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Failure of a single executed request.
#[derive(Error, Debug, Clone)]
pub enum RestError {
    /// The server responded with a non-2xx status. `info` is the server's
    /// JSON error payload when parseable, otherwise a synthesized message
    /// object.
    #[error("server returned status {status}")]
    Status { status: u16, info: Value },

    /// The request never produced a response (connect failure, timeout,
    /// protocol error).
    #[error("transport error: {0}")]
    Transport(String),

    /// The server responded 2xx but the body was not valid JSON.
    #[error("invalid response body: {0}")]
    Decode(String),
}

/// Executes GET/POST requests against the catalog and returns parsed JSON.
///
/// Retry and timeout policy live behind this trait; callers never retry.
pub trait RestExecutor: Send + Sync {
    /// Issues a GET request with query parameters.
    fn get(&self, url: &str, params: &[(&str, String)]) -> Result<Value, RestError>;

    /// Issues a POST request with a JSON body.
    fn post(&self, url: &str, body: &Value) -> Result<Value, RestError>;
}

/// Production executor over a blocking HTTP client.
#[derive(Debug)]
pub struct HttpExecutor {
    client: Client,
    retry_status_codes: Vec<u16>,
    retry_max_times: u32,
}

impl HttpExecutor {
    /// Builds an executor from client configuration.
    pub fn new(config: &ClientConfig) -> Result<Self, CatalogError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "X-RestLi-Protocol-Version",
            HeaderValue::from_static("2.0.0"),
        );
        if let Some(token) = &config.token {
            let value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|e| CatalogError::ConfigError(format!("invalid token: {e}")))?;
            headers.insert(AUTHORIZATION, value);
        }
        for (key, value) in &config.extra_headers {
            match (
                HeaderName::try_from(key.as_str()),
                HeaderValue::try_from(value.as_str()),
            ) {
                (Ok(name), Ok(value)) => {
                    headers.insert(name, value);
                }
                _ => warn!(header = %key, "skipping invalid extra header"),
            }
        }

        let mut builder = Client::builder()
            .timeout(Duration::from_secs(
                config.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS),
            ))
            .default_headers(headers);

        if let Some(path) = &config.ca_certificate_path {
            let pem = std::fs::read(path).map_err(|e| {
                CatalogError::ConfigError(format!("failed to read CA bundle {path}: {e}"))
            })?;
            let certificate = reqwest::Certificate::from_pem(&pem).map_err(|e| {
                CatalogError::ConfigError(format!("invalid CA bundle {path}: {e}"))
            })?;
            builder = builder.add_root_certificate(certificate);
        }

        if config.disable_tls_verification {
            warn!(
                server = %config.server,
                "TLS certificate verification disabled; connection is open to interception"
            );
            builder = builder.danger_accept_invalid_certs(true);
        }

        let client = builder
            .build()
            .map_err(|e| CatalogError::ConfigError(e.to_string()))?;

        Ok(Self {
            client,
            retry_status_codes: config.retry_status_codes.clone(),
            retry_max_times: config.retry_max_times,
        })
    }

    /// Sends a request, retrying transport failures and the configured
    /// retryable status codes with exponential backoff.
    fn execute(&self, request: RequestBuilder) -> Result<Value, RestError> {
        let mut delay = Duration::from_millis(250);
        let mut last_error = None;

        for attempt in 0..=self.retry_max_times {
            if attempt > 0 {
                debug!(attempt, ?delay, "retrying catalog request");
                std::thread::sleep(delay);
                delay = std::cmp::min(delay * 2, Duration::from_secs(8));
            }

            let attempt_request = request
                .try_clone()
                .ok_or_else(|| RestError::Transport("failed to clone request".to_string()))?;

            match attempt_request.send() {
                Ok(response) => {
                    let status = response.status();
                    let text = response
                        .text()
                        .map_err(|e| RestError::Transport(e.to_string()))?;

                    if status.is_success() {
                        return serde_json::from_str(&text).map_err(|e| {
                            RestError::Decode(format!(
                                "failed to parse response (status {status}): {e}"
                            ))
                        });
                    }

                    let info = serde_json::from_str(&text).unwrap_or_else(|_| {
                        json!({ "message": format!("server returned status {status}: {text}") })
                    });
                    let error = RestError::Status {
                        status: status.as_u16(),
                        info,
                    };

                    if self.retry_status_codes.contains(&status.as_u16())
                        && attempt < self.retry_max_times
                    {
                        warn!(status = status.as_u16(), "retryable status from catalog");
                        last_error = Some(error);
                        continue;
                    }
                    return Err(error);
                }
                Err(e) => {
                    last_error = Some(RestError::Transport(e.to_string()));
                    if attempt >= self.retry_max_times {
                        break;
                    }
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| RestError::Transport("request failed without a response".into())))
    }
}

impl RestExecutor for HttpExecutor {
    fn get(&self, url: &str, params: &[(&str, String)]) -> Result<Value, RestError> {
        let mut request = self.client.get(url);
        if !params.is_empty() {
            request = request.query(params);
        }
        self.execute(request)
    }

    fn post(&self, url: &str, body: &Value) -> Result<Value, RestError> {
        self.execute(self.client.post(url).json(body))
    }
}
