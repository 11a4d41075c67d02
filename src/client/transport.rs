//! Transport layer for the service client
//!
//! Abstracts the HTTP connection for testability:
//! - [`Transport`] trait: GET/POST of JSON documents against service paths
//! - [`HttpTransport`]: real connection via reqwest (blocking)
//! - [`MockTransport`]: in-process mock service for unit tests

use std::io;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::mock::MockService;

/// Transport trait for service communication
pub trait Transport: Send + Sync {
    /// Execute a GET against a service path and return the parsed JSON body
    fn get(&self, path: &str) -> Result<Value, TransportError>;

    /// Execute a POST with a JSON body and return the parsed JSON response
    fn post_json(&self, path: &str, body: &Value) -> Result<Value, TransportError>;
}

/// Transport errors
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Connection timeout")]
    ConnectionTimeout,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP {status}: {message}")]
    HttpStatus { status: u16, message: String },

    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl TransportError {
    fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::ConnectionTimeout
        } else if err.is_connect() {
            TransportError::ConnectionFailed(err.to_string())
        } else {
            TransportError::Protocol(err.to_string())
        }
    }
}

/// HTTP transport configuration
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Base URL of the service, e.g. `http://127.0.0.1:11000`
    pub base_url: String,
    /// Per-request timeout in seconds
    pub request_timeout_seconds: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:11000".to_string(),
            request_timeout_seconds: 30,
        }
    }
}

/// HTTP transport for production use
pub struct HttpTransport {
    config: HttpConfig,
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    /// Create a new HTTP transport with the given configuration
    pub fn new(config: HttpConfig) -> Result<Self, TransportError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;
        Ok(Self { config, client })
    }

    fn url_for(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    fn read_json(response: reqwest::blocking::Response) -> Result<Value, TransportError> {
        let status = response.status();
        if !status.is_success() {
            let message = response.text().unwrap_or_default();
            return Err(TransportError::HttpStatus {
                status: status.as_u16(),
                message,
            });
        }
        response
            .json::<Value>()
            .map_err(|e| TransportError::Protocol(format!("Invalid response JSON: {}", e)))
    }
}

impl Transport for HttpTransport {
    fn get(&self, path: &str) -> Result<Value, TransportError> {
        let response = self
            .client
            .get(self.url_for(path))
            .send()
            .map_err(TransportError::from_reqwest)?;
        Self::read_json(response)
    }

    fn post_json(&self, path: &str, body: &Value) -> Result<Value, TransportError> {
        let response = self
            .client
            .post(self.url_for(path))
            .json(body)
            .send()
            .map_err(TransportError::from_reqwest)?;
        Self::read_json(response)
    }
}

/// Mock transport for testing - routes directly to a MockService in-process
pub struct MockTransport {
    service: Arc<MockService>,
}

impl MockTransport {
    /// Create a new mock transport with a fresh mock service
    pub fn new() -> Self {
        Self {
            service: Arc::new(MockService::new()),
        }
    }

    /// Create a mock transport backed by a shared, pre-configured service
    pub fn with_service(service: Arc<MockService>) -> Self {
        Self { service }
    }

    /// The underlying mock service, for test configuration and assertions
    pub fn service(&self) -> &MockService {
        &self.service
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for MockTransport {
    fn get(&self, path: &str) -> Result<Value, TransportError> {
        self.service.handle_get(path)
    }

    fn post_json(&self, path: &str, body: &Value) -> Result<Value, TransportError> {
        self.service.handle_post(path, body)
    }
}
