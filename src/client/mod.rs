//! Service API client
//!
//! Typed operations over a [`Transport`]: catalog listings, command
//! invocation, and per-calculation status reads. Responses are validated
//! eagerly; a missing or malformed field is a schema error here rather than
//! a null that surfaces somewhere downstream.

pub mod transport;

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::config::ClientConfig;
use crate::protocol::{
    Application, CalculationStatus, CalculationSummary, CommandSpec, InvokeRequest,
    InvokeResponse,
};

pub use transport::{HttpConfig, HttpTransport, MockTransport, Transport, TransportError};

/// Client errors
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Schema error in {context}: {detail}")]
    Schema {
        context: &'static str,
        detail: String,
    },

    #[error("Invocation rejected by service (status {status}): {msg}")]
    InvokeRejected { status: String, msg: String },
}

impl ApiError {
    fn schema(context: &'static str, detail: impl ToString) -> Self {
        ApiError::Schema {
            context,
            detail: detail.to_string(),
        }
    }
}

/// Result type for client operations
pub type ApiResult<T> = Result<T, ApiError>;

/// Acknowledgement returned by a successful invoke
#[derive(Debug, Clone)]
pub struct InvokeReceipt {
    /// Handle for all subsequent status queries
    pub calculation_id: String,
    /// Service's human-readable acknowledgement
    pub msg: String,
}

/// Client for the calculation service
pub struct ApiClient {
    transport: Arc<dyn Transport>,
}

impl ApiClient {
    /// Create a client over an existing transport
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Create a client with an HTTP transport built from configuration
    pub fn from_config(config: &ClientConfig) -> ApiResult<Self> {
        let transport = HttpTransport::new(HttpConfig {
            base_url: config.server_url.clone(),
            request_timeout_seconds: config.request_timeout_secs,
        })?;
        Ok(Self::new(Arc::new(transport)))
    }

    fn get_parsed<T: DeserializeOwned>(&self, path: &str, context: &'static str) -> ApiResult<T> {
        let value = self.transport.get(path)?;
        serde_json::from_value(value).map_err(|e| ApiError::schema(context, e))
    }

    /// List registered applications
    pub fn list_applications(&self) -> ApiResult<Vec<Application>> {
        self.get_parsed("/applications/", "applications listing")
    }

    /// List available commands
    pub fn list_commands(&self) -> ApiResult<Vec<CommandSpec>> {
        self.get_parsed("/commands/", "commands listing")
    }

    /// List known calculations
    pub fn list_calculations(&self) -> ApiResult<Vec<CalculationSummary>> {
        self.get_parsed("/calculations/", "calculations listing")
    }

    /// Submit a command invocation and return the calculation handle
    ///
    /// Fails fast when the service reports a non-success status or omits
    /// `payload.calculation_id`.
    pub fn invoke(&self, request: &InvokeRequest) -> ApiResult<InvokeReceipt> {
        let body = serde_json::to_value(request)
            .map_err(|e| ApiError::schema("invoke request", e))?;
        let value = self.transport.post_json("/commands/invoke/", &body)?;

        let response: InvokeResponse =
            serde_json::from_value(value).map_err(|e| ApiError::schema("invoke response", e))?;

        if !response.accepted() {
            return Err(ApiError::InvokeRejected {
                status: response.status,
                msg: response.msg,
            });
        }

        let payload = response.payload.ok_or_else(|| {
            ApiError::schema("invoke response", "missing payload.calculation_id")
        })?;

        Ok(InvokeReceipt {
            calculation_id: payload.calculation_id,
            msg: response.msg,
        })
    }

    /// Fetch one status snapshot for a calculation handle
    pub fn calculation_status(&self, calculation_id: &str) -> ApiResult<CalculationStatus> {
        let path = format!("/calculations/{}/", calculation_id);
        let value = self.transport.get(&path)?;
        serde_json::from_value(value).map_err(|e| ApiError::schema("status snapshot", e))
    }

    /// Raw GET for callers that want the unparsed document
    pub fn get_raw(&self, path: &str) -> ApiResult<Value> {
        Ok(self.transport.get(path)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockService;
    use crate::protocol::StatusTag;
    use serde_json::json;

    fn client_with_service() -> (ApiClient, Arc<MockService>) {
        let service = Arc::new(MockService::with_demo_catalog());
        let transport = MockTransport::with_service(Arc::clone(&service));
        (ApiClient::new(Arc::new(transport)), service)
    }

    #[test]
    fn test_list_applications() {
        let (client, _service) = client_with_service();
        let apps = client.list_applications().unwrap();
        assert!(!apps.is_empty());
        assert_eq!(apps[0].name, "Dummy CLI");
    }

    #[test]
    fn test_list_commands() {
        let (client, _service) = client_with_service();
        let commands = client.list_commands().unwrap();
        assert!(commands.iter().any(|c| c.name == "greet_and_sleep"));
    }

    #[test]
    fn test_invoke_returns_handle() {
        let (client, service) = client_with_service();

        let request = InvokeRequest::new("dummy_cli", "0.1.0", "greet_and_sleep")
            .with_arg("name", json!("Max"))
            .with_arg("duration", json!(10));
        let receipt = client.invoke(&request).unwrap();

        assert!(!receipt.calculation_id.is_empty());
        let recorded = service.recorded_invocations();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].command_name, "greet_and_sleep");
    }

    #[test]
    fn test_invoke_rejected_status() {
        let (client, service) = client_with_service();
        service.script_invoke_rejection("failed", "unknown command");

        let request = InvokeRequest::new("dummy_cli", "0.1.0", "does_not_exist");
        let result = client.invoke(&request);

        assert!(matches!(result, Err(ApiError::InvokeRejected { .. })));
    }

    #[test]
    fn test_invoke_missing_calculation_id_fails_fast() {
        let (client, service) = client_with_service();
        service.script_invoke_raw(json!({"msg": "ok", "status": "success"}));

        let request = InvokeRequest::new("dummy_cli", "0.1.0", "greet_and_sleep");
        let result = client.invoke(&request);

        assert!(matches!(result, Err(ApiError::Schema { .. })));
    }

    #[test]
    fn test_calculation_status() {
        let (client, service) = client_with_service();
        service.script_statuses(
            "abc123",
            vec![CalculationStatus::with_tag("abc123", StatusTag::Pending)],
        );

        let snapshot = client.calculation_status("abc123").unwrap();
        assert_eq!(snapshot.status, StatusTag::Pending);
    }

    #[test]
    fn test_status_unknown_handle_is_transport_error() {
        let (client, _service) = client_with_service();
        let result = client.calculation_status("never-invoked");
        assert!(matches!(
            result,
            Err(ApiError::Transport(TransportError::HttpStatus {
                status: 404,
                ..
            }))
        ));
    }

    #[test]
    fn test_malformed_listing_is_schema_error() {
        let (client, service) = client_with_service();
        service.script_get_raw("/applications/", json!({"not": "an array"}));

        let result = client.list_applications();
        assert!(matches!(result, Err(ApiError::Schema { .. })));
    }
}
