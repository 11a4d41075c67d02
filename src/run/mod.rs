//! Invoke-and-wait orchestration
//!
//! Mirrors the interactive flow: submit an invocation, keep the returned
//! handle, poll until terminal, and fold the outcome into a
//! [`CalculationReport`] with the wall-clock duration of the whole
//! operation (measured from just before the invoke request).

use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::client::{ApiClient, ApiError, InvokeReceipt};
use crate::poll::{PollConfig, PollObserver, PollOutcome, Poller};
use crate::protocol::InvokeRequest;

/// Final report for one invoke-and-wait operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalculationReport {
    pub calculation_id: String,
    /// Terminal disposition: `successful`, `error`, `fetch_failed`,
    /// `cancelled`, or `attempts_exhausted`
    pub disposition: String,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stdout: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
}

impl CalculationReport {
    fn from_outcome(calculation_id: String, outcome: &PollOutcome, duration_ms: u64) -> Self {
        let disposition = match outcome {
            PollOutcome::Succeeded(_) => "successful",
            PollOutcome::ServiceError(_) => "error",
            PollOutcome::FetchFailed(_) => "fetch_failed",
            PollOutcome::Cancelled => "cancelled",
            PollOutcome::AttemptsExhausted { .. } => "attempts_exhausted",
        };

        let snapshot = outcome.snapshot();
        let error = match outcome {
            PollOutcome::FetchFailed(err) => Some(Value::String(err.to_string())),
            _ => outcome.error().cloned(),
        };

        Self {
            calculation_id,
            disposition: disposition.to_string(),
            duration_ms,
            stdout: snapshot.and_then(|s| s.stdout.clone()),
            result: outcome.result().cloned(),
            error,
        }
    }

    /// Whether the calculation reached `successful`
    pub fn is_success(&self) -> bool {
        self.disposition == "successful"
    }
}

/// Submit an invocation and poll its calculation to completion.
///
/// The receipt for the submitted invocation is passed to `on_submit` as soon
/// as the service acknowledges it, before polling begins. Invoke-side errors
/// (transport, rejection, schema) surface as `Err`; everything after a handle
/// exists is folded into the report.
pub fn invoke_and_wait(
    client: &ApiClient,
    request: &InvokeRequest,
    poller: &Poller<'_>,
    observer: &mut dyn PollObserver,
    on_submit: impl FnOnce(&InvokeReceipt),
) -> Result<CalculationReport, ApiError> {
    let started = Instant::now();

    let receipt = client.invoke(request)?;
    on_submit(&receipt);

    let outcome = poller.wait(&receipt.calculation_id, observer);
    let duration_ms = started.elapsed().as_millis() as u64;

    Ok(CalculationReport::from_outcome(
        receipt.calculation_id,
        &outcome,
        duration_ms,
    ))
}

/// Convenience wrapper building a default poller from a config
pub fn invoke_and_wait_with_config(
    client: &ApiClient,
    request: &InvokeRequest,
    config: PollConfig,
    observer: &mut dyn PollObserver,
) -> Result<CalculationReport, ApiError> {
    let poller = Poller::with_config(client, config);
    invoke_and_wait(client, request, &poller, observer, |_| {})
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockTransport;
    use crate::mock::{MockService, Route};
    use crate::poll::NullObserver;
    use crate::protocol::{CalculationStatus, StatusTag};
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    fn fast_config() -> PollConfig {
        PollConfig {
            interval: Duration::from_millis(1),
            max_polls: None,
        }
    }

    fn client_with_service() -> (ApiClient, Arc<MockService>) {
        let service = Arc::new(MockService::with_demo_catalog());
        let transport = MockTransport::with_service(Arc::clone(&service));
        (ApiClient::new(Arc::new(transport)), service)
    }

    fn greet_request() -> InvokeRequest {
        InvokeRequest::new("dummy_cli", "0.1.0", "greet_and_sleep")
            .with_arg("name", json!("Max"))
            .with_arg("duration", json!(10))
    }

    #[test]
    fn test_invoke_and_wait_success() {
        let (client, service) = client_with_service();
        service.force_next_handle("abc123");
        let mut done = CalculationStatus::with_tag("abc123", StatusTag::Successful);
        done.result = Some(json!("done"));
        done.stdout = Some("Hello Max\n".to_string());
        service.script_statuses(
            "abc123",
            vec![
                CalculationStatus::with_tag("abc123", StatusTag::Pending),
                done,
            ],
        );

        let mut seen_receipt = None;
        let poller = Poller::with_config(&client, fast_config());
        let report = invoke_and_wait(
            &client,
            &greet_request(),
            &poller,
            &mut NullObserver,
            |receipt| seen_receipt = Some(receipt.calculation_id.clone()),
        )
        .unwrap();

        assert_eq!(seen_receipt.as_deref(), Some("abc123"));
        assert!(report.is_success());
        assert_eq!(report.result, Some(json!("done")));
        assert_eq!(report.stdout.as_deref(), Some("Hello Max\n"));
        assert_eq!(service.fetch_count("abc123"), 2);
    }

    #[test]
    fn test_invoke_and_wait_service_error() {
        let (client, service) = client_with_service();
        service.force_next_handle("xyz");
        let mut failed = CalculationStatus::with_tag("xyz", StatusTag::Error);
        failed.error = Some(json!("boom"));
        service.script_statuses("xyz", vec![failed]);

        let report = invoke_and_wait_with_config(
            &client,
            &greet_request(),
            fast_config(),
            &mut NullObserver,
        )
        .unwrap();

        assert_eq!(report.disposition, "error");
        assert_eq!(report.error, Some(json!("boom")));
        assert!(report.result.is_none());
    }

    #[test]
    fn test_invoke_rejection_is_err() {
        let (client, service) = client_with_service();
        service.script_invoke_rejection("failed", "no such command");

        let result = invoke_and_wait_with_config(
            &client,
            &greet_request(),
            fast_config(),
            &mut NullObserver,
        );

        assert!(matches!(result, Err(ApiError::InvokeRejected { .. })));
    }

    #[test]
    fn test_fetch_failure_reported_not_err() {
        let (client, service) = client_with_service();
        service.force_next_handle("h");
        service.script_statuses(
            "h",
            vec![CalculationStatus::with_tag("h", StatusTag::Pending)],
        );
        service.inject_failure(Route::Status, "connection reset");

        let report = invoke_and_wait_with_config(
            &client,
            &greet_request(),
            fast_config(),
            &mut NullObserver,
        )
        .unwrap();

        assert_eq!(report.disposition, "fetch_failed");
        assert!(report
            .error
            .as_ref()
            .and_then(|e| e.as_str())
            .unwrap()
            .contains("connection reset"));
    }

    #[test]
    fn test_duration_is_recorded() {
        let (client, service) = client_with_service();
        service.force_next_handle("d");
        service.script_statuses(
            "d",
            vec![
                CalculationStatus::with_tag("d", StatusTag::Pending),
                CalculationStatus::with_tag("d", StatusTag::Successful),
            ],
        );

        let report = invoke_and_wait_with_config(
            &client,
            &greet_request(),
            PollConfig {
                interval: Duration::from_millis(20),
                max_polls: None,
            },
            &mut NullObserver,
        )
        .unwrap();

        // One inter-poll delay of 20ms must be visible in the duration
        assert!(report.duration_ms >= 20);
    }

    #[test]
    fn test_report_serialization_skips_empty() {
        let report = CalculationReport {
            calculation_id: "abc".to_string(),
            disposition: "cancelled".to_string(),
            duration_ms: 12,
            stdout: None,
            result: None,
            error: None,
        };
        let value = serde_json::to_value(&report).unwrap();
        assert!(value.get("stdout").is_none());
        assert!(value.get("result").is_none());
        assert_eq!(value["disposition"], "cancelled");
    }
}
