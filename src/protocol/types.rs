//! Request and response schema for the calculation service
//!
//! Field names follow the service's JSON exactly. Handles are opaque: the
//! service is free to issue numeric or string calculation IDs, so the
//! deserializer accepts both and normalizes to a string.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Status tag reported per snapshot.
///
/// The vocabulary is owned by the service. Only `successful` and `error` are
/// terminal; everything else (including tags this client has never seen)
/// means the calculation is still in flight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum StatusTag {
    Pending,
    Successful,
    Error,
    /// Any tag the client does not recognize. Non-terminal.
    Other(String),
}

impl StatusTag {
    /// Returns true if no further snapshots will change the outcome
    pub fn is_terminal(&self) -> bool {
        matches!(self, StatusTag::Successful | StatusTag::Error)
    }

    pub fn as_str(&self) -> &str {
        match self {
            StatusTag::Pending => "pending",
            StatusTag::Successful => "successful",
            StatusTag::Error => "error",
            StatusTag::Other(s) => s.as_str(),
        }
    }
}

impl From<String> for StatusTag {
    fn from(s: String) -> Self {
        match s.as_str() {
            "pending" => StatusTag::Pending,
            "successful" => StatusTag::Successful,
            "error" => StatusTag::Error,
            _ => StatusTag::Other(s),
        }
    }
}

impl From<StatusTag> for String {
    fn from(tag: StatusTag) -> Self {
        tag.as_str().to_string()
    }
}

impl fmt::Display for StatusTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Accept a handle serialized as either a JSON string or a number
fn handle_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    match value {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(de::Error::custom(format!(
            "calculation_id must be a string or number, got {}",
            other
        ))),
    }
}

/// An application registered with the service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Application {
    pub id: i64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A named, parameterized command exposed by an application
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandSpec {
    pub id: i64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application_id: Option<i64>,
    /// Parameter name to declared dtype
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
}

/// One entry of the calculation listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalculationSummary {
    #[serde(deserialize_with = "handle_string")]
    pub calculation_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<StatusTag>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
}

/// Body of `POST /commands/invoke/`
///
/// Immutable once submitted; arguments are scalar JSON values keyed by
/// parameter name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvokeRequest {
    pub application_slug: String,
    pub application_version: String,
    pub command_name: String,
    pub arguments: BTreeMap<String, Value>,
}

impl InvokeRequest {
    pub fn new(
        application_slug: impl Into<String>,
        application_version: impl Into<String>,
        command_name: impl Into<String>,
    ) -> Self {
        Self {
            application_slug: application_slug.into(),
            application_version: application_version.into(),
            command_name: command_name.into(),
            arguments: BTreeMap::new(),
        }
    }

    /// Add one argument, builder style
    pub fn with_arg(mut self, name: impl Into<String>, value: Value) -> Self {
        self.arguments.insert(name.into(), value);
        self
    }
}

/// Response to an invoke request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvokeResponse {
    #[serde(default)]
    pub msg: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<InvokePayload>,
}

/// Invoke response payload carrying the new handle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvokePayload {
    #[serde(deserialize_with = "handle_string")]
    pub calculation_id: String,
}

impl InvokeResponse {
    /// Returns true if the service accepted the invocation
    pub fn accepted(&self) -> bool {
        self.status == "success" || self.status == "successful" || self.status == "ok"
    }
}

/// Status snapshot for one calculation, fetched per poll
///
/// Each snapshot is an independent read; callers keep at most the latest one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalculationStatus {
    #[serde(deserialize_with = "handle_string")]
    pub calculation_id: String,
    pub status: StatusTag,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stdout: Option<String>,
    /// Result payload, populated when status is `successful`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Error payload, populated when status is `error`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
}

impl CalculationStatus {
    /// Minimal snapshot with just a handle and tag (test fixtures, mock)
    pub fn with_tag(calculation_id: impl Into<String>, status: StatusTag) -> Self {
        Self {
            calculation_id: calculation_id.into(),
            status,
            stdout: None,
            result: None,
            error: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_tag_round_trip() {
        let tag: StatusTag = serde_json::from_value(json!("pending")).unwrap();
        assert_eq!(tag, StatusTag::Pending);
        assert!(!tag.is_terminal());

        let tag: StatusTag = serde_json::from_value(json!("successful")).unwrap();
        assert_eq!(tag, StatusTag::Successful);
        assert!(tag.is_terminal());

        let tag: StatusTag = serde_json::from_value(json!("error")).unwrap();
        assert!(tag.is_terminal());
    }

    #[test]
    fn test_status_tag_unknown_is_open() {
        let tag: StatusTag = serde_json::from_value(json!("queued_remotely")).unwrap();
        assert_eq!(tag, StatusTag::Other("queued_remotely".to_string()));
        assert!(!tag.is_terminal());
        assert_eq!(tag.as_str(), "queued_remotely");
    }

    #[test]
    fn test_status_tag_serializes_as_string() {
        let json = serde_json::to_value(StatusTag::Successful).unwrap();
        assert_eq!(json, json!("successful"));
    }

    #[test]
    fn test_calculation_status_parsing() {
        let snapshot: CalculationStatus = serde_json::from_value(json!({
            "calculation_id": "abc123",
            "status": "successful",
            "stdout": "Hello Max\n",
            "result": "done"
        }))
        .unwrap();

        assert_eq!(snapshot.calculation_id, "abc123");
        assert_eq!(snapshot.status, StatusTag::Successful);
        assert_eq!(snapshot.result, Some(json!("done")));
        assert!(snapshot.error.is_none());
    }

    #[test]
    fn test_numeric_handle_normalized() {
        let snapshot: CalculationStatus = serde_json::from_value(json!({
            "calculation_id": 42,
            "status": "pending"
        }))
        .unwrap();
        assert_eq!(snapshot.calculation_id, "42");

        let summary: CalculationSummary =
            serde_json::from_value(json!({"calculation_id": 7})).unwrap();
        assert_eq!(summary.calculation_id, "7");
    }

    #[test]
    fn test_calculation_summary_timestamp() {
        let summary: CalculationSummary = serde_json::from_value(json!({
            "calculation_id": "abc",
            "status": "pending",
            "started_at": "2024-03-01T12:30:00Z"
        }))
        .unwrap();
        let started = summary.started_at.unwrap();
        assert_eq!(started.to_rfc3339(), "2024-03-01T12:30:00+00:00");
    }

    #[test]
    fn test_handle_rejects_non_scalar() {
        let result: Result<CalculationStatus, _> = serde_json::from_value(json!({
            "calculation_id": {"nested": true},
            "status": "pending"
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_invoke_request_body_shape() {
        let request = InvokeRequest::new("dummy_cli", "0.1.0", "greet_and_sleep")
            .with_arg("name", json!("Max"))
            .with_arg("duration", json!(10));

        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(body["application_slug"], "dummy_cli");
        assert_eq!(body["application_version"], "0.1.0");
        assert_eq!(body["command_name"], "greet_and_sleep");
        assert_eq!(body["arguments"]["name"], "Max");
        assert_eq!(body["arguments"]["duration"], 10);
    }

    #[test]
    fn test_invoke_response_accepted() {
        let response: InvokeResponse = serde_json::from_value(json!({
            "msg": "Submitted",
            "status": "success",
            "payload": {"calculation_id": "calc-0001"}
        }))
        .unwrap();

        assert!(response.accepted());
        assert_eq!(response.payload.unwrap().calculation_id, "calc-0001");
    }

    #[test]
    fn test_invoke_response_missing_payload() {
        let response: InvokeResponse = serde_json::from_value(json!({
            "msg": "No such command",
            "status": "failed"
        }))
        .unwrap();

        assert!(!response.accepted());
        assert!(response.payload.is_none());
    }

    #[test]
    fn test_command_spec_defaults() {
        let spec: CommandSpec =
            serde_json::from_value(json!({"id": 3, "name": "refine"})).unwrap();
        assert!(spec.parameters.is_empty());
        assert!(spec.application_id.is_none());
    }
}
