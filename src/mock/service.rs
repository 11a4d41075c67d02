//! Mock service implementation
//!
//! Holds a catalog of applications/commands, a per-handle queue of status
//! snapshots, and failure injections. All state sits behind one mutex so a
//! single service instance can back a shared transport.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use serde_json::{json, Value};

use crate::client::transport::TransportError;
use crate::protocol::{
    Application, CalculationStatus, CalculationSummary, CommandSpec, InvokeRequest, StatusTag,
};

/// Service routes, used as failure-injection keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Applications,
    Commands,
    Calculations,
    Invoke,
    Status,
}

#[derive(Default)]
struct ServiceState {
    applications: Vec<Application>,
    commands: Vec<CommandSpec>,
    calculations: Vec<CalculationSummary>,
    /// Scripted snapshots per handle; the last entry repeats once reached
    scripts: HashMap<String, VecDeque<CalculationStatus>>,
    fetch_counts: HashMap<String, u32>,
    /// Verbatim response bodies for specific GET paths (consumed once)
    raw_overrides: HashMap<String, Value>,
    /// Verbatim invoke response bodies (consumed in order)
    invoke_overrides: VecDeque<Value>,
    /// Handles to hand out for the next invokes instead of generated ones
    forced_handles: VecDeque<String>,
    invocations: Vec<InvokeRequest>,
    failures: HashMap<Route, VecDeque<String>>,
    id_counter: u64,
}

/// Configurable mock service for testing
pub struct MockService {
    state: Mutex<ServiceState>,
}

impl MockService {
    /// Create an empty mock service
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ServiceState::default()),
        }
    }

    /// Create a mock service with a small demo catalog
    pub fn with_demo_catalog() -> Self {
        let service = Self::new();
        {
            let mut state = service.state.lock().unwrap();
            state.applications.push(Application {
                id: 1,
                name: "Dummy CLI".to_string(),
                slug: Some("dummy_cli".to_string()),
                version: Some("0.1.0".to_string()),
                description: Some("Greets and sleeps".to_string()),
            });
            state.commands.push(CommandSpec {
                id: 1,
                name: "greet_and_sleep".to_string(),
                application_id: Some(1),
                parameters: [
                    ("name".to_string(), "str".to_string()),
                    ("duration".to_string(), "int".to_string()),
                ]
                .into_iter()
                .collect(),
            });
        }
        service
    }

    // === Test configuration ===

    pub fn add_application(&self, app: Application) {
        self.state.lock().unwrap().applications.push(app);
    }

    pub fn add_command(&self, command: CommandSpec) {
        self.state.lock().unwrap().commands.push(command);
    }

    pub fn add_calculation(&self, summary: CalculationSummary) {
        self.state.lock().unwrap().calculations.push(summary);
    }

    /// Script the sequence of snapshots a handle will report.
    ///
    /// Snapshots are served in order; the final one repeats for any further
    /// fetches, matching a service whose terminal status is stable.
    pub fn script_statuses(&self, handle: &str, snapshots: Vec<CalculationStatus>) {
        let mut state = self.state.lock().unwrap();
        state.scripts.insert(handle.to_string(), snapshots.into());
        state.fetch_counts.insert(handle.to_string(), 0);
    }

    /// Force the next invoke to return this handle
    pub fn force_next_handle(&self, handle: &str) {
        self.state
            .lock()
            .unwrap()
            .forced_handles
            .push_back(handle.to_string());
    }

    /// Script a rejected invoke (non-success status, no payload)
    pub fn script_invoke_rejection(&self, status: &str, msg: &str) {
        self.script_invoke_raw(json!({"msg": msg, "status": status}));
    }

    /// Script a verbatim invoke response body
    pub fn script_invoke_raw(&self, body: Value) {
        self.state.lock().unwrap().invoke_overrides.push_back(body);
    }

    /// Script a verbatim response body for one GET of the given path
    pub fn script_get_raw(&self, path: &str, body: Value) {
        self.state
            .lock()
            .unwrap()
            .raw_overrides
            .insert(path.to_string(), body);
    }

    /// Inject a connection failure for the next request on a route
    pub fn inject_failure(&self, route: Route, message: &str) {
        self.state
            .lock()
            .unwrap()
            .failures
            .entry(route)
            .or_default()
            .push_back(message.to_string());
    }

    // === Test assertions ===

    /// Number of status fetches served for a handle
    pub fn fetch_count(&self, handle: &str) -> u32 {
        self.state
            .lock()
            .unwrap()
            .fetch_counts
            .get(handle)
            .copied()
            .unwrap_or(0)
    }

    /// All invocations the service accepted, in order
    pub fn recorded_invocations(&self) -> Vec<InvokeRequest> {
        self.state.lock().unwrap().invocations.clone()
    }

    // === Request handling ===

    fn take_failure(state: &mut ServiceState, route: Route) -> Option<TransportError> {
        state
            .failures
            .get_mut(&route)
            .and_then(|q| q.pop_front())
            .map(TransportError::ConnectionFailed)
    }

    fn not_found(path: &str) -> TransportError {
        TransportError::HttpStatus {
            status: 404,
            message: format!("No route for {}", path),
        }
    }

    /// Handle a GET request (in-process library mode)
    pub fn handle_get(&self, path: &str) -> Result<Value, TransportError> {
        let mut state = self.state.lock().unwrap();

        if let Some(body) = state.raw_overrides.remove(path) {
            return Ok(body);
        }

        match path {
            "/applications/" => {
                if let Some(err) = Self::take_failure(&mut state, Route::Applications) {
                    return Err(err);
                }
                Ok(json!(state.applications))
            }
            "/commands/" => {
                if let Some(err) = Self::take_failure(&mut state, Route::Commands) {
                    return Err(err);
                }
                Ok(json!(state.commands))
            }
            "/calculations/" => {
                if let Some(err) = Self::take_failure(&mut state, Route::Calculations) {
                    return Err(err);
                }
                Ok(json!(state.calculations))
            }
            _ => {
                if let Some(handle) = path
                    .strip_prefix("/calculations/")
                    .map(|rest| rest.trim_end_matches('/'))
                    .filter(|h| !h.is_empty())
                {
                    if let Some(err) = Self::take_failure(&mut state, Route::Status) {
                        return Err(err);
                    }
                    return Self::serve_status(&mut state, handle);
                }
                Err(Self::not_found(path))
            }
        }
    }

    fn serve_status(state: &mut ServiceState, handle: &str) -> Result<Value, TransportError> {
        let snapshot = {
            let queue = state.scripts.get_mut(handle).ok_or_else(|| {
                TransportError::HttpStatus {
                    status: 404,
                    message: format!("Unknown calculation {}", handle),
                }
            })?;
            if queue.len() > 1 {
                queue.pop_front().unwrap()
            } else {
                queue
                    .front()
                    .cloned()
                    .ok_or_else(|| TransportError::Protocol("Empty status script".to_string()))?
            }
        };
        *state.fetch_counts.entry(handle.to_string()).or_insert(0) += 1;
        Ok(json!(snapshot))
    }

    /// Handle a POST request (in-process library mode)
    pub fn handle_post(&self, path: &str, body: &Value) -> Result<Value, TransportError> {
        let mut state = self.state.lock().unwrap();

        if path != "/commands/invoke/" {
            return Err(Self::not_found(path));
        }
        if let Some(err) = Self::take_failure(&mut state, Route::Invoke) {
            return Err(err);
        }

        let request: InvokeRequest =
            serde_json::from_value(body.clone()).map_err(|e| TransportError::HttpStatus {
                status: 422,
                message: format!("Invalid invoke body: {}", e),
            })?;
        state.invocations.push(request);

        if let Some(body) = state.invoke_overrides.pop_front() {
            return Ok(body);
        }

        let handle = state.forced_handles.pop_front().unwrap_or_else(|| {
            state.id_counter += 1;
            format!("calc-{:08x}", state.id_counter)
        });

        // Default lifecycle when the test did not script one: a single
        // pending snapshot, then success.
        state.scripts.entry(handle.clone()).or_insert_with(|| {
            let mut done = CalculationStatus::with_tag(&handle, StatusTag::Successful);
            done.result = Some(json!("ok"));
            vec![
                CalculationStatus::with_tag(&handle, StatusTag::Pending),
                done,
            ]
            .into()
        });
        state.fetch_counts.entry(handle.clone()).or_insert(0);

        Ok(json!({
            "msg": "Command invocation submitted",
            "status": "success",
            "payload": {"calculation_id": handle}
        }))
    }
}

impl Default for MockService {
    fn default() -> Self {
        Self::new()
    }
}
