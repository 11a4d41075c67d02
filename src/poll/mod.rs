//! Calculation status polling
//!
//! Poll states: PENDING → {SUCCEEDED | FAILED | CANCELLED}
//!
//! Given a calculation handle, [`Poller::wait`] fetches status snapshots at a
//! fixed cadence until a terminal tag arrives, then resolves to exactly one
//! [`PollOutcome`]. Every snapshot is published to the observer; elapsed
//! wall-clock time is republished after each intermediate snapshot. A fetch
//! failure resolves immediately and is never retried. The caller keeps a
//! [`CancelToken`] and can stop the loop before the next re-issue.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;

use crate::client::{ApiClient, ApiError};
use crate::protocol::{CalculationStatus, StatusTag};

/// Poller state enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    /// Waiting for a terminal snapshot
    Pending,
    /// Service reported `successful`
    Succeeded,
    /// Service reported `error`, or the fetch itself failed
    Failed,
    /// The caller cancelled before a terminal snapshot arrived
    Cancelled,
}

impl PollState {
    /// Returns true if no transition leaves this state
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PollState::Pending)
    }

    /// Check if transition from this state to target is valid
    pub fn can_transition_to(&self, target: PollState) -> bool {
        match (self, target) {
            (PollState::Pending, _) => true,
            // Terminal states cannot transition
            _ => false,
        }
    }

    /// State implied by a status snapshot
    pub fn for_tag(tag: &StatusTag) -> PollState {
        match tag {
            StatusTag::Successful => PollState::Succeeded,
            StatusTag::Error => PollState::Failed,
            // Unrecognized tags are treated as still-pending
            _ => PollState::Pending,
        }
    }
}

/// Poller configuration
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Delay between consecutive status fetches
    pub interval: Duration,
    /// Optional bound on the number of fetches; `None` polls indefinitely
    pub max_polls: Option<u32>,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(1000),
            max_polls: None,
        }
    }
}

/// Shared cancellation flag for a polling operation
///
/// Cloned into the poller; the caller keeps its copy and calls
/// [`CancelToken::cancel`] to stop the loop before the next fetch.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation; takes effect before the next fetch is issued
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Observer for snapshot and progress publication
///
/// All methods have empty defaults so callers implement only what they
/// display. `on_failure` is the user-visible notification channel for
/// service-reported errors and fetch failures.
pub trait PollObserver {
    /// Called for every snapshot, terminal or not
    fn on_snapshot(&mut self, _snapshot: &CalculationStatus) {}

    /// Called after each intermediate snapshot with time since polling began
    fn on_elapsed(&mut self, _elapsed: Duration) {}

    /// Called once when the operation resolves to a failure
    fn on_failure(&mut self, _message: &str) {}
}

/// Observer that discards everything
#[derive(Debug, Default)]
pub struct NullObserver;

impl PollObserver for NullObserver {}

/// Terminal outcome of one polling operation
#[derive(Debug)]
pub enum PollOutcome {
    /// Terminal `successful` snapshot (carries the result payload)
    Succeeded(CalculationStatus),
    /// Terminal `error` snapshot (carries the error payload)
    ServiceError(CalculationStatus),
    /// The status fetch itself failed; not retried
    FetchFailed(ApiError),
    /// Cancelled via the caller's token before a terminal snapshot
    Cancelled,
    /// Configured poll bound reached without a terminal snapshot
    AttemptsExhausted { polls: u32 },
}

impl PollOutcome {
    /// Final poll state this outcome corresponds to
    pub fn state(&self) -> PollState {
        match self {
            PollOutcome::Succeeded(_) => PollState::Succeeded,
            PollOutcome::ServiceError(_) | PollOutcome::FetchFailed(_) => PollState::Failed,
            PollOutcome::Cancelled => PollState::Cancelled,
            // A bounded run that never saw a terminal tag was still pending
            PollOutcome::AttemptsExhausted { .. } => PollState::Pending,
        }
    }

    /// Result payload from the terminal snapshot, if any
    pub fn result(&self) -> Option<&Value> {
        match self {
            PollOutcome::Succeeded(snapshot) => snapshot.result.as_ref(),
            _ => None,
        }
    }

    /// Error payload from the terminal snapshot, if any
    pub fn error(&self) -> Option<&Value> {
        match self {
            PollOutcome::ServiceError(snapshot) => snapshot.error.as_ref(),
            _ => None,
        }
    }

    /// Last snapshot observed, if the outcome carries one
    pub fn snapshot(&self) -> Option<&CalculationStatus> {
        match self {
            PollOutcome::Succeeded(s) | PollOutcome::ServiceError(s) => Some(s),
            _ => None,
        }
    }
}

/// Status poller for a single calculation handle
pub struct Poller<'a> {
    client: &'a ApiClient,
    config: PollConfig,
    token: CancelToken,
}

impl<'a> Poller<'a> {
    /// Create a poller with the default 1s cadence and no poll bound
    pub fn new(client: &'a ApiClient) -> Self {
        Self::with_config(client, PollConfig::default())
    }

    pub fn with_config(client: &'a ApiClient, config: PollConfig) -> Self {
        Self {
            client,
            config,
            token: CancelToken::new(),
        }
    }

    /// Use an externally held cancellation token
    pub fn with_token(mut self, token: CancelToken) -> Self {
        self.token = token;
        self
    }

    /// Token for this poller, for callers that want to cancel later
    pub fn token(&self) -> CancelToken {
        self.token.clone()
    }

    /// Poll until terminal, publishing snapshots to the observer.
    ///
    /// Resolves to exactly one outcome. The first fetch happens immediately;
    /// each subsequent fetch is delayed by the configured interval and
    /// preceded by a cancellation check.
    pub fn wait(&self, handle: &str, observer: &mut dyn PollObserver) -> PollOutcome {
        let started = Instant::now();
        let mut state = PollState::Pending;
        let mut polls: u32 = 0;

        loop {
            if self.token.is_cancelled() {
                debug_assert!(state.can_transition_to(PollState::Cancelled));
                return PollOutcome::Cancelled;
            }

            let snapshot = match self.client.calculation_status(handle) {
                Ok(snapshot) => snapshot,
                Err(err) => {
                    observer.on_failure(&format!("Status fetch for {} failed: {}", handle, err));
                    debug_assert!(state.can_transition_to(PollState::Failed));
                    return PollOutcome::FetchFailed(err);
                }
            };
            polls += 1;
            observer.on_snapshot(&snapshot);

            let next = PollState::for_tag(&snapshot.status);
            debug_assert!(state.can_transition_to(next) || next == PollState::Pending);
            state = next;

            match state {
                PollState::Succeeded => return PollOutcome::Succeeded(snapshot),
                PollState::Failed => {
                    let detail = snapshot
                        .error
                        .as_ref()
                        .map(|e| e.to_string())
                        .unwrap_or_else(|| "no error payload".to_string());
                    observer.on_failure(&format!("Calculation {} failed: {}", handle, detail));
                    return PollOutcome::ServiceError(snapshot);
                }
                PollState::Pending => {
                    observer.on_elapsed(started.elapsed());
                    if let Some(max) = self.config.max_polls {
                        if polls >= max {
                            return PollOutcome::AttemptsExhausted { polls };
                        }
                    }
                    std::thread::sleep(self.config.interval);
                }
                PollState::Cancelled => unreachable!("cancellation is checked before fetching"),
            }
        }
    }
}
