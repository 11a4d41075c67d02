//! Calcbox - client for a remote calculation service
//!
//! This crate implements a client for a containerised quantum
//! crystallography calculation service: catalog listings, command
//! invocation, fixed-cadence status polling with cancellation, and a
//! parser/scene builder for the structure documents the service produces.

pub mod client;
pub mod config;
pub mod mock;
pub mod poll;
pub mod protocol;
pub mod run;
pub mod structure;

pub use client::{ApiClient, ApiError, InvokeReceipt, Transport};
pub use config::ClientConfig;
pub use poll::{CancelToken, PollConfig, PollObserver, PollOutcome, Poller};
pub use protocol::{CalculationStatus, InvokeRequest, StatusTag};
pub use run::{invoke_and_wait, CalculationReport};
pub use structure::{build_scene, Scene, StructureDocument};
