//! Mock calculation service
//!
//! In-process stand-in for the remote service, used by the unit tests and
//! wired in through [`MockTransport`](crate::client::MockTransport). Supports
//! scripted status sequences per handle, canned invoke responses, and
//! transport failure injection per route.

pub mod service;

pub use service::{MockService, Route};
