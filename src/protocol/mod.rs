//! Wire types for the calculation service HTTP API
//!
//! Everything the service sends is modelled here. The status vocabulary is
//! service-defined, so [`StatusTag`] is an open string enum: unknown tags
//! deserialize to [`StatusTag::Other`] and are treated as non-terminal.

pub mod types;

pub use types::{
    Application, CalculationStatus, CalculationSummary, CommandSpec, InvokePayload,
    InvokeRequest, InvokeResponse, StatusTag,
};
