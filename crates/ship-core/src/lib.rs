//! Core types and error definitions for the Ship task orchestrator.
//!
//! This crate provides the foundational types shared across all Ship crates.
//!
//! # Main types
//!
//! - [`ShipError`]: Unified error enum for all Ship subsystems.
//! - [`ShipResult`]: Convenience alias for `Result<T, ShipError>`.
//! - [`Payload`]: Open key-value map carried as task input and output.

mod error;

pub use error::{ShipError, ShipResult};

/// Open string-keyed map of JSON values.
///
/// Task inputs, outputs and metadata use this type; the orchestrator never
/// looks inside it.
pub type Payload = serde_json::Map<String, serde_json::Value>;
