//! Common error types used across the workspace.
//!
//! Each layer defines its own typed errors and converts into
//! [`RuleflowError`] via `#[from]`.

use crate::graph::GraphValidationError;

/// Top-level error type crossing port boundaries.
#[derive(Debug, thiserror::Error)]
pub enum RuleflowError {
    #[error("validation error")]
    Validation(#[from] ValidationError),

    #[error("invalid rule graph")]
    Graph(#[from] GraphValidationError),

    #[error("not found")]
    NotFound(#[from] NotFoundError),

    #[error("transport error")]
    Transport(#[from] TransportError),
}

/// Invariant violations detected outside of graph loading.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("name must not be empty")]
    EmptyName,

    #[error("duration must be a positive number, got {value}")]
    NonPositiveDuration { value: f64 },

    #[error("unknown time unit {unit:?}")]
    UnknownTimeUnit { unit: String },

    #[error("duration of {value} {unit} overflows the scheduler clock")]
    DurationOverflow { value: f64, unit: String },
}

/// A lookup by identifier found nothing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{entity} {id} not found")]
pub struct NotFoundError {
    pub entity: &'static str,
    pub id: String,
}

/// Failure reported by a device transport when publishing a command.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The transport is not connected to its broker or bus.
    #[error("transport not connected")]
    NotConnected,

    /// The device or broker refused the command.
    #[error("command for actuator {actuator_id} rejected: {reason}")]
    Rejected { actuator_id: String, reason: String },

    /// Any other transport-specific failure.
    #[error("transport failure")]
    Other(#[source] Box<dyn std::error::Error + Send + Sync>),
}
