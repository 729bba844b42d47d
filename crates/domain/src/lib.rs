//! # ruleflow-domain
//!
//! Pure domain model for the ruleflow automation rule engine.
//!
//! ## Responsibilities
//! - Foundational types: typed identifiers, error conventions, timestamps
//! - Define the **rule graph** (trigger, condition, join, delay and action
//!   nodes wired by edges) and its load-time validation
//! - Define the **mode table** mapping actuator modes to protocol values
//! - Define **telemetry values** and the comparators rules apply to them
//! - Define **execution events** and run statuses observed by outer layers
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod id;
pub mod time;

pub mod execution;
pub mod graph;
pub mod mode;
pub mod rule;
pub mod telemetry;
