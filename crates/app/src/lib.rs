//! # ruleflow-app
//!
//! Application layer — the rule execution engine and **port definitions** (traits).
//!
//! ## Responsibilities
//! - Define **port traits** that adapters must implement (driven/outbound ports):
//!   - `DeviceTransport` — deliver actuator commands to devices
//!   - `EventPublisher` — publish engine events to observers
//! - Provide the **execution engine** (driving/inbound side):
//!   - `TriggerDispatcher` — match telemetry to trigger nodes
//!   - `condition` — route a token to the true/false branch of a condition
//!   - `JoinCoordinator` — resolve AND/OR joins with timeouts
//!   - `DelayScheduler` — park tokens until their resume time
//!   - `ActionExecutor` — turn action nodes into device commands
//!   - `ExecutionEngine` — drive runs and their tokens through a graph
//! - Provide **in-process infrastructure** (event bus) that doesn't need IO
//!
//! ## Dependency rule
//! Depends on `ruleflow-domain` only (plus `tokio` for tasks, timers and channels).
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod engine;
pub mod event_bus;
pub mod ports;
