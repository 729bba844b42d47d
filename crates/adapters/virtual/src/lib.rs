//! # ruleflow-adapter-virtual
//!
//! Virtual adapter — simulated devices for demos and tests, no hardware
//! or broker required.
//!
//! ## Responsibilities
//! - [`VirtualTransport`]: a [`DeviceTransport`] keeping one
//!   [`VirtualActuator`] per commanded actuator
//! - [`VirtualSensor`]: replays configured telemetry readings
//!
//! ## Dependency rule
//! Same as other adapters: depends on `ruleflow-app` and `ruleflow-domain`.

mod actuator;
mod sensor;

pub use actuator::VirtualActuator;
pub use sensor::VirtualSensor;

use std::collections::{BTreeMap, VecDeque};
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use serde::Deserialize;

use ruleflow_app::ports::DeviceTransport;
use ruleflow_domain::error::TransportError;
use ruleflow_domain::execution::Command;

const DEFAULT_HISTORY_CAPACITY: usize = 256;

/// Declarative setup of the virtual devices.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct VirtualConfig {
    /// Actuators known up front.
    pub actuators: Vec<String>,
    /// Reject commands for actuators not listed in `actuators`.
    pub strict: bool,
    /// Number of accepted commands kept for inspection, `0` keeps none.
    pub history_capacity: usize,
    pub sensors: Vec<VirtualSensor>,
}

impl Default for VirtualConfig {
    fn default() -> Self {
        Self {
            actuators: Vec::new(),
            strict: false,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            sensors: Vec::new(),
        }
    }
}

#[derive(Debug)]
struct State {
    actuators: BTreeMap<String, VirtualActuator>,
    history: VecDeque<Command>,
    history_capacity: usize,
}

impl Default for State {
    fn default() -> Self {
        Self {
            actuators: BTreeMap::new(),
            history: VecDeque::new(),
            history_capacity: DEFAULT_HISTORY_CAPACITY,
        }
    }
}

impl State {
    fn record(&mut self, command: Command) {
        if self.history_capacity == 0 {
            return;
        }
        while self.history.len() >= self.history_capacity {
            self.history.pop_front();
        }
        self.history.push_back(command);
    }
}

/// In-memory transport that applies every command to a simulated actuator.
///
/// Clones share the same actuators.
#[derive(Debug, Clone, Default)]
pub struct VirtualTransport {
    state: Arc<Mutex<State>>,
    strict: bool,
}

impl VirtualTransport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a transport pre-populated from `config`.
    #[must_use]
    pub fn from_config(config: &VirtualConfig) -> Self {
        let actuators = config
            .actuators
            .iter()
            .map(|id| (id.clone(), VirtualActuator::new(id.as_str())))
            .collect();
        Self {
            state: Arc::new(Mutex::new(State {
                actuators,
                history: VecDeque::new(),
                history_capacity: config.history_capacity,
            })),
            strict: config.strict,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of the actuator `id`.
    #[must_use]
    pub fn actuator(&self, id: &str) -> Option<VirtualActuator> {
        self.lock().actuators.get(id).cloned()
    }

    /// Most recent accepted commands, oldest first.
    #[must_use]
    pub fn history(&self) -> Vec<Command> {
        self.lock().history.iter().cloned().collect()
    }

    /// Take the actuator `id` on or off line, creating it if unknown.
    pub fn set_online(&self, id: &str, online: bool) {
        self.lock()
            .actuators
            .entry(id.to_string())
            .or_insert_with(|| VirtualActuator::new(id))
            .set_online(online);
    }

    fn apply(&self, command: &Command) -> Result<(), TransportError> {
        let mut state = self.lock();
        let actuator = if self.strict {
            state.actuators.get_mut(&command.actuator_id).ok_or_else(|| {
                TransportError::Rejected {
                    actuator_id: command.actuator_id.clone(),
                    reason: "unknown actuator".to_string(),
                }
            })?
        } else {
            state
                .actuators
                .entry(command.actuator_id.clone())
                .or_insert_with(|| VirtualActuator::new(command.actuator_id.as_str()))
        };
        if !actuator.is_online() {
            return Err(TransportError::Rejected {
                actuator_id: command.actuator_id.clone(),
                reason: "offline".to_string(),
            });
        }
        let previous = actuator.apply(command.value);
        tracing::info!(
            actuator = %command.actuator_id,
            value = %command.value,
            previous = ?previous,
            "virtual actuator updated"
        );
        state.record(command.clone());
        Ok(())
    }
}

impl DeviceTransport for VirtualTransport {
    fn publish(&self, command: Command) -> impl Future<Output = Result<(), TransportError>> + Send {
        let result = self.apply(&command);
        async move { result }
    }
}
