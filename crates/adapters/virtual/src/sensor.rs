//! Virtual sensor — replays a fixed sequence of readings on an interval.

use std::time::Duration;

use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use ruleflow_domain::telemetry::{TelemetryEvent, TelemetryValue};

fn default_interval_secs() -> u64 {
    5
}

fn default_repeat() -> bool {
    true
}

/// A simulated sensor publishing one reading per interval.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct VirtualSensor {
    pub device_id: String,
    pub variable: String,
    pub values: Vec<TelemetryValue>,
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Start over once every value was sent.
    #[serde(default = "default_repeat")]
    pub repeat: bool,
}

impl VirtualSensor {
    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }

    /// Reading number `step`, or `None` once a non-repeating sensor ran out.
    #[must_use]
    pub fn reading(&self, step: usize) -> Option<TelemetryEvent> {
        if self.values.is_empty() || (!self.repeat && step >= self.values.len()) {
            return None;
        }
        let value = self.values[step % self.values.len()].clone();
        Some(TelemetryEvent::new(
            self.device_id.as_str(),
            self.variable.as_str(),
            value,
        ))
    }

    /// Publish readings into `sink` until the sequence ends or `sink` closes.
    ///
    /// The first reading is sent immediately.
    pub fn spawn(self, sink: mpsc::Sender<TelemetryEvent>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval());
            let mut step = 0;
            loop {
                ticker.tick().await;
                let Some(event) = self.reading(step) else {
                    tracing::debug!(device = %self.device_id, variable = %self.variable, "sensor sequence finished");
                    return;
                };
                if sink.send(event).await.is_err() {
                    return;
                }
                step += 1;
            }
        })
    }
}
