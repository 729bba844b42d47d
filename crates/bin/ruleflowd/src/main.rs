//! # ruleflowd — ruleflow daemon
//!
//! Composition root that wires the rule engine to a device transport and
//! feeds it telemetry.
//!
//! ## Responsibilities
//! - Parse configuration (env vars, config file)
//! - Install the tracing subscriber
//! - Construct the selected transport adapter (virtual or MQTT)
//! - Construct the event bus and the execution engine
//! - Load rule files from the rules directory
//! - Forward telemetry to the engine until SIGINT, then shut down
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer — no domain logic belongs here.

mod config;
mod rules;

use std::sync::Arc;

use anyhow::Context;
use tokio::sync::{broadcast, mpsc};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tracing_subscriber::EnvFilter;

use ruleflow_adapter_virtual::VirtualTransport;
use ruleflow_app::engine::ExecutionEngine;
use ruleflow_app::event_bus::InProcessEventBus;
use ruleflow_app::ports::DeviceTransport;
use ruleflow_domain::execution::EngineEvent;
use ruleflow_domain::telemetry::TelemetryEvent;

use crate::config::{Config, TransportKind};

const TELEMETRY_BUFFER: usize = 256;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load().context("unable to load configuration")?;

    let filter = EnvFilter::try_new(&config.logging.filter).context("invalid logging filter")?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // Event bus
    let event_bus = Arc::new(InProcessEventBus::new(config.engine.event_capacity));
    tokio::spawn(log_events(event_bus.subscribe()));

    // Transport and telemetry sources
    let (telemetry_tx, telemetry_rx) = mpsc::channel(TELEMETRY_BUFFER);
    match config.transport.kind {
        TransportKind::Virtual => {
            let transport = VirtualTransport::from_config(&config.virtual_devices);
            for sensor in config.virtual_devices.sensors.iter().cloned() {
                sensor.spawn(telemetry_tx.clone());
            }
            drop(telemetry_tx);
            serve(&config, transport, event_bus, telemetry_rx).await
        }
        TransportKind::Mqtt => {
            let (transport, telemetry) = ruleflow_adapter_mqtt::connect(&config.mqtt);
            tracing::info!(
                host = %config.mqtt.broker_host,
                port = config.mqtt.broker_port,
                "using MQTT transport"
            );
            tokio::spawn(telemetry.run(telemetry_tx));
            serve(&config, transport, event_bus, telemetry_rx).await
        }
    }
}

/// Run the engine until SIGINT.
async fn serve<T>(
    config: &Config,
    transport: T,
    event_bus: Arc<InProcessEventBus>,
    mut telemetry: mpsc::Receiver<TelemetryEvent>,
) -> anyhow::Result<()>
where
    T: DeviceTransport + Send + Sync + 'static,
{
    let engine = ExecutionEngine::new(transport, event_bus, config.engine_config());

    let set = rules::read_dir(&config.rules.dir).context("unable to read rules")?;
    for error in set.rejected {
        let error = anyhow::Error::new(error);
        tracing::warn!("skipping rule file: {error:#}");
    }
    for rule in set.rules {
        let name = rule.name.clone();
        if let Err(error) = engine.load_rule(rule) {
            tracing::warn!(%name, %error, "skipping rule");
        }
    }
    tracing::info!(
        rules = engine.rules().len(),
        dir = %config.rules.dir.display(),
        "ruleflowd started"
    );

    let mut telemetry_open = true;
    loop {
        tokio::select! {
            event = telemetry.recv(), if telemetry_open => match event {
                Some(event) => {
                    tracing::debug!(
                        device = %event.device_id,
                        variable = %event.variable,
                        value = %event.value,
                        "telemetry received"
                    );
                    let runs = engine.on_event(event).await;
                    if !runs.is_empty() {
                        tracing::debug!(runs = runs.len(), "runs started");
                    }
                }
                None => {
                    tracing::info!("all telemetry sources closed");
                    telemetry_open = false;
                }
            },
            signal = tokio::signal::ctrl_c() => {
                signal.context("unable to listen for shutdown signal")?;
                break;
            }
        }
    }

    tracing::info!("shutting down");
    engine.shutdown().await;
    Ok(())
}

/// Log engine events until the bus is closed.
async fn log_events(receiver: broadcast::Receiver<EngineEvent>) {
    let mut events = BroadcastStream::new(receiver);
    while let Some(item) = events.next().await {
        match item {
            Ok(EngineEvent::CommandIssued {
                run_id, command, ..
            }) => {
                tracing::info!(%run_id, %command, "command issued");
            }
            Ok(EngineEvent::RunFinished {
                run_id,
                rule_id,
                status,
                ..
            }) => {
                tracing::info!(%run_id, %rule_id, %status, "run finished");
            }
            Ok(event) => match serde_json::to_string(&event) {
                Ok(json) => tracing::debug!(event = %json, "engine event"),
                Err(err) => tracing::warn!(%err, "failed to serialize engine event"),
            },
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "event log lagged, some events were dropped");
            }
        }
    }
}
