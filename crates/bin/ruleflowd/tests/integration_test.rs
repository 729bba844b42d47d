//! End-to-end tests for the ruleflowd stack.
//!
//! Each test loads JSON rule files from `tests/rules/`, wires them into a
//! real engine backed by the virtual transport and the in-process event
//! bus, and feeds telemetry through it. Time is paused so delays and join
//! timeouts elapse instantly.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use ruleflow_adapter_virtual::VirtualTransport;
use ruleflow_app::engine::{EngineConfig, ExecutionEngine};
use ruleflow_app::event_bus::InProcessEventBus;
use ruleflow_domain::execution::{Command, EngineEvent, RunStatus};
use ruleflow_domain::id::RunId;
use ruleflow_domain::mode::ProtocolValue;
use ruleflow_domain::rule::Rule;
use ruleflow_domain::telemetry::TelemetryEvent;

const CLIMATE: &str = include_str!("rules/climate.json");
const IRRIGATION: &str = include_str!("rules/irrigation.json");
const VENTILATION: &str = include_str!("rules/ventilation.json");
const DANGLING: &str = include_str!("rules/dangling.json");

struct Daemon {
    engine: ExecutionEngine<VirtualTransport, Arc<InProcessEventBus>>,
    transport: VirtualTransport,
    events: broadcast::Receiver<EngineEvent>,
}

fn daemon(rule_files: &[&str]) -> Daemon {
    let transport = VirtualTransport::new();
    let bus = Arc::new(InProcessEventBus::new(1024));
    let events = bus.subscribe();
    let engine = ExecutionEngine::new(transport.clone(), bus, EngineConfig::default());
    for file in rule_files {
        let rule: Rule = serde_json::from_str(file).unwrap();
        engine.load_rule(rule).unwrap();
    }
    Daemon {
        engine,
        transport,
        events,
    }
}

impl Daemon {
    async fn feed(&self, variable: &str, value: f64) -> Vec<RunId> {
        self.engine
            .on_event(TelemetryEvent::new("greenhouse", variable, value))
            .await
    }

    async fn finished(&mut self, run_id: RunId) -> RunStatus {
        let events = &mut self.events;
        tokio::time::timeout(Duration::from_secs(3600), async move {
            loop {
                match events.recv().await.unwrap() {
                    EngineEvent::RunFinished {
                        run_id: id, status, ..
                    } if id == run_id => return status,
                    _ => {}
                }
            }
        })
        .await
        .unwrap()
    }
}

fn command(actuator_id: &str, value: ProtocolValue) -> Command {
    Command {
        actuator_id: actuator_id.into(),
        value,
    }
}

#[tokio::test(start_paused = true)]
async fn should_drive_heater_from_climate_rule_file() {
    let mut daemon = daemon(&[CLIMATE]);

    daemon.feed("humidity", 35.0).await;
    let runs = daemon.feed("temp", 31.0).await;
    assert_eq!(runs.len(), 1);

    assert_eq!(daemon.finished(runs[0]).await, RunStatus::Completed);
    assert_eq!(
        daemon.transport.history(),
        vec![command("heater", ProtocolValue::Int(6))]
    );
    assert_eq!(
        daemon.transport.actuator("heater").unwrap().value(),
        Some(ProtocolValue::Int(6))
    );
}

#[tokio::test(start_paused = true)]
async fn should_not_command_heater_when_air_is_humid() {
    let mut daemon = daemon(&[CLIMATE]);

    daemon.feed("humidity", 50.0).await;
    let runs = daemon.feed("temp", 31.0).await;

    assert_eq!(daemon.finished(runs[0]).await, RunStatus::Completed);
    assert!(daemon.transport.history().is_empty());
}

#[tokio::test(start_paused = true)]
async fn should_fall_back_to_idle_branch_when_join_times_out() {
    let mut daemon = daemon(&[IRRIGATION]);

    daemon.feed("humidity", 30.0).await;
    daemon.feed("light", 500.0).await;
    let started = tokio::time::Instant::now();
    let runs = daemon.feed("temp", 32.0).await;

    assert_eq!(daemon.finished(runs[0]).await, RunStatus::Completed);
    assert!(started.elapsed() >= Duration::from_secs(10));
    assert_eq!(
        daemon.transport.history(),
        vec![command("sprinkler", ProtocolValue::Bool(false))]
    );
}

#[tokio::test(start_paused = true)]
async fn should_water_when_both_join_inputs_arrive() {
    let mut daemon = daemon(&[IRRIGATION]);

    daemon.feed("humidity", 30.0).await;
    daemon.feed("light", 1500.0).await;
    let runs = daemon.feed("temp", 32.0).await;

    assert_eq!(daemon.finished(runs[0]).await, RunStatus::Completed);
    assert_eq!(
        daemon.transport.history(),
        vec![command("sprinkler", ProtocolValue::Bool(true))]
    );
}

#[tokio::test(start_paused = true)]
async fn should_open_vent_after_delay() {
    let mut daemon = daemon(&[VENTILATION]);

    let started = tokio::time::Instant::now();
    let runs = daemon.feed("temp", 30.0).await;

    assert_eq!(daemon.finished(runs[0]).await, RunStatus::Completed);
    assert!(started.elapsed() >= Duration::from_secs(120));
    assert_eq!(
        daemon.transport.history(),
        vec![command("vent", ProtocolValue::Bool(true))]
    );
}

#[tokio::test(start_paused = true)]
async fn should_fail_run_when_actuator_is_offline() {
    let mut daemon = daemon(&[VENTILATION]);
    daemon.transport.set_online("vent", false);

    let runs = daemon.feed("temp", 30.0).await;

    assert_eq!(daemon.finished(runs[0]).await, RunStatus::Failed);
    assert!(daemon.transport.history().is_empty());
}

#[tokio::test(start_paused = true)]
async fn should_start_one_run_per_matching_rule() {
    let mut daemon = daemon(&[CLIMATE, VENTILATION]);

    daemon.feed("humidity", 35.0).await;
    let runs = daemon.feed("temp", 31.0).await;
    assert_eq!(runs.len(), 2);

    let mut statuses = std::collections::HashMap::new();
    while statuses.len() < runs.len() {
        if let EngineEvent::RunFinished { run_id, status, .. } = daemon.events.recv().await.unwrap() {
            statuses.insert(run_id, status);
        }
    }
    assert!(statuses.values().all(|status| *status == RunStatus::Completed));
    assert_eq!(daemon.transport.history().len(), 2);
}

#[test]
fn should_reject_rule_file_with_dangling_edge() {
    let result = serde_json::from_str::<Rule>(DANGLING);
    assert!(result.is_err());
}

#[tokio::test]
async fn should_cancel_waiting_runs_on_shutdown() {
    let mut daemon = daemon(&[VENTILATION]);

    let runs = daemon.feed("temp", 30.0).await;
    daemon.engine.shutdown().await;

    assert_eq!(daemon.finished(runs[0]).await, RunStatus::Cancelled);
    assert!(daemon.transport.history().is_empty());
}

#[tokio::test(start_paused = true)]
async fn should_not_fall_back_after_cancelling_join_wait() {
    let mut daemon = daemon(&[IRRIGATION]);

    daemon.feed("humidity", 30.0).await;
    daemon.feed("light", 500.0).await;
    let runs = daemon.feed("temp", 32.0).await;
    tokio::time::sleep(Duration::from_secs(1)).await;
    daemon.engine.cancel_run(runs[0]).await.unwrap();

    assert_eq!(daemon.finished(runs[0]).await, RunStatus::Cancelled);
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert!(daemon.transport.history().is_empty());
    assert_eq!(daemon.engine.run_status(runs[0]), Some(RunStatus::Cancelled));
    assert!(daemon.engine.active_runs().is_empty());
}
