//! Condition routing against the latest telemetry snapshot.

use ruleflow_domain::graph::{ConditionData, SourcePort};
use ruleflow_domain::telemetry::TelemetrySnapshot;

/// Apply the condition's comparator to the latest value of its variable.
///
/// A variable that was never reported evaluates to `false`.
#[must_use]
pub fn evaluate(condition: &ConditionData, snapshot: &TelemetrySnapshot) -> bool {
    snapshot
        .get(&condition.variable)
        .is_some_and(|observed| condition.comparator.compare(observed, &condition.value))
}

/// Output branch a token leaves the condition through.
#[must_use]
pub fn route(condition: &ConditionData, snapshot: &TelemetrySnapshot) -> SourcePort {
    SourcePort::Branch(evaluate(condition, snapshot))
}
