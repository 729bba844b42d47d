//! Trigger dispatch — the set of loaded rules and the telemetry snapshot.
//!
//! Every inbound reading is first recorded in the snapshot conditions read
//! from, then matched against the enabled trigger nodes of enabled rules.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use ruleflow_domain::error::RuleflowError;
use ruleflow_domain::graph::{NodeData, NodeIndex, TriggerData};
use ruleflow_domain::id::RuleId;
use ruleflow_domain::rule::Rule;
use ruleflow_domain::telemetry::{TelemetryEvent, TelemetrySnapshot};

/// A trigger node satisfied by a reading.
#[derive(Debug, Clone)]
pub struct TriggerMatch {
    pub rule: Arc<Rule>,
    pub trigger: NodeIndex,
}

#[derive(Debug, Default)]
pub struct TriggerDispatcher {
    rules: RwLock<BTreeMap<RuleId, Arc<Rule>>>,
    snapshot: RwLock<TelemetrySnapshot>,
}

impl TriggerDispatcher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and register `rule`, replacing any rule with the same id.
    ///
    /// # Errors
    ///
    /// Returns [`RuleflowError::Validation`] when the rule is invalid.
    pub fn load(&self, rule: Rule) -> Result<Option<Arc<Rule>>, RuleflowError> {
        rule.validate()?;
        let mut rules = self.rules.write().unwrap_or_else(PoisonError::into_inner);
        Ok(rules.insert(rule.id, Arc::new(rule)))
    }

    pub fn unload(&self, id: RuleId) -> Option<Arc<Rule>> {
        self.rules
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id)
    }

    #[cfg(test)]
    pub(crate) fn get(&self, id: RuleId) -> Option<Arc<Rule>> {
        self.rules
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
    }

    /// Loaded rules ordered by id.
    #[must_use]
    pub fn rules(&self) -> Vec<Arc<Rule>> {
        self.rules
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    /// Record `event` and return every trigger it satisfies.
    pub fn dispatch(&self, event: &TelemetryEvent) -> Vec<TriggerMatch> {
        self.snapshot
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .record(event);

        let rules = self.rules.read().unwrap_or_else(PoisonError::into_inner);
        rules
            .values()
            .filter(|rule| rule.enabled)
            .flat_map(|rule| {
                rule.graph
                    .triggers()
                    .filter(|(_, node)| !node.disabled)
                    .filter(move |(_, node)| match &node.data {
                        NodeData::Trigger(trigger) => matches(trigger, event),
                        _ => false,
                    })
                    .map(move |(trigger, _)| TriggerMatch {
                        rule: Arc::clone(rule),
                        trigger,
                    })
            })
            .collect()
    }

    /// Run `read` against the current telemetry snapshot.
    pub fn with_snapshot<R>(&self, read: impl FnOnce(&TelemetrySnapshot) -> R) -> R {
        read(&self.snapshot.read().unwrap_or_else(PoisonError::into_inner))
    }
}

fn matches(trigger: &TriggerData, event: &TelemetryEvent) -> bool {
    trigger.variable == event.variable
        && trigger
            .device_id
            .as_deref()
            .is_none_or(|device| device == event.device_id)
        && trigger.comparator.compare(&event.value, &trigger.value)
}
