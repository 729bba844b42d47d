//! Join coordination.
//!
//! A join slot lives per `(run, join node)`. The first AND arrival opens it
//! with a deadline; the second arrival on the other input resolves it
//! `true`, and the deadline elapsing resolves it `false`. OR joins resolve
//! `true` on their first arrival. Once resolved or expired, the slot stays
//! behind as a tombstone until the run ends so late arrivals never fire the
//! join twice.
//!
//! The coordinator is a pure state machine: the engine owns the timers and
//! serializes calls through its registry lock.

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;

use ruleflow_domain::graph::{JoinInput, JoinMode, NodeIndex};
use ruleflow_domain::id::RunId;

// Clamp for timeouts the clock cannot represent.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Result of a token arriving at a join.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    /// First AND input; the token is absorbed until `deadline`.
    Waiting { deadline: Instant },
    /// The join fires on the given branch.
    Resolved(bool),
    /// Repeated input, late arrival, or arrival after resolution.
    Ignored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JoinSlot {
    Awaiting { first: JoinInput, deadline: Instant },
    Resolved(bool),
    Expired,
}

#[derive(Debug, Default)]
pub struct JoinCoordinator {
    slots: HashMap<RunId, HashMap<NodeIndex, JoinSlot>>,
}

impl JoinCoordinator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an arrival on `input` of join `node` for `run_id`.
    pub fn arrive(
        &mut self,
        run_id: RunId,
        node: NodeIndex,
        input: JoinInput,
        mode: JoinMode,
        timeout: Duration,
        now: Instant,
    ) -> JoinOutcome {
        let slots = self.slots.entry(run_id).or_default();
        match slots.get(&node).copied() {
            None => match mode {
                JoinMode::Or => {
                    slots.insert(node, JoinSlot::Resolved(true));
                    JoinOutcome::Resolved(true)
                }
                JoinMode::And => {
                    let deadline = now.checked_add(timeout).unwrap_or(now + FAR_FUTURE);
                    slots.insert(
                        node,
                        JoinSlot::Awaiting {
                            first: input,
                            deadline,
                        },
                    );
                    JoinOutcome::Waiting { deadline }
                }
            },
            Some(JoinSlot::Awaiting { first, deadline }) if first != input && now < deadline => {
                slots.insert(node, JoinSlot::Resolved(true));
                JoinOutcome::Resolved(true)
            }
            Some(_) => JoinOutcome::Ignored,
        }
    }

    /// Expire an awaiting slot whose deadline elapsed.
    ///
    /// Returns `true` when the join must now fire on its `false` branch,
    /// `false` when it was already resolved, expired or never opened.
    pub fn expire(&mut self, run_id: RunId, node: NodeIndex) -> bool {
        let Some(slot) = self
            .slots
            .get_mut(&run_id)
            .and_then(|slots| slots.get_mut(&node))
        else {
            return false;
        };
        if matches!(slot, JoinSlot::Awaiting { .. }) {
            *slot = JoinSlot::Expired;
            true
        } else {
            false
        }
    }

    /// Whether `run_id` still has a join waiting for its second input.
    #[must_use]
    pub fn has_pending(&self, run_id: RunId) -> bool {
        self.slots.get(&run_id).is_some_and(|slots| {
            slots
                .values()
                .any(|slot| matches!(slot, JoinSlot::Awaiting { .. }))
        })
    }

    /// Outcome recorded for a join, if it resolved.
    #[cfg(test)]
    pub(crate) fn outcome(&self, run_id: RunId, node: NodeIndex) -> Option<bool> {
        match self.slots.get(&run_id)?.get(&node)? {
            JoinSlot::Resolved(branch) => Some(*branch),
            JoinSlot::Expired => Some(false),
            JoinSlot::Awaiting { .. } => None,
        }
    }

    /// Drop every slot of `run_id`, returning the joins that were still awaiting.
    pub fn clear_run(&mut self, run_id: RunId) -> Vec<NodeIndex> {
        self.slots
            .remove(&run_id)
            .into_iter()
            .flatten()
            .filter_map(|(node, slot)| matches!(slot, JoinSlot::Awaiting { .. }).then_some(node))
            .collect()
    }
}
