//! Event bus port — publish engine events to observers.

use std::future::Future;

use ruleflow_domain::error::RuleflowError;
use ruleflow_domain::execution::EngineEvent;

/// Publishes engine events to interested observers.
pub trait EventPublisher {
    /// Publish an event to all current subscribers.
    fn publish(&self, event: EngineEvent) -> impl Future<Output = Result<(), RuleflowError>> + Send;
}

impl<T: EventPublisher + Send + Sync> EventPublisher for std::sync::Arc<T> {
    fn publish(&self, event: EngineEvent) -> impl Future<Output = Result<(), RuleflowError>> + Send {
        (**self).publish(event)
    }
}
