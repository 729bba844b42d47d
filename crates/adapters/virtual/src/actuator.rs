//! Virtual actuator — remembers the last value it was set to.

use ruleflow_domain::mode::ProtocolValue;

/// A simulated actuator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualActuator {
    id: String,
    value: Option<ProtocolValue>,
    updates: u64,
    online: bool,
}

impl VirtualActuator {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            value: None,
            updates: 0,
            online: true,
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Last value applied, `None` until the first command.
    #[must_use]
    pub fn value(&self) -> Option<ProtocolValue> {
        self.value
    }

    /// Number of commands applied.
    #[must_use]
    pub fn updates(&self) -> u64 {
        self.updates
    }

    #[must_use]
    pub fn is_online(&self) -> bool {
        self.online
    }

    pub fn set_online(&mut self, online: bool) {
        self.online = online;
    }

    /// Apply `value`, returning the previous one.
    pub fn apply(&mut self, value: ProtocolValue) -> Option<ProtocolValue> {
        self.updates += 1;
        self.value.replace(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_start_online_without_value() {
        let actuator = VirtualActuator::new("pump");
        assert_eq!(actuator.id(), "pump");
        assert_eq!(actuator.value(), None);
        assert_eq!(actuator.updates(), 0);
        assert!(actuator.is_online());
    }

    #[test]
    fn should_apply_values_and_count_updates() {
        let mut actuator = VirtualActuator::new("heater");

        assert_eq!(actuator.apply(ProtocolValue::Bool(true)), None);
        let previous = actuator.apply(ProtocolValue::Int(6));

        assert_eq!(previous, Some(ProtocolValue::Bool(true)));
        assert_eq!(actuator.value(), Some(ProtocolValue::Int(6)));
        assert_eq!(actuator.updates(), 2);
    }
}
