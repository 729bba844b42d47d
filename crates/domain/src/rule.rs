//! Rule — a named, validated automation graph.

use serde::{Deserialize, Serialize};

use crate::error::{RuleflowError, ValidationError};
use crate::graph::{Graph, GraphValidationError};
use crate::id::RuleId;

/// An automation rule: a validated [`Graph`] plus its identity.
///
/// Deserializing a rule validates its graph, so a `Rule` value is always
/// executable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    #[serde(default)]
    pub id: RuleId,
    pub name: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub graph: Graph,
}

fn default_enabled() -> bool {
    true
}

impl Rule {
    /// Create a builder for constructing a [`Rule`].
    #[must_use]
    pub fn builder() -> RuleBuilder {
        RuleBuilder::default()
    }

    /// Check domain invariants not covered by graph validation.
    ///
    /// # Errors
    ///
    /// Returns [`RuleflowError::Validation`] when `name` is empty.
    pub fn validate(&self) -> Result<(), RuleflowError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyName.into());
        }
        Ok(())
    }
}

/// Step-by-step builder for [`Rule`].
#[derive(Debug, Default)]
pub struct RuleBuilder {
    id: Option<RuleId>,
    name: Option<String>,
    enabled: Option<bool>,
    graph: Option<Graph>,
}

impl RuleBuilder {
    #[must_use]
    pub fn id(mut self, id: RuleId) -> Self {
        self.id = Some(id);
        self
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }

    #[must_use]
    pub fn graph(mut self, graph: Graph) -> Self {
        self.graph = Some(graph);
        self
    }

    /// Consume the builder, validate, and return a [`Rule`].
    ///
    /// # Errors
    ///
    /// Returns [`RuleflowError::Validation`] if the name is empty, or
    /// [`RuleflowError::Graph`] if no graph was provided.
    pub fn build(self) -> Result<Rule, RuleflowError> {
        let graph = self.graph.ok_or(GraphValidationError::NoTrigger)?;
        let rule = Rule {
            id: self.id.unwrap_or_default(),
            name: self.name.unwrap_or_default(),
            enabled: self.enabled.unwrap_or(true),
            graph,
        };
        rule.validate()?;
        Ok(rule)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph() -> Graph {
        serde_json::from_value(serde_json::json!({
            "nodes": [
                {"id": "t", "type": "trigger", "data": {"variable": "temp", "value": 30}},
                {"id": "a", "type": "action", "data": {"actuatorId": "fan", "mode": "on"}}
            ],
            "edges": [{"id": "e1", "source": "t", "target": "a"}]
        }))
        .unwrap()
    }

    #[test]
    fn should_build_valid_rule_when_required_fields_provided() {
        let rule = Rule::builder()
            .name("Cool down")
            .graph(graph())
            .build()
            .unwrap();
        assert_eq!(rule.name, "Cool down");
        assert!(rule.enabled);
        assert_eq!(rule.graph.node_count(), 2);
    }

    #[test]
    fn should_build_disabled_rule_when_enabled_is_false() {
        let rule = Rule::builder()
            .name("Off")
            .enabled(false)
            .graph(graph())
            .build()
            .unwrap();
        assert!(!rule.enabled);
    }

    #[test]
    fn should_return_validation_error_when_name_is_empty() {
        let result = Rule::builder().name("  ").graph(graph()).build();
        assert!(matches!(
            result,
            Err(RuleflowError::Validation(ValidationError::EmptyName))
        ));
    }

    #[test]
    fn should_return_graph_error_when_graph_is_missing() {
        let result = Rule::builder().name("No graph").build();
        assert!(matches!(result, Err(RuleflowError::Graph(_))));
    }

    #[test]
    fn should_set_custom_id_via_builder() {
        let id = RuleId::new();
        let rule = Rule::builder()
            .id(id)
            .name("Custom ID")
            .graph(graph())
            .build()
            .unwrap();
        assert_eq!(rule.id, id);
    }

    #[test]
    fn should_deserialize_rule_file_with_defaults() {
        let json = serde_json::json!({
            "name": "From file",
            "graph": serde_json::to_value(graph()).unwrap()
        });
        let rule: Rule = serde_json::from_value(json).unwrap();
        assert!(rule.enabled);
        assert_eq!(rule.graph.edge_count(), 1);
    }

    #[test]
    fn should_reject_rule_file_with_invalid_graph() {
        let json = serde_json::json!({
            "name": "Broken",
            "graph": {"nodes": [], "edges": []}
        });
        assert!(serde_json::from_value::<Rule>(json).is_err());
    }
}
