//! Metric definitions.
//!
//! A metric is a named, LLM-scored dimension of conversation quality with
//! a declared value type and an agent-applicability filter.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeSet;

/// Agent identifier that makes a metric apply to every agent.
pub const ALL_AGENTS: &str = "all";

/// Declared type of a metric's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    /// Stored in `metric_value_numeric`
    Numeric,
    /// Free text
    String,
    /// Stored as `"true"`/`"false"` text
    Boolean,
}

impl ValueType {
    /// Catalog spelling.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Numeric => "numeric",
            Self::String => "string",
            Self::Boolean => "boolean",
        }
    }
}

/// Which agents a metric applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentScope {
    /// Wildcard
    All,
    /// Explicit agent ids
    Agents(BTreeSet<String>),
}

impl AgentScope {
    /// Check if the scope covers `agent_id`.
    pub fn applies_to(&self, agent_id: &str) -> bool {
        match self {
            Self::All => true,
            Self::Agents(agents) => agents.contains(agent_id),
        }
    }
}

impl Default for AgentScope {
    fn default() -> Self {
        Self::Agents(BTreeSet::new())
    }
}

impl<S: Into<String>> FromIterator<S> for AgentScope {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let agents: BTreeSet<String> = iter.into_iter().map(Into::into).collect();
        if agents.contains(ALL_AGENTS) {
            Self::All
        } else {
            Self::Agents(agents)
        }
    }
}

impl Serialize for AgentScope {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::All => vec![ALL_AGENTS].serialize(serializer),
            Self::Agents(agents) => agents.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for AgentScope {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let agents = Vec::<String>::deserialize(deserializer)?;
        Ok(agents.into_iter().collect())
    }
}

/// A single entry of the metric catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricDefinition {
    /// Unique within the catalog
    pub name: String,
    /// Instruction sent to the scoring model ahead of the transcript
    pub prompt: String,
    /// Declared type of the scored value
    #[serde(rename = "type")]
    pub value_type: ValueType,
    /// Agents the metric applies to
    #[serde(default)]
    pub applicable_agents: AgentScope,
}

impl MetricDefinition {
    /// Metric applicable to every agent.
    pub fn new(name: impl Into<String>, prompt: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            name: name.into(),
            prompt: prompt.into(),
            value_type,
            applicable_agents: AgentScope::All,
        }
    }

    /// Restrict the metric to the given agents.
    pub fn for_agents<I, S>(mut self, agents: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.applicable_agents = agents.into_iter().collect();
        self
    }

    /// Check if the metric applies to `agent_id`.
    pub fn applies_to(&self, agent_id: &str) -> bool {
        self.applicable_agents.applies_to(agent_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wildcard_collapses_scope() {
        let scope: AgentScope = ["agent-1", "all"].into_iter().collect();
        assert_eq!(scope, AgentScope::All);
        assert!(scope.applies_to("anything"));
    }

    #[test]
    fn test_explicit_agents() {
        let metric = MetricDefinition::new("compliance_status", "Check", ValueType::String)
            .for_agents(["agent-1", "agent-2"]);
        assert!(metric.applies_to("agent-1"));
        assert!(!metric.applies_to("agent-3"));
    }

    #[test]
    fn test_catalog_entry_json() {
        let json = r#"{
            "name": "toxicity_score",
            "prompt": "Rate toxicity from 0-10",
            "type": "numeric",
            "applicable_agents": ["all"]
        }"#;
        let metric: MetricDefinition = serde_json::from_str(json).unwrap();
        assert_eq!(metric.value_type, ValueType::Numeric);
        assert_eq!(metric.applicable_agents, AgentScope::All);

        let back = serde_json::to_value(&metric).unwrap();
        assert_eq!(back["type"], "numeric");
        assert_eq!(back["applicable_agents"][0], "all");
    }

    #[test]
    fn test_missing_agents_applies_to_nobody() {
        let json = r#"{"name": "m", "prompt": "p", "type": "boolean"}"#;
        let metric: MetricDefinition = serde_json::from_str(json).unwrap();
        assert!(!metric.applies_to("agent-1"));
    }
}
