//! Scored values and the append-only evaluation record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::metric::{MetricDefinition, ValueType};

/// Typed value returned by a scoring client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ScoreValue {
    Numeric(f64),
    Text(String),
    Boolean(bool),
}

impl ScoreValue {
    /// Interpret raw model output. `None` for empty output.
    pub fn infer(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        if trimmed.eq_ignore_ascii_case("true") {
            return Some(Self::Boolean(true));
        }
        if trimmed.eq_ignore_ascii_case("false") {
            return Some(Self::Boolean(false));
        }
        match trimmed.parse::<f64>() {
            Ok(n) if n.is_finite() => Some(Self::Numeric(n)),
            _ => Some(Self::Text(trimmed.to_string())),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::Numeric(_) => "numeric",
            Self::Text(_) => "string",
            Self::Boolean(_) => "boolean",
        }
    }
}

/// A score validated against the metric's declared type.
#[derive(Debug, Clone, PartialEq)]
pub enum MetricValue {
    Numeric(f64),
    Text(String),
}

impl MetricValue {
    /// Validate a score for a metric of the given type.
    ///
    /// String metrics accept any score rendered as text; booleans are stored
    /// as `"true"`/`"false"` because the persisted schema has no boolean column.
    pub fn from_score(value_type: ValueType, score: ScoreValue) -> Result<Self, String> {
        match (value_type, score) {
            (ValueType::Numeric, ScoreValue::Numeric(n)) => Ok(Self::Numeric(n)),
            (ValueType::String, ScoreValue::Text(s)) => Ok(Self::Text(s)),
            (ValueType::String, ScoreValue::Numeric(n)) => Ok(Self::Text(n.to_string())),
            (ValueType::String, ScoreValue::Boolean(b)) => Ok(Self::Text(b.to_string())),
            (ValueType::Boolean, ScoreValue::Boolean(b)) => Ok(Self::Text(b.to_string())),
            (expected, other) => Err(format!(
                "expected {} value, got {}",
                expected.as_str(),
                other.kind()
            )),
        }
    }
}

/// One immutable row capturing a metric's value for a session at a point in time.
///
/// Exactly one of `metric_value_string` / `metric_value_numeric` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRecord {
    /// Agent that handled the session
    pub agent_id: String,
    /// Evaluated session
    pub session_id: String,
    /// Write time
    pub timestamp: DateTime<Utc>,
    /// Metric name
    pub metric: String,
    /// Value of string and boolean metrics
    pub metric_value_string: Option<String>,
    /// Value of numeric metrics
    pub metric_value_numeric: Option<f64>,
}

impl EvaluationRecord {
    /// Build a record stamped with the current wall-clock time.
    pub fn now(
        agent_id: impl Into<String>,
        session_id: impl Into<String>,
        metric: &MetricDefinition,
        value: MetricValue,
    ) -> Self {
        Self::at(agent_id, session_id, &metric.name, value, Utc::now())
    }

    /// Build a record with an explicit timestamp.
    pub fn at(
        agent_id: impl Into<String>,
        session_id: impl Into<String>,
        metric: impl Into<String>,
        value: MetricValue,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let (metric_value_string, metric_value_numeric) = match value {
            MetricValue::Numeric(n) => (None, Some(n)),
            MetricValue::Text(s) => (Some(s), None),
        };
        Self {
            agent_id: agent_id.into(),
            session_id: session_id.into(),
            timestamp,
            metric: metric.into(),
            metric_value_string,
            metric_value_numeric,
        }
    }

    /// The stored value, whichever column holds it.
    pub fn value(&self) -> MetricValue {
        match (&self.metric_value_numeric, &self.metric_value_string) {
            (Some(n), _) => MetricValue::Numeric(*n),
            (None, Some(s)) => MetricValue::Text(s.clone()),
            (None, None) => MetricValue::Text(String::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infer_raw_output() {
        assert_eq!(ScoreValue::infer(" 0.2\n"), Some(ScoreValue::Numeric(0.2)));
        assert_eq!(ScoreValue::infer("TRUE"), Some(ScoreValue::Boolean(true)));
        assert_eq!(
            ScoreValue::infer("COMPLIANT"),
            Some(ScoreValue::Text("COMPLIANT".to_string()))
        );
        assert_eq!(ScoreValue::infer("   "), None);
        assert_eq!(ScoreValue::infer("NaN"), Some(ScoreValue::Text("NaN".to_string())));
    }

    #[test]
    fn test_numeric_metric_rejects_text() {
        let err = MetricValue::from_score(ValueType::Numeric, ScoreValue::Text("high".into()));
        assert_eq!(err.unwrap_err(), "expected numeric value, got string");
    }

    #[test]
    fn test_string_metric_accepts_any_score() {
        assert_eq!(
            MetricValue::from_score(ValueType::String, ScoreValue::Numeric(5.0)).unwrap(),
            MetricValue::Text("5".to_string())
        );
        assert_eq!(
            MetricValue::from_score(ValueType::String, ScoreValue::Boolean(false)).unwrap(),
            MetricValue::Text("false".to_string())
        );
    }

    #[test]
    fn test_boolean_metric_stored_as_text() {
        let value = MetricValue::from_score(ValueType::Boolean, ScoreValue::Boolean(true)).unwrap();
        let metric = MetricDefinition::new("escalated", "Escalated?", ValueType::Boolean);
        let record = EvaluationRecord::now("A1", "S1", &metric, value);
        assert_eq!(record.metric_value_string.as_deref(), Some("true"));
        assert!(record.metric_value_numeric.is_none());
    }

    #[test]
    fn test_exactly_one_value_column() {
        let metric = MetricDefinition::new("toxicity_score", "Rate", ValueType::Numeric);
        let record = EvaluationRecord::now("A1", "S1", &metric, MetricValue::Numeric(0.2));
        assert_eq!(record.metric_value_numeric, Some(0.2));
        assert!(record.metric_value_string.is_none());
        assert_eq!(record.value(), MetricValue::Numeric(0.2));
    }
}
