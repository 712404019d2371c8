//! Metadata filters
//!
//! Filters are nested dictionaries of two shapes:
//! - Comparison: `{"field": "meta.type", "operator": "==", "value": "article"}`
//! - Logic: `{"operator": "AND", "conditions": [...]}`
//!
//! This module only parses and combines them. Translation to SQL lives in
//! `storage::sql_filter`.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::str::FromStr;

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComparisonOp {
    Eq,
    NotEq,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    NotIn,
}

impl ComparisonOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComparisonOp::Eq => "==",
            ComparisonOp::NotEq => "!=",
            ComparisonOp::Gt => ">",
            ComparisonOp::Gte => ">=",
            ComparisonOp::Lt => "<",
            ComparisonOp::Lte => "<=",
            ComparisonOp::In => "in",
            ComparisonOp::NotIn => "not in",
        }
    }
}

impl FromStr for ComparisonOp {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "==" => Ok(ComparisonOp::Eq),
            "!=" => Ok(ComparisonOp::NotEq),
            ">" => Ok(ComparisonOp::Gt),
            ">=" => Ok(ComparisonOp::Gte),
            "<" => Ok(ComparisonOp::Lt),
            "<=" => Ok(ComparisonOp::Lte),
            "in" => Ok(ComparisonOp::In),
            "not in" => Ok(ComparisonOp::NotIn),
            _ => Err(Error::Filter(format!("Unknown comparison operator: {}", s))),
        }
    }
}

/// Logical operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicOp {
    And,
    Or,
    Not,
}

impl LogicOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogicOp::And => "AND",
            LogicOp::Or => "OR",
            LogicOp::Not => "NOT",
        }
    }
}

impl FromStr for LogicOp {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "AND" => Ok(LogicOp::And),
            "OR" => Ok(LogicOp::Or),
            "NOT" => Ok(LogicOp::Not),
            _ => Err(Error::Filter(format!("Unknown logical operator: {}", s))),
        }
    }
}

/// A parsed filter tree
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Comparison {
        field: String,
        op: ComparisonOp,
        value: Value,
    },
    Logic {
        op: LogicOp,
        conditions: Vec<Filter>,
    },
}

impl Filter {
    pub fn comparison(field: impl Into<String>, op: ComparisonOp, value: impl Into<Value>) -> Self {
        Filter::Comparison {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::comparison(field, ComparisonOp::Eq, value)
    }

    pub fn and(conditions: Vec<Filter>) -> Self {
        Filter::Logic { op: LogicOp::And, conditions }
    }

    pub fn or(conditions: Vec<Filter>) -> Self {
        Filter::Logic { op: LogicOp::Or, conditions }
    }

    pub fn not(conditions: Vec<Filter>) -> Self {
        Filter::Logic { op: LogicOp::Not, conditions }
    }

    /// Parse a filter dictionary
    pub fn from_json(value: &Value) -> Result<Self> {
        let obj = value
            .as_object()
            .ok_or_else(|| Error::Filter(format!("Filter must be an object: {}", value)))?;

        let operator = obj
            .get("operator")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::Filter(format!("Missing 'operator' in filter: {}", value)))?;

        if let Some(field) = obj.get("field") {
            let field = field
                .as_str()
                .ok_or_else(|| Error::Filter(format!("'field' must be a string: {}", value)))?;
            let value = obj
                .get("value")
                .ok_or_else(|| Error::Filter(format!("Missing 'value' in comparison: {}", value)))?;
            return Ok(Filter::Comparison {
                field: field.to_string(),
                op: operator.parse()?,
                value: value.clone(),
            });
        }

        let conditions = obj
            .get("conditions")
            .ok_or_else(|| Error::Filter(format!("Missing 'field' or 'conditions' in filter: {}", value)))?
            .as_array()
            .ok_or_else(|| Error::Filter(format!("'conditions' must be a list: {}", value)))?
            .iter()
            .map(Filter::from_json)
            .collect::<Result<Vec<_>>>()?;

        Ok(Filter::Logic {
            op: operator.parse()?,
            conditions,
        })
    }

    /// Render back to a filter dictionary
    pub fn to_json(&self) -> Value {
        match self {
            Filter::Comparison { field, op, value } => json!({
                "field": field,
                "operator": op.as_str(),
                "value": value,
            }),
            Filter::Logic { op, conditions } => json!({
                "operator": op.as_str(),
                "conditions": conditions.iter().map(Filter::to_json).collect::<Vec<_>>(),
            }),
        }
    }
}

impl FromStr for Filter {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(s)
            .map_err(|e| Error::Filter(format!("Filter is not valid JSON: {}", e)))?;
        Filter::from_json(&value)
    }
}

impl Serialize for Filter {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Filter {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Filter::from_json(&value).map_err(serde::de::Error::custom)
    }
}

/// How init-time and runtime filters combine on a retriever
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterPolicy {
    /// Runtime filters replace init filters when given
    #[default]
    Replace,
    /// Runtime filters are combined with init filters
    Merge,
}

impl FilterPolicy {
    pub fn apply(&self, init: Option<&Filter>, runtime: Option<&Filter>) -> Option<Filter> {
        match (self, init, runtime) {
            (_, None, None) => None,
            (_, Some(f), None) | (_, None, Some(f)) => Some(f.clone()),
            (FilterPolicy::Replace, Some(_), Some(runtime)) => Some(runtime.clone()),
            (FilterPolicy::Merge, Some(init), Some(runtime)) => Some(merge(init, runtime)),
        }
    }
}

impl FromStr for FilterPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "replace" => Ok(FilterPolicy::Replace),
            "merge" => Ok(FilterPolicy::Merge),
            _ => Err(Error::InvalidArgument(format!("Unknown filter policy: {}", s))),
        }
    }
}

fn merge(init: &Filter, runtime: &Filter) -> Filter {
    match (init, runtime) {
        (Filter::Comparison { field: a, .. }, Filter::Comparison { field: b, .. }) if a == b => runtime.clone(),
        (
            Filter::Logic { op: LogicOp::And, conditions: left },
            Filter::Logic { op: LogicOp::And, conditions: right },
        ) => {
            let mut conditions = left.clone();
            conditions.extend(right.iter().cloned());
            Filter::and(conditions)
        }
        (Filter::Logic { op: LogicOp::And, conditions }, Filter::Comparison { field, .. }) => {
            // Runtime comparison overrides any init comparison on the same field
            let mut kept: Vec<Filter> = conditions
                .iter()
                .filter(|c| !matches!(c, Filter::Comparison { field: f, .. } if f == field))
                .cloned()
                .collect();
            kept.push(runtime.clone());
            Filter::and(kept)
        }
        _ => Filter::and(vec![init.clone(), runtime.clone()]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_comparison() {
        let filter: Filter = r#"{"field": "meta.type", "operator": "==", "value": "article"}"#.parse().unwrap();
        assert_eq!(filter, Filter::eq("meta.type", "article"));
    }

    #[test]
    fn test_parse_nested() {
        let filter = Filter::from_json(&json!({
            "operator": "AND",
            "conditions": [
                {"field": "meta.date", "operator": ">=", "value": 1420066800},
                {
                    "operator": "OR",
                    "conditions": [
                        {"field": "meta.genre", "operator": "in", "value": ["economy", "politics"]},
                        {"field": "meta.publisher", "operator": "==", "value": "nytimes"}
                    ]
                }
            ]
        }))
        .unwrap();

        match filter {
            Filter::Logic { op: LogicOp::And, conditions } => {
                assert_eq!(conditions.len(), 2);
                assert!(matches!(conditions[1], Filter::Logic { op: LogicOp::Or, .. }));
            }
            other => panic!("unexpected filter: {:?}", other),
        }
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(Filter::from_json(&json!({"field": "x", "value": 1})), Err(Error::Filter(_))));
        assert!(matches!(
            Filter::from_json(&json!({"field": "x", "operator": "~=", "value": 1})),
            Err(Error::Filter(_))
        ));
        assert!(matches!(Filter::from_json(&json!({"operator": "AND"})), Err(Error::Filter(_))));
        assert!(matches!(
            Filter::from_json(&json!({"operator": "XOR", "conditions": []})),
            Err(Error::Filter(_))
        ));
        assert!(matches!(
            Filter::from_json(&json!({"field": "x", "operator": "=="})),
            Err(Error::Filter(_))
        ));
        assert!(matches!(
            Filter::from_json(&json!({"operator": "OR", "conditions": {"field": "x", "operator": "==", "value": 1}})),
            Err(Error::Filter(_))
        ));
    }

    #[test]
    fn test_json_roundtrip_preserves_structure() {
        let raw = json!({
            "operator": "NOT",
            "conditions": [{"field": "meta.number", "operator": "not in", "value": [1, 2]}]
        });
        assert_eq!(Filter::from_json(&raw).unwrap().to_json(), raw);
    }

    #[test]
    fn test_replace_policy() {
        let init = Filter::eq("meta.a", 1);
        let runtime = Filter::eq("meta.b", 2);
        assert_eq!(FilterPolicy::Replace.apply(Some(&init), Some(&runtime)), Some(runtime.clone()));
        assert_eq!(FilterPolicy::Replace.apply(Some(&init), None), Some(init));
        assert_eq!(FilterPolicy::Replace.apply(None, None), None);
    }

    #[test]
    fn test_merge_policy() {
        let init = Filter::eq("meta.a", 1);
        let same_field = Filter::eq("meta.a", 5);
        assert_eq!(FilterPolicy::Merge.apply(Some(&init), Some(&same_field)), Some(same_field));

        let other = Filter::eq("meta.b", 2);
        assert_eq!(
            FilterPolicy::Merge.apply(Some(&init), Some(&other)),
            Some(Filter::and(vec![init.clone(), other.clone()]))
        );

        let and_init = Filter::and(vec![init.clone(), other.clone()]);
        let and_runtime = Filter::and(vec![Filter::eq("meta.c", 3)]);
        match FilterPolicy::Merge.apply(Some(&and_init), Some(&and_runtime)) {
            Some(Filter::Logic { op: LogicOp::And, conditions }) => assert_eq!(conditions.len(), 3),
            other => panic!("unexpected merge: {:?}", other),
        }

        let override_b = Filter::eq("meta.b", 9);
        assert_eq!(
            FilterPolicy::Merge.apply(Some(&and_init), Some(&override_b)),
            Some(Filter::and(vec![init, override_b]))
        );
    }
}
