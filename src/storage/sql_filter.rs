//! Filter tree -> parameterized SQL `WHERE` clause
//!
//! Every comparison renders to a non-NULL boolean so that `NOT` and `!=`
//! behave the same for missing fields as for present ones. Values and JSON
//! paths are always bound as parameters.

use crate::filters::{ComparisonOp, Filter, LogicOp};
use crate::{Error, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use duckdb::types::Value as SqlValue;
use serde_json::Value;

/// A rendered clause and its parameters, in placeholder order
#[derive(Debug, Clone, PartialEq)]
pub struct WhereClause {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

/// Translate a filter tree
pub fn translate(filter: &Filter) -> Result<WhereClause> {
    let mut builder = ClauseBuilder::default();
    let sql = builder.visit(filter)?;
    Ok(WhereClause {
        sql,
        params: builder.params,
    })
}

/// Where a filter field lives in the table
#[derive(Debug, Clone, PartialEq)]
enum FieldRef {
    Column(&'static str),
    /// JSON path into the `meta` column
    Meta(String),
}

impl FieldRef {
    fn parse(field: &str) -> Result<Self> {
        match field {
            "id" => Ok(FieldRef::Column("id")),
            "content" => Ok(FieldRef::Column("content")),
            "embedding" | "sparse_embedding" | "blob" | "score" => {
                Err(Error::Filter(format!("Field {:?} cannot be filtered on", field)))
            }
            _ => {
                let key = field.strip_prefix("meta.").unwrap_or(field);
                if key.is_empty() || key.split('.').any(str::is_empty) {
                    return Err(Error::Filter(format!("Invalid metadata field: {:?}", field)));
                }
                Ok(FieldRef::Meta(json_path(key)))
            }
        }
    }
}

fn json_path(key: &str) -> String {
    let mut path = String::from("$");
    for segment in key.split('.') {
        path.push_str(".\"");
        path.push_str(&segment.replace('\\', "\\\\").replace('"', "\\\""));
        path.push('"');
    }
    path
}

/// How a JSON value is compared against the stored field
#[derive(Debug, Clone, Copy, PartialEq)]
enum Kind {
    Text,
    Number,
    Boolean,
    Timestamp,
    Json,
}

#[derive(Default)]
struct ClauseBuilder {
    params: Vec<SqlValue>,
}

impl ClauseBuilder {
    fn visit(&mut self, filter: &Filter) -> Result<String> {
        match filter {
            Filter::Comparison { field, op, value } => {
                let field = FieldRef::parse(field)?;
                self.comparison(&field, *op, value)
            }
            Filter::Logic { op, conditions } => {
                let parts = conditions
                    .iter()
                    .map(|c| self.visit(c))
                    .collect::<Result<Vec<_>>>()?;
                Ok(match op {
                    LogicOp::And => join_or(&parts, " AND ", "TRUE"),
                    LogicOp::Or => join_or(&parts, " OR ", "FALSE"),
                    LogicOp::Not => format!("NOT {}", join_or(&parts, " AND ", "TRUE")),
                })
            }
        }
    }

    fn comparison(&mut self, field: &FieldRef, op: ComparisonOp, value: &Value) -> Result<String> {
        match op {
            ComparisonOp::Eq => self.equals(field, value),
            ComparisonOp::NotEq => {
                if value.is_null() {
                    Ok(format!("({} IS NOT NULL)", self.text(field)))
                } else {
                    Ok(format!("NOT {}", self.equals(field, value)?))
                }
            }
            ComparisonOp::Gt | ComparisonOp::Gte | ComparisonOp::Lt | ComparisonOp::Lte => {
                self.ordering(field, op, value)
            }
            ComparisonOp::In | ComparisonOp::NotIn => {
                let items = value.as_array().ok_or_else(|| {
                    Error::Filter(format!("Operator '{}' requires a list value, got {}", op.as_str(), value))
                })?;
                let parts = items
                    .iter()
                    .map(|item| self.equals(field, item))
                    .collect::<Result<Vec<_>>>()?;
                let any = join_or(&parts, " OR ", "FALSE");
                Ok(if op == ComparisonOp::In { any } else { format!("NOT {}", any) })
            }
        }
    }

    fn equals(&mut self, field: &FieldRef, value: &Value) -> Result<String> {
        if value.is_null() {
            return Ok(format!("({} IS NULL)", self.text(field)));
        }
        let kind = match value {
            Value::String(_) => Kind::Text,
            Value::Number(_) => Kind::Number,
            Value::Bool(_) => Kind::Boolean,
            _ => Kind::Json,
        };
        let lhs = self.typed(field, kind)?;
        let rhs = self.bind(kind, value)?;
        Ok(format!("COALESCE({} = {}, FALSE)", lhs, rhs))
    }

    fn ordering(&mut self, field: &FieldRef, op: ComparisonOp, value: &Value) -> Result<String> {
        let kind = match value {
            Value::Null => return Ok("FALSE".to_string()),
            Value::Number(_) => Kind::Number,
            Value::String(s) if parse_timestamp(s).is_some() => Kind::Timestamp,
            Value::String(s) => {
                return Err(Error::Filter(format!(
                    "Operator '{}' needs a number or an ISO-8601 date, got {:?}",
                    op.as_str(),
                    s
                )));
            }
            other => {
                return Err(Error::Filter(format!(
                    "Operator '{}' does not support value {}",
                    op.as_str(),
                    other
                )));
            }
        };
        let lhs = self.typed(field, kind)?;
        let rhs = self.bind(kind, value)?;
        Ok(format!("COALESCE({} {} {}, FALSE)", lhs, op.as_str(), rhs))
    }

    /// The field as VARCHAR (NULL when missing)
    fn text(&mut self, field: &FieldRef) -> String {
        match field {
            FieldRef::Column(name) => name.to_string(),
            FieldRef::Meta(path) => {
                self.params.push(SqlValue::Text(path.clone()));
                "json_extract_string(meta, ?)".to_string()
            }
        }
    }

    fn typed(&mut self, field: &FieldRef, kind: Kind) -> Result<String> {
        Ok(match kind {
            Kind::Text => self.text(field),
            Kind::Number => format!("TRY_CAST({} AS DOUBLE)", self.text(field)),
            Kind::Boolean => format!("TRY_CAST({} AS BOOLEAN)", self.text(field)),
            Kind::Timestamp => format!("TRY_CAST({} AS TIMESTAMPTZ)", self.text(field)),
            Kind::Json => match field {
                FieldRef::Meta(path) => {
                    self.params.push(SqlValue::Text(path.clone()));
                    "CAST(json_extract(meta, ?) AS VARCHAR)".to_string()
                }
                FieldRef::Column(name) => {
                    return Err(Error::Filter(format!("Column {:?} cannot be compared to a list or object", name)));
                }
            },
        })
    }

    fn bind(&mut self, kind: Kind, value: &Value) -> Result<String> {
        let (placeholder, param) = match (kind, value) {
            (Kind::Text, Value::String(s)) => ("?", SqlValue::Text(s.clone())),
            (Kind::Timestamp, Value::String(s)) => ("CAST(? AS TIMESTAMPTZ)", SqlValue::Text(s.clone())),
            (Kind::Number, Value::Number(n)) => {
                let n = n
                    .as_f64()
                    .ok_or_else(|| Error::Filter(format!("Number out of range: {}", n)))?;
                ("?", SqlValue::Double(n))
            }
            (Kind::Boolean, Value::Bool(b)) => ("?", SqlValue::Boolean(*b)),
            (Kind::Json, other) => ("?", SqlValue::Text(other.to_string())),
            (_, other) => return Err(Error::Filter(format!("Unsupported filter value: {}", other))),
        };
        self.params.push(param);
        Ok(placeholder.to_string())
    }
}

fn join_or(parts: &[String], sep: &str, empty: &str) -> String {
    if parts.is_empty() {
        empty.to_string()
    } else {
        format!("({})", parts.join(sep))
    }
}

fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn text(s: &str) -> SqlValue {
        SqlValue::Text(s.to_string())
    }

    #[test]
    fn test_json_path_quoting() {
        assert_eq!(json_path("a.b"), r#"$."a"."b""#);
        assert_eq!(json_path(r#"we"ird"#), r#"$."we\"ird""#);
    }

    #[test]
    fn test_meta_equality() {
        let clause = translate(&Filter::eq("meta.type", "article")).unwrap();
        assert_eq!(clause.sql, "COALESCE(json_extract_string(meta, ?) = ?, FALSE)");
        assert_eq!(clause.params, vec![text(r#"$."type""#), text("article")]);
    }

    #[test]
    fn test_column_and_number() {
        let clause = translate(&Filter::comparison("meta.number", ComparisonOp::Gte, 3)).unwrap();
        assert_eq!(clause.sql, "COALESCE(TRY_CAST(json_extract_string(meta, ?) AS DOUBLE) >= ?, FALSE)");
        assert_eq!(clause.params[1], SqlValue::Double(3.0));

        let clause = translate(&Filter::eq("id", "42")).unwrap();
        assert_eq!(clause.sql, "COALESCE(id = ?, FALSE)");
        assert_eq!(clause.params, vec![text("42")]);
    }

    #[test]
    fn test_null_handling() {
        let eq_null = translate(&Filter::eq("content", Value::Null)).unwrap();
        assert_eq!(eq_null.sql, "(content IS NULL)");

        let ne_null = translate(&Filter::comparison("content", ComparisonOp::NotEq, Value::Null)).unwrap();
        assert_eq!(ne_null.sql, "(content IS NOT NULL)");

        let gt_null = translate(&Filter::comparison("meta.x", ComparisonOp::Gt, Value::Null)).unwrap();
        assert_eq!(gt_null.sql, "FALSE");
        assert!(gt_null.params.is_empty());
    }

    #[test]
    fn test_in_lists() {
        let clause = translate(&Filter::comparison("meta.genre", ComparisonOp::In, json!(["a", "b"]))).unwrap();
        assert_eq!(
            clause.sql,
            "(COALESCE(json_extract_string(meta, ?) = ?, FALSE) OR COALESCE(json_extract_string(meta, ?) = ?, FALSE))"
        );
        assert_eq!(clause.params.len(), 4);

        let empty_in = translate(&Filter::comparison("meta.genre", ComparisonOp::In, json!([]))).unwrap();
        assert_eq!(empty_in.sql, "FALSE");
        let empty_not_in = translate(&Filter::comparison("meta.genre", ComparisonOp::NotIn, json!([]))).unwrap();
        assert_eq!(empty_not_in.sql, "NOT FALSE");

        let err = translate(&Filter::comparison("meta.genre", ComparisonOp::In, "a")).unwrap_err();
        assert!(matches!(err, Error::Filter(_)));
    }

    #[test]
    fn test_ordering_rejects_bad_values() {
        for value in [json!("not a date"), json!(true), json!([1, 2])] {
            let err = translate(&Filter::comparison("meta.date", ComparisonOp::Lt, value)).unwrap_err();
            assert!(matches!(err, Error::Filter(_)));
        }
    }

    #[test]
    fn test_dates() {
        let clause = translate(&Filter::comparison("meta.date", ComparisonOp::Gt, "1969-07-21T20:17:40")).unwrap();
        assert!(clause.sql.contains("AS TIMESTAMPTZ) > CAST(? AS TIMESTAMPTZ)"));
        assert!(parse_timestamp("2015-01-01T00:00:00+01:00").is_some());
        assert!(parse_timestamp("2015-01-01").is_some());
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn test_logic() {
        let filter = Filter::not(vec![Filter::eq("meta.a", 1), Filter::eq("meta.b", true)]);
        let clause = translate(&filter).unwrap();
        assert!(clause.sql.starts_with("NOT ("));
        assert!(clause.sql.contains(" AND "));
        assert!(clause.sql.contains("AS BOOLEAN"));
        assert_eq!(clause.params.len(), 4);

        assert_eq!(translate(&Filter::and(vec![])).unwrap().sql, "TRUE");
        assert_eq!(translate(&Filter::or(vec![])).unwrap().sql, "FALSE");
    }

    #[test]
    fn test_unfilterable_fields() {
        assert!(matches!(translate(&Filter::eq("embedding", 1)), Err(Error::Filter(_))));
        assert!(matches!(translate(&Filter::eq("meta.", 1)), Err(Error::Filter(_))));
        assert!(matches!(translate(&Filter::eq("id", json!([1]))), Err(Error::Filter(_))));
    }
}
