//! List data sources served from the rows stored in a history file.
//!
//! Domains are lists of `[field, operator, value]` conditions, all of which
//! must hold. `"&"` connectors are accepted and ignored.

use std::collections::BTreeMap;

use revgrid_engine::{ListDefinition, Row};
use revgrid_history::DataSourceFetcher;
use serde_json::Value;

#[derive(Debug, Clone, Default)]
pub struct InlineRows {
    /// Records per model
    rows: BTreeMap<String, Vec<Row>>,
    fetched: usize,
}

impl InlineRows {
    pub fn new(rows: BTreeMap<String, Vec<Row>>) -> Self {
        Self { rows, fetched: 0 }
    }

    /// Number of fetches served.
    pub fn fetched(&self) -> usize {
        self.fetched
    }
}

impl DataSourceFetcher for InlineRows {
    fn fetch(&mut self, definition: &ListDefinition) -> Result<Vec<Row>, String> {
        self.fetched += 1;
        let records = self
            .rows
            .get(&definition.model)
            .ok_or_else(|| format!("no records for model {}", definition.model))?;
        let conditions = parse_domain(&definition.domain)?;

        let mut matched = Vec::new();
        for record in records {
            if conditions.iter().all(|c| c.matches(record)) {
                matched.push(record.clone());
            }
        }
        log::debug!(
            "list {} ({}): {} of {} record(s) match",
            definition.id,
            definition.model,
            matched.len(),
            records.len()
        );
        Ok(matched)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operator {
    Eq,
    Ne,
    In,
    NotIn,
}

#[derive(Debug, Clone, PartialEq)]
struct Condition {
    field: String,
    operator: Operator,
    value: Value,
}

impl Condition {
    fn matches(&self, record: &Row) -> bool {
        let field = record.get(&self.field).unwrap_or(&Value::Null);
        match self.operator {
            Operator::Eq => values_equal(field, &self.value),
            Operator::Ne => !values_equal(field, &self.value),
            Operator::In => self.candidates().any(|v| values_equal(field, v)),
            Operator::NotIn => !self.candidates().any(|v| values_equal(field, v)),
        }
    }

    fn candidates(&self) -> impl Iterator<Item = &Value> {
        self.value.as_array().into_iter().flatten()
    }
}

/// Many2one values `[id, "name"]` compare by id.
fn values_equal(field: &Value, expected: &Value) -> bool {
    match field {
        Value::Array(pair) if !expected.is_array() => pair.first() == Some(expected),
        _ => field == expected,
    }
}

fn parse_domain(domain: &Value) -> Result<Vec<Condition>, String> {
    let Some(items) = domain.as_array() else {
        return Err(format!("domain must be a list, got {}", domain));
    };
    let mut conditions = Vec::new();
    for item in items {
        match item {
            Value::String(connector) if connector == "&" => continue,
            Value::Array(parts) if parts.len() == 3 => {
                let field = parts[0]
                    .as_str()
                    .ok_or_else(|| format!("bad field in {}", item))?;
                let operator = match parts[1].as_str() {
                    Some("=") => Operator::Eq,
                    Some("!=") => Operator::Ne,
                    Some("in") => Operator::In,
                    Some("not in") => Operator::NotIn,
                    _ => return Err(format!("unsupported operator in {}", item)),
                };
                if matches!(operator, Operator::In | Operator::NotIn) && !parts[2].is_array() {
                    return Err(format!("{} expects a list in {}", parts[1], item));
                }
                conditions.push(Condition {
                    field: field.to_string(),
                    operator,
                    value: parts[2].clone(),
                });
            }
            _ => return Err(format!("unsupported domain term {}", item)),
        }
    }
    Ok(conditions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use revgrid_engine::ListId;
    use serde_json::json;

    fn partners() -> InlineRows {
        let rows: Vec<Row> = ["tabouret", "test", "chaise"]
            .iter()
            .enumerate()
            .map(|(i, name)| {
                json!({ "id": i + 1, "name": name, "company_id": [1, "YourCompany"] })
                    .as_object()
                    .cloned()
                    .unwrap()
            })
            .collect();
        InlineRows::new(BTreeMap::from([("partner".to_string(), rows)]))
    }

    fn names(rows: &[Row]) -> Vec<&str> {
        rows.iter().filter_map(|r| r["name"].as_str()).collect()
    }

    fn fetch(domain: Value) -> Result<Vec<Row>, String> {
        let definition = ListDefinition::new(ListId::new("1"), "partner", vec!["name".into()], domain);
        partners().fetch(&definition)
    }

    #[test]
    fn test_operators() {
        assert_eq!(names(&fetch(json!([["name", "=", "test"]])).unwrap()), vec!["test"]);
        assert_eq!(names(&fetch(json!([["name", "!=", "test"]])).unwrap()), vec!["tabouret", "chaise"]);
        assert_eq!(
            names(&fetch(json!([["id", "in", [1, 3]]])).unwrap()),
            vec!["tabouret", "chaise"]
        );
        assert_eq!(names(&fetch(json!([["id", "not in", [1, 3]]])).unwrap()), vec!["test"]);
        assert_eq!(fetch(json!([])).unwrap().len(), 3);
    }

    #[test]
    fn test_conjunction_and_many2one() {
        let rows = fetch(json!(["&", ["company_id", "=", 1], ["name", "!=", "chaise"]])).unwrap();
        assert_eq!(names(&rows), vec!["tabouret", "test"]);
    }

    #[test]
    fn test_bad_domains() {
        assert!(fetch(json!([["name", "ilike", "t"]])).is_err());
        assert!(fetch(json!([["id", "in", 1]])).is_err());
        assert!(fetch(json!(["|", ["id", "=", 1], ["id", "=", 2]])).is_err());
        assert!(fetch(json!({})).is_err());
    }

    #[test]
    fn test_unknown_model() {
        let definition = ListDefinition::new(ListId::new("1"), "product", Vec::new(), json!([]));
        let mut rows = partners();
        assert!(rows.fetch(&definition).is_err());
        assert_eq!(rows.fetched(), 1);
    }
}
