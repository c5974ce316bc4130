//! Datagrid test utilities.
//!
//! Helpers for integration testing: row fixtures, a person builder,
//! query-string helpers and assertion utilities for grid payloads.

use std::collections::HashMap;

use serde_json::{Value as JsonValue, json};

/// Rows `{"id": n, "name": "row n", "position": n}` for `n` in `1..=count`.
pub fn numbered_rows(count: usize) -> Vec<JsonValue> {
    (1..=count)
        .map(|n| {
            json!({
                "id": n,
                "name": format!("row {n}"),
                "position": n,
            })
        })
        .collect()
}

/// Create a test person with default values.
pub fn test_person(id: u64, first_name: &str, last_name: &str) -> TestPerson {
    TestPerson {
        id,
        first_name: first_name.to_string(),
        last_name: last_name.to_string(),
        city: None,
        born: None,
        salary: None,
        tags: Vec::new(),
    }
}

/// A person builder for creating row fixtures.
#[derive(Debug, Clone)]
pub struct TestPerson {
    pub id: u64,
    pub first_name: String,
    pub last_name: String,
    pub city: Option<String>,
    pub born: Option<String>,
    pub salary: Option<i64>,
    pub tags: Vec<String>,
}

impl TestPerson {
    /// Set the city.
    pub fn in_city(mut self, city: &str) -> Self {
        self.city = Some(city.to_string());
        self
    }

    /// Set the birth date (`YYYY-MM-DD`).
    pub fn born(mut self, date: &str) -> Self {
        self.born = Some(date.to_string());
        self
    }

    /// Set the salary.
    pub fn earning(mut self, salary: i64) -> Self {
        self.salary = Some(salary);
        self
    }

    /// Add a tag; tags render as `[{"label": ...}]`.
    pub fn tagged(mut self, tag: &str) -> Self {
        self.tags.push(tag.to_string());
        self
    }

    /// Render as a grid row.
    pub fn to_row(&self) -> JsonValue {
        json!({
            "id": self.id,
            "first_name": self.first_name,
            "last_name": self.last_name,
            "city": self.city,
            "born": self.born,
            "salary": self.salary,
            "tags": self.tags.iter().map(|t| json!({"label": t})).collect::<Vec<_>>(),
        })
    }
}

/// A small, varied set of people.
pub fn people() -> Vec<JsonValue> {
    vec![
        test_person(1, "Ada", "Lovelace")
            .in_city("London")
            .born("1815-12-10")
            .earning(5200)
            .tagged("math")
            .tagged("poetry")
            .to_row(),
        test_person(2, "Grace", "Hopper")
            .in_city("New York")
            .born("1906-12-09")
            .earning(6100)
            .tagged("navy")
            .to_row(),
        test_person(3, "Alan", "Turing")
            .in_city("London")
            .born("1912-06-23")
            .earning(4800)
            .tagged("math")
            .to_row(),
        test_person(4, "Edsger", "Dijkstra")
            .in_city("Rotterdam")
            .born("1930-05-11")
            .earning(5500)
            .to_row(),
        test_person(5, "Barbara", "Liskov")
            .born("1939-11-07")
            .earning(7000)
            .tagged("types")
            .to_row(),
    ]
}

/// Build request parameters from pairs.
pub fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Encode a jqGrid `filters` parameter.
pub fn filters(group_op: &str, rules: &[(&str, &str, &str)]) -> String {
    json!({
        "groupOp": group_op,
        "rules": rules
            .iter()
            .map(|(field, op, data)| json!({"field": field, "op": op, "data": data}))
            .collect::<Vec<_>>(),
    })
    .to_string()
}

/// Assertion helpers for grid payloads.
pub mod assert {
    use serde_json::Value;

    /// Assert that a JSON value has a specific key.
    pub fn has_key(value: &Value, key: &str) {
        assert!(
            value.get(key).is_some(),
            "Expected JSON to have key '{}', got: {}",
            key,
            value
        );
    }

    /// Assert that a JSON value equals expected.
    pub fn json_eq(actual: &Value, expected: &Value) {
        assert_eq!(
            actual,
            expected,
            "JSON mismatch:\nactual: {}\nexpected: {}",
            serde_json::to_string_pretty(actual).unwrap_or_default(),
            serde_json::to_string_pretty(expected).unwrap_or_default()
        );
    }

    /// Cell `index` of every row in a jqGrid payload.
    pub fn column(payload: &Value, index: usize) -> Vec<Value> {
        payload["rows"]
            .as_array()
            .map(|rows| rows.iter().map(|r| r["cell"][index].clone()).collect())
            .unwrap_or_default()
    }

    /// Row ids of a jqGrid payload.
    pub fn ids(payload: &Value) -> Vec<Value> {
        payload["rows"]
            .as_array()
            .map(|rows| rows.iter().map(|r| r["id"].clone()).collect())
            .unwrap_or_default()
    }
}
