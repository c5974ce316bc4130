//! Helpers for reading and comparing JSON row values.
//!
//! Rows travel through the grid as `serde_json::Value` objects no matter
//! which backend produced them. Identifiers address values inside a row
//! either by exact key, by a dotted path into nested objects, or by the
//! underscored form a SQL driver produces for aliased joins
//! (`author.name` → `author_name`).

use std::cmp::Ordering;

use serde_json::Value;

/// Resolve an identifier against a row.
///
/// When a dotted path crosses an array (a one-to-many join), the values
/// found in every element are collected into a list instead of a scalar.
pub fn resolve(row: &Value, identifier: &str) -> Option<Value> {
    if let Some(value) = row.get(identifier) {
        return Some(value.clone());
    }

    if identifier.contains('.') {
        if let Some(value) = walk_path(row, identifier) {
            return Some(value);
        }
        if let Some(value) = row.get(identifier.replace('.', "_")) {
            return Some(value.clone());
        }
    }

    None
}

fn walk_path(row: &Value, path: &str) -> Option<Value> {
    let mut current: Vec<&Value> = vec![row];
    let mut fanned_out = false;

    for segment in path.split('.') {
        let mut next = Vec::new();
        for value in current {
            match value {
                Value::Object(map) => {
                    if let Some(v) = map.get(segment) {
                        next.push(v);
                    }
                }
                Value::Array(items) => {
                    fanned_out = true;
                    next.extend(items.iter().filter_map(|item| item.get(segment)));
                }
                _ => {}
            }
        }
        if next.is_empty() {
            return None;
        }
        current = next;
    }

    if fanned_out {
        let mut collected = Vec::new();
        for value in current {
            match value {
                Value::Array(items) => collected.extend(items.iter().cloned()),
                other => collected.push(other.clone()),
            }
        }
        Some(Value::Array(collected))
    } else {
        current.first().map(|v| (*v).clone())
    }
}

/// Render a value as display text. `null` renders as an empty string.
pub fn to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(items) => items.iter().map(to_text).collect::<Vec<_>>().join(", "),
        Value::Object(_) => value.to_string(),
    }
}

/// Interpret a value as a number, accepting numeric strings.
pub fn to_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

/// Compare a row value against a filter operand.
///
/// Both sides are compared numerically when both parse as numbers,
/// otherwise as text.
pub fn compare_with_text(value: &Value, operand: &str) -> Ordering {
    if let (Some(a), Ok(b)) = (to_number(value), operand.trim().parse::<f64>()) {
        return a.partial_cmp(&b).unwrap_or(Ordering::Equal);
    }
    to_text(value).as_str().cmp(operand)
}

/// Compare two row values for sorting. `null` sorts after everything else.
pub fn compare(a: &Value, b: &Value) -> Ordering {
    match (a.is_null(), b.is_null()) {
        (true, true) => return Ordering::Equal,
        (true, false) => return Ordering::Greater,
        (false, true) => return Ordering::Less,
        _ => {}
    }

    if let (Some(x), Some(y)) = (to_number(a), to_number(b)) {
        return x.partial_cmp(&y).unwrap_or(Ordering::Equal);
    }
    to_text(a).cmp(&to_text(b))
}
