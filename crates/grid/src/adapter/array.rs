//! In-memory adapter over JSON rows.

use std::cmp::Ordering;

use async_trait::async_trait;
use regex::{Regex, RegexBuilder};
use serde_json::{Map, Value};

use super::{Adapter, ResultSet, sort_terms};
use crate::column::{ColumnCollection, SummaryType};
use crate::error::{GridError, GridResult};
use crate::filter::{FilterOperator, FilterPlan, FilterValue, Predicate};
use crate::query::{GridQuery, SortDirection};
use crate::value;

/// Adapter filtering, sorting and paging a vector of rows in memory.
///
/// Rows keep their original order as the final tie-break.
pub struct ArrayAdapter {
    rows: Vec<Value>,
    count_of_items: u64,
    count_of_items_total: u64,
}

impl ArrayAdapter {
    pub fn new(rows: Vec<Value>) -> Self {
        Self {
            rows,
            count_of_items: 0,
            count_of_items_total: 0,
        }
    }

    pub fn rows(&self) -> &[Value] {
        &self.rows
    }
}

#[async_trait]
impl Adapter for ArrayAdapter {
    async fn fetch_data(
        &mut self,
        query: &GridQuery,
        columns: &ColumnCollection,
    ) -> GridResult<ResultSet> {
        let plan = FilterPlan::build(&query.filter, columns)?;
        let where_matcher = plan.where_clause.as_ref().map(Matcher::compile).transpose()?;
        let having_matcher = plan.having_clause.as_ref().map(Matcher::compile).transpose()?;

        let mut filtered: Vec<&Value> = self
            .rows
            .iter()
            .filter(|row| where_matcher.as_ref().is_none_or(|m| m.matches(row)))
            .filter(|row| having_matcher.as_ref().is_none_or(|m| m.matches(row)))
            .collect();

        let user_data = summarize(columns, &filtered);

        let terms = sort_terms(&query.sort, columns);
        if !terms.is_empty() {
            filtered.sort_by(|a, b| compare_rows(a, b, &terms));
        }

        self.count_of_items_total = self.rows.len() as u64;
        self.count_of_items = filtered.len() as u64;

        let rows = filtered
            .into_iter()
            .skip(query.page.offset() as usize)
            .take(query.page.limit() as usize)
            .cloned()
            .collect();

        Ok(ResultSet {
            rows,
            user_data,
            count_of_items: self.count_of_items,
            count_of_items_total: self.count_of_items_total,
        })
    }

    fn count_of_items(&self) -> u64 {
        self.count_of_items
    }

    fn count_of_items_total(&self) -> u64 {
        self.count_of_items_total
    }
}

fn compare_rows(a: &Value, b: &Value, terms: &[(String, SortDirection)]) -> Ordering {
    for (identifier, direction) in terms {
        let left = value::resolve(a, identifier).unwrap_or(Value::Null);
        let right = value::resolve(b, identifier).unwrap_or(Value::Null);
        let ordering = value::compare(&left, &right);
        let ordering = match direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

/// Compiled row test for a predicate tree.
enum Matcher {
    /// Case-insensitive pattern for the string-match operators.
    Pattern {
        identifier: String,
        regex: Regex,
        negated: bool,
    },
    /// Relational comparison.
    Compare {
        identifier: String,
        operator: FilterOperator,
        operand: String,
    },
    Membership {
        identifier: String,
        items: Vec<String>,
        negated: bool,
    },
    All(Vec<Matcher>),
    Any(Vec<Matcher>),
}

impl Matcher {
    fn compile(predicate: &Predicate) -> GridResult<Self> {
        match predicate {
            Predicate::All(parts) => Ok(Matcher::All(
                parts.iter().map(Matcher::compile).collect::<GridResult<_>>()?,
            )),
            Predicate::Any(parts) => Ok(Matcher::Any(
                parts.iter().map(Matcher::compile).collect::<GridResult<_>>()?,
            )),
            Predicate::Compare {
                identifier,
                operator,
                value,
            } => {
                let identifier = identifier.clone();
                let operator = *operator;
                let negated = operator.is_negated();

                if operator.is_list() {
                    return Ok(Matcher::Membership {
                        identifier,
                        items: value.to_list(),
                        negated,
                    });
                }

                let text = match value {
                    FilterValue::Text(s) => s.clone(),
                    FilterValue::List(_) => value.as_text(),
                };
                let escaped = regex::escape(&text);
                let pattern = match operator {
                    FilterOperator::BeginsWith | FilterOperator::NotBeginsWith => {
                        format!("^{escaped}")
                    }
                    FilterOperator::EndsWith | FilterOperator::NotEndsWith => {
                        format!("{escaped}$")
                    }
                    FilterOperator::Contains | FilterOperator::NotContains => escaped,
                    _ => {
                        return Ok(Matcher::Compare {
                            identifier,
                            operator,
                            operand: text,
                        });
                    }
                };

                let regex = RegexBuilder::new(&pattern)
                    .case_insensitive(true)
                    .build()
                    .map_err(|e| GridError::invalid_argument(format!("bad filter pattern: {e}")))?;

                Ok(Matcher::Pattern {
                    identifier,
                    regex,
                    negated,
                })
            }
        }
    }

    fn matches(&self, row: &Value) -> bool {
        match self {
            Matcher::All(parts) => parts.iter().all(|m| m.matches(row)),
            Matcher::Any(parts) => parts.iter().any(|m| m.matches(row)),
            Matcher::Pattern {
                identifier,
                regex,
                negated,
            } => test_value(row, identifier, *negated, |v| {
                regex.is_match(&value::to_text(v))
            }),
            Matcher::Membership {
                identifier,
                items,
                negated,
            } => test_value(row, identifier, *negated, |v| {
                items
                    .iter()
                    .any(|item| value::compare_with_text(v, item) == Ordering::Equal)
            }),
            Matcher::Compare {
                identifier,
                operator,
                operand,
            } => {
                let negated = operator.is_negated();
                test_value(row, identifier, negated, |v| {
                    let ordering = value::compare_with_text(v, operand);
                    match operator {
                        FilterOperator::Equal | FilterOperator::NotEqual => {
                            ordering == Ordering::Equal
                        }
                        FilterOperator::Less => ordering == Ordering::Less,
                        FilterOperator::LessOrEqual => ordering != Ordering::Greater,
                        FilterOperator::Greater => ordering == Ordering::Greater,
                        FilterOperator::GreaterOrEqual => ordering != Ordering::Less,
                        _ => false,
                    }
                })
            }
        }
    }
}

/// Apply a positive test to a row value.
///
/// Missing and null values never match, like SQL NULL. A list value (a
/// one-to-many field) matches a positive test when any element does, and
/// a negated test when no element matches the positive form.
fn test_value(
    row: &Value,
    identifier: &str,
    negated: bool,
    positive: impl Fn(&Value) -> bool,
) -> bool {
    let value = match value::resolve(row, identifier) {
        None | Some(Value::Null) => return false,
        Some(v) => v,
    };

    let any_positive = match &value {
        Value::Array(items) => items.iter().filter(|v| !v.is_null()).any(&positive),
        scalar => positive(scalar),
    };

    if negated { !any_positive } else { any_positive }
}

/// Summary values over the filtered rows.
fn summarize(columns: &ColumnCollection, rows: &[&Value]) -> Option<Map<String, Value>> {
    let mut summary = Map::new();

    for column in columns.iter() {
        let Some(summary_type) = column.summary_type else {
            continue;
        };
        let identifier = column.primary_identifier();
        let values: Vec<Value> = rows
            .iter()
            .filter_map(|row| value::resolve(row, identifier))
            .filter(|v| !v.is_null())
            .collect();

        let result = match summary_type {
            SummaryType::Count => Value::from(values.len() as u64),
            SummaryType::Sum => number_value(values.iter().filter_map(value::to_number).sum()),
            SummaryType::Min => values
                .iter()
                .filter_map(value::to_number)
                .reduce(f64::min)
                .map_or(Value::Null, number_value),
            SummaryType::Max => values
                .iter()
                .filter_map(value::to_number)
                .reduce(f64::max)
                .map_or(Value::Null, number_value),
        };
        summary.insert(column.name.clone(), result);
    }

    if summary.is_empty() { None } else { Some(summary) }
}

fn number_value(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n).map_or(Value::Null, Value::Number)
    }
}
