//! Backend-neutral predicate tree.
//!
//! [`FilterPlan::build`] maps a rule set onto the declared columns once;
//! the SQL and in-memory adapters then translate the same tree into a
//! sea-query condition or a row test. Grouping rules:
//!
//! - every identifier of a concat column gets its own comparison, OR-ed;
//! - free-text values (`~`, `!~`) become one comparison per distinct word,
//!   combined with AND when the column's group operator is `and`, else OR
//!   for `~` and AND for `!~`;
//! - rules on the same column are combined with the column's group
//!   operator, and column groups with the filter's top-level operator,
//!   separately for the WHERE and HAVING clauses.

use chrono::NaiveDate;
use tracing::{debug, warn};

use super::{Filter, FilterOperator, FilterRule, FilterValue, GroupOperator, split_words};
use crate::column::{Column, ColumnCollection, STORAGE_DATE_FORMAT, SearchType};
use crate::error::GridResult;

/// Predicate over source identifiers.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Atomic comparison. Free-text operators carry a single word.
    Compare {
        identifier: String,
        operator: FilterOperator,
        value: FilterValue,
    },
    All(Vec<Predicate>),
    Any(Vec<Predicate>),
}

impl Predicate {
    pub fn compare(identifier: &str, operator: FilterOperator, value: FilterValue) -> Self {
        Predicate::Compare {
            identifier: identifier.to_string(),
            operator,
            value,
        }
    }

    /// Combine parts; a single part is returned unwrapped, none yields `None`.
    pub fn combine(operator: GroupOperator, mut parts: Vec<Predicate>) -> Option<Predicate> {
        match parts.len() {
            0 => None,
            1 => parts.pop(),
            _ => Some(match operator {
                GroupOperator::And => Predicate::All(parts),
                GroupOperator::Or => Predicate::Any(parts),
            }),
        }
    }
}

/// Predicates routed to the WHERE and HAVING clauses.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterPlan {
    pub where_clause: Option<Predicate>,
    pub having_clause: Option<Predicate>,
}

impl FilterPlan {
    /// Translate a rule set against the declared columns.
    ///
    /// Rules on unknown or non-searchable columns and rules with an empty
    /// value are skipped.
    pub fn build(filter: &Filter, columns: &ColumnCollection) -> GridResult<Self> {
        let mut groups: Vec<(&Column, Vec<&FilterRule>)> = Vec::new();

        for rule in &filter.rules {
            let Some(column) = columns.get(&rule.field) else {
                debug!(field = %rule.field, "filter rule on unknown column ignored");
                continue;
            };
            if !column.searchable {
                debug!(field = %rule.field, "filter rule on non-searchable column ignored");
                continue;
            }
            match groups.iter_mut().find(|(c, _)| c.name == column.name) {
                Some((_, rules)) => rules.push(rule),
                None => groups.push((column, vec![rule])),
            }
        }

        let mut where_parts = Vec::new();
        let mut having_parts = Vec::new();

        for (column, rules) in groups {
            let parts: Vec<Predicate> = rules
                .into_iter()
                .filter_map(|rule| rule_predicate(column, rule))
                .collect();

            if let Some(group) = Predicate::combine(column.search_group_operator, parts) {
                match column.search_type {
                    SearchType::Where => where_parts.push(group),
                    SearchType::Having => having_parts.push(group),
                }
            }
        }

        Ok(Self {
            where_clause: Predicate::combine(filter.group_operator, where_parts),
            having_clause: Predicate::combine(filter.group_operator, having_parts),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.where_clause.is_none() && self.having_clause.is_none()
    }
}

fn rule_predicate(column: &Column, rule: &FilterRule) -> Option<Predicate> {
    let operator = rule.operator;

    if operator.is_list() {
        let items: Vec<String> = rule
            .value
            .to_list()
            .into_iter()
            .map(|item| normalize_date(column, item))
            .collect();
        if items.is_empty() {
            return None;
        }
        return fan_out(column, operator, FilterValue::List(items));
    }

    let text = rule.value.as_text();
    if text.trim().is_empty() {
        return None;
    }

    if operator.is_free_text() {
        let token_operator = match (column.search_group_operator, operator) {
            (GroupOperator::And, _) => GroupOperator::And,
            (_, FilterOperator::Contains) => GroupOperator::Or,
            _ => GroupOperator::And,
        };
        let tokens: Vec<Predicate> = split_words(&text)
            .into_iter()
            .filter_map(|word| {
                fan_out(
                    column,
                    operator,
                    FilterValue::Text(normalize_date(column, word)),
                )
            })
            .collect();
        return Predicate::combine(token_operator, tokens);
    }

    fan_out(
        column,
        operator,
        FilterValue::Text(normalize_date(column, text.trim().to_string())),
    )
}

/// One comparison per identifier, OR-ed for concat columns.
fn fan_out(column: &Column, operator: FilterOperator, value: FilterValue) -> Option<Predicate> {
    let parts = column
        .identifiers()
        .into_iter()
        .map(|identifier| Predicate::compare(identifier, operator, value.clone()))
        .collect();
    Predicate::combine(GroupOperator::Or, parts)
}

/// Convert a user-typed date into the storage layout. Values that do not
/// parse pass through unchanged.
fn normalize_date(column: &Column, value: String) -> String {
    let Some(input_format) = column.date_input_format() else {
        return value;
    };
    match NaiveDate::parse_from_str(value.trim(), input_format) {
        Ok(date) => date.format(STORAGE_DATE_FORMAT).to_string(),
        Err(e) => {
            warn!(
                column = %column.name,
                value = %value,
                error = %e,
                "unparsable date filter value"
            );
            value
        }
    }
}
