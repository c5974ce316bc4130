//! Filter rules decoded from the client.
//!
//! The widget sends a rule set `{groupOp, rules: [{field, op, data}]}`.
//! Each rule names a column, one of fourteen operators and a value. This
//! module holds those types; [`predicate`] turns them into a
//! backend-neutral predicate tree.

pub mod predicate;

pub use predicate::{FilterPlan, Predicate};

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{GridError, GridResult};

/// Filter operators, written as symbols (`==`, `^`, `~`, ...) or as the
/// widget's two-letter codes (`eq`, `bw`, `cn`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum FilterOperator {
    Equal,
    NotEqual,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
    BeginsWith,
    NotBeginsWith,
    EndsWith,
    NotEndsWith,
    /// Free-text word search.
    Contains,
    /// Negated free-text word search.
    NotContains,
    In,
    NotIn,
}

/// Symbol and wire code for every operator.
const OPERATORS: [(FilterOperator, &str, &str); 14] = [
    (FilterOperator::Equal, "==", "eq"),
    (FilterOperator::NotEqual, "!=", "ne"),
    (FilterOperator::Less, "<", "lt"),
    (FilterOperator::LessOrEqual, "<=", "le"),
    (FilterOperator::Greater, ">", "gt"),
    (FilterOperator::GreaterOrEqual, ">=", "ge"),
    (FilterOperator::BeginsWith, "^", "bw"),
    (FilterOperator::NotBeginsWith, "!^", "bn"),
    (FilterOperator::EndsWith, "$", "ew"),
    (FilterOperator::NotEndsWith, "!$", "en"),
    (FilterOperator::Contains, "~", "cn"),
    (FilterOperator::NotContains, "!~", "nc"),
    (FilterOperator::In, "|", "in"),
    (FilterOperator::NotIn, "!|", "ni"),
];

impl FilterOperator {
    /// Parse a symbolic operator or a two-letter wire code.
    pub fn parse(value: &str) -> GridResult<Self> {
        let value = value.trim();
        OPERATORS
            .iter()
            .find(|(_, symbol, code)| *symbol == value || code.eq_ignore_ascii_case(value))
            .map(|(op, _, _)| *op)
            .ok_or_else(|| {
                GridError::invalid_argument(format!("unknown filter operator '{value}'"))
            })
    }

    pub fn symbol(self) -> &'static str {
        self.entry().1
    }

    pub fn code(self) -> &'static str {
        self.entry().2
    }

    fn entry(self) -> &'static (FilterOperator, &'static str, &'static str) {
        // Every variant is listed in OPERATORS.
        OPERATORS
            .iter()
            .find(|(op, _, _)| *op == self)
            .unwrap_or(&OPERATORS[0])
    }

    /// Negated operators match when the positive form does not.
    pub fn is_negated(self) -> bool {
        matches!(
            self,
            FilterOperator::NotEqual
                | FilterOperator::NotBeginsWith
                | FilterOperator::NotEndsWith
                | FilterOperator::NotContains
                | FilterOperator::NotIn
        )
    }

    /// Operators whose value is split into words.
    pub fn is_free_text(self) -> bool {
        matches!(self, FilterOperator::Contains | FilterOperator::NotContains)
    }

    /// Operators whose value is a list.
    pub fn is_list(self) -> bool {
        matches!(self, FilterOperator::In | FilterOperator::NotIn)
    }
}

impl FromStr for FilterOperator {
    type Err = GridError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for FilterOperator {
    type Error = GridError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<FilterOperator> for String {
    fn from(op: FilterOperator) -> Self {
        op.symbol().to_string()
    }
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// AND/OR combinator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum GroupOperator {
    #[default]
    And,
    Or,
}

impl GroupOperator {
    pub fn parse(value: &str) -> GridResult<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "and" => Ok(GroupOperator::And),
            "or" => Ok(GroupOperator::Or),
            other => Err(GridError::invalid_argument(format!(
                "unknown group operator '{other}'"
            ))),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            GroupOperator::And => "and",
            GroupOperator::Or => "or",
        }
    }
}

impl TryFrom<String> for GroupOperator {
    type Error = GridError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<GroupOperator> for String {
    fn from(op: GroupOperator) -> Self {
        op.as_str().to_string()
    }
}

/// Filter rule value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    Text(String),
    List(Vec<String>),
}

impl FilterValue {
    /// Convert a wire value. Scalars become text, arrays become lists.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Array(items) => {
                FilterValue::List(items.iter().map(crate::value::to_text).collect())
            }
            other => FilterValue::Text(crate::value::to_text(other)),
        }
    }

    /// Scalar form; lists are joined with commas.
    pub fn as_text(&self) -> String {
        match self {
            FilterValue::Text(s) => s.clone(),
            FilterValue::List(items) => items.join(","),
        }
    }

    /// List form: the list itself or a comma-separated text, trimmed, with
    /// empty entries dropped.
    pub fn to_list(&self) -> Vec<String> {
        match self {
            FilterValue::List(items) => items
                .iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            FilterValue::Text(s) => split_list(s),
        }
    }
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        FilterValue::Text(value.to_string())
    }
}

impl From<Vec<&str>> for FilterValue {
    fn from(values: Vec<&str>) -> Self {
        FilterValue::List(values.into_iter().map(str::to_string).collect())
    }
}

/// A single (column, operator, value) rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterRule {
    pub field: String,
    pub operator: FilterOperator,
    pub value: FilterValue,
}

impl FilterRule {
    pub fn new(
        field: impl Into<String>,
        operator: FilterOperator,
        value: impl Into<FilterValue>,
    ) -> Self {
        Self {
            field: field.into(),
            operator,
            value: value.into(),
        }
    }
}

/// A rule set combined by a top-level operator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    pub group_operator: GroupOperator,
    pub rules: Vec<FilterRule>,
}

#[derive(Deserialize)]
struct WireFilter {
    #[serde(rename = "groupOp", default)]
    group_op: Option<String>,
    #[serde(default)]
    rules: Vec<WireRule>,
}

#[derive(Deserialize)]
struct WireRule {
    field: String,
    op: String,
    #[serde(default)]
    data: Value,
}

impl Filter {
    pub fn new(group_operator: GroupOperator, rules: Vec<FilterRule>) -> Self {
        Self {
            group_operator,
            rules,
        }
    }

    /// Decode the widget's `filters` parameter.
    pub fn from_wire(json: &str) -> GridResult<Self> {
        let wire: WireFilter = serde_json::from_str(json)
            .map_err(|e| GridError::invalid_argument(format!("malformed filters payload: {e}")))?;

        let group_operator = match wire.group_op.as_deref() {
            Some(op) if !op.trim().is_empty() => GroupOperator::parse(op)?,
            _ => GroupOperator::And,
        };

        let rules = wire
            .rules
            .into_iter()
            .map(|rule| {
                Ok(FilterRule {
                    field: rule.field,
                    operator: FilterOperator::parse(&rule.op)?,
                    value: FilterValue::from_json(&rule.data),
                })
            })
            .collect::<GridResult<Vec<_>>>()?;

        Ok(Self {
            group_operator,
            rules,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Split free text into distinct words, keeping first-seen order.
pub fn split_words(text: &str) -> Vec<String> {
    let mut words: Vec<String> = Vec::new();
    for word in text.split_whitespace() {
        if !words.iter().any(|w| w == word) {
            words.push(word.to_string());
        }
    }
    words
}

/// Split a comma-separated list, trimming entries and dropping empties.
pub fn split_list(text: &str) -> Vec<String> {
    text.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
