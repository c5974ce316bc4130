//! Column descriptors.
//!
//! A column names a value in the rendered row and carries the metadata the
//! grid needs to filter, sort and format it. Most columns read a single
//! identifier; concat columns read several and fan filters and sorts out
//! to each of them.

mod button;

pub use button::{Button, ButtonFactory, RouteTable};

use chrono::format::{Item, StrftimeItems};
use serde::{Deserialize, Serialize};

use crate::error::{GridError, GridResult};
use crate::filter::GroupOperator;

/// Date layout used by the storage backends.
pub const STORAGE_DATE_FORMAT: &str = "%Y-%m-%d";

/// Default date layout for display and for user-typed filter values.
pub const DEFAULT_DATE_FORMAT: &str = "%d.%m.%Y";

/// Reject a strftime pattern chrono cannot interpret.
pub fn validate_date_format(format: &str) -> GridResult<()> {
    if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
        return Err(GridError::configuration(format!(
            "invalid date format '{format}'"
        )));
    }
    Ok(())
}

/// Column rendering kinds.
#[derive(Debug, Clone)]
pub enum ColumnKind {
    /// Plain value.
    Text,
    /// Date value, rendered with `display_format`; filter values are typed
    /// in `input_format`.
    Date {
        display_format: String,
        input_format: String,
    },
    /// Numeric value with optional scaling.
    Number {
        multiplier: Option<f64>,
        divisor: Option<f64>,
        decimals: Option<usize>,
    },
    /// Several identifiers joined with a separator.
    Concat {
        identifiers: Vec<String>,
        separator: String,
    },
    /// Anchor markup; `href` and `text` may carry `%field%` placeholders.
    Link { href: String, text: String },
    /// Button markup.
    Buttons {
        buttons: Vec<Button>,
        separator: String,
    },
}

impl ColumnKind {
    /// Date kind with the default layouts.
    pub fn date() -> Self {
        ColumnKind::Date {
            display_format: DEFAULT_DATE_FORMAT.to_string(),
            input_format: DEFAULT_DATE_FORMAT.to_string(),
        }
    }
}

/// Which SQL clause a column's filter predicates are routed to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchType {
    #[default]
    Where,
    Having,
}

/// Aggregation for the summary (user data) row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SummaryType {
    Sum,
    Min,
    Max,
    Count,
}

/// A grid column.
#[derive(Debug, Clone)]
pub struct Column {
    /// Unique key of the column within its grid.
    pub name: String,

    /// Source field path; defaults to `name`.
    pub identifier: Option<String>,

    /// Header label.
    pub label: Option<String>,

    pub kind: ColumnKind,

    pub searchable: bool,

    pub sortable: bool,

    pub hidden: bool,

    /// Combinator for several rules on this column.
    pub search_group_operator: GroupOperator,

    pub search_type: SearchType,

    pub summary_type: Option<SummaryType>,

    /// Higher priority columns come first.
    pub priority: i32,
}

impl Column {
    /// Create a column of the given kind with default flags.
    pub fn new(name: impl Into<String>, kind: ColumnKind) -> Self {
        Self {
            name: name.into(),
            identifier: None,
            label: None,
            kind,
            searchable: true,
            sortable: true,
            hidden: false,
            search_group_operator: GroupOperator::Or,
            search_type: SearchType::Where,
            summary_type: None,
            priority: 0,
        }
    }

    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, ColumnKind::Text)
    }

    pub fn date(name: impl Into<String>) -> Self {
        Self::new(name, ColumnKind::date())
    }

    pub fn number(name: impl Into<String>) -> Self {
        Self::new(
            name,
            ColumnKind::Number {
                multiplier: None,
                divisor: None,
                decimals: None,
            },
        )
    }

    /// Concat column over several identifiers.
    pub fn concat<I, S>(name: impl Into<String>, identifiers: I, separator: &str) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            name,
            ColumnKind::Concat {
                identifiers: identifiers.into_iter().map(Into::into).collect(),
                separator: separator.to_string(),
            },
        )
    }

    pub fn link(name: impl Into<String>, href: &str, text: &str) -> Self {
        Self::new(
            name,
            ColumnKind::Link {
                href: href.to_string(),
                text: text.to_string(),
            },
        )
    }

    /// Button column; not searchable and not sortable.
    pub fn buttons(name: impl Into<String>, buttons: Vec<Button>) -> Self {
        let mut column = Self::new(
            name,
            ColumnKind::Buttons {
                buttons,
                separator: " ".to_string(),
            },
        );
        column.searchable = false;
        column.sortable = false;
        column
    }

    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn searchable(mut self, searchable: bool) -> Self {
        self.searchable = searchable;
        self
    }

    pub fn sortable(mut self, sortable: bool) -> Self {
        self.sortable = sortable;
        self
    }

    pub fn hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }

    pub fn with_search_group_operator(mut self, operator: GroupOperator) -> Self {
        self.search_group_operator = operator;
        self
    }

    pub fn with_search_type(mut self, search_type: SearchType) -> Self {
        self.search_type = search_type;
        self
    }

    pub fn with_summary(mut self, summary_type: SummaryType) -> Self {
        self.summary_type = Some(summary_type);
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Source identifiers: the concat list, or the single identifier
    /// falling back to the column name.
    pub fn identifiers(&self) -> Vec<&str> {
        match &self.kind {
            ColumnKind::Concat { identifiers, .. } if !identifiers.is_empty() => {
                identifiers.iter().map(String::as_str).collect()
            }
            _ => vec![self.identifier.as_deref().unwrap_or(&self.name)],
        }
    }

    /// Primary identifier (the first one for concat columns).
    pub fn primary_identifier(&self) -> &str {
        match &self.kind {
            ColumnKind::Concat { identifiers, .. } if !identifiers.is_empty() => &identifiers[0],
            _ => self.identifier.as_deref().unwrap_or(&self.name),
        }
    }

    /// Link and button columns render markup that may carry `%identifier%`
    /// placeholders; other kinds render data as-is.
    pub fn is_markup(&self) -> bool {
        matches!(self.kind, ColumnKind::Link { .. } | ColumnKind::Buttons { .. })
    }

    pub fn is_concat(&self) -> bool {
        matches!(&self.kind, ColumnKind::Concat { identifiers, .. } if identifiers.len() > 1)
    }

    /// Input layout for date filter values, if this is a date column.
    pub fn date_input_format(&self) -> Option<&str> {
        match &self.kind {
            ColumnKind::Date { input_format, .. } => Some(input_format),
            _ => None,
        }
    }

    /// Format tag reported to clients (`date`, `number`, ...).
    pub fn format(&self) -> &'static str {
        match &self.kind {
            ColumnKind::Text => "text",
            ColumnKind::Date { .. } => "date",
            ColumnKind::Number { .. } => "number",
            ColumnKind::Concat { .. } => "concat",
            ColumnKind::Link { .. } => "link",
            ColumnKind::Buttons { .. } => "buttons",
        }
    }

    /// Whether a client may sort on this column.
    pub fn is_sortable(&self) -> bool {
        self.sortable && !self.hidden
    }
}

/// Ordered, name-unique set of columns.
#[derive(Debug, Clone, Default)]
pub struct ColumnCollection {
    columns: Vec<Column>,
}

impl ColumnCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a collection, rejecting duplicate names.
    pub fn from_columns(columns: impl IntoIterator<Item = Column>) -> GridResult<Self> {
        let mut collection = Self::new();
        for column in columns {
            collection.add(column)?;
        }
        Ok(collection)
    }

    /// Insert a column behind every column of equal or higher priority.
    pub fn add(&mut self, column: Column) -> GridResult<()> {
        if column.name.is_empty() {
            return Err(GridError::configuration("column name must not be empty"));
        }
        if self.get(&column.name).is_some() {
            return Err(GridError::configuration(format!(
                "duplicate column '{}'",
                column.name
            )));
        }
        let position = self
            .columns
            .iter()
            .position(|c| c.priority < column.priority)
            .unwrap_or(self.columns.len());
        self.columns.insert(position, column);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Columns in priority order.
    pub fn iter(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}
