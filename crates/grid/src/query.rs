//! Per-request paging, sorting and filtering parameters.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::GridError;
use crate::filter::Filter;

/// Page request (1-based page number).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageSpec {
    pub page: i64,
    pub rows: i64,
}

impl PageSpec {
    pub fn new(page: i64, rows: i64) -> Self {
        Self { page, rows }
    }

    /// Row offset of the first item on the page, never negative.
    pub fn offset(&self) -> u64 {
        self.rows
            .max(0)
            .saturating_mul(self.page.saturating_sub(1))
            .max(0) as u64
    }

    /// Page size, never negative.
    pub fn limit(&self) -> u64 {
        self.rows.max(0) as u64
    }

    /// Number of pages needed for `records` rows.
    pub fn total_pages(&self, records: u64) -> u64 {
        if self.rows <= 0 {
            return if records > 0 { 1 } else { 0 };
        }
        records.div_ceil(self.rows as u64)
    }
}

impl Default for PageSpec {
    fn default() -> Self {
        Self { page: 1, rows: 20 }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    /// Strict parse of `asc`/`desc` (case-insensitive).
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "asc" => Some(SortDirection::Asc),
            "desc" => Some(SortDirection::Desc),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortDirection {
    type Err = GridError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value).ok_or_else(|| {
            GridError::UnexpectedValue(format!("sort direction must be asc or desc, got '{value}'"))
        })
    }
}

/// Ordered column → direction list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    entries: Vec<(String, SortDirection)>,
}

impl SortSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a column; a column already present keeps its position and takes
    /// the new direction.
    pub fn push(&mut self, column: impl Into<String>, direction: SortDirection) {
        let column = column.into();
        match self.entries.iter_mut().find(|(c, _)| *c == column) {
            Some(entry) => entry.1 = direction,
            None => self.entries.push((column, direction)),
        }
    }

    pub fn with(mut self, column: impl Into<String>, direction: SortDirection) -> Self {
        self.push(column, direction);
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, SortDirection)> {
        self.entries.iter().map(|(c, d)| (c.as_str(), *d))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Everything an adapter needs to fetch one page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GridQuery {
    pub page: PageSpec,
    pub sort: SortSpec,
    pub filter: Filter,
}
