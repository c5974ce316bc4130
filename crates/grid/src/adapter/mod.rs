//! Data adapters.
//!
//! An adapter owns a data source and, given the resolved [`GridQuery`],
//! returns the filtered, sorted page of raw rows plus the counts the
//! platform needs. Two strategies share the predicate tree built by
//! [`FilterPlan`](crate::FilterPlan):
//! - [`ArrayAdapter`]: in-memory rows, evaluated row by row
//! - [`SqlAdapter`]: sea-query statements executed on PostgreSQL

mod array;
mod sql;

pub use array::ArrayAdapter;
pub use sql::{SourceStatement, SqlAdapter, SqlQueryBuilder, SqlSource};
pub(crate) use sql::identifier_expr;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::debug;

use crate::column::ColumnCollection;
use crate::error::GridResult;
use crate::query::{GridQuery, SortDirection, SortSpec};

/// Rows fetched for one page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    /// Raw rows of the current page, in order.
    pub rows: Vec<Value>,

    /// Summary values keyed by column name.
    pub user_data: Option<Map<String, Value>>,

    /// Rows matching the filter (before paging).
    pub count_of_items: u64,

    /// Rows in the source (before filtering).
    pub count_of_items_total: u64,
}

/// Data source behind a grid.
#[async_trait]
pub trait Adapter: Send + Sync {
    /// Fetch the page described by `query`.
    async fn fetch_data(
        &mut self,
        query: &GridQuery,
        columns: &ColumnCollection,
    ) -> GridResult<ResultSet>;

    /// Filtered row count of the last fetch.
    fn count_of_items(&self) -> u64;

    /// Unfiltered row count of the last fetch.
    fn count_of_items_total(&self) -> u64;
}

/// Expand a sort spec into physical (identifier, direction) terms.
///
/// Unknown, non-sortable and hidden columns are dropped; concat columns
/// contribute one term per identifier.
pub(crate) fn sort_terms(
    sort: &SortSpec,
    columns: &ColumnCollection,
) -> Vec<(String, SortDirection)> {
    let mut terms = Vec::new();
    for (name, direction) in sort.iter() {
        match columns.get(name) {
            Some(column) if column.is_sortable() => {
                terms.extend(
                    column
                        .identifiers()
                        .into_iter()
                        .map(|identifier| (identifier.to_string(), direction)),
                );
            }
            _ => debug!(column = %name, "sort on unknown or unsortable column ignored"),
        }
    }
    terms
}
