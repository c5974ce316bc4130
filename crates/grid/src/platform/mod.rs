//! Wire protocol platforms.
//!
//! A platform decodes the client widget's request parameters into a
//! [`GridQuery`] and encodes the fetched page back into the payload the
//! widget expects.

mod jqgrid;

pub use jqgrid::JqGridPlatform;

use serde_json::Value;

use crate::adapter::ResultSet;
use crate::column::ColumnCollection;
use crate::error::GridResult;
use crate::projector::ProjectedRow;
use crate::query::{GridQuery, SortSpec};
use crate::request::RequestContext;

/// Default page size.
pub const DEFAULT_ROWS: i64 = 20;

/// Page sizes a client may request.
pub const DEFAULT_ROW_LIST: [i64; 4] = [10, 20, 50, 100];

/// Paging and sorting defaults for a platform.
#[derive(Debug, Clone, PartialEq)]
pub struct PlatformOptions {
    /// Page size when the request names none, or one outside `row_list`.
    pub rows: i64,

    /// Allowed page sizes.
    pub row_list: Vec<i64>,

    /// Sort applied when the request carries no valid sort.
    pub default_sort: SortSpec,
}

impl Default for PlatformOptions {
    fn default() -> Self {
        Self {
            rows: DEFAULT_ROWS,
            row_list: DEFAULT_ROW_LIST.to_vec(),
            default_sort: SortSpec::new(),
        }
    }
}

/// Decodes requests and encodes responses for one client widget.
pub trait Platform: Send + Sync {
    /// Resolve paging, sorting and filtering from request parameters.
    fn resolve(&self, context: &RequestContext, columns: &ColumnCollection)
    -> GridResult<GridQuery>;

    /// Render the response payload for a fetched page.
    fn render(&self, query: &GridQuery, result: &ResultSet, rows: &[ProjectedRow]) -> Value;

    fn options(&self) -> &PlatformOptions;
}
