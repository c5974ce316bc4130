//! Server-driven data grid core.
//!
//! A [`Grid`] ties together a set of declared [`Column`]s, a data
//! [`Adapter`] and a wire [`Platform`]. Per request it resolves paging,
//! sorting and filtering from the client's parameters, lets the adapter
//! fetch the matching page, projects the rows onto the columns and
//! renders the JSON payload the client widget expects.

pub mod adapter;
pub mod column;
pub mod config;
pub mod error;
pub mod filter;
pub mod grid;
pub mod platform;
pub mod projector;
pub mod query;
pub mod request;
pub mod storage;
pub mod value;

pub use adapter::{
    Adapter, ArrayAdapter, ResultSet, SourceStatement, SqlAdapter, SqlQueryBuilder, SqlSource,
};
pub use column::{
    Button, ButtonFactory, Column, ColumnCollection, ColumnKind, RouteTable, SearchType,
    SummaryType,
};
pub use config::{ColumnDefinition, GridDefinition, GridSet, SourceDefinition};
pub use error::{GridError, GridResult};
pub use filter::{
    Filter, FilterOperator, FilterPlan, FilterRule, FilterValue, GroupOperator, Predicate,
};
pub use grid::{Grid, GridBuilder};
pub use platform::{JqGridPlatform, Platform, PlatformOptions};
pub use projector::{ProjectedRow, Projector};
pub use query::{GridQuery, PageSpec, SortDirection, SortSpec};
pub use request::RequestContext;
pub use storage::{MemoryStorage, Storage};
