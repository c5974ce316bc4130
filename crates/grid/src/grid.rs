//! Grid orchestrator.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use crate::adapter::Adapter;
use crate::column::{Column, ColumnCollection};
use crate::error::{GridError, GridResult};
use crate::platform::{JqGridPlatform, Platform};
use crate::projector::Projector;
use crate::query::GridQuery;
use crate::request::RequestContext;
use crate::storage::{Storage, storage_key};

/// Default identifier of the row id.
pub const DEFAULT_ID_COLUMN: &str = "id";

/// A configured grid: columns, data adapter, wire platform and optional
/// parameter storage.
pub struct Grid {
    name: String,
    columns: ColumnCollection,
    adapter: Box<dyn Adapter>,
    platform: Box<dyn Platform>,
    storage: Option<Arc<dyn Storage>>,
    id_column: Option<String>,
    last_query: Option<GridQuery>,
}

impl std::fmt::Debug for Grid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Grid")
            .field("name", &self.name)
            .field("columns", &self.columns.names())
            .field("id_column", &self.id_column)
            .finish()
    }
}

impl Grid {
    pub fn builder(name: impl Into<String>) -> GridBuilder {
        GridBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &ColumnCollection {
        &self.columns
    }

    pub fn platform(&self) -> &dyn Platform {
        self.platform.as_ref()
    }

    /// Query resolved by the most recent [`fetch`](Self::fetch).
    pub fn last_query(&self) -> Option<&GridQuery> {
        self.last_query.as_ref()
    }

    /// Filtered row count of the most recent fetch.
    pub fn count_of_items(&self) -> u64 {
        self.adapter.count_of_items()
    }

    /// Unfiltered row count of the most recent fetch.
    pub fn count_of_items_total(&self) -> u64 {
        self.adapter.count_of_items_total()
    }

    /// Serve one request.
    ///
    /// Request parameters are merged over the stored ones, resolved by the
    /// platform, fetched through the adapter, projected onto the columns
    /// and rendered. The merged parameters are stored for the next request.
    pub async fn fetch(&mut self, params: &HashMap<String, String>) -> GridResult<Value> {
        let context = self.request_context(params).await?;
        let query = self.platform.resolve(&context, &self.columns)?;

        debug!(
            grid = %self.name,
            page = query.page.page,
            rows = query.page.rows,
            rules = query.filter.rules.len(),
            "fetching grid page"
        );

        let result = self.adapter.fetch_data(&query, &self.columns).await?;
        let rows = Projector::new(&self.columns)
            .with_id(self.id_column.as_deref())
            .project(&result.rows);
        let payload = self.platform.render(&query, &result, &rows);

        debug!(
            grid = %self.name,
            records = result.count_of_items,
            total = result.count_of_items_total,
            "grid page fetched"
        );

        if let Some(storage) = &self.storage {
            storage
                .write(&storage_key(&self.name), context.to_storage()?)
                .await?;
        }
        self.last_query = Some(query);

        Ok(payload)
    }

    /// Forget the stored parameters of this grid.
    pub async fn reset(&self) -> GridResult<()> {
        match &self.storage {
            Some(storage) => storage.clear(&storage_key(&self.name)).await,
            None => Ok(()),
        }
    }

    async fn request_context(
        &self,
        params: &HashMap<String, String>,
    ) -> GridResult<RequestContext> {
        let stored = match &self.storage {
            Some(storage) => match storage.read(&storage_key(&self.name)).await? {
                Some(content) => match RequestContext::from_storage(&content) {
                    Ok(stored) => Some(stored),
                    Err(e) => {
                        warn!(
                            grid = %self.name,
                            error = %e,
                            "discarding unreadable stored parameters"
                        );
                        None
                    }
                },
                None => None,
            },
            None => None,
        };

        Ok(RequestContext::merge(&self.name, params, stored))
    }
}

/// Builder for [`Grid`].
pub struct GridBuilder {
    name: String,
    columns: Vec<Column>,
    adapter: Option<Box<dyn Adapter>>,
    platform: Option<Box<dyn Platform>>,
    storage: Option<Arc<dyn Storage>>,
    id_column: Option<String>,
}

impl GridBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            adapter: None,
            platform: None,
            storage: None,
            id_column: Some(DEFAULT_ID_COLUMN.to_string()),
        }
    }

    pub fn column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }

    pub fn columns(mut self, columns: impl IntoIterator<Item = Column>) -> Self {
        self.columns.extend(columns);
        self
    }

    pub fn adapter(mut self, adapter: impl Adapter + 'static) -> Self {
        self.adapter = Some(Box::new(adapter));
        self
    }

    pub fn boxed_adapter(mut self, adapter: Box<dyn Adapter>) -> Self {
        self.adapter = Some(adapter);
        self
    }

    /// Wire platform; jqGrid with default options when unset.
    pub fn platform(mut self, platform: impl Platform + 'static) -> Self {
        self.platform = Some(Box::new(platform));
        self
    }

    pub fn storage(mut self, storage: Arc<dyn Storage>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Identifier whose value becomes the row id; `None` numbers rows.
    pub fn id_column(mut self, identifier: Option<String>) -> Self {
        self.id_column = identifier;
        self
    }

    pub fn build(self) -> GridResult<Grid> {
        if self.name.trim().is_empty() {
            return Err(GridError::configuration("grid name must not be empty"));
        }
        let adapter = self.adapter.ok_or_else(|| {
            GridError::configuration(format!("grid '{}' has no adapter", self.name))
        })?;
        if self.columns.is_empty() {
            return Err(GridError::configuration(format!(
                "grid '{}' has no columns",
                self.name
            )));
        }

        Ok(Grid {
            columns: ColumnCollection::from_columns(self.columns)?,
            adapter,
            platform: self
                .platform
                .unwrap_or_else(|| Box::new(JqGridPlatform::default())),
            storage: self.storage,
            id_column: self.id_column,
            last_query: None,
            name: self.name,
        })
    }
}
