//! Shared application state.

use std::sync::Arc;

use anyhow::{Context, Result};
use dashmap::DashMap;
use datagrid::{Grid, GridDefinition, GridResult, GridSet, RouteTable, Storage};
use sqlx::PgPool;
use tracing::info;

use crate::config::Config;
use crate::db;

/// Registered grid definitions, keyed by grid name.
pub struct GridRegistry {
    definitions: DashMap<String, Arc<GridDefinition>>,
    routes: RouteTable,
}

impl GridRegistry {
    pub fn new(set: GridSet) -> Self {
        let routes = set.route_table();
        let definitions = DashMap::new();
        for definition in set.grids {
            definitions.insert(definition.name.clone(), Arc::new(definition));
        }
        Self {
            definitions,
            routes,
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<GridDefinition>> {
        self.definitions.get(name).map(|d| Arc::clone(d.value()))
    }

    /// Grid names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.definitions.iter().map(|d| d.key().clone()).collect();
        names.sort();
        names
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Build a fresh grid instance for one request.
    pub fn build(
        &self,
        name: &str,
        db: Option<&PgPool>,
        storage: Arc<dyn Storage>,
    ) -> GridResult<Option<Grid>> {
        let Some(definition) = self.get(name) else {
            return Ok(None);
        };
        let grid = definition
            .builder(&self.routes, db)?
            .storage(storage)
            .build()?;
        Ok(Some(grid))
    }
}

/// Shared application state.
///
/// Wrapped in Arc internally so Clone is cheap.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    /// PostgreSQL connection pool, when configured.
    db: Option<PgPool>,

    grids: GridRegistry,
}

impl AppState {
    /// Load grid definitions and connect to the database if configured.
    pub async fn new(config: &Config) -> Result<Self> {
        let set = GridSet::from_path(&config.grids_path).with_context(|| {
            format!(
                "failed to load grid definitions from {}",
                config.grids_path.display()
            )
        })?;

        let db = match &config.database_url {
            Some(url) => Some(db::create_pool(url, config.database_max_connections).await?),
            None if set.needs_database() => {
                anyhow::bail!("a grid reads from sql but DATABASE_URL is not set");
            }
            None => None,
        };

        info!(
            grids = set.grids.len(),
            database = db.is_some(),
            "grid definitions loaded"
        );

        Ok(Self::from_parts(set, db))
    }

    /// Assemble state from already loaded parts.
    pub fn from_parts(set: GridSet, db: Option<PgPool>) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                db,
                grids: GridRegistry::new(set),
            }),
        }
    }

    pub fn db(&self) -> Option<&PgPool> {
        self.inner.db.as_ref()
    }

    pub fn grids(&self) -> &GridRegistry {
        &self.inner.grids
    }

    /// `None` when no database is configured.
    pub async fn postgres_healthy(&self) -> Option<bool> {
        match self.db() {
            Some(pool) => Some(db::check_health(pool).await),
            None => None,
        }
    }
}
