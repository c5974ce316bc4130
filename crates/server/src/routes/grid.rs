//! Grid data routes.
//!
//! `GET /grid/{name}` answers jqGrid's row requests; the query string is
//! the widget's parameter set (`page`, `rows`, `sidx`, `sord`, `filters`,
//! ...). Parameters are remembered per grid in the caller's session.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
};
use datagrid::ColumnCollection;
use serde::Serialize;
use serde_json::Value;
use tower_sessions::Session;
use tracing::debug;

use crate::error::{AppError, AppResult};
use crate::state::AppState;
use crate::storage::SessionStorage;

/// Create the grid router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/grids", get(list_grids))
        .route("/grid/{name}", get(fetch_grid))
        .route("/grid/{name}/reset", post(reset_grid))
}

// -------------------------------------------------------------------------
// Response types
// -------------------------------------------------------------------------

#[derive(Serialize)]
struct GridSummary {
    name: String,
    rows: i64,
    row_list: Vec<i64>,
    columns: Vec<ColumnSummary>,
}

#[derive(Serialize)]
struct ColumnSummary {
    name: String,
    label: String,
    format: &'static str,
    hidden: bool,
    sortable: bool,
    searchable: bool,
}

// -------------------------------------------------------------------------
// Handlers
// -------------------------------------------------------------------------

/// List configured grids with their column model.
async fn list_grids(State(state): State<AppState>) -> AppResult<Json<Vec<GridSummary>>> {
    let registry = state.grids();
    let mut grids = Vec::new();

    for name in registry.names() {
        let Some(definition) = registry.get(&name) else {
            continue;
        };
        let columns = ColumnCollection::from_columns(definition.build_columns(registry.routes())?)?;
        let options = definition.platform_options()?;

        grids.push(GridSummary {
            name,
            rows: options.rows,
            row_list: options.row_list,
            columns: columns
                .iter()
                .map(|c| ColumnSummary {
                    name: c.name.clone(),
                    label: c.label.clone().unwrap_or_else(|| c.name.clone()),
                    format: c.format(),
                    hidden: c.hidden,
                    sortable: c.is_sortable(),
                    searchable: c.searchable,
                })
                .collect(),
        });
    }

    Ok(Json(grids))
}

/// Serve one page of a grid.
async fn fetch_grid(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    session: Session,
) -> AppResult<Json<Value>> {
    let storage = Arc::new(SessionStorage::new(session));
    let mut grid = state
        .grids()
        .build(&name, state.db(), storage)?
        .ok_or(AppError::NotFound)?;

    debug!(grid = %name, params = params.len(), "grid request");

    Ok(Json(grid.fetch(&params).await?))
}

/// Forget the parameters stored for a grid.
async fn reset_grid(
    State(state): State<AppState>,
    Path(name): Path<String>,
    session: Session,
) -> AppResult<StatusCode> {
    let storage = Arc::new(SessionStorage::new(session));
    let grid = state
        .grids()
        .build(&name, state.db(), storage)?
        .ok_or(AppError::NotFound)?;

    grid.reset().await?;

    Ok(StatusCode::NO_CONTENT)
}
