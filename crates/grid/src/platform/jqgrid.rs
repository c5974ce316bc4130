//! jqGrid wire protocol.
//!
//! Request parameters: `page`, `rows`, `sidx`, `sord`, `_search`, and
//! either `filters` (advanced search JSON) or the single-field triple
//! `searchField`/`searchOper`/`searchString`.
//!
//! Response: `{page, total, records, rows: [{id, cell}], userdata?}`.

use serde_json::{Map, Value, json};
use tracing::{debug, warn};

use super::{Platform, PlatformOptions};
use crate::adapter::ResultSet;
use crate::column::ColumnCollection;
use crate::error::GridResult;
use crate::filter::{Filter, FilterOperator, FilterRule, GroupOperator};
use crate::projector::ProjectedRow;
use crate::query::{GridQuery, PageSpec, SortDirection, SortSpec};
use crate::request::RequestContext;

#[derive(Debug, Clone, Default)]
pub struct JqGridPlatform {
    options: PlatformOptions,
}

impl JqGridPlatform {
    pub fn new(options: PlatformOptions) -> Self {
        Self { options }
    }

    fn resolve_page(&self, context: &RequestContext) -> PageSpec {
        let page = context
            .get("page")
            .and_then(|p| p.trim().parse::<i64>().ok())
            .filter(|p| *p > 0)
            .unwrap_or(1);

        let rows = match context.get("rows").map(|r| r.trim().parse::<i64>()) {
            Some(Ok(rows)) if self.options.row_list.contains(&rows) => rows,
            Some(_) => {
                warn!(
                    rows = context.get("rows").unwrap_or_default(),
                    default = self.options.rows,
                    "page size not allowed, using default"
                );
                self.options.rows
            }
            None => self.options.rows,
        };

        PageSpec::new(page, rows)
    }

    fn resolve_sort(&self, context: &RequestContext, columns: &ColumnCollection) -> SortSpec {
        let sort = match context.get("sidx") {
            Some(sidx) if !sidx.trim().is_empty() => {
                parse_sort(sidx, context.get("sord"), columns)
            }
            _ => SortSpec::new(),
        };

        if sort.is_empty() {
            self.options.default_sort.clone()
        } else {
            sort
        }
    }

    fn resolve_filter(&self, context: &RequestContext) -> GridResult<Filter> {
        if context
            .get("_search")
            .is_some_and(|s| s.eq_ignore_ascii_case("false"))
        {
            return Ok(Filter::default());
        }

        if let Some(filters) = context.get("filters")
            && !filters.trim().is_empty()
        {
            return Filter::from_wire(filters);
        }

        // Single field search
        let field = context.get("searchField");
        if let (Some(field), Some(value)) = (field, context.get("searchString"))
            && !field.is_empty()
        {
            let operator = FilterOperator::parse(context.get("searchOper").unwrap_or("eq"))?;
            return Ok(Filter::new(
                GroupOperator::And,
                vec![FilterRule::new(field, operator, value)],
            ));
        }

        Ok(Filter::default())
    }
}

impl Platform for JqGridPlatform {
    fn resolve(
        &self,
        context: &RequestContext,
        columns: &ColumnCollection,
    ) -> GridResult<GridQuery> {
        Ok(GridQuery {
            page: self.resolve_page(context),
            sort: self.resolve_sort(context, columns),
            filter: self.resolve_filter(context)?,
        })
    }

    fn render(&self, query: &GridQuery, result: &ResultSet, rows: &[ProjectedRow]) -> Value {
        let rows: Vec<Value> = rows
            .iter()
            .map(|row| {
                json!({
                    "id": row.id.clone().unwrap_or_else(|| json!(row.index)),
                    "cell": row.cells,
                })
            })
            .collect();

        let mut payload = Map::new();
        payload.insert("page".to_string(), json!(query.page.page));
        payload.insert(
            "total".to_string(),
            json!(query.page.total_pages(result.count_of_items)),
        );
        payload.insert("records".to_string(), json!(result.count_of_items));
        payload.insert("rows".to_string(), Value::Array(rows));
        if let Some(user_data) = &result.user_data {
            payload.insert("userdata".to_string(), Value::Object(user_data.clone()));
        }

        Value::Object(payload)
    }

    fn options(&self) -> &PlatformOptions {
        &self.options
    }
}

/// Parse a jqGrid sort request.
///
/// `sidx` may list several columns (`"name asc, city"`). The `sord`
/// direction belongs to the last column only; earlier columns are sorted
/// only when they carry their own direction. Unknown, hidden and
/// non-sortable columns are dropped, as is any column whose direction is
/// neither `asc` nor `desc`.
pub fn parse_sort(sidx: &str, sord: Option<&str>, columns: &ColumnCollection) -> SortSpec {
    let parts: Vec<&str> = sidx
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();
    let last = parts.len().saturating_sub(1);

    let mut sort = SortSpec::new();
    for (position, part) in parts.into_iter().enumerate() {
        let mut tokens = part.split_whitespace();
        let Some(name) = tokens.next() else {
            continue;
        };

        let requested = match tokens.next() {
            Some(embedded) => Some(embedded),
            None if position == last => Some(sord.unwrap_or("asc")),
            None => None,
        };
        let Some(requested) = requested else {
            debug!(column = name, "sort column without direction ignored");
            continue;
        };
        let Some(direction) = SortDirection::parse(requested) else {
            debug!(column = name, direction = requested, "invalid sort direction ignored");
            continue;
        };

        match columns.get(name) {
            Some(column) if column.is_sortable() => sort.push(name, direction),
            Some(_) => debug!(column = name, "column not sortable"),
            None => debug!(column = name, "unknown sort column"),
        }
    }

    sort
}
