//! Declarative grid definitions.
//!
//! Grids are described in YAML (JSON is accepted too, being a subset):
//!
//! ```yaml
//! routes:
//!   user_edit: /users/edit
//! grids:
//!   - name: users
//!     default_sort: "name asc"
//!     row_list: [10, 20, 50]
//!     source:
//!       type: sql
//!       selects:
//!         - table: users
//!           alias: u
//!           columns: [u.id, u.name, u.created]
//!       baseline_order: "id desc"
//!     columns:
//!       - name: name
//!         identifier: u.name
//!       - name: created
//!         format: date
//!       - name: actions
//!         format: buttons
//!         buttons:
//!           - type: route
//!             label: Edit
//!             route: user_edit
//!             params: { id: "%id%" }
//! ```
//!
//! Button type tags and route names are checked while the set is loaded.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use sea_query::{Alias, Asterisk, Expr, JoinType, Query, SelectStatement};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::PgPool;
use tracing::debug;

use crate::adapter::{Adapter, ArrayAdapter, SqlAdapter, SqlSource, identifier_expr};
use crate::column::{
    ButtonFactory, Column, ColumnKind, DEFAULT_DATE_FORMAT, RouteTable, SearchType, SummaryType,
    validate_date_format,
};
use crate::error::{GridError, GridResult};
use crate::filter::GroupOperator;
use crate::grid::{DEFAULT_ID_COLUMN, GridBuilder};
use crate::platform::{DEFAULT_ROW_LIST, DEFAULT_ROWS, JqGridPlatform, PlatformOptions};
use crate::query::{SortDirection, SortSpec};

/// A named collection of grid definitions sharing one route table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GridSet {
    /// Route name to path template, used by `route` buttons.
    #[serde(default)]
    pub routes: HashMap<String, String>,

    #[serde(default)]
    pub grids: Vec<GridDefinition>,
}

impl GridSet {
    /// Parse and validate a grid set.
    pub fn from_yaml(content: &str) -> GridResult<Self> {
        let set: GridSet = serde_yml::from_str(content)?;
        set.validate()?;
        Ok(set)
    }

    /// Read, parse and validate a grid set file.
    pub fn from_path(path: impl AsRef<Path>) -> GridResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Check names are unique and every grid's columns can be built.
    pub fn validate(&self) -> GridResult<()> {
        let routes = self.route_table();
        let mut seen = HashSet::new();
        for grid in &self.grids {
            if !seen.insert(grid.name.as_str()) {
                return Err(GridError::configuration(format!(
                    "duplicate grid '{}'",
                    grid.name
                )));
            }
            grid.validate(&routes)?;
        }
        debug!(grids = self.grids.len(), "grid definitions validated");
        Ok(())
    }

    pub fn route_table(&self) -> RouteTable {
        RouteTable::from(self.routes.clone())
    }

    pub fn get(&self, name: &str) -> Option<&GridDefinition> {
        self.grids.iter().find(|g| g.name == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.grids.iter().map(|g| g.name.as_str()).collect()
    }

    /// Whether any grid reads from a database.
    pub fn needs_database(&self) -> bool {
        self.grids
            .iter()
            .any(|g| matches!(g.source, SourceDefinition::Sql { .. }))
    }
}

/// One grid: columns, data source and paging defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GridDefinition {
    pub name: String,

    /// Identifier of the row id; rows are numbered when absent from a row.
    #[serde(default = "default_id_column")]
    pub id_column: Option<String>,

    /// Sort used when the request carries none, e.g. `"name asc, id desc"`.
    #[serde(default)]
    pub default_sort: Option<String>,

    #[serde(default)]
    pub rows: Option<i64>,

    #[serde(default)]
    pub row_list: Option<Vec<i64>>,

    pub columns: Vec<ColumnDefinition>,

    pub source: SourceDefinition,
}

fn default_id_column() -> Option<String> {
    Some(DEFAULT_ID_COLUMN.to_string())
}

impl GridDefinition {
    pub fn from_yaml(content: &str) -> GridResult<Self> {
        Ok(serde_yml::from_str(content)?)
    }

    fn validate(&self, routes: &RouteTable) -> GridResult<()> {
        if self.name.trim().is_empty() {
            return Err(GridError::configuration("grid name must not be empty"));
        }
        let columns = self.build_columns(routes)?;
        if columns.is_empty() {
            return Err(GridError::configuration(format!(
                "grid '{}' has no columns",
                self.name
            )));
        }
        self.platform_options()?;
        if let SourceDefinition::Sql { selects, .. } = &self.source
            && selects.is_empty()
        {
            return Err(GridError::configuration(format!(
                "grid '{}' has an empty sql source",
                self.name
            )));
        }
        Ok(())
    }

    pub fn build_columns(&self, routes: &RouteTable) -> GridResult<Vec<Column>> {
        let factory = ButtonFactory::new(routes);
        self.columns
            .iter()
            .map(|c| c.to_column(&factory))
            .collect()
    }

    pub fn platform_options(&self) -> GridResult<PlatformOptions> {
        let row_list = self
            .row_list
            .clone()
            .unwrap_or_else(|| DEFAULT_ROW_LIST.to_vec());
        let rows = self.rows.unwrap_or(DEFAULT_ROWS);
        if rows <= 0 || row_list.iter().any(|r| *r <= 0) {
            return Err(GridError::configuration(format!(
                "grid '{}': page sizes must be positive",
                self.name
            )));
        }

        let default_sort = match &self.default_sort {
            Some(sort) => parse_default_sort(sort)?,
            None => SortSpec::new(),
        };
        for (column, _) in default_sort.iter() {
            if !self.columns.iter().any(|c| c.name == column) {
                return Err(GridError::configuration(format!(
                    "grid '{}': default sort names unknown column '{column}'",
                    self.name
                )));
            }
        }

        Ok(PlatformOptions {
            rows,
            row_list,
            default_sort,
        })
    }

    /// Build the adapter for this grid's source.
    pub fn build_adapter(&self, pool: Option<&PgPool>) -> GridResult<Box<dyn Adapter>> {
        match &self.source {
            SourceDefinition::Array { rows } => Ok(Box::new(ArrayAdapter::new(rows.clone()))),
            SourceDefinition::Sql {
                selects,
                distinct,
                baseline_order,
            } => {
                let pool = pool.ok_or_else(|| {
                    GridError::configuration(format!(
                        "grid '{}' reads from sql but no database is configured",
                        self.name
                    ))
                })?;

                let statements = selects
                    .iter()
                    .map(SelectDefinition::to_statement)
                    .collect::<Vec<_>>();
                let mut source = match statements.len() {
                    0 => {
                        return Err(GridError::configuration(format!(
                            "grid '{}' has an empty sql source",
                            self.name
                        )));
                    }
                    1 => statements
                        .into_iter()
                        .next()
                        .map(SqlSource::select)
                        .ok_or_else(|| GridError::configuration("empty sql source"))?,
                    _ => SqlSource::combine(statements, *distinct),
                };
                if let Some(order) = baseline_order {
                    for (identifier, direction) in parse_default_sort(order)?.iter() {
                        source = source.order_by(identifier, direction);
                    }
                }

                let adapter = SqlAdapter::new(pool.clone()).with_source(source);
                Ok(Box::new(adapter))
            }
        }
    }

    /// Builder carrying everything but storage.
    pub fn builder(&self, routes: &RouteTable, pool: Option<&PgPool>) -> GridResult<GridBuilder> {
        Ok(GridBuilder::new(&self.name)
            .columns(self.build_columns(routes)?)
            .boxed_adapter(self.build_adapter(pool)?)
            .platform(JqGridPlatform::new(self.platform_options()?))
            .id_column(self.id_column.clone()))
    }
}

/// Parse `"name asc, id desc"`; a missing direction means `asc`.
fn parse_default_sort(value: &str) -> GridResult<SortSpec> {
    let mut sort = SortSpec::new();
    for part in value.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let mut tokens = part.split_whitespace();
        let Some(column) = tokens.next() else {
            continue;
        };
        let direction = match tokens.next() {
            Some(d) => d.parse::<SortDirection>()?,
            None => SortDirection::Asc,
        };
        sort.push(column, direction);
    }
    Ok(sort)
}

/// Where a grid's rows come from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceDefinition {
    /// Inline rows.
    Array {
        #[serde(default)]
        rows: Vec<Value>,
    },
    /// One SELECT, or several combined with UNION.
    Sql {
        selects: Vec<SelectDefinition>,
        #[serde(default)]
        distinct: bool,
        /// Ordering appended after the grid's sort.
        #[serde(default)]
        baseline_order: Option<String>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SelectDefinition {
    pub table: String,

    #[serde(default)]
    pub alias: Option<String>,

    /// Selected columns; `t.c` qualifies, expressions pass through verbatim.
    #[serde(default)]
    pub columns: Vec<String>,

    #[serde(default)]
    pub joins: Vec<JoinDefinition>,

    #[serde(default)]
    pub group_by: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JoinDefinition {
    pub table: String,

    #[serde(default)]
    pub alias: Option<String>,

    /// Raw join condition, e.g. `o.user_id = u.id`.
    pub on: String,

    #[serde(default)]
    pub kind: JoinKind,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinKind {
    Inner,
    #[default]
    Left,
    Right,
}

impl SelectDefinition {
    pub fn to_statement(&self) -> SelectStatement {
        let mut select = Query::select();
        match &self.alias {
            Some(alias) => select.from_as(Alias::new(&self.table), Alias::new(alias)),
            None => select.from(Alias::new(&self.table)),
        };

        if self.columns.is_empty() {
            select.column(Asterisk);
        }
        for column in &self.columns {
            if column == "*" {
                select.column(Asterisk);
            } else if column.contains('(') || column.contains(' ') {
                select.expr(Expr::cust(column.clone()));
            } else if let Some((table, name)) = column.split_once('.') {
                select.column((Alias::new(table), Alias::new(name)));
            } else {
                select.column(Alias::new(column));
            }
        }

        for join in &self.joins {
            let join_type = match join.kind {
                JoinKind::Inner => JoinType::InnerJoin,
                JoinKind::Left => JoinType::LeftJoin,
                JoinKind::Right => JoinType::RightJoin,
            };
            match &join.alias {
                Some(alias) => select.join_as(
                    join_type,
                    Alias::new(&join.table),
                    Alias::new(alias),
                    Expr::cust(join.on.clone()),
                ),
                None => select.join(
                    join_type,
                    Alias::new(&join.table),
                    Expr::cust(join.on.clone()),
                ),
            };
        }

        if !self.group_by.is_empty() {
            select.add_group_by(
                self.group_by
                    .iter()
                    .map(String::as_str)
                    .map(identifier_expr)
                    .collect::<Vec<_>>(),
            );
        }

        select
    }
}

/// Serialized column description.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ColumnDefinition {
    pub name: String,

    #[serde(default)]
    pub identifier: Option<String>,

    #[serde(default)]
    pub label: Option<String>,

    /// `text` (default), `date`, `number`, `concat`, `link` or `buttons`.
    #[serde(default)]
    pub format: Option<String>,

    #[serde(default)]
    pub display_format: Option<String>,
    #[serde(default)]
    pub input_format: Option<String>,

    #[serde(default)]
    pub multiplier: Option<f64>,
    #[serde(default)]
    pub divisor: Option<f64>,
    #[serde(default)]
    pub decimals: Option<usize>,

    #[serde(default)]
    pub identifiers: Vec<String>,
    #[serde(default)]
    pub separator: Option<String>,

    #[serde(default)]
    pub href: Option<String>,
    #[serde(default)]
    pub text: Option<String>,

    /// Button option maps, each with a `type` tag.
    #[serde(default)]
    pub buttons: Vec<Value>,

    #[serde(default)]
    pub searchable: Option<bool>,
    #[serde(default)]
    pub sortable: Option<bool>,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub search_group_operator: Option<GroupOperator>,
    #[serde(default)]
    pub search_type: Option<SearchType>,
    #[serde(default)]
    pub summary_type: Option<SummaryType>,
    #[serde(default)]
    pub priority: i32,
}

impl ColumnDefinition {
    pub fn to_column(&self, buttons: &ButtonFactory<'_>) -> GridResult<Column> {
        let kind = match self.format.as_deref().unwrap_or("text") {
            "text" => ColumnKind::Text,
            "date" => {
                let display_format = self
                    .display_format
                    .clone()
                    .unwrap_or_else(|| DEFAULT_DATE_FORMAT.to_string());
                let input_format = self
                    .input_format
                    .clone()
                    .unwrap_or_else(|| DEFAULT_DATE_FORMAT.to_string());
                for format in [&display_format, &input_format] {
                    validate_date_format(format).map_err(|_| {
                        GridError::configuration(format!(
                            "column '{}' has an invalid date format '{format}'",
                            self.name
                        ))
                    })?;
                }
                ColumnKind::Date {
                    display_format,
                    input_format,
                }
            }
            "number" => ColumnKind::Number {
                multiplier: self.multiplier,
                divisor: self.divisor,
                decimals: self.decimals,
            },
            "concat" => {
                if self.identifiers.is_empty() {
                    return Err(GridError::configuration(format!(
                        "concat column '{}' requires identifiers",
                        self.name
                    )));
                }
                ColumnKind::Concat {
                    identifiers: self.identifiers.clone(),
                    separator: self.separator.clone().unwrap_or_else(|| " ".to_string()),
                }
            }
            "link" => ColumnKind::Link {
                href: self.href.clone().ok_or_else(|| {
                    GridError::configuration(format!(
                        "link column '{}' requires an href",
                        self.name
                    ))
                })?,
                text: self.text.clone().unwrap_or_default(),
            },
            "buttons" => {
                let built = self
                    .buttons
                    .iter()
                    .map(|options| {
                        let tag = options.get("type").and_then(Value::as_str).ok_or_else(|| {
                            GridError::configuration(format!(
                                "button in column '{}' requires a type",
                                self.name
                            ))
                        })?;
                        buttons.create(tag, options)
                    })
                    .collect::<GridResult<Vec<_>>>()?;
                ColumnKind::Buttons {
                    buttons: built,
                    separator: self.separator.clone().unwrap_or_else(|| " ".to_string()),
                }
            }
            other => {
                return Err(GridError::configuration(format!(
                    "column '{}' has unknown format '{other}'",
                    self.name
                )));
            }
        };

        let is_buttons = matches!(kind, ColumnKind::Buttons { .. });
        let mut column = Column::new(&self.name, kind)
            .searchable(self.searchable.unwrap_or(!is_buttons))
            .sortable(self.sortable.unwrap_or(!is_buttons))
            .hidden(self.hidden)
            .with_priority(self.priority);
        column.identifier = self.identifier.clone();
        column.label = self.label.clone();
        if let Some(operator) = self.search_group_operator {
            column = column.with_search_group_operator(operator);
        }
        if let Some(search_type) = self.search_type {
            column = column.with_search_type(search_type);
        }
        column.summary_type = self.summary_type;

        Ok(column)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use sea_query::PostgresQueryBuilder;

    const USERS: &str = r#"
routes:
  user_edit: /users/edit
grids:
  - name: users
    default_sort: "name desc"
    rows: 10
    row_list: [10, 25]
    source:
      type: array
      rows:
        - { id: 1, name: Ada, created: "2024-01-02" }
    columns:
      - name: name
        search_group_operator: and
      - name: created
        format: date
        display_format: "%Y/%m/%d"
      - name: amount
        format: number
        decimals: 2
        summary_type: sum
        search_type: having
      - name: actions
        format: buttons
        buttons:
          - type: route
            label: Edit
            route: user_edit
            params: { id: "%id%" }
"#;

    #[test]
    fn parses_grid_set() {
        let set = GridSet::from_yaml(USERS).unwrap();
        assert_eq!(set.names(), vec!["users"]);
        assert!(!set.needs_database());

        let grid = set.get("users").unwrap();
        let columns = grid.build_columns(&set.route_table()).unwrap();
        assert_eq!(columns.len(), 4);
        assert_eq!(columns[0].search_group_operator, GroupOperator::And);
        assert_eq!(columns[1].format(), "date");
        assert_eq!(columns[2].search_type, SearchType::Having);
        assert_eq!(columns[2].summary_type, Some(SummaryType::Sum));
        assert!(!columns[3].searchable);
        assert!(!columns[3].sortable);

        let options = grid.platform_options().unwrap();
        assert_eq!(options.rows, 10);
        assert_eq!(options.row_list, vec![10, 25]);
        assert_eq!(
            options.default_sort,
            SortSpec::new().with("name", SortDirection::Desc)
        );
    }

    #[test]
    fn unknown_button_type_rejected_at_load() {
        let yaml = USERS.replace("type: route", "type: dropdown");
        let result = GridSet::from_yaml(&yaml);
        assert!(matches!(result, Err(GridError::Configuration(_))));
    }

    #[test]
    fn unknown_route_rejected_at_load() {
        let yaml = USERS.replace("route: user_edit", "route: user_delete");
        let result = GridSet::from_yaml(&yaml);
        assert!(matches!(result, Err(GridError::Configuration(_))));
    }

    #[test]
    fn invalid_default_sort_direction() {
        let yaml = USERS.replace("name desc", "name sideways");
        let result = GridSet::from_yaml(&yaml);
        assert!(matches!(result, Err(GridError::UnexpectedValue(_))));
    }

    #[test]
    fn unknown_column_format_rejected() {
        let yaml = USERS.replace("format: date", "format: calendar");
        assert!(matches!(
            GridSet::from_yaml(&yaml),
            Err(GridError::Configuration(_))
        ));
    }

    #[test]
    fn invalid_date_format_rejected_at_load() {
        let yaml = USERS.replace("display_format: \"%Y/%m/%d\"", "display_format: \"%Q\"");
        assert!(matches!(
            GridSet::from_yaml(&yaml),
            Err(GridError::Configuration(_))
        ));

        let yaml = USERS.replace(
            "display_format: \"%Y/%m/%d\"",
            "input_format: \"%d.%m.%\"",
        );
        assert!(matches!(
            GridSet::from_yaml(&yaml),
            Err(GridError::Configuration(_))
        ));
    }

    #[test]
    fn duplicate_grid_names_rejected() {
        let yaml = r#"
grids:
  - name: a
    source: { type: array }
    columns: [{ name: x }]
  - name: a
    source: { type: array }
    columns: [{ name: x }]
"#;
        assert!(matches!(
            GridSet::from_yaml(yaml),
            Err(GridError::Configuration(_))
        ));
    }

    #[test]
    fn sql_grid_without_pool_is_a_configuration_error() {
        let yaml = r#"
grids:
  - name: orders
    source:
      type: sql
      selects:
        - table: orders
    columns: [{ name: id }]
"#;
        let set = GridSet::from_yaml(yaml).unwrap();
        assert!(set.needs_database());
        let result = set.get("orders").unwrap().build_adapter(None);
        assert!(matches!(result, Err(GridError::Configuration(_))));
    }

    #[test]
    fn select_definition_to_statement() {
        let select = SelectDefinition {
            table: "users".to_string(),
            alias: Some("u".to_string()),
            columns: vec![
                "u.id".to_string(),
                "u.name".to_string(),
                "COUNT(o.id) AS orders".to_string(),
            ],
            joins: vec![JoinDefinition {
                table: "orders".to_string(),
                alias: Some("o".to_string()),
                on: "o.user_id = u.id".to_string(),
                kind: JoinKind::Left,
            }],
            group_by: vec!["u.id".to_string(), "u.name".to_string()],
        };

        let sql = select.to_statement().to_string(PostgresQueryBuilder);
        assert!(sql.contains("FROM \"users\" AS \"u\""), "{sql}");
        assert!(
            sql.contains("LEFT JOIN \"orders\" AS \"o\" ON o.user_id = u.id"),
            "{sql}"
        );
        assert!(sql.contains("COUNT(o.id) AS orders"), "{sql}");
        assert!(sql.contains("GROUP BY \"u\".\"id\", \"u\".\"name\""), "{sql}");
    }
}
