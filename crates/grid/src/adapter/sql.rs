//! SQL adapter using SeaQuery.
//!
//! Generates PostgreSQL from a base statement with support for:
//! - WHERE/HAVING predicates from the filter plan
//! - UNION sources wrapped as a subquery
//! - grid sort with concat fan-out, followed by a baseline order
//! - LIMIT/OFFSET pagination, filtered and total counts, summary aggregates

use async_trait::async_trait;
use sea_query::{
    Alias, Asterisk, Cond, Condition, Expr, Func, Order, PostgresQueryBuilder, Query,
    SelectStatement, SimpleExpr, UnionType,
};
use serde_json::Value;
use sqlx::PgPool;
use tracing::debug;

use super::{Adapter, ResultSet, sort_terms};
use crate::column::{ColumnCollection, SummaryType};
use crate::error::{GridError, GridResult};
use crate::filter::{Filter, FilterOperator, FilterPlan, FilterValue, Predicate};
use crate::query::{GridQuery, SortDirection};

/// Shape of the base statement.
#[derive(Debug, Clone)]
pub enum SourceStatement {
    /// A plain SELECT.
    Select(SelectStatement),
    /// Several SELECTs combined with UNION (ALL unless `distinct`).
    Combine {
        selects: Vec<SelectStatement>,
        distinct: bool,
    },
}

/// Statement the grid reads from, with the ordering kept after the grid's sort.
///
/// A statement's own ORDER BY only stands while the grid has no sort. Order
/// that must survive a grid sort, such as a primary key tie-break, is
/// declared with [`order_by`](Self::order_by).
#[derive(Debug, Clone)]
pub struct SqlSource {
    statement: SourceStatement,
    baseline_order: Vec<(String, SortDirection)>,
}

impl SqlSource {
    pub fn select(select: SelectStatement) -> Self {
        Self {
            statement: SourceStatement::Select(select),
            baseline_order: Vec::new(),
        }
    }

    pub fn combine(selects: Vec<SelectStatement>, distinct: bool) -> Self {
        Self {
            statement: SourceStatement::Combine { selects, distinct },
            baseline_order: Vec::new(),
        }
    }

    /// Append a baseline ordering term.
    pub fn order_by(mut self, identifier: impl Into<String>, direction: SortDirection) -> Self {
        self.baseline_order.push((identifier.into(), direction));
        self
    }

    pub fn statement(&self) -> &SourceStatement {
        &self.statement
    }

    pub fn baseline_order(&self) -> &[(String, SortDirection)] {
        &self.baseline_order
    }
}

/// Builds the statements for one grid request.
#[derive(Debug, Clone)]
pub struct SqlQueryBuilder {
    source: SqlSource,
}

impl SqlQueryBuilder {
    pub fn new(source: SqlSource) -> Self {
        Self { source }
    }

    /// Build the page SELECT.
    pub fn build(&self, query: &GridQuery, columns: &ColumnCollection) -> GridResult<String> {
        let mut select = self.filtered_select(&query.filter, columns)?;

        // ORDER BY: grid sort first, then the baseline
        let terms = sort_terms(&query.sort, columns);
        if !terms.is_empty() {
            select.clear_order_by();
        }
        for (identifier, direction) in terms {
            select.order_by_expr(identifier_expr(&identifier), order(direction));
        }
        for (identifier, direction) in self.source.baseline_order() {
            select.order_by_expr(identifier_expr(identifier), order(*direction));
        }

        select.limit(query.page.limit());
        select.offset(query.page.offset());

        Ok(select.to_string(PostgresQueryBuilder))
    }

    /// Build a COUNT over the filtered source.
    pub fn build_count(&self, filter: &Filter, columns: &ColumnCollection) -> GridResult<String> {
        let mut select = self.filtered_select(filter, columns)?;
        select.clear_order_by();
        Ok(count_of(select))
    }

    /// Build a COUNT over the unfiltered source.
    pub fn build_total_count(&self) -> GridResult<String> {
        let mut select = self.base_select()?;
        select.clear_order_by();
        Ok(count_of(select))
    }

    /// Build the summary aggregate SELECT, if any column declares one.
    ///
    /// The filtered source runs as a subquery that projects each summarized
    /// identifier under `summary_<n>`; the outer query aggregates those, so
    /// grouped sources and aggregate identifiers yield a single row.
    pub fn build_summary(
        &self,
        filter: &Filter,
        columns: &ColumnCollection,
    ) -> GridResult<Option<String>> {
        let summaries: Vec<_> = columns
            .iter()
            .filter_map(|c| c.summary_type.map(|t| (c, t)))
            .collect();
        if summaries.is_empty() {
            return Ok(None);
        }

        let mut inner = self.filtered_select(filter, columns)?;
        inner.clear_order_by();

        let mut summary = Query::select();
        for (position, (column, summary_type)) in summaries.into_iter().enumerate() {
            let alias = format!("summary_{position}");
            inner.expr_as(
                identifier_expr(column.primary_identifier()),
                Alias::new(&alias),
            );

            let value = Expr::col(Alias::new(&alias));
            let aggregate = match summary_type {
                SummaryType::Sum => Func::sum(value),
                SummaryType::Min => Func::min(value),
                SummaryType::Max => Func::max(value),
                SummaryType::Count => Func::count(value),
            };
            summary.expr_as(aggregate, Alias::new(&column.name));
        }
        summary.from_subquery(inner, Alias::new("grid_summary"));

        Ok(Some(summary.to_string(PostgresQueryBuilder)))
    }

    /// Base statement; UNION sources are wrapped as `SELECT * FROM (...) AS combined`.
    fn base_select(&self) -> GridResult<SelectStatement> {
        match self.source.statement() {
            SourceStatement::Select(select) => Ok(select.clone()),
            SourceStatement::Combine { selects, distinct } => {
                let mut iter = selects.iter();
                let first = iter.next().ok_or_else(|| {
                    GridError::configuration("combined source requires at least one select")
                })?;
                let union_type = if *distinct {
                    UnionType::Distinct
                } else {
                    UnionType::All
                };
                let mut union = first.clone();
                for select in iter {
                    union.union(union_type, select.clone());
                }

                let mut outer = Query::select();
                outer
                    .column(Asterisk)
                    .from_subquery(union, Alias::new("combined"));
                Ok(outer)
            }
        }
    }

    fn filtered_select(
        &self,
        filter: &Filter,
        columns: &ColumnCollection,
    ) -> GridResult<SelectStatement> {
        let mut select = self.base_select()?;
        let plan = FilterPlan::build(filter, columns)?;

        if let Some(ref predicate) = plan.where_clause {
            select.cond_where(condition(predicate));
        }
        if let Some(ref predicate) = plan.having_clause {
            select.cond_having(condition(predicate));
        }

        Ok(select)
    }
}

/// Translate a predicate tree into a SeaQuery condition.
pub(crate) fn condition(predicate: &Predicate) -> Condition {
    match predicate {
        Predicate::All(parts) => parts
            .iter()
            .fold(Cond::all(), |cond, part| cond.add(condition(part))),
        Predicate::Any(parts) => parts
            .iter()
            .fold(Cond::any(), |cond, part| cond.add(condition(part))),
        Predicate::Compare {
            identifier,
            operator,
            value,
        } => Cond::all().add(compare_expr(identifier, *operator, value)),
    }
}

fn compare_expr(
    identifier: &str,
    operator: FilterOperator,
    value: &FilterValue,
) -> SimpleExpr {
    let field = identifier_expr(identifier);
    let text = value.as_text();

    match operator {
        FilterOperator::Equal => Expr::expr(field).eq(text),
        FilterOperator::NotEqual => Expr::expr(field).ne(text),
        FilterOperator::Less => Expr::expr(field).lt(text),
        FilterOperator::LessOrEqual => Expr::expr(field).lte(text),
        FilterOperator::Greater => Expr::expr(field).gt(text),
        FilterOperator::GreaterOrEqual => Expr::expr(field).gte(text),
        FilterOperator::In => Expr::expr(field).is_in(value.to_list()),
        FilterOperator::NotIn => Expr::expr(field).is_not_in(value.to_list()),
        FilterOperator::BeginsWith => {
            lowered_text(field).like(format!("{}%", like_operand(&text)))
        }
        FilterOperator::NotBeginsWith => {
            lowered_text(field).not_like(format!("{}%", like_operand(&text)))
        }
        FilterOperator::EndsWith => {
            lowered_text(field).like(format!("%{}", like_operand(&text)))
        }
        FilterOperator::NotEndsWith => {
            lowered_text(field).not_like(format!("%{}", like_operand(&text)))
        }
        FilterOperator::Contains => {
            lowered_text(field).like(format!("%{}%", like_operand(&text)))
        }
        FilterOperator::NotContains => {
            lowered_text(field).not_like(format!("%{}%", like_operand(&text)))
        }
    }
}

/// `LOWER(CAST(field AS TEXT))`, so LIKE works on any column type and
/// ignores case.
fn lowered_text(field: SimpleExpr) -> Expr {
    Expr::expr(Func::lower(Expr::expr(field).cast_as(Alias::new("TEXT"))))
}

fn like_operand(value: &str) -> String {
    escape_like_wildcards(&value.to_lowercase())
}

/// Expression for an identifier.
///
/// `table.column` becomes a qualified column, anything containing
/// parentheses or spaces (`SUM(o.total)`, `CONCAT(a, b)`) is used as raw
/// SQL, everything else is a plain column.
pub(crate) fn identifier_expr(identifier: &str) -> SimpleExpr {
    if identifier.contains('(') || identifier.contains(' ') {
        return Expr::cust(identifier.to_string());
    }
    match identifier.split_once('.') {
        Some((table, column)) => Expr::col((Alias::new(table), Alias::new(column))).into(),
        None => Expr::col(Alias::new(identifier)).into(),
    }
}

fn order(direction: SortDirection) -> Order {
    match direction {
        SortDirection::Asc => Order::Asc,
        SortDirection::Desc => Order::Desc,
    }
}

fn count_of(select: SelectStatement) -> String {
    let mut count = Query::select();
    count
        .expr(Expr::col(Asterisk).count())
        .from_subquery(select, Alias::new("grid_count"));
    count.to_string(PostgresQueryBuilder)
}

/// Escape SQL LIKE wildcard characters (`%`, `_`, `\`) in a value.
fn escape_like_wildcards(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

/// Adapter executing grid queries on PostgreSQL.
pub struct SqlAdapter {
    pool: PgPool,
    source: Option<SqlSource>,
    count_of_items: u64,
    count_of_items_total: u64,
}

impl SqlAdapter {
    /// Create an adapter without a source; one must be set before fetching.
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            source: None,
            count_of_items: 0,
            count_of_items_total: 0,
        }
    }

    pub fn with_source(mut self, source: SqlSource) -> Self {
        self.source = Some(source);
        self
    }

    /// Query builder for the configured source.
    pub fn query_builder(&self) -> GridResult<SqlQueryBuilder> {
        let source = self
            .source
            .clone()
            .ok_or_else(|| GridError::configuration("SQL adapter has no select statement"))?;
        Ok(SqlQueryBuilder::new(source))
    }
}

/// The four statements of one request.
struct RequestSql {
    total: String,
    count: String,
    page: String,
    summary: Option<String>,
}

#[async_trait]
impl Adapter for SqlAdapter {
    async fn fetch_data(
        &mut self,
        query: &GridQuery,
        columns: &ColumnCollection,
    ) -> GridResult<ResultSet> {
        // Build everything before touching the database.
        let sql = {
            let builder = self.query_builder()?;
            RequestSql {
                total: builder.build_total_count()?,
                count: builder.build_count(&query.filter, columns)?,
                page: builder.build(query, columns)?,
                summary: builder.build_summary(&query.filter, columns)?,
            }
        };

        debug!(sql = %sql.page, "grid page query");

        // Use a transaction so SET LOCAL applies correctly and resets on commit/rollback.
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET LOCAL statement_timeout = '10s'")
            .execute(&mut *tx)
            .await?;

        let total: i64 = sqlx::query_scalar(&sql.total).fetch_one(&mut *tx).await?;
        let filtered: i64 = sqlx::query_scalar(&sql.count).fetch_one(&mut *tx).await?;

        let rows: Vec<Value> =
            sqlx::query_scalar(&format!("SELECT row_to_json(t) FROM ({}) t", sql.page))
                .fetch_all(&mut *tx)
                .await?;

        let user_data = match &sql.summary {
            Some(summary_sql) => {
                let summary: Option<Value> = sqlx::query_scalar(&format!(
                    "SELECT row_to_json(t) FROM ({summary_sql}) t"
                ))
                .fetch_optional(&mut *tx)
                .await?;
                summary.and_then(|v| match v {
                    Value::Object(map) => Some(map),
                    _ => None,
                })
            }
            None => None,
        };

        tx.commit().await?;

        self.count_of_items_total = total.max(0) as u64;
        self.count_of_items = filtered.max(0) as u64;

        Ok(ResultSet {
            rows,
            user_data,
            count_of_items: self.count_of_items,
            count_of_items_total: self.count_of_items_total,
        })
    }

    fn count_of_items(&self) -> u64 {
        self.count_of_items
    }

    fn count_of_items_total(&self) -> u64 {
        self.count_of_items_total
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::column::{Column, SearchType};
    use crate::filter::{FilterRule, GroupOperator};
    use crate::query::{PageSpec, SortSpec};
    use sea_query::JoinType;

    fn users_select() -> SelectStatement {
        Query::select()
            .columns([Alias::new("id"), Alias::new("name"), Alias::new("city")])
            .from(Alias::new("users"))
            .order_by(Alias::new("id"), Order::Desc)
            .to_owned()
    }

    fn columns() -> ColumnCollection {
        ColumnCollection::from_columns([
            Column::text("id"),
            Column::text("name"),
            Column::text("city").with_identifier("u.city"),
            Column::concat("full_name", ["first_name", "last_name"], " "),
            Column::number("orders")
                .with_identifier("COUNT(o.id)")
                .with_search_type(SearchType::Having)
                .with_summary(SummaryType::Sum),
        ])
        .unwrap()
    }

    fn query(rules: Vec<FilterRule>, sort: SortSpec, page: PageSpec) -> GridQuery {
        GridQuery {
            page,
            sort,
            filter: Filter::new(GroupOperator::And, rules),
        }
    }

    fn builder() -> SqlQueryBuilder {
        SqlQueryBuilder::new(SqlSource::select(users_select()))
    }

    #[test]
    fn page_query_applies_limit_and_offset() {
        let sql = builder()
            .build(
                &query(vec![], SortSpec::new(), PageSpec::new(3, 10)),
                &columns(),
            )
            .unwrap();

        assert!(sql.contains("FROM \"users\""), "{sql}");
        assert!(sql.contains("LIMIT 10"), "{sql}");
        assert!(sql.contains("OFFSET 20"), "{sql}");
    }

    #[test]
    fn page_zero_clamps_offset() {
        let sql = builder()
            .build(
                &query(vec![], SortSpec::new(), PageSpec::new(0, 10)),
                &columns(),
            )
            .unwrap();
        assert!(sql.contains("OFFSET 0"), "{sql}");
    }

    #[test]
    fn statement_order_stands_without_grid_sort() {
        let sql = builder()
            .build(
                &query(vec![], SortSpec::new(), PageSpec::new(1, 10)),
                &columns(),
            )
            .unwrap();

        assert!(sql.contains("ORDER BY \"id\" DESC LIMIT 10"), "{sql}");
    }

    #[test]
    fn grid_sort_replaces_statement_order() {
        let sql = builder()
            .build(
                &query(
                    vec![],
                    SortSpec::new().with("name", SortDirection::Asc),
                    PageSpec::new(1, 10),
                ),
                &columns(),
            )
            .unwrap();

        assert!(sql.contains("ORDER BY \"name\" ASC LIMIT 10"), "{sql}");
        assert!(!sql.contains("\"id\" DESC"), "{sql}");
    }

    #[test]
    fn baseline_order_is_kept_after_grid_sort() {
        let builder = SqlQueryBuilder::new(
            SqlSource::select(users_select()).order_by("id", SortDirection::Desc),
        );

        let sorted = builder
            .build(
                &query(
                    vec![],
                    SortSpec::new().with("name", SortDirection::Asc),
                    PageSpec::new(1, 10),
                ),
                &columns(),
            )
            .unwrap();
        assert!(
            sorted.contains("ORDER BY \"name\" ASC, \"id\" DESC LIMIT 10"),
            "{sorted}"
        );

        let unsorted = builder
            .build(
                &query(vec![], SortSpec::new(), PageSpec::new(1, 10)),
                &columns(),
            )
            .unwrap();
        assert!(unsorted.contains("ORDER BY \"id\" DESC"), "{unsorted}");
    }

    #[test]
    fn concat_sort_fans_out_before_baseline() {
        let sql = SqlQueryBuilder::new(
            SqlSource::select(users_select()).order_by("id", SortDirection::Desc),
        )
        .build(
            &query(
                vec![],
                SortSpec::new().with("full_name", SortDirection::Desc),
                PageSpec::new(1, 10),
            ),
            &columns(),
        )
        .unwrap();

        assert!(
            sql.contains("ORDER BY \"first_name\" DESC, \"last_name\" DESC, \"id\" DESC"),
            "{sql}"
        );
    }

    #[test]
    fn qualified_identifiers() {
        let sql = builder()
            .build(
                &query(
                    vec![FilterRule::new("city", FilterOperator::Equal, "Brno")],
                    SortSpec::new().with("city", SortDirection::Desc),
                    PageSpec::new(1, 10),
                ),
                &columns(),
            )
            .unwrap();

        assert!(sql.contains("\"u\".\"city\" = 'Brno'"), "{sql}");
        assert!(sql.contains("ORDER BY \"u\".\"city\" DESC"), "{sql}");
    }

    #[test]
    fn string_operators_use_like() {
        let sql = builder()
            .build(
                &query(
                    vec![
                        FilterRule::new("name", FilterOperator::BeginsWith, "Ab"),
                        FilterRule::new("city", FilterOperator::NotEndsWith, "no"),
                    ],
                    SortSpec::new(),
                    PageSpec::new(1, 10),
                ),
                &columns(),
            )
            .unwrap();

        assert!(sql.contains("LIKE 'ab%'"), "{sql}");
        assert!(sql.contains("NOT LIKE '%no'"), "{sql}");
        assert!(sql.contains("LOWER"), "{sql}");
    }

    #[test]
    fn free_text_words_are_or_combined() {
        let sql = builder()
            .build(
                &query(
                    vec![FilterRule::new("name", FilterOperator::Contains, "foo foo bar")],
                    SortSpec::new(),
                    PageSpec::new(1, 10),
                ),
                &columns(),
            )
            .unwrap();

        assert!(sql.contains("'%foo%'"), "{sql}");
        assert!(sql.contains("'%bar%'"), "{sql}");
        assert!(sql.contains(" OR "), "{sql}");
        assert_eq!(sql.matches("'%foo%'").count(), 1, "{sql}");
    }

    #[test]
    fn concat_filter_or_combines_identifiers() {
        let sql = builder()
            .build(
                &query(
                    vec![FilterRule::new("full_name", FilterOperator::Equal, "Ada")],
                    SortSpec::new(),
                    PageSpec::new(1, 10),
                ),
                &columns(),
            )
            .unwrap();

        assert!(
            sql.contains("\"first_name\" = 'Ada' OR \"last_name\" = 'Ada'"),
            "{sql}"
        );
    }

    #[test]
    fn list_operators() {
        let sql = builder()
            .build(
                &query(
                    vec![
                        FilterRule::new("id", FilterOperator::In, "1,2"),
                        FilterRule::new("name", FilterOperator::NotIn, vec!["x"]),
                    ],
                    SortSpec::new(),
                    PageSpec::new(1, 10),
                ),
                &columns(),
            )
            .unwrap();

        assert!(sql.contains("\"id\" IN ('1', '2')"), "{sql}");
        assert!(sql.contains("\"name\" NOT IN ('x')"), "{sql}");
    }

    #[test]
    fn having_columns_go_to_having() {
        let sql = builder()
            .build(
                &query(
                    vec![FilterRule::new("orders", FilterOperator::Greater, "5")],
                    SortSpec::new(),
                    PageSpec::new(1, 10),
                ),
                &columns(),
            )
            .unwrap();

        assert!(sql.contains("HAVING COUNT(o.id) > '5'"), "{sql}");
        assert!(!sql.contains("WHERE"), "{sql}");
    }

    #[test]
    fn count_query_has_filters_but_no_paging() {
        let filter = Filter::new(
            GroupOperator::And,
            vec![FilterRule::new("name", FilterOperator::Equal, "Ada")],
        );
        let sql = builder().build_count(&filter, &columns()).unwrap();

        assert!(sql.contains("COUNT(*)"), "{sql}");
        assert!(sql.contains("\"name\" = 'Ada'"), "{sql}");
        assert!(!sql.contains("LIMIT"), "{sql}");
        assert!(!sql.contains("ORDER BY"), "{sql}");
    }

    #[test]
    fn total_count_ignores_filters() {
        let sql = builder().build_total_count().unwrap();
        assert!(sql.contains("COUNT(*)"), "{sql}");
        assert!(!sql.contains("WHERE"), "{sql}");
    }

    #[test]
    fn summary_aggregates_over_the_filtered_subquery() {
        let grouped = Query::select()
            .column((Alias::new("u"), Alias::new("city")))
            .expr(Expr::cust("COUNT(o.id) AS orders"))
            .from_as(Alias::new("users"), Alias::new("u"))
            .join_as(
                JoinType::LeftJoin,
                Alias::new("orders"),
                Alias::new("o"),
                Expr::cust("o.user_id = u.id"),
            )
            .group_by_col((Alias::new("u"), Alias::new("city")))
            .to_owned();
        let filter = Filter::new(
            GroupOperator::And,
            vec![FilterRule::new("orders", FilterOperator::Greater, "5")],
        );

        let sql = SqlQueryBuilder::new(SqlSource::select(grouped))
            .build_summary(&filter, &columns())
            .unwrap()
            .unwrap();

        assert!(
            sql.starts_with("SELECT SUM(\"summary_0\") AS \"orders\" FROM (SELECT"),
            "{sql}"
        );
        assert!(sql.contains("COUNT(o.id) AS \"summary_0\""), "{sql}");
        assert!(sql.contains("GROUP BY \"u\".\"city\""), "{sql}");
        assert!(sql.contains("HAVING COUNT(o.id) > '5'"), "{sql}");
        assert!(sql.ends_with("AS \"grid_summary\""), "{sql}");
        assert!(!sql.contains("SUM(COUNT"), "{sql}");

        let plain = ColumnCollection::from_columns([Column::text("name")]).unwrap();
        assert!(builder().build_summary(&Filter::default(), &plain).unwrap().is_none());
    }

    #[test]
    fn combine_wraps_union_in_subquery() {
        let archived = Query::select()
            .columns([Alias::new("id"), Alias::new("name"), Alias::new("city")])
            .from(Alias::new("archived_users"))
            .to_owned();
        let builder =
            SqlQueryBuilder::new(SqlSource::combine(vec![users_select(), archived], false));

        let sql = builder
            .build(
                &query(
                    vec![FilterRule::new("name", FilterOperator::Equal, "Ada")],
                    SortSpec::new(),
                    PageSpec::new(1, 10),
                ),
                &columns(),
            )
            .unwrap();

        assert!(sql.contains("UNION ALL"), "{sql}");
        assert!(sql.contains("AS \"combined\""), "{sql}");
        assert!(sql.contains("WHERE \"name\" = 'Ada'"), "{sql}");
    }

    #[test]
    fn empty_combine_is_a_configuration_error() {
        let builder = SqlQueryBuilder::new(SqlSource::combine(vec![], true));
        assert!(matches!(
            builder.build_total_count(),
            Err(GridError::Configuration(_))
        ));
    }

    #[test]
    fn adapter_types_are_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SqlSource>();
        assert_send_sync::<SqlQueryBuilder>();
        assert_send_sync::<SqlAdapter>();
    }

    #[test]
    fn like_wildcards_escaped() {
        assert_eq!(escape_like_wildcards("hello"), "hello");
        assert_eq!(escape_like_wildcards("100%"), "100\\%");
        assert_eq!(escape_like_wildcards("a_b"), "a\\_b");
        assert_eq!(escape_like_wildcards("a\\b"), "a\\\\b");
    }
}
