//! Maps fetched rows onto the declared columns.
//!
//! Projection runs in two passes per cell. The first renders the column's
//! value according to its kind; for link and button columns the second
//! replaces `%identifier%` tokens in the rendered markup with values
//! re-resolved from the same row, and `%_index%` with the row's zero-based
//! position on the page. Data values are never rewritten.

use std::fmt::{self, Write};
use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use regex::{Captures, Regex};
use serde_json::{Number, Value};
use tracing::warn;

use crate::column::{Column, ColumnCollection, ColumnKind, STORAGE_DATE_FORMAT};
use crate::value::{resolve, to_number, to_text};

/// Layouts accepted for stored date-times besides RFC 3339.
const DATETIME_LAYOUTS: [&str; 3] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
];

/// Placeholder token bound to the row index.
pub const INDEX_PLACEHOLDER: &str = "_index";

#[allow(clippy::expect_used)]
static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"%([A-Za-z_][A-Za-z0-9_.]*)%").expect("placeholder pattern is valid")
});

/// One projected row.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectedRow {
    /// Zero-based position within the page.
    pub index: usize,

    /// Value of the id column, when one is configured and present.
    pub id: Option<Value>,

    /// Rendered cells in column order.
    pub cells: Vec<Value>,
}

/// Projects raw rows onto a column collection.
pub struct Projector<'a> {
    columns: &'a ColumnCollection,
    id_identifier: Option<&'a str>,
}

impl<'a> Projector<'a> {
    pub fn new(columns: &'a ColumnCollection) -> Self {
        Self {
            columns,
            id_identifier: None,
        }
    }

    /// Identifier whose value becomes each row's id.
    pub fn with_id(mut self, identifier: Option<&'a str>) -> Self {
        self.id_identifier = identifier;
        self
    }

    pub fn project(&self, rows: &[Value]) -> Vec<ProjectedRow> {
        rows.iter()
            .enumerate()
            .map(|(index, row)| self.project_row(index, row))
            .collect()
    }

    fn project_row(&self, index: usize, row: &Value) -> ProjectedRow {
        let cells = self
            .columns
            .iter()
            .map(|column| {
                let rendered = render(column, row);
                if column.is_markup() {
                    substitute_value(rendered, row, index)
                } else {
                    rendered
                }
            })
            .collect();

        ProjectedRow {
            index,
            id: self
                .id_identifier
                .and_then(|identifier| resolve(row, identifier))
                .filter(|v| !v.is_null()),
            cells,
        }
    }
}

/// Render a column's value for one row.
pub fn render(column: &Column, row: &Value) -> Value {
    match &column.kind {
        ColumnKind::Text => resolve(row, column.primary_identifier()).unwrap_or(Value::Null),
        ColumnKind::Date { display_format, .. } => {
            match resolve(row, column.primary_identifier()) {
                Some(Value::String(raw)) => Value::String(format_date(&raw, display_format)),
                Some(other) => other,
                None => Value::Null,
            }
        }
        ColumnKind::Number {
            multiplier,
            divisor,
            decimals,
        } => {
            let Some(raw) = resolve(row, column.primary_identifier()) else {
                return Value::Null;
            };
            match to_number(&raw) {
                Some(n) => scale_number(n, *multiplier, *divisor, *decimals),
                None => raw,
            }
        }
        ColumnKind::Concat {
            identifiers,
            separator,
        } => {
            let parts: Vec<String> = identifiers
                .iter()
                .filter_map(|identifier| resolve(row, identifier))
                .map(|v| to_text(&v))
                .filter(|s| !s.is_empty())
                .collect();
            Value::String(parts.join(separator))
        }
        ColumnKind::Link { href, text } => {
            let text = if text.is_empty() {
                resolve(row, column.primary_identifier())
                    .map(|v| to_text(&v))
                    .unwrap_or_default()
            } else {
                text.clone()
            };
            Value::String(format!("<a href=\"{href}\">{text}</a>"))
        }
        ColumnKind::Buttons { buttons, separator } => Value::String(
            buttons
                .iter()
                .map(|b| b.render())
                .collect::<Vec<_>>()
                .join(separator),
        ),
    }
}

fn substitute_value(value: Value, row: &Value, index: usize) -> Value {
    match value {
        Value::String(text) if text.contains('%') => Value::String(substitute(&text, row, index)),
        other => other,
    }
}

/// Replace `%identifier%` and `%_index%` tokens. Unknown identifiers
/// become empty strings.
pub fn substitute(text: &str, row: &Value, index: usize) -> String {
    PLACEHOLDER
        .replace_all(text, |caps: &Captures| {
            let identifier = &caps[1];
            if identifier == INDEX_PLACEHOLDER {
                return index.to_string();
            }
            resolve(row, identifier)
                .map(|v| to_text(&v))
                .unwrap_or_default()
        })
        .into_owned()
}

fn format_date(raw: &str, display_format: &str) -> String {
    let raw = raw.trim();
    if raw.is_empty() {
        return String::new();
    }

    let formatted = if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        write_display(dt.format(display_format))
    } else if let Some(dt) = DATETIME_LAYOUTS
        .iter()
        .find_map(|layout| NaiveDateTime::parse_from_str(raw, layout).ok())
    {
        write_display(dt.format(display_format))
    } else if let Ok(date) = NaiveDate::parse_from_str(raw, STORAGE_DATE_FORMAT) {
        write_display(date.format(display_format))
    } else {
        warn!(value = %raw, "unparsable date value, rendering as-is");
        return raw.to_string();
    };

    formatted.unwrap_or_else(|| {
        warn!(
            value = %raw,
            format = display_format,
            "date format not applicable, rendering as-is"
        );
        raw.to_string()
    })
}

/// Format into a string; `None` when the formatter reports an error.
fn write_display(value: impl fmt::Display) -> Option<String> {
    let mut out = String::new();
    write!(out, "{value}").ok()?;
    Some(out)
}

fn scale_number(
    mut n: f64,
    multiplier: Option<f64>,
    divisor: Option<f64>,
    decimals: Option<usize>,
) -> Value {
    if let Some(m) = multiplier {
        n *= m;
    }
    if let Some(d) = divisor.filter(|d| *d != 0.0) {
        n /= d;
    }

    match decimals {
        Some(places) => Value::String(format!("{n:.places$}")),
        None if n.fract() == 0.0 && n.abs() < i64::MAX as f64 => Value::from(n as i64),
        None => Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::column::{Button, ColumnKind, DEFAULT_DATE_FORMAT};
    use serde_json::json;
    use std::collections::BTreeMap;

    fn collection(columns: Vec<Column>) -> ColumnCollection {
        ColumnCollection::from_columns(columns).unwrap()
    }

    #[test]
    fn cells_follow_priority_order() {
        let columns = collection(vec![
            Column::text("name"),
            Column::text("id").with_priority(10),
        ]);
        let rows = Projector::new(&columns).project(&[json!({"id": 7, "name": "Ada"})]);
        assert_eq!(rows[0].cells, vec![json!(7), json!("Ada")]);
    }

    #[test]
    fn missing_values_render_as_null() {
        let columns = collection(vec![Column::text("missing")]);
        let rows = Projector::new(&columns).project(&[json!({"id": 1})]);
        assert_eq!(rows[0].cells, vec![Value::Null]);
    }

    #[test]
    fn nested_and_one_to_many_paths() {
        let columns = collection(vec![
            Column::text("author").with_identifier("author.name"),
            Column::text("tags").with_identifier("tags.label"),
        ]);
        let row = json!({
            "author": {"name": "Ada"},
            "tags": [{"label": "rust"}, {"label": "sql"}]
        });
        let rows = Projector::new(&columns).project(&[row]);
        assert_eq!(rows[0].cells, vec![json!("Ada"), json!(["rust", "sql"])]);
    }

    #[test]
    fn dates_are_reformatted() {
        let columns = collection(vec![
            Column::date("created"),
            Column::date("updated"),
            Column::date("broken"),
        ]);
        let row = json!({
            "created": "2024-03-09",
            "updated": "2024-03-09T10:15:00+00:00",
            "broken": "someday"
        });
        let rows = Projector::new(&columns).project(&[row]);
        assert_eq!(
            rows[0].cells,
            vec![json!("09.03.2024"), json!("09.03.2024"), json!("someday")]
        );
    }

    #[test]
    fn unusable_date_formats_render_the_raw_value() {
        let columns = collection(vec![
            Column::new(
                "created",
                ColumnKind::Date {
                    display_format: "%Q".to_string(),
                    input_format: DEFAULT_DATE_FORMAT.to_string(),
                },
            ),
            Column::new(
                "updated",
                ColumnKind::Date {
                    display_format: "%d.%m.%Y %H:%M".to_string(),
                    input_format: DEFAULT_DATE_FORMAT.to_string(),
                },
            ),
        ]);
        let row = json!({"created": "2024-01-02", "updated": "2024-01-02"});
        let rows = Projector::new(&columns).project(&[row]);
        assert_eq!(rows[0].cells, vec![json!("2024-01-02"), json!("2024-01-02")]);
    }

    #[test]
    fn numbers_are_scaled() {
        let columns = collection(vec![
            Column::new(
                "price",
                ColumnKind::Number {
                    multiplier: None,
                    divisor: Some(100.0),
                    decimals: Some(2),
                },
            ),
            Column::new(
                "percent",
                ColumnKind::Number {
                    multiplier: Some(100.0),
                    divisor: None,
                    decimals: None,
                },
            ),
            Column::number("label"),
        ]);
        let row = json!({"price": 12345, "percent": "0.25", "label": "n/a"});
        let rows = Projector::new(&columns).project(&[row]);
        assert_eq!(rows[0].cells, vec![json!("123.45"), json!(25), json!("n/a")]);
    }

    #[test]
    fn concat_joins_present_values() {
        let columns = collection(vec![Column::concat(
            "full_name",
            ["first_name", "middle_name", "last_name"],
            " ",
        )]);
        let row = json!({"first_name": "Ada", "middle_name": null, "last_name": "Lovelace"});
        let rows = Projector::new(&columns).project(&[row]);
        assert_eq!(rows[0].cells, vec![json!("Ada Lovelace")]);
    }

    #[test]
    fn link_placeholders_are_substituted() {
        let columns = collection(vec![Column::link("name", "/users/%id%", "")]);
        let row = json!({"id": 3, "name": "Ada"});
        let rows = Projector::new(&columns).project(&[row]);
        assert_eq!(rows[0].cells, vec![json!("<a href=\"/users/3\">Ada</a>")]);
    }

    #[test]
    fn index_placeholder_is_page_relative() {
        let columns = collection(vec![Column::link("pos", "#row-%_index%", "%name%")]);
        let rows = Projector::new(&columns).project(&[
            json!({"name": "a"}),
            json!({"name": "b"}),
            json!({"name": "c"}),
        ]);

        let cells: Vec<&Value> = rows.iter().map(|r| &r.cells[0]).collect();
        assert_eq!(
            cells,
            vec![
                &json!("<a href=\"#row-0\">a</a>"),
                &json!("<a href=\"#row-1\">b</a>"),
                &json!("<a href=\"#row-2\">c</a>"),
            ]
        );
    }

    #[test]
    fn data_values_are_not_substituted() {
        let columns = collection(vec![
            Column::text("code"),
            Column::concat("label", ["code", "name"], " "),
        ]);
        let row = json!({"code": "%promo%", "name": "%_index%"});
        let rows = Projector::new(&columns).project(&[row]);
        assert_eq!(
            rows[0].cells,
            vec![json!("%promo%"), json!("%promo% %_index%")]
        );
    }

    #[test]
    fn unknown_placeholders_become_empty() {
        assert_eq!(substitute("x-%nope%-y", &json!({}), 0), "x--y");
        assert_eq!(substitute("100% done", &json!({}), 0), "100% done");
    }

    #[test]
    fn buttons_render_with_row_values() {
        let mut params = BTreeMap::new();
        params.insert("id".to_string(), "%id%".to_string());
        let columns = collection(vec![Column::buttons(
            "actions",
            vec![
                Button::Route {
                    label: "Edit".to_string(),
                    route: "user_edit".to_string(),
                    path: "/users/edit".to_string(),
                    params,
                    attributes: BTreeMap::new(),
                },
                Button::Button {
                    label: "Delete".to_string(),
                    attributes: BTreeMap::new(),
                },
            ],
        )]);

        let rows = Projector::new(&columns).project(&[json!({"id": 9})]);
        assert_eq!(
            rows[0].cells,
            vec![json!(
                "<a href=\"/users/edit?id=9\">Edit</a> <button type=\"button\">Delete</button>"
            )]
        );
    }

    #[test]
    fn id_comes_from_id_identifier() {
        let columns = collection(vec![Column::text("name")]);
        let rows = Projector::new(&columns)
            .with_id(Some("uuid"))
            .project(&[json!({"uuid": "u-1", "name": "a"}), json!({"name": "b"})]);
        assert_eq!(rows[0].id, Some(json!("u-1")));
        assert_eq!(rows[1].id, None);
    }
}
