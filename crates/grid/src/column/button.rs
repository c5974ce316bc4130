//! Button markup for action columns.
//!
//! Buttons are a closed set of variants. Configuration names a variant by
//! its type tag and [`ButtonFactory`] builds it, so an unknown tag or an
//! unknown route fails while the grid is being configured rather than when
//! a row is rendered.

use std::collections::{BTreeMap, HashMap};

use serde_json::Value;

use crate::error::{GridError, GridResult};

/// Type tags accepted by [`ButtonFactory::create`].
pub const BUTTON_TAGS: [&str; 3] = ["button", "button_link", "route"];

/// Named route path templates, e.g. `user_edit` → `/users/%id%/edit`.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: HashMap<String, String>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_route(mut self, name: impl Into<String>, path: impl Into<String>) -> Self {
        self.insert(name, path);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, path: impl Into<String>) {
        self.routes.insert(name.into(), path.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.routes.get(name).map(String::as_str)
    }
}

impl From<HashMap<String, String>> for RouteTable {
    fn from(routes: HashMap<String, String>) -> Self {
        Self { routes }
    }
}

/// A rendered action in a button column.
#[derive(Debug, Clone, PartialEq)]
pub enum Button {
    /// `<button>` element, typically wired up by client-side script.
    Button {
        label: String,
        attributes: BTreeMap<String, String>,
    },
    /// Anchor styled as a button.
    ButtonLink {
        label: String,
        href: String,
        attributes: BTreeMap<String, String>,
    },
    /// Anchor pointing at a named route, resolved to `path` at build time.
    Route {
        label: String,
        route: String,
        path: String,
        params: BTreeMap<String, String>,
        attributes: BTreeMap<String, String>,
    },
}

impl Button {
    /// Render the markup. Placeholders are left in place for the projector.
    pub fn render(&self) -> String {
        match self {
            Button::Button { label, attributes } => format!(
                "<button type=\"button\"{}>{}</button>",
                render_attributes(attributes),
                escape_html(label)
            ),
            Button::ButtonLink {
                label,
                href,
                attributes,
            } => format!(
                "<a href=\"{}\"{}>{}</a>",
                escape_html(href),
                render_attributes(attributes),
                escape_html(label)
            ),
            Button::Route {
                label,
                path,
                params,
                attributes,
                ..
            } => {
                let mut href = path.clone();
                if !params.is_empty() {
                    let query: Vec<String> = params
                        .iter()
                        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), encode_param(v)))
                        .collect();
                    href.push('?');
                    href.push_str(&query.join("&"));
                }
                format!(
                    "<a href=\"{}\"{}>{}</a>",
                    escape_html(&href),
                    render_attributes(attributes),
                    escape_html(label)
                )
            }
        }
    }
}

/// Builds [`Button`]s from type tags and option maps.
pub struct ButtonFactory<'a> {
    routes: &'a RouteTable,
}

impl<'a> ButtonFactory<'a> {
    pub fn new(routes: &'a RouteTable) -> Self {
        Self { routes }
    }

    /// Build a button from its type tag and options.
    ///
    /// Options: `label` (required), `attributes` (object), `href`
    /// (`button_link`), `route` and `params` (`route`).
    pub fn create(&self, tag: &str, options: &Value) -> GridResult<Button> {
        let label = string_option(options, "label")
            .ok_or_else(|| GridError::configuration(format!("{tag} button requires a label")))?;
        let attributes = map_option(options, "attributes")?;

        match tag {
            "button" => Ok(Button::Button { label, attributes }),
            "button_link" => {
                let href = string_option(options, "href").ok_or_else(|| {
                    GridError::configuration(format!("button_link '{label}' requires an href"))
                })?;
                Ok(Button::ButtonLink {
                    label,
                    href,
                    attributes,
                })
            }
            "route" => {
                let route = string_option(options, "route").ok_or_else(|| {
                    GridError::configuration(format!("route button '{label}' requires a route"))
                })?;
                let path = self.routes.get(&route).ok_or_else(|| {
                    GridError::configuration(format!("unknown route '{route}'"))
                })?;
                Ok(Button::Route {
                    label,
                    path: path.to_string(),
                    route,
                    params: map_option(options, "params")?,
                    attributes,
                })
            }
            other => Err(GridError::configuration(format!(
                "unknown button type '{other}' (expected one of: {})",
                BUTTON_TAGS.join(", ")
            ))),
        }
    }
}

fn string_option(options: &Value, key: &str) -> Option<String> {
    options.get(key).and_then(Value::as_str).map(str::to_string)
}

fn map_option(options: &Value, key: &str) -> GridResult<BTreeMap<String, String>> {
    match options.get(key) {
        None | Some(Value::Null) => Ok(BTreeMap::new()),
        Some(Value::Object(map)) => Ok(map
            .iter()
            .map(|(k, v)| (k.clone(), crate::value::to_text(v)))
            .collect()),
        Some(_) => Err(GridError::configuration(format!(
            "button option '{key}' must be a map"
        ))),
    }
}

fn render_attributes(attributes: &BTreeMap<String, String>) -> String {
    attributes
        .iter()
        .map(|(k, v)| format!(" {}=\"{}\"", escape_html(k), escape_html(v)))
        .collect()
}

/// Encode a query value, keeping a whole `%field%` placeholder intact.
fn encode_param(value: &str) -> String {
    let is_placeholder = value.len() > 2
        && value.starts_with('%')
        && value.ends_with('%')
        && !value[1..value.len() - 1].contains('%');
    if is_placeholder {
        value.to_string()
    } else {
        urlencoding::encode(value).into_owned()
    }
}

pub(crate) fn escape_html(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
