//! Explicit request context.
//!
//! Parameters for a grid come from the current request and, optionally,
//! from the parameters stored after the previous request. The merge is
//! explicit: a parameter present in the request overrides the stored one,
//! and a request addressed to another grid on the same page (its `_name`
//! differs) contributes nothing.

use std::collections::{BTreeMap, HashMap};

use crate::error::GridResult;

/// Request parameter naming the grid a request targets.
pub const GRID_NAME_PARAM: &str = "_name";

/// Resolved parameters for one grid and one request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    params: BTreeMap<String, String>,
}

impl RequestContext {
    pub fn new(params: BTreeMap<String, String>) -> Self {
        Self { params }
    }

    /// Merge request parameters over stored ones.
    pub fn merge(
        grid_name: &str,
        explicit: &HashMap<String, String>,
        stored: Option<BTreeMap<String, String>>,
    ) -> Self {
        let mut params = stored.unwrap_or_default();

        let addressed_elsewhere = explicit
            .get(GRID_NAME_PARAM)
            .is_some_and(|name| name != grid_name);

        if !addressed_elsewhere {
            for (key, value) in explicit {
                if key != GRID_NAME_PARAM {
                    params.insert(key.clone(), value.clone());
                }
            }
        }

        Self { params }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    pub fn params(&self) -> &BTreeMap<String, String> {
        &self.params
    }

    /// Serialize for [`Storage`](crate::Storage).
    pub fn to_storage(&self) -> GridResult<String> {
        Ok(serde_json::to_string(&self.params)?)
    }

    /// Deserialize stored parameters.
    pub fn from_storage(content: &str) -> GridResult<BTreeMap<String, String>> {
        Ok(serde_json::from_str(content)?)
    }
}
