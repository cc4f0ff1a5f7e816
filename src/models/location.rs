use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Named place, keyed by `name` (collection: locations)
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, utoipa::ToSchema)]
pub struct Location {
    pub name: String,
    pub short_name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub address: String,
    /// Ids of the feeds referencing this location
    #[serde(default)]
    #[schema(value_type = Vec<i64>)]
    pub feeds: BTreeSet<i64>,
}
