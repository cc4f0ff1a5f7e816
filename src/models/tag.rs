use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Feed label, keyed by `name` (collection: tags)
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, utoipa::ToSchema)]
pub struct Tag {
    pub name: String,
    #[serde(default)]
    #[schema(value_type = Vec<i64>)]
    pub feeds: BTreeSet<i64>,
}
