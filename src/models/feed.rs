use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Tag value marking the four schedule boundary feeds
pub const HACKATHON_TAG: &str = "HACKATHON";

/// Scheduled announcement/event (collection: feeds)
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, utoipa::ToSchema)]
pub struct Feed {
    /// Natural key, assigned by the remote feed
    pub id: i64,
    pub message: String,
    pub time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    /// Names of the linked locations
    #[serde(default)]
    #[schema(value_type = Vec<String>)]
    pub locations: BTreeSet<String>,
    /// Names of the linked tags
    #[serde(default)]
    #[schema(value_type = Vec<String>)]
    pub tags: BTreeSet<String>,
}

impl Feed {
    pub fn is_schedule_marker(&self) -> bool {
        self.tag.as_deref() == Some(HACKATHON_TAG) || self.tags.contains(HACKATHON_TAG)
    }
}
