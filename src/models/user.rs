use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Logged-in attendee. The store holds at most one per device session.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct User {
    pub user_id: i64,
    pub name: String,
    pub email: String,
    pub school: String,
    pub major: String,
    pub role: String,
    pub diet: String,
    /// Auth token handed out by the registration API
    pub token: String,
    pub barcode: String,
    /// Rendered barcode image
    #[serde(with = "crate::utils::encoding")]
    pub barcode_data: Vec<u8>,
    pub init_time: DateTime<Utc>,
    pub expiration_time: DateTime<Utc>,
}

impl User {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiration_time < now
    }
}
