use serde::{Deserialize, Serialize};

/// Push notification as delivered by the notification provider
#[derive(Debug, Serialize, Deserialize, Clone, utoipa::ToSchema)]
pub struct NotificationPayload {
    #[serde(default)]
    pub notification_id: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    #[schema(value_type = Option<Object>)]
    pub additional_data: Option<serde_json::Map<String, serde_json::Value>>,
}
