// ==================== PUSH NOTIFICATIONS ====================
// Delivery belongs to the notification provider; here payloads are only
// turned into log lines.

use crate::models::NotificationPayload;

const ACTION_SELECTED_KEY: &str = "actionSelected";

/// Text shown for a notification the user acted on. The selected button
/// is appended when the payload carries one.
pub fn action_message(payload: &NotificationPayload) -> String {
    let mut message = payload.body.clone().unwrap_or_default();

    if let Some(action) = payload
        .additional_data
        .as_ref()
        .and_then(|data| data.get(ACTION_SELECTED_KEY))
    {
        let action = match action {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        message.push_str(&format!("\nPressed ButtonId:{}", action));
    }

    message
}

pub fn handle_received(payload: &NotificationPayload) {
    log::info!(
        "🔔 Received Notification - {}",
        payload.notification_id.as_deref().unwrap_or("<no id>")
    );
}

pub fn handle_action(payload: &NotificationPayload) -> String {
    let message = action_message(payload);
    log::info!("👆 Notification action: {}", message);
    message
}
