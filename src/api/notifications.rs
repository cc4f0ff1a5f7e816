use actix_web::{web, HttpResponse};

use crate::{models::NotificationPayload, services::notification_service};

/// POST /api/v1/notifications/received
#[utoipa::path(
    post,
    path = "/api/v1/notifications/received",
    tag = "Notifications",
    request_body = NotificationPayload,
    responses((status = 200, description = "Notification logged"))
)]
pub async fn notification_received(body: web::Json<NotificationPayload>) -> HttpResponse {
    notification_service::handle_received(&body);
    HttpResponse::Ok().json(serde_json::json!({ "success": true }))
}

/// POST /api/v1/notifications/action - Returns the text to display
#[utoipa::path(
    post,
    path = "/api/v1/notifications/action",
    tag = "Notifications",
    request_body = NotificationPayload,
    responses((status = 200, description = "Message for the opened notification"))
)]
pub async fn notification_action(body: web::Json<NotificationPayload>) -> HttpResponse {
    let message = notification_service::handle_action(&body);
    HttpResponse::Ok().json(serde_json::json!({ "success": true, "message": message }))
}
