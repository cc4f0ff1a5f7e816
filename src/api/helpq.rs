use actix_web::{web, HttpResponse};
use serde::Deserialize;
use uuid::Uuid;

use crate::{models::HelpQ, services::help_q_service, store::EntityStore, utils::AppError};

#[derive(Deserialize, utoipa::ToSchema)]
pub struct CreateHelpQRequest {
    #[serde(default)]
    pub technology: String,
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub location: String,
    pub description: String,
}

#[derive(Deserialize, utoipa::ToSchema)]
pub struct ChatRequest {
    pub author: String,
    pub message: String,
}

/// GET /api/v1/helpq - Help requests, oldest first
#[utoipa::path(
    get,
    path = "/api/v1/helpq",
    tag = "HelpQ",
    responses((status = 200, description = "All help requests", body = [HelpQ]))
)]
pub async fn list_help_q(store: web::Data<EntityStore>) -> HttpResponse {
    HttpResponse::Ok().json(help_q_service::list_help_q(&store).await)
}

/// POST /api/v1/helpq
#[utoipa::path(
    post,
    path = "/api/v1/helpq",
    tag = "HelpQ",
    request_body = CreateHelpQRequest,
    responses(
        (status = 201, description = "Help request created", body = HelpQ),
        (status = 400, description = "Missing description")
    )
)]
pub async fn create_help_q(
    store: web::Data<EntityStore>,
    body: web::Json<CreateHelpQRequest>,
) -> Result<HttpResponse, AppError> {
    let item = help_q_service::create_help_q_item(
        &store,
        &body.technology,
        &body.language,
        &body.location,
        &body.description,
    )
    .await?;

    Ok(HttpResponse::Created().json(item))
}

/// POST /api/v1/helpq/{id}/chat
#[utoipa::path(
    post,
    path = "/api/v1/helpq/{id}/chat",
    tag = "HelpQ",
    params(("id" = Uuid, Path, description = "Help request id")),
    request_body = ChatRequest,
    responses(
        (status = 200, description = "Message appended", body = HelpQ),
        (status = 404, description = "Unknown help request")
    )
)]
pub async fn push_chat(
    store: web::Data<EntityStore>,
    path: web::Path<Uuid>,
    body: web::Json<ChatRequest>,
) -> Result<HttpResponse, AppError> {
    let item = help_q_service::push_chat_item(&store, path.into_inner(), &body.author, &body.message).await?;
    Ok(HttpResponse::Ok().json(item))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{test, App};
    use serde_json::json;

    #[actix_web::test]
    async fn test_create_and_chat() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(EntityStore::in_memory()))
                .route("/api/v1/helpq", web::get().to(list_help_q))
                .route("/api/v1/helpq", web::post().to(create_help_q))
                .route("/api/v1/helpq/{id}/chat", web::post().to(push_chat)),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/v1/helpq")
            .set_json(json!({"technology": "iOS", "language": "Swift", "location": "Siebel 2124",
                             "description": "Auto layout is fighting me"}))
            .to_request();
        let item: HelpQ = test::call_and_read_body_json(&app, req).await;

        let req = test::TestRequest::post()
            .uri(&format!("/api/v1/helpq/{}/chat", item.id))
            .set_json(json!({"author": "mentor", "message": "On my way"}))
            .to_request();
        let updated: HelpQ = test::call_and_read_body_json(&app, req).await;
        assert_eq!(updated.chats.len(), 1);
        assert_eq!(updated.chats[0].message, "On my way");

        let req = test::TestRequest::get().uri("/api/v1/helpq").to_request();
        let items: Vec<HelpQ> = test::call_and_read_body_json(&app, req).await;
        assert_eq!(items.len(), 1);
    }

    #[actix_web::test]
    async fn test_chat_on_unknown_item_is_not_found() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(EntityStore::in_memory()))
                .route("/api/v1/helpq/{id}/chat", web::post().to(push_chat)),
        )
        .await;

        let req = test::TestRequest::post()
            .uri(&format!("/api/v1/helpq/{}/chat", Uuid::new_v4()))
            .set_json(json!({"author": "mentor", "message": "hello?"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::NOT_FOUND);
    }
}
