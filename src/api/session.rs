use actix_web::{web, HttpResponse};

use crate::{
    services::user_service::{self, NewUser, SessionState},
    store::EntityStore,
    utils::AppError,
};

/// GET /api/v1/session - Who is logged in on this device
#[utoipa::path(
    get,
    path = "/api/v1/session",
    tag = "Session",
    responses((status = 200, description = "Current session state", body = SessionState))
)]
pub async fn get_session(store: web::Data<EntityStore>) -> HttpResponse {
    let state = user_service::session_state(&store, chrono::Utc::now()).await;
    HttpResponse::Ok().json(state)
}

/// POST /api/v1/session - Store a login, replacing any previous user
#[utoipa::path(
    post,
    path = "/api/v1/session",
    tag = "Session",
    request_body = NewUser,
    responses(
        (status = 200, description = "User stored", body = SessionState),
        (status = 400, description = "Missing email or token")
    )
)]
pub async fn login(
    store: web::Data<EntityStore>,
    body: web::Json<NewUser>,
) -> Result<HttpResponse, AppError> {
    log::info!("🔐 POST /session - user {}", body.user_id);

    user_service::store_user(&store, body.into_inner()).await?;
    let state = user_service::session_state(&store, chrono::Utc::now()).await;

    Ok(HttpResponse::Ok().json(state))
}

/// DELETE /api/v1/session
#[utoipa::path(
    delete,
    path = "/api/v1/session",
    tag = "Session",
    responses((status = 200, description = "Logged out"))
)]
pub async fn logout(store: web::Data<EntityStore>) -> Result<HttpResponse, AppError> {
    let logged_out = user_service::logout(&store).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "logged_out": logged_out
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{test, App};
    use serde_json::json;

    #[actix_web::test]
    async fn test_login_then_logout() {
        let store = EntityStore::in_memory();
        let app = test::init_service(
            App::new().app_data(web::Data::new(store.clone())).service(
                web::resource("/api/v1/session")
                    .route(web::get().to(get_session))
                    .route(web::post().to(login))
                    .route(web::delete().to(logout)),
            ),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/v1/session")
            .set_json(json!({
                "user_id": 42,
                "name": "Alma Mater",
                "email": "alma@illinois.edu",
                "token": "abc",
                "barcode_data": "AQID",
                "expiration_time": "2099-01-01T00:00:00Z"
            }))
            .to_request();
        let state: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(state["state"], "active");
        assert_eq!(state["user_id"], 42);

        let user = user_service::current_user(&store).await.unwrap();
        assert_eq!(user.barcode_data, vec![1, 2, 3]);

        let req = test::TestRequest::delete().uri("/api/v1/session").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["logged_out"], true);

        let req = test::TestRequest::get().uri("/api/v1/session").to_request();
        let state: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(state["state"], "logged_out");
    }

    #[actix_web::test]
    async fn test_login_without_token_is_rejected() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(EntityStore::in_memory()))
                .route("/api/v1/session", web::post().to(login)),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/v1/session")
            .set_json(json!({
                "user_id": 1,
                "name": "x",
                "email": "x@illinois.edu",
                "token": "",
                "expiration_time": "2099-01-01T00:00:00Z"
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::BAD_REQUEST);
    }
}
