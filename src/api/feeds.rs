use actix_web::{web, HttpResponse};
use serde::Deserialize;

use crate::{
    models::{Feed, Location, Tag},
    services::schedule_service::{HackathonSchedule, ScheduleHandle},
    store::{EntityStore, FetchRequest},
    utils::AppError,
};

#[derive(Deserialize, utoipa::IntoParams)]
pub struct FeedsQuery {
    /// Only feeds linked to this tag
    pub tag: Option<String>,
    pub limit: Option<usize>,
}

/// GET /api/v1/feeds - Feeds, newest first
#[utoipa::path(
    get,
    path = "/api/v1/feeds",
    tag = "Feeds",
    params(FeedsQuery),
    responses(
        (status = 200, description = "Feeds sorted by time, newest first", body = [Feed]),
        (status = 404, description = "Unknown tag")
    )
)]
pub async fn get_feeds(
    store: web::Data<EntityStore>,
    query: web::Query<FeedsQuery>,
) -> Result<HttpResponse, AppError> {
    let FeedsQuery { tag, limit } = query.into_inner();

    let tagged = match tag.as_deref() {
        Some(name) => {
            let ids = store.read(|graph| graph.tag(name).map(|t| t.feeds.clone())).await;
            Some(ids.ok_or_else(|| AppError::NotFound(format!("tag {}", name)))?)
        }
        None => None,
    };

    let feeds = store
        .load_with(|request: &mut FetchRequest<Feed>| {
            if let Some(ids) = tagged {
                request.filter(move |feed| ids.contains(&feed.id));
            }
            request.sort_by(|a, b| b.time.cmp(&a.time));
            if let Some(limit) = limit {
                request.limit(limit);
            }
        })
        .await;

    log::debug!("📰 GET /feeds - {} feeds (tag: {:?})", feeds.len(), tag);
    Ok(HttpResponse::Ok().json(feeds))
}

/// GET /api/v1/locations
#[utoipa::path(
    get,
    path = "/api/v1/locations",
    tag = "Feeds",
    responses((status = 200, description = "All known locations", body = [Location]))
)]
pub async fn get_locations(store: web::Data<EntityStore>) -> HttpResponse {
    let locations = store
        .load_with(|request: &mut FetchRequest<Location>| {
            request.sort_by(|a, b| a.name.cmp(&b.name));
        })
        .await;
    HttpResponse::Ok().json(locations)
}

/// GET /api/v1/tags
#[utoipa::path(
    get,
    path = "/api/v1/tags",
    tag = "Feeds",
    responses((status = 200, description = "All known tags", body = [Tag]))
)]
pub async fn get_tags(store: web::Data<EntityStore>) -> HttpResponse {
    let tags = store
        .load_with(|request: &mut FetchRequest<Tag>| {
            request.sort_by(|a, b| a.name.cmp(&b.name));
        })
        .await;
    HttpResponse::Ok().json(tags)
}

/// GET /api/v1/schedule - Hackathon boundary times
#[utoipa::path(
    get,
    path = "/api/v1/schedule",
    tag = "Feeds",
    responses((status = 200, description = "Current hackathon schedule", body = HackathonSchedule))
)]
pub async fn get_schedule(schedule: web::Data<ScheduleHandle>) -> HttpResponse {
    HttpResponse::Ok().json(schedule.current().await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{schedule_service::ScheduleSource, sync_service::configure_events};
    use actix_web::{test, App};
    use serde_json::json;

    async fn seeded_store() -> EntityStore {
        let store = EntityStore::in_memory();
        let payload = json!({
            "data": [
                {"id": 1, "message": "Opening Ceremony", "timestamp": 1487973600,
                 "tags": ["HACKATHON"], "locations": ["Siebel Center"]},
                {"id": 2, "message": "Lunch is served", "timestamp": 1487988000,
                 "tags": ["FOOD"], "locations": ["ECEB"]},
                {"id": 3, "message": "Dinner is served", "timestamp": 1488009600,
                 "tags": ["FOOD"], "locations": ["ECEB"]}
            ]
        });
        configure_events(&store, &payload).await.unwrap();
        store
    }

    #[actix_web::test]
    async fn test_feeds_filtered_by_tag_newest_first() {
        let store = seeded_store().await;
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(store))
                .route("/api/v1/feeds", web::get().to(get_feeds)),
        )
        .await;

        let req = test::TestRequest::get().uri("/api/v1/feeds?tag=FOOD").to_request();
        let feeds: Vec<Feed> = test::call_and_read_body_json(&app, req).await;

        assert_eq!(feeds.iter().map(|f| f.id).collect::<Vec<_>>(), vec![3, 2]);
    }

    #[actix_web::test]
    async fn test_unknown_tag_is_not_found() {
        let store = seeded_store().await;
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(store))
                .route("/api/v1/feeds", web::get().to(get_feeds)),
        )
        .await;

        let req = test::TestRequest::get().uri("/api/v1/feeds?tag=SPORTS").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn test_locations_and_schedule() {
        let store = seeded_store().await;
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(store))
                .app_data(web::Data::new(ScheduleHandle::new(ScheduleSource::Fixed)))
                .route("/api/v1/locations", web::get().to(get_locations))
                .route("/api/v1/schedule", web::get().to(get_schedule)),
        )
        .await;

        let req = test::TestRequest::get().uri("/api/v1/locations").to_request();
        let locations: Vec<Location> = test::call_and_read_body_json(&app, req).await;
        assert_eq!(locations.len(), 2);
        assert_eq!(locations[0].name, "ECEB");
        assert_eq!(locations[0].feeds.len(), 2);

        let req = test::TestRequest::get().uri("/api/v1/schedule").to_request();
        let schedule: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert!(schedule.get("hackathon_begin").is_some());
    }
}
