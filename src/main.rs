mod api;
mod config;
mod database;
mod jobs;
mod models;
mod services;
mod store;
mod utils;

use actix_web::{middleware::Logger, web, App, HttpServer};
use dotenv::dotenv;
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    config::AppConfig,
    database::{MemoryBackend, PersistentStore},
    jobs::FeedPoller,
    services::{
        events_service::HttpEventSource,
        schedule_service::ScheduleHandle,
        user_service::{self, SessionState},
    },
    store::EntityStore,
};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load environment variables
    dotenv().ok();

    // Initialize logger
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = AppConfig::from_env();

    log::info!("🚀 Starting Companion Sync...");
    log::info!("📡 Events API: {}", config.events_api_url);

    // Persistent store: MongoDB when configured, otherwise process memory
    let backend: Arc<dyn PersistentStore> = match &config.database_url {
        Some(url) => {
            log::info!("📊 Database: {}", url);
            let db = database::MongoDB::new(url)
                .await
                .expect("Failed to connect to MongoDB");
            log::info!("✅ MongoDB connected successfully");
            Arc::new(db)
        }
        None => {
            log::warn!("⚠️  DATABASE_URL not set, entities are kept in memory only");
            Arc::new(MemoryBackend::new())
        }
    };

    let store = EntityStore::open(backend)
        .await
        .expect("Failed to load the entity store");

    match user_service::session_state(&store, chrono::Utc::now()).await {
        SessionState::LoggedOut => log::info!("👤 No user logged in"),
        SessionState::Expired { email } => log::info!("👤 Session of {} expired, login required", email),
        SessionState::Active { user_id, expires_at, .. } => {
            log::info!("👤 User {} logged in until {}", user_id, expires_at)
        }
    }

    let schedule = ScheduleHandle::new(config.schedule_source);
    schedule.refresh(&store).await;

    // 🔁 Background feed poller
    let source = HttpEventSource::new(&config.events_api_url).expect("Failed to build HTTP client");
    let poller = FeedPoller::new(store.clone(), Arc::new(source), schedule.clone());

    let countdown_schedule = schedule.clone();
    poller
        .register_task("hacking-countdown", move || {
            let schedule = countdown_schedule.clone();
            async move {
                let schedule = schedule.current().await;
                let now = chrono::Utc::now();
                if now < schedule.hacking_begin {
                    log::debug!("⏳ Hacking begins in {}m", (schedule.hacking_begin - now).num_minutes());
                } else if now < schedule.hacking_end {
                    log::debug!("⏳ Hacking ends in {}m", (schedule.hacking_end - now).num_minutes());
                }
                Ok(())
            }
        })
        .await;

    let poller_handle = if config.poll_enabled {
        Some(poller.start(config.poll_interval))
    } else {
        log::info!("⏸️  Feed poller disabled (POLL_ENABLED=false)");
        None
    };

    let store_data = web::Data::new(store.clone());
    let schedule_data = web::Data::new(schedule);

    log::info!("🌐 Server starting on {}:{}", config.host, config.port);
    log::info!("📚 Swagger UI available at: http://{}:{}/swagger-ui/", config.host, config.port);
    log::info!("📄 OpenAPI spec at: http://{}:{}/api-docs/openapi.json", config.host, config.port);

    // Start HTTP server
    let server = HttpServer::new(move || {
        // Generate OpenAPI specification
        let openapi = api::swagger::ApiDoc::openapi();

        App::new()
            .app_data(store_data.clone())
            .app_data(schedule_data.clone())
            .wrap(Logger::default())
            .service(SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", openapi))
            // Health check
            .route("/health", web::get().to(api::health::health_check))
            // Metrics
            .route("/metrics", web::get().to(api::metrics::get_metrics))
            // ==================== FEEDS ====================
            .service(
                web::scope("/api/v1")
                    .route("/feeds", web::get().to(api::feeds::get_feeds))
                    .route("/locations", web::get().to(api::feeds::get_locations))
                    .route("/tags", web::get().to(api::feeds::get_tags))
                    .route("/schedule", web::get().to(api::feeds::get_schedule))
                    // ==================== SESSION ====================
                    .service(
                        web::resource("/session")
                            .route(web::get().to(api::session::get_session))
                            .route(web::post().to(api::session::login))
                            .route(web::delete().to(api::session::logout)),
                    )
                    // ==================== HELP QUEUE ====================
                    .route("/helpq", web::get().to(api::helpq::list_help_q))
                    .route("/helpq", web::post().to(api::helpq::create_help_q))
                    .route("/helpq/{id}/chat", web::post().to(api::helpq::push_chat))
                    // ==================== NOTIFICATIONS ====================
                    .route(
                        "/notifications/received",
                        web::post().to(api::notifications::notification_received),
                    )
                    .route(
                        "/notifications/action",
                        web::post().to(api::notifications::notification_action),
                    ),
            )
    })
    .bind(format!("{}:{}", config.host, config.port))?
    .run();

    let result = server.await;

    // Shutdown: stop the timer, refuse further commits, flush what is pending
    log::info!("🛑 Shutting down...");
    if let Some(handle) = poller_handle {
        handle.shutdown().await;
    }
    store.close();
    match store.save_now().await {
        Ok(written) => log::info!("💾 Final save: {} writes", written),
        Err(e) => log::error!("❌ Final save failed: {}", e),
    }

    result
}
