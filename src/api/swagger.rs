use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Companion Sync API",
        version = "1.0.0",
        description = "Local API of the hackathon companion.\n\n**Features:**\n- Event feeds, locations and tags kept in sync with the events API\n- Hackathon schedule\n- Device session (one user at a time)\n- Help queue with chat\n- Push notification hooks\n- Health monitoring and metrics"
    ),
    paths(
        // Health & Metrics
        crate::api::health::health_check,
        crate::api::metrics::get_metrics,

        // Feeds
        crate::api::feeds::get_feeds,
        crate::api::feeds::get_locations,
        crate::api::feeds::get_tags,
        crate::api::feeds::get_schedule,

        // Session
        crate::api::session::get_session,
        crate::api::session::login,
        crate::api::session::logout,

        // Help queue
        crate::api::helpq::list_help_q,
        crate::api::helpq::create_help_q,
        crate::api::helpq::push_chat,

        // Notifications
        crate::api::notifications::notification_received,
        crate::api::notifications::notification_action,
    ),
    components(
        schemas(
            crate::api::health::HealthResponse,
            crate::api::metrics::MetricsResponse,
            crate::store::StoreCounts,
            crate::models::Feed,
            crate::models::Location,
            crate::models::Tag,
            crate::models::HelpQ,
            crate::models::ChatItem,
            crate::models::NotificationPayload,
            crate::services::schedule_service::HackathonSchedule,
            crate::services::user_service::NewUser,
            crate::services::user_service::SessionState,
            crate::api::helpq::CreateHelpQRequest,
            crate::api::helpq::ChatRequest,
        )
    ),
    tags(
        (name = "Health", description = "Health check and metrics endpoints for monitoring service status."),
        (name = "Feeds", description = "Event feeds, locations, tags and the hackathon schedule."),
        (name = "Session", description = "The user logged in on this device."),
        (name = "HelpQ", description = "Help requests and their chat transcripts."),
        (name = "Notifications", description = "Push notification hooks."),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_lists_feed_routes() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/api/v1/feeds"));
        assert!(doc.paths.paths.contains_key("/api/v1/helpq/{id}/chat"));
    }
}
