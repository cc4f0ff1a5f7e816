use std::env;
use std::time::Duration;

use crate::services::schedule_service::ScheduleSource;

const DEFAULT_EVENTS_API_URL: &str = "https://api.hackillinois.org/v1";
const DEFAULT_POLL_INTERVAL_SECS: u64 = 10;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: String,
    /// None runs on the in-memory store
    pub database_url: Option<String>,
    pub events_api_url: String,
    pub poll_interval: Duration,
    pub poll_enabled: bool,
    pub schedule_source: ScheduleSource,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let poll_secs = get("POLL_INTERVAL_SECS")
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(DEFAULT_POLL_INTERVAL_SECS)
            .max(1);

        let schedule_source = match get("SCHEDULE_SOURCE") {
            Some(value) => value.parse().unwrap_or_else(|e| {
                log::warn!("⚠️  {}, using fixed schedule", e);
                ScheduleSource::Fixed
            }),
            None => ScheduleSource::Fixed,
        };

        AppConfig {
            host: get("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: get("PORT").unwrap_or_else(|| "3002".to_string()),
            database_url: get("DATABASE_URL").filter(|v| !v.trim().is_empty()),
            events_api_url: get("EVENTS_API_URL").unwrap_or_else(|| DEFAULT_EVENTS_API_URL.to_string()),
            poll_interval: Duration::from_secs(poll_secs),
            poll_enabled: get("POLL_ENABLED")
                .map(|v| !matches!(v.trim().to_lowercase().as_str(), "false" | "0" | "no"))
                .unwrap_or(true),
            schedule_source,
        }
    }
}
