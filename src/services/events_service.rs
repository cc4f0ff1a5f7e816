use async_trait::async_trait;

use crate::utils::AppError;

/// Where the poller pulls the events feed from
#[async_trait]
pub trait EventSource: Send + Sync {
    /// Raw JSON body of one `GET /events` call.
    async fn fetch_events(&self) -> Result<serde_json::Value, AppError>;
}

/// Events API over HTTP
pub struct HttpEventSource {
    client: reqwest::Client,
    base_url: String,
}

impl HttpEventSource {
    pub fn new(base_url: &str) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()?;

        Ok(HttpEventSource { client, base_url: base_url.trim_end_matches('/').to_string() })
    }

    pub fn events_url(&self) -> String {
        format!("{}/events", self.base_url)
    }
}

#[async_trait]
impl EventSource for HttpEventSource {
    async fn fetch_events(&self) -> Result<serde_json::Value, AppError> {
        let url = self.events_url();
        log::debug!("📡 Fetching events from {}", url);

        let response = self
            .client
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| AppError::FetchError(format!("Failed to fetch events: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::FetchError(format!("Events API error: {}", response.status())));
        }

        response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| AppError::InvalidPayload(format!("Failed to parse events: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_url_ignores_trailing_slash() {
        let source = HttpEventSource::new("https://api.hackillinois.org/v1/").unwrap();
        assert_eq!(source.events_url(), "https://api.hackillinois.org/v1/events");
    }

    #[tokio::test]
    async fn test_unreachable_api_is_a_fetch_error() {
        // Port 9 (discard) is closed on any sane test host
        let source = HttpEventSource::new("http://127.0.0.1:9").unwrap();
        let result = source.fetch_events().await;
        assert!(matches!(result, Err(AppError::FetchError(_))));
    }
}
