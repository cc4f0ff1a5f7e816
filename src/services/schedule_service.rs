// ==================== HACKATHON SCHEDULE ====================
// The four boundary timestamps of the event. Either the fixed values below
// or, when configured, the four HACKATHON-marked feeds ordered by time.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::{
    models::Feed,
    store::{EntityStore, FetchRequest},
};

const HACKATHON_BEGIN_SECS: i64 = 1487973600;
const HACKING_BEGIN_SECS: i64 = 1487995200;
const HACKING_END_SECS: i64 = 1488124800;
const HACKATHON_END_SECS: i64 = 1488146400;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, utoipa::ToSchema)]
pub struct HackathonSchedule {
    pub hackathon_begin: DateTime<Utc>,
    pub hacking_begin: DateTime<Utc>,
    pub hacking_end: DateTime<Utc>,
    pub hackathon_end: DateTime<Utc>,
}

impl HackathonSchedule {
    pub fn fixed() -> Self {
        HackathonSchedule {
            hackathon_begin: at(HACKATHON_BEGIN_SECS),
            hacking_begin: at(HACKING_BEGIN_SECS),
            hacking_end: at(HACKING_END_SECS),
            hackathon_end: at(HACKATHON_END_SECS),
        }
    }

    /// Builds the schedule from exactly four marker feeds, sorted by time.
    /// The two end markers are dated at the start of their last day, hence
    /// the extra day. None when an end marker is too late to shift.
    pub fn from_markers(markers: &[Feed]) -> Option<Self> {
        let [begin, hacking_begin, hacking_end, end] = markers else {
            return None;
        };

        Some(HackathonSchedule {
            hackathon_begin: begin.time,
            hacking_begin: hacking_begin.time,
            hacking_end: hacking_end.time.checked_add_signed(Duration::days(1))?,
            hackathon_end: end.time.checked_add_signed(Duration::days(1))?,
        })
    }
}

fn at(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or_default()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleSource {
    Fixed,
    Feeds,
}

impl FromStr for ScheduleSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fixed" => Ok(ScheduleSource::Fixed),
            "feeds" => Ok(ScheduleSource::Feeds),
            other => Err(format!("unknown schedule source '{}'", other)),
        }
    }
}

/// Shared, refreshable schedule
#[derive(Clone)]
pub struct ScheduleHandle {
    source: ScheduleSource,
    current: Arc<RwLock<HackathonSchedule>>,
}

impl ScheduleHandle {
    pub fn new(source: ScheduleSource) -> Self {
        ScheduleHandle { source, current: Arc::new(RwLock::new(HackathonSchedule::fixed())) }
    }

    pub async fn current(&self) -> HackathonSchedule {
        *self.current.read().await
    }

    /// Recomputes the schedule from the configured source.
    pub async fn refresh(&self, store: &EntityStore) -> HackathonSchedule {
        let schedule = match self.source {
            ScheduleSource::Fixed => HackathonSchedule::fixed(),
            ScheduleSource::Feeds => {
                let markers = store
                    .load_with(|request: &mut FetchRequest<Feed>| {
                        request.filter(Feed::is_schedule_marker).sort_by(|a, b| a.time.cmp(&b.time));
                    })
                    .await;

                match HackathonSchedule::from_markers(&markers) {
                    Some(schedule) => schedule,
                    None => {
                        log::warn!(
                            "⚠️  Expected 4 usable HACKATHON feeds, found {}; using fixed schedule",
                            markers.len()
                        );
                        HackathonSchedule::fixed()
                    }
                }
            }
        };

        *self.current.write().await = schedule;

        log::debug!(
            "🗓️  Schedule: begin {}, hacking {} - {}, end {}",
            schedule.hackathon_begin,
            schedule.hacking_begin,
            schedule.hacking_end,
            schedule.hackathon_end
        );

        schedule
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::sync_service::configure_events;
    use serde_json::json;

    fn marker_payload(count: i64) -> serde_json::Value {
        let data: Vec<_> = (0..count)
            .map(|i| {
                json!({
                    "id": 100 + i,
                    "message": format!("Marker {}", i),
                    "timestamp": 1500000000 + i * 3600,
                    "tag": "HACKATHON",
                    "tags": ["HACKATHON"]
                })
            })
            .collect();
        json!({ "data": data })
    }

    #[test]
    fn test_fixed_schedule_constants() {
        let schedule = HackathonSchedule::fixed();
        assert_eq!(schedule.hackathon_begin.timestamp(), 1487973600);
        assert_eq!(schedule.hacking_begin.timestamp(), 1487995200);
        assert_eq!(schedule.hacking_end.timestamp(), 1488124800);
        assert_eq!(schedule.hackathon_end.timestamp(), 1488146400);
    }

    #[test]
    fn test_schedule_source_parsing() {
        assert_eq!("FEEDS".parse::<ScheduleSource>(), Ok(ScheduleSource::Feeds));
        assert_eq!(" fixed ".parse::<ScheduleSource>(), Ok(ScheduleSource::Fixed));
        assert!("calendar".parse::<ScheduleSource>().is_err());
    }

    #[tokio::test]
    async fn test_derives_schedule_from_four_markers() {
        let store = EntityStore::in_memory();
        configure_events(&store, &marker_payload(4)).await.unwrap();

        let handle = ScheduleHandle::new(ScheduleSource::Feeds);
        let schedule = handle.refresh(&store).await;

        assert_eq!(schedule.hackathon_begin.timestamp(), 1500000000);
        assert_eq!(schedule.hacking_begin.timestamp(), 1500003600);
        assert_eq!(schedule.hacking_end.timestamp(), 1500007200 + 86400);
        assert_eq!(schedule.hackathon_end.timestamp(), 1500010800 + 86400);
        assert_eq!(handle.current().await, schedule);
    }

    #[tokio::test]
    async fn test_falls_back_when_marker_count_is_wrong() {
        let store = EntityStore::in_memory();
        configure_events(&store, &marker_payload(3)).await.unwrap();

        let handle = ScheduleHandle::new(ScheduleSource::Feeds);
        assert_eq!(handle.refresh(&store).await, HackathonSchedule::fixed());
    }

    #[tokio::test]
    async fn test_markers_at_end_of_time_fall_back_to_fixed() {
        let store = EntityStore::in_memory();
        let last = DateTime::<Utc>::MAX_UTC.timestamp();
        let data: Vec<_> = (0..4)
            .map(|i| {
                json!({
                    "id": 200 + i,
                    "message": format!("Marker {}", i),
                    "timestamp": last - 3 + i,
                    "tag": "HACKATHON"
                })
            })
            .collect();
        let report = configure_events(&store, &json!({ "data": data })).await.unwrap();
        assert_eq!(report.created, 4);

        let handle = ScheduleHandle::new(ScheduleSource::Feeds);
        assert_eq!(handle.refresh(&store).await, HackathonSchedule::fixed());
    }

    #[tokio::test]
    async fn test_fixed_source_ignores_feeds() {
        let store = EntityStore::in_memory();
        configure_events(&store, &marker_payload(4)).await.unwrap();

        let handle = ScheduleHandle::new(ScheduleSource::Fixed);
        assert_eq!(handle.refresh(&store).await, HackathonSchedule::fixed());
    }
}
