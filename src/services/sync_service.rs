// ==================== FEED SYNCHRONIZATION ====================
// Reconciles records from the remote events feed into the entity store.
// Locations and tags are found-or-created by name, feeds by id; every feed
// link is written on both sides.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeSet;

use crate::{
    models::{EventsEnvelope, Feed, Location, RemoteEvent, Tag},
    store::{EntityStore, ObjectGraph},
    utils::AppError,
};

#[derive(Debug, Default, Clone, PartialEq, Serialize, utoipa::ToSchema)]
pub struct SyncReport {
    pub received: usize,
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
}

/// Returns the location named `name`, creating it when absent. An existing
/// location is returned untouched. `feeds` seeds the link set of a new
/// location; ids of feeds that do not exist are skipped.
pub fn find_or_create_location(
    graph: &mut ObjectGraph,
    name: &str,
    short_name: &str,
    latitude: f64,
    longitude: f64,
    address: &str,
    feeds: Option<&[i64]>,
) -> Location {
    if let Some(existing) = graph.location(name) {
        return existing.clone();
    }

    let mut location = Location {
        name: name.to_string(),
        short_name: short_name.to_string(),
        latitude,
        longitude,
        address: address.to_string(),
        feeds: BTreeSet::new(),
    };
    graph.insert_location(location.clone());

    for &feed_id in feeds.unwrap_or_default() {
        if graph.link_location(feed_id, name) {
            location.feeds.insert(feed_id);
        } else {
            log::warn!("⚠️  Location '{}': feed {} does not exist, link skipped", name, feed_id);
        }
    }

    log::debug!("📍 Created location '{}'", name);
    location
}

/// Same contract as `find_or_create_location`, keyed by tag name.
pub fn find_or_create_tag(graph: &mut ObjectGraph, name: &str, feeds: Option<&[i64]>) -> Tag {
    if let Some(existing) = graph.tag(name) {
        return existing.clone();
    }

    let mut tag = Tag { name: name.to_string(), feeds: BTreeSet::new() };
    graph.insert_tag(tag.clone());

    for &feed_id in feeds.unwrap_or_default() {
        if graph.link_tag(feed_id, name) {
            tag.feeds.insert(feed_id);
        } else {
            log::warn!("⚠️  Tag '{}': feed {} does not exist, link skipped", name, feed_id);
        }
    }

    log::debug!("🏷️  Created tag '{}'", name);
    tag
}

/// Creates the feed `id`, or refreshes it when it already exists: fields are
/// overwritten and the link sets replaced by `locations`/`tags`, with stale
/// back-links removed.
///
/// Every named location and tag must already exist in `graph`; otherwise
/// nothing is changed and `NotFound` is returned.
pub fn find_or_create_feed(
    graph: &mut ObjectGraph,
    id: i64,
    message: &str,
    timestamp_secs: i64,
    tag: Option<&str>,
    locations: &[String],
    tags: &[String],
) -> Result<Feed, AppError> {
    let time: DateTime<Utc> = DateTime::from_timestamp(timestamp_secs, 0)
        .ok_or_else(|| AppError::InvalidRequest(format!("timestamp {} out of range", timestamp_secs)))?;

    if let Some(missing) = locations.iter().find(|name| graph.location(name).is_none()) {
        return Err(AppError::NotFound(format!("location '{}' for feed {}", missing, id)));
    }
    if let Some(missing) = tags.iter().find(|name| graph.tag(name).is_none()) {
        return Err(AppError::NotFound(format!("tag '{}' for feed {}", missing, id)));
    }

    let previous = graph.feed(id).cloned();
    graph.upsert_feed_fields(id, message, time, tag.map(str::to_string));

    if let Some(previous) = previous {
        for name in previous.locations.iter().filter(|name| !locations.contains(*name)) {
            graph.unlink_location(id, name);
        }
        for name in previous.tags.iter().filter(|name| !tags.contains(*name)) {
            graph.unlink_tag(id, name);
        }
    }

    for name in locations {
        graph.link_location(id, name);
    }
    for name in tags {
        graph.link_tag(id, name);
    }

    graph
        .feed(id)
        .cloned()
        .ok_or_else(|| AppError::NotFound(format!("feed {}", id)))
}

/// Applies a whole `GET /events` payload in one transaction. Malformed
/// records are logged and skipped; the rest of the batch still commits.
pub async fn configure_events(store: &EntityStore, payload: &serde_json::Value) -> Result<SyncReport, AppError> {
    let envelope: EventsEnvelope = serde_json::from_value(payload.clone())
        .map_err(|e| AppError::InvalidPayload(format!("events envelope: {}", e)))?;

    let mut report = SyncReport { received: envelope.data.len(), ..Default::default() };

    let mut events = Vec::with_capacity(envelope.data.len());
    for (index, raw) in envelope.data.iter().enumerate() {
        match RemoteEvent::decode(raw) {
            Ok(event) => events.push(event),
            Err(e) => {
                report.skipped += 1;
                log::warn!("⚠️  Skipping event record #{}: {}", index, e);
            }
        }
    }

    let mut tx = store.begin().await;

    for event in &events {
        for location in &event.locations {
            let (latitude, longitude) = location.coordinates();
            find_or_create_location(
                &mut tx,
                location.name(),
                location.short_name(),
                latitude,
                longitude,
                location.address(),
                None,
            );
            // Detailed records win over whatever a bare name created earlier
            if location.is_detailed()
                && tx.refresh_location_fields(
                    location.name(),
                    location.short_name(),
                    latitude,
                    longitude,
                    location.address(),
                )
            {
                log::debug!("📍 Refreshed location '{}'", location.name());
            }
        }
        for tag in &event.tags {
            find_or_create_tag(&mut tx, tag, None);
        }

        let existed = tx.feed(event.id).is_some();
        let location_names: Vec<String> = event.locations.iter().map(|l| l.name().to_string()).collect();

        match find_or_create_feed(
            &mut tx,
            event.id,
            &event.message,
            event.timestamp,
            event.tag.as_deref(),
            &location_names,
            &event.tags,
        ) {
            Ok(_) if existed => report.updated += 1,
            Ok(_) => report.created += 1,
            Err(e) => {
                report.skipped += 1;
                log::warn!("⚠️  Skipping event {}: {}", event.id, e);
            }
        }
    }

    tx.set_last_updated(Utc::now());
    tx.commit()?;

    store.save_in_background();

    log::info!(
        "🔄 Events synced: {} received, {} created, {} updated, {} skipped",
        report.received,
        report.created,
        report.updated,
        report.skipped
    );

    Ok(report)
}
