use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

use crate::database::{PendingWrites, StoreSnapshot, UserWrite};
use crate::models::{Feed, HelpQ, Location, Tag, User};

/// Keys of the entities touched since the last successful save
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ChangeSet {
    user: bool,
    feeds: BTreeSet<i64>,
    locations: BTreeSet<String>,
    tags: BTreeSet<String>,
    help_q: BTreeSet<Uuid>,
    last_updated: bool,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        !self.user
            && !self.last_updated
            && self.feeds.is_empty()
            && self.locations.is_empty()
            && self.tags.is_empty()
            && self.help_q.is_empty()
    }

    fn merge(&mut self, other: ChangeSet) {
        self.user |= other.user;
        self.last_updated |= other.last_updated;
        self.feeds.extend(other.feeds);
        self.locations.extend(other.locations);
        self.tags.extend(other.tags);
        self.help_q.extend(other.help_q);
    }
}

/// The object graph behind the entity store.
///
/// Feeds link to locations and tags by name, and locations and tags link
/// back to feeds by id. Every link operation updates both sides.
#[derive(Debug, Default, Clone)]
pub struct ObjectGraph {
    user: Option<User>,
    feeds: BTreeMap<i64, Feed>,
    locations: BTreeMap<String, Location>,
    tags: BTreeMap<String, Tag>,
    help_q: BTreeMap<Uuid, HelpQ>,
    last_updated: Option<DateTime<Utc>>,
    changes: ChangeSet,
}

impl ObjectGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the graph from persisted state. Back-links are recomputed from
    /// the feed side so a store saved halfway through a batch comes back
    /// consistent; links to entities that no longer exist are dropped.
    pub fn from_snapshot(snapshot: StoreSnapshot) -> Self {
        let mut graph = ObjectGraph {
            user: snapshot.user,
            last_updated: snapshot.last_updated,
            ..Default::default()
        };

        for mut location in snapshot.locations {
            location.feeds.clear();
            graph.locations.insert(location.name.clone(), location);
        }
        for mut tag in snapshot.tags {
            tag.feeds.clear();
            graph.tags.insert(tag.name.clone(), tag);
        }
        for item in snapshot.help_q {
            graph.help_q.insert(item.id, item);
        }

        let mut repaired = 0usize;
        for mut feed in snapshot.feeds {
            let before = feed.locations.len() + feed.tags.len();
            feed.locations.retain(|name| graph.locations.contains_key(name));
            feed.tags.retain(|name| graph.tags.contains_key(name));
            repaired += before - feed.locations.len() - feed.tags.len();

            for name in &feed.locations {
                if let Some(location) = graph.locations.get_mut(name) {
                    location.feeds.insert(feed.id);
                }
            }
            for name in &feed.tags {
                if let Some(tag) = graph.tags.get_mut(name) {
                    tag.feeds.insert(feed.id);
                }
            }
            graph.feeds.insert(feed.id, feed);
        }

        if repaired > 0 {
            log::warn!("🔧 Dropped {} dangling feed links while loading the store", repaired);
        }

        graph
    }

    // ---------- reads ----------

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn feed(&self, id: i64) -> Option<&Feed> {
        self.feeds.get(&id)
    }

    pub fn location(&self, name: &str) -> Option<&Location> {
        self.locations.get(name)
    }

    pub fn tag(&self, name: &str) -> Option<&Tag> {
        self.tags.get(name)
    }

    pub fn feeds(&self) -> impl Iterator<Item = &Feed> {
        self.feeds.values()
    }

    pub fn locations(&self) -> impl Iterator<Item = &Location> {
        self.locations.values()
    }

    pub fn tags(&self) -> impl Iterator<Item = &Tag> {
        self.tags.values()
    }

    pub fn help_q(&self) -> impl Iterator<Item = &HelpQ> {
        self.help_q.values()
    }

    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.last_updated
    }

    pub fn has_changes(&self) -> bool {
        !self.changes.is_empty()
    }

    // ---------- writes ----------

    pub fn set_user(&mut self, user: Option<User>) {
        self.user = user;
        self.changes.user = true;
    }

    /// Inserts or replaces a location's own fields; its feed links are kept
    /// as given and must be mirrored by the caller through `link_location`.
    pub fn insert_location(&mut self, location: Location) {
        self.changes.locations.insert(location.name.clone());
        self.locations.insert(location.name.clone(), location);
    }

    /// Overwrites a location's descriptive fields, keeping its feed links.
    /// Returns true when anything changed.
    pub fn refresh_location_fields(
        &mut self,
        name: &str,
        short_name: &str,
        latitude: f64,
        longitude: f64,
        address: &str,
    ) -> bool {
        let Some(location) = self.locations.get_mut(name) else {
            return false;
        };
        if location.short_name == short_name
            && location.latitude == latitude
            && location.longitude == longitude
            && location.address == address
        {
            return false;
        }

        location.short_name = short_name.to_string();
        location.latitude = latitude;
        location.longitude = longitude;
        location.address = address.to_string();
        self.changes.locations.insert(name.to_string());
        true
    }

    pub fn insert_tag(&mut self, tag: Tag) {
        self.changes.tags.insert(tag.name.clone());
        self.tags.insert(tag.name.clone(), tag);
    }

    /// Inserts a feed without links, or refreshes the scalar fields of an
    /// existing one while keeping its links.
    pub fn upsert_feed_fields(&mut self, id: i64, message: &str, time: DateTime<Utc>, tag: Option<String>) {
        let feed = self.feeds.entry(id).or_insert_with(|| Feed {
            id,
            message: String::new(),
            time,
            tag: None,
            locations: BTreeSet::new(),
            tags: BTreeSet::new(),
        });
        feed.message = message.to_string();
        feed.time = time;
        feed.tag = tag;
        self.changes.feeds.insert(id);
    }

    /// Links a feed and a location both ways. Returns false when either side
    /// is missing.
    pub fn link_location(&mut self, feed_id: i64, name: &str) -> bool {
        let (Some(feed), Some(location)) = (self.feeds.get_mut(&feed_id), self.locations.get_mut(name)) else {
            return false;
        };
        feed.locations.insert(name.to_string());
        location.feeds.insert(feed_id);
        self.changes.feeds.insert(feed_id);
        self.changes.locations.insert(name.to_string());
        true
    }

    pub fn unlink_location(&mut self, feed_id: i64, name: &str) {
        if let Some(feed) = self.feeds.get_mut(&feed_id) {
            if feed.locations.remove(name) {
                self.changes.feeds.insert(feed_id);
            }
        }
        if let Some(location) = self.locations.get_mut(name) {
            if location.feeds.remove(&feed_id) {
                self.changes.locations.insert(name.to_string());
            }
        }
    }

    pub fn link_tag(&mut self, feed_id: i64, name: &str) -> bool {
        let (Some(feed), Some(tag)) = (self.feeds.get_mut(&feed_id), self.tags.get_mut(name)) else {
            return false;
        };
        feed.tags.insert(name.to_string());
        tag.feeds.insert(feed_id);
        self.changes.feeds.insert(feed_id);
        self.changes.tags.insert(name.to_string());
        true
    }

    pub fn unlink_tag(&mut self, feed_id: i64, name: &str) {
        if let Some(feed) = self.feeds.get_mut(&feed_id) {
            if feed.tags.remove(name) {
                self.changes.feeds.insert(feed_id);
            }
        }
        if let Some(tag) = self.tags.get_mut(name) {
            if tag.feeds.remove(&feed_id) {
                self.changes.tags.insert(name.to_string());
            }
        }
    }

    pub fn insert_help_q(&mut self, item: HelpQ) {
        self.changes.help_q.insert(item.id);
        self.help_q.insert(item.id, item);
    }

    /// Applies `update` to the help queue item and returns the new value.
    pub fn update_help_q<F>(&mut self, id: &Uuid, update: F) -> Option<HelpQ>
    where
        F: FnOnce(&mut HelpQ),
    {
        let item = self.help_q.get_mut(id)?;
        update(item);
        self.changes.help_q.insert(*id);
        Some(item.clone())
    }

    pub fn set_last_updated(&mut self, time: DateTime<Utc>) {
        self.last_updated = Some(time);
        self.changes.last_updated = true;
    }

    // ---------- save support ----------

    /// Drains the change set into the writes a backend has to apply.
    pub fn take_pending_writes(&mut self) -> (ChangeSet, PendingWrites) {
        let changes = std::mem::take(&mut self.changes);

        let writes = PendingWrites {
            user: changes.user.then(|| match &self.user {
                Some(user) => UserWrite::Upsert(user.clone()),
                None => UserWrite::Delete,
            }),
            feeds: changes.feeds.iter().filter_map(|id| self.feeds.get(id).cloned()).collect(),
            locations: changes
                .locations
                .iter()
                .filter_map(|name| self.locations.get(name).cloned())
                .collect(),
            tags: changes.tags.iter().filter_map(|name| self.tags.get(name).cloned()).collect(),
            help_q: changes.help_q.iter().filter_map(|id| self.help_q.get(id).cloned()).collect(),
            last_updated: if changes.last_updated { self.last_updated } else { None },
        };

        (changes, writes)
    }

    /// Puts back the keys of a save that failed so the next save retries them.
    pub fn restore_changes(&mut self, changes: ChangeSet) {
        self.changes.merge(changes);
    }

    #[cfg(test)]
    pub fn is_consistent(&self) -> bool {
        let feeds_ok = self.feeds.values().all(|feed| {
            feed.locations
                .iter()
                .all(|name| self.locations.get(name).is_some_and(|l| l.feeds.contains(&feed.id)))
                && feed
                    .tags
                    .iter()
                    .all(|name| self.tags.get(name).is_some_and(|t| t.feeds.contains(&feed.id)))
        });
        let locations_ok = self.locations.values().all(|location| {
            location
                .feeds
                .iter()
                .all(|id| self.feeds.get(id).is_some_and(|f| f.locations.contains(&location.name)))
        });
        let tags_ok = self.tags.values().all(|tag| {
            tag.feeds
                .iter()
                .all(|id| self.feeds.get(id).is_some_and(|f| f.tags.contains(&tag.name)))
        });
        feeds_ok && locations_ok && tags_ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn location(name: &str) -> Location {
        Location {
            name: name.to_string(),
            short_name: name.to_string(),
            latitude: 40.1138,
            longitude: -88.2249,
            address: String::new(),
            feeds: BTreeSet::new(),
        }
    }

    #[test]
    fn test_link_and_unlink_keep_both_sides() {
        let mut graph = ObjectGraph::new();
        graph.insert_location(location("Siebel Center"));
        graph.upsert_feed_fields(1, "Opening Ceremony", Utc::now(), None);

        assert!(graph.link_location(1, "Siebel Center"));
        assert!(graph.feed(1).unwrap().locations.contains("Siebel Center"));
        assert!(graph.location("Siebel Center").unwrap().feeds.contains(&1));
        assert!(graph.is_consistent());

        graph.unlink_location(1, "Siebel Center");
        assert!(graph.feed(1).unwrap().locations.is_empty());
        assert!(graph.location("Siebel Center").unwrap().feeds.is_empty());
        assert!(graph.is_consistent());
    }

    #[test]
    fn test_refresh_location_fields_keeps_links() {
        let mut graph = ObjectGraph::new();
        graph.insert_location(location("ECEB"));
        graph.upsert_feed_fields(3, "Dinner", Utc::now(), None);
        graph.link_location(3, "ECEB");
        let _ = graph.take_pending_writes();

        assert!(!graph.refresh_location_fields("ECEB", "ECEB", 40.1138, -88.2249, ""));
        assert!(!graph.has_changes());

        assert!(graph.refresh_location_fields("ECEB", "ECE", 40.115, -88.228, "306 N Wright St"));
        let ece = graph.location("ECEB").unwrap();
        assert_eq!(ece.short_name, "ECE");
        assert!(ece.feeds.contains(&3));
        assert!(graph.has_changes());

        assert!(!graph.refresh_location_fields("Nowhere", "N", 0.0, 0.0, ""));
    }

    #[test]
    fn test_link_to_missing_entity_is_refused() {
        let mut graph = ObjectGraph::new();
        graph.upsert_feed_fields(1, "Opening Ceremony", Utc::now(), None);
        assert!(!graph.link_tag(1, "HACKATHON"));
        assert!(graph.feed(1).unwrap().tags.is_empty());
    }

    #[test]
    fn test_take_pending_writes_drains_changes() {
        let mut graph = ObjectGraph::new();
        graph.insert_tag(Tag { name: "FOOD".to_string(), feeds: BTreeSet::new() });
        graph.set_last_updated(Utc::now());
        assert!(graph.has_changes());

        let (changes, writes) = graph.take_pending_writes();
        assert!(!graph.has_changes());
        assert_eq!(writes.tags.len(), 1);
        assert!(writes.last_updated.is_some());
        assert!(writes.user.is_none());

        graph.restore_changes(changes);
        assert!(graph.has_changes());
    }

    #[test]
    fn test_removed_user_becomes_delete_write() {
        let mut graph = ObjectGraph::new();
        graph.set_user(None);
        let (_, writes) = graph.take_pending_writes();
        assert_eq!(writes.user, Some(UserWrite::Delete));
    }

    #[test]
    fn test_from_snapshot_rebuilds_back_links() {
        let mut stale = location("Siebel Center");
        stale.feeds.insert(99);

        let snapshot = StoreSnapshot {
            feeds: vec![Feed {
                id: 1,
                message: "Opening Ceremony".to_string(),
                time: Utc::now(),
                tag: None,
                locations: ["Siebel Center".to_string(), "Gone Hall".to_string()].into_iter().collect(),
                tags: BTreeSet::new(),
            }],
            locations: vec![stale],
            ..Default::default()
        };

        let graph = ObjectGraph::from_snapshot(snapshot);
        assert!(graph.is_consistent());
        assert_eq!(graph.location("Siebel Center").unwrap().feeds, [1].into_iter().collect());
        assert_eq!(graph.feed(1).unwrap().locations.len(), 1);
        assert!(!graph.has_changes());
    }
}
