use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Result envelope returned by `GET /events`
#[derive(Debug, Deserialize)]
pub struct EventsEnvelope {
    /// Raw records, decoded one by one so a bad record never sinks the batch
    pub data: Vec<serde_json::Value>,
}

/// Feed-like record from the remote events endpoint
#[derive(Debug, Deserialize, Clone)]
pub struct RemoteEvent {
    pub id: i64,
    pub message: String,
    /// Seconds since the Unix epoch
    pub timestamp: i64,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub locations: Vec<RemoteLocation>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// A location is either just its name or the full description
#[derive(Debug, Deserialize, Clone)]
#[serde(untagged)]
pub enum RemoteLocation {
    Name(String),
    Detailed(RemoteLocationDetail),
}

#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct RemoteLocationDetail {
    pub name: String,
    #[serde(default, alias = "short_name")]
    pub short_name: Option<String>,
    #[serde(default)]
    pub latitude: f64,
    #[serde(default)]
    pub longitude: f64,
    #[serde(default)]
    pub address: String,
}

impl RemoteLocation {
    pub fn name(&self) -> &str {
        match self {
            RemoteLocation::Name(name) => name,
            RemoteLocation::Detailed(detail) => &detail.name,
        }
    }

    /// Falls back to the full name when no abbreviation was sent
    pub fn short_name(&self) -> &str {
        match self {
            RemoteLocation::Name(name) => name,
            RemoteLocation::Detailed(detail) => detail.short_name.as_deref().unwrap_or(&detail.name),
        }
    }

    /// True when the record carries geometry and an address, not just a name
    pub fn is_detailed(&self) -> bool {
        matches!(self, RemoteLocation::Detailed(_))
    }

    pub fn coordinates(&self) -> (f64, f64) {
        match self {
            RemoteLocation::Name(_) => (0.0, 0.0),
            RemoteLocation::Detailed(detail) => (detail.latitude, detail.longitude),
        }
    }

    pub fn address(&self) -> &str {
        match self {
            RemoteLocation::Name(_) => "",
            RemoteLocation::Detailed(detail) => &detail.address,
        }
    }
}

impl RemoteEvent {
    /// Decodes and validates one raw record.
    pub fn decode(raw: &serde_json::Value) -> Result<Self, String> {
        let event: RemoteEvent =
            serde_json::from_value(raw.clone()).map_err(|e| format!("undecodable record: {}", e))?;
        event.validate()?;
        Ok(event)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.message.trim().is_empty() {
            return Err(format!("event {} has an empty message", self.id));
        }
        if self.time().is_none() {
            return Err(format!("event {} has an out of range timestamp {}", self.id, self.timestamp));
        }
        for location in &self.locations {
            if location.name().trim().is_empty() {
                return Err(format!("event {} references a location without a name", self.id));
            }
            let (latitude, longitude) = location.coordinates();
            if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
                return Err(format!(
                    "event {} location '{}' has invalid coordinates ({}, {})",
                    self.id,
                    location.name(),
                    latitude,
                    longitude
                ));
            }
        }
        if self.tags.iter().any(|t| t.trim().is_empty()) {
            return Err(format!("event {} has an empty tag name", self.id));
        }
        Ok(())
    }

    pub fn time(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.timestamp, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_accepts_plain_and_detailed_locations() {
        let raw = json!({
            "id": 7,
            "message": "Lunch",
            "timestamp": 1487995200,
            "locations": [
                "Siebel Center",
                {"name": "Digital Computer Laboratory", "shortName": "DCL", "latitude": 40.113, "longitude": -88.226, "address": "1304 W Springfield Ave"}
            ],
            "tags": ["FOOD"]
        });

        let event = RemoteEvent::decode(&raw).unwrap();
        assert_eq!(event.locations.len(), 2);
        assert_eq!(event.locations[0].name(), "Siebel Center");
        assert_eq!(event.locations[0].short_name(), "Siebel Center");
        assert_eq!(event.locations[1].short_name(), "DCL");
        assert_eq!(event.locations[1].coordinates(), (40.113, -88.226));
        assert!(event.tag.is_none());
    }

    #[test]
    fn test_decode_rejects_missing_fields() {
        let raw = json!({"id": 1, "timestamp": 1487973600});
        assert!(RemoteEvent::decode(&raw).is_err());
    }

    #[test]
    fn test_validate_rejects_blank_message_and_bad_coordinates() {
        let blank = json!({"id": 2, "message": "  ", "timestamp": 0});
        assert!(RemoteEvent::decode(&blank).unwrap_err().contains("empty message"));

        let off_planet = json!({
            "id": 3,
            "message": "Somewhere",
            "timestamp": 0,
            "locations": [{"name": "Nowhere", "latitude": 120.0, "longitude": 0.0}]
        });
        assert!(RemoteEvent::decode(&off_planet).unwrap_err().contains("invalid coordinates"));
    }

    #[test]
    fn test_envelope_keeps_records_raw() {
        let envelope: EventsEnvelope = serde_json::from_value(json!({
            "meta": null,
            "data": [{"id": 1}, "garbage"]
        }))
        .unwrap();
        assert_eq!(envelope.data.len(), 2);
    }
}
