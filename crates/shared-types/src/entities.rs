//! # Core Domain Entities
//!
//! The crash report record and its nested value types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// VALUE TYPES
// =============================================================================

/// A latitude/longitude pair produced by geocoding.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Location {
    /// Latitude in decimal degrees.
    pub lat: f64,
    /// Longitude in decimal degrees.
    pub lon: f64,
}

impl Location {
    /// Create a new coordinate pair.
    #[must_use]
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// Head counts for people aboard (or killed), split by role.
///
/// Used for both the `aboard` and `fatalities` fields of a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Aboard {
    #[serde(default, skip_serializing_if = "is_zero")]
    pub total: u32,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub crew: u32,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub passengers: u32,
}

impl Aboard {
    /// True when no count is known.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.total == 0 && self.crew == 0 && self.passengers == 0
    }
}

fn is_zero(value: &u32) -> bool {
    *value == 0
}

// =============================================================================
// CRASH REPORT
// =============================================================================

/// A single historical air-crash report.
///
/// Records have no natural business key. The `id` is assigned by the indexer
/// when the record is first committed, and `location_gps` is only present
/// once enrichment has succeeded. `score` is filled by search results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct FlightCrash {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub location: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub operator: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub flight_no: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub route: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub aircraft_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub registration: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub serial_number: String,
    #[serde(default, skip_serializing_if = "Aboard::is_empty")]
    pub aboard: Aboard,
    #[serde(default, skip_serializing_if = "Aboard::is_empty")]
    pub fatalities: Aboard,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub ground: u32,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub summary: String,
    #[serde(
        default,
        rename = "locationGPS",
        skip_serializing_if = "Option::is_none"
    )]
    pub location_gps: Option<Location>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

impl FlightCrash {
    /// Whether an identifier has already been assigned.
    #[must_use]
    pub fn has_id(&self) -> bool {
        !self.id.is_empty()
    }

    /// Whether geocoding attached coordinates to this record.
    #[must_use]
    pub fn is_geolocated(&self) -> bool {
        self.location_gps.is_some()
    }

    /// Return a copy of this record carrying the given coordinates.
    #[must_use]
    pub fn with_location_gps(&self, location: Location) -> Self {
        Self {
            location_gps: Some(location),
            ..self.clone()
        }
    }

    /// Return this record with the given identifier.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Decode a record from its JSON wire form.
    pub fn from_json(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    /// Encode this record to its JSON wire form.
    pub fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample() -> FlightCrash {
        FlightCrash {
            date: Some(Utc.with_ymd_and_hms(1908, 9, 17, 17, 18, 0).unwrap()),
            location: "Fort Myer, Virginia".to_string(),
            operator: "Military - U.S. Army".to_string(),
            aircraft_type: "Wright Flyer III".to_string(),
            aboard: Aboard {
                total: 2,
                crew: 1,
                passengers: 1,
            },
            fatalities: Aboard {
                total: 1,
                crew: 0,
                passengers: 1,
            },
            summary: "During a demonstration flight...".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_empty_fields_are_omitted() {
        let json: serde_json::Value = serde_json::from_slice(&sample().to_json().unwrap()).unwrap();
        let obj = json.as_object().unwrap();

        assert!(!obj.contains_key("id"));
        assert!(!obj.contains_key("flightNo"));
        assert!(!obj.contains_key("locationGPS"));
        assert!(!obj.contains_key("ground"));
        assert!(!obj.contains_key("score"));
        assert_eq!(obj["aircraftType"], "Wright Flyer III");
        assert_eq!(obj["fatalities"], serde_json::json!({"total": 1, "passengers": 1}));
    }

    #[test]
    fn test_wire_field_names() {
        let record = sample().with_location_gps(Location::new(38.88, -77.08));
        let json: serde_json::Value = serde_json::from_slice(&record.to_json().unwrap()).unwrap();

        assert_eq!(json["locationGPS"]["lat"], 38.88);
        assert_eq!(json["locationGPS"]["lon"], -77.08);
        assert_eq!(json["date"], "1908-09-17T17:18:00Z");
    }

    #[test]
    fn test_decode_tolerates_missing_fields() {
        let record = FlightCrash::from_json(br#"{"location":"Paris"}"#).unwrap();
        assert_eq!(record.location, "Paris");
        assert!(!record.has_id());
        assert!(!record.is_geolocated());
        assert!(record.date.is_none());
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(FlightCrash::from_json(b"not json").is_err());
        assert!(FlightCrash::from_json(br#"{"ground":"many"}"#).is_err());
    }

    #[test]
    fn test_enrich_is_copy() {
        let original = sample();
        let enriched = original.with_location_gps(Location::new(1.0, 2.0));

        assert!(original.location_gps.is_none());
        assert_eq!(enriched.location_gps, Some(Location::new(1.0, 2.0)));
        assert_eq!(enriched.summary, original.summary);
    }
}
