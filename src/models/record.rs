use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::event::{ConnectionEvent, Coordinates, Location, Protocol};

/// One annotated entry in a user's login history
///
/// The flag describes the transition *into* this record from the user's
/// previous one; a user's first record is never flagged. Immutable once
/// appended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRecord {
    pub timestamp: String,
    pub protocol: Protocol,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Coordinates>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_id: Option<String>,
    pub impossible_travel_flag: bool,
    /// Epoch seconds of the originating event, kept for elapsed-time
    /// arithmetic; not part of the serialized record.
    #[serde(skip)]
    pub epoch_seconds: f64,
}

impl LoginRecord {
    /// Build a record from a resolved event and the analyzer's verdict
    pub fn from_event(event: &ConnectionEvent, impossible_travel_flag: bool) -> Self {
        LoginRecord {
            timestamp: event.timestamp.render(),
            protocol: event.protocol,
            city: event.location.city.clone(),
            coordinates: event.location.coordinates,
            country_code: event.location.country_code.clone(),
            network_id: event.location.network_id.clone(),
            impossible_travel_flag,
            epoch_seconds: event.timestamp.as_seconds(),
        }
    }

    /// The record's location fields, reassembled for policy comparison
    pub fn location(&self) -> Location {
        Location {
            coordinates: self.coordinates,
            country_code: self.country_code.clone(),
            network_id: self.network_id.clone(),
            city: self.city.clone(),
        }
    }
}

/// Final report: per-user login histories in arrival order
///
/// A pure sink. Records are appended exactly as the analyzer emits them;
/// no reordering or deduplication happens here. Users serialize in sorted
/// order so report output is deterministic.
#[derive(Debug, Default, Serialize)]
pub struct TravelReport {
    #[serde(flatten)]
    users: BTreeMap<String, Vec<LoginRecord>>,
}

impl TravelReport {
    pub fn new() -> Self {
        TravelReport::default()
    }

    /// Append a record under its user, preserving arrival order
    pub fn push(&mut self, user_id: &str, record: LoginRecord) {
        self.users.entry(user_id.to_string()).or_default().push(record);
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// Number of users with at least one record
    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    /// Total records across all users
    pub fn record_count(&self) -> usize {
        self.users.values().map(Vec::len).sum()
    }

    pub fn records_for(&self, user_id: &str) -> Option<&[LoginRecord]> {
        self.users.get(user_id).map(Vec::as_slice)
    }

    /// Iterate users in sorted order with their arrival-ordered records
    pub fn iter(&self) -> impl Iterator<Item = (&String, &[LoginRecord])> {
        self.users.iter().map(|(user, records)| (user, records.as_slice()))
    }
}
