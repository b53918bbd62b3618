//! Per-user travel history
//!
//! Single source of truth for "last known location". Sequences are
//! append-only and strictly ordered as processed; the engine trusts log
//! order and never re-sorts. All state lives and dies with one run.

use std::collections::HashMap;

use crate::models::LoginRecord;

#[derive(Debug, Default)]
pub struct TravelHistory {
    records: HashMap<String, Vec<LoginRecord>>,
}

impl TravelHistory {
    pub fn new() -> Self {
        TravelHistory::default()
    }

    /// The user's most recent record, if any
    pub fn last(&self, user_id: &str) -> Option<&LoginRecord> {
        self.records.get(user_id).and_then(|r| r.last())
    }

    /// Append a record to the user's history
    pub fn append(&mut self, user_id: &str, record: LoginRecord) {
        self.records.entry(user_id.to_string()).or_default().push(record);
    }

    pub fn user_count(&self) -> usize {
        self.records.len()
    }

    pub fn records(&self, user_id: &str) -> Option<&[LoginRecord]> {
        self.records.get(user_id).map(Vec::as_slice)
    }
}
