//! The impossible-travel analyzer
//!
//! Compares each admitted event against the user's last known location,
//! applies the active policy to the transition, and appends the annotated
//! record to the history. Mutation of the history happens only here, and
//! only by appending.

use super::history::TravelHistory;
use super::policy::TravelPolicy;
use crate::models::{ConnectionEvent, LoginRecord};

pub struct TravelAnalyzer {
    policy: Box<dyn TravelPolicy>,
    history: TravelHistory,
}

impl TravelAnalyzer {
    pub fn new(policy: Box<dyn TravelPolicy>) -> Self {
        TravelAnalyzer {
            policy,
            history: TravelHistory::new(),
        }
    }

    pub fn policy(&self) -> &dyn TravelPolicy {
        self.policy.as_ref()
    }

    pub fn history(&self) -> &TravelHistory {
        &self.history
    }

    /// Evaluate one admitted event, append its record, and return it
    pub fn observe(&mut self, event: &ConnectionEvent) -> LoginRecord {
        let record = match self.history.last(&event.user_id) {
            // First sighting is never flagged
            None => LoginRecord::from_event(event, false),
            Some(prior) => {
                if self.same_place(prior, event) {
                    // A location-preserving reconnection is not anomalous
                    LoginRecord::from_event(event, false)
                } else {
                    let assessment = self.policy.assess(prior, event);
                    LoginRecord::from_event(event, assessment.is_flagged())
                }
            }
        };

        self.history.append(&event.user_id, record.clone());
        record
    }

    /// Whether prior and current compare equal under the policy's key.
    ///
    /// Identical keys cannot normally survive the dedup gate, but the
    /// comparison is kept so a comparison key coarser than the dedup key
    /// still treats a same-place event as no new information.
    fn same_place(&self, prior: &LoginRecord, event: &ConnectionEvent) -> bool {
        match (
            self.policy.location_key(&prior.location()),
            self.policy.location_key(&event.location),
        ) {
            (Some(previous), Some(current)) => previous == current,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::policy::{NetworkChangePolicy, SpeedPolicy};
    use crate::models::{Coordinates, Location, Protocol, Timestamp};

    const NEW_YORK: Coordinates = Coordinates { latitude: 40.7128, longitude: -74.0060 };
    const LONDON: Coordinates = Coordinates { latitude: 51.5074, longitude: -0.1278 };
    const T0: f64 = 1_700_000_000.0;

    fn coord_event(user: &str, seconds: f64, coordinates: Coordinates) -> ConnectionEvent {
        ConnectionEvent {
            user_id: user.to_string(),
            protocol: Protocol::OpenVpn,
            timestamp: Timestamp::from_micros((seconds * 1_000_000.0) as i64),
            location: Location {
                coordinates: Some(coordinates),
                country_code: Some("US".to_string()),
                network_id: None,
                city: None,
            },
        }
    }

    fn network_event(user: &str, seconds: f64, network: &str) -> ConnectionEvent {
        ConnectionEvent {
            user_id: user.to_string(),
            protocol: Protocol::WireGuard,
            timestamp: Timestamp::from_micros((seconds * 1_000_000.0) as i64),
            location: Location {
                coordinates: None,
                country_code: None,
                network_id: Some(network.to_string()),
                city: None,
            },
        }
    }

    #[test]
    fn test_first_sighting_never_flagged() {
        let mut analyzer = TravelAnalyzer::new(Box::new(SpeedPolicy::new()));
        let record = analyzer.observe(&coord_event("alice", T0, NEW_YORK));
        assert!(!record.impossible_travel_flag);
        assert_eq!(analyzer.history().user_count(), 1);
    }

    #[test]
    fn test_impossible_hop_flags_second_record() {
        let mut analyzer = TravelAnalyzer::new(Box::new(SpeedPolicy::new()));
        analyzer.observe(&coord_event("alice", T0, NEW_YORK));
        let record = analyzer.observe(&coord_event("alice", T0 + 300.0, LONDON));
        assert!(record.impossible_travel_flag);
    }

    #[test]
    fn test_plausible_hop_is_unflagged() {
        let mut analyzer = TravelAnalyzer::new(Box::new(SpeedPolicy::new()));
        analyzer.observe(&coord_event("alice", T0, NEW_YORK));
        let record = analyzer.observe(&coord_event("alice", T0 + 8.0 * 3600.0, LONDON));
        assert!(!record.impossible_travel_flag);
    }

    #[test]
    fn test_same_place_reconnection_appends_unflagged() {
        let mut analyzer = TravelAnalyzer::new(Box::new(SpeedPolicy::new()));
        analyzer.observe(&coord_event("alice", T0, NEW_YORK));
        // Same coordinates an hour later: appended, never anomalous
        let record = analyzer.observe(&coord_event("alice", T0 + 3600.0, NEW_YORK));
        assert!(!record.impossible_travel_flag);
        assert_eq!(analyzer.history().records("alice").unwrap().len(), 2);
    }

    #[test]
    fn test_users_tracked_independently() {
        let mut analyzer = TravelAnalyzer::new(Box::new(SpeedPolicy::new()));
        analyzer.observe(&coord_event("alice", T0, NEW_YORK));
        // bob's first sighting in London is clean even right after alice's
        let record = analyzer.observe(&coord_event("bob", T0 + 1.0, LONDON));
        assert!(!record.impossible_travel_flag);
    }

    #[test]
    fn test_network_policy_flags_fast_network_change() {
        let mut analyzer = TravelAnalyzer::new(Box::new(NetworkChangePolicy::new()));
        analyzer.observe(&network_event("bob", T0, "AS-ONE"));
        let record = analyzer.observe(&network_event("bob", T0 + 60.0, "AS-TWO"));
        assert!(record.impossible_travel_flag);
    }

    #[test]
    fn test_history_keeps_arrival_order() {
        let mut analyzer = TravelAnalyzer::new(Box::new(SpeedPolicy::new()));
        analyzer.observe(&coord_event("alice", T0, NEW_YORK));
        analyzer.observe(&coord_event("alice", T0 + 300.0, LONDON));
        analyzer.observe(&coord_event("alice", T0 + 9.0 * 3600.0, NEW_YORK));

        let flags: Vec<bool> = analyzer
            .history()
            .records("alice")
            .unwrap()
            .iter()
            .map(|r| r.impossible_travel_flag)
            .collect();
        assert_eq!(flags, vec![false, true, false]);
    }
}
