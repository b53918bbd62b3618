//! Event extraction from journal records
//!
//! Each record is tokenized and dispatched to one of the two message
//! grammars by a cheap discriminant: a leading `LOCATION` marker selects
//! the OpenVPN grammar, a peer-reference third token selects the WireGuard
//! grammar. Everything that cannot be extracted becomes a [`SkipReason`];
//! a single bad record never aborts the run.

pub mod journal;
mod openvpn;
mod wireguard;

pub use journal::JournalRecord;

use crate::geolocation::{GeoError, GeoResolver};
use crate::models::{ConnectionEvent, Timestamp};
use crate::roster::PeerRoster;
use std::fmt;

/// Why a record produced no event
#[derive(Debug)]
pub enum SkipReason {
    /// The line was not a well-formed journal JSON record
    MalformedRecord(serde_json::Error),
    /// The message matched no known grammar
    UnrecognizedMessage,
    /// A required token was absent
    MissingToken(&'static str),
    /// A coordinate token did not parse as a number
    BadCoordinate(String),
    /// The realtime timestamp was outside the representable range
    BadTimestamp(i64),
    /// The roster has no peers at all
    NoPeersConnected { user_id: String },
    /// The handshake's public key matched no roster entry
    PeerNotConnected { user_id: String, public_key: String },
    /// A roster entry had no usable endpoint address
    NoEndpoint(String),
    /// The geo backend could not resolve the endpoint address
    GeoLookup { address: String, error: GeoError },
    /// The resolved location has no field the active policy can key on
    Unanalyzable { user_id: String, policy: &'static str },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::MalformedRecord(e) => write!(f, "malformed journal record: {}", e),
            SkipReason::UnrecognizedMessage => write!(f, "message matches no known grammar"),
            SkipReason::MissingToken(what) => write!(f, "missing token: {}", what),
            SkipReason::BadCoordinate(token) => write!(f, "malformed coordinate {:?}", token),
            SkipReason::BadTimestamp(micros) => {
                write!(f, "timestamp {} µs is not representable", micros)
            }
            SkipReason::NoPeersConnected { user_id } => {
                write!(f, "no WireGuard peers currently connected (user {})", user_id)
            }
            SkipReason::PeerNotConnected { user_id, public_key } => write!(
                f,
                "user {} with public key {} used WireGuard and is no longer connected",
                user_id, public_key
            ),
            SkipReason::NoEndpoint(public_key) => {
                write!(f, "peer {} has no usable endpoint address", public_key)
            }
            SkipReason::GeoLookup { address, error } => {
                write!(f, "geo lookup failed for {}: {}", address, error)
            }
            SkipReason::Unanalyzable { user_id, policy } => write!(
                f,
                "event for user {} carries no location field the {} policy can use",
                user_id, policy
            ),
        }
    }
}

impl SkipReason {
    /// Emit the diagnostic at the level the condition warrants.
    ///
    /// A disconnected peer is expected operational noise; a failing geo
    /// backend is worth a warning.
    pub fn log(&self) {
        match self {
            SkipReason::UnrecognizedMessage | SkipReason::MalformedRecord(_) => {
                log::debug!("Skipping record: {}", self)
            }
            SkipReason::NoPeersConnected { .. } | SkipReason::PeerNotConnected { .. } => {
                log::info!("Skipping record: {}", self)
            }
            _ => log::warn!("Skipping record: {}", self),
        }
    }
}

/// Extract a connection event from one decoded journal record
pub fn extract(
    record: &JournalRecord,
    roster: &PeerRoster,
    resolver: &dyn GeoResolver,
) -> Result<ConnectionEvent, SkipReason> {
    let tokens: Vec<&str> = record.message.split_whitespace().collect();

    let timestamp = Timestamp::from_micros(record.realtime_micros);
    if timestamp.to_local().is_none() {
        return Err(SkipReason::BadTimestamp(record.realtime_micros));
    }

    match tokens.first() {
        Some(&openvpn::MARKER) => openvpn::extract(&tokens, timestamp),
        _ if wireguard::is_handshake(&tokens) => {
            wireguard::extract(&tokens, timestamp, roster, resolver)
        }
        _ => Err(SkipReason::UnrecognizedMessage),
    }
}

/// Decode one journal line and extract its event
pub fn from_line(
    line: &str,
    roster: &PeerRoster,
    resolver: &dyn GeoResolver,
) -> Result<ConnectionEvent, SkipReason> {
    let record = JournalRecord::from_line(line).map_err(SkipReason::MalformedRecord)?;
    extract(&record, roster, resolver)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geolocation::testing::StaticResolver;
    use crate::models::Protocol;

    fn record(message: &str, micros: i64) -> JournalRecord {
        JournalRecord {
            message: message.to_string(),
            realtime_micros: micros,
        }
    }

    fn deps() -> (PeerRoster, StaticResolver) {
        (PeerRoster::parse(""), StaticResolver::new())
    }

    #[test]
    fn test_dispatch_openvpn() {
        let (roster, resolver) = deps();
        let rec = record("LOCATION alice udp 40.7128 -74.0060 US", 1_700_000_000_000_000);
        let event = extract(&rec, &roster, &resolver).unwrap();
        assert_eq!(event.protocol, Protocol::OpenVpn);
        assert_eq!(event.user_id, "alice");
    }

    #[test]
    fn test_dispatch_unknown_grammar() {
        let (roster, resolver) = deps();
        let rec = record("User alice disconnected", 1_700_000_000_000_000);
        assert!(matches!(
            extract(&rec, &roster, &resolver),
            Err(SkipReason::UnrecognizedMessage)
        ));
    }

    #[test]
    fn test_timestamp_fractional_seconds_survive_extraction() {
        let (roster, resolver) = deps();
        let rec = record("LOCATION alice udp 40.7128 -74.0060 US", 1_700_000_000_500_000);
        let event = extract(&rec, &roster, &resolver).unwrap();
        assert!((event.timestamp.as_seconds() - 1_700_000_000.5).abs() < 1e-9);
    }

    #[test]
    fn test_from_line_malformed_json_is_skip() {
        let (roster, resolver) = deps();
        let result = from_line("not json at all", &roster, &resolver);
        assert!(matches!(result, Err(SkipReason::MalformedRecord(_))));
    }

    #[test]
    fn test_from_line_roundtrip() {
        let (roster, resolver) = deps();
        let line = r#"{"MESSAGE": "LOCATION alice udp Berlin 52.5200 13.4050 DE", "__REALTIME_TIMESTAMP": "1700000000000000"}"#;
        let event = from_line(line, &roster, &resolver).unwrap();
        assert_eq!(event.location.city.as_deref(), Some("Berlin"));
        assert_eq!(event.location.country_code.as_deref(), Some("DE"));
    }
}
