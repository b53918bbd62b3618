//! WireGuard handshake grammar
//!
//! Handshake lines carry the peer's public key in a reference token:
//!
//! ```text
//! HANDSHAKE <user> peer(<iface>:<public key>) ...
//! ```
//!
//! The key is matched exactly against the peer roster; a key with no
//! matching roster entry means the peer has since disconnected, which is
//! a skip, not an error. A roster hit yields the peer's endpoint IP,
//! which the geo backend resolves to a location.

use super::SkipReason;
use crate::geolocation::GeoResolver;
use crate::models::{ConnectionEvent, Protocol, Timestamp};
use crate::roster::PeerRoster;
use std::net::IpAddr;

/// Peer-reference segment layout after splitting on `(`, `:`, `)`:
/// name, interface, public key.
const KEY_SEGMENT: usize = 2;

/// A message is a handshake line if its third token is a peer reference
pub(super) fn is_handshake(tokens: &[&str]) -> bool {
    tokens
        .get(2)
        .map_or(false, |t| t.contains('(') && t.contains(':') && t.ends_with(')'))
}

pub(super) fn extract(
    tokens: &[&str],
    timestamp: Timestamp,
    roster: &PeerRoster,
    resolver: &dyn GeoResolver,
) -> Result<ConnectionEvent, SkipReason> {
    let user_id = tokens
        .get(1)
        .ok_or(SkipReason::MissingToken("user"))?
        .to_string();
    let peer_ref = tokens.get(2).ok_or(SkipReason::MissingToken("peer reference"))?;

    let public_key = public_key_from_reference(peer_ref)
        .ok_or(SkipReason::MissingToken("public key"))?;

    if roster.is_empty() {
        return Err(SkipReason::NoPeersConnected { user_id });
    }

    if roster.peer(public_key).is_none() {
        return Err(SkipReason::PeerNotConnected {
            user_id,
            public_key: public_key.to_string(),
        });
    }

    let endpoint_ip = roster
        .endpoint_ip(public_key)
        .ok_or_else(|| SkipReason::NoEndpoint(public_key.to_string()))?;

    let location = resolver
        .lookup(IpAddr::V4(endpoint_ip))
        .map_err(|error| SkipReason::GeoLookup {
            address: endpoint_ip.to_string(),
            error,
        })?;

    Ok(ConnectionEvent {
        user_id,
        protocol: Protocol::WireGuard,
        timestamp,
        location,
    })
}

fn public_key_from_reference(peer_ref: &str) -> Option<&str> {
    let segments: Vec<&str> = peer_ref.split(&['(', ':', ')'][..]).collect();
    segments
        .get(KEY_SEGMENT)
        .copied()
        .filter(|s| !s.is_empty())
}
