//! WireGuard peer roster
//!
//! Parses `wg`-style status output into the interface block and the set of
//! currently connected peers. The detection core only consumes the mapping
//! from a peer's public key to its endpoint IP; handshake lines in the
//! journal are cross-referenced against it to decide whether a peer is
//! still connected.

use regex::Regex;
use std::collections::HashMap;
use std::fs;
use std::net::Ipv4Addr;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Keys that mark a block as describing the interface rather than a peer
const INTERFACE_KEYS: [&str; 4] = ["interface", "public key", "private key", "listening port"];

#[derive(Error, Debug)]
pub enum RosterError {
    #[error("Roster file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to read roster: {0}")]
    Io(#[from] std::io::Error),
}

/// One peer block: the raw `key: value` fields as written
#[derive(Debug, Clone, Default)]
pub struct Peer {
    fields: HashMap<String, String>,
}

impl Peer {
    /// The peer's public key, from its `peer` field
    pub fn public_key(&self) -> Option<&str> {
        self.fields.get("peer").map(String::as_str)
    }

    /// The raw `endpoint` field, e.g. `203.0.113.7:51820`
    pub fn endpoint(&self) -> Option<&str> {
        self.fields.get("endpoint").map(String::as_str)
    }
}

/// Parsed roster: interface fields plus the connected peers
#[derive(Debug, Default)]
pub struct PeerRoster {
    interface: HashMap<String, String>,
    peers: Vec<Peer>,
    by_public_key: HashMap<String, usize>,
}

impl PeerRoster {
    /// Load and parse a roster from a file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, RosterError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(RosterError::FileNotFound(path.display().to_string()));
        }
        let text = fs::read_to_string(path)?;
        Ok(Self::parse(&text))
    }

    /// Parse roster text
    ///
    /// Blocks are separated by blank lines; each non-blank line is
    /// `key: value`, split on the first colon. A block containing any
    /// interface keyword is the interface block, any other block is a
    /// peer. Keyless lines are logged and ignored, never fatal.
    pub fn parse(text: &str) -> Self {
        let mut roster = PeerRoster::default();
        let mut current: HashMap<String, String> = HashMap::new();

        for line in text.lines() {
            if line.trim().is_empty() {
                roster.flush_block(&mut current);
                continue;
            }

            match line.split_once(':') {
                Some((key, value)) => {
                    current.insert(key.trim().to_string(), value.trim().to_string());
                }
                None => {
                    log::warn!("Ignoring keyless roster line: {:?}", line.trim());
                }
            }
        }

        // The final block usually has no trailing blank line
        roster.flush_block(&mut current);
        roster
    }

    fn flush_block(&mut self, block: &mut HashMap<String, String>) {
        if block.is_empty() {
            return;
        }
        let fields = std::mem::take(block);

        if fields.keys().any(|k| INTERFACE_KEYS.contains(&k.as_str())) {
            self.interface.extend(fields);
            return;
        }

        let peer = Peer { fields };
        match peer.public_key() {
            Some(key) => {
                self.by_public_key.insert(key.to_string(), self.peers.len());
                self.peers.push(peer);
            }
            None => {
                log::warn!("Discarding roster block without a peer key");
            }
        }
    }

    pub fn interface_field(&self, key: &str) -> Option<&str> {
        self.interface.get(key).map(String::as_str)
    }

    pub fn peers(&self) -> &[Peer] {
        &self.peers
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// Exact-match lookup of a peer by public key
    pub fn peer(&self, public_key: &str) -> Option<&Peer> {
        self.by_public_key
            .get(public_key)
            .and_then(|&i| self.peers.get(i))
    }

    /// Endpoint IP of a connected peer: the first IPv4-shaped substring of
    /// its endpoint field
    pub fn endpoint_ip(&self, public_key: &str) -> Option<Ipv4Addr> {
        let endpoint = self.peer(public_key)?.endpoint()?;
        first_ipv4(endpoint)
    }
}

/// Extract the first IPv4-shaped substring, if any parses as an address
fn first_ipv4(text: &str) -> Option<Ipv4Addr> {
    // Same shape the connect-side tooling matches on
    let pattern = Regex::new(r"[0-9]+(?:\.[0-9]+){3}").ok()?;
    let found = pattern
        .find_iter(text)
        .find_map(|m| Ipv4Addr::from_str(m.as_str()).ok());
    found
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
interface: wg0
public key: SERVERKEYAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA=
private key: (hidden)
listening port: 51820

peer: PEERONEAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA=
endpoint: 203.0.113.7:51820
allowed ips: 10.0.0.2/32
latest handshake: 1 minute, 12 seconds ago

peer: PEERTWOAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA=
endpoint: 198.51.100.23:40044
allowed ips: 10.0.0.3/32
";

    #[test]
    fn test_parse_interface_and_peers() {
        let roster = PeerRoster::parse(SAMPLE);
        assert_eq!(roster.interface_field("interface"), Some("wg0"));
        assert_eq!(roster.interface_field("listening port"), Some("51820"));
        assert_eq!(roster.peers().len(), 2);
    }

    #[test]
    fn test_final_block_without_trailing_blank_line_is_kept() {
        let roster = PeerRoster::parse(SAMPLE);
        assert!(roster
            .peer("PEERTWOAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA=")
            .is_some());
    }

    #[test]
    fn test_endpoint_ip_extraction() {
        let roster = PeerRoster::parse(SAMPLE);
        let ip = roster
            .endpoint_ip("PEERONEAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA=")
            .unwrap();
        assert_eq!(ip, Ipv4Addr::new(203, 0, 113, 7));
    }

    #[test]
    fn test_unknown_public_key() {
        let roster = PeerRoster::parse(SAMPLE);
        assert!(roster.peer("NOSUCHKEY=").is_none());
        assert!(roster.endpoint_ip("NOSUCHKEY=").is_none());
    }

    #[test]
    fn test_keyless_line_is_ignored() {
        let text = "peer: SOMEKEY=\ngarbage line without separator\nendpoint: 192.0.2.1:1234\n";
        let roster = PeerRoster::parse(text);
        assert_eq!(roster.peers().len(), 1);
        assert_eq!(
            roster.endpoint_ip("SOMEKEY="),
            Some(Ipv4Addr::new(192, 0, 2, 1))
        );
    }

    #[test]
    fn test_empty_roster() {
        let roster = PeerRoster::parse("");
        assert!(roster.is_empty());
    }

    #[test]
    fn test_from_file_missing_path() {
        let result = PeerRoster::from_file("no-such-roster.txt");
        assert!(matches!(result, Err(RosterError::FileNotFound(_))));
    }

    #[test]
    fn test_endpoint_with_port_only_digits_prefers_valid_address() {
        assert_eq!(first_ipv4("511.300.1.2 then 10.1.2.3:9"), Some(Ipv4Addr::new(10, 1, 2, 3)));
        assert_eq!(first_ipv4("no address here"), None);
    }
}
