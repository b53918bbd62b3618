use chrono::{DateTime, Local, TimeZone};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Fixed rendering for report timestamps, fractional seconds included.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// VPN protocol that produced a connection event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Protocol {
    #[serde(rename = "openVPN")]
    OpenVpn,
    WireGuard,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::OpenVpn => write!(f, "openVPN"),
            Protocol::WireGuard => write!(f, "WireGuard"),
        }
    }
}

/// Journal realtime timestamp, microseconds since the Unix epoch
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Timestamp {
    micros: i64,
}

impl Timestamp {
    pub fn from_micros(micros: i64) -> Self {
        Timestamp { micros }
    }

    pub fn micros(&self) -> i64 {
        self.micros
    }

    /// Epoch seconds with fractional precision preserved.
    ///
    /// Elapsed-time arithmetic divides into speed, so sub-second
    /// precision must survive the conversion.
    pub fn as_seconds(&self) -> f64 {
        self.micros as f64 / 1_000_000.0
    }

    /// Convert to a local calendar instant, if representable
    pub fn to_local(&self) -> Option<DateTime<Local>> {
        Local.timestamp_micros(self.micros).single()
    }

    /// Render in the report's fixed format
    pub fn render(&self) -> String {
        match self.to_local() {
            Some(dt) => dt.format(TIMESTAMP_FORMAT).to_string(),
            None => format!("{:.6}", self.as_seconds()),
        }
    }
}

/// Geographic coordinates, serialized as a `[latitude, longitude]` pair
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "(f64, f64)", into = "(f64, f64)")]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl From<(f64, f64)> for Coordinates {
    fn from((latitude, longitude): (f64, f64)) -> Self {
        Coordinates { latitude, longitude }
    }
}

impl From<Coordinates> for (f64, f64) {
    fn from(c: Coordinates) -> Self {
        (c.latitude, c.longitude)
    }
}

/// Resolved location of a connection event
///
/// Which fields are populated depends on the log grammar and the geo
/// backend: OpenVPN location lines carry coordinates and a country code
/// inline, WireGuard events are resolved through the GeoIP databases and
/// may additionally carry a coarse network identity (ASN organisation).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Location {
    pub coordinates: Option<Coordinates>,
    pub country_code: Option<String>,
    pub network_id: Option<String>,
    pub city: Option<String>,
}

impl Location {
    /// An event is analyzable if at least one policy can key on it
    pub fn is_analyzable(&self) -> bool {
        self.coordinates.is_some() || self.network_id.is_some()
    }
}

/// One extracted and resolved VPN connection
#[derive(Debug, Clone)]
pub struct ConnectionEvent {
    pub user_id: String,
    pub protocol: Protocol,
    pub timestamp: Timestamp,
    pub location: Location,
}
