//! Flagging policies for location transitions
//!
//! Two heuristics are available behind one trait and are selected at
//! configuration time, never mixed in a run: a continuous speed threshold
//! over geodesic distance, and a discrete network-identity change inside
//! a time window. They key on different location fields and encode
//! different guarantees.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::models::{ConnectionEvent, Coordinates, Location, LoginRecord};

/// Default speed threshold in km/h, beyond any commercial travel mode
pub const DEFAULT_MAX_SPEED_KPH: f64 = 3600.0;

/// Default network-change window in seconds
pub const DEFAULT_WINDOW_SECONDS: f64 = 1800.0;

/// Comparable projection of a location, as used for dedup and
/// same-place checks by the active policy
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LocationKey {
    /// Bit-exact coordinate pair
    Coordinates { lat_bits: u64, lon_bits: u64 },
    /// Coarse network identity
    Network(String),
}

impl LocationKey {
    pub fn from_coordinates(c: Coordinates) -> Self {
        LocationKey::Coordinates {
            lat_bits: c.latitude.to_bits(),
            lon_bits: c.longitude.to_bits(),
        }
    }
}

/// Outcome of assessing one transition between distinct locations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assessment {
    /// Plausible transition
    Clear,
    /// Transition exceeds what the policy considers possible
    Impossible,
    /// Non-positive elapsed time between distinct locations: speed is
    /// undefined, so impossibility cannot be ruled out
    UndefinedElapsed,
}

impl Assessment {
    pub fn is_flagged(self) -> bool {
        !matches!(self, Assessment::Clear)
    }
}

/// The pluggable rule deciding the flag for a location transition
pub trait TravelPolicy {
    fn name(&self) -> &'static str;

    /// The location projection this policy compares and dedups on.
    /// `None` means the event carries nothing this policy can use.
    fn location_key(&self, location: &Location) -> Option<LocationKey>;

    /// Assess the transition from the user's prior record to this event.
    /// Only called for transitions between distinct location keys.
    fn assess(&self, prior: &LoginRecord, event: &ConnectionEvent) -> Assessment;
}

/// Which policy a run uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PolicyKind {
    Speed,
    NetworkChange,
}

impl PolicyKind {
    /// Build the policy with the given thresholds (each falls back to its
    /// default when absent)
    pub fn build(
        self,
        max_speed_kph: Option<f64>,
        window_seconds: Option<f64>,
    ) -> Box<dyn TravelPolicy> {
        match self {
            PolicyKind::Speed => Box::new(SpeedPolicy::with_max_speed(
                max_speed_kph.unwrap_or(DEFAULT_MAX_SPEED_KPH),
            )),
            PolicyKind::NetworkChange => Box::new(NetworkChangePolicy::with_window(
                window_seconds.unwrap_or(DEFAULT_WINDOW_SECONDS),
            )),
        }
    }
}

impl FromStr for PolicyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "speed" => Ok(PolicyKind::Speed),
            "network-change" => Ok(PolicyKind::NetworkChange),
            other => Err(format!(
                "unknown policy {:?}, expected \"speed\" or \"network-change\"",
                other
            )),
        }
    }
}

/// Continuous policy: implied travel speed over geodesic distance
pub struct SpeedPolicy {
    max_speed_kph: f64,
}

impl SpeedPolicy {
    pub fn new() -> Self {
        SpeedPolicy { max_speed_kph: DEFAULT_MAX_SPEED_KPH }
    }

    pub fn with_max_speed(max_speed_kph: f64) -> Self {
        SpeedPolicy { max_speed_kph }
    }
}

impl Default for SpeedPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl TravelPolicy for SpeedPolicy {
    fn name(&self) -> &'static str {
        "speed"
    }

    fn location_key(&self, location: &Location) -> Option<LocationKey> {
        location.coordinates.map(LocationKey::from_coordinates)
    }

    fn assess(&self, prior: &LoginRecord, event: &ConnectionEvent) -> Assessment {
        let (Some(previous), Some(current)) = (prior.coordinates, event.location.coordinates)
        else {
            return Assessment::Clear;
        };

        let elapsed_hours = (event.timestamp.as_seconds() - prior.epoch_seconds) / 3600.0;
        if elapsed_hours <= 0.0 {
            log::warn!(
                "Non-positive elapsed time ({:.6} h) between distinct locations for user {}: \
                 speed is undefined, flagging conservatively",
                elapsed_hours,
                event.user_id
            );
            return Assessment::UndefinedElapsed;
        }

        let distance_km = haversine_distance(previous, current);
        let speed_kph = distance_km / elapsed_hours;

        if speed_kph > self.max_speed_kph {
            log::warn!(
                "Impossible travel for user {}: {:.1} km in {:.4} h ({:.0} km/h, max {:.0} km/h)",
                event.user_id,
                distance_km,
                elapsed_hours,
                speed_kph,
                self.max_speed_kph
            );
            Assessment::Impossible
        } else {
            log::info!(
                "User {} hopped {:.1} km in {:.4} h ({:.0} km/h), within a plausible timespan",
                event.user_id,
                distance_km,
                elapsed_hours,
                speed_kph
            );
            Assessment::Clear
        }
    }
}

/// Discrete policy: a network-identity change inside the window.
/// Magnitude of the move is ignored entirely.
pub struct NetworkChangePolicy {
    window_seconds: f64,
}

impl NetworkChangePolicy {
    pub fn new() -> Self {
        NetworkChangePolicy { window_seconds: DEFAULT_WINDOW_SECONDS }
    }

    pub fn with_window(window_seconds: f64) -> Self {
        NetworkChangePolicy { window_seconds }
    }
}

impl Default for NetworkChangePolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl TravelPolicy for NetworkChangePolicy {
    fn name(&self) -> &'static str {
        "network-change"
    }

    fn location_key(&self, location: &Location) -> Option<LocationKey> {
        location.network_id.clone().map(LocationKey::Network)
    }

    fn assess(&self, prior: &LoginRecord, event: &ConnectionEvent) -> Assessment {
        let (Some(previous), Some(current)) =
            (prior.network_id.as_deref(), event.location.network_id.as_deref())
        else {
            return Assessment::Clear;
        };

        if previous == current {
            return Assessment::Clear;
        }

        let elapsed_seconds = event.timestamp.as_seconds() - prior.epoch_seconds;
        if elapsed_seconds < self.window_seconds {
            log::warn!(
                "Network change for user {} ({} -> {}) after only {:.1} s (window {:.0} s)",
                event.user_id,
                previous,
                current,
                elapsed_seconds,
                self.window_seconds
            );
            Assessment::Impossible
        } else {
            Assessment::Clear
        }
    }
}

/// Great-circle distance between two points using the haversine formula,
/// in kilometers
pub fn haversine_distance(from: Coordinates, to: Coordinates) -> f64 {
    const EARTH_RADIUS_KM: f64 = 6371.0;

    let lat1_rad = from.latitude.to_radians();
    let lat2_rad = to.latitude.to_radians();
    let delta_lat = (to.latitude - from.latitude).to_radians();
    let delta_lon = (to.longitude - from.longitude).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();

    EARTH_RADIUS_KM * c
}
