pub mod config;
pub mod detection;
pub mod extract;
pub mod geolocation;
pub mod models;
pub mod output;
pub mod pipeline;
pub mod roster;

// Re-export commonly used types
pub use detection::{
    Assessment, DedupGate, LocationKey, NetworkChangePolicy, PolicyKind, SpeedPolicy,
    TravelAnalyzer, TravelHistory, TravelPolicy,
};
pub use geolocation::{GeoIpService, GeoResolver};
pub use models::{ConnectionEvent, Coordinates, Location, LoginRecord, Protocol, TravelReport};
pub use roster::PeerRoster;
