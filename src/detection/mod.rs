pub mod analyzer;
pub mod dedup;
pub mod history;
pub mod policy;

pub use analyzer::TravelAnalyzer;
pub use dedup::DedupGate;
pub use history::TravelHistory;
pub use policy::{
    haversine_distance, Assessment, LocationKey, NetworkChangePolicy, PolicyKind, SpeedPolicy,
    TravelPolicy, DEFAULT_MAX_SPEED_KPH, DEFAULT_WINDOW_SECONDS,
};
