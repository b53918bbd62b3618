use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::detection::{PolicyKind, DEFAULT_MAX_SPEED_KPH, DEFAULT_WINDOW_SECONDS};

/// Configuration for an analysis run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Input source configuration
    #[serde(default)]
    pub input: InputConfig,
    /// Detection policy configuration
    pub detection: DetectionConfig,
    /// Geo backend configuration
    #[serde(default)]
    pub geo: GeoConfig,
    /// WireGuard roster configuration
    #[serde(default)]
    pub wireguard: WireguardConfig,
    /// Output configuration
    pub output: OutputConfig,
}

/// Input source configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InputConfig {
    /// Path to the journal JSON export
    pub journal_path: Option<PathBuf>,
}

/// Detection policy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Active policy: "speed" or "network-change"
    pub policy: PolicyKind,
    /// Speed policy configuration
    pub speed: SpeedConfig,
    /// Network-change policy configuration
    pub network_change: NetworkChangeConfig,
}

/// Speed policy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeedConfig {
    /// Maximum plausible travel speed in km/h
    pub max_speed_kph: f64,
}

/// Network-change policy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkChangeConfig {
    /// Window in seconds inside which a network change is flagged
    pub window_seconds: f64,
}

/// Geo backend configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeoConfig {
    /// Path to the City database (coordinates, country, city name)
    pub city_db_path: Option<PathBuf>,
    /// Path to the ASN database (network identity)
    pub asn_db_path: Option<PathBuf>,
}

/// WireGuard roster configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WireguardConfig {
    /// Path to the peer roster text (wg show output)
    pub peers_path: Option<PathBuf>,
}

/// Output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Output format: "json", "jsonl", or "console"
    pub format: String,
    /// Output file path (if format is not "console")
    pub file_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            input: InputConfig {
                journal_path: Some(PathBuf::from("/var/log/vpn-journal.json")),
            },
            detection: DetectionConfig {
                policy: PolicyKind::Speed,
                speed: SpeedConfig {
                    max_speed_kph: DEFAULT_MAX_SPEED_KPH,
                },
                network_change: NetworkChangeConfig {
                    window_seconds: DEFAULT_WINDOW_SECONDS,
                },
            },
            geo: GeoConfig {
                city_db_path: None,
                asn_db_path: None,
            },
            wireguard: WireguardConfig { peers_path: None },
            output: OutputConfig {
                format: "json".to_string(),
                file_path: Some(PathBuf::from("travel-report.json")),
            },
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save configuration to a file
    pub fn to_file(&self, path: &PathBuf) -> Result<(), Box<dyn std::error::Error>> {
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }
}
