//! IP Geolocation module using MaxMind databases
//!
//! Resolves source IP addresses to the location fields the detection
//! policies key on: a GeoLite2/DB-IP City database supplies coordinates,
//! country code, and city name; an optional ASN database supplies the
//! coarse network identity used by the network-change policy.

use maxminddb::{geoip2, Reader};
use std::net::IpAddr;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

use crate::models::{Coordinates, Location};

/// Errors that can occur during geolocation lookups
#[derive(Error, Debug)]
pub enum GeoError {
    #[error("Failed to open database: {0}")]
    DatabaseOpen(#[from] maxminddb::MaxMindDBError),

    #[error("IP address not found in database")]
    NotFound,

    #[error("Location data missing for IP address")]
    NoLocation,

    #[error("Database file not found: {0}")]
    FileNotFound(String),
}

/// The single query operation the detection core requires of a geo backend
///
/// A failed lookup is a per-event condition: the event is skipped with a
/// diagnostic, the run continues.
pub trait GeoResolver {
    fn lookup(&self, ip: IpAddr) -> Result<Location, GeoError>;
}

/// GeoIP lookup service backed by MaxMind database files
///
/// Wraps a City database reader and, when configured, an ASN database
/// reader. Cloning shares the underlying readers.
///
/// # Example
///
/// ```ignore
/// use heimdall::geolocation::{GeoIpService, GeoResolver};
/// use std::net::IpAddr;
/// use std::str::FromStr;
///
/// let service = GeoIpService::open("dbip-city-lite.mmdb")?;
/// let ip = IpAddr::from_str("8.8.8.8").unwrap();
/// let location = service.lookup(ip)?;
/// ```
pub struct GeoIpService {
    city_reader: Arc<Reader<Vec<u8>>>,
    asn_reader: Option<Arc<Reader<Vec<u8>>>>,
}

impl GeoIpService {
    /// Open a City database file
    ///
    /// Returns an error if the file is missing or not a valid MaxMind
    /// database; callers treat this as a startup precondition failure.
    pub fn open<P: AsRef<Path>>(city_db_path: P) -> Result<Self, GeoError> {
        let path = city_db_path.as_ref();
        if !path.exists() {
            return Err(GeoError::FileNotFound(path.display().to_string()));
        }

        let reader = Reader::open_readfile(path)?;
        Ok(GeoIpService {
            city_reader: Arc::new(reader),
            asn_reader: None,
        })
    }

    /// Attach an ASN database so lookups also carry a network identity
    pub fn with_asn_db<P: AsRef<Path>>(mut self, asn_db_path: P) -> Result<Self, GeoError> {
        let path = asn_db_path.as_ref();
        if !path.exists() {
            return Err(GeoError::FileNotFound(path.display().to_string()));
        }

        let reader = Reader::open_readfile(path)?;
        self.asn_reader = Some(Arc::new(reader));
        Ok(self)
    }

    fn lookup_city(&self, ip: IpAddr) -> Result<geoip2::City, GeoError> {
        self.city_reader.lookup(ip).map_err(|e| match e {
            maxminddb::MaxMindDBError::AddressNotFoundError(_) => GeoError::NotFound,
            other => GeoError::DatabaseOpen(other),
        })
    }

    /// Network identity for an IP: the autonomous-system organisation name
    ///
    /// Absent when no ASN database is configured or the IP is not covered.
    fn lookup_network_id(&self, ip: IpAddr) -> Option<String> {
        let reader = self.asn_reader.as_ref()?;
        let asn: geoip2::Asn = reader.lookup(ip).ok()?;
        asn.autonomous_system_organization.map(String::from)
    }
}

impl GeoResolver for GeoIpService {
    fn lookup(&self, ip: IpAddr) -> Result<Location, GeoError> {
        let city = self.lookup_city(ip)?;

        let coordinates = city
            .location
            .as_ref()
            .and_then(|loc| Some((loc.latitude?, loc.longitude?)))
            .map(|(latitude, longitude)| Coordinates { latitude, longitude });

        let country_code = city
            .country
            .and_then(|c| c.iso_code)
            .map(String::from);

        let city_name = city
            .city
            .and_then(|c| c.names)
            .and_then(|n| n.get("en").copied())
            .map(String::from);

        let network_id = self.lookup_network_id(ip);

        if coordinates.is_none() && network_id.is_none() {
            return Err(GeoError::NoLocation);
        }

        Ok(Location {
            coordinates,
            country_code,
            network_id,
            city: city_name,
        })
    }
}

/// Resolver used when no geo backend is configured; every lookup misses,
/// so events needing resolution are skipped with a diagnostic
pub struct NullResolver;

impl GeoResolver for NullResolver {
    fn lookup(&self, _ip: IpAddr) -> Result<Location, GeoError> {
        Err(GeoError::NotFound)
    }
}

impl Clone for GeoIpService {
    fn clone(&self) -> Self {
        GeoIpService {
            city_reader: Arc::clone(&self.city_reader),
            asn_reader: self.asn_reader.as_ref().map(Arc::clone),
        }
    }
}

#[cfg(test)]
pub mod testing {
    //! In-memory resolver for exercising the pipeline without database files

    use super::*;
    use std::collections::HashMap;
    use std::str::FromStr;

    pub struct StaticResolver {
        entries: HashMap<IpAddr, Location>,
    }

    impl StaticResolver {
        pub fn new() -> Self {
            StaticResolver { entries: HashMap::new() }
        }

        pub fn with(mut self, ip: &str, location: Location) -> Self {
            self.entries
                .insert(IpAddr::from_str(ip).unwrap(), location);
            self
        }
    }

    impl GeoResolver for StaticResolver {
        fn lookup(&self, ip: IpAddr) -> Result<Location, GeoError> {
            self.entries.get(&ip).cloned().ok_or(GeoError::NotFound)
        }
    }
}
