//! OpenVPN location-line grammar
//!
//! The connect-time hook logs one line per connection:
//!
//! ```text
//! LOCATION <user> <proto> [city name ...] <latitude> <longitude> <country>
//! ```
//!
//! The city phrase is optional and of variable length (it depends on what
//! the connect hook's geo database returned), so it is taken as everything
//! between the fixed prefix and the trailing coordinate/country triple.

use super::SkipReason;
use crate::models::{ConnectionEvent, Location, Protocol, Timestamp};

/// Marker token that selects this grammar
pub(super) const MARKER: &str = "LOCATION";

/// Shortest valid line: marker, user, proto, latitude, longitude, country
const MIN_TOKENS: usize = 6;

/// Index of the first city-phrase token
const CITY_OFFSET: usize = 3;

pub(super) fn extract(
    tokens: &[&str],
    timestamp: Timestamp,
) -> Result<ConnectionEvent, SkipReason> {
    if tokens.len() < MIN_TOKENS {
        return Err(SkipReason::MissingToken("location fields"));
    }

    let user_id = tokens[1].to_string();
    let tail = tokens.len() - 3;

    let latitude = parse_coordinate(tokens[tail])?;
    let longitude = parse_coordinate(tokens[tail + 1])?;
    let country_code = tokens[tail + 2].to_string();

    let city = match &tokens[CITY_OFFSET..tail] {
        [] => None,
        phrase => Some(phrase.join(" ")),
    };

    Ok(ConnectionEvent {
        user_id,
        protocol: Protocol::OpenVpn,
        timestamp,
        location: Location {
            coordinates: Some((latitude, longitude).into()),
            country_code: Some(country_code),
            network_id: None,
            city,
        },
    })
}

fn parse_coordinate(token: &str) -> Result<f64, SkipReason> {
    token
        .parse::<f64>()
        .map_err(|_| SkipReason::BadCoordinate(token.to_string()))
}
