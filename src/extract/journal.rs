use serde::{Deserialize, Deserializer};

/// One decoded journal export record
///
/// `journalctl -o json` writes `__REALTIME_TIMESTAMP` as a string holding
/// the integer microsecond count, but raw integer exports exist too, so
/// decoding accepts both forms.
#[derive(Debug, Deserialize)]
pub struct JournalRecord {
    #[serde(rename = "MESSAGE")]
    pub message: String,
    #[serde(
        rename = "__REALTIME_TIMESTAMP",
        deserialize_with = "micros_from_string_or_int"
    )]
    pub realtime_micros: i64,
}

impl JournalRecord {
    /// Decode a single newline-delimited JSON line
    pub fn from_line(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line)
    }
}

fn micros_from_string_or_int<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(i64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Int(n) => Ok(n),
        Raw::Text(s) => s.trim().parse::<i64>().map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_with_string_timestamp() {
        let line = r#"{"MESSAGE": "LOCATION alice udp 40.7128 -74.0060 US", "__REALTIME_TIMESTAMP": "1712345678901234"}"#;
        let record = JournalRecord::from_line(line).unwrap();
        assert_eq!(record.realtime_micros, 1_712_345_678_901_234);
        assert!(record.message.starts_with("LOCATION"));
    }

    #[test]
    fn test_decode_with_integer_timestamp() {
        let line = r#"{"MESSAGE": "msg", "__REALTIME_TIMESTAMP": 1712345678901234}"#;
        let record = JournalRecord::from_line(line).unwrap();
        assert_eq!(record.realtime_micros, 1_712_345_678_901_234);
    }

    #[test]
    fn test_decode_ignores_extra_fields() {
        let line = r#"{"MESSAGE": "msg", "__REALTIME_TIMESTAMP": "1", "PRIORITY": "6", "_HOSTNAME": "vpn1"}"#;
        assert!(JournalRecord::from_line(line).is_ok());
    }

    #[test]
    fn test_decode_missing_message_fails() {
        let line = r#"{"__REALTIME_TIMESTAMP": "1712345678901234"}"#;
        assert!(JournalRecord::from_line(line).is_err());
    }

    #[test]
    fn test_decode_non_numeric_timestamp_fails() {
        let line = r#"{"MESSAGE": "msg", "__REALTIME_TIMESTAMP": "yesterday"}"#;
        assert!(JournalRecord::from_line(line).is_err());
    }
}
