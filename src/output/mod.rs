use crate::models::TravelReport;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

/// Output handler for the final travel report
pub struct ReportWriter {
    format: OutputFormat,
    file_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Jsonl,
    Console,
}

impl OutputFormat {
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => OutputFormat::Json,
            "jsonl" => OutputFormat::Jsonl,
            "console" => OutputFormat::Console,
            _ => OutputFormat::Json, // Default
        }
    }
}

impl ReportWriter {
    pub fn new(format: OutputFormat, file_path: Option<PathBuf>) -> Self {
        ReportWriter { format, file_path }
    }

    /// Write the report
    ///
    /// Callers check for an empty report first; an empty run produces no
    /// file at all.
    pub fn write_report(&self, report: &TravelReport) -> Result<(), Box<dyn std::error::Error>> {
        match self.format {
            OutputFormat::Json => {
                let json = serde_json::to_string_pretty(report)?;
                self.write_output(&format!("{}\n", json))?;
            }
            OutputFormat::Jsonl => {
                let mut lines = String::new();
                for (user_id, records) in report.iter() {
                    let entry = serde_json::json!({ "user_id": user_id, "logins": records });
                    lines.push_str(&serde_json::to_string(&entry)?);
                    lines.push('\n');
                }
                self.write_output(&lines)?;
            }
            OutputFormat::Console => {
                let mut out = String::new();
                for (user_id, records) in report.iter() {
                    let flagged = records.iter().filter(|r| r.impossible_travel_flag).count();
                    out.push_str(&format!(
                        "{}: {} login(s), {} flagged\n",
                        user_id,
                        records.len(),
                        flagged
                    ));
                }
                self.write_output(&out)?;
            }
        }
        Ok(())
    }

    fn write_output(&self, data: &str) -> Result<(), Box<dyn std::error::Error>> {
        match &self.file_path {
            Some(path) => {
                let file = File::create(path)?;
                let mut writer = BufWriter::new(file);
                writer.write_all(data.as_bytes())?;
                writer.flush()?;
            }
            None => {
                print!("{}", data);
                std::io::stdout().flush()?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ConnectionEvent, Location, LoginRecord, Protocol, Timestamp};
    use std::fs;

    fn sample_report() -> TravelReport {
        let mut report = TravelReport::new();
        let event = ConnectionEvent {
            user_id: "alice".to_string(),
            protocol: Protocol::OpenVpn,
            timestamp: Timestamp::from_micros(1_700_000_000_000_000),
            location: Location {
                coordinates: Some((40.7128, -74.006).into()),
                country_code: Some("US".to_string()),
                network_id: None,
                city: None,
            },
        };
        report.push("alice", LoginRecord::from_event(&event, false));
        report
    }

    #[test]
    fn test_json_report_written_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");

        let writer = ReportWriter::new(OutputFormat::Json, Some(path.clone()));
        writer.write_report(&sample_report()).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&contents).unwrap();
        assert_eq!(value["alice"][0]["impossible_travel_flag"], false);
        assert_eq!(value["alice"][0]["country_code"], "US");
    }

    #[test]
    fn test_jsonl_report_one_line_per_user() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.jsonl");

        let mut report = sample_report();
        let event = ConnectionEvent {
            user_id: "bob".to_string(),
            protocol: Protocol::WireGuard,
            timestamp: Timestamp::from_micros(1_700_000_100_000_000),
            location: Location {
                network_id: Some("EXAMPLE-AS".to_string()),
                ..Default::default()
            },
        };
        report.push("bob", LoginRecord::from_event(&event, true));

        let writer = ReportWriter::new(OutputFormat::Jsonl, Some(path.clone()));
        writer.write_report(&report).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["user_id"], "alice");
    }

    #[test]
    fn test_format_from_str() {
        assert_eq!(OutputFormat::from_str("JSON"), OutputFormat::Json);
        assert_eq!(OutputFormat::from_str("jsonl"), OutputFormat::Jsonl);
        assert_eq!(OutputFormat::from_str("console"), OutputFormat::Console);
        assert_eq!(OutputFormat::from_str("yaml"), OutputFormat::Json);
    }
}
