//! Batch run wiring
//!
//! One logical stream, processed sequentially: each journal line flows
//! extract → dedup → analyze → aggregate before the next line is read.
//! Per-user state grows with distinct locations visited, not with total
//! lines, so unbounded journals stream in bounded memory.

use std::io::BufRead;

use crate::detection::{DedupGate, TravelAnalyzer, TravelPolicy};
use crate::extract::{self, SkipReason};
use crate::geolocation::GeoResolver;
use crate::models::TravelReport;
use crate::roster::PeerRoster;

/// End-of-run accounting
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunStats {
    /// Non-blank lines read
    pub lines: usize,
    /// Events successfully extracted and resolved
    pub events: usize,
    /// Records appended to histories
    pub records: usize,
    /// Lines or events dropped with a diagnostic
    pub skipped: usize,
    /// Events suppressed as exact repeats
    pub duplicates: usize,
}

/// Run the full analysis over a journal stream
///
/// Never aborts mid-stream for a single bad record; only a read error on
/// the input itself is fatal.
pub fn run<R: BufRead>(
    reader: R,
    roster: &PeerRoster,
    resolver: &dyn GeoResolver,
    policy: Box<dyn TravelPolicy>,
) -> std::io::Result<(TravelReport, RunStats)> {
    let mut dedup = DedupGate::new();
    let mut analyzer = TravelAnalyzer::new(policy);
    let mut report = TravelReport::new();
    let mut stats = RunStats::default();

    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        stats.lines += 1;

        let event = match extract::from_line(&line, roster, resolver) {
            Ok(event) => event,
            Err(reason) => {
                reason.log();
                stats.skipped += 1;
                continue;
            }
        };
        stats.events += 1;

        let key = match analyzer.policy().location_key(&event.location) {
            Some(key) => key,
            None => {
                SkipReason::Unanalyzable {
                    user_id: event.user_id.clone(),
                    policy: analyzer.policy().name(),
                }
                .log();
                stats.skipped += 1;
                continue;
            }
        };

        if !dedup.admit(&event.user_id, &key) {
            log::debug!(
                "Suppressing repeat event for user {} at a previously seen location",
                event.user_id
            );
            stats.duplicates += 1;
            continue;
        }

        let record = analyzer.observe(&event);
        report.push(&event.user_id, record);
        stats.records += 1;
    }

    log::info!(
        "Processed {} lines: {} events, {} records across {} users, {} skipped, {} duplicates",
        stats.lines,
        stats.events,
        stats.records,
        report.user_count(),
        stats.skipped,
        stats.duplicates
    );

    Ok((report, stats))
}
