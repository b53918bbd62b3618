use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use structopt::StructOpt;

use heimdall::config::Config;
use heimdall::detection::{PolicyKind, TravelPolicy};
use heimdall::extract;
use heimdall::geolocation::{GeoIpService, GeoResolver, NullResolver};
use heimdall::output::{OutputFormat, ReportWriter};
use heimdall::pipeline;
use heimdall::roster::PeerRoster;

/// Impossible-travel detection for VPN connection logs
#[derive(StructOpt, Debug)]
#[structopt(name = "heimdall", about = "Impossible-travel detection for VPN connection logs")]
pub enum Cli {
    /// Analyze a journal export and write the travel report
    Analyze {
        /// Path to the journal JSON export
        #[structopt(short, long)]
        log: PathBuf,
        /// Path to the GeoIP City database
        #[structopt(long)]
        geo_db: Option<PathBuf>,
        /// Path to the GeoIP ASN database
        #[structopt(long)]
        asn_db: Option<PathBuf>,
        /// Path to the WireGuard peer roster (wg show output)
        #[structopt(long)]
        wireguard_peers: Option<PathBuf>,
        /// Path for the report
        #[structopt(short, long)]
        output: PathBuf,
        /// Detection policy: "speed" or "network-change"
        #[structopt(long)]
        policy: Option<PolicyKind>,
        /// Maximum plausible travel speed in km/h (speed policy)
        #[structopt(long)]
        max_speed_kph: Option<f64>,
        /// Flagging window in seconds (network-change policy)
        #[structopt(long)]
        window_seconds: Option<f64>,
        /// Optional configuration file supplying defaults
        #[structopt(short, long)]
        config: Option<PathBuf>,
    },
    /// Generate a default configuration file
    Config {
        /// Output path for the configuration file
        #[structopt(short, long, default_value = "config.toml")]
        output: PathBuf,
    },
    /// Parse and display connection events from a journal file
    Parse {
        /// Path to journal file
        #[structopt(short, long)]
        file: PathBuf,
        /// Number of events to display
        #[structopt(short, long, default_value = "10")]
        lines: usize,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let cli = Cli::from_args();

    match cli {
        Cli::Analyze {
            log,
            geo_db,
            asn_db,
            wireguard_peers,
            output,
            policy,
            max_speed_kph,
            window_seconds,
            config,
        } => {
            let config = match config {
                Some(path) if path.exists() => Config::from_file(&path)?,
                Some(path) => {
                    eprintln!("Configuration file not found: {:?}", path);
                    std::process::exit(1);
                }
                None => Config::default(),
            };

            let policy = policy.unwrap_or(config.detection.policy).build(
                Some(max_speed_kph.unwrap_or(config.detection.speed.max_speed_kph)),
                Some(window_seconds.unwrap_or(config.detection.network_change.window_seconds)),
            );

            analyze(
                &log,
                geo_db.or(config.geo.city_db_path.clone()),
                asn_db.or(config.geo.asn_db_path.clone()),
                wireguard_peers.or(config.wireguard.peers_path.clone()),
                &output,
                OutputFormat::from_str(&config.output.format),
                policy,
            )?;
        }
        Cli::Config { output } => {
            let config = Config::default();
            config.to_file(&output)?;
            println!("Default configuration written to: {:?}", output);
        }
        Cli::Parse { file, lines } => {
            if !file.exists() {
                eprintln!("File not found: {:?}", file);
                std::process::exit(1);
            }
            parse_preview(&file, lines)?;
        }
    }

    Ok(())
}

/// Run the batch analysis; all precondition checks happen before the
/// first record is read
fn analyze(
    log: &PathBuf,
    geo_db: Option<PathBuf>,
    asn_db: Option<PathBuf>,
    wireguard_peers: Option<PathBuf>,
    output: &PathBuf,
    format: OutputFormat,
    policy: Box<dyn TravelPolicy>,
) -> Result<(), Box<dyn std::error::Error>> {
    if !log.exists() {
        eprintln!("Cannot find journal file: {:?}", log);
        std::process::exit(1);
    }
    if wireguard_peers.is_some() && geo_db.is_none() {
        eprintln!("A GeoIP City database is required to resolve WireGuard peers");
        std::process::exit(1);
    }

    let resolver: Box<dyn GeoResolver> = match geo_db {
        Some(city_path) => {
            let mut service = match GeoIpService::open(&city_path) {
                Ok(service) => service,
                Err(e) => {
                    eprintln!("Cannot open GeoIP database: {}", e);
                    std::process::exit(1);
                }
            };
            if let Some(asn_path) = asn_db {
                service = match service.with_asn_db(&asn_path) {
                    Ok(service) => service,
                    Err(e) => {
                        eprintln!("Cannot open ASN database: {}", e);
                        std::process::exit(1);
                    }
                };
            }
            Box::new(service)
        }
        None => Box::new(NullResolver),
    };

    let roster = match wireguard_peers {
        Some(path) => match PeerRoster::from_file(&path) {
            Ok(roster) => roster,
            Err(e) => {
                eprintln!("Cannot load WireGuard peer roster: {}", e);
                std::process::exit(1);
            }
        },
        None => PeerRoster::default(),
    };

    log::info!("Analyzing {:?} with the {} policy", log, policy.name());

    let reader = BufReader::new(File::open(log)?);
    let (report, stats) = pipeline::run(reader, &roster, resolver.as_ref(), policy)?;

    if report.is_empty() {
        println!("No login attempts found in the journal");
        return Ok(());
    }

    let file_path = match format {
        OutputFormat::Console => None,
        _ => Some(output.clone()),
    };
    let writer = ReportWriter::new(format, file_path);
    writer.write_report(&report)?;
    println!(
        "Written results for {} user(s) ({} record(s), {} line(s) read) to {:?}",
        report.user_count(),
        stats.records,
        stats.lines,
        output
    );

    Ok(())
}

/// Decode a journal file and display the first events without analysis
fn parse_preview(file: &PathBuf, lines: usize) -> Result<(), Box<dyn std::error::Error>> {
    use std::io::BufRead;

    let reader = BufReader::new(File::open(file)?);
    let roster = PeerRoster::default();
    let resolver = NullResolver;

    let mut shown = 0;
    let mut total = 0;
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match extract::from_line(&line, &roster, &resolver) {
            Ok(event) => {
                total += 1;
                if shown < lines {
                    let place = match (&event.location.city, &event.location.country_code) {
                        (Some(city), Some(cc)) => format!("{}, {}", city, cc),
                        (None, Some(cc)) => cc.clone(),
                        _ => "unknown".to_string(),
                    };
                    println!(
                        "  User: {}, Protocol: {}, Time: {}, Location: {}",
                        event.user_id,
                        event.protocol,
                        event.timestamp.render(),
                        place
                    );
                    shown += 1;
                }
            }
            Err(reason) => reason.log(),
        }
    }

    println!("\nParsed {} event(s) (showing {})", total, shown);
    Ok(())
}
