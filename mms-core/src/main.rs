//! mms-maint - Archival maintenance job
//!
//! Moves aged or filtered records from the live collections into the
//! historical store, once or on a fixed interval. Ctrl-C stops the run
//! between documents.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use mms_common::config::{resolve_database_path, MmsConfig};
use mms_core::models::{MujId, SectionLetter, SemesterNumber, SessionTerm};
use mms_core::services::ArchiveFilter;
use mms_core::Mentorship;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Command-line arguments for mms-maint
#[derive(Parser, Debug)]
#[command(name = "mms-maint")]
#[command(about = "Archival maintenance job for the mentorship core")]
#[command(version)]
struct Args {
    /// Config file (overrides MMS_CONFIG)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Database file (overrides MMS_DATABASE and the config file)
    #[arg(short, long)]
    database: Option<PathBuf>,

    /// Archive records at least this many academic years old
    #[arg(long)]
    older_than_years: Option<u32>,

    /// Archive records of one term: JULY-DECEMBER or JANUARY-JUNE
    #[arg(long, value_parser = parse_term)]
    term: Option<SessionTerm>,

    /// Archive records of one semester (1-8)
    #[arg(long, value_parser = parse_semester)]
    semester: Option<SemesterNumber>,

    /// Archive records of one section letter
    #[arg(long, value_parser = parse_section)]
    section: Option<SectionLetter>,

    /// Archive records of one mentor
    #[arg(long, value_parser = parse_muj_id)]
    mentor: Option<MujId>,

    /// Archive records of one mentee
    #[arg(long, value_parser = parse_muj_id)]
    mentee: Option<MujId>,

    /// Seconds between runs; 0 runs once (overrides the config file)
    #[arg(long)]
    interval_secs: Option<u64>,

    /// Print the effective configuration and exit
    #[arg(long)]
    print_config: bool,
}

impl Args {
    /// Filter from the command line; falls back to the configured age
    fn filter(&self, config: &MmsConfig) -> ArchiveFilter {
        let filter = ArchiveFilter {
            older_than_years: self.older_than_years,
            term: self.term,
            semester: self.semester,
            section: self.section,
            mentor_id: self.mentor.clone(),
            mentee_id: self.mentee.clone(),
        };
        if filter.is_empty() {
            ArchiveFilter::older_than(config.archival.older_than_years)
        } else {
            filter
        }
    }
}

fn parse_term(raw: &str) -> Result<SessionTerm, String> {
    match raw {
        "JULY-DECEMBER" => Ok(SessionTerm::JulyDecember),
        "JANUARY-JUNE" => Ok(SessionTerm::JanuaryJune),
        other => Err(format!("unknown term {:?}", other)),
    }
}

fn parse_semester(raw: &str) -> Result<SemesterNumber, String> {
    let number: u8 = raw.parse().map_err(|e| format!("{}", e))?;
    SemesterNumber::new(number).map_err(|e| e.to_string())
}

fn parse_section(raw: &str) -> Result<SectionLetter, String> {
    SectionLetter::parse(raw).map_err(|e| e.to_string())
}

fn parse_muj_id(raw: &str) -> Result<MujId, String> {
    MujId::parse(raw).map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = MmsConfig::discover(args.config.as_deref()).context("Failed to load configuration")?;

    if args.print_config {
        println!("{}", config.to_toml_string()?);
        return Ok(());
    }

    // RUST_LOG wins over the configured level
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level)),
        )
        .init();

    info!("Starting mms-maint v{}", env!("CARGO_PKG_VERSION"));

    let db_path = resolve_database_path(args.database.as_deref(), &config);
    info!("Database path: {}", db_path.display());

    let mentorship = Mentorship::open(&db_path, &config)
        .await
        .context("Failed to open database")?;

    let filter = args.filter(&config);
    let interval_secs = args.interval_secs.unwrap_or(config.archival.interval_secs);

    let cancel = CancellationToken::new();
    tokio::spawn(cancel_on_signal(cancel.clone()));

    if interval_secs == 0 {
        run_once(&mentorship, &filter, &cancel).await?;
        return Ok(());
    }

    info!("Archiving every {} s", interval_secs);
    let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                // A failed run is retried on the next tick
                if let Err(e) = run_once(&mentorship, &filter, &cancel).await {
                    error!("{:#}", e);
                }
            }
        }
    }

    info!("mms-maint stopped");
    Ok(())
}

async fn run_once(mentorship: &Mentorship, filter: &ArchiveFilter, cancel: &CancellationToken) -> Result<()> {
    let report = mentorship
        .archive(filter, cancel)
        .await
        .context("Archival run failed")?;

    for failure in &report.not_moved {
        warn!(
            "Not archived: {} {} ({})",
            failure.collection, failure.document_id, failure.reason
        );
    }
    info!(
        "Archived {} document(s), {} left live{}",
        report.moved_count,
        report.not_moved.len(),
        if report.interrupted { ", interrupted" } else { "" }
    );
    Ok(())
}

/// Cancel the token on Ctrl-C
async fn cancel_on_signal(cancel: CancellationToken) {
    match signal::ctrl_c().await {
        Ok(()) => {
            info!("Received Ctrl+C, stopping after the current document");
            cancel.cancel();
        }
        Err(e) => error!("Failed to install Ctrl+C handler: {}", e),
    }
}
