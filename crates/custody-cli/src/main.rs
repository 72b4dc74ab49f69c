//! custody - command-line host for custody-engine
//!
//! Usage:
//!   custody import <calendar.ics> --child <id> [--existing <visits.json>]
//!   custody export <schedule.json>
//!   custody expand <schedule.json> [--weeks N] [--today YYYY-MM-DD]
//!   custody validate <schedule.json>
//!   custody describe <schedule.json>
//!
//! A schedule file holds either a stored schedule (with `id`, `createdAt`,
//! `updatedAt`) or just the draft fields. JSON goes to stdout, logs to stderr.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use custody_engine::{
    convert_to_visits, deduplicate, describe, export_ics, generate_visits_with_options,
    import_from_text_with_options, validate, CustodySchedule, EngineConfig, ExpandOptions,
    ImportOptions, ScheduleDraft, VisitSession,
};
use serde::Serialize;
use tracing::{debug, info};

#[derive(Parser)]
#[command(name = "custody")]
#[command(about = "Custody schedules, visit generation, and iCalendar import/export")]
#[command(version)]
struct Cli {
    /// Engine config file (JSON); CUSTODY_* variables override it
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import custody events from an .ics file as visit drafts
    Import {
        /// Calendar file to read
        ics: PathBuf,
        /// Child the imported visits belong to
        #[arg(long)]
        child: String,
        /// Existing visits (JSON array) to deduplicate against
        #[arg(long, value_name = "PATH")]
        existing: Option<PathBuf>,
    },
    /// Render a schedule as iCalendar text
    Export {
        schedule: PathBuf,
    },
    /// Generate visit drafts from a schedule
    Expand {
        schedule: PathBuf,
        /// Weeks from the schedule start (defaults to the configured horizon)
        #[arg(long)]
        weeks: Option<u32>,
        /// Reference date, YYYY-MM-DD (defaults to the local date)
        #[arg(long)]
        today: Option<NaiveDate>,
    },
    /// Check a schedule; exits 1 and lists problems if invalid
    Validate {
        schedule: PathBuf,
    },
    /// Print a one-line summary of a schedule
    Describe {
        schedule: PathBuf,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ImportReport {
    events: usize,
    skipped: usize,
    visits: Vec<VisitSession>,
}

fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    debug!(?config, "engine config");

    match cli.command {
        Commands::Import {
            ics,
            child,
            existing,
        } => {
            let raw = std::fs::read_to_string(&ics)
                .with_context(|| format!("Failed to read calendar: {}", ics.display()))?;
            let existing: Vec<VisitSession> = match existing {
                Some(path) => read_json(&path)?,
                None => Vec::new(),
            };

            let options = ImportOptions {
                occurrence_limit: config.occurrence_limit,
            };
            let events = import_from_text_with_options(&raw, &options);
            let outcome = deduplicate(convert_to_visits(&events, &child), &existing);
            info!(
                file = %ics.display(),
                events = events.len(),
                new_visits = outcome.to_insert.len(),
                "import complete"
            );

            print_json(&ImportReport {
                events: events.len(),
                skipped: outcome.skipped,
                visits: outcome.to_insert,
            })?;
        }
        Commands::Export { schedule } => {
            let schedule = load_schedule(&schedule)?;
            print!("{}", export_ics(&schedule));
        }
        Commands::Expand {
            schedule,
            weeks,
            today,
        } => {
            let schedule = load_schedule(&schedule)?;
            let today = today.unwrap_or_else(|| Local::now().date_naive());
            let options = ExpandOptions {
                week_start: config.week_start,
            };
            let visits = generate_visits_with_options(
                &schedule,
                weeks.unwrap_or(config.horizon_weeks),
                today,
                &options,
            );
            print_json(&visits)?;
        }
        Commands::Validate { schedule } => {
            let draft: ScheduleDraft = read_json(&schedule)?;
            let errors = validate(&draft);
            if errors.is_empty() {
                println!("valid");
            } else {
                for error in &errors {
                    println!("{error}");
                }
                return Ok(ExitCode::FAILURE);
            }
        }
        Commands::Describe { schedule } => {
            let schedule = load_schedule(&schedule)?;
            println!("{}", describe(&schedule));
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    let config = match path {
        Some(path) => EngineConfig::from_json_file(path)?,
        None => EngineConfig::default(),
    };
    Ok(config.apply_env()?)
}

/// Accept a stored schedule, or a bare draft stamped with the current time.
fn load_schedule(path: &Path) -> Result<CustodySchedule> {
    let value: serde_json::Value = read_json(path)?;
    if value.get("id").is_some() {
        return serde_json::from_value(value)
            .with_context(|| format!("Invalid schedule: {}", path.display()));
    }
    let draft: ScheduleDraft = serde_json::from_value(value)
        .with_context(|| format!("Invalid schedule draft: {}", path.display()))?;
    Ok(CustodySchedule::from_draft(draft, Utc::now()))
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("Invalid JSON in {}", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{json}");
    Ok(())
}
