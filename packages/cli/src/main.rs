#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Command-line tools for the envwatch report store.
//!
//! ```text
//! envwatch serve
//! envwatch list [--type water] [--status received] [--date-range week] [--search river]
//! envwatch stats
//! envwatch export --format csv|geojson [--output reports.csv]
//! envwatch set-status <id> <status> [--assignee ...] [--notes ...] [--resolution ...]
//! envwatch import <reports.json>
//! envwatch summarize <text>
//! ```
//!
//! Every command except `summarize` works on the `SQLite` store named by
//! `--db` or `ENVWATCH_DB_PATH`.

use std::path::{Path, PathBuf};

use chrono::Utc;
use clap::{Args, Parser, Subcommand, ValueEnum};
use envwatch_query::{ReportQueryEngine, compute_stats, reports_to_csv};
use envwatch_report_models::{Report, ReportStatus, StatusPatch};
use envwatch_server::Config;
use envwatch_server_models::ReportQueryParams;
use envwatch_store::{ReportStore as _, SqliteStore};

#[derive(Parser)]
#[command(name = "envwatch", about = "Manage and inspect environmental reports")]
struct Cli {
    /// `SQLite` store to use instead of `ENVWATCH_DB_PATH`
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the API server
    Serve,
    /// List reports matching the filters
    List {
        #[command(flatten)]
        query: QueryArgs,
    },
    /// Print dashboard statistics as JSON
    Stats,
    /// Export the matching reports
    Export {
        #[command(flatten)]
        query: QueryArgs,
        #[arg(long, value_enum, default_value = "csv")]
        format: ExportFormat,
        /// Write to this file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Change a report's status
    SetStatus {
        id: String,
        /// New status (`received`, `in_progress`, `resolved`, `urgent` or a Korean label)
        status: String,
        #[arg(long)]
        assignee: Option<String>,
        #[arg(long)]
        notes: Option<String>,
        #[arg(long)]
        resolution: Option<String>,
    },
    /// Import reports from a JSON array
    Import { path: PathBuf },
    /// Summarize text with the configured AI provider
    Summarize { text: String },
}

#[derive(Args, Debug, Default)]
struct QueryArgs {
    /// Category (`waste`, `air`, `water`, `noise`) or `all`
    #[arg(long = "type")]
    category: Option<String>,
    #[arg(long)]
    status: Option<String>,
    #[arg(long)]
    severity: Option<String>,
    /// `all`, `week`, `month` or `3months`
    #[arg(long)]
    date_range: Option<String>,
    /// Search term; filters are ignored when set
    #[arg(long)]
    search: Option<String>,
}

impl QueryArgs {
    fn params(&self) -> ReportQueryParams {
        ReportQueryParams {
            category: self.category.clone(),
            status: self.status.clone(),
            severity: self.severity.clone(),
            date_range: self.date_range.clone(),
            q: self.search.clone(),
        }
    }

    fn display_set(&self, reports: Vec<Report>) -> Result<Vec<Report>, String> {
        let params = self.params();
        let mut engine = ReportQueryEngine::new(reports);
        engine.set_filters(params.filters()?);
        engine.set_search(params.search());
        Ok(engine.view().display.clone())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum ExportFormat {
    Csv,
    Geojson,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init_custom_env("RUST_LOG");
    let cli = Cli::parse();

    let mut config = Config::from_env();
    if let Some(db) = cli.db {
        config.db_path = db;
    }

    match cli.command {
        Commands::Serve => {
            // The server uses actix-web's runtime, so we need to run it
            // in a blocking task to avoid nesting tokio runtimes.
            tokio::task::spawn_blocking(move || {
                actix_web::rt::System::new().block_on(envwatch_server::run_server(config))
            })
            .await??;
        }
        Commands::List { query } => {
            let store = SqliteStore::open(&config.db_path).await?;
            let reports = query.display_set(store.list_reports().await?)?;

            if reports.is_empty() {
                println!("No reports found.");
                return Ok(());
            }

            println!(
                "{:<38} {:<10} {:<12} {:<8} {:<6} TITLE",
                "ID", "DATE", "STATUS", "SEVERITY", "TYPE"
            );
            println!("{}", "-".repeat(100));
            for report in &reports {
                println!(
                    "{:<38} {:<10} {:<12} {:<8} {:<6} {}",
                    report.id,
                    report.date,
                    report.status.as_str(),
                    report.severity.as_ref(),
                    report.category.as_ref(),
                    truncate(&report.title, 40),
                );
            }
            println!("\n{} report(s)", reports.len());
        }
        Commands::Stats => {
            let store = SqliteStore::open(&config.db_path).await?;
            let stats = compute_stats(&store.list_reports().await?, Utc::now());
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        Commands::Export {
            query,
            format,
            output,
        } => {
            let store = SqliteStore::open(&config.db_path).await?;
            let reports = query.display_set(store.list_reports().await?)?;
            let body = match format {
                ExportFormat::Csv => reports_to_csv(&reports)?,
                ExportFormat::Geojson => envwatch_map::display_set_to_geojson_string(
                    &reports,
                    &envwatch_map::MapSyncConfig::default().missing_coordinates,
                )?,
            };
            write_output(output.as_deref(), &body)?;
            log::info!("Exported {} report(s)", reports.len());
        }
        Commands::SetStatus {
            id,
            status,
            assignee,
            notes,
            resolution,
        } => {
            let store = SqliteStore::open(&config.db_path).await?;
            let patch = StatusPatch {
                status: ReportStatus::parse(&status),
                assigned_to: assignee,
                processing_notes: notes,
                resolution_report: resolution,
            };
            if let ReportStatus::Unknown(value) = &patch.status {
                log::warn!("Storing unrecognized status {value:?}");
            }
            let updated = store.update_report_status(&id, &patch).await?;
            println!("{}: {}", updated.id, updated.status.label());
        }
        Commands::Import { path } => {
            let store = SqliteStore::open(&config.db_path).await?;
            let reports: Vec<Report> = serde_json::from_str(&std::fs::read_to_string(&path)?)?;
            let imported = store.import_reports(&reports).await?;
            println!("Imported {imported} report(s) from {}", path.display());
        }
        Commands::Summarize { text } => {
            let provider = envwatch_ai::create_provider_from_env().await?;
            match envwatch_ai::summarize(provider.as_ref(), &text).await {
                Some(analysis) => println!("{}", serde_json::to_string_pretty(&analysis)?),
                None => {
                    eprintln!("Summarization failed");
                    std::process::exit(1);
                }
            }
        }
    }

    Ok(())
}

fn truncate(value: &str, max: usize) -> String {
    if value.chars().count() > max {
        let head: String = value.chars().take(max.saturating_sub(3)).collect();
        format!("{head}...")
    } else {
        value.to_string()
    }
}

fn write_output(path: Option<&Path>, body: &str) -> std::io::Result<()> {
    match path {
        Some(path) => std::fs::write(path, body),
        None => {
            println!("{body}");
            Ok(())
        }
    }
}
