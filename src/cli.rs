//! Command-line front end.
//!
//! Each subcommand prints one JSON document to the given writer. Commands
//! that only read or clear history never need an API key.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde_json::json;
use thiserror::Error;

use crate::config::{self, AnalysisConfig, ConfigError};
use crate::db::{SqliteKvStorage, StorageError};
use crate::models::{ClaimRecord, ClaimStatus, Document};
use crate::pipeline::analysis::{AnalysisClient, AnalysisError, GeminiClient};
use crate::pipeline::{ClaimPipeline, ClaimStats, ClaimStore, LogObserver};

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Analysis failed: {0}")]
    Analysis(#[from] AnalysisError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Cannot read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot write output: {0}")]
    Output(String),
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        Self::Output(e.to_string())
    }
}

impl From<std::io::Error> for CliError {
    fn from(e: std::io::Error) -> Self {
        Self::Output(e.to_string())
    }
}

#[derive(Parser, Debug)]
#[command(name = "deepextract", version)]
#[command(about = "Analyze insurance claim documents for inconsistencies and fraud indicators")]
#[command(
    after_help = "Environment:\n  DEEPEXTRACT_API_KEY        Model API key (analyze, extract, coherence)\n  DEEPEXTRACT_API_URL        Model endpoint override\n  DEEPEXTRACT_TIMEOUT_SECS   Per-request timeout (default 120)\n  DEEPEXTRACT_DB_PATH        History database (default ~/DeepExtract/claims.db)\n  DEEPEXTRACT_STORAGE_QUOTA_BYTES  Largest history snapshot stored (default unlimited)\n  RUST_LOG                   Log filter"
)]
pub struct Cli {
    /// History database path, overriding DEEPEXTRACT_DB_PATH.
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Analyze claim documents in order and record the results.
    Analyze {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Extract plain text from one document.
    Extract { file: PathBuf },
    /// Check a plain-text claim for internal coherence.
    Coherence { file: PathBuf },
    /// Show recorded claims.
    History {
        #[arg(long, value_parser = parse_status)]
        status: Option<ClaimStatus>,
        /// Only completed claims with at least one flag.
        #[arg(long, conflicts_with = "approved")]
        flagged: bool,
        /// Only consistent completed claims without flags.
        #[arg(long)]
        approved: bool,
    },
    /// Dashboard statistics over the recorded claims.
    Stats,
    /// Delete all recorded claims.
    Clear,
}

fn parse_status(raw: &str) -> Result<ClaimStatus, String> {
    ClaimStatus::from_str(raw).map_err(|e| e.to_string())
}

/// Run a parsed command against the process environment.
pub fn run(cli: Cli, out: &mut dyn Write) -> Result<(), CliError> {
    run_with_lookup(cli, |key| std::env::var(key).ok(), out)
}

/// Run a parsed command with settings drawn from `lookup`.
pub fn run_with_lookup<F>(cli: Cli, lookup: F, out: &mut dyn Write) -> Result<(), CliError>
where
    F: Fn(&str) -> Option<String>,
{
    let db_path = match &cli.db {
        Some(path) => path.clone(),
        None => config::db_path_from_lookup(&lookup)?,
    };
    let quota = config::storage_quota_from_lookup(&lookup)?;

    match cli.command {
        Commands::Analyze { files } => {
            let analysis = AnalysisConfig::from_lookup(&lookup)?;
            let documents = files
                .iter()
                .map(|path| read_document(path))
                .collect::<Result<Vec<_>, _>>()?;

            let client = AnalysisClient::new(Arc::new(GeminiClient::new(&analysis)?));
            let store = open_store(&db_path, quota)?;
            let mut pipeline = ClaimPipeline::new(Box::new(client), store);
            pipeline.add_observer(Box::new(LogObserver));

            let report = pipeline.process_batch(documents);
            let records: Vec<&ClaimRecord> = report
                .record_ids
                .iter()
                .filter_map(|id| pipeline.get(id))
                .collect();
            write_json(
                out,
                &json!({
                    "report": report,
                    "records": records,
                    "stats": pipeline.stats(),
                }),
            )
        }
        Commands::Extract { file } => {
            let analysis = AnalysisConfig::from_lookup(&lookup)?;
            let document = read_document(&file)?;
            let client = AnalysisClient::new(Arc::new(GeminiClient::new(&analysis)?));
            let extracted = client.extract_text(&document)?;
            write_json(out, &extracted)
        }
        Commands::Coherence { file } => {
            let analysis = AnalysisConfig::from_lookup(&lookup)?;
            let text = std::fs::read_to_string(&file).map_err(|source| CliError::Io {
                path: file.display().to_string(),
                source,
            })?;
            let client = AnalysisClient::new(Arc::new(GeminiClient::new(&analysis)?));
            let result = client.analyze_text_coherence(&text)?;
            write_json(out, &result)
        }
        Commands::History {
            status,
            flagged,
            approved,
        } => {
            let store = open_store(&db_path, quota)?;
            let records: Vec<&ClaimRecord> = store
                .records()
                .iter()
                .filter(|r| status.map_or(true, |s| r.status() == s))
                .filter(|r| !flagged || r.is_flagged())
                .filter(|r| !approved || r.is_approved())
                .collect();
            write_json(out, &records)
        }
        Commands::Stats => {
            let store = open_store(&db_path, quota)?;
            write_json(out, &ClaimStats::from_records(store.records()))
        }
        Commands::Clear => {
            let mut store = open_store(&db_path, quota)?;
            let removed = clear_history(&mut store)?;
            write_json(out, &json!({ "removed": removed }))
        }
    }
}

fn open_store(path: &Path, quota: Option<usize>) -> Result<ClaimStore, CliError> {
    tracing::debug!(path = %path.display(), ?quota, "Opening claim history");
    let mut storage = SqliteKvStorage::open(path)?;
    if let Some(limit) = quota {
        storage = storage.with_quota(limit);
    }
    Ok(ClaimStore::open(Box::new(storage)))
}

/// Clear the history, failing if storage still holds the old snapshot.
fn clear_history(store: &mut ClaimStore) -> Result<usize, CliError> {
    let removed = store.len();
    store.clear();
    if !store.is_synced() {
        return Err(CliError::Storage(StorageError::Unavailable(
            "claim history could not be removed from storage".into(),
        )));
    }
    Ok(removed)
}

fn read_document(path: &Path) -> Result<Document, CliError> {
    Document::from_path(path).map_err(|source| CliError::Io {
        path: path.display().to_string(),
        source,
    })
}

fn write_json<T: serde::Serialize + ?Sized>(out: &mut dyn Write, value: &T) -> Result<(), CliError> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}
