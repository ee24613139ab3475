//! `judex` command-line runner.
//!
//! Reads `judex.toml` (or the path given with `--config`) plus `JUDEX_*`
//! environment variables, opens the SQLite store, and runs one command:
//!
//! ```text
//! judex ingest --payloads captured.jsonl
//! judex ingest --payloads captured.jsonl --failed-only
//! judex export --format csv --out tables/
//! judex failed
//! judex runs --limit 5
//! ```

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use clap::{Args, Parser, Subcommand};
use judex_core::store::{CaseStore, ExportScope};
use judex_ingest::{ExportFormat, IngestConfig, Ingestor, source::PayloadFile};
use judex_store_sqlite::SqliteStore;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Legal case ingestion and export")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, global = true, default_value = "judex.toml")]
  config: PathBuf,

  /// Override the configured SQLite database path.
  #[arg(long, global = true)]
  store: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Validate, normalize and commit captured payloads.
  Ingest(IngestArgs),
  /// Write committed cases out as JSON, JSON Lines or CSV tables.
  Export(ExportArgs),
  /// List the keys of cases whose last attempt failed.
  Failed,
  /// Show recent ingestion runs.
  Runs {
    #[arg(short, long, default_value_t = 10)]
    limit: usize,
  },
}

#[derive(Args)]
struct IngestArgs {
  /// JSON Lines file of captured payloads.
  #[arg(short, long)]
  payloads: PathBuf,

  /// Only ingest these case keys (repeatable).
  #[arg(long = "case")]
  cases: Vec<String>,

  /// Re-fetch cases whose previous attempt failed.
  #[arg(long)]
  retry_failed: bool,

  /// Re-ingest cases that are already stored.
  #[arg(long)]
  no_skip_existing: bool,

  /// Treat stored cases older than this as stale.
  #[arg(long)]
  max_age_hours: Option<u32>,

  /// Target only the cases currently marked failed. Implies `--retry-failed`.
  #[arg(long, conflicts_with = "cases")]
  failed_only: bool,

  #[arg(short = 'j', long)]
  concurrency: Option<usize>,
}

#[derive(Args)]
struct ExportArgs {
  #[arg(short, long, value_enum, default_value_t = ExportFormat::Json)]
  format: ExportFormat,

  /// Output file, or directory for `csv`.
  #[arg(short, long)]
  out: PathBuf,

  /// Only export these case keys (repeatable).
  #[arg(long = "case")]
  cases: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config.clone()).required(false))
    .add_source(
      config::Environment::with_prefix("JUDEX")
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true),
    )
    .build()
    .context("failed to read config file")?;

  let mut cfg: IngestConfig = settings
    .try_deserialize()
    .context("failed to deserialise IngestConfig")?;
  if let Some(store) = cli.store {
    cfg.store_path = store;
  }

  let store_path = expand_tilde(&cfg.store_path);
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  let result = run(cli.command, &cfg, &store).await;

  if let Err(e) = store.close().await {
    tracing::warn!(error = %e, "failed to close store cleanly");
  }
  result
}

async fn run(command: Command, cfg: &IngestConfig, store: &SqliteStore) -> anyhow::Result<()> {
  match command {
    Command::Ingest(args) => ingest(args, cfg, store).await,

    Command::Export(args) => {
      let scope = ExportScope::from_keys(args.cases);
      let count = judex_ingest::export(store, args.format, &args.out, &scope)
        .await
        .with_context(|| format!("failed to export to {}", args.out.display()))?;
      println!("exported {count} case(s) to {}", args.out.display());
      Ok(())
    }

    Command::Failed => {
      for key in store.failed_case_keys().await? {
        println!("{key}");
      }
      Ok(())
    }

    Command::Runs { limit } => {
      for run in store.list_runs(limit).await? {
        let s = run.summary;
        println!(
          "{}  {}  scraped={} skipped={} failed={}",
          run.run_id,
          run.started_at.to_rfc3339(),
          s.scraped,
          s.skipped,
          s.failed,
        );
      }
      Ok(())
    }
  }
}

async fn ingest(args: IngestArgs, cfg: &IngestConfig, store: &SqliteStore) -> anyhow::Result<()> {
  let mut selection = cfg.selection;
  selection.retry_failed |= args.retry_failed || args.failed_only;
  if args.no_skip_existing {
    selection.skip_existing = false;
  }
  if args.max_age_hours.is_some() {
    selection.max_age_hours = args.max_age_hours;
  }

  let file = PayloadFile::open(&args.payloads)?;
  if !file.invalid_lines().is_empty() {
    eprintln!(
      "{} unusable line(s) in {}",
      file.invalid_lines().len(),
      args.payloads.display()
    );
  }

  let targets = if !args.cases.is_empty() {
    args.cases
  } else if args.failed_only {
    store.failed_case_keys().await?
  } else {
    file.case_keys().to_vec()
  };

  let ingestor = Ingestor::new(Arc::new(store.clone()), selection)
    .with_concurrency(args.concurrency.unwrap_or(cfg.concurrency));
  let report = ingestor.run_batch(targets, Arc::new(file)).await;

  for failure in report.failures() {
    let detail = failure.outcome.detail().unwrap_or_default();
    println!("{}\t{}\t{detail}", failure.case_key, failure.outcome.label());
  }

  let s = report.summary;
  println!(
    "run {}: {} case(s), scraped={} skipped={} failed={}",
    report.run_id,
    s.total(),
    s.scraped,
    s.skipped,
    s.failed,
  );
  Ok(())
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
