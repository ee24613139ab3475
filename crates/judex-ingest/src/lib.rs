//! Batch ingestion runner for Judex.
//!
//! Drives many cases through [`pipeline::ingest_case`] against any
//! [`CaseStore`], with bounded concurrency and per-key serialization. A
//! failing case never aborts the batch; it shows up as a failed
//! [`Outcome`] in the [`BatchReport`].

pub mod error;
mod export;
pub mod locks;
pub mod pipeline;
pub mod source;

pub use error::{Error, Result};
pub use export::{ExportFormat, export};
pub use pipeline::{CaseOutcome, Outcome};

use std::{collections::HashSet, path::PathBuf, sync::Arc};

use chrono::{DateTime, Utc};
use judex_core::{
  normalize_case_key,
  policy::SelectionOptions,
  run::{BatchSummary, RunReport},
  store::CaseStore,
};
use serde::Deserialize;
use tokio::{sync::Semaphore, task::JoinSet};
use uuid::Uuid;

use locks::KeyLocks;
use source::Fetcher;

// ─── Configuration ───────────────────────────────────────────────────────────

/// Runtime configuration, deserialised from `judex.toml` and `JUDEX_*`
/// environment variables.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
  pub store_path:  PathBuf,
  /// Cases processed at once.
  pub concurrency: usize,
  pub selection:   SelectionOptions,
}

impl Default for IngestConfig {
  fn default() -> Self {
    Self {
      store_path:  PathBuf::from("judex.db"),
      concurrency: 4,
      selection:   SelectionOptions::default(),
    }
  }
}

// ─── Report ──────────────────────────────────────────────────────────────────

/// Everything one batch did, with outcomes in target order.
#[derive(Debug, Clone)]
pub struct BatchReport {
  pub run_id:      Uuid,
  pub started_at:  DateTime<Utc>,
  pub finished_at: DateTime<Utc>,
  pub outcomes:    Vec<CaseOutcome>,
  pub summary:     BatchSummary,
}

impl BatchReport {
  pub fn run_report(&self) -> RunReport {
    RunReport {
      run_id:      self.run_id,
      started_at:  self.started_at,
      finished_at: self.finished_at,
      summary:     self.summary,
    }
  }

  pub fn failures(&self) -> impl Iterator<Item = &CaseOutcome> {
    self.outcomes.iter().filter(|o| o.outcome.is_failure())
  }
}

/// Trim keys and drop blanks and repeats; the first occurrence wins.
fn dedupe(targets: impl IntoIterator<Item = String>) -> Vec<String> {
  let mut seen = HashSet::new();
  targets
    .into_iter()
    .map(|key| normalize_case_key(&key))
    .filter(|key| !key.is_empty() && seen.insert(key.clone()))
    .collect()
}

// ─── Ingestor ────────────────────────────────────────────────────────────────

/// Runs batches against one store with fixed selection options.
pub struct Ingestor<S> {
  store:       Arc<S>,
  options:     SelectionOptions,
  concurrency: usize,
  locks:       KeyLocks,
}

impl<S> Ingestor<S>
where
  S: CaseStore + 'static,
{
  pub fn new(store: Arc<S>, options: SelectionOptions) -> Self {
    Self {
      store,
      options,
      concurrency: IngestConfig::default().concurrency,
      locks: KeyLocks::new(),
    }
  }

  pub fn with_concurrency(mut self, concurrency: usize) -> Self {
    self.concurrency = concurrency.max(1);
    self
  }

  pub fn store(&self) -> &Arc<S> { &self.store }

  /// Ingest a single case, serialized against any other in-flight
  /// ingestion of the same key through this ingestor.
  pub async fn ingest_one<F: Fetcher>(&self, case_key: &str, fetcher: &F) -> Outcome {
    let case_key = normalize_case_key(case_key);
    let _guard = self.locks.lock(&case_key).await;
    pipeline::ingest_case(self.store.as_ref(), fetcher, &case_key, &self.options).await
  }

  /// Ingest every target and record the run. Per-case failures are
  /// reported, never propagated.
  pub async fn run_batch<F>(
    &self,
    targets: impl IntoIterator<Item = String>,
    fetcher: Arc<F>,
  ) -> BatchReport
  where
    F: Fetcher + 'static,
  {
    let run_id = Uuid::new_v4();
    let started_at = Utc::now();
    let keys = dedupe(targets);
    tracing::info!(%run_id, cases = keys.len(), concurrency = self.concurrency, "batch started");

    let permits = Arc::new(Semaphore::new(self.concurrency));
    let mut tasks = JoinSet::new();

    for (index, case_key) in keys.iter().cloned().enumerate() {
      let store = self.store.clone();
      let fetcher = fetcher.clone();
      let locks = self.locks.clone();
      let permits = permits.clone();
      let options = self.options;

      tasks.spawn(async move {
        let outcome = match permits.acquire_owned().await {
          Ok(_permit) => {
            let _guard = locks.lock(&case_key).await;
            pipeline::ingest_case(store.as_ref(), fetcher.as_ref(), &case_key, &options)
              .await
          }
          Err(e) => Outcome::StorageFailed { message: e.to_string() },
        };
        (index, outcome)
      });
    }

    let mut slots: Vec<Option<Outcome>> = vec![None; keys.len()];
    while let Some(joined) = tasks.join_next().await {
      match joined {
        Ok((index, outcome)) => slots[index] = Some(outcome),
        Err(e) => tracing::error!(%run_id, error = %e, "ingestion task aborted"),
      }
    }

    let outcomes: Vec<CaseOutcome> = keys
      .into_iter()
      .zip(slots)
      .map(|(case_key, slot)| CaseOutcome {
        case_key,
        outcome: slot.unwrap_or_else(|| Outcome::StorageFailed {
          message: "ingestion task aborted".into(),
        }),
      })
      .collect();

    let report = BatchReport {
      run_id,
      started_at,
      finished_at: Utc::now(),
      summary: pipeline::summarize(outcomes.iter().map(|o| &o.outcome)),
      outcomes,
    };

    if let Err(e) = self.store.record_run(&report.run_report()).await {
      tracing::error!(%run_id, error = %e, "failed to record run");
    }

    let BatchSummary { scraped, skipped, failed } = report.summary;
    tracing::info!(%run_id, scraped, skipped, failed, "batch finished");
    report
  }
}
