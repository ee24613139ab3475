//! The `CaseStore` trait and supporting query types.
//!
//! The trait is implemented by storage backends (e.g. `judex-store-sqlite`).
//! The ingest runner depends on this abstraction, not on any concrete
//! backend.

use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::{
  policy::CaseStatus,
  row::{FlatTable, NormalizedCase, StoredCase},
  run::RunReport,
};

// ─── Query types ─────────────────────────────────────────────────────────────

/// Which cases an export covers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ExportScope {
  #[default]
  All,
  Keys(Vec<String>),
}

impl ExportScope {
  /// An empty key list means everything.
  pub fn from_keys(keys: Vec<String>) -> Self {
    if keys.is_empty() { Self::All } else { Self::Keys(keys) }
  }
}

/// What a successful [`CaseStore::upsert`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitReceipt {
  pub case_id:    i64,
  /// `true` when this commit created the case row.
  pub created:    bool,
  pub child_rows: usize,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a Judex case store backend.
///
/// Every write is one all-or-nothing transaction for one case key: readers
/// never observe a parent without its children, or children of a parent that
/// was rolled back.
///
/// All methods return `Send` futures so the trait can be used from
/// multi-threaded tokio tasks.
pub trait CaseStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Selection ─────────────────────────────────────────────────────────

  /// What is known about `case_key`, or `None` if it was never ingested.
  fn case_status<'a>(
    &'a self,
    case_key: &'a str,
  ) -> impl Future<Output = Result<Option<CaseStatus>, Self::Error>> + Send + 'a;

  // ── Writes ────────────────────────────────────────────────────────────

  /// Insert or update the parent row by `case_key`, then replace every
  /// child table's rows for that key with the given sequences.
  ///
  /// `created_at` is set only when the row is first created; `updated_at`
  /// on every commit.
  fn upsert(
    &self,
    case: NormalizedCase,
  ) -> impl Future<Output = Result<CommitReceipt, Self::Error>> + Send + '_;

  /// Record that fetching `case_key` failed.
  ///
  /// Creates a bare failed row when the key is new. An existing row keeps
  /// its fields and children; only `error_message` and `updated_at` change.
  fn mark_failed(
    &self,
    case_key: String,
    message: String,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Append a finished batch to the run history.
  fn record_run<'a>(
    &'a self,
    report: &'a RunReport,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  // ── Reads ─────────────────────────────────────────────────────────────

  /// Rebuild one case with its children ordered by `sequence_index`.
  fn get_case<'a>(
    &'a self,
    case_key: &'a str,
  ) -> impl Future<Output = Result<Option<StoredCase>, Self::Error>> + Send + 'a;

  /// Rebuild every case in `scope`, ordered by internal id. Unknown keys
  /// are ignored.
  fn export_cases<'a>(
    &'a self,
    scope: &'a ExportScope,
  ) -> impl Future<Output = Result<Vec<StoredCase>, Self::Error>> + Send + 'a;

  /// One [`FlatTable`] per storage table (parent first), restricted to
  /// `scope`.
  fn export_tables<'a>(
    &'a self,
    scope: &'a ExportScope,
  ) -> impl Future<Output = Result<Vec<FlatTable>, Self::Error>> + Send + 'a;

  /// Keys of every case whose last attempt failed, for later retry runs.
  fn failed_case_keys(
    &self,
  ) -> impl Future<Output = Result<Vec<String>, Self::Error>> + Send + '_;

  /// Most recent batches first.
  fn list_runs(
    &self,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<RunReport>, Self::Error>> + Send + '_;
}
