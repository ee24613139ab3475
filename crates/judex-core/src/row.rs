//! Storage-boundary shapes: what the normalizer hands to a store, and what a
//! store hands back on export.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  case::{CaseHeader, CaseRecord},
  child::ChildKind,
};

/// One parent row. `error_message` set means the case was not fully
/// learned and must not be treated as complete data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseRow {
  pub header:        CaseHeader,
  pub error_message: Option<String>,
}

/// One child row. Values follow [`ChildKind::fields`] order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildRow {
  /// Zero-based position in the source list.
  pub sequence_index: u32,
  pub values:         Vec<String>,
}

/// The ordered rows of one child kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildRows {
  pub kind: ChildKind,
  pub rows: Vec<ChildRow>,
}

/// Input to [`crate::store::CaseStore::upsert`]: a parent row plus one
/// [`ChildRows`] per kind, in [`ChildKind::ALL`] order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedCase {
  pub parent:   CaseRow,
  pub children: Vec<ChildRows>,
}

impl NormalizedCase {
  pub fn case_key(&self) -> &str { &self.parent.header.case_key }

  /// Mark the case as failed; the rows learned so far are kept.
  pub fn with_error(mut self, message: impl Into<String>) -> Self {
    self.parent.error_message = Some(message.into());
    self
  }

  pub fn child_row_count(&self) -> usize {
    self.children.iter().map(|c| c.rows.len()).sum()
  }
}

/// A case as committed, reconstructed from storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCase {
  /// Internal numeric id; stable across re-ingestion of the same key.
  pub case_id:       i64,
  pub record:        CaseRecord,
  pub error_message: Option<String>,
  pub created_at:    DateTime<Utc>,
  pub updated_at:    DateTime<Utc>,
}

impl StoredCase {
  pub fn is_failed(&self) -> bool { self.error_message.is_some() }
}

/// One storage table flattened for spreadsheet-style consumption. Columns
/// match the storage schema one to one; `NULL` becomes the empty string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlatTable {
  pub name:    String,
  pub columns: Vec<String>,
  pub rows:    Vec<Vec<String>>,
}
