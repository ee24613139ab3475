//! Batch bookkeeping.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Per-batch counts shown to the operator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
  pub scraped: u32,
  pub skipped: u32,
  pub failed:  u32,
}

impl BatchSummary {
  pub fn total(&self) -> u32 { self.scraped + self.skipped + self.failed }
}

/// One finished batch, as recorded in the run history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
  pub run_id:      Uuid,
  pub started_at:  DateTime<Utc>,
  pub finished_at: DateTime<Utc>,
  pub summary:     BatchSummary,
}
