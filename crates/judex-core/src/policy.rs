//! Selection policy: given what the store already knows about a case,
//! decide whether it should be fetched at all.
//!
//! The rules are evaluated in a fixed order; the first match wins.
//!
//! 1. no stored row                         → scrape
//! 2. stored row failed, `retry_failed`     → retry
//! 3. stored row failed, no `retry_failed`  → skip
//! 4. stored row older than `max_age_hours` → scrape
//! 5. stored row ok, `skip_existing`        → skip
//! 6. otherwise                             → scrape

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Caller-supplied policy knobs, fixed for the duration of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionOptions {
  pub skip_existing: bool,
  pub retry_failed:  bool,
  /// `None` means stored rows never go stale.
  pub max_age_hours: Option<u32>,
}

impl Default for SelectionOptions {
  fn default() -> Self {
    Self { skip_existing: true, retry_failed: false, max_age_hours: None }
  }
}

/// What the store knows about one case key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseStatus {
  pub case_key:      String,
  pub error_message: Option<String>,
  pub updated_at:    DateTime<Utc>,
}

impl CaseStatus {
  pub fn is_failed(&self) -> bool { self.error_message.is_some() }
}

/// Coarse outcome of the policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
  Scrape,
  /// Scrape a case whose previous attempt failed.
  Retry,
  Skip,
}

impl Action {
  pub fn should_fetch(self) -> bool { !matches!(self, Self::Skip) }
}

/// The rule that fired, one variant per precedence step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
  New,
  RetryFailed,
  SkipFailed,
  Stale,
  SkipExisting,
  Default,
}

impl Verdict {
  pub fn action(self) -> Action {
    match self {
      Self::New | Self::Stale | Self::Default => Action::Scrape,
      Self::RetryFailed => Action::Retry,
      Self::SkipFailed | Self::SkipExisting => Action::Skip,
    }
  }
}

/// Apply the selection rules. Read-only and deterministic in `now`.
pub fn decide(
  existing: Option<&CaseStatus>,
  options: &SelectionOptions,
  now: DateTime<Utc>,
) -> Verdict {
  let Some(status) = existing else {
    return Verdict::New;
  };

  if status.is_failed() {
    return if options.retry_failed {
      Verdict::RetryFailed
    } else {
      Verdict::SkipFailed
    };
  }

  if let Some(hours) = options.max_age_hours
    && now.signed_duration_since(status.updated_at)
      > Duration::hours(i64::from(hours))
  {
    return Verdict::Stale;
  }

  if options.skip_existing {
    return Verdict::SkipExisting;
  }

  Verdict::Default
}
