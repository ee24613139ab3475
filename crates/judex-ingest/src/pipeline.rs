//! Single-case ingestion: policy → fetch → validate → normalize → commit.

use chrono::Utc;
use judex_core::{
  normalize_case_key,
  policy::{SelectionOptions, Verdict, decide},
  run::BatchSummary,
  store::{CaseStore, CommitReceipt},
};
use judex_payload::{FieldError, Validation, normalize_validation, validate};

use crate::source::Fetcher;

/// What happened to one case. Every variant except `Skipped` and
/// `StorageFailed` left a committed row behind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
  Skipped(Verdict),
  Stored {
    verdict: Verdict,
    receipt: CommitReceipt,
  },
  /// Stored with `error_message` set; fields that validated were kept.
  Rejected {
    receipt: CommitReceipt,
    errors:  Vec<FieldError>,
  },
  /// The fetcher failed; the failure is recorded on the case row.
  FetchFailed { message: String },
  /// Nothing was committed; the case's prior state is untouched.
  StorageFailed { message: String },
}

impl Outcome {
  pub fn is_failure(&self) -> bool {
    !matches!(self, Self::Skipped(_) | Self::Stored { .. })
  }

  /// Short label for logs and the CLI.
  pub fn label(&self) -> &'static str {
    match self {
      Self::Skipped(_) => "skipped",
      Self::Stored { .. } => "stored",
      Self::Rejected { .. } => "rejected",
      Self::FetchFailed { .. } => "fetch-failed",
      Self::StorageFailed { .. } => "storage-failed",
    }
  }

  /// One-line detail for failures.
  pub fn detail(&self) -> Option<String> {
    match self {
      Self::Rejected { errors, .. } => Some(
        errors
          .iter()
          .map(ToString::to_string)
          .collect::<Vec<_>>()
          .join("; "),
      ),
      Self::FetchFailed { message } | Self::StorageFailed { message } => {
        Some(message.clone())
      }
      Self::Skipped(_) | Self::Stored { .. } => None,
    }
  }
}

/// An [`Outcome`] tagged with its case key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseOutcome {
  pub case_key: String,
  pub outcome:  Outcome,
}

/// Fold outcomes into the operator-facing counts.
pub fn summarize<'a>(outcomes: impl IntoIterator<Item = &'a Outcome>) -> BatchSummary {
  let mut summary = BatchSummary::default();
  for outcome in outcomes {
    match outcome {
      Outcome::Stored { .. } => summary.scraped += 1,
      Outcome::Skipped(_) => summary.skipped += 1,
      _ => summary.failed += 1,
    }
  }
  summary
}

/// Run one case through the pipeline. Never returns an error: every
/// failure becomes an [`Outcome`] so the caller's batch carries on.
///
/// The caller is responsible for serializing calls for the same key.
pub async fn ingest_case<S, F>(
  store: &S,
  fetcher: &F,
  case_key: &str,
  options: &SelectionOptions,
) -> Outcome
where
  S: CaseStore,
  F: Fetcher,
{
  let case_key = normalize_case_key(case_key);
  let case_key = case_key.as_str();

  let storage_failed = |e: S::Error| {
    tracing::error!(case_key, error = %e, "storage failure");
    Outcome::StorageFailed { message: e.to_string() }
  };

  let status = match store.case_status(case_key).await {
    Ok(status) => status,
    Err(e) => return storage_failed(e),
  };

  let verdict = decide(status.as_ref(), options, Utc::now());
  if !verdict.action().should_fetch() {
    tracing::debug!(case_key, ?verdict, "skipping");
    return Outcome::Skipped(verdict);
  }

  let payload = match fetcher.fetch(case_key).await {
    Ok(payload) => payload,
    Err(e) => {
      let message = e.to_string();
      tracing::warn!(case_key, error = %message, "fetch failed");
      return match store.mark_failed(case_key.to_owned(), message.clone()).await {
        Ok(()) => Outcome::FetchFailed { message },
        Err(e) => storage_failed(e),
      };
    }
  };

  let validation = validate(case_key, &payload);
  let errors = match &validation {
    Validation::Valid(_) => None,
    Validation::Invalid(rejection) => Some(rejection.errors.clone()),
  };

  let receipt = match store.upsert(normalize_validation(validation)).await {
    Ok(receipt) => receipt,
    Err(e) => return storage_failed(e),
  };

  match errors {
    None => {
      tracing::info!(case_key, ?verdict, child_rows = receipt.child_rows, "stored");
      Outcome::Stored { verdict, receipt }
    }
    Some(errors) => {
      tracing::warn!(case_key, errors = errors.len(), "stored with validation errors");
      Outcome::Rejected { receipt, errors }
    }
  }
}
