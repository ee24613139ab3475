//! The fetch boundary: where raw per-case payloads come from.
//!
//! Network retrieval is the crawler's job. The runner only sees the
//! [`Fetcher`] trait; [`PayloadFile`] serves payloads the crawler captured
//! to a JSON Lines file.

use std::{
  collections::HashMap,
  fs::File,
  future::Future,
  io::{BufRead, BufReader},
  path::Path,
};

use judex_core::normalize_case_key;
use serde_json::Value;
use thiserror::Error;

use crate::{Error, Result};

/// Why a payload could not be obtained. Opaque to the runner, which records
/// the message on the case.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
  /// The crawler tried and reported a failure.
  #[error("{0}")]
  Reported(String),

  #[error("no payload captured for {0:?}")]
  Missing(String),
}

/// Source of raw payloads. Called only for cases the selection policy
/// decided to fetch.
pub trait Fetcher: Send + Sync {
  fn fetch<'a>(
    &'a self,
    case_key: &'a str,
  ) -> impl Future<Output = Result<Value, FetchError>> + Send + 'a;
}

// ─── PayloadFile ─────────────────────────────────────────────────────────────

/// Payloads captured to JSON Lines.
///
/// Each line is either a case payload, keyed by `numero_unico` (or an
/// explicit `case_key`), or `{"case_key": ..., "error": ...}` for a case the
/// crawler failed to fetch. A later line for the same key replaces an
/// earlier one.
#[derive(Debug, Default)]
pub struct PayloadFile {
  entries: HashMap<String, Result<Value, String>>,
  order:   Vec<String>,
  /// Lines that could not be used, as `(line number, reason)`.
  invalid: Vec<(usize, String)>,
}

fn entry_key(obj: &serde_json::Map<String, Value>) -> Option<String> {
  ["case_key", "numero_unico"]
    .iter()
    .filter_map(|k| obj.get(*k).and_then(Value::as_str))
    .map(normalize_case_key)
    .find(|k| !k.is_empty())
}

impl PayloadFile {
  /// Read every line of `reader`. Unusable lines are set aside, not fatal.
  pub fn from_reader(reader: impl BufRead) -> std::io::Result<Self> {
    let mut file = Self::default();

    for (index, line) in reader.lines().enumerate() {
      let line = line?;
      let number = index + 1;
      if line.trim().is_empty() {
        continue;
      }

      let value: Value = match serde_json::from_str(&line) {
        Ok(v) => v,
        Err(e) => {
          file.invalid.push((number, format!("invalid JSON: {e}")));
          continue;
        }
      };
      let Some(obj) = value.as_object() else {
        file.invalid.push((number, "expected a JSON object".into()));
        continue;
      };
      let Some(key) = entry_key(obj) else {
        file.invalid.push((number, "no case_key or numero_unico".into()));
        continue;
      };

      let entry = match obj.get("error") {
        Some(Value::String(message)) => Err(message.clone()),
        Some(Value::Null) | None => Ok(value),
        Some(other) => Err(other.to_string()),
      };
      if file.entries.insert(key.clone(), entry).is_none() {
        file.order.push(key);
      }
    }

    for (line, reason) in &file.invalid {
      tracing::warn!(line, reason = %reason, "skipping payload line");
    }
    Ok(file)
  }

  pub fn open(path: &Path) -> Result<Self> {
    let io = |source| Error::Io { path: path.to_path_buf(), source };
    let reader = BufReader::new(File::open(path).map_err(io)?);
    Self::from_reader(reader).map_err(io)
  }

  /// Every captured key, in first-seen order.
  pub fn case_keys(&self) -> &[String] { &self.order }

  pub fn invalid_lines(&self) -> &[(usize, String)] { &self.invalid }

  pub fn len(&self) -> usize { self.order.len() }

  pub fn is_empty(&self) -> bool { self.order.is_empty() }
}

impl Fetcher for PayloadFile {
  async fn fetch(&self, case_key: &str) -> Result<Value, FetchError> {
    match self.entries.get(&normalize_case_key(case_key)) {
      Some(Ok(payload)) => Ok(payload.clone()),
      Some(Err(message)) => Err(FetchError::Reported(message.clone())),
      None => Err(FetchError::Missing(case_key.to_owned())),
    }
  }
}
