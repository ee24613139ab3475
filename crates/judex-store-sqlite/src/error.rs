//! Error type for `judex-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] judex_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// A stored integer does not fit the record model, or vice versa.
  #[error("value out of range for column {0}")]
  OutOfRange(&'static str),

  /// A record column without a storage encoding.
  #[error("no storage encoding for column {0}")]
  UnmappedColumn(&'static str),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
