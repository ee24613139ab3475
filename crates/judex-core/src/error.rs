//! Error types for `judex-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("case key must not be empty")]
  EmptyCaseKey,

  #[error("unknown child kind: {0:?}")]
  UnknownChildKind(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
