//! Core types and trait definitions for the Judex case store.
//!
//! This crate is deliberately free of database and serialization-format
//! dependencies. Every other crate depends on it.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod case;
pub mod child;
pub mod error;
pub mod policy;
pub mod row;
pub mod run;
pub mod store;

pub use error::{Error, Result};

/// Canonical form of a case key: trimmed, internal whitespace runs
/// collapsed to one space. Every crate keys cases through this.
pub fn normalize_case_key(case_key: &str) -> String {
  case_key.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalize `case_key` and reject it if nothing is left.
pub fn check_case_key(case_key: &str) -> Result<String> {
  let key = normalize_case_key(case_key);
  if key.is_empty() {
    return Err(Error::EmptyCaseKey);
  }
  Ok(key)
}
