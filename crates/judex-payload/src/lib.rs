//! Payload codec for Judex.
//!
//! Converts between raw crawler payloads, the typed [`judex_core`] record
//! model, normalized rows, and the interchange/tabular export forms. Pure
//! synchronous; no database dependencies.
//!
//! # Quick start
//!
//! ```no_run
//! use judex_payload::{normalize_validation, validate};
//!
//! let raw = serde_json::json!({ "classe": "ADI", "partes": [{ "tipo": "AUTOR", "nome": "X" }] });
//! let validation = validate("ADI 1234", &raw);
//! let rows = normalize_validation(validation);
//! println!("{} child rows", rows.child_row_count());
//! ```

pub mod document;
pub mod error;
mod normalize;
pub mod tabular;
mod validate;

pub use error::{Error, Result};
pub use normalize::{normalize, normalize_validation};
pub use validate::{FieldError, Rejection, Validation, validate};
