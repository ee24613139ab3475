//! Typed record → parent row plus ordered child rows.

use judex_core::{
  case::CaseRecord,
  child::ChildKind,
  row::{CaseRow, ChildRow, ChildRows, NormalizedCase},
};

use crate::validate::Validation;

/// Split a record into storage rows. Every kind is present in the output,
/// in [`ChildKind::ALL`] order, even when its list is empty.
pub fn normalize(record: CaseRecord) -> NormalizedCase {
  let CaseRecord { header, children } = record;

  let children = ChildKind::ALL
    .iter()
    .map(|&kind| ChildRows {
      kind,
      rows: children
        .values(kind)
        .into_iter()
        .enumerate()
        .map(|(position, values)| ChildRow {
          sequence_index: position as u32,
          values,
        })
        .collect(),
    })
    .collect();

  NormalizedCase {
    parent: CaseRow { header, error_message: None },
    children,
  }
}

/// Normalize either validation outcome. A rejection keeps its partial data
/// and carries the error summary into `error_message`.
pub fn normalize_validation(validation: Validation) -> NormalizedCase {
  match validation {
    Validation::Valid(record) => normalize(record),
    Validation::Invalid(rejection) => {
      let summary = rejection.summary();
      normalize(rejection.partial).with_error(summary)
    }
  }
}
