//! The parent case record and its classification code.
//!
//! A case is keyed by its unique case number (`case_key`). Scalar attributes
//! live in [`CaseHeader`]; the repeated substructures live in
//! [`Children`](crate::child::Children).

use std::{fmt, str::FromStr};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use strum::{EnumIter, EnumString, IntoStaticStr};

use crate::child::Children;

// ─── Field maps ──────────────────────────────────────────────────────────────

/// One entry of a source-field → storage-column mapping.
///
/// `source` is the key the crawler emits; `aliases` are older spellings of
/// the same key that are still accepted on input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldMap {
  pub column:  &'static str,
  pub source:  &'static str,
  pub aliases: &'static [&'static str],
}

impl FieldMap {
  /// All payload keys that feed this column, preferred spelling first.
  pub fn keys(&self) -> impl Iterator<Item = &'static str> + '_ {
    std::iter::once(self.source).chain(self.aliases.iter().copied())
  }
}

const fn field(column: &'static str, source: &'static str) -> FieldMap {
  FieldMap { column, source, aliases: &[] }
}

const fn aliased(
  column: &'static str,
  source: &'static str,
  aliases: &'static [&'static str],
) -> FieldMap {
  FieldMap { column, source, aliases }
}

/// Column ← source key for every scalar attribute of the `cases` table, in
/// column order.
pub const CASE_FIELDS: &[FieldMap] = &[
  field("case_key", "numero_unico"),
  field("process_id", "processo_id"),
  field("incident_id", "incidente"),
  field("class", "classe"),
  aliased("medium", "meio", &["tipo_processo"]),
  field("publicity", "publicidade"),
  field("injunction", "liminar"),
  field("reporting_judge", "relator"),
  field("origin_court", "origem"),
  aliased("origin_body", "orgao_origem", &["origem_orgao"]),
  field("filing_date", "data_protocolo"),
  aliased("primary_author", "primeiro_autor", &["autor1"]),
  field("subjects", "assuntos"),
  field("badges", "badges"),
  field("origin_numbers", "numero_origem"),
  field("volumes", "volumes"),
  field("sheets", "folhas"),
  field("attachments", "apensos"),
  field("source_markup", "html"),
];

/// Look up the mapping for a `cases` column.
pub fn case_field(column: &str) -> Option<&'static FieldMap> {
  CASE_FIELDS.iter().find(|f| f.column == column)
}

// ─── Classification ──────────────────────────────────────────────────────────

/// Case classes known to the source court.
#[allow(clippy::upper_case_acronyms)]
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  EnumString,
  EnumIter,
  IntoStaticStr,
)]
#[strum(ascii_case_insensitive)]
pub enum ClassCode {
  AC,
  ACO,
  ADC,
  ADI,
  ADO,
  ADPF,
  AI,
  AImp,
  AO,
  AOE,
  AP,
  AR,
  ARE,
  AS,
  CC,
  Cm,
  EI,
  EL,
  EP,
  Ext,
  HC,
  HD,
  IF,
  Inq,
  MI,
  MS,
  PADM,
  Pet,
  PPE,
  PSV,
  RC,
  Rcl,
  RE,
  RHC,
  RHD,
  RMI,
  RMS,
  RvC,
  SE,
  SIRDR,
  SL,
  SS,
  STA,
  STP,
  TPA,
}

impl ClassCode {
  pub fn as_str(self) -> &'static str { self.into() }
}

/// A case's classification. Codes outside [`ClassCode`] are kept verbatim
/// so that new classes introduced by the court do not block ingestion.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum CaseClass {
  Recognized(ClassCode),
  Unrecognized(String),
}

impl CaseClass {
  pub fn parse(s: &str) -> Self {
    match ClassCode::from_str(s) {
      Ok(code) => Self::Recognized(code),
      Err(_) => Self::Unrecognized(s.to_owned()),
    }
  }

  pub fn as_str(&self) -> &str {
    match self {
      Self::Recognized(code) => code.as_str(),
      Self::Unrecognized(raw) => raw,
    }
  }

  pub fn is_recognized(&self) -> bool { matches!(self, Self::Recognized(_)) }
}

impl Default for CaseClass {
  fn default() -> Self { Self::Unrecognized(String::new()) }
}

impl From<String> for CaseClass {
  fn from(s: String) -> Self { Self::parse(&s) }
}

impl From<CaseClass> for String {
  fn from(c: CaseClass) -> Self { c.as_str().to_owned() }
}

impl fmt::Display for CaseClass {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

// ─── Records ─────────────────────────────────────────────────────────────────

/// Largest identifier the store can hold (SQLite integers are `i64`).
pub const MAX_ID: u64 = i64::MAX as u64;

/// Scalar attributes of a case. Text fields default to the empty string,
/// flags to `false`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseHeader {
  /// Unique case number; stable across re-scrapes.
  pub case_key:        String,
  pub process_id:      Option<u64>,
  pub incident_id:     Option<u64>,
  pub class:           CaseClass,
  /// Process subtype (physical or electronic filing).
  pub medium:          String,
  pub publicity:       String,
  /// Whether an injunction is in effect.
  pub injunction:      bool,
  pub reporting_judge: String,
  pub origin_court:    String,
  pub origin_body:     String,
  pub filing_date:     Option<NaiveDate>,
  pub primary_author:  String,
  pub subjects:        Vec<String>,
  pub badges:          Vec<String>,
  pub origin_numbers:  Vec<u64>,
  pub volumes:         Option<u32>,
  pub sheets:          Option<u32>,
  pub attachments:     Option<u32>,
  /// Raw markup captured by the crawler, stored verbatim.
  pub source_markup:   String,
}

impl CaseHeader {
  pub fn new(case_key: impl Into<String>) -> Self {
    Self { case_key: case_key.into(), ..Self::default() }
  }
}

/// A fully typed case: header plus every repeated substructure, in source
/// order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseRecord {
  pub header:   CaseHeader,
  pub children: Children,
}

impl CaseRecord {
  pub fn new(case_key: impl Into<String>) -> Self {
    Self { header: CaseHeader::new(case_key), children: Children::default() }
  }

  pub fn case_key(&self) -> &str { &self.header.case_key }
}

#[cfg(test)]
mod tests {
  use strum::IntoEnumIterator as _;

  use super::*;

  #[test]
  fn known_codes_parse_case_insensitively() {
    assert_eq!(CaseClass::parse("ADI"), CaseClass::Recognized(ClassCode::ADI));
    assert_eq!(CaseClass::parse("adi"), CaseClass::Recognized(ClassCode::ADI));
    assert_eq!(
      CaseClass::parse("AIMP"),
      CaseClass::Recognized(ClassCode::AImp)
    );
    assert_eq!(CaseClass::parse("aimp").as_str(), "AImp");
  }

  #[test]
  fn unknown_code_is_kept_and_flagged() {
    let class = CaseClass::parse("XYZ");
    assert!(!class.is_recognized());
    assert_eq!(class.as_str(), "XYZ");
  }

  #[test]
  fn every_code_round_trips_through_its_name() {
    for code in ClassCode::iter() {
      assert_eq!(CaseClass::parse(code.as_str()), CaseClass::Recognized(code));
    }
    assert_eq!(ClassCode::iter().count(), 45);
  }

  #[test]
  fn class_serializes_as_plain_string() {
    let json = serde_json::to_string(&CaseClass::parse("HC")).unwrap();
    assert_eq!(json, "\"HC\"");
    let back: CaseClass = serde_json::from_str("\"NEW\"").unwrap();
    assert_eq!(back, CaseClass::Unrecognized("NEW".into()));
  }

  #[test]
  fn case_fields_have_unique_columns_and_keys() {
    let mut columns: Vec<_> = CASE_FIELDS.iter().map(|f| f.column).collect();
    columns.sort_unstable();
    columns.dedup();
    assert_eq!(columns.len(), CASE_FIELDS.len());

    let mut keys: Vec<_> = CASE_FIELDS.iter().flat_map(FieldMap::keys).collect();
    let total = keys.len();
    keys.sort_unstable();
    keys.dedup();
    assert_eq!(keys.len(), total);
  }

  #[test]
  fn aliases_resolve_to_the_same_column() {
    let author = case_field("primary_author").unwrap();
    assert_eq!(author.keys().collect::<Vec<_>>(), ["primeiro_autor", "autor1"]);
  }
}
