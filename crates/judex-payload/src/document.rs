//! Nested interchange documents.
//!
//! A document has the shape the crawler emits (source keys, dates as
//! `dd/mm/yyyy`, one list per child kind) plus the storage bookkeeping
//! fields. Feeding a document back through [`crate::validate`] yields the
//! same record.

use std::io::Write;

use chrono::{DateTime, SecondsFormat, Utc};
use judex_core::{
  case::{CASE_FIELDS, CaseHeader, CaseRecord},
  child::ChildKind,
  row::StoredCase,
};
use serde_json::{Map, Value, json};

use crate::Result;

const DATE_FORMAT: &str = "%d/%m/%Y";

fn timestamp(at: &DateTime<Utc>) -> Value {
  Value::String(at.to_rfc3339_opts(SecondsFormat::Micros, true))
}

fn header_value(header: &CaseHeader, column: &str) -> Value {
  match column {
    "case_key" => json!(header.case_key),
    "process_id" => json!(header.process_id),
    "incident_id" => json!(header.incident_id),
    "class" => json!(header.class.as_str()),
    "medium" => json!(header.medium),
    "publicity" => json!(header.publicity),
    "injunction" => json!(header.injunction),
    "reporting_judge" => json!(header.reporting_judge),
    "origin_court" => json!(header.origin_court),
    "origin_body" => json!(header.origin_body),
    "filing_date" => json!(header.filing_date.map(|d| d.format(DATE_FORMAT).to_string())),
    "primary_author" => json!(header.primary_author),
    "subjects" => json!(header.subjects),
    "badges" => json!(header.badges),
    "origin_numbers" => json!(header.origin_numbers),
    "volumes" => json!(header.volumes),
    "sheets" => json!(header.sheets),
    "attachments" => json!(header.attachments),
    "source_markup" => json!(header.source_markup),
    _ => Value::Null,
  }
}

/// The record alone, keyed by source names.
pub fn record_document(record: &CaseRecord) -> Map<String, Value> {
  let mut doc = Map::new();

  for map in CASE_FIELDS {
    doc.insert(map.source.to_owned(), header_value(&record.header, map.column));
  }

  for &kind in ChildKind::ALL {
    let entries = record
      .children
      .values(kind)
      .into_iter()
      .map(|values| {
        kind
          .fields()
          .iter()
          .zip(values)
          .map(|(map, value)| (map.source.to_owned(), Value::String(value)))
          .collect::<Map<_, _>>()
      })
      .map(Value::Object)
      .collect();
    doc.insert(kind.source_key().to_owned(), Value::Array(entries));
  }

  doc
}

/// One stored case as a nested document.
pub fn to_document(case: &StoredCase) -> Value {
  let mut doc = record_document(&case.record);
  doc.insert("case_id".into(), json!(case.case_id));
  doc.insert("error_message".into(), json!(case.error_message));
  doc.insert("created_at".into(), timestamp(&case.created_at));
  doc.insert("updated_at".into(), timestamp(&case.updated_at));
  Value::Object(doc)
}

// ─── Writers ─────────────────────────────────────────────────────────────────

/// Write all cases as one pretty-printed JSON array.
pub fn write_json<W: Write>(mut out: W, cases: &[StoredCase]) -> Result<()> {
  let docs: Vec<Value> = cases.iter().map(to_document).collect();
  serde_json::to_writer_pretty(&mut out, &docs)?;
  out.write_all(b"\n")?;
  out.flush()?;
  Ok(())
}

/// Write one document per line.
pub fn write_jsonl<W: Write>(mut out: W, cases: &[StoredCase]) -> Result<()> {
  for case in cases {
    serde_json::to_writer(&mut out, &to_document(case))?;
    out.write_all(b"\n")?;
  }
  out.flush()?;
  Ok(())
}
