//! Encoding and decoding helpers between Judex record types and the plain
//! representations stored in SQLite columns.
//!
//! Timestamps are fixed-width RFC 3339 strings (microseconds, `Z`) so that
//! text comparison in SQL is chronological. Dates are `yyyy-mm-dd`. List
//! fields are compact JSON. UUIDs are hyphenated lowercase strings.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use judex_core::{
  case::{CASE_FIELDS, CaseClass, CaseHeader, CaseRecord},
  child::Children,
  policy::CaseStatus,
  row::StoredCase,
  run::{BatchSummary, RunReport},
};
use rusqlite::types::Value as SqlValue;
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── NaiveDate ───────────────────────────────────────────────────────────────

const DATE_FORMAT: &str = "%Y-%m-%d";

pub fn encode_date(d: NaiveDate) -> String { d.format(DATE_FORMAT).to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, DATE_FORMAT)
    .map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

// ─── Integers ────────────────────────────────────────────────────────────────

fn encode_id(id: Option<u64>, column: &'static str) -> Result<SqlValue> {
  id.map(|v| i64::try_from(v).map(SqlValue::Integer))
    .transpose()
    .map_err(|_| Error::OutOfRange(column))
    .map(|v| v.unwrap_or(SqlValue::Null))
}

fn decode_id(id: Option<i64>, column: &'static str) -> Result<Option<u64>> {
  id.map(u64::try_from)
    .transpose()
    .map_err(|_| Error::OutOfRange(column))
}

fn encode_count(count: Option<u32>) -> SqlValue {
  count.map_or(SqlValue::Null, |n| SqlValue::Integer(i64::from(n)))
}

// ─── Header ──────────────────────────────────────────────────────────────────

fn encode_column(h: &CaseHeader, column: &'static str) -> Result<SqlValue> {
  let text = |s: &str| SqlValue::Text(s.to_owned());
  Ok(match column {
    "case_key" => text(&h.case_key),
    "process_id" => encode_id(h.process_id, column)?,
    "incident_id" => encode_id(h.incident_id, column)?,
    "class" => text(h.class.as_str()),
    "medium" => text(&h.medium),
    "publicity" => text(&h.publicity),
    "injunction" => SqlValue::Integer(i64::from(h.injunction)),
    "reporting_judge" => text(&h.reporting_judge),
    "origin_court" => text(&h.origin_court),
    "origin_body" => text(&h.origin_body),
    "filing_date" => h
      .filing_date
      .map_or(SqlValue::Null, |d| SqlValue::Text(encode_date(d))),
    "primary_author" => text(&h.primary_author),
    "subjects" => SqlValue::Text(serde_json::to_string(&h.subjects)?),
    "badges" => SqlValue::Text(serde_json::to_string(&h.badges)?),
    "origin_numbers" => SqlValue::Text(serde_json::to_string(&h.origin_numbers)?),
    "volumes" => encode_count(h.volumes),
    "sheets" => encode_count(h.sheets),
    "attachments" => encode_count(h.attachments),
    "source_markup" => text(&h.source_markup),
    other => return Err(Error::UnmappedColumn(other)),
  })
}

/// Bind values for every [`CASE_FIELDS`] column, in order.
pub fn encode_header(header: &CaseHeader) -> Result<Vec<SqlValue>> {
  CASE_FIELDS
    .iter()
    .map(|map| encode_column(header, map.column))
    .collect()
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw values read directly from a `cases` row.
#[derive(Debug)]
pub struct RawCase {
  pub case_id:         i64,
  pub case_key:        String,
  pub process_id:      Option<i64>,
  pub incident_id:     Option<i64>,
  pub class:           String,
  pub medium:          String,
  pub publicity:       String,
  pub injunction:      bool,
  pub reporting_judge: String,
  pub origin_court:    String,
  pub origin_body:     String,
  pub filing_date:     Option<String>,
  pub primary_author:  String,
  pub subjects:        String,
  pub badges:          String,
  pub origin_numbers:  String,
  pub volumes:         Option<u32>,
  pub sheets:          Option<u32>,
  pub attachments:     Option<u32>,
  pub source_markup:   String,
  pub error_message:   Option<String>,
  pub created_at:      String,
  pub updated_at:      String,
}

impl RawCase {
  /// Read a `SELECT * FROM cases` row by column name.
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      case_id:         row.get("case_id")?,
      case_key:        row.get("case_key")?,
      process_id:      row.get("process_id")?,
      incident_id:     row.get("incident_id")?,
      class:           row.get("class")?,
      medium:          row.get("medium")?,
      publicity:       row.get("publicity")?,
      injunction:      row.get("injunction")?,
      reporting_judge: row.get("reporting_judge")?,
      origin_court:    row.get("origin_court")?,
      origin_body:     row.get("origin_body")?,
      filing_date:     row.get("filing_date")?,
      primary_author:  row.get("primary_author")?,
      subjects:        row.get("subjects")?,
      badges:          row.get("badges")?,
      origin_numbers:  row.get("origin_numbers")?,
      volumes:         row.get("volumes")?,
      sheets:          row.get("sheets")?,
      attachments:     row.get("attachments")?,
      source_markup:   row.get("source_markup")?,
      error_message:   row.get("error_message")?,
      created_at:      row.get("created_at")?,
      updated_at:      row.get("updated_at")?,
    })
  }

  pub fn into_stored(self, children: Children) -> Result<StoredCase> {
    let header = CaseHeader {
      case_key:        self.case_key,
      process_id:      decode_id(self.process_id, "process_id")?,
      incident_id:     decode_id(self.incident_id, "incident_id")?,
      class:           CaseClass::parse(&self.class),
      medium:          self.medium,
      publicity:       self.publicity,
      injunction:      self.injunction,
      reporting_judge: self.reporting_judge,
      origin_court:    self.origin_court,
      origin_body:     self.origin_body,
      filing_date:     self.filing_date.as_deref().map(decode_date).transpose()?,
      primary_author:  self.primary_author,
      subjects:        serde_json::from_str(&self.subjects)?,
      badges:          serde_json::from_str(&self.badges)?,
      origin_numbers:  serde_json::from_str(&self.origin_numbers)?,
      volumes:         self.volumes,
      sheets:          self.sheets,
      attachments:     self.attachments,
      source_markup:   self.source_markup,
    };

    Ok(StoredCase {
      case_id:       self.case_id,
      record:        CaseRecord { header, children },
      error_message: self.error_message,
      created_at:    decode_dt(&self.created_at)?,
      updated_at:    decode_dt(&self.updated_at)?,
    })
  }
}

/// Raw values read from the policy columns of a `cases` row.
pub struct RawStatus {
  pub case_key:      String,
  pub error_message: Option<String>,
  pub updated_at:    String,
}

impl RawStatus {
  pub fn into_status(self) -> Result<CaseStatus> {
    Ok(CaseStatus {
      case_key:      self.case_key,
      error_message: self.error_message,
      updated_at:    decode_dt(&self.updated_at)?,
    })
  }
}

/// Raw values read from an `ingest_runs` row.
pub struct RawRun {
  pub run_id:      String,
  pub started_at:  String,
  pub finished_at: String,
  pub scraped:     u32,
  pub skipped:     u32,
  pub failed:      u32,
}

impl RawRun {
  pub fn into_report(self) -> Result<RunReport> {
    Ok(RunReport {
      run_id:      decode_uuid(&self.run_id)?,
      started_at:  decode_dt(&self.started_at)?,
      finished_at: decode_dt(&self.finished_at)?,
      summary:     BatchSummary {
        scraped: self.scraped,
        skipped: self.skipped,
        failed:  self.failed,
      },
    })
  }
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone as _;

  use super::*;

  #[test]
  fn timestamps_are_fixed_width_and_ordered() {
    let a = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
    let b = a + chrono::Duration::microseconds(1);
    let (ea, eb) = (encode_dt(a), encode_dt(b));
    assert_eq!(ea, "2024-01-01T09:00:00.000000Z");
    assert_eq!(ea.len(), eb.len());
    assert!(ea < eb);
    assert_eq!(decode_dt(&eb).unwrap(), b);
  }

  #[test]
  fn header_encodes_one_value_per_column() {
    let mut h = CaseHeader::new("RE 1");
    h.process_id = Some(9);
    h.filing_date = NaiveDate::from_ymd_opt(2020, 2, 29);
    let values = encode_header(&h).unwrap();
    assert_eq!(values.len(), CASE_FIELDS.len());
    assert_eq!(values[1], SqlValue::Integer(9));
    assert_eq!(values[2], SqlValue::Null);
    assert_eq!(values[10], SqlValue::Text("2020-02-29".into()));
  }

  #[test]
  fn oversized_identifier_is_rejected() {
    let mut h = CaseHeader::new("RE 1");
    h.incident_id = Some(u64::MAX);
    assert!(matches!(encode_header(&h), Err(Error::OutOfRange("incident_id"))));
  }
}
