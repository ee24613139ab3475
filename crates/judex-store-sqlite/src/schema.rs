//! SQL schema for the Judex SQLite store.
//!
//! Executed at connection startup; idempotent thanks to
//! `CREATE ... IF NOT EXISTS`. Child tables are generated from
//! [`ChildKind::fields`] so their columns cannot drift from the field map.

use judex_core::child::ChildKind;

/// Parent table, run history, and connection pragmas.
const BASE: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS cases (
    case_id         INTEGER PRIMARY KEY AUTOINCREMENT,
    case_key        TEXT    NOT NULL UNIQUE CHECK (case_key <> ''),
    process_id      INTEGER CHECK (process_id > 0),
    incident_id     INTEGER CHECK (incident_id > 0),
    class           TEXT    NOT NULL DEFAULT '',
    medium          TEXT    NOT NULL DEFAULT '',
    publicity       TEXT    NOT NULL DEFAULT '',
    injunction      INTEGER NOT NULL DEFAULT 0 CHECK (injunction IN (0, 1)),
    reporting_judge TEXT    NOT NULL DEFAULT '',
    origin_court    TEXT    NOT NULL DEFAULT '',
    origin_body     TEXT    NOT NULL DEFAULT '',
    filing_date     TEXT,                         -- yyyy-mm-dd
    primary_author  TEXT    NOT NULL DEFAULT '',
    subjects        TEXT    NOT NULL DEFAULT '[]', -- JSON array of text
    badges          TEXT    NOT NULL DEFAULT '[]', -- JSON array of text
    origin_numbers  TEXT    NOT NULL DEFAULT '[]', -- JSON array of integers
    volumes         INTEGER CHECK (volumes >= 0),
    sheets          INTEGER CHECK (sheets >= 0),
    attachments     INTEGER CHECK (attachments >= 0),
    source_markup   TEXT    NOT NULL DEFAULT '',
    class_recognized INTEGER NOT NULL DEFAULT 0 CHECK (class_recognized IN (0, 1)),
    error_message   TEXT,                         -- NULL = complete data
    created_at      TEXT    NOT NULL,             -- RFC 3339 UTC, fixed width
    updated_at      TEXT    NOT NULL,
    CHECK (updated_at >= created_at)
);

CREATE INDEX IF NOT EXISTS cases_failed_idx
    ON cases(case_key) WHERE error_message IS NOT NULL;

CREATE TABLE IF NOT EXISTS ingest_runs (
    run_id      TEXT    PRIMARY KEY,
    started_at  TEXT    NOT NULL,
    finished_at TEXT    NOT NULL,
    scraped     INTEGER NOT NULL,
    skipped     INTEGER NOT NULL,
    failed      INTEGER NOT NULL
);
";

fn child_table(kind: ChildKind) -> String {
  let columns: String = kind
    .columns()
    .map(|c| format!("    {c} TEXT NOT NULL DEFAULT '',\n"))
    .collect();
  format!(
    "CREATE TABLE IF NOT EXISTS {table} (
    case_key       TEXT    NOT NULL REFERENCES cases(case_key) ON DELETE CASCADE,
    sequence_index INTEGER NOT NULL CHECK (sequence_index >= 0),
{columns}    PRIMARY KEY (case_key, sequence_index)
);
",
    table = kind.table(),
  )
}

/// Full schema DDL.
pub fn schema() -> String {
  let mut ddl = BASE.to_owned();
  for &kind in ChildKind::ALL {
    ddl.push_str(&child_table(kind));
  }
  ddl.push_str("PRAGMA user_version = 1;\n");
  ddl
}
