//! [`SqliteStore`], the SQLite implementation of [`CaseStore`].

use std::{collections::HashMap, path::Path, sync::LazyLock};

use chrono::Utc;
use rusqlite::{OptionalExtension as _, types::Value as SqlValue};

use judex_core::{
  case::CASE_FIELDS,
  check_case_key,
  child::{ChildKind, Children},
  normalize_case_key,
  policy::CaseStatus,
  row::{FlatTable, NormalizedCase, StoredCase},
  run::RunReport,
  store::{CaseStore, CommitReceipt, ExportScope},
};

use crate::{
  Result,
  encode::{RawCase, RawRun, RawStatus, encode_dt, encode_header, encode_uuid},
  schema::schema,
};

// ─── SQL ─────────────────────────────────────────────────────────────────────

/// Insert-or-update by `case_key`. `case_id` and `created_at` survive the
/// update; `updated_at` never drops below `created_at`.
///
/// Binds the [`CASE_FIELDS`] columns, then `class_recognized`,
/// `error_message` and the timestamp.
fn upsert_case_sql() -> String {
  let mut columns: Vec<&str> = CASE_FIELDS.iter().map(|f| f.column).collect();
  columns.extend(["class_recognized", "error_message"]);
  let stamp = columns.len() + 1;
  let placeholders: Vec<String> =
    (1..=columns.len()).map(|i| format!("?{i}")).collect();
  let updates: String = columns
    .iter()
    .skip(1)
    .map(|c| format!("{c} = excluded.{c},\n       "))
    .collect();

  format!(
    "INSERT INTO cases ({cols}, created_at, updated_at)
     VALUES ({vals}, ?{stamp}, ?{stamp})
     ON CONFLICT(case_key) DO UPDATE SET
       {updates}
       updated_at = MAX(excluded.updated_at, cases.created_at)
     RETURNING case_id",
    cols = columns.join(", "),
    vals = placeholders.join(", "),
  )
}

/// Per-kind statements used by [`CaseStore::upsert`].
struct ChildSql {
  delete: String,
  insert: String,
}

impl ChildSql {
  fn new(kind: ChildKind) -> Self {
    let columns: Vec<&str> = kind.columns().collect();
    let placeholders: Vec<String> =
      (3..columns.len() + 3).map(|i| format!("?{i}")).collect();
    Self {
      delete: format!("DELETE FROM {} WHERE case_key = ?1", kind.table()),
      insert: format!(
        "INSERT INTO {table} (case_key, sequence_index, {cols}) VALUES (?1, ?2, {vals})",
        table = kind.table(),
        cols = columns.join(", "),
        vals = placeholders.join(", "),
      ),
    }
  }
}

static UPSERT_CASE: LazyLock<String> = LazyLock::new(upsert_case_sql);

static CHILD_SQL: LazyLock<HashMap<ChildKind, ChildSql>> = LazyLock::new(|| {
  ChildKind::ALL
    .iter()
    .map(|&kind| (kind, ChildSql::new(kind)))
    .collect()
});

fn child_sql(kind: ChildKind) -> &'static ChildSql { &CHILD_SQL[&kind] }

/// Every statement above plus the per-kind reads, with headroom.
const STATEMENT_CACHE: usize = 64;

/// `?1` is either NULL (every case) or a JSON array of case keys.
const SCOPE_FILTER: &str =
  "(?1 IS NULL OR c.case_key IN (SELECT value FROM json_each(?1)))";

fn scope_param(scope: &ExportScope) -> Result<Option<String>> {
  Ok(match scope {
    ExportScope::All => None,
    ExportScope::Keys(keys) => {
      let keys: Vec<String> = keys.iter().map(|k| normalize_case_key(k)).collect();
      Some(serde_json::to_string(&keys)?)
    }
  })
}

// ─── Connection-thread helpers ───────────────────────────────────────────────

/// Children of one case, ordered by `sequence_index`.
fn load_children(
  conn: &rusqlite::Connection,
  case_key: &str,
) -> rusqlite::Result<Children> {
  let mut children = Children::default();
  for &kind in ChildKind::ALL {
    let width = kind.fields().len();
    let mut stmt = conn.prepare_cached(&format!(
      "SELECT {cols} FROM {table} WHERE case_key = ?1 ORDER BY sequence_index",
      cols = kind.columns().collect::<Vec<_>>().join(", "),
      table = kind.table(),
    ))?;
    let rows = stmt
      .query_map([case_key], |row| {
        (0..width)
          .map(|i| row.get::<_, String>(i))
          .collect::<rusqlite::Result<Vec<_>>>()
      })?
      .collect::<rusqlite::Result<Vec<Vec<String>>>>()?;
    for values in rows {
      children.push_values(kind, values);
    }
  }
  Ok(children)
}

/// Parent rows in `scope` with their children, ordered by `case_id`.
fn load_cases(
  conn: &rusqlite::Connection,
  scope: Option<&str>,
) -> rusqlite::Result<Vec<(RawCase, Children)>> {
  let mut stmt = conn.prepare(&format!(
    "SELECT c.* FROM cases c WHERE {SCOPE_FILTER} ORDER BY c.case_id"
  ))?;
  let parents = stmt
    .query_map([scope], RawCase::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;

  parents
    .into_iter()
    .map(|raw| {
      let children = load_children(conn, &raw.case_key)?;
      Ok((raw, children))
    })
    .collect()
}

/// Render one SQLite value for tabular export; `NULL` is empty.
fn cell(value: rusqlite::types::ValueRef<'_>) -> String {
  use rusqlite::types::ValueRef;
  match value {
    ValueRef::Null => String::new(),
    ValueRef::Integer(i) => i.to_string(),
    ValueRef::Real(f) => f.to_string(),
    ValueRef::Text(t) | ValueRef::Blob(t) => String::from_utf8_lossy(t).into_owned(),
  }
}

fn flat_table(
  conn: &rusqlite::Connection,
  name: &str,
  sql: &str,
  scope: Option<&str>,
) -> rusqlite::Result<FlatTable> {
  let mut stmt = conn.prepare(sql)?;
  let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
  let width = columns.len();
  let rows = stmt
    .query_map([scope], |row| {
      (0..width)
        .map(|i| row.get_ref(i).map(cell))
        .collect::<rusqlite::Result<Vec<_>>>()
    })?
    .collect::<rusqlite::Result<Vec<Vec<String>>>>()?;
  Ok(FlatTable { name: name.to_owned(), columns, rows })
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Judex case store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  pub(crate) conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Flush and close the connection. Outstanding clones become unusable.
  pub async fn close(self) -> Result<()> {
    self.conn.close().await?;
    Ok(())
  }

  async fn init_schema(&self) -> Result<()> {
    let ddl = schema();
    self
      .conn
      .call(move |conn| {
        conn.set_prepared_statement_cache_capacity(STATEMENT_CACHE);
        conn.execute_batch(&ddl)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── CaseStore impl ──────────────────────────────────────────────────────────

impl CaseStore for SqliteStore {
  type Error = crate::Error;

  // ── Selection ─────────────────────────────────────────────────────────────

  async fn case_status(&self, case_key: &str) -> Result<Option<CaseStatus>> {
    let key = check_case_key(case_key)?;

    let raw: Option<RawStatus> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT case_key, error_message, updated_at FROM cases WHERE case_key = ?1",
              [key],
              |row| {
                Ok(RawStatus {
                  case_key:      row.get(0)?,
                  error_message: row.get(1)?,
                  updated_at:    row.get(2)?,
                })
              },
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawStatus::into_status).transpose()
  }

  // ── Writes ────────────────────────────────────────────────────────────────

  async fn upsert(&self, case: NormalizedCase) -> Result<CommitReceipt> {
    let NormalizedCase { parent, children } = case;
    let key = check_case_key(&parent.header.case_key)?;

    let mut header = encode_header(&parent.header)?;
    header[0] = SqlValue::Text(key.clone());
    header.push(SqlValue::Integer(i64::from(parent.header.class.is_recognized())));
    header.push(parent.error_message.map_or(SqlValue::Null, SqlValue::Text));
    header.push(SqlValue::Text(encode_dt(Utc::now())));

    let receipt = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let created = tx
          .prepare_cached("SELECT 1 FROM cases WHERE case_key = ?1")?
          .query_row([&key], |_| Ok(()))
          .optional()?
          .is_none();

        let case_id: i64 = tx
          .prepare_cached(&UPSERT_CASE)?
          .query_row(rusqlite::params_from_iter(header), |row| row.get(0))?;

        // Every kind is cleared, including kinds absent from `children`.
        for &kind in ChildKind::ALL {
          tx.prepare_cached(&child_sql(kind).delete)?.execute([&key])?;
        }

        let mut child_rows = 0;
        for rows in children {
          let mut stmt = tx.prepare_cached(&child_sql(rows.kind).insert)?;
          for row in rows.rows {
            let params = [
              SqlValue::Text(key.clone()),
              SqlValue::Integer(i64::from(row.sequence_index)),
            ]
            .into_iter()
            .chain(row.values.into_iter().map(SqlValue::Text));
            stmt.execute(rusqlite::params_from_iter(params))?;
            child_rows += 1;
          }
        }

        tx.commit()?;
        Ok(CommitReceipt { case_id, created, child_rows })
      })
      .await?;

    tracing::debug!(
      case_id = receipt.case_id,
      created = receipt.created,
      child_rows = receipt.child_rows,
      "case committed"
    );
    Ok(receipt)
  }

  async fn mark_failed(&self, case_key: String, message: String) -> Result<()> {
    let key = check_case_key(&case_key)?;
    let now = encode_dt(Utc::now());

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO cases (case_key, error_message, created_at, updated_at)
           VALUES (?1, ?2, ?3, ?3)
           ON CONFLICT(case_key) DO UPDATE SET
             error_message = excluded.error_message,
             updated_at = MAX(excluded.updated_at, cases.created_at)",
          rusqlite::params![key, message, now],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn record_run(&self, report: &RunReport) -> Result<()> {
    let run_id = encode_uuid(report.run_id);
    let started = encode_dt(report.started_at);
    let finished = encode_dt(report.finished_at);
    let summary = report.summary;

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO ingest_runs (run_id, started_at, finished_at, scraped, skipped, failed)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          rusqlite::params![
            run_id,
            started,
            finished,
            summary.scraped,
            summary.skipped,
            summary.failed,
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  // ── Reads ─────────────────────────────────────────────────────────────────

  async fn get_case(&self, case_key: &str) -> Result<Option<StoredCase>> {
    let key = check_case_key(case_key)?;

    let found: Option<(RawCase, Children)> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let raw = tx
          .query_row("SELECT * FROM cases WHERE case_key = ?1", [&key], RawCase::from_row)
          .optional()?;
        let found = match raw {
          Some(raw) => {
            let children = load_children(&tx, &key)?;
            Some((raw, children))
          }
          None => None,
        };
        tx.commit()?;
        Ok(found)
      })
      .await?;

    found.map(|(raw, children)| raw.into_stored(children)).transpose()
  }

  async fn export_cases(&self, scope: &ExportScope) -> Result<Vec<StoredCase>> {
    let scope = scope_param(scope)?;

    let loaded = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let loaded = load_cases(&tx, scope.as_deref())?;
        tx.commit()?;
        Ok(loaded)
      })
      .await?;

    loaded
      .into_iter()
      .map(|(raw, children)| raw.into_stored(children))
      .collect()
  }

  async fn export_tables(&self, scope: &ExportScope) -> Result<Vec<FlatTable>> {
    let scope = scope_param(scope)?;

    let tables = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let scope = scope.as_deref();

        let mut tables = vec![flat_table(
          &tx,
          "cases",
          &format!("SELECT c.* FROM cases c WHERE {SCOPE_FILTER} ORDER BY c.case_id"),
          scope,
        )?];
        for &kind in ChildKind::ALL {
          tables.push(flat_table(
            &tx,
            kind.table(),
            &format!(
              "SELECT t.* FROM {table} t JOIN cases c ON c.case_key = t.case_key
               WHERE {SCOPE_FILTER} ORDER BY c.case_id, t.sequence_index",
              table = kind.table(),
            ),
            scope,
          )?);
        }

        tx.commit()?;
        Ok(tables)
      })
      .await?;

    Ok(tables)
  }

  async fn failed_case_keys(&self) -> Result<Vec<String>> {
    let keys = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT case_key FROM cases WHERE error_message IS NOT NULL ORDER BY case_id",
        )?;
        let keys = stmt
          .query_map([], |row| row.get(0))?
          .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(keys)
      })
      .await?;
    Ok(keys)
  }

  async fn list_runs(&self, limit: usize) -> Result<Vec<RunReport>> {
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);

    let raws: Vec<RawRun> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT run_id, started_at, finished_at, scraped, skipped, failed
           FROM ingest_runs ORDER BY started_at DESC, rowid DESC LIMIT ?1",
        )?;
        let rows = stmt
          .query_map([limit], |row| {
            Ok(RawRun {
              run_id:      row.get(0)?,
              started_at:  row.get(1)?,
              finished_at: row.get(2)?,
              scraped:     row.get(3)?,
              skipped:     row.get(4)?,
              failed:      row.get(5)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawRun::into_report).collect()
  }
}
