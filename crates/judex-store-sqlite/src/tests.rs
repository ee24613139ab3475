//! Integration tests for `SqliteStore` against an in-memory database.

use chrono::{Duration, NaiveDate, Utc};
use judex_core::{
  case::{CASE_FIELDS, CaseClass, CaseRecord},
  child::{ChildKind, Movement, Party},
  row::{ChildRow, ChildRows, CaseRow, NormalizedCase},
  run::{BatchSummary, RunReport},
  store::{CaseStore, ExportScope},
};
use uuid::Uuid;

use crate::{Error, SqliteStore};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn party(role: &str, name: &str) -> Party {
  Party { role: role.into(), name: name.into() }
}

fn record(key: &str, parties: usize) -> CaseRecord {
  let mut r = CaseRecord::new(key);
  r.header.process_id = Some(4_000_000);
  r.header.class = CaseClass::parse("HC");
  r.header.injunction = true;
  r.header.reporting_judge = "MIN. RELATOR".into();
  r.header.filing_date = NaiveDate::from_ymd_opt(2019, 11, 5);
  r.header.subjects = vec!["Penal".into(), "Processual".into()];
  r.header.origin_numbers = vec![123, 456];
  r.header.volumes = Some(1);
  r.children.parties = (0..parties)
    .map(|i| party("PACTE.(S)", &format!("PARTY {i}")))
    .collect();
  r.children.movements = vec![Movement {
    date: "06/11/2019".into(),
    name: "Autuado".into(),
    ..Movement::default()
  }];
  r
}

/// Hand-rolled normalization so these tests do not depend on the payload
/// crate.
fn normalized(r: &CaseRecord) -> NormalizedCase {
  NormalizedCase {
    parent:   CaseRow { header: r.header.clone(), error_message: None },
    children: ChildKind::ALL
      .iter()
      .map(|&kind| ChildRows {
        kind,
        rows: r
          .children
          .values(kind)
          .into_iter()
          .enumerate()
          .map(|(i, values)| ChildRow { sequence_index: i as u32, values })
          .collect(),
      })
      .collect(),
  }
}

async fn count(s: &SqliteStore, sql: &'static str) -> i64 {
  s.conn
    .call(move |conn| Ok(conn.query_row(sql, [], |r| r.get(0))?))
    .await
    .unwrap()
}

// ─── Upsert ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn upsert_then_get_round_trips() {
  let s = store().await;
  let r = record("HC 1", 3);

  let receipt = s.upsert(normalized(&r)).await.unwrap();
  assert!(receipt.created);
  assert_eq!(receipt.child_rows, 4);

  let stored = s.get_case("HC 1").await.unwrap().unwrap();
  assert_eq!(stored.case_id, receipt.case_id);
  assert_eq!(stored.record, r);
  assert!(!stored.is_failed());
  assert_eq!(stored.created_at, stored.updated_at);
}

#[tokio::test]
async fn get_case_missing_returns_none() {
  let s = store().await;
  assert!(s.get_case("HC 404").await.unwrap().is_none());
  assert!(s.case_status("HC 404").await.unwrap().is_none());
}

#[tokio::test]
async fn empty_case_key_is_rejected() {
  let s = store().await;
  let result = s.upsert(normalized(&record("   ", 0))).await;
  assert!(matches!(result, Err(Error::Core(_))));
}

#[tokio::test]
async fn reingesting_same_payload_is_idempotent() {
  let s = store().await;
  let r = record("HC 2", 2);

  let first = s.upsert(normalized(&r)).await.unwrap();
  let before = s.get_case("HC 2").await.unwrap().unwrap();
  let second = s.upsert(normalized(&r)).await.unwrap();
  let after = s.get_case("HC 2").await.unwrap().unwrap();

  assert!(!second.created);
  assert_eq!(first.case_id, second.case_id);
  assert_eq!(after.record, before.record);
  assert_eq!(after.created_at, before.created_at);
  assert!(after.updated_at >= before.updated_at);
  assert_eq!(count(&s, "SELECT COUNT(*) FROM cases").await, 1);
  assert_eq!(count(&s, "SELECT COUNT(*) FROM parties").await, 2);
}

#[tokio::test]
async fn shrunk_child_list_leaves_no_orphans() {
  let s = store().await;
  s.upsert(normalized(&record("HC 3", 5))).await.unwrap();

  let mut smaller = record("HC 3", 0);
  smaller.children.parties = vec![party("A", "kept 0"), party("B", "kept 1")];
  smaller.children.movements.clear();
  s.upsert(normalized(&smaller)).await.unwrap();

  let stored = s.get_case("HC 3").await.unwrap().unwrap();
  assert_eq!(stored.record.children.parties, smaller.children.parties);
  assert!(stored.record.children.movements.is_empty());
  assert_eq!(count(&s, "SELECT COUNT(*) FROM parties").await, 2);
  assert_eq!(count(&s, "SELECT MAX(sequence_index) FROM parties").await, 1);
}

#[tokio::test]
async fn kinds_missing_from_input_are_still_cleared() {
  let s = store().await;
  s.upsert(normalized(&record("HC 4", 3))).await.unwrap();

  let mut partial = normalized(&record("HC 4", 0));
  partial.children.retain(|c| c.kind != ChildKind::Party);
  s.upsert(partial).await.unwrap();

  assert_eq!(count(&s, "SELECT COUNT(*) FROM parties").await, 0);
}

#[tokio::test]
async fn sequence_index_preserves_source_order() {
  let s = store().await;
  let mut r = record("HC 5", 0);
  r.children.parties = vec![party("r", "A"), party("r", "B"), party("r", "C")];
  s.upsert(normalized(&r)).await.unwrap();

  let indexed: Vec<(i64, String)> = s
    .conn
    .call(|conn| {
      let mut stmt =
        conn.prepare("SELECT sequence_index, name FROM parties ORDER BY sequence_index")?;
      let rows = stmt
        .query_map([], |r| Ok((r.get(0)?, r.get(1)?)))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
      Ok(rows)
    })
    .await
    .unwrap();
  assert_eq!(indexed, [
    (0, "A".to_string()),
    (1, "B".to_string()),
    (2, "C".to_string()),
  ]);

  let stored = s.get_case("HC 5").await.unwrap().unwrap();
  let names: Vec<_> = stored.record.children.parties.iter().map(|p| p.name.as_str()).collect();
  assert_eq!(names, ["A", "B", "C"]);
}

#[tokio::test]
async fn failed_commit_preserves_prior_state() {
  let s = store().await;
  let original = record("HC 6", 2);
  s.upsert(normalized(&original)).await.unwrap();

  // Make the third party insert fail after the parent and two children
  // have already been written inside the transaction.
  s.conn
    .call(|conn| {
      conn.execute_batch(
        "CREATE TRIGGER reject_third_party BEFORE INSERT ON parties
         WHEN NEW.sequence_index = 2
         BEGIN SELECT RAISE(ABORT, 'injected failure'); END;",
      )?;
      Ok(())
    })
    .await
    .unwrap();

  let mut replacement = record("HC 6", 4);
  replacement.header.reporting_judge = "MIN. OUTRO".into();
  let result = s.upsert(normalized(&replacement)).await;
  assert!(matches!(result, Err(Error::Database(_))));

  let stored = s.get_case("HC 6").await.unwrap().unwrap();
  assert_eq!(stored.record, original);
  assert_eq!(count(&s, "SELECT COUNT(*) FROM parties").await, 2);
}

#[tokio::test]
async fn children_require_an_existing_parent() {
  let s = store().await;
  let result = s
    .conn
    .call(|conn| {
      conn.execute(
        "INSERT INTO parties (case_key, sequence_index, role, name) VALUES ('ghost', 0, '', '')",
        [],
      )?;
      Ok(())
    })
    .await;
  assert!(result.is_err());

  s.upsert(normalized(&record("HC 7", 2))).await.unwrap();
  let orphans = count(
    &s,
    "SELECT COUNT(*) FROM parties p LEFT JOIN cases c ON c.case_key = p.case_key
     WHERE c.case_id IS NULL",
  )
  .await;
  assert_eq!(orphans, 0);
}

// ─── Failures ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn mark_failed_creates_bare_row() {
  let s = store().await;
  s.mark_failed("HC 8".into(), "timeout".into()).await.unwrap();

  let status = s.case_status("HC 8").await.unwrap().unwrap();
  assert!(status.is_failed());

  let stored = s.get_case("HC 8").await.unwrap().unwrap();
  assert_eq!(stored.error_message.as_deref(), Some("timeout"));
  assert_eq!(stored.record, CaseRecord::new("HC 8"));
}

#[tokio::test]
async fn mark_failed_keeps_prior_data() {
  let s = store().await;
  let r = record("HC 9", 2);
  s.upsert(normalized(&r)).await.unwrap();
  let before = s.get_case("HC 9").await.unwrap().unwrap();

  s.mark_failed("HC 9".into(), "HTTP 503".into()).await.unwrap();

  let after = s.get_case("HC 9").await.unwrap().unwrap();
  assert_eq!(after.record, r);
  assert_eq!(after.case_id, before.case_id);
  assert_eq!(after.created_at, before.created_at);
  assert_eq!(after.error_message.as_deref(), Some("HTTP 503"));
}

#[tokio::test]
async fn successful_upsert_clears_previous_error() {
  let s = store().await;
  s.mark_failed("HC 10".into(), "timeout".into()).await.unwrap();
  s.upsert(normalized(&record("HC 10", 1))).await.unwrap();

  assert!(!s.case_status("HC 10").await.unwrap().unwrap().is_failed());
  assert!(s.failed_case_keys().await.unwrap().is_empty());
}

#[tokio::test]
async fn failed_keys_in_ingestion_order() {
  let s = store().await;
  s.mark_failed("B".into(), "x".into()).await.unwrap();
  s.upsert(normalized(&record("OK", 0))).await.unwrap();
  s.mark_failed("A".into(), "y".into()).await.unwrap();

  let mut rejected = normalized(&record("C", 1));
  rejected.parent.error_message = Some("filing_date (data_protocolo): bad".into());
  s.upsert(rejected).await.unwrap();

  assert_eq!(s.failed_case_keys().await.unwrap(), ["B", "A", "C"]);
}

// ─── Export ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn export_cases_respects_scope() {
  let s = store().await;
  for key in ["HC 20", "HC 21", "HC 22"] {
    s.upsert(normalized(&record(key, 1))).await.unwrap();
  }

  let all = s.export_cases(&ExportScope::All).await.unwrap();
  let keys: Vec<_> = all.iter().map(|c| c.record.case_key()).collect();
  assert_eq!(keys, ["HC 20", "HC 21", "HC 22"]);

  let some = s
    .export_cases(&ExportScope::from_keys(vec!["HC 22".into(), "HC 99".into()]))
    .await
    .unwrap();
  assert_eq!(some.len(), 1);
  assert_eq!(some[0].record, record("HC 22", 1));
}

#[tokio::test]
async fn export_tables_match_schema() {
  let s = store().await;
  s.upsert(normalized(&record("HC 30", 2))).await.unwrap();
  s.upsert(normalized(&record("HC 31", 1))).await.unwrap();

  let tables = s
    .export_tables(&ExportScope::Keys(vec!["HC 31".into()]))
    .await
    .unwrap();
  assert_eq!(tables.len(), 1 + ChildKind::ALL.len());

  let cases = &tables[0];
  assert_eq!(cases.name, "cases");
  assert_eq!(cases.rows.len(), 1);
  let col = |name: &str| cases.columns.iter().position(|c| c == name).unwrap();
  assert_eq!(cases.rows[0][col("case_key")], "HC 31");
  assert_eq!(cases.rows[0][col("filing_date")], "2019-11-05");
  assert_eq!(cases.rows[0][col("injunction")], "1");
  assert_eq!(cases.rows[0][col("incident_id")], "");
  assert_eq!(cases.rows[0][col("origin_numbers")], "[123,456]");

  let parties = &tables[1];
  assert_eq!(parties.name, "parties");
  assert_eq!(parties.columns, ["case_key", "sequence_index", "role", "name"]);
  assert_eq!(parties.rows, [vec![
    "HC 31".to_string(),
    "0".into(),
    "PACTE.(S)".into(),
    "PARTY 0".into()
  ]]);
}

#[tokio::test]
async fn schema_columns_follow_field_maps() {
  let s = store().await;

  let columns = |table: String| {
    let conn = s.conn.clone();
    async move {
      conn
        .call(move |conn| {
          let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
          let names = stmt
            .query_map([], |r| r.get::<_, String>(1))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
          Ok(names)
        })
        .await
        .unwrap()
    }
  };

  let mut expected = vec!["case_id".to_string()];
  expected.extend(CASE_FIELDS.iter().map(|f| f.column.to_string()));
  expected.extend(
    ["class_recognized", "error_message", "created_at", "updated_at"].map(String::from),
  );
  assert_eq!(columns("cases".into()).await, expected);

  for &kind in ChildKind::ALL {
    let mut expected = vec!["case_key".to_string(), "sequence_index".to_string()];
    expected.extend(kind.columns().map(String::from));
    assert_eq!(columns(kind.table().into()).await, expected, "{}", kind.table());
  }
}

#[tokio::test]
async fn reopening_a_file_store_is_idempotent() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("judex.db");

  let s = SqliteStore::open(&path).await.unwrap();
  s.upsert(normalized(&record("HC 40", 1))).await.unwrap();
  s.close().await.unwrap();

  let s = SqliteStore::open(&path).await.unwrap();
  assert!(s.get_case("HC 40").await.unwrap().is_some());
  s.close().await.unwrap();
}

// ─── Runs ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn runs_are_listed_newest_first() {
  let s = store().await;
  let now = Utc::now();
  for (hours_ago, scraped) in [(3, 1), (1, 2), (2, 3)] {
    let started_at = now - Duration::hours(hours_ago);
    s.record_run(&RunReport {
      run_id: Uuid::new_v4(),
      started_at,
      finished_at: started_at + Duration::minutes(5),
      summary: BatchSummary { scraped, skipped: 0, failed: 1 },
    })
    .await
    .unwrap();
  }

  let runs = s.list_runs(2).await.unwrap();
  let scraped: Vec<_> = runs.iter().map(|r| r.summary.scraped).collect();
  assert_eq!(scraped, [2, 3]);
  assert_eq!(runs[0].summary.total(), 3);
}

#[tokio::test]
async fn class_recognition_is_persisted() {
  let s = store().await;
  let mut odd = record("XYZ 1", 0);
  odd.header.class = CaseClass::parse("XYZ");
  s.upsert(normalized(&record("HC 50", 0))).await.unwrap();
  s.upsert(normalized(&odd)).await.unwrap();

  let flags = s
    .conn
    .call(|conn| {
      let mut stmt =
        conn.prepare("SELECT case_key, class_recognized FROM cases ORDER BY case_id")?;
      let rows = stmt
        .query_map([], |r| Ok((r.get::<_, String>(0)?, r.get::<_, bool>(1)?)))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
      Ok(rows)
    })
    .await
    .unwrap();
  assert_eq!(flags, [("HC 50".to_string(), true), ("XYZ 1".to_string(), false)]);

  let stored = s.get_case("XYZ 1").await.unwrap().unwrap();
  assert_eq!(stored.record.header.class, CaseClass::parse("XYZ"));
}

#[tokio::test]
async fn case_keys_are_stored_in_canonical_form() {
  let s = store().await;
  s.upsert(normalized(&record("HC   60", 1))).await.unwrap();
  s.mark_failed(" HC 60 ".into(), "timeout".into()).await.unwrap();

  let stored = s.get_case("HC\t60").await.unwrap().unwrap();
  assert_eq!(stored.record.case_key(), "HC 60");
  assert_eq!(stored.error_message.as_deref(), Some("timeout"));
  assert_eq!(stored.record.children.parties.len(), 1);
  assert_eq!(s.failed_case_keys().await.unwrap(), ["HC 60"]);
}

#[tokio::test]
async fn repeated_commits_reuse_cached_statements() {
  let s = store().await;
  for round in 0..3 {
    for n in 0..10 {
      let mut r = record(&format!("HC {}", 100 + n), (n + round) % 4);
      r.header.volumes = Some(round as u32);
      s.upsert(normalized(&r)).await.unwrap();
    }
  }

  assert_eq!(count(&s, "SELECT COUNT(*) FROM cases").await, 10);
  assert_eq!(count(&s, "SELECT COUNT(*) FROM cases WHERE volumes = 2").await, 10);
  // Last round: (n + 2) % 4 parties per case, summed over n = 0..10.
  assert_eq!(count(&s, "SELECT COUNT(*) FROM parties").await, 17);
  assert_eq!(count(&s, "SELECT COUNT(*) FROM movements").await, 10);
}
