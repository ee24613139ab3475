//! Flat per-table CSV export.

use std::{
  fs,
  io::Write,
  path::{Path, PathBuf},
};

use judex_core::row::FlatTable;

use crate::Result;

/// Write one table, header row first.
pub fn write_table<W: Write>(out: W, table: &FlatTable) -> Result<()> {
  let mut writer = csv::Writer::from_writer(out);
  writer.write_record(&table.columns)?;
  for row in &table.rows {
    writer.write_record(row)?;
  }
  writer.flush()?;
  Ok(())
}

/// Write `<dir>/<table>.csv` for every table, creating `dir` if needed.
/// Returns the written paths in input order.
pub fn write_tables(dir: &Path, tables: &[FlatTable]) -> Result<Vec<PathBuf>> {
  fs::create_dir_all(dir)?;
  let mut written = Vec::with_capacity(tables.len());
  for table in tables {
    let path = dir.join(format!("{}.csv", table.name));
    write_table(fs::File::create(&path)?, table)?;
    tracing::debug!(table = %table.name, rows = table.rows.len(), path = %path.display(), "wrote table");
    written.push(path);
  }
  Ok(written)
}
