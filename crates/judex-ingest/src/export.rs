//! Export committed cases in one of the interchange formats.

use std::{
  fs::File,
  io::BufWriter,
  path::Path,
};

use judex_core::store::{CaseStore, ExportScope};
use judex_payload::{document, tabular};

use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ExportFormat {
  /// One pretty-printed JSON array of nested documents.
  Json,
  /// One nested document per line.
  Jsonl,
  /// A directory with one `<table>.csv` per storage table.
  Csv,
}

/// Write the cases in `scope` to `out` and return how many were exported.
///
/// For [`ExportFormat::Csv`] `out` is a directory.
pub async fn export<S: CaseStore>(
  store: &S,
  format: ExportFormat,
  out: &Path,
  scope: &ExportScope,
) -> Result<usize> {
  let io = |source| Error::Io { path: out.to_path_buf(), source };

  let exported = match format {
    ExportFormat::Json | ExportFormat::Jsonl => {
      let cases = store.export_cases(scope).await.map_err(Error::store)?;
      let writer = BufWriter::new(File::create(out).map_err(io)?);
      if format == ExportFormat::Json {
        document::write_json(writer, &cases)?;
      } else {
        document::write_jsonl(writer, &cases)?;
      }
      cases.len()
    }
    ExportFormat::Csv => {
      let tables = store.export_tables(scope).await.map_err(Error::store)?;
      tabular::write_tables(out, &tables)?;
      tables.first().map_or(0, |cases| cases.rows.len())
    }
  };

  tracing::info!(?format, out = %out.display(), cases = exported, "export finished");
  Ok(exported)
}
