//! Result serialization: one CSV per output table, written under a
//! destination directory that is created on demand. A failed write is
//! fatal; there is no partial-write recovery.

use std::path::Path;

use serde::Serialize;

use crate::error::{MemEvalError, MemEvalResult};
use crate::record::{EpochSummary, OnsetRecord, ScoreRecord};

/// Per-epoch summary table, ascending epoch order.
pub fn write_summary(path: &Path, summaries: &[EpochSummary]) -> MemEvalResult<()> {
    write_table(path, summaries)
}

/// Full per-row detail table: every scored (epoch, canary_id) with its
/// constituent losses.
pub fn write_detail(path: &Path, records: &[ScoreRecord]) -> MemEvalResult<()> {
    write_table(path, records)
}

/// Per-canary memorization onset epochs.
pub fn write_onsets(path: &Path, onsets: &[OnsetRecord]) -> MemEvalResult<()> {
    write_table(path, onsets)
}

fn write_table<T: Serialize>(path: &Path, rows: &[T]) -> MemEvalResult<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|source| MemEvalError::OutputDir {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let write_err = |source| MemEvalError::Write {
        path: path.to_path_buf(),
        source,
    };
    let mut writer = csv::Writer::from_path(path).map_err(write_err)?;
    for row in rows {
        writer.serialize(row).map_err(write_err)?;
    }
    writer.flush().map_err(|source| MemEvalError::Write {
        path: path.to_path_buf(),
        source: source.into(),
    })?;

    tracing::debug!(path = %path.display(), rows = rows.len(), "wrote result table");
    Ok(())
}
