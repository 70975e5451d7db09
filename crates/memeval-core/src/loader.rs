//! Loss log loading and validation.
//!
//! A loss log is a CSV with one row per (epoch, canary_id) for a
//! single model. Required columns: `epoch`, `canary_id`,
//! `suffix_loss`, `split`. Optional columns: `global_loss`,
//! `exact_match` (accepted as 0/1 or true/false). Any failure to read
//! or parse the file is fatal to the run.

use std::fs::File;
use std::path::Path;

use crate::error::{MemEvalError, MemEvalResult};
use crate::record::{LossRecord, Split};

const REQUIRED_COLUMNS: [&str; 4] = ["epoch", "canary_id", "suffix_loss", "split"];

/// A validated loss log for one model.
#[derive(Debug, Clone)]
pub struct LossTable {
    pub records: Vec<LossRecord>,
    /// Whether the log carried an `exact_match` column at all. When
    /// false, exact-match statistics downstream are reported as 0.
    pub has_exact_match: bool,
}

/// Load and validate one model's loss log.
pub fn load_loss_log(path: &Path) -> MemEvalResult<LossTable> {
    let file = File::open(path).map_err(|source| MemEvalError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut reader = csv::ReaderBuilder::new().from_reader(file);

    let headers = reader
        .headers()
        .map_err(|source| MemEvalError::Parse {
            path: path.to_path_buf(),
            source,
        })?
        .clone();

    let column = |name: &str| headers.iter().position(|h| h == name);

    let missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|name| column(name).is_none())
        .map(|name| name.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(MemEvalError::MissingColumns {
            path: path.to_path_buf(),
            columns: missing,
        });
    }

    let idx_epoch = column("epoch").unwrap_or_default();
    let idx_canary = column("canary_id").unwrap_or_default();
    let idx_suffix = column("suffix_loss").unwrap_or_default();
    let idx_split = column("split").unwrap_or_default();
    let idx_global = column("global_loss");
    let idx_exact = column("exact_match");

    let mut records = Vec::new();
    for (i, row) in reader.records().enumerate() {
        let record_no = i as u64 + 1;
        let row = row.map_err(|source| MemEvalError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        let field = |idx: usize| row.get(idx).unwrap_or("").trim();

        let bad = |message: String| MemEvalError::BadRecord {
            path: path.to_path_buf(),
            record: record_no,
            message,
        };

        let epoch: u32 = field(idx_epoch)
            .parse()
            .map_err(|_| bad(format!("invalid epoch: {:?}", field(idx_epoch))))?;
        let canary_id = field(idx_canary).to_string();
        if canary_id.is_empty() {
            return Err(bad("empty canary_id".into()));
        }
        let suffix_loss: f64 = field(idx_suffix)
            .parse()
            .map_err(|_| bad(format!("invalid suffix_loss: {:?}", field(idx_suffix))))?;
        if suffix_loss < 0.0 {
            return Err(bad(format!("negative suffix_loss: {suffix_loss}")));
        }
        let split: Split = field(idx_split).parse().map_err(|e: String| bad(e))?;

        let global_loss = match idx_global.map(field) {
            None | Some("") => None,
            Some(raw) => Some(
                raw.parse::<f64>()
                    .map_err(|_| bad(format!("invalid global_loss: {raw:?}")))?,
            ),
        };
        let exact_match = match idx_exact.map(field) {
            None | Some("") => None,
            Some(raw) => Some(parse_flag(raw).ok_or_else(|| {
                bad(format!("invalid exact_match: {raw:?}"))
            })?),
        };

        records.push(LossRecord {
            epoch,
            canary_id,
            suffix_loss,
            global_loss,
            split,
            exact_match,
        });
    }

    tracing::debug!(path = %path.display(), rows = records.len(), "loaded loss log");

    Ok(LossTable {
        records,
        has_exact_match: idx_exact.is_some(),
    })
}

/// Parse a boolean cell. Loss loggers write either 0/1 or true/false.
fn parse_flag(raw: &str) -> Option<bool> {
    match raw.to_lowercase().as_str() {
        "1" | "true" => Some(true),
        "0" | "false" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_log(contents: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        f
    }

    #[test]
    fn test_load_minimal_log() {
        let f = write_log(
            "epoch,canary_id,suffix_loss,split\n\
             0,C0,4.0,train\n\
             0,C1,4.2,validation\n",
        );
        let table = load_loss_log(f.path()).unwrap();
        assert_eq!(table.records.len(), 2);
        assert!(!table.has_exact_match);
        assert_eq!(table.records[0].canary_id, "C0");
        assert_eq!(table.records[0].split, Split::Train);
        assert_eq!(table.records[0].global_loss, None);
        assert_eq!(table.records[1].split, Split::Validation);
    }

    #[test]
    fn test_load_optional_columns() {
        let f = write_log(
            "epoch,canary_id,suffix_loss,global_loss,split,exact_match\n\
             0,C0,4.0,3.1,train,1\n\
             1,C0,3.5,,train,false\n",
        );
        let table = load_loss_log(f.path()).unwrap();
        assert!(table.has_exact_match);
        assert_eq!(table.records[0].global_loss, Some(3.1));
        assert_eq!(table.records[0].exact_match, Some(true));
        assert_eq!(table.records[1].global_loss, None);
        assert_eq!(table.records[1].exact_match, Some(false));
    }

    #[test]
    fn test_missing_file_is_fatal() {
        let result = load_loss_log(Path::new("/nonexistent/losses.csv"));
        assert!(matches!(result, Err(MemEvalError::Io { .. })));
    }

    #[test]
    fn test_missing_columns_all_reported() {
        let f = write_log("epoch,loss\n0,4.0\n");
        match load_loss_log(f.path()) {
            Err(MemEvalError::MissingColumns { columns, .. }) => {
                assert_eq!(columns, vec!["canary_id", "suffix_loss", "split"]);
            }
            other => panic!("expected MissingColumns, got {other:?}"),
        }
    }

    #[test]
    fn test_bad_epoch_is_fatal() {
        let f = write_log("epoch,canary_id,suffix_loss,split\nx,C0,4.0,train\n");
        assert!(matches!(
            load_loss_log(f.path()),
            Err(MemEvalError::BadRecord { record: 1, .. })
        ));
    }

    #[test]
    fn test_negative_suffix_loss_is_fatal() {
        let f = write_log("epoch,canary_id,suffix_loss,split\n0,C0,-0.5,train\n");
        assert!(matches!(
            load_loss_log(f.path()),
            Err(MemEvalError::BadRecord { .. })
        ));
    }

    #[test]
    fn test_bad_split_is_fatal() {
        let f = write_log("epoch,canary_id,suffix_loss,split\n0,C0,4.0,test\n");
        assert!(matches!(
            load_loss_log(f.path()),
            Err(MemEvalError::BadRecord { .. })
        ));
    }
}
