use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MemEvalError {
    #[error("cannot read loss log {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse loss log {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("loss log {path} is missing required columns: {}", columns.join(", "))]
    MissingColumns { path: PathBuf, columns: Vec<String> },

    #[error("loss log {path}, record {record}: {message}")]
    BadRecord {
        path: PathBuf,
        record: u64,
        message: String,
    },

    #[error("cannot create output directory {path}: {source}")]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot write results to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

pub type MemEvalResult<T> = Result<T, MemEvalError>;
