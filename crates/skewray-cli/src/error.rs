use std::path::PathBuf;

use thiserror::Error;

/// Everything that can stop the `skewray` binary before or after a batch.
///
/// Per-frame geometry failures never surface here; they are recorded as
/// skips inside the report.
#[derive(Error, Debug)]
pub enum CliError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid job file {path}: {source}")]
    Job {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("invalid config file {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to serialize: {0}")]
    Serialize(String),

    #[error("failed to start async runtime: {0}")]
    Runtime(std::io::Error),
}
