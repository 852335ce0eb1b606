use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum StoreError {
    #[error("no stored object for: {0}")]
    NotFound(String),

    #[error("stored content could not be parsed: {0}")]
    Deserialization(String),

    #[error("could not serialise record: {0}")]
    Serialization(String),

    #[error("access denied: {0}")]
    AccessDenied(String),

    #[error("object store request failed: {0}")]
    Transport(String),

    #[error("invalid dataset id: {0}")]
    InvalidDatasetId(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),
}
