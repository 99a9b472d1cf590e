//! Typed errors at the CLI/config boundary.
//!
//! Internal algorithm code treats misuse (missing thread id, EBR invariant
//! violations) as programmer error and panics; these enums are for the
//! outer surface, where a malformed command or a missing graph file is a
//! user mistake the driver should report and recover from.

use std::path::PathBuf;

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("unknown subject {0:?}")]
    UnknownSubject(String),

    #[error("parameter {name} out of range: {value} (expected {expected})")]
    ParameterOutOfRange {
        name: &'static str,
        value: i64,
        expected: &'static str,
    },

    #[error("no graph installed; run `generate` or `load` first")]
    MissingGraph,

    #[error("required parameter not set before sweep: {0}")]
    MissingParameter(&'static str),
}

#[derive(thiserror::Error, Debug)]
pub enum GraphIoError {
    #[error("graph file not found: {0}")]
    NotFound(PathBuf),

    #[error("short read: expected {expected} bytes, got {got}")]
    ShortRead { expected: usize, got: usize },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
