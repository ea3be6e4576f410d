//! Error types for the network monitor.
//!
//! Only two parts of the crate can fail: loading a vendor catalog from disk or
//! JSON, and asking the OS for its connection table. Classification and the
//! request ledger are pure in-memory operations and never return errors.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Failure to build a [`Catalog`](crate::catalog::Catalog) from an external source.
#[derive(Error, Debug)]
pub enum CatalogError {
    /// Catalog file could not be read
    #[error("failed to read vendor catalog {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Catalog document is not a `{vendor: [pattern, ...]}` object
    #[error("invalid vendor catalog: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failure to enumerate the OS connection table.
///
/// Returned instead of an empty list so callers never report a false zero.
#[derive(Error, Debug)]
pub enum EnumerationError {
    /// The enumeration utility could not be started
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// A kernel connection table could not be read
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The enumeration utility exited unsuccessfully
    #[error("{program} exited with {status}: {stderr}")]
    CommandFailed {
        program: String,
        status: String,
        stderr: String,
    },

    /// Enumeration did not finish in time
    #[error("connection enumeration timed out after {0:?}")]
    Timeout(Duration),
}
