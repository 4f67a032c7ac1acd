//! Error types for the connection and configuration layers.
//!
//! Parsing and decoding problems are not errors: malformed lines are dropped
//! and logged, so nothing in the data path needs a `Result`.

use std::path::PathBuf;

use thiserror::Error;

/// Failure to open, enumerate or shut down a serial connection.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// The device could not be opened (wrong port, permission, busy).
    #[error("could not open serial port {port:?}: {source}")]
    Open {
        port: String,
        #[source]
        source: serialport::Error,
    },
    /// The requested parameters cannot be applied.
    #[error("invalid connection settings: {0}")]
    InvalidConfig(String),
    /// Listing available ports failed.
    #[error("could not enumerate serial ports: {0}")]
    Enumerate(#[source] serialport::Error),
    /// The OS refused to start the reader thread.
    #[error("could not start serial reader thread: {0}")]
    Spawn(#[source] std::io::Error),
    /// The reader thread panicked; the port was dropped during unwinding.
    #[error("serial reader thread panicked")]
    ReaderPanicked,
}

/// Failure to load a [`PlotterConfig`](crate::config::PlotterConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not parse config file {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
