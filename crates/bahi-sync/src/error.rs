//! # Sync Error Types
//!
//! Two layers, deliberately separate:
//! - `TransportError` is what a `SyncTransport` implementation returns.
//!   The engine treats these as retryable per entity kind.
//! - `SyncError` is what the engine surfaces to callers, wrapping
//!   transport, storage and configuration failures.

use thiserror::Error;

use bahi_db::DbError;

/// Result type alias for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors a transport implementation can report.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The server could not be reached.
    #[error("Network error: {0}")]
    Network(String),

    /// The request timed out.
    #[error("Request timed out")]
    Timeout,

    /// The server rejected the request.
    #[error("Server rejected request ({code}): {message}")]
    Rejected {
        /// Status code as reported by the server.
        code: u16,
        /// Human-readable rejection reason.
        message: String,
    },

    /// The server's response could not be understood.
    #[error("Protocol error: {0}")]
    Protocol(String),
}

/// Errors from the sync engine.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The transport failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The local store failed.
    #[error(transparent)]
    Db(#[from] DbError),

    /// The configuration is invalid.
    #[error("Invalid sync configuration: {0}")]
    InvalidConfig(String),

    /// Reading or writing the configuration file failed.
    #[error("Config file I/O error: {0}")]
    ConfigIo(#[from] std::io::Error),

    /// The configuration file could not be parsed.
    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// The configuration could not be serialized.
    #[error("Config serialize error: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),
}

// =============================================================================
// Unit Tests
// =============================================================================
