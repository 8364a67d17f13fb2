//! Error types for the persistence client library
//!
//! Provides a unified error type for all operations, plus the mapping onto
//! the small integer status codes handed to callers that speak the classic
//! status-code API.

use thiserror::Error;

/// Result type alias using PclError
pub type Result<T> = std::result::Result<T, PclError>;

/// Unified error type for PCL operations
#[derive(Debug, Error)]
pub enum PclError {
    // -------------------------------------------------------------------------
    // Lookup Errors
    // -------------------------------------------------------------------------
    #[error("Key not found")]
    NoKey,

    // -------------------------------------------------------------------------
    // Handle Errors
    // -------------------------------------------------------------------------
    #[error("Handle out of range")]
    MaxHandleExceeded,

    #[error("Handle not allocated")]
    InvalidHandle,

    // -------------------------------------------------------------------------
    // Lifecycle Errors
    // -------------------------------------------------------------------------
    #[error("Not initialized: {0}")]
    NotInitialized(String),

    // -------------------------------------------------------------------------
    // Argument Errors
    // -------------------------------------------------------------------------
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    // -------------------------------------------------------------------------
    // Integrity Errors
    // -------------------------------------------------------------------------
    #[error("Checksum mismatch: expected {expected:08x}, got {actual:08x}")]
    ChecksumMismatch { expected: u32, actual: u32 },

    #[error("Corruption detected: {0}")]
    Corruption(String),

    // -------------------------------------------------------------------------
    // I/O and Serialization Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),

    // -------------------------------------------------------------------------
    // Plugin Errors
    // -------------------------------------------------------------------------
    #[error("Plugin error: {0}")]
    Plugin(String),
}

/// Status codes returned across the classic integer API
pub mod status {
    pub const OK: i32 = 0;
    pub const COMMON: i32 = -1;
    pub const MAX_HANDLE: i32 = -2;
    pub const INVALID_HANDLE: i32 = -3;
    pub const NO_KEY: i32 = -4;
    pub const NOT_INITIALIZED: i32 = -5;
    pub const INVALID_ARGUMENT: i32 = -6;
    pub const CHECKSUM_MISMATCH: i32 = -7;
}

impl PclError {
    /// Map the error onto its status code
    pub fn status_code(&self) -> i32 {
        match self {
            PclError::NoKey => status::NO_KEY,
            PclError::MaxHandleExceeded => status::MAX_HANDLE,
            PclError::InvalidHandle => status::INVALID_HANDLE,
            PclError::NotInitialized(_) => status::NOT_INITIALIZED,
            PclError::InvalidArgument(_) => status::INVALID_ARGUMENT,
            PclError::ChecksumMismatch { .. } => status::CHECKSUM_MISMATCH,
            PclError::Corruption(_)
            | PclError::Io(_)
            | PclError::Serialization(_)
            | PclError::Config(_)
            | PclError::Plugin(_) => status::COMMON,
        }
    }

    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        PclError::InvalidArgument(msg.into())
    }
}

impl From<bincode::Error> for PclError {
    fn from(e: bincode::Error) -> Self {
        PclError::Serialization(e.to_string())
    }
}

impl From<serde_json::Error> for PclError {
    fn from(e: serde_json::Error) -> Self {
        PclError::Serialization(e.to_string())
    }
}
