//! Error types for lacpd

use sonic_lacp::LacpError;
use thiserror::Error;

/// LACP daemon errors
#[derive(Error, Debug)]
pub enum LacpdError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Protocol engine rejected an operation
    #[error("LACP error: {0}")]
    Lacp(#[from] LacpError),

    /// State export failed to serialize
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for lacpd operations
pub type Result<T> = std::result::Result<T, LacpdError>;
