//! Error types for the dosing_core library.
//!
//! Only the boundaries (configuration, argument parsing, serialization) can
//! fail. Dose computation itself reports "cannot compute" as `None`.

use std::io;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for dosing_core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Rule table validation error
    #[error("Rule table validation error: {0}")]
    CatalogValidation(String),

    /// Unrecognised species, drug id or other user-supplied value
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
