//! Error types for Beacon
//!
//! Provides standardized error handling across the application.

use thiserror::Error;

use crate::extensions::ExtensionError;
use crate::shortcuts::ShortcutError;

/// Errors that can occur in Beacon
#[derive(Debug, Error)]
pub enum BeaconError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Extension discovery, loading or execution errors
    #[error(transparent)]
    Extension(#[from] ExtensionError),

    /// Hotkey binding errors
    #[error(transparent)]
    Shortcut(#[from] ShortcutError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing errors
    #[error("Config parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// TOML serialization errors
    #[error("Config serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

/// Result type alias for Beacon operations
pub type BeaconResult<T> = Result<T, BeaconError>;
