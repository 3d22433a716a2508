//! Error types for the extension system.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur in the extension system.
#[derive(Debug, Error)]
pub enum ExtensionError {
    #[error("Manifest not found in extension: {0}")]
    ManifestNotFound(PathBuf),

    #[error("Invalid manifest in {path}: {reason}")]
    ManifestInvalid { path: PathBuf, reason: String },

    #[error("Entry file for extension '{extension}' not found: {path}")]
    EntryNotFound { extension: String, path: PathBuf },

    #[error("Failed to activate extension '{extension}': {reason}")]
    ActivationFailed { extension: String, reason: String },

    #[error("Command '{0}' is already registered")]
    DuplicateCommandId(String),

    #[error("Command '{0}' not found")]
    CommandNotFound(String),

    #[error("Invalid command id '{0}' (expected '<extension>#<command>')")]
    InvalidCommandId(String),

    #[error("Could not enumerate any extension root: {0}")]
    ScanFailed(String),

    #[error("Storage error for extension '{extension}': {message}")]
    Storage { extension: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Rendered Lua error. `mlua::Error` is neither `Send` nor `Sync` in a
    /// single-threaded state, so only its message is kept.
    #[error("Lua error: {0}")]
    Lua(String),
}

impl From<mlua::Error> for ExtensionError {
    fn from(error: mlua::Error) -> Self {
        ExtensionError::Lua(error.to_string())
    }
}

/// Result type for extension operations.
pub type ExtensionResult<T> = Result<T, ExtensionError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_send_sync<T: Send + Sync + 'static>() {}

    #[test]
    fn test_errors_convert_to_anyhow() {
        assert_send_sync::<ExtensionError>();
        assert_send_sync::<crate::BeaconError>();

        let lua_error = mlua::Error::RuntimeError("boom".to_string());
        let err: anyhow::Error = ExtensionError::from(lua_error).into();
        assert!(err.to_string().contains("boom"));
    }
}
