//! Type Conversions for LlmError
//!
//! This module contains From trait implementations for converting
//! common error types into LlmError.

use super::types::LlmError;

impl From<serde_json::Error> for LlmError {
    fn from(err: serde_json::Error) -> Self {
        Self::JsonError(err.to_string())
    }
}

impl From<std::io::Error> for LlmError {
    fn from(err: std::io::Error) -> Self {
        Self::StorageError(err.to_string())
    }
}

impl From<validator::ValidationErrors> for LlmError {
    fn from(err: validator::ValidationErrors) -> Self {
        Self::InvalidParameter(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid json").unwrap_err();
        let llm_err: LlmError = json_err.into();
        assert!(matches!(llm_err, LlmError::JsonError(_)));
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only");
        let llm_err: LlmError = io_err.into();
        assert!(matches!(llm_err, LlmError::StorageError(msg) if msg.contains("read-only")));
    }
}
