//! Error types callers branch on.
//!
//! Everything else in the crate returns `anyhow::Result`.

use serde::Serialize;

/// Failures of the scene-analyzer capability.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AnalyzerError {
    /// `initialize()` has not completed (or `dispose()` was called).
    NotInitialized,
    /// A model failed to load; the analyzer stays unavailable.
    ModelLoad(String),
}

impl std::fmt::Display for AnalyzerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnalyzerError::NotInitialized => {
                write!(f, "models not loaded; call initialize() first")
            }
            AnalyzerError::ModelLoad(msg) => write!(f, "model load failed: {}", msg),
        }
    }
}

impl std::error::Error for AnalyzerError {}

/// Failures that prevent a recording session from starting.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionError {
    /// Camera/microphone denied or missing. The caller may retry acquisition.
    CaptureUnavailable(String),
    /// No supported recording format could be started.
    RecorderUnavailable(String),
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionError::CaptureUnavailable(msg) => write!(f, "capture unavailable: {}", msg),
            SessionError::RecorderUnavailable(msg) => {
                write!(f, "recorder unavailable: {}", msg)
            }
        }
    }
}

impl std::error::Error for SessionError {}

/// One invalid field in a submitted payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub path: String,
    pub message: String,
}

/// 400-equivalent body for rejected submission payloads.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ValidationErrors {
    pub message: String,
    pub errors: Vec<FieldError>,
}

impl ValidationErrors {
    pub fn new(errors: Vec<FieldError>) -> Self {
        Self {
            message: "Invalid submission data".to_string(),
            errors,
        }
    }

    pub fn single(path: &str, message: impl Into<String>) -> Self {
        Self::new(vec![FieldError {
            path: path.to_string(),
            message: message.into(),
        }])
    }
}

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({} field errors)", self.message, self.errors.len())
    }
}

impl std::error::Error for ValidationErrors {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn analyzer_error_downcasts_through_anyhow() {
        let err: anyhow::Error = AnalyzerError::NotInitialized.into();
        assert_eq!(
            err.downcast_ref::<AnalyzerError>(),
            Some(&AnalyzerError::NotInitialized)
        );
    }

    #[test]
    fn validation_errors_serialize_as_body() {
        let errs = ValidationErrors::single("challengeId", "required");
        let json = serde_json::to_value(&errs).unwrap();
        assert_eq!(json["message"], "Invalid submission data");
        assert_eq!(json["errors"][0]["path"], "challengeId");
    }
}
