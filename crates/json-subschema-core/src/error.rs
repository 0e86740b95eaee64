//! Error types for schema comparison.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Stable, machine-readable error codes.
///
/// Variant names and their serialized `snake_case` strings are a stable
/// contract — the CLI maps them onto process exit codes, and embedders key
/// off them when translating to their own error surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum ErrorCode {
    /// JSON (de)serialization error (malformed input document).
    JsonParseError,
    /// Structurally malformed schema (a keyword with the wrong shape).
    InvalidSchema,
    /// A `$ref` could not be resolved within the document.
    UnresolvableRef,
    /// A construct outside the supported dialect (regex features, exact
    /// complements) on which the decision depends.
    Unsupported,
    /// Maximum traversal depth exceeded during `$ref` resolution.
    RecursionDepthExceeded,
}

#[derive(Debug, Error)]
pub enum SubtypeError {
    #[error("JSON (de)serialization error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid schema at {path}: {message}")]
    InvalidSchema { path: String, message: String },

    #[error("Unresolvable $ref at {path}: {reference}")]
    UnresolvableRef { path: String, reference: String },

    #[error("Unsupported construct at {path}: {feature}")]
    Unsupported { path: String, feature: String },

    #[error("Recursion depth exceeded at {path} (max: {max_depth})")]
    RecursionDepthExceeded { path: String, max_depth: usize },
}

impl SubtypeError {
    /// Returns the stable error code for this error variant.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            SubtypeError::JsonError(_) => ErrorCode::JsonParseError,
            SubtypeError::InvalidSchema { .. } => ErrorCode::InvalidSchema,
            SubtypeError::UnresolvableRef { .. } => ErrorCode::UnresolvableRef,
            SubtypeError::Unsupported { .. } => ErrorCode::Unsupported,
            SubtypeError::RecursionDepthExceeded { .. } => ErrorCode::RecursionDepthExceeded,
        }
    }

    /// Returns the offending subschema location as a JSON Pointer, if any.
    pub fn path(&self) -> Option<&str> {
        match self {
            SubtypeError::JsonError(_) => None,
            SubtypeError::InvalidSchema { path, .. } => Some(path),
            SubtypeError::UnresolvableRef { path, .. } => Some(path),
            SubtypeError::Unsupported { path, .. } => Some(path),
            SubtypeError::RecursionDepthExceeded { path, .. } => Some(path),
        }
    }

    /// Produces a structured JSON error for machine consumers.
    ///
    /// Format: `{"code": "...", "message": "...", "path": "..." | null}`
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "code": self.error_code(),
            "message": self.to_string(),
            "path": self.path(),
        })
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_stable() {
        let err = SubtypeError::Unsupported {
            path: "#/properties/x/pattern".to_string(),
            feature: "lookahead".to_string(),
        };
        assert_eq!(err.error_code(), ErrorCode::Unsupported);
        assert_eq!(
            serde_json::to_value(err.error_code()).unwrap(),
            serde_json::json!("unsupported")
        );
    }

    #[test]
    fn test_path_accessor() {
        let err = SubtypeError::UnresolvableRef {
            path: "#/items".to_string(),
            reference: "#/$defs/Missing".to_string(),
        };
        assert_eq!(err.path(), Some("#/items"));

        let err: SubtypeError = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert_eq!(err.path(), None);
    }

    #[test]
    fn test_to_json_shape() {
        let err = SubtypeError::InvalidSchema {
            path: "#/minimum".to_string(),
            message: "expected a number".to_string(),
        };
        let json = err.to_json();
        assert_eq!(json["code"], "invalid_schema");
        assert_eq!(json["path"], "#/minimum");
        assert!(json["message"].as_str().unwrap().contains("expected"));
    }
}
