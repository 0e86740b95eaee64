//! Configuration for schema comparison.

use serde::{Deserialize, Serialize};

/// Options for schema comparison.
///
/// ## Serialization Format
///
/// Fields are serialized in `kebab-case` (e.g., `max-depth`). This naming
/// convention is part of the public API contract for config files.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct CompareOptions {
    /// Maximum traversal depth for `$ref` resolution (stack overflow guard).
    pub max_depth: usize,
    /// Memoize query results keyed by input hash and resolver identity.
    pub memoize: bool,
}

impl Default for CompareOptions {
    fn default() -> Self {
        Self {
            max_depth: 50,
            memoize: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compare_options_serde_round_trip() {
        let opts = CompareOptions {
            max_depth: 100,
            memoize: false,
        };

        let json = serde_json::to_string(&opts).unwrap();
        assert!(json.contains("\"max-depth\""));

        let deserialized: CompareOptions = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized.max_depth, 100);
        assert!(!deserialized.memoize);
    }

    #[test]
    fn test_fields_default_when_omitted() {
        let opts: CompareOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(opts.max_depth, 50);
        assert!(opts.memoize);
    }
}
