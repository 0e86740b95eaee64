//! Three-valued decisions and their Kleene combinators.
//!
//! Kernels never error on canonical input: where a question cannot be
//! decided (opaque negations, resolver gaps) they answer [`Decision::Unknown`]
//! and the driver combines results under strong Kleene logic. The boolean
//! façade collapses `Unknown` to `false`; callers that need to distinguish
//! "no" from "don't know" use the tri-valued API.

use serde::{Deserialize, Serialize};

/// Outcome of a subtype question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    /// The relation provably holds.
    Yes,
    /// The relation provably does not hold.
    No,
    /// Undecidable within the supported dialect or resolver knowledge.
    Unknown,
}

impl Decision {
    pub fn from_bool(b: bool) -> Self {
        if b {
            Decision::Yes
        } else {
            Decision::No
        }
    }

    /// `true` only for a definite [`Decision::Yes`].
    pub fn is_yes(self) -> bool {
        self == Decision::Yes
    }

    /// Collapse to a boolean: `Unknown` is conservatively `false`.
    pub fn holds(self) -> bool {
        self == Decision::Yes
    }

    /// Kleene conjunction: `No` dominates, then `Unknown`.
    pub fn and(self, other: Decision) -> Decision {
        match (self, other) {
            (Decision::No, _) | (_, Decision::No) => Decision::No,
            (Decision::Unknown, _) | (_, Decision::Unknown) => Decision::Unknown,
            _ => Decision::Yes,
        }
    }

    /// Kleene disjunction: `Yes` dominates, then `Unknown`.
    pub fn or(self, other: Decision) -> Decision {
        match (self, other) {
            (Decision::Yes, _) | (_, Decision::Yes) => Decision::Yes,
            (Decision::Unknown, _) | (_, Decision::Unknown) => Decision::Unknown,
            _ => Decision::No,
        }
    }

    /// Kleene negation: `Unknown` stays `Unknown`.
    pub fn not(self) -> Decision {
        match self {
            Decision::Yes => Decision::No,
            Decision::No => Decision::Yes,
            Decision::Unknown => Decision::Unknown,
        }
    }

    /// Conjunction over an iterator, short-circuiting on `No`.
    pub fn all<I: IntoIterator<Item = Decision>>(iter: I) -> Decision {
        let mut acc = Decision::Yes;
        for d in iter {
            acc = acc.and(d);
            if acc == Decision::No {
                return Decision::No;
            }
        }
        acc
    }

    /// Disjunction over an iterator, short-circuiting on `Yes`.
    pub fn any<I: IntoIterator<Item = Decision>>(iter: I) -> Decision {
        let mut acc = Decision::No;
        for d in iter {
            acc = acc.or(d);
            if acc == Decision::Yes {
                return Decision::Yes;
            }
        }
        acc
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_and_truth_table() {
        use Decision::*;
        assert_eq!(Yes.and(Yes), Yes);
        assert_eq!(Yes.and(No), No);
        assert_eq!(Yes.and(Unknown), Unknown);
        assert_eq!(No.and(Unknown), No);
        assert_eq!(Unknown.and(Unknown), Unknown);
    }

    #[test]
    fn test_or_truth_table() {
        use Decision::*;
        assert_eq!(No.or(No), No);
        assert_eq!(No.or(Yes), Yes);
        assert_eq!(No.or(Unknown), Unknown);
        assert_eq!(Yes.or(Unknown), Yes);
        assert_eq!(Unknown.or(Unknown), Unknown);
    }

    #[test]
    fn test_not_involution_on_definite() {
        use Decision::*;
        assert_eq!(Yes.not(), No);
        assert_eq!(No.not(), Yes);
        assert_eq!(Unknown.not(), Unknown);
    }

    #[test]
    fn test_all_short_circuits_on_no() {
        use Decision::*;
        assert_eq!(Decision::all([Yes, No, Unknown]), No);
        assert_eq!(Decision::all([Yes, Unknown, Yes]), Unknown);
        assert_eq!(Decision::all(std::iter::empty()), Yes);
    }

    #[test]
    fn test_any_short_circuits_on_yes() {
        use Decision::*;
        assert_eq!(Decision::any([No, Yes, Unknown]), Yes);
        assert_eq!(Decision::any([No, Unknown, No]), Unknown);
        assert_eq!(Decision::any(std::iter::empty()), No);
    }

    #[test]
    fn test_holds_is_conservative() {
        assert!(Decision::Yes.holds());
        assert!(!Decision::No.holds());
        assert!(!Decision::Unknown.holds());
    }

    #[test]
    fn test_serde_snake_case() {
        assert_eq!(
            serde_json::to_value(Decision::Unknown).unwrap(),
            serde_json::json!("unknown")
        );
    }
}
