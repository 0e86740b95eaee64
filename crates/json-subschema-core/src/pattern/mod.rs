//! Regular-language reasoning over the restricted pattern dialect.
//!
//! [`Pattern`] compiles a JSON Schema `pattern` keyword to a deterministic
//! automaton and answers the questions the kernels need: membership,
//! containment, intersection, union, complement, emptiness. JSON Schema
//! patterns are search-based, so an unanchored end is padded with `.*`
//! before compilation; the compiled language is always a full-match one.
//!
//! Supported dialect: concatenation, alternation, star/plus/optional,
//! bounded repetition, character classes (including negated), dot, Unicode
//! escapes, and anchors at the pattern ends. Lookaround, backreferences,
//! and interior anchors fail with [`PatternError::Unsupported`]; the engine
//! never returns a wrong answer in their presence.

mod class;
mod dfa;
mod parse;

use dfa::Dfa;
use parse::Nfa;

/// Failure to bring a pattern into the automaton dialect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatternError {
    /// The pattern uses a construct outside the supported dialect, or its
    /// automaton would exceed the engine's size bounds.
    Unsupported(String),
}

impl std::fmt::Display for PatternError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PatternError::Unsupported(msg) => write!(f, "unsupported pattern: {}", msg),
        }
    }
}

impl std::error::Error for PatternError {}

/// A compiled pattern: the source text as given (or as generated by a
/// lattice operation) plus its automaton.
///
/// Equality and hashing are by source text; use [`Pattern::is_equivalent`]
/// for language equality.
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    dfa: Dfa,
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Eq for Pattern {}

impl std::hash::Hash for Pattern {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.source.hash(state);
    }
}

impl Pattern {
    /// Compile a JSON Schema `pattern` value. The source is kept verbatim
    /// so canonicalization round trips textually.
    pub fn parse(pattern: &str) -> Result<Pattern, PatternError> {
        // `^a|b$` anchors each branch, not the whole pattern; stripping the
        // ends would change the language, so refuse instead.
        if has_top_level_alternation(pattern)
            && (pattern.starts_with('^') || ends_with_unescaped_dollar(pattern))
        {
            return Err(PatternError::Unsupported(
                "anchored top-level alternation".to_string(),
            ));
        }
        let core = full_match_core(pattern);
        let nfa = Nfa::parse(&core)?;
        let dfa = Dfa::from_nfa(&nfa)?;
        Ok(Pattern {
            source: pattern.to_string(),
            dfa,
        })
    }

    /// The pattern matching every string.
    pub fn any() -> Pattern {
        Pattern::parse("^[\\s\\S]*$").expect("the universal pattern is in dialect")
    }

    /// The pattern matching no string. No dialect regex denotes the empty
    /// language, so this only exists as a derived automaton (the fold
    /// identity for unions); it never serializes.
    pub fn never() -> Pattern {
        Pattern::any().complement()
    }

    /// A pattern matching exactly the given string.
    pub fn literal(text: &str) -> Pattern {
        let escaped: String = text.chars().map(escape_char).collect();
        Pattern::parse(&format!("^{}$", escaped)).expect("escaped literal is in dialect")
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Full-match membership.
    pub fn matches(&self, input: &str) -> bool {
        self.dfa.accepts(input)
    }

    pub fn is_empty(&self) -> bool {
        self.dfa.is_empty()
    }

    /// `L(self) ⊆ L(other)`.
    pub fn is_subset(&self, other: &Pattern) -> bool {
        self.dfa.is_subset(&other.dfa)
    }

    /// Language equality.
    pub fn is_equivalent(&self, other: &Pattern) -> bool {
        self.dfa.is_equivalent(&other.dfa)
    }

    pub fn intersect(&self, other: &Pattern) -> Pattern {
        Pattern::from_dfa(self.dfa.intersect(&other.dfa))
    }

    pub fn union(&self, other: &Pattern) -> Pattern {
        Pattern::from_dfa(self.dfa.union(&other.dfa))
    }

    pub fn complement(&self) -> Pattern {
        Pattern::from_dfa(self.dfa.complement())
    }

    /// `L(self) \ L(other)`.
    pub fn difference(&self, other: &Pattern) -> Pattern {
        Pattern::from_dfa(self.dfa.difference(&other.dfa))
    }

    /// Range of word lengths the language achieves: `None` when empty,
    /// else `(shortest, longest)` with `longest = None` for unbounded.
    pub fn length_range(&self) -> Option<(u64, Option<u64>)> {
        self.dfa.accept_len_range()
    }

    /// Wrap a derived automaton, regenerating anchored source text by state
    /// elimination so the result can serialize back to a `pattern` keyword.
    fn from_dfa(dfa: Dfa) -> Pattern {
        let source = format!("^(?:{})$", dfa.to_source());
        Pattern { source, dfa }
    }
}

/// Strip end anchors and pad unanchored ends with `.*`, turning the
/// search-based JSON Schema pattern into a full-match core.
fn full_match_core(pattern: &str) -> String {
    let (head, rest) = match pattern.strip_prefix('^') {
        Some(rest) => ("", rest),
        None => ("[\\s\\S]*", pattern),
    };
    let (core, tail) = if ends_with_unescaped_dollar(rest) {
        (&rest[..rest.len() - 1], "")
    } else {
        (rest, "[\\s\\S]*")
    };
    format!("{}(?:{}){}", head, core, tail)
}

fn has_top_level_alternation(pattern: &str) -> bool {
    let mut depth = 0usize;
    let mut in_class = false;
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                let _ = chars.next();
            }
            '[' if !in_class => in_class = true,
            ']' if in_class => in_class = false,
            '(' if !in_class => depth += 1,
            ')' if !in_class => depth = depth.saturating_sub(1),
            '|' if !in_class && depth == 0 => return true,
            _ => {}
        }
    }
    false
}

fn ends_with_unescaped_dollar(s: &str) -> bool {
    if !s.ends_with('$') {
        return false;
    }
    // A `$` preceded by an odd number of backslashes is a literal.
    let backslashes = s[..s.len() - 1]
        .chars()
        .rev()
        .take_while(|&c| c == '\\')
        .count();
    backslashes % 2 == 0
}

fn escape_char(c: char) -> String {
    if matches!(
        c,
        '\\' | '.' | '+' | '*' | '?' | '(' | ')' | '[' | ']' | '{' | '}' | '|' | '^' | '$'
    ) {
        format!("\\{}", c)
    } else {
        c.to_string()
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unanchored_is_search_semantics() {
        let p = Pattern::parse("bc").unwrap();
        assert!(p.matches("bc"));
        assert!(p.matches("abcd"));
        assert!(!p.matches("b"));
    }

    #[test]
    fn test_anchored_full_match() {
        let p = Pattern::parse("^a(b|c)$").unwrap();
        assert!(p.matches("ab"));
        assert!(p.matches("ac"));
        assert!(!p.matches("abc"));
        assert!(!p.matches("xab"));
    }

    #[test]
    fn test_half_anchored() {
        let p = Pattern::parse("^ab").unwrap();
        assert!(p.matches("ab"));
        assert!(p.matches("abxyz"));
        assert!(!p.matches("xab"));

        let q = Pattern::parse("ab$").unwrap();
        assert!(q.matches("ab"));
        assert!(q.matches("xyzab"));
        assert!(!q.matches("abx"));
    }

    #[test]
    fn test_escaped_dollar_is_literal() {
        let p = Pattern::parse(r"^price\$$").unwrap();
        assert!(p.matches("price$"));
        let q = Pattern::parse(r"^cost\\$").unwrap();
        // `\\` is a literal backslash; the `$` anchors.
        assert!(q.matches("cost\\"));
    }

    #[test]
    fn test_subset_language_equality_s3() {
        let a = Pattern::parse("^a(b|c)$").unwrap();
        let b = Pattern::parse("^a[bc]$").unwrap();
        assert!(a.is_subset(&b));
        assert!(b.is_subset(&a));
        assert!(a.is_equivalent(&b));
    }

    #[test]
    fn test_subset_strict() {
        let narrow = Pattern::parse("^[0-9]{4}$").unwrap();
        let wide = Pattern::parse("^[0-9]+$").unwrap();
        assert!(narrow.is_subset(&wide));
        assert!(!wide.is_subset(&narrow));
    }

    #[test]
    fn test_intersect_round_trips() {
        let a = Pattern::parse("^[ab]+$").unwrap();
        let b = Pattern::parse("^[bc]+$").unwrap();
        let i = a.intersect(&b);
        assert!(i.matches("bbb"));
        assert!(!i.matches("a"));

        // The generated source re-parses to the same language.
        let reparsed = Pattern::parse(i.source()).unwrap();
        assert!(reparsed.is_equivalent(&i));
    }

    #[test]
    fn test_union_and_complement() {
        let a = Pattern::parse("^a$").unwrap();
        let b = Pattern::parse("^b$").unwrap();
        let u = a.union(&b);
        assert!(u.matches("a"));
        assert!(u.matches("b"));
        assert!(!u.matches("c"));

        let c = a.complement();
        assert!(!c.matches("a"));
        assert!(c.matches("anything else"));
    }

    #[test]
    fn test_difference_subtracts_literals() {
        let ids = Pattern::parse("^x[0-9]$").unwrap();
        let taken = Pattern::literal("x0");
        let rest = ids.difference(&taken);
        assert!(!rest.matches("x0"));
        assert!(rest.matches("x1"));
    }

    #[test]
    fn test_literal_escapes_metacharacters() {
        let p = Pattern::literal("a.b*");
        assert!(p.matches("a.b*"));
        assert!(!p.matches("axbb"));
    }

    #[test]
    fn test_any_matches_everything() {
        let p = Pattern::any();
        assert!(p.matches(""));
        assert!(p.matches("no\nnewline trouble"));
        assert!(!p.is_empty());
    }

    #[test]
    fn test_unsupported_lookahead() {
        assert!(Pattern::parse("(?=a)b").is_err());
    }

    #[test]
    fn test_equality_is_textual_not_language() {
        let a = Pattern::parse("^a(b|c)$").unwrap();
        let b = Pattern::parse("^a[bc]$").unwrap();
        assert_ne!(a, b);
        assert!(a.is_equivalent(&b));
        assert_eq!(a, Pattern::parse("^a(b|c)$").unwrap());
    }

    #[test]
    fn test_empty_intersection_is_empty() {
        let a = Pattern::parse("^a+$").unwrap();
        let b = Pattern::parse("^b+$").unwrap();
        assert!(a.intersect(&b).is_empty());
    }
}
