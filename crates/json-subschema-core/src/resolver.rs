//! Semantic-type resolution.
//!
//! [`SemanticResolver`] is the single source of ontological truth: the core
//! asks it whether one concept IRI subsumes another and never parses
//! ontology formats itself. The resolver is an injected capability — there
//! is no process-wide singleton. [`NullResolver`] (the default) answers
//! reflexively only, which disables semantic reasoning and preserves exact
//! structural behavior on schemas without `stype`.

use std::collections::{BTreeMap, HashMap, HashSet};

use url::Url;

use crate::error::SubtypeError;

/// Answer to an ontological subsumption query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subsumption {
    /// `a` is (transitively) a subconcept of `b`.
    Yes,
    /// Both concepts are known and unrelated.
    No,
    /// At least one concept is unknown to the resolver.
    Unknown,
}

/// Oracle answering concept subsumption queries over IRIs.
///
/// Implementations must be pure: repeated calls with the same arguments
/// return the same answer, and calls are safe from concurrent readers.
pub trait SemanticResolver {
    /// Stable identity of this resolver, used to key memoization caches.
    /// Loading a different ontology must yield a different identity.
    fn resolver_id(&self) -> &str;

    /// Expand a compact prefixed name (`prefix:localName`) to a full IRI.
    /// Full IRIs pass through after validation.
    fn normalize(&self, stype: &str) -> Result<String, SubtypeError>;

    /// Is `a` a subconcept of `b`? `a == b` answers `Yes`; concepts the
    /// resolver has never seen answer `Unknown`.
    fn is_subconcept(&self, a: &str, b: &str) -> Subsumption;

    /// Mutual subsumption.
    fn equivalent(&self, a: &str, b: &str) -> bool {
        self.is_subconcept(a, b) == Subsumption::Yes
            && self.is_subconcept(b, a) == Subsumption::Yes
    }
}

/// Validate that `stype` is a full IRI or expand it through `prefixes`.
///
/// Any scheme parses as a URL (`quantitykind:Temperature` is formally a
/// URI), so the split is syntactic: authority-bearing forms (`://`) and
/// URNs pass through as IRIs; everything else with a `:` is a compact name
/// whose prefix must be bound.
fn normalize_with_prefixes(
    stype: &str,
    prefixes: &BTreeMap<String, String>,
) -> Result<String, SubtypeError> {
    let invalid = || SubtypeError::InvalidSchema {
        path: "#/stype".to_string(),
        message: format!("`{}` is neither a bound prefixed name nor a valid IRI", stype),
    };

    let Some((prefix, rest)) = stype.split_once(':') else {
        return Err(invalid());
    };
    if rest.starts_with("//") || prefix == "urn" {
        return Url::parse(stype).map(|u| u.to_string()).map_err(|_| invalid());
    }
    match prefixes.get(prefix) {
        Some(base) => Ok(format!("{}{}", base, rest)),
        None => Err(invalid()),
    }
}

// ---------------------------------------------------------------------------
// NullResolver
// ---------------------------------------------------------------------------

/// The default resolver: every concept is a subconcept only of itself.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullResolver;

impl SemanticResolver for NullResolver {
    fn resolver_id(&self) -> &str {
        "null"
    }

    fn normalize(&self, stype: &str) -> Result<String, SubtypeError> {
        normalize_with_prefixes(stype, &BTreeMap::new())
    }

    fn is_subconcept(&self, a: &str, b: &str) -> Subsumption {
        if a == b {
            Subsumption::Yes
        } else {
            Subsumption::No
        }
    }
}

// ---------------------------------------------------------------------------
// GraphResolver
// ---------------------------------------------------------------------------

/// In-memory resolver over an explicit subsumption graph.
///
/// Built from prefix bindings and directed `broader`-style edges
/// (`skos:broader`, `rdfs:subClassOf` — the edge direction is always
/// "child is subconcept of parent"). Subsumption is answered against the
/// transitive closure, computed once at build time.
pub struct GraphResolver {
    id: String,
    prefixes: BTreeMap<String, String>,
    /// concept → all (transitive) superconcepts, self excluded.
    ancestors: HashMap<String, HashSet<String>>,
}

impl GraphResolver {
    pub fn builder(id: impl Into<String>) -> GraphResolverBuilder {
        GraphResolverBuilder {
            id: id.into(),
            prefixes: BTreeMap::new(),
            edges: Vec::new(),
        }
    }

    fn known(&self, iri: &str) -> bool {
        self.ancestors.contains_key(iri)
    }
}

pub struct GraphResolverBuilder {
    id: String,
    prefixes: BTreeMap<String, String>,
    edges: Vec<(String, String)>,
}

impl GraphResolverBuilder {
    /// Bind `prefix` to an IRI base for compact-name expansion.
    pub fn prefix(mut self, prefix: impl Into<String>, base: impl Into<String>) -> Self {
        self.prefixes.insert(prefix.into(), base.into());
        self
    }

    /// Record that `child` is a direct subconcept of `parent`.
    /// Both sides accept compact names or full IRIs.
    pub fn broader(mut self, child: impl Into<String>, parent: impl Into<String>) -> Self {
        self.edges.push((child.into(), parent.into()));
        self
    }

    /// Expand names, then compute the transitive closure of the edge set.
    pub fn build(self) -> Result<GraphResolver, SubtypeError> {
        let mut direct: HashMap<String, HashSet<String>> = HashMap::new();
        for (child, parent) in &self.edges {
            let child = normalize_with_prefixes(child, &self.prefixes)?;
            let parent = normalize_with_prefixes(parent, &self.prefixes)?;
            direct.entry(parent.clone()).or_default();
            direct.entry(child).or_default().insert(parent);
        }

        // Closure by iterated expansion; edge sets are small.
        let mut ancestors = direct.clone();
        loop {
            let mut changed = false;
            for concept in direct.keys() {
                let reachable: Vec<String> = ancestors[concept]
                    .iter()
                    .flat_map(|p| ancestors.get(p).into_iter().flatten())
                    .cloned()
                    .collect();
                let set = ancestors.get_mut(concept).expect("seeded above");
                for r in reachable {
                    changed |= set.insert(r);
                }
            }
            if !changed {
                break;
            }
        }

        Ok(GraphResolver {
            id: self.id,
            prefixes: self.prefixes,
            ancestors,
        })
    }
}

impl SemanticResolver for GraphResolver {
    fn resolver_id(&self) -> &str {
        &self.id
    }

    fn normalize(&self, stype: &str) -> Result<String, SubtypeError> {
        normalize_with_prefixes(stype, &self.prefixes)
    }

    fn is_subconcept(&self, a: &str, b: &str) -> Subsumption {
        if a == b {
            return Subsumption::Yes;
        }
        if !self.known(a) || !self.known(b) {
            return Subsumption::Unknown;
        }
        if self.ancestors[a].contains(b) {
            Subsumption::Yes
        } else {
            Subsumption::No
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn qudt() -> GraphResolver {
        GraphResolver::builder("qudt-test")
            .prefix("quantitykind", "http://qudt.org/vocab/quantitykind/")
            .broader(
                "quantitykind:ThermodynamicTemperature",
                "quantitykind:Temperature",
            )
            .broader("quantitykind:Temperature", "quantitykind:Quantity")
            .build()
            .unwrap()
    }

    #[test]
    fn test_null_resolver_reflexive_only() {
        let r = NullResolver;
        assert_eq!(r.is_subconcept("a", "a"), Subsumption::Yes);
        assert_eq!(r.is_subconcept("a", "b"), Subsumption::No);
        assert!(!r.equivalent("a", "b"));
        assert!(r.equivalent("a", "a"));
    }

    #[test]
    fn test_normalize_full_iri_passthrough() {
        let r = NullResolver;
        let iri = r
            .normalize("http://qudt.org/vocab/quantitykind/Temperature")
            .unwrap();
        assert_eq!(iri, "http://qudt.org/vocab/quantitykind/Temperature");
    }

    #[test]
    fn test_normalize_unbound_prefix_is_invalid() {
        let r = NullResolver;
        let err = r.normalize("nosuch:Thing").unwrap_err();
        assert!(err.to_string().contains("nosuch:Thing"));
    }

    #[test]
    fn test_graph_resolver_direct_edge() {
        let r = qudt();
        assert_eq!(
            r.is_subconcept(
                "http://qudt.org/vocab/quantitykind/ThermodynamicTemperature",
                "http://qudt.org/vocab/quantitykind/Temperature",
            ),
            Subsumption::Yes
        );
        // Reverse direction does not hold.
        assert_eq!(
            r.is_subconcept(
                "http://qudt.org/vocab/quantitykind/Temperature",
                "http://qudt.org/vocab/quantitykind/ThermodynamicTemperature",
            ),
            Subsumption::No
        );
    }

    #[test]
    fn test_graph_resolver_transitive_closure() {
        let r = qudt();
        assert_eq!(
            r.is_subconcept(
                "http://qudt.org/vocab/quantitykind/ThermodynamicTemperature",
                "http://qudt.org/vocab/quantitykind/Quantity",
            ),
            Subsumption::Yes
        );
    }

    #[test]
    fn test_graph_resolver_unknown_concept() {
        let r = qudt();
        assert_eq!(
            r.is_subconcept("http://example.com/Nowhere", "http://example.com/Else"),
            Subsumption::Unknown
        );
        // Equal-but-unknown is still reflexively Yes.
        assert_eq!(
            r.is_subconcept("http://example.com/Nowhere", "http://example.com/Nowhere"),
            Subsumption::Yes
        );
    }

    #[test]
    fn test_graph_resolver_normalize_compact() {
        let r = qudt();
        assert_eq!(
            r.normalize("quantitykind:Temperature").unwrap(),
            "http://qudt.org/vocab/quantitykind/Temperature"
        );
    }
}
