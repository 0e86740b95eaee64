//! Decide subtyping, meet, and join over JSON Schema documents.
//!
//! `s1 <: s2` holds when every JSON value accepted by `s1` is also
//! accepted by `s2`. The decision procedure canonicalizes both documents
//! into a disjunction of typed atoms, then dispatches per-base-type
//! kernels — numeric interval reasoning, regular-language containment for
//! strings, tuple and property shape reasoning for arrays and objects.
//! The lattice operations [`meet`] and [`join`] return schemas for the
//! greatest lower and least upper bound; [`is_equivalent`] is mutual
//! subtyping.
//!
//! Schemas may carry one extension keyword, `stype`, naming a concept in
//! an external ontology. Subsumption between concepts is answered by an
//! injected [`SemanticResolver`]; the default [`NullResolver`] relates
//! every concept only to itself, which reduces the procedure to pure
//! structural subtyping.
//!
//! ```
//! use serde_json::json;
//!
//! let narrow = json!({ "type": "integer", "minimum": 0 });
//! let wide = json!({ "type": ["integer", "string"] });
//! assert!(json_subschema_core::is_subschema(&narrow, &wide).unwrap());
//! ```

mod cache;
mod canonical;
pub mod config;
mod decision;
pub mod error;
mod numeric;
mod pattern;
pub mod resolver;
mod subtype;

use serde_json::Value;
use tracing::debug;

use cache::{CachedAnswer, QueryCache, QueryKind};
use canonical::canonicalize::{canonicalize as canonicalize_doc, CanonicalRoot};
use canonical::meet::LatticeCtx;
use canonical::to_schema::root_to_schema;

pub use config::CompareOptions;
pub use decision::Decision;
pub use error::{ErrorCode, SubtypeError};
pub use pattern::{Pattern, PatternError};
pub use resolver::{GraphResolver, NullResolver, SemanticResolver, Subsumption};

/// Schema comparison engine: options, a semantic resolver, and a query
/// cache keyed by input hashes and the resolver's identity.
pub struct Comparator<R: SemanticResolver = NullResolver> {
    options: CompareOptions,
    resolver: R,
    cache: QueryCache,
}

impl Default for Comparator<NullResolver> {
    fn default() -> Self {
        Comparator::new()
    }
}

impl Comparator<NullResolver> {
    /// A comparator with the null resolver: pure structural subtyping.
    pub fn new() -> Self {
        Comparator::with_resolver(NullResolver)
    }
}

impl<R: SemanticResolver> Comparator<R> {
    pub fn with_resolver(resolver: R) -> Self {
        Comparator {
            options: CompareOptions::default(),
            resolver,
            cache: QueryCache::default(),
        }
    }

    pub fn with_options(mut self, options: CompareOptions) -> Self {
        self.options = options;
        self
    }

    pub fn resolver(&self) -> &R {
        &self.resolver
    }

    /// Tri-valued subtype check. [`Decision::Unknown`] means the answer
    /// depends on reasoning outside the supported dialect or on concept
    /// pairs the resolver cannot decide.
    pub fn check_subschema(&self, s1: &Value, s2: &Value) -> Result<Decision, SubtypeError> {
        let key = self.cache_key(s1, s2, QueryKind::Subtype);
        if let Some(CachedAnswer::Decision(d)) = self.lookup(&key) {
            return Ok(d);
        }
        let a = self.canonical(s1)?;
        let b = self.canonical(s2)?;
        let decision = subtype::subtype_root(&a, &b, &self.resolver);
        debug!(?decision, "subtype query decided");
        self.store(key, CachedAnswer::Decision(decision));
        Ok(decision)
    }

    /// Boolean subtype check; `Unknown` collapses to `false`.
    pub fn is_subschema(&self, s1: &Value, s2: &Value) -> Result<bool, SubtypeError> {
        Ok(self.check_subschema(s1, s2)?.holds())
    }

    /// Mutual subtyping.
    pub fn is_equivalent(&self, s1: &Value, s2: &Value) -> Result<bool, SubtypeError> {
        Ok(self.is_subschema(s1, s2)? && self.is_subschema(s2, s1)?)
    }

    /// The greatest schema accepted by both inputs.
    pub fn meet(&self, s1: &Value, s2: &Value) -> Result<Value, SubtypeError> {
        let key = self.cache_key(s1, s2, QueryKind::Meet);
        if let Some(CachedAnswer::Schema(v)) = self.lookup(&key) {
            return Ok(v);
        }
        let a = self.canonical(s1)?;
        let b = self.canonical(s2)?;
        let mut ctx = LatticeCtx::full(&a.defs, &b.defs, &self.resolver);
        let root = canonical::meet::meet(&a.root, &b.root, &mut ctx)?;
        let result = root_to_schema(&CanonicalRoot {
            root,
            defs: ctx.out,
        });
        self.store(key, CachedAnswer::Schema(result.clone()));
        Ok(result)
    }

    /// The least schema accepting either input.
    pub fn join(&self, s1: &Value, s2: &Value) -> Result<Value, SubtypeError> {
        let key = self.cache_key(s1, s2, QueryKind::Join);
        if let Some(CachedAnswer::Schema(v)) = self.lookup(&key) {
            return Ok(v);
        }
        let a = self.canonical(s1)?;
        let b = self.canonical(s2)?;
        let mut ctx = LatticeCtx::full(&a.defs, &b.defs, &self.resolver);
        let root = canonical::join::join(&a.root, &b.root, &mut ctx)?;
        let result = root_to_schema(&CanonicalRoot {
            root,
            defs: ctx.out,
        });
        self.store(key, CachedAnswer::Schema(result.clone()));
        Ok(result)
    }

    /// The canonical normal form of a schema, as schema JSON.
    pub fn canonicalize(&self, schema: &Value) -> Result<Value, SubtypeError> {
        let key = self.cache_key(schema, schema, QueryKind::Canonicalize);
        if let Some(CachedAnswer::Schema(v)) = self.lookup(&key) {
            return Ok(v);
        }
        let root = self.canonical(schema)?;
        let result = root_to_schema(&root);
        self.store(key, CachedAnswer::Schema(result.clone()));
        Ok(result)
    }

    fn canonical(&self, schema: &Value) -> Result<CanonicalRoot, SubtypeError> {
        canonicalize_doc(schema, &self.options, &self.resolver)
    }

    fn cache_key(&self, s1: &Value, s2: &Value, kind: QueryKind) -> (u64, u64, QueryKind, String) {
        (
            cache::structural_hash(s1),
            cache::structural_hash(s2),
            kind,
            self.resolver.resolver_id().to_string(),
        )
    }

    fn lookup(&self, key: &(u64, u64, QueryKind, String)) -> Option<CachedAnswer> {
        if !self.options.memoize {
            return None;
        }
        self.cache.get(key)
    }

    fn store(&self, key: (u64, u64, QueryKind, String), answer: CachedAnswer) {
        if self.options.memoize {
            self.cache.insert(key, answer);
        }
    }
}

// ---------------------------------------------------------------------------
// Free functions (null resolver)
// ---------------------------------------------------------------------------

/// `s1 <: s2` under pure structural subtyping.
pub fn is_subschema(s1: &Value, s2: &Value) -> Result<bool, SubtypeError> {
    Comparator::new().is_subschema(s1, s2)
}

/// Tri-valued `s1 <: s2` under pure structural subtyping.
pub fn check_subschema(s1: &Value, s2: &Value) -> Result<Decision, SubtypeError> {
    Comparator::new().check_subschema(s1, s2)
}

/// Mutual structural subtyping.
pub fn is_equivalent(s1: &Value, s2: &Value) -> Result<bool, SubtypeError> {
    Comparator::new().is_equivalent(s1, s2)
}

/// Greatest lower bound of two schemas.
pub fn meet(s1: &Value, s2: &Value) -> Result<Value, SubtypeError> {
    Comparator::new().meet(s1, s2)
}

/// Least upper bound of two schemas.
pub fn join(s1: &Value, s2: &Value) -> Result<Value, SubtypeError> {
    Comparator::new().join(s1, s2)
}

/// Canonical normal form of a schema.
pub fn canonicalize(schema: &Value) -> Result<Value, SubtypeError> {
    Comparator::new().canonicalize(schema)
}
