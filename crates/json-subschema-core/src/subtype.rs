//! The subtype decision procedure over canonical schemas.
//!
//! Top-level rule: `AnyOf(A₁…Aₘ) <: AnyOf(B₁…Bₙ)` iff every `Aᵢ` finds a
//! compatible-base `Bⱼ` (Integer <: Number honored) with `Aᵢ <: Bⱼ` under
//! that base type's kernel and semantic subsumption under the resolver.
//! Enum atoms instead check pointwise against the whole right-hand
//! disjunction. Results are three-valued and combine under Kleene logic;
//! reference pairs are proved coinductively — a pair revisited while in
//! progress counts as established (greatest fixed point).

use std::collections::{HashMap, HashSet};

use tracing::warn;

use crate::canonical::canonicalize::CanonicalRoot;
use crate::canonical::{Atom, BaseType, Canonical, Constraint, DefsEnv, ObjectShape};
use crate::decision::Decision;
use crate::pattern::Pattern;
use crate::resolver::{SemanticResolver, Subsumption};

pub(crate) struct SubtypeCtx<'a> {
    env_a: &'a DefsEnv,
    env_b: &'a DefsEnv,
    resolver: &'a dyn SemanticResolver,
    in_progress: HashSet<(u64, u64)>,
    memo: HashMap<(u64, u64), Decision>,
}

/// Decide `a <: b` for two canonicalized documents.
pub(crate) fn subtype_root(
    a: &CanonicalRoot,
    b: &CanonicalRoot,
    resolver: &dyn SemanticResolver,
) -> Decision {
    let mut ctx = SubtypeCtx {
        env_a: &a.defs,
        env_b: &b.defs,
        resolver,
        in_progress: HashSet::new(),
        memo: HashMap::new(),
    };
    subtype(&a.root, &b.root, &mut ctx)
}

pub(crate) fn subtype(a: &Canonical, b: &Canonical, ctx: &mut SubtypeCtx<'_>) -> Decision {
    let key = if matches!(a, Canonical::Ref(_)) || matches!(b, Canonical::Ref(_)) {
        let key = (a.fingerprint(), b.fingerprint());
        if let Some(&cached) = ctx.memo.get(&key) {
            return cached;
        }
        // A revisit while this very pair is being proved closes the
        // coinductive loop.
        if !ctx.in_progress.insert(key) {
            return Decision::Yes;
        }
        Some(key)
    } else {
        None
    };

    let atoms_a = a.deref(ctx.env_a);
    let atoms_b = b.deref(ctx.env_b);
    let mut result = Decision::Yes;
    for atom in atoms_a {
        result = result.and(atom_in_union(atom, atoms_b, ctx));
        if result == Decision::No {
            break;
        }
    }

    if let Some(key) = key {
        ctx.in_progress.remove(&key);
        ctx.memo.insert(key, result);
    }
    result
}

/// One left atom against the whole right disjunction.
fn atom_in_union(a: &Atom, atoms_b: &[Atom], ctx: &mut SubtypeCtx<'_>) -> Decision {
    // Enum atoms check pointwise: each value must land in some right atom
    // that also subsumes the annotation.
    if let (Some(values), false) = (&a.cases, a.negated) {
        let env_b = ctx.env_b;
        let resolver = ctx.resolver;
        return Decision::all(values.iter().map(|v| {
            Decision::any(atoms_b.iter().map(|b| {
                Decision::from_bool(b.accepts(v, env_b)).and(semantic_subsumed(
                    &a.semantic_type,
                    &b.semantic_type,
                    resolver,
                ))
            }))
        }));
    }

    let mut result = Decision::No;
    for b in atoms_b {
        result = result.or(atom_subtype(a, b, ctx));
        if result == Decision::Yes {
            break;
        }
    }
    result
}

fn numeric_family(base: BaseType) -> bool {
    matches!(base, BaseType::Integer | BaseType::Number)
}

fn semantic_subsumed(
    a: &Option<String>,
    b: &Option<String>,
    resolver: &dyn SemanticResolver,
) -> Decision {
    match (a, b) {
        // Absence on the right is the top concept.
        (_, None) => Decision::Yes,
        // An unannotated left side proves nothing against a required concept.
        (None, Some(_)) => Decision::No,
        (Some(x), Some(y)) => match resolver.is_subconcept(x, y) {
            Subsumption::Yes => Decision::Yes,
            Subsumption::No => Decision::No,
            Subsumption::Unknown => {
                warn!(sub = %x, sup = %y, "resolver cannot decide subsumption");
                Decision::Unknown
            }
        },
    }
}

fn atom_subtype(a: &Atom, b: &Atom, ctx: &mut SubtypeCtx<'_>) -> Decision {
    // Base dispatch: equal bases, or anything within the numeric family
    // (the kernel settles integrality either way).
    if !(a.base == b.base || (numeric_family(a.base) && numeric_family(b.base))) {
        return Decision::No;
    }

    if a == b {
        return Decision::Yes;
    }

    // Negated atoms are opaque beyond the structural cases:
    // `¬X <: ¬Y` flips to `Y <: X`; mixed pairs are undecidable here.
    if a.negated || b.negated {
        if a.negated && b.negated {
            let mut inner_a = a.clone();
            inner_a.negated = false;
            let mut inner_b = b.clone();
            inner_b.negated = false;
            return atom_subtype(&inner_b, &inner_a, ctx);
        }
        return Decision::Unknown;
    }

    // A finite right side against a non-enum left side: only decidable
    // when the left admissible set can be enumerated.
    if let Some(values) = &b.cases {
        return finite_left_within(a, values, b, ctx);
    }

    semantic_subsumed(&a.semantic_type, &b.semantic_type, ctx.resolver)
        .and(constraint_subtype(a, b, ctx))
}

fn constraint_subtype(a: &Atom, b: &Atom, ctx: &mut SubtypeCtx<'_>) -> Decision {
    match (&a.constraint, &b.constraint) {
        (Constraint::None, Constraint::None) => Decision::Yes,
        (Constraint::Numeric(x), Constraint::Numeric(y)) => Decision::from_bool(x.is_subset(y)),
        (Constraint::String(x), Constraint::String(y)) => {
            let lengths = x.min_length >= y.min_length
                && match y.max_length {
                    None => true,
                    Some(ymax) => x.max_length.map_or(false, |xmax| xmax <= ymax),
                };
            if !lengths {
                return Decision::No;
            }
            match (&x.pattern, &y.pattern) {
                (_, None) => Decision::Yes,
                (Some(p), Some(q)) => Decision::from_bool(p.is_subset(q)),
                (None, Some(q)) => unpatterned_within(x.min_length, x.max_length, q),
            }
        }
        (Constraint::Array(x), Constraint::Array(y)) => {
            let sizes = x.min_items >= y.min_items
                && match y.max_items {
                    None => true,
                    Some(ymax) => x.max_items.map_or(false, |xmax| xmax <= ymax),
                };
            if !sizes {
                return Decision::No;
            }
            if y.unique_items && !x.unique_items {
                return Decision::No;
            }

            let top = Canonical::top();
            let mut result = Decision::Yes;
            let limit = x.tuple.len().max(y.tuple.len());
            for i in 0..limit {
                // Positions the left side can never reach don't bind.
                if x.max_items.is_some_and(|max| i as u64 >= max) {
                    break;
                }
                if let Some(sy) = y.schema_at(i) {
                    let sx = x.schema_at(i).unwrap_or(&top);
                    result = result.and(subtype(sx, sy, ctx));
                }
            }
            // The shared tail past both prefixes.
            let tail_reachable = x.max_items.map_or(true, |max| max > limit as u64);
            if tail_reachable {
                if let Some(sy) = y.additional.as_deref() {
                    let sx = x.additional.as_deref().unwrap_or(&top);
                    result = result.and(subtype(sx, sy, ctx));
                }
            }
            result
        }
        (Constraint::Object(x), Constraint::Object(y)) => object_subtype(x, y, ctx),
        _ => Decision::No,
    }
}

/// Is "any string within these length bounds" a subset of `L(q)`?
fn unpatterned_within(min_length: u64, max_length: Option<u64>, q: &Pattern) -> Decision {
    if min_length == 0 && max_length.is_none() {
        return Decision::from_bool(Pattern::any().is_subset(q));
    }
    // Bounded repetitions express the length window exactly when small.
    const MAX_EXPANSION: u64 = 256;
    let in_range = match max_length {
        Some(max) if max <= MAX_EXPANSION => Some(format!("^[\\s\\S]{{{},{}}}$", min_length, max)),
        None if min_length <= MAX_EXPANSION => Some(format!("^[\\s\\S]{{{},}}$", min_length)),
        _ => None,
    };
    if let Some(source) = in_range {
        if let Ok(p) = Pattern::parse(&source) {
            return Decision::from_bool(p.is_subset(q));
        }
    }
    if Pattern::any().is_subset(q) {
        return Decision::Yes;
    }
    Decision::Unknown
}

// ---------------------------------------------------------------------------
// Object kernel
// ---------------------------------------------------------------------------

fn object_subtype(x: &ObjectShape, y: &ObjectShape, ctx: &mut SubtypeCtx<'_>) -> Decision {
    // The left side must require at least what the right side requires.
    if !y.required.is_subset(&x.required) {
        return Decision::No;
    }
    let sizes = x.min_properties >= y.min_properties
        && match y.max_properties {
            None => true,
            Some(ymax) => x.max_properties.map_or(false, |xmax| xmax <= ymax),
        };
    if !sizes {
        return Decision::No;
    }

    let mut result = Decision::Yes;

    // Declared names on either side: the left effective constraint must be
    // below the right effective constraint.
    let mut names: Vec<&String> = x.properties.keys().chain(y.properties.keys()).collect();
    names.sort();
    names.dedup();
    for name in &names {
        let conj_a = effective_parts(x, name);
        let conj_b = effective_parts(y, name);
        result = result.and(name_within(&conj_a, &conj_b, ctx));
        if result == Decision::No {
            return Decision::No;
        }
    }

    let declared_literals = literal_union(&names);
    let top = Canonical::top();

    // Names reachable through left patternProperties beyond the declared
    // set: each pattern's schema must fit wherever those names land on the
    // right.
    for pa in &x.patterns {
        let remainder = pa.pattern.difference(&declared_literals);
        if remainder.is_empty() {
            continue;
        }
        let mut covered = Pattern::never();
        for qb in &y.patterns {
            if !remainder.intersect(&qb.pattern).is_empty() {
                result = result.and(subtype(&pa.schema, &qb.schema, ctx));
                covered = covered.union(&qb.pattern);
            }
        }
        if !remainder.difference(&covered).is_empty() {
            if let Some(add_b) = &y.additional {
                result = result.and(subtype(&pa.schema, add_b, ctx));
            }
        }
        if result == Decision::No {
            return Decision::No;
        }
    }

    // Names reachable only through the left additional schema.
    let left_add = x.additional.as_deref().unwrap_or(&top);
    if !left_add.is_bottom() {
        let mut left_declared_or_matched = declared_literals.clone();
        for pa in &x.patterns {
            left_declared_or_matched = left_declared_or_matched.union(&pa.pattern);
        }
        let domain = Pattern::any().difference(&left_declared_or_matched);
        if !domain.is_empty() {
            let mut covered = Pattern::never();
            for qb in &y.patterns {
                if !domain.intersect(&qb.pattern).is_empty() {
                    result = result.and(subtype(left_add, &qb.schema, ctx));
                    covered = covered.union(&qb.pattern);
                }
            }
            if !domain.difference(&covered).is_empty() {
                if let Some(add_b) = &y.additional {
                    result = result.and(subtype(left_add, add_b, ctx));
                }
            }
        }
    }

    result
}

/// The conjunction of schemas one side applies to a concrete name.
/// Empty means the name is unconstrained (no additional bound either).
fn effective_parts<'s>(shape: &'s ObjectShape, name: &str) -> Vec<&'s Canonical> {
    let mut parts: Vec<&Canonical> = Vec::new();
    if let Some(s) = shape.properties.get(name) {
        parts.push(s);
    }
    for p in &shape.patterns {
        if p.pattern.matches(name) {
            parts.push(&p.schema);
        }
    }
    if parts.is_empty() {
        if let Some(add) = &shape.additional {
            parts.push(add);
        }
    }
    parts
}

/// `⋀ conj_a <: ⋀ conj_b`, approximated soundly: every right part must be
/// implied by some single left part.
fn name_within(conj_a: &[&Canonical], conj_b: &[&Canonical], ctx: &mut SubtypeCtx<'_>) -> Decision {
    if conj_b.is_empty() {
        return Decision::Yes;
    }
    // The left value can't exist at all: nothing to prove.
    if conj_a.iter().any(|s| s.is_bottom()) {
        return Decision::Yes;
    }
    let top = Canonical::top();
    let left: Vec<&Canonical> = if conj_a.is_empty() {
        vec![&top]
    } else {
        conj_a.to_vec()
    };
    let mut result = Decision::Yes;
    for sb in conj_b {
        let mut this = Decision::No;
        for sa in &left {
            this = this.or(subtype(sa, sb, ctx));
            if this == Decision::Yes {
                break;
            }
        }
        result = result.and(this);
        if result == Decision::No {
            break;
        }
    }
    result
}

fn literal_union(names: &[&String]) -> Pattern {
    let mut acc = Pattern::never();
    for name in names {
        acc = acc.union(&Pattern::literal(name));
    }
    acc
}

// ---------------------------------------------------------------------------
// Finite right-hand sides
// ---------------------------------------------------------------------------

/// `a <: enum(values)`: decidable when `a`'s admissible set enumerates.
fn finite_left_within(
    a: &Atom,
    values: &[serde_json::Value],
    b: &Atom,
    ctx: &mut SubtypeCtx<'_>,
) -> Decision {
    let env_b = ctx.env_b;
    let resolver = ctx.resolver;
    let accepted_by_b = |v: &serde_json::Value| -> Decision {
        Decision::from_bool(b.accepts(v, env_b)).and(semantic_subsumed(
            &a.semantic_type,
            &b.semantic_type,
            resolver,
        ))
    };

    match (&a.constraint, a.base) {
        (Constraint::None, BaseType::Null) => accepted_by_b(&serde_json::Value::Null),
        (Constraint::None, BaseType::Boolean) => Decision::all([
            accepted_by_b(&serde_json::Value::Bool(true)),
            accepted_by_b(&serde_json::Value::Bool(false)),
        ]),
        (Constraint::Numeric(shape), _) => match shape.enumerate(values.len()) {
            Some(admissible) => {
                if admissible.len() > values.len() {
                    return Decision::No;
                }
                Decision::all(
                    admissible
                        .iter()
                        .map(|r| accepted_by_b(&rational_value(r))),
                )
            }
            // An infinite admissible set can never fit a finite enum.
            None => Decision::No,
        },
        _ => Decision::Unknown,
    }
}

fn rational_value(r: &num_rational::BigRational) -> serde_json::Value {
    serde_json::Value::Number(crate::numeric::number_from_rational(r))
}
