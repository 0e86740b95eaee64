//! Lattice join: the least schema accepting either operand.
//!
//! Join concatenates the two disjunctions and then coalesces atoms, but
//! only where the merge is exact — numeric contiguity, enum unions, equal
//! or subsuming constraints. Anything else stays a disjunction; the driver
//! preserves those rather than over-approximate. Like meet, joins over
//! recursive references mint fresh definitions on revisit.

use serde_json::Value;

use crate::canonical::meet::{import, LatticeCtx, RefMode, Side};
use crate::canonical::{Atom, Canonical, Constraint, DefsEnv, StringShape};
use crate::error::SubtypeError;
use crate::pattern::Pattern;
use crate::resolver::{SemanticResolver, Subsumption};

/// Join of the left-operand schema against the right-operand schema.
pub(crate) fn join(
    a: &Canonical,
    b: &Canonical,
    ctx: &mut LatticeCtx<'_>,
) -> Result<Canonical, SubtypeError> {
    join_sided(a, Side::A, b, Side::B, ctx)
}

pub(crate) fn join_sided(
    a: &Canonical,
    sa: Side,
    b: &Canonical,
    sb: Side,
    ctx: &mut LatticeCtx<'_>,
) -> Result<Canonical, SubtypeError> {
    if a.is_top() || b.is_top() {
        return Ok(Canonical::top());
    }
    if a.is_bottom() {
        return Ok(import(b, sb, ctx));
    }
    if b.is_bottom() {
        return Ok(import(a, sa, ctx));
    }
    if sa == sb && a == b {
        return Ok(import(a, sa, ctx));
    }

    if ctx.mode == RefMode::Strict
        && (matches!(a, Canonical::Ref(_)) || matches!(b, Canonical::Ref(_)))
    {
        if let (Canonical::Ref(x), Canonical::Ref(y)) = (a, b) {
            if x == y {
                return Ok(a.clone());
            }
        }
        return Err(SubtypeError::Unsupported {
            path: "#".to_string(),
            feature: "combinator over a recursive reference".to_string(),
        });
    }

    // A union only concatenates top-level atoms — children are compared,
    // never recursed into — so dereferencing once terminates even on
    // cyclic schemas.
    let mut atoms: Vec<Atom> = a
        .deref(ctx.env(sa))
        .iter()
        .map(|at| crate::canonical::meet::import_atom(at, sa, ctx))
        .collect();
    let atoms_b: Vec<Atom> = b
        .deref(ctx.env(sb))
        .iter()
        .map(|at| crate::canonical::meet::import_atom(at, sb, ctx))
        .collect();
    atoms.extend(atoms_b);
    let env = match ctx.mode {
        RefMode::Strict => ctx.env(Side::A),
        RefMode::Full => &ctx.out,
    };
    let coalesced = coalesce(atoms, env, ctx.resolver);
    Ok(Canonical::AnyOf(coalesced))
}

/// Fold atoms into a disjunction, merging exact joins as they appear.
pub(crate) fn coalesce(
    atoms: Vec<Atom>,
    env: &DefsEnv,
    resolver: &dyn SemanticResolver,
) -> Vec<Atom> {
    let mut acc: Vec<Atom> = Vec::new();
    for atom in atoms {
        push_coalesced(&mut acc, atom, env, resolver);
    }
    acc
}

fn push_coalesced(acc: &mut Vec<Atom>, atom: Atom, env: &DefsEnv, resolver: &dyn SemanticResolver) {
    for i in 0..acc.len() {
        if let Some(merged) = atom_join(&acc[i], &atom, env, resolver) {
            acc.remove(i);
            // The merged atom may now absorb further neighbours.
            push_coalesced(acc, merged, env, resolver);
            return;
        }
    }
    acc.push(atom);
}

/// Exact join of two atoms, or `None` when the disjunction must be kept.
fn atom_join(
    a: &Atom,
    b: &Atom,
    env: &DefsEnv,
    resolver: &dyn SemanticResolver,
) -> Option<Atom> {
    if a == b {
        return Some(a.clone());
    }
    if a.base != b.base {
        return None;
    }
    if a.negated || b.negated {
        return None; // equal negated atoms were handled above
    }

    // Identical constraints, one semantic annotation subsuming the other:
    // keep the broader concept.
    if a.constraint == b.constraint && a.cases == b.cases {
        match (&a.semantic_type, &b.semantic_type) {
            (Some(x), Some(y)) => {
                if resolver.is_subconcept(x, y) == Subsumption::Yes {
                    return Some(b.clone());
                }
                if resolver.is_subconcept(y, x) == Subsumption::Yes {
                    return Some(a.clone());
                }
                return None;
            }
            // An un-annotated atom is the broader one.
            (Some(_), None) => return Some(b.clone()),
            (None, Some(_)) => return Some(a.clone()),
            (None, None) => {}
        }
    }
    if a.semantic_type != b.semantic_type {
        return None;
    }

    // Enum absorption: a finite atom folds into anything accepting all of
    // its values.
    if let (Some(values), None) = (&a.cases, &b.cases) {
        if values.iter().all(|v| b.accepts(v, env)) {
            return Some(b.clone());
        }
        return None;
    }
    if let (None, Some(values)) = (&a.cases, &b.cases) {
        if values.iter().all(|v| a.accepts(v, env)) {
            return Some(a.clone());
        }
        return None;
    }
    if let (Some(va), Some(vb)) = (&a.cases, &b.cases) {
        if a.constraint == b.constraint {
            let mut union = va.clone();
            for v in vb {
                if !union.contains(v) {
                    union.push(v.clone());
                }
            }
            let mut merged = a.clone();
            merged.cases = normalize_cases(a, union);
            return Some(merged);
        }
        return None;
    }

    // No enums from here on.
    match (&a.constraint, &b.constraint) {
        (Constraint::None, Constraint::None) => Some(a.clone()),
        (Constraint::Numeric(x), Constraint::Numeric(y)) => {
            let joined = x.try_join(y)?;
            let mut merged = a.clone();
            merged.constraint = Constraint::Numeric(joined);
            Some(merged)
        }
        (Constraint::String(x), Constraint::String(y)) => {
            string_join(x, y).map(|shape| {
                let mut merged = a.clone();
                merged.constraint = Constraint::String(shape);
                merged
            })
        }
        (Constraint::Array(x), Constraint::Array(y)) => {
            // Equal element constraints: enclose the size intervals.
            // `uniqueItems` survives only when both sides require it.
            if x.tuple == y.tuple
                && x.additional == y.additional
                && ranges_touch(x.min_items, x.max_items, y.min_items, y.max_items)
            {
                let mut shape = x.clone();
                shape.min_items = x.min_items.min(y.min_items);
                shape.max_items = opt_max(x.max_items, y.max_items);
                shape.unique_items = x.unique_items && y.unique_items;
                let mut merged = a.clone();
                merged.constraint = Constraint::Array(shape);
                return Some(merged);
            }
            None
        }
        (Constraint::Object(x), Constraint::Object(y)) => {
            if x.properties == y.properties
                && x.patterns == y.patterns
                && x.additional == y.additional
                && x.required == y.required
                && ranges_touch(
                    x.min_properties,
                    x.max_properties,
                    y.min_properties,
                    y.max_properties,
                )
            {
                let mut shape = x.clone();
                shape.min_properties = x.min_properties.min(y.min_properties);
                shape.max_properties = opt_max(x.max_properties, y.max_properties);
                let mut merged = a.clone();
                merged.constraint = Constraint::Object(shape);
                return Some(merged);
            }
            None
        }
        _ => None,
    }
}

fn string_join(x: &StringShape, y: &StringShape) -> Option<StringShape> {
    let lengths_equal = x.min_length == y.min_length && x.max_length == y.max_length;
    let lengths_touch = ranges_touch(x.min_length, x.max_length, y.min_length, y.max_length);

    match (&x.pattern, &y.pattern) {
        (None, None) if lengths_touch => Some(StringShape {
            min_length: x.min_length.min(y.min_length),
            max_length: opt_max(x.max_length, y.max_length),
            pattern: None,
        }),
        // Same length window: the language union is exact.
        (Some(p), Some(q)) if lengths_equal => Some(StringShape {
            min_length: x.min_length,
            max_length: x.max_length,
            pattern: Some(p.union(q)),
        }),
        // One side subsumes the other.
        _ => {
            if string_subsumes(y, x) {
                Some(y.clone())
            } else if string_subsumes(x, y) {
                Some(x.clone())
            } else {
                None
            }
        }
    }
}

/// Does `outer` accept every string `inner` accepts?
fn string_subsumes(outer: &StringShape, inner: &StringShape) -> bool {
    if inner.min_length < outer.min_length {
        return false;
    }
    if let Some(omax) = outer.max_length {
        if inner.max_length.map_or(true, |imax| imax > omax) {
            return false;
        }
    }
    match (&inner.pattern, &outer.pattern) {
        (_, None) => true,
        (Some(p), Some(q)) => p.is_subset(q),
        (None, Some(q)) => Pattern::any().is_subset(q),
    }
}

/// Drop an enum restriction that covers its whole (finite) domain.
fn normalize_cases(atom: &Atom, values: Vec<Value>) -> Option<Vec<Value>> {
    match atom.base {
        crate::canonical::BaseType::Null => {
            if values.iter().any(|v| v.is_null()) {
                None
            } else {
                Some(values)
            }
        }
        crate::canonical::BaseType::Boolean => {
            let has_true = values.contains(&Value::Bool(true));
            let has_false = values.contains(&Value::Bool(false));
            if has_true && has_false {
                None
            } else {
                Some(values)
            }
        }
        _ => Some(values),
    }
}

fn ranges_touch(min_a: u64, max_a: Option<u64>, min_b: u64, max_b: Option<u64>) -> bool {
    let left_ok = match max_a {
        None => true,
        Some(ma) => min_b <= ma.saturating_add(1),
    };
    let right_ok = match max_b {
        None => true,
        Some(mb) => min_a <= mb.saturating_add(1),
    };
    left_ok && right_ok
}

fn opt_max(a: Option<u64>, b: Option<u64>) -> Option<u64> {
    match (a, b) {
        (Some(x), Some(y)) => Some(x.max(y)),
        _ => None,
    }
}
