//! Lattice meet: the greatest schema accepted by both operands.
//!
//! Meet distributes over disjunctions — same-base-type atom pairs meet
//! per kernel, cross-type pairs vanish — and intersects every constraint,
//! like a JSON Schema `allOf`. Recursive references are handled by minting
//! fresh definitions on revisit (the arena scheme), so meets over cyclic
//! schemas come out as mutually recursive canonical output.
//!
//! Every operand carries a [`Side`] selecting its definitions environment;
//! subtrees copied from one side are imported into the result environment
//! under prefixed names.

use std::collections::HashMap;

use tracing::warn;

use crate::canonical::{
    ArrayShape, Atom, BaseType, Canonical, Constraint, DefsEnv, ObjPattern, ObjectShape,
    StringShape,
};
use crate::error::SubtypeError;
use crate::resolver::{SemanticResolver, Subsumption};

/// How a lattice operation treats references.
#[derive(Clone, Copy, PartialEq, Eq)]
pub(crate) enum RefMode {
    /// Canonicalization-time: both operands live in one document
    /// environment. Identity pairs pass through; anything else is an error
    /// (a combinator over a recursive reference).
    Strict,
    /// Post-canonicalization: dereference both sides, minting a fresh
    /// named definition per in-flight pair so cycles terminate.
    Full,
}

/// Which operand a subtree came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Side {
    A,
    B,
}

impl Side {
    fn prefix(self) -> &'static str {
        match self {
            Side::A => "a:",
            Side::B => "b:",
        }
    }
}

/// Shared context for meet and join.
pub(crate) struct LatticeCtx<'a> {
    env_a: &'a DefsEnv,
    env_b: &'a DefsEnv,
    pub resolver: &'a dyn SemanticResolver,
    pub mode: RefMode,
    /// Minted and imported definitions for the result.
    pub out: DefsEnv,
    in_progress: HashMap<(Side, u64, Side, u64), String>,
    counter: usize,
}

impl<'a> LatticeCtx<'a> {
    pub fn strict(env: &'a DefsEnv, resolver: &'a dyn SemanticResolver) -> Self {
        LatticeCtx {
            env_a: env,
            env_b: env,
            resolver,
            mode: RefMode::Strict,
            out: DefsEnv::new(),
            in_progress: HashMap::new(),
            counter: 0,
        }
    }

    pub fn full(
        env_a: &'a DefsEnv,
        env_b: &'a DefsEnv,
        resolver: &'a dyn SemanticResolver,
    ) -> Self {
        LatticeCtx {
            env_a,
            env_b,
            resolver,
            mode: RefMode::Full,
            out: DefsEnv::new(),
            in_progress: HashMap::new(),
            counter: 0,
        }
    }

    pub fn env(&self, side: Side) -> &'a DefsEnv {
        match side {
            Side::A => self.env_a,
            Side::B => self.env_b,
        }
    }

    pub fn mint(&mut self, op: &str) -> String {
        let name = format!("{}${}", op, self.counter);
        self.counter += 1;
        name
    }
}

// ---------------------------------------------------------------------------
// Side imports
// ---------------------------------------------------------------------------

/// Copy a one-sided subtree into the result, rewriting its references to
/// prefixed names and importing the referenced definitions (memoized via
/// `out`). In Strict mode both operands share the output environment, so
/// the subtree passes through untouched.
pub(crate) fn import(c: &Canonical, side: Side, ctx: &mut LatticeCtx<'_>) -> Canonical {
    if ctx.mode == RefMode::Strict {
        return c.clone();
    }
    match c {
        Canonical::AnyOf(atoms) => {
            Canonical::AnyOf(atoms.iter().map(|a| import_atom(a, side, ctx)).collect())
        }
        Canonical::Ref(name) => {
            let imported = format!("{}{}", side.prefix(), name);
            if !ctx.out.contains_key(&imported) {
                if let Some(body) = ctx.env(side).get(name) {
                    // Reserve the slot first so cycles terminate.
                    ctx.out.insert(imported.clone(), Canonical::bottom());
                    let body = import(&body.clone(), side, ctx);
                    ctx.out.insert(imported.clone(), body);
                }
            }
            Canonical::Ref(imported)
        }
    }
}

pub(crate) fn import_atom(atom: &Atom, side: Side, ctx: &mut LatticeCtx<'_>) -> Atom {
    let mut out = atom.clone();
    match &mut out.constraint {
        Constraint::None | Constraint::Numeric(_) | Constraint::String(_) => {}
        Constraint::Array(shape) => {
            shape.tuple = shape.tuple.iter().map(|t| import(t, side, ctx)).collect();
            shape.additional = shape
                .additional
                .take()
                .map(|s| Box::new(import(&s, side, ctx)));
        }
        Constraint::Object(shape) => {
            shape.properties = shape
                .properties
                .iter()
                .map(|(k, v)| (k.clone(), import(v, side, ctx)))
                .collect();
            shape.patterns = shape
                .patterns
                .iter()
                .map(|p| ObjPattern {
                    pattern: p.pattern.clone(),
                    schema: import(&p.schema, side, ctx),
                })
                .collect();
            shape.additional = shape
                .additional
                .take()
                .map(|s| Box::new(import(&s, side, ctx)));
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Meet
// ---------------------------------------------------------------------------

/// Meet of the left-operand schema against the right-operand schema.
pub(crate) fn meet(
    a: &Canonical,
    b: &Canonical,
    ctx: &mut LatticeCtx<'_>,
) -> Result<Canonical, SubtypeError> {
    meet_sided(a, Side::A, b, Side::B, ctx)
}

pub(crate) fn meet_sided(
    a: &Canonical,
    sa: Side,
    b: &Canonical,
    sb: Side,
    ctx: &mut LatticeCtx<'_>,
) -> Result<Canonical, SubtypeError> {
    // Trivial absorption keeps common canonicalization meets cheap.
    if a.is_top() {
        return Ok(import(b, sb, ctx));
    }
    if b.is_top() {
        return Ok(import(a, sa, ctx));
    }
    if a.is_bottom() || b.is_bottom() {
        return Ok(Canonical::bottom());
    }
    if sa == sb && a == b {
        return Ok(import(a, sa, ctx));
    }

    if matches!(a, Canonical::Ref(_)) || matches!(b, Canonical::Ref(_)) {
        match ctx.mode {
            RefMode::Strict => {
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
            RefMode::Full => {
                let key = (sa, a.fingerprint(), sb, b.fingerprint());
                if let Some(name) = ctx.in_progress.get(&key) {
                    return Ok(Canonical::Ref(name.clone()));
                }
                let name = ctx.mint("meet");
                ctx.in_progress.insert(key, name.clone());
                let atoms_a: Vec<Atom> = a.deref(ctx.env(sa)).to_vec();
                let atoms_b: Vec<Atom> = b.deref(ctx.env(sb)).to_vec();
                let result = meet_atom_lists(&atoms_a, sa, &atoms_b, sb, ctx)?;
                ctx.out.insert(name.clone(), result);
                return Ok(Canonical::Ref(name));
            }
        }
    }

    let atoms_a: Vec<Atom> = a.deref(ctx.env(sa)).to_vec();
    let atoms_b: Vec<Atom> = b.deref(ctx.env(sb)).to_vec();
    meet_atom_lists(&atoms_a, sa, &atoms_b, sb, ctx)
}

fn meet_atom_lists(
    atoms_a: &[Atom],
    sa: Side,
    atoms_b: &[Atom],
    sb: Side,
    ctx: &mut LatticeCtx<'_>,
) -> Result<Canonical, SubtypeError> {
    let mut out: Vec<Atom> = Vec::new();
    for a in atoms_a {
        for b in atoms_b {
            if let Some(atom) = atom_meet(a, sa, b, sb, ctx)? {
                if !atom.is_unsatisfiable() && !out.contains(&atom) {
                    out.push(atom);
                }
            }
        }
    }
    Ok(Canonical::AnyOf(out))
}

/// The base type of a meet pair, honoring the Integer refinement.
fn meet_base(a: BaseType, b: BaseType) -> Option<BaseType> {
    use BaseType::*;
    match (a, b) {
        (x, y) if x == y => Some(x),
        (Integer, Number) | (Number, Integer) => Some(Integer),
        _ => None,
    }
}

pub(crate) fn atom_meet(
    a: &Atom,
    sa: Side,
    b: &Atom,
    sb: Side,
    ctx: &mut LatticeCtx<'_>,
) -> Result<Option<Atom>, SubtypeError> {
    let Some(base) = meet_base(a.base, b.base) else {
        return Ok(None);
    };

    // Negated atoms are opaque: handle the decidable shapes, then
    // under-approximate with Bottom (and say so).
    if a.negated || b.negated {
        if a == b {
            return Ok(Some(import_atom(a, sa, ctx)));
        }
        let (plain, ps, negated, ns) = match (a.negated, b.negated) {
            (false, true) => (a, sa, b, sb),
            (true, false) => (b, sb, a, sa),
            _ => {
                warn!("meet of two opaque negated atoms under-approximated to Bottom");
                return Ok(None);
            }
        };

        // If the plain atom is disjoint from the negated atom's interior,
        // the negation holds vacuously.
        let mut interior = negated.clone();
        interior.negated = false;
        let overlap = atom_meet_plain(plain, ps, &interior, ns, ctx)?;
        if overlap.as_ref().map_or(true, |o| o.is_unsatisfiable()) {
            return Ok(Some(import_atom(plain, ps, ctx)));
        }
        // An unconstrained plain side only narrows the base type: the
        // negated atom survives at the meet base.
        if *plain == Atom::unconstrained(plain.base) {
            let mut survived = import_atom(negated, ns, ctx);
            survived.base = base;
            return Ok(Some(survived));
        }
        warn!("meet with an opaque negated atom under-approximated to Bottom");
        return Ok(None);
    }

    let mut result = atom_meet_plain(a, sa, b, sb, ctx)?;
    if let Some(atom) = &mut result {
        atom.base = base;
        if let Constraint::Numeric(shape) = &mut atom.constraint {
            shape.integral = base == BaseType::Integer;
            *shape = shape.clone().normalized();
        }
    }
    Ok(result)
}

/// Meet of two non-negated atoms of compatible base types.
fn atom_meet_plain(
    a: &Atom,
    sa: Side,
    b: &Atom,
    sb: Side,
    ctx: &mut LatticeCtx<'_>,
) -> Result<Option<Atom>, SubtypeError> {
    let semantic_type = meet_semantic(&a.semantic_type, &b.semantic_type, ctx.resolver);

    // Enum restriction: values must satisfy the other side entirely.
    let cases = match (&a.cases, &b.cases) {
        (None, None) => None,
        (Some(values), _) => Some(
            values
                .iter()
                .filter(|v| b.accepts(v, ctx.env(sb)))
                .cloned()
                .collect::<Vec<_>>(),
        ),
        (None, Some(values)) => Some(
            values
                .iter()
                .filter(|v| a.accepts(v, ctx.env(sa)))
                .cloned()
                .collect::<Vec<_>>(),
        ),
    };
    if cases.as_ref().is_some_and(|c| c.is_empty()) {
        return Ok(None);
    }

    let constraint = match (&a.constraint, &b.constraint) {
        (Constraint::None, Constraint::None) => Constraint::None,
        (Constraint::Numeric(x), Constraint::Numeric(y)) => Constraint::Numeric(x.intersect(y)),
        (Constraint::String(x), Constraint::String(y)) => {
            let pattern = match (&x.pattern, &y.pattern) {
                (None, None) => None,
                (Some(p), None) | (None, Some(p)) => Some(p.clone()),
                (Some(p), Some(q)) => Some(p.intersect(q)),
            };
            Constraint::String(StringShape {
                min_length: x.min_length.max(y.min_length),
                max_length: opt_min(x.max_length, y.max_length),
                pattern,
            })
        }
        (Constraint::Array(x), Constraint::Array(y)) => {
            let min_items = x.min_items.max(y.min_items);
            let max_items = opt_min(x.max_items, y.max_items);
            let len = x.tuple.len().max(y.tuple.len());
            let mut tuple = Vec::with_capacity(len);
            for i in 0..len {
                let sx = x.schema_at(i).cloned();
                let sy = y.schema_at(i).cloned();
                tuple.push(match (sx, sy) {
                    (Some(sx), Some(sy)) => meet_sided(&sx, sa, &sy, sb, ctx)?,
                    (Some(sx), None) => import(&sx, sa, ctx),
                    (None, Some(sy)) => import(&sy, sb, ctx),
                    (None, None) => Canonical::top(),
                });
            }
            let additional = match (x.additional.as_deref(), y.additional.as_deref()) {
                (None, None) => None,
                (Some(sx), None) => Some(Box::new(import(&sx.clone(), sa, ctx))),
                (None, Some(sy)) => Some(Box::new(import(&sy.clone(), sb, ctx))),
                (Some(sx), Some(sy)) => {
                    Some(Box::new(meet_sided(&sx.clone(), sa, &sy.clone(), sb, ctx)?))
                }
            };
            let mut shape = ArrayShape {
                min_items,
                max_items,
                unique_items: x.unique_items || y.unique_items,
                tuple,
                additional,
            };
            // Positions past max_items never bind.
            if let Some(max) = shape.max_items {
                shape.tuple.truncate(max as usize);
            }
            Constraint::Array(shape)
        }
        (Constraint::Object(x), Constraint::Object(y)) => {
            Constraint::Object(object_meet(x, sa, y, sb, ctx)?)
        }
        // Compatible bases always carry same-kind constraints.
        _ => return Ok(None),
    };

    Ok(Some(Atom {
        base: a.base,
        semantic_type,
        constraint,
        cases,
        negated: false,
    }))
}

fn object_meet(
    x: &ObjectShape,
    sa: Side,
    y: &ObjectShape,
    sb: Side,
    ctx: &mut LatticeCtx<'_>,
) -> Result<ObjectShape, SubtypeError> {
    // Union of declared names; a name missing on one side is imputed from
    // that side's patterns and additional schema.
    let mut names: Vec<String> = x.properties.keys().chain(y.properties.keys()).cloned().collect();
    names.sort();
    names.dedup();

    let mut properties = std::collections::BTreeMap::new();
    for name in names {
        let ex = effective(x, &name, sa, ctx)?;
        let ey = effective(y, &name, sb, ctx)?;
        let met = match (ex, ey) {
            (Some(sx), Some(sy)) => meet_sided(&sx, sa, &sy, sb, ctx)?,
            (Some(sx), None) => import(&sx, sa, ctx),
            (None, Some(sy)) => import(&sy, sb, ctx),
            (None, None) => continue,
        };
        properties.insert(name, met);
    }

    // All patterns apply in an intersection; same-source patterns meet
    // their schemas.
    let mut patterns: Vec<ObjPattern> = Vec::new();
    for p in &x.patterns {
        if let Some(q) = y.patterns.iter().find(|q| q.pattern == p.pattern) {
            patterns.push(ObjPattern {
                pattern: p.pattern.clone(),
                schema: meet_sided(&p.schema, sa, &q.schema, sb, ctx)?,
            });
        } else {
            patterns.push(ObjPattern {
                pattern: p.pattern.clone(),
                schema: import(&p.schema, sa, ctx),
            });
        }
    }
    for q in &y.patterns {
        if !x.patterns.iter().any(|p| p.pattern == q.pattern) {
            patterns.push(ObjPattern {
                pattern: q.pattern.clone(),
                schema: import(&q.schema, sb, ctx),
            });
        }
    }

    let additional = match (x.additional.as_deref(), y.additional.as_deref()) {
        (None, None) => None,
        (Some(sx), None) => Some(Box::new(import(&sx.clone(), sa, ctx))),
        (None, Some(sy)) => Some(Box::new(import(&sy.clone(), sb, ctx))),
        (Some(sx), Some(sy)) => Some(Box::new(meet_sided(&sx.clone(), sa, &sy.clone(), sb, ctx)?)),
    };

    Ok(ObjectShape {
        min_properties: x.min_properties.max(y.min_properties),
        max_properties: opt_min(x.max_properties, y.max_properties),
        properties,
        patterns,
        additional,
        required: x.required.union(&y.required).cloned().collect(),
    })
}

/// The conjunction of constraints one side imposes on a property name, or
/// `None` when the name is unconstrained there. Multiple applicable parts
/// (an explicit property plus matching patterns) fold with a same-side
/// meet.
pub(crate) fn effective(
    shape: &ObjectShape,
    name: &str,
    side: Side,
    ctx: &mut LatticeCtx<'_>,
) -> Result<Option<Canonical>, SubtypeError> {
    let mut parts: Vec<Canonical> = Vec::new();
    if let Some(s) = shape.properties.get(name) {
        parts.push(s.clone());
    }
    for p in &shape.patterns {
        if p.pattern.matches(name) {
            parts.push(p.schema.clone());
        }
    }
    if parts.is_empty() {
        return Ok(shape.additional.as_deref().cloned());
    }
    let mut acc = parts.remove(0);
    for part in parts {
        acc = meet_sided(&acc, side, &part, side, ctx)?;
    }
    Ok(Some(acc))
}

fn meet_semantic(
    a: &Option<String>,
    b: &Option<String>,
    resolver: &dyn SemanticResolver,
) -> Option<String> {
    match (a, b) {
        (None, None) => None,
        (Some(x), None) | (None, Some(x)) => Some(x.clone()),
        (Some(x), Some(y)) => {
            if x == y {
                return Some(x.clone());
            }
            if resolver.is_subconcept(x, y) == Subsumption::Yes {
                return Some(x.clone());
            }
            if resolver.is_subconcept(y, x) == Subsumption::Yes {
                return Some(y.clone());
            }
            warn!(
                left = %x,
                right = %y,
                "meet of unrelated semantic types keeps the left annotation"
            );
            Some(x.clone())
        }
    }
}

pub(crate) fn opt_min(a: Option<u64>, b: Option<u64>) -> Option<u64> {
    match (a, b) {
        (Some(x), Some(y)) => Some(x.min(y)),
        (v, None) | (None, v) => v,
    }
}
