//! The canonical schema form: a disjunction of typed atoms.
//!
//! Every raw schema canonicalizes to an [`AnyOf`](Canonical::AnyOf) of
//! [`Atom`]s, one base type each, with per-type constraint shapes.
//! Recursive `$ref` targets survive as named definitions referenced by
//! [`Canonical::Ref`]; everything else is inlined. Canonical values are
//! immutable after construction — kernels consume them and build fresh
//! ones.

pub(crate) mod canonicalize;
pub(crate) mod join;
pub(crate) mod meet;
pub(crate) mod refs;
pub(crate) mod to_schema;

use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value;

use crate::numeric::{rational_from_number, NumericShape};
use crate::pattern::Pattern;

/// The closed set of base types. `Integer` refines `Number`; the kernels
/// bake that relation into dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BaseType {
    Null,
    Boolean,
    Integer,
    Number,
    String,
    Array,
    Object,
}

impl BaseType {
    pub fn name(self) -> &'static str {
        match self {
            BaseType::Null => "null",
            BaseType::Boolean => "boolean",
            BaseType::Integer => "integer",
            BaseType::Number => "number",
            BaseType::String => "string",
            BaseType::Array => "array",
            BaseType::Object => "object",
        }
    }

    pub fn from_name(name: &str) -> Option<BaseType> {
        Some(match name {
            "null" => BaseType::Null,
            "boolean" => BaseType::Boolean,
            "integer" => BaseType::Integer,
            "number" => BaseType::Number,
            "string" => BaseType::String,
            "array" => BaseType::Array,
            "object" => BaseType::Object,
            _ => return None,
        })
    }

    /// The base type of a JSON value. Numbers with integral value classify
    /// as `Integer` (so enum members flow into integer atoms).
    pub fn of_value(v: &Value) -> BaseType {
        match v {
            Value::Null => BaseType::Null,
            Value::Bool(_) => BaseType::Boolean,
            Value::Number(n) => {
                let integral = rational_from_number(n).is_some_and(|r| r.is_integer());
                if integral {
                    BaseType::Integer
                } else {
                    BaseType::Number
                }
            }
            Value::String(_) => BaseType::String,
            Value::Array(_) => BaseType::Array,
            Value::Object(_) => BaseType::Object,
        }
    }

    /// Does a value of base type `self` inhabit the domain of `other`?
    /// Identity plus the `Integer <: Number` refinement.
    pub fn fits_within(self, other: BaseType) -> bool {
        self == other || (self == BaseType::Integer && other == BaseType::Number)
    }
}

// ---------------------------------------------------------------------------
// Per-type constraint shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct StringShape {
    pub min_length: u64,
    pub max_length: Option<u64>,
    /// `None` accepts every string within the length bounds.
    pub pattern: Option<Pattern>,
}

impl StringShape {
    pub fn unconstrained() -> Self {
        StringShape {
            min_length: 0,
            max_length: None,
            pattern: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArrayShape {
    pub min_items: u64,
    pub max_items: Option<u64>,
    pub unique_items: bool,
    /// Prefix tuple; empty when a single schema applies to every position.
    pub tuple: Vec<Canonical>,
    /// Schema for positions past the prefix. `None` is unconstrained.
    pub additional: Option<Box<Canonical>>,
}

impl ArrayShape {
    pub fn unconstrained() -> Self {
        ArrayShape {
            min_items: 0,
            max_items: None,
            unique_items: false,
            tuple: Vec::new(),
            additional: None,
        }
    }

    /// The schema applying at position `i`, if constrained.
    pub fn schema_at(&self, i: usize) -> Option<&Canonical> {
        self.tuple
            .get(i)
            .or_else(|| self.additional.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ObjPattern {
    pub pattern: Pattern,
    pub schema: Canonical,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ObjectShape {
    pub min_properties: u64,
    pub max_properties: Option<u64>,
    pub properties: BTreeMap<String, Canonical>,
    pub patterns: Vec<ObjPattern>,
    /// Schema for names not in `properties` and not matching any pattern.
    /// `None` is unconstrained; `additionalProperties: false` canonicalizes
    /// to `Some(Bottom)`, which is semantically identical.
    pub additional: Option<Box<Canonical>>,
    pub required: BTreeSet<String>,
}

impl ObjectShape {
    pub fn unconstrained() -> Self {
        ObjectShape {
            min_properties: 0,
            max_properties: None,
            properties: BTreeMap::new(),
            patterns: Vec::new(),
            additional: None,
            required: BTreeSet::new(),
        }
    }

    /// Is a name outside `properties`/`patterns` admissible at all?
    pub fn admits_additional(&self) -> bool {
        self.additional.as_deref().map_or(true, |s| !s.is_bottom())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Constraint {
    /// Null and Boolean atoms carry no constraints beyond the enum.
    None,
    Numeric(NumericShape),
    String(StringShape),
    Array(ArrayShape),
    Object(ObjectShape),
}

// ---------------------------------------------------------------------------
// Atoms and canonical schemas
// ---------------------------------------------------------------------------

/// A single-base-type constraint bundle.
///
/// When `negated` is set the atom denotes the values of `base` that do
/// *not* satisfy `constraint` + `cases` — the opaque fallback for
/// complements the per-type shapes cannot express exactly.
#[derive(Debug, Clone, PartialEq)]
pub struct Atom {
    pub base: BaseType,
    /// Normalized IRI of the semantic type, when annotated.
    pub semantic_type: Option<String>,
    pub constraint: Constraint,
    /// Finite value restriction (`enum`), pruned to values satisfying the
    /// other constraints.
    pub cases: Option<Vec<Value>>,
    pub negated: bool,
}

impl Atom {
    pub fn unconstrained(base: BaseType) -> Atom {
        let constraint = match base {
            BaseType::Null | BaseType::Boolean => Constraint::None,
            BaseType::Integer | BaseType::Number => {
                Constraint::Numeric(NumericShape::unconstrained(base == BaseType::Integer))
            }
            BaseType::String => Constraint::String(StringShape::unconstrained()),
            BaseType::Array => Constraint::Array(ArrayShape::unconstrained()),
            BaseType::Object => Constraint::Object(ObjectShape::unconstrained()),
        };
        Atom {
            base,
            semantic_type: None,
            constraint,
            cases: None,
            negated: false,
        }
    }

    /// An atom is unsatisfiable when its constraints admit no value.
    /// Collapsing these to Bottom is the canonicalizer's job; kernels may
    /// assume satisfiable atoms.
    pub fn is_unsatisfiable(&self) -> bool {
        if self.negated {
            // A negated atom whose interior covers the whole base domain
            // excludes everything. Other negated atoms are opaque and
            // assumed inhabited. (A Number-based negation of the integral
            // shape is the non-integral piece — not the full domain.)
            return match &self.constraint {
                Constraint::None => true,
                Constraint::Numeric(n) => {
                    *n == NumericShape::unconstrained(self.base == BaseType::Integer)
                }
                Constraint::String(s) => *s == StringShape::unconstrained(),
                Constraint::Array(a) => *a == ArrayShape::unconstrained(),
                Constraint::Object(o) => *o == ObjectShape::unconstrained(),
            } && self.cases.is_none();
        }
        if let Some(cases) = &self.cases {
            if cases.is_empty() {
                return true;
            }
        }
        match &self.constraint {
            Constraint::None => false,
            Constraint::Numeric(n) => n.is_empty(),
            Constraint::String(s) => {
                if s.max_length.is_some_and(|max| max < s.min_length) {
                    return true;
                }
                match &s.pattern {
                    None => false,
                    Some(p) => match p.length_range() {
                        None => true,
                        Some((shortest, longest)) => {
                            // Over-approximate: the pattern must achieve
                            // some length inside the bounds.
                            s.max_length.is_some_and(|max| shortest > max)
                                || longest.is_some_and(|l| l < s.min_length)
                        }
                    },
                }
            }
            Constraint::Array(a) => {
                if a.max_items.is_some_and(|max| max < a.min_items) {
                    return true;
                }
                // A Bottom tuple position below min_items admits no array
                // long enough. (The canonicalizer trims tuples past
                // max_items, so positions beyond the cap never bind.)
                for (i, t) in a.tuple.iter().enumerate() {
                    if t.is_bottom() && (i as u64) < a.min_items {
                        return true;
                    }
                }
                if a.min_items > a.tuple.len() as u64 {
                    if let Some(add) = &a.additional {
                        if add.is_bottom() {
                            return true;
                        }
                    }
                }
                false
            }
            Constraint::Object(o) => {
                if o.max_properties.is_some_and(|max| max < o.min_properties) {
                    return true;
                }
                if o.max_properties
                    .is_some_and(|max| (o.required.len() as u64) > max)
                {
                    return true;
                }
                // Every required name must be admissible and satisfiable.
                for name in &o.required {
                    if let Some(schema) = o.properties.get(name) {
                        if schema.is_bottom() {
                            return true;
                        }
                        continue;
                    }
                    let matching: Vec<&ObjPattern> = o
                        .patterns
                        .iter()
                        .filter(|p| p.pattern.matches(name))
                        .collect();
                    if !matching.is_empty() {
                        if matching.iter().any(|p| p.schema.is_bottom()) {
                            return true;
                        }
                        continue;
                    }
                    if !o.admits_additional() {
                        return true;
                    }
                }
                false
            }
        }
    }
}

/// Environment of named canonical definitions (recursive `$ref` targets).
pub type DefsEnv = BTreeMap<String, Canonical>;

// ---------------------------------------------------------------------------
// Structural hashing
// ---------------------------------------------------------------------------
//
// Canonical values key visited-pair sets and memoization caches. Patterns
// hash by source text; enum values hash by their JSON rendering.

impl std::hash::Hash for Atom {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.base.hash(state);
        self.semantic_type.hash(state);
        self.negated.hash(state);
        match &self.cases {
            None => 0u8.hash(state),
            Some(values) => {
                1u8.hash(state);
                for v in values {
                    v.to_string().hash(state);
                }
            }
        }
        match &self.constraint {
            Constraint::None => 0u8.hash(state),
            Constraint::Numeric(n) => {
                1u8.hash(state);
                n.hash(state);
            }
            Constraint::String(s) => {
                2u8.hash(state);
                s.min_length.hash(state);
                s.max_length.hash(state);
                s.pattern.hash(state);
            }
            Constraint::Array(a) => {
                3u8.hash(state);
                a.min_items.hash(state);
                a.max_items.hash(state);
                a.unique_items.hash(state);
                a.tuple.hash(state);
                a.additional.hash(state);
            }
            Constraint::Object(o) => {
                4u8.hash(state);
                o.min_properties.hash(state);
                o.max_properties.hash(state);
                o.properties.hash(state);
                for p in &o.patterns {
                    p.pattern.hash(state);
                    p.schema.hash(state);
                }
                o.additional.hash(state);
                o.required.hash(state);
            }
        }
    }
}

impl std::hash::Hash for Canonical {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        match self {
            Canonical::AnyOf(atoms) => {
                0u8.hash(state);
                atoms.hash(state);
            }
            Canonical::Ref(name) => {
                1u8.hash(state);
                name.hash(state);
            }
        }
    }
}

impl Canonical {
    /// Stable structural fingerprint, used for visited-pair keys.
    pub fn fingerprint(&self) -> u64 {
        use std::hash::{Hash, Hasher};
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        self.hash(&mut hasher);
        hasher.finish()
    }
}

/// A canonical schema: a disjunction of atoms, or a reference into the
/// definitions environment.
#[derive(Debug, Clone, PartialEq)]
pub enum Canonical {
    AnyOf(Vec<Atom>),
    Ref(String),
}

impl Canonical {
    /// The schema accepting no value.
    pub fn bottom() -> Canonical {
        Canonical::AnyOf(Vec::new())
    }

    /// The schema accepting every value: one unconstrained atom per base
    /// type, with Number covering Integer.
    pub fn top() -> Canonical {
        Canonical::AnyOf(vec![
            Atom::unconstrained(BaseType::Null),
            Atom::unconstrained(BaseType::Boolean),
            Atom::unconstrained(BaseType::Number),
            Atom::unconstrained(BaseType::String),
            Atom::unconstrained(BaseType::Array),
            Atom::unconstrained(BaseType::Object),
        ])
    }

    pub fn is_bottom(&self) -> bool {
        matches!(self, Canonical::AnyOf(atoms) if atoms.is_empty())
    }

    pub fn is_top(&self) -> bool {
        *self == Canonical::top()
    }

    pub fn from_atom(atom: Atom) -> Canonical {
        if atom.is_unsatisfiable() {
            Canonical::bottom()
        } else {
            Canonical::AnyOf(vec![atom])
        }
    }

    /// Resolve through `Ref` indirections. Chains are short; a broken or
    /// cyclic chain resolves to Bottom rather than looping.
    pub fn deref<'a>(&'a self, env: &'a DefsEnv) -> &'a [Atom] {
        let mut current = self;
        for _ in 0..env.len() + 1 {
            match current {
                Canonical::AnyOf(atoms) => return atoms,
                Canonical::Ref(name) => match env.get(name) {
                    Some(next) => current = next,
                    None => return &[],
                },
            }
        }
        &[]
    }

    // -----------------------------------------------------------------------
    // Instance acceptance
    // -----------------------------------------------------------------------

    /// Does this schema accept the JSON value? Used for pointwise `enum`
    /// reasoning; instances are finite so recursion terminates on value
    /// structure.
    pub fn accepts(&self, value: &Value, env: &DefsEnv) -> bool {
        self.deref(env).iter().any(|atom| atom.accepts(value, env))
    }
}

impl Atom {
    /// Does this atom accept the JSON value?
    pub fn accepts(&self, value: &Value, env: &DefsEnv) -> bool {
        if !BaseType::of_value(value).fits_within(self.base) {
            return false;
        }
        let plain = self.satisfies_constraints(value, env);
        if self.negated {
            !plain
        } else {
            plain
        }
    }

    fn satisfies_constraints(&self, value: &Value, env: &DefsEnv) -> bool {
        if let Some(cases) = &self.cases {
            if !cases.iter().any(|c| c == value) {
                return false;
            }
        }
        match (&self.constraint, value) {
            (Constraint::None, _) => true,
            (Constraint::Numeric(shape), Value::Number(n)) => match rational_from_number(n) {
                Some(r) => shape.contains(&r),
                None => false,
            },
            (Constraint::String(shape), Value::String(s)) => {
                let len = s.chars().count() as u64;
                len >= shape.min_length
                    && shape.max_length.map_or(true, |max| len <= max)
                    && shape.pattern.as_ref().map_or(true, |p| p.matches(s))
            }
            (Constraint::Array(shape), Value::Array(items)) => {
                let len = items.len() as u64;
                if len < shape.min_items || shape.max_items.is_some_and(|max| len > max) {
                    return false;
                }
                if shape.unique_items {
                    for i in 0..items.len() {
                        for j in i + 1..items.len() {
                            if items[i] == items[j] {
                                return false;
                            }
                        }
                    }
                }
                items.iter().enumerate().all(|(i, item)| {
                    shape
                        .schema_at(i)
                        .map_or(true, |schema| schema.accepts(item, env))
                })
            }
            (Constraint::Object(shape), Value::Object(map)) => {
                let len = map.len() as u64;
                if len < shape.min_properties
                    || shape.max_properties.is_some_and(|max| len > max)
                {
                    return false;
                }
                if shape.required.iter().any(|r| !map.contains_key(r)) {
                    return false;
                }
                map.iter().all(|(name, v)| {
                    let mut matched = false;
                    if let Some(schema) = shape.properties.get(name) {
                        matched = true;
                        if !schema.accepts(v, env) {
                            return false;
                        }
                    }
                    for p in &shape.patterns {
                        if p.pattern.matches(name) {
                            matched = true;
                            if !p.schema.accepts(v, env) {
                                return false;
                            }
                        }
                    }
                    if !matched {
                        if let Some(add) = &shape.additional {
                            return add.accepts(v, env);
                        }
                    }
                    true
                })
            }
            // Base type was checked; a mismatched pairing is unreachable.
            _ => false,
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================
