//! Canonicalization: raw schema → disjunction of typed atoms.
//!
//! A pure recursive reduction in three phases:
//!
//! 1. `$ref` resolution (see [`refs`]) — non-recursive refs inlined,
//!    cycle participants kept as named definitions.
//! 2. Per-node reduction: `type` expansion, per-type keyword collection,
//!    `enum`/`const` restriction, then combinator folding — `allOf` meets,
//!    `anyOf`/`oneOf` unions, `not` complements.
//! 3. Cleanup: unsatisfiable atoms collapse to Bottom, duplicates coalesce.
//!
//! The reduction is deterministic and side-effect-free; `stype` annotations
//! are normalized through the resolver and propagated onto every produced
//! atom.

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::canonical::join::{coalesce, join_sided};
use crate::canonical::meet::{meet_sided, LatticeCtx, Side};
use crate::canonical::refs::{self, build_path};
use crate::canonical::{
    ArrayShape, Atom, BaseType, Canonical, Constraint, DefsEnv, ObjPattern, ObjectShape,
    StringShape,
};
use crate::config::CompareOptions;
use crate::error::SubtypeError;
use crate::numeric::{rational_from_number, Bound, NumericShape};
use crate::pattern::Pattern;
use crate::resolver::SemanticResolver;

/// A canonicalized document: the root disjunction plus the definitions
/// backing any recursive references inside it.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct CanonicalRoot {
    pub root: Canonical,
    pub defs: DefsEnv,
}

pub(crate) fn canonicalize(
    schema: &Value,
    options: &CompareOptions,
    resolver: &dyn SemanticResolver,
) -> Result<CanonicalRoot, SubtypeError> {
    let resolved = refs::resolve(schema, options)?;

    let mut defs = DefsEnv::new();
    for (name, body) in &resolved.defs {
        let canon = build(body, name, resolver, &defs)?;
        defs.insert(name.clone(), canon);
    }
    let root = build(&resolved.schema, "#", resolver, &defs)?;
    debug!(defs = defs.len(), "canonicalized schema");
    Ok(CanonicalRoot { root, defs })
}

// ---------------------------------------------------------------------------
// Node reduction
// ---------------------------------------------------------------------------

fn build(
    value: &Value,
    path: &str,
    resolver: &dyn SemanticResolver,
    env: &DefsEnv,
) -> Result<Canonical, SubtypeError> {
    let map = match value {
        Value::Bool(true) => return Ok(Canonical::top()),
        Value::Bool(false) => return Ok(Canonical::bottom()),
        Value::Object(map) => map,
        _ => {
            return Err(SubtypeError::InvalidSchema {
                path: path.to_string(),
                message: "a schema must be an object or a boolean".to_string(),
            })
        }
    };

    // Remaining `$ref` nodes are cycle participants.
    if let Some(ptr) = map.get("$ref").and_then(Value::as_str) {
        return Ok(Canonical::Ref(ptr.to_string()));
    }

    let mut result = build_own(map, path, resolver, env)?;

    if let Some(parts) = combinator_parts(map, "allOf", path)? {
        for (i, part) in parts.iter().enumerate() {
            let child = build(part, &build_path(path, &["allOf", &i.to_string()]), resolver, env)?;
            result = strict_meet(&result, &child, resolver, env, path)?;
        }
    }

    for keyword in ["anyOf", "oneOf"] {
        if let Some(parts) = combinator_parts(map, keyword, path)? {
            let mut built = Vec::with_capacity(parts.len());
            for (i, part) in parts.iter().enumerate() {
                built.push(build(
                    part,
                    &build_path(path, &[keyword, &i.to_string()]),
                    resolver,
                    env,
                )?);
            }
            if keyword == "oneOf" {
                warn_on_oneof_overlap(&built, resolver, env, path);
            }
            let mut union = Canonical::bottom();
            for child in &built {
                let mut ctx = LatticeCtx::strict(env, resolver);
                union = join_sided(&union, Side::A, child, Side::A, &mut ctx)?;
            }
            result = strict_meet(&result, &union, resolver, env, path)?;
        }
    }

    if let Some(part) = map.get("not") {
        let inner = build(part, &build_path(path, &["not"]), resolver, env)?;
        let complemented = complement(&inner, &build_path(path, &["not"]), resolver, env)?;
        result = strict_meet(&result, &complemented, resolver, env, path)?;
    }

    Ok(result)
}

fn strict_meet(
    a: &Canonical,
    b: &Canonical,
    resolver: &dyn SemanticResolver,
    env: &DefsEnv,
    path: &str,
) -> Result<Canonical, SubtypeError> {
    let mut ctx = LatticeCtx::strict(env, resolver);
    meet_sided(a, Side::A, b, Side::A, &mut ctx).map_err(|e| match e {
        SubtypeError::Unsupported { feature, .. } => SubtypeError::Unsupported {
            path: path.to_string(),
            feature,
        },
        other => other,
    })
}

fn combinator_parts<'a>(
    map: &'a Map<String, Value>,
    keyword: &str,
    path: &str,
) -> Result<Option<&'a Vec<Value>>, SubtypeError> {
    match map.get(keyword) {
        None => Ok(None),
        Some(Value::Array(parts)) if !parts.is_empty() => Ok(Some(parts)),
        Some(Value::Array(_)) => Err(SubtypeError::InvalidSchema {
            path: build_path(path, &[keyword]),
            message: format!("`{}` must not be empty", keyword),
        }),
        Some(_) => Err(SubtypeError::InvalidSchema {
            path: build_path(path, &[keyword]),
            message: format!("`{}` must be an array of schemas", keyword),
        }),
    }
}

fn warn_on_oneof_overlap(
    parts: &[Canonical],
    resolver: &dyn SemanticResolver,
    env: &DefsEnv,
    path: &str,
) {
    for i in 0..parts.len() {
        for j in i + 1..parts.len() {
            let mut ctx = LatticeCtx::strict(env, resolver);
            if let Ok(met) = meet_sided(&parts[i], Side::A, &parts[j], Side::A, &mut ctx) {
                if !met.is_bottom() {
                    warn!(
                        path = %path,
                        left = i,
                        right = j,
                        "oneOf components overlap; treating as anyOf"
                    );
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Own keywords → atoms
// ---------------------------------------------------------------------------

fn build_own(
    map: &Map<String, Value>,
    path: &str,
    resolver: &dyn SemanticResolver,
    env: &DefsEnv,
) -> Result<Canonical, SubtypeError> {
    let semantic_type = match map.get("stype") {
        None => None,
        Some(Value::String(s)) => Some(resolver.normalize(s).map_err(|_| {
            SubtypeError::InvalidSchema {
                path: build_path(path, &["stype"]),
                message: format!("`{}` is neither a bound prefixed name nor a valid IRI", s),
            }
        })?),
        Some(_) => {
            return Err(SubtypeError::InvalidSchema {
                path: build_path(path, &["stype"]),
                message: "`stype` must be a string".to_string(),
            })
        }
    };

    let bases = type_set(map, path)?;
    let enum_values = enum_values(map, path)?;

    let mut atoms: Vec<Atom> = Vec::new();
    for base in bases {
        let mut atom = atom_for_type(base, map, path, resolver, env)?;
        atom.semantic_type = semantic_type.clone();

        if let Some(values) = &enum_values {
            let kept: Vec<Value> = values
                .iter()
                .filter(|v| BaseType::of_value(v).fits_within(base))
                .filter(|v| atom.accepts(v, env))
                .cloned()
                .collect();
            atom.cases = normalize_domain_cases(base, kept);
        }

        if !atom.is_unsatisfiable() && !atoms.contains(&atom) {
            atoms.push(atom);
        }
    }

    Ok(Canonical::AnyOf(coalesce(atoms, env, resolver)))
}

/// `enum` restrictions covering the whole finite domain of their base type
/// are dropped; an empty restriction marks the atom unsatisfiable.
fn normalize_domain_cases(base: BaseType, values: Vec<Value>) -> Option<Vec<Value>> {
    match base {
        BaseType::Null if values.iter().any(Value::is_null) => None,
        BaseType::Boolean
            if values.contains(&Value::Bool(true)) && values.contains(&Value::Bool(false)) =>
        {
            None
        }
        _ => Some(values),
    }
}

fn type_set(map: &Map<String, Value>, path: &str) -> Result<Vec<BaseType>, SubtypeError> {
    let parse_one = |v: &Value| -> Result<BaseType, SubtypeError> {
        let name = v.as_str().ok_or_else(|| SubtypeError::InvalidSchema {
            path: build_path(path, &["type"]),
            message: "`type` entries must be strings".to_string(),
        })?;
        BaseType::from_name(name).ok_or_else(|| SubtypeError::InvalidSchema {
            path: build_path(path, &["type"]),
            message: format!("unknown type `{}`", name),
        })
    };

    match map.get("type") {
        None => Ok(vec![
            BaseType::Null,
            BaseType::Boolean,
            BaseType::Number,
            BaseType::String,
            BaseType::Array,
            BaseType::Object,
        ]),
        Some(Value::String(_)) => Ok(vec![parse_one(map.get("type").expect("just matched"))?]),
        Some(Value::Array(names)) => {
            let mut out = Vec::with_capacity(names.len());
            for v in names {
                let base = parse_one(v)?;
                if !out.contains(&base) {
                    out.push(base);
                }
            }
            if out.is_empty() {
                return Err(SubtypeError::InvalidSchema {
                    path: build_path(path, &["type"]),
                    message: "`type` array must not be empty".to_string(),
                });
            }
            Ok(out)
        }
        Some(_) => Err(SubtypeError::InvalidSchema {
            path: build_path(path, &["type"]),
            message: "`type` must be a string or an array of strings".to_string(),
        }),
    }
}

fn enum_values(map: &Map<String, Value>, path: &str) -> Result<Option<Vec<Value>>, SubtypeError> {
    let from_enum = match map.get("enum") {
        None => None,
        Some(Value::Array(values)) => Some(values.clone()),
        Some(_) => {
            return Err(SubtypeError::InvalidSchema {
                path: build_path(path, &["enum"]),
                message: "`enum` must be an array".to_string(),
            })
        }
    };
    match (from_enum, map.get("const")) {
        (None, None) => Ok(None),
        (Some(values), None) => Ok(Some(values)),
        (None, Some(c)) => Ok(Some(vec![c.clone()])),
        // `const` conjoins with `enum`: keep the constant only if listed.
        (Some(values), Some(c)) => Ok(Some(if values.contains(c) {
            vec![c.clone()]
        } else {
            Vec::new()
        })),
    }
}

fn atom_for_type(
    base: BaseType,
    map: &Map<String, Value>,
    path: &str,
    resolver: &dyn SemanticResolver,
    env: &DefsEnv,
) -> Result<Atom, SubtypeError> {
    let mut atom = Atom::unconstrained(base);
    atom.constraint = match base {
        BaseType::Null | BaseType::Boolean => Constraint::None,
        BaseType::Integer | BaseType::Number => {
            Constraint::Numeric(numeric_shape(map, path, base == BaseType::Integer)?)
        }
        BaseType::String => Constraint::String(string_shape(map, path)?),
        BaseType::Array => Constraint::Array(array_shape(map, path, resolver, env)?),
        BaseType::Object => Constraint::Object(object_shape(map, path, resolver, env)?),
    };
    Ok(atom)
}

// --- numeric ---------------------------------------------------------------

fn numeric_shape(
    map: &Map<String, Value>,
    path: &str,
    integral: bool,
) -> Result<NumericShape, SubtypeError> {
    // The `exclusive*` keywords are booleans in draft-04 and numbers from
    // draft-06 on; both spellings appear in the wild, so both are read.
    let rational = |key: &str,
                    bool_ok: bool|
     -> Result<Option<num_rational::BigRational>, SubtypeError> {
        match map.get(key) {
            None => Ok(None),
            Some(Value::Bool(_)) if bool_ok => Ok(None),
            Some(Value::Number(n)) => {
                rational_from_number(n).map(Some).ok_or_else(|| {
                    SubtypeError::InvalidSchema {
                        path: build_path(path, &[key]),
                        message: format!("`{}` is not a finite number", key),
                    }
                })
            }
            Some(_) => Err(SubtypeError::InvalidSchema {
                path: build_path(path, &[key]),
                message: format!("`{}` must be a number", key),
            }),
        }
    };
    let flag = |key: &str| map.get(key).and_then(Value::as_bool).unwrap_or(false);

    let mut min = match rational("minimum", false)? {
        Some(v) if flag("exclusiveMinimum") => Bound::Exclusive(v),
        Some(v) => Bound::Inclusive(v),
        None => Bound::Unbounded,
    };
    if let Some(v) = rational("exclusiveMinimum", true)? {
        let candidate = Bound::Exclusive(v);
        min = tighter_of(min, candidate, true);
    }
    let mut max = match rational("maximum", false)? {
        Some(v) if flag("exclusiveMaximum") => Bound::Exclusive(v),
        Some(v) => Bound::Inclusive(v),
        None => Bound::Unbounded,
    };
    if let Some(v) = rational("exclusiveMaximum", true)? {
        let candidate = Bound::Exclusive(v);
        max = tighter_of(max, candidate, false);
    }

    let multiple_of = match rational("multipleOf", false)? {
        None => None,
        Some(m) => {
            if m <= num_rational::BigRational::from(num_bigint::BigInt::from(0)) {
                return Err(SubtypeError::InvalidSchema {
                    path: build_path(path, &["multipleOf"]),
                    message: "`multipleOf` must be positive".to_string(),
                });
            }
            Some(m)
        }
    };

    Ok(NumericShape {
        min,
        max,
        multiple_of,
        integral,
    }
    .normalized())
}

fn tighter_of(current: Bound, candidate: Bound, is_lower: bool) -> Bound {
    let cv = match (&current, &candidate) {
        (Bound::Unbounded, _) => return candidate,
        (_, Bound::Unbounded) => return current,
        (
            Bound::Inclusive(a) | Bound::Exclusive(a),
            Bound::Inclusive(b) | Bound::Exclusive(b),
        ) => (a.clone(), b.clone()),
    };
    let (a, b) = cv;
    let candidate_tighter = if is_lower { b > a } else { b < a };
    let tie = a == b;
    if candidate_tighter || (tie && matches!(candidate, Bound::Exclusive(_))) {
        candidate
    } else {
        current
    }
}

// --- string ----------------------------------------------------------------

fn string_shape(map: &Map<String, Value>, path: &str) -> Result<StringShape, SubtypeError> {
    let pattern = match map.get("pattern") {
        None => None,
        Some(Value::String(src)) => {
            Some(
                Pattern::parse(src).map_err(|e| SubtypeError::Unsupported {
                    path: build_path(path, &["pattern"]),
                    feature: e.to_string(),
                })?,
            )
        }
        Some(_) => {
            return Err(SubtypeError::InvalidSchema {
                path: build_path(path, &["pattern"]),
                message: "`pattern` must be a string".to_string(),
            })
        }
    };
    Ok(StringShape {
        min_length: get_u64(map, "minLength", path)?.unwrap_or(0),
        max_length: get_u64(map, "maxLength", path)?,
        pattern,
    })
}

// --- array -----------------------------------------------------------------

fn array_shape(
    map: &Map<String, Value>,
    path: &str,
    resolver: &dyn SemanticResolver,
    env: &DefsEnv,
) -> Result<ArrayShape, SubtypeError> {
    let (tuple, additional) = match map.get("items") {
        None | Some(Value::Bool(true)) => (Vec::new(), None),
        Some(Value::Bool(false)) => (Vec::new(), Some(Box::new(Canonical::bottom()))),
        Some(Value::Object(_)) => {
            let schema = build(
                map.get("items").expect("just matched"),
                &build_path(path, &["items"]),
                resolver,
                env,
            )?;
            (Vec::new(), Some(Box::new(schema)))
        }
        Some(Value::Array(parts)) => {
            let mut tuple = Vec::with_capacity(parts.len());
            for (i, part) in parts.iter().enumerate() {
                tuple.push(build(
                    part,
                    &build_path(path, &["items", &i.to_string()]),
                    resolver,
                    env,
                )?);
            }
            let additional = match map.get("additionalItems") {
                None | Some(Value::Bool(true)) => None,
                Some(Value::Bool(false)) => Some(Box::new(Canonical::bottom())),
                Some(other @ Value::Object(_)) => Some(Box::new(build(
                    other,
                    &build_path(path, &["additionalItems"]),
                    resolver,
                    env,
                )?)),
                Some(_) => {
                    return Err(SubtypeError::InvalidSchema {
                        path: build_path(path, &["additionalItems"]),
                        message: "`additionalItems` must be a schema or a boolean".to_string(),
                    })
                }
            };
            (tuple, additional)
        }
        Some(_) => {
            return Err(SubtypeError::InvalidSchema {
                path: build_path(path, &["items"]),
                message: "`items` must be a schema, a boolean, or an array of schemas".to_string(),
            })
        }
    };

    let mut shape = ArrayShape {
        min_items: get_u64(map, "minItems", path)?.unwrap_or(0),
        max_items: get_u64(map, "maxItems", path)?,
        unique_items: map
            .get("uniqueItems")
            .and_then(Value::as_bool)
            .unwrap_or(false),
        tuple,
        additional,
    };
    // Positions past max_items never bind.
    if let Some(max) = shape.max_items {
        shape.tuple.truncate(max as usize);
    }
    Ok(shape)
}

// --- object ----------------------------------------------------------------

fn object_shape(
    map: &Map<String, Value>,
    path: &str,
    resolver: &dyn SemanticResolver,
    env: &DefsEnv,
) -> Result<ObjectShape, SubtypeError> {
    let mut properties = std::collections::BTreeMap::new();
    if let Some(props) = map.get("properties") {
        let props = props.as_object().ok_or_else(|| SubtypeError::InvalidSchema {
            path: build_path(path, &["properties"]),
            message: "`properties` must be an object".to_string(),
        })?;
        for (name, schema) in props {
            let built = build(
                schema,
                &build_path(path, &["properties", name]),
                resolver,
                env,
            )?;
            properties.insert(name.clone(), built);
        }
    }

    let mut patterns = Vec::new();
    if let Some(pats) = map.get("patternProperties") {
        let pats = pats.as_object().ok_or_else(|| SubtypeError::InvalidSchema {
            path: build_path(path, &["patternProperties"]),
            message: "`patternProperties` must be an object".to_string(),
        })?;
        for (source, schema) in pats {
            let pattern =
                Pattern::parse(source).map_err(|e| SubtypeError::Unsupported {
                    path: build_path(path, &["patternProperties", source]),
                    feature: e.to_string(),
                })?;
            let built = build(
                schema,
                &build_path(path, &["patternProperties", source]),
                resolver,
                env,
            )?;
            patterns.push(ObjPattern {
                pattern,
                schema: built,
            });
        }
    }

    let additional = match map.get("additionalProperties") {
        None | Some(Value::Bool(true)) => None,
        Some(Value::Bool(false)) => Some(Box::new(Canonical::bottom())),
        Some(other @ Value::Object(_)) => Some(Box::new(build(
            other,
            &build_path(path, &["additionalProperties"]),
            resolver,
            env,
        )?)),
        Some(_) => {
            return Err(SubtypeError::InvalidSchema {
                path: build_path(path, &["additionalProperties"]),
                message: "`additionalProperties` must be a schema or a boolean".to_string(),
            })
        }
    };

    let mut required = std::collections::BTreeSet::new();
    if let Some(req) = map.get("required") {
        let req = req.as_array().ok_or_else(|| SubtypeError::InvalidSchema {
            path: build_path(path, &["required"]),
            message: "`required` must be an array of strings".to_string(),
        })?;
        for name in req {
            let name = name.as_str().ok_or_else(|| SubtypeError::InvalidSchema {
                path: build_path(path, &["required"]),
                message: "`required` entries must be strings".to_string(),
            })?;
            required.insert(name.to_string());
        }
    }

    Ok(ObjectShape {
        min_properties: get_u64(map, "minProperties", path)?.unwrap_or(0),
        max_properties: get_u64(map, "maxProperties", path)?,
        properties,
        patterns,
        additional,
        required,
    })
}

fn get_u64(
    map: &Map<String, Value>,
    key: &str,
    path: &str,
) -> Result<Option<u64>, SubtypeError> {
    match map.get(key) {
        None => Ok(None),
        Some(Value::Number(n)) => n.as_u64().map(Some).ok_or_else(|| {
            SubtypeError::InvalidSchema {
                path: build_path(path, &[key]),
                message: format!("`{}` must be a non-negative integer", key),
            }
        }),
        Some(_) => Err(SubtypeError::InvalidSchema {
            path: build_path(path, &[key]),
            message: format!("`{}` must be a non-negative integer", key),
        }),
    }
}

// ---------------------------------------------------------------------------
// Complement (`not`)
// ---------------------------------------------------------------------------

/// Complement with respect to Top, kernel by kernel. Exact where the shape
/// algebra allows; otherwise the offending piece becomes an opaque
/// `negated` atom.
fn complement(
    c: &Canonical,
    path: &str,
    resolver: &dyn SemanticResolver,
    env: &DefsEnv,
) -> Result<Canonical, SubtypeError> {
    let atoms = match c {
        Canonical::AnyOf(atoms) => atoms,
        Canonical::Ref(_) => {
            return Err(SubtypeError::Unsupported {
                path: path.to_string(),
                feature: "`not` over a recursive reference".to_string(),
            })
        }
    };

    // ¬(A₁ ∨ … ∨ Aₙ) = ¬A₁ ⊓ … ⊓ ¬Aₙ; the complement of Bottom is Top.
    let mut result = Canonical::top();
    for atom in atoms {
        let piece = complement_atom(atom);
        result = strict_meet(&result, &piece, resolver, env, path)?;
    }
    Ok(result)
}

fn complement_atom(atom: &Atom) -> Canonical {
    let mut pieces: Vec<Atom> = Vec::new();

    // Values of every other base type are in the complement. Number covers
    // Integer; the Integer family contributes the non-integral piece below.
    for other in [
        BaseType::Null,
        BaseType::Boolean,
        BaseType::Number,
        BaseType::String,
        BaseType::Array,
        BaseType::Object,
    ] {
        let same_family = other == atom.base
            || (other == BaseType::Number && atom.base == BaseType::Integer);
        if !same_family {
            pieces.push(Atom::unconstrained(other));
        }
    }

    // Double negation flips back to the plain atom.
    if atom.negated {
        let mut plain = atom.clone();
        plain.negated = false;
        pieces.push(plain);
        return Canonical::AnyOf(pieces);
    }

    // A semantic annotation has no expressible complement.
    if atom.semantic_type.is_some() {
        pieces.push(opaque_negation(atom));
        return Canonical::AnyOf(pieces);
    }

    if let Some(values) = &atom.cases {
        match atom.base {
            // The finite domains complement exactly.
            BaseType::Null => {
                if !values.iter().any(Value::is_null) {
                    pieces.push(Atom::unconstrained(BaseType::Null));
                }
            }
            BaseType::Boolean => {
                let excluded: Vec<Value> = [Value::Bool(true), Value::Bool(false)]
                    .into_iter()
                    .filter(|v| !values.contains(v))
                    .collect();
                if !excluded.is_empty() {
                    let mut piece = Atom::unconstrained(BaseType::Boolean);
                    piece.cases = Some(excluded);
                    pieces.push(piece);
                }
            }
            _ => pieces.push(opaque_negation(atom)),
        }
        return Canonical::AnyOf(pieces);
    }

    match &atom.constraint {
        // An unconstrained Null/Boolean atom covers its whole domain:
        // nothing within the type survives the complement.
        Constraint::None => {}
        Constraint::Numeric(shape) => {
            if shape.multiple_of.is_some() {
                pieces.push(opaque_negation(atom));
            } else {
                if atom.base == BaseType::Integer {
                    // Non-integral numbers never satisfied the atom.
                    let mut non_integral = Atom::unconstrained(BaseType::Number);
                    non_integral.constraint =
                        Constraint::Numeric(NumericShape::unconstrained(true));
                    non_integral.negated = true;
                    pieces.push(non_integral);
                }
                let piece_base = atom.base;
                if let Bound::Inclusive(_) | Bound::Exclusive(_) = shape.min {
                    let mut below = Atom::unconstrained(piece_base);
                    below.constraint = Constraint::Numeric(
                        NumericShape {
                            min: Bound::Unbounded,
                            max: flip_bound(&shape.min),
                            multiple_of: None,
                            integral: piece_base == BaseType::Integer,
                        }
                        .normalized(),
                    );
                    pieces.push(below);
                }
                if let Bound::Inclusive(_) | Bound::Exclusive(_) = shape.max {
                    let mut above = Atom::unconstrained(piece_base);
                    above.constraint = Constraint::Numeric(
                        NumericShape {
                            min: flip_bound(&shape.max),
                            max: Bound::Unbounded,
                            multiple_of: None,
                            integral: piece_base == BaseType::Integer,
                        }
                        .normalized(),
                    );
                    pieces.push(above);
                }
            }
        }
        Constraint::String(shape) => {
            if shape.min_length > 0 {
                let mut short = Atom::unconstrained(BaseType::String);
                short.constraint = Constraint::String(StringShape {
                    min_length: 0,
                    max_length: Some(shape.min_length - 1),
                    pattern: None,
                });
                pieces.push(short);
            }
            if let Some(max) = shape.max_length {
                let mut long = Atom::unconstrained(BaseType::String);
                long.constraint = Constraint::String(StringShape {
                    min_length: max + 1,
                    max_length: None,
                    pattern: None,
                });
                pieces.push(long);
            }
            if let Some(p) = &shape.pattern {
                let mut mismatched = Atom::unconstrained(BaseType::String);
                mismatched.constraint = Constraint::String(StringShape {
                    min_length: shape.min_length,
                    max_length: shape.max_length,
                    pattern: Some(p.complement()),
                });
                pieces.push(mismatched);
            }
        }
        Constraint::Array(shape) => {
            if shape.tuple.is_empty() && shape.additional.is_none() && !shape.unique_items {
                push_size_complement(
                    &mut pieces,
                    BaseType::Array,
                    shape.min_items,
                    shape.max_items,
                    |min, max| {
                        Constraint::Array(ArrayShape {
                            min_items: min,
                            max_items: max,
                            ..ArrayShape::unconstrained()
                        })
                    },
                );
            } else {
                pieces.push(opaque_negation(atom));
            }
        }
        Constraint::Object(shape) => {
            if shape.properties.is_empty()
                && shape.patterns.is_empty()
                && shape.additional.is_none()
                && shape.required.is_empty()
            {
                push_size_complement(
                    &mut pieces,
                    BaseType::Object,
                    shape.min_properties,
                    shape.max_properties,
                    |min, max| {
                        Constraint::Object(ObjectShape {
                            min_properties: min,
                            max_properties: max,
                            ..ObjectShape::unconstrained()
                        })
                    },
                );
            } else {
                pieces.push(opaque_negation(atom));
            }
        }
    }

    Canonical::AnyOf(pieces)
}

fn opaque_negation(atom: &Atom) -> Atom {
    let mut negated = atom.clone();
    negated.negated = true;
    negated
}

fn flip_bound(b: &Bound) -> Bound {
    match b {
        Bound::Unbounded => Bound::Unbounded,
        Bound::Inclusive(v) => Bound::Exclusive(v.clone()),
        Bound::Exclusive(v) => Bound::Inclusive(v.clone()),
    }
}

fn push_size_complement(
    pieces: &mut Vec<Atom>,
    base: BaseType,
    min: u64,
    max: Option<u64>,
    make: impl Fn(u64, Option<u64>) -> Constraint,
) {
    if min > 0 {
        let mut below = Atom::unconstrained(base);
        below.constraint = make(0, Some(min - 1));
        pieces.push(below);
    }
    if let Some(max) = max {
        let mut above = Atom::unconstrained(base);
        above.constraint = make(max + 1, None);
        pieces.push(above);
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::NullResolver;
    use serde_json::json;

    fn canon(schema: Value) -> CanonicalRoot {
        canonicalize(&schema, &CompareOptions::default(), &NullResolver).unwrap()
    }

    fn atoms(schema: Value) -> Vec<Atom> {
        match canon(schema).root {
            Canonical::AnyOf(atoms) => atoms,
            Canonical::Ref(name) => panic!("unexpected ref root {}", name),
        }
    }

    #[test]
    fn test_boolean_schemas() {
        assert!(canon(json!(true)).root.is_top());
        assert!(canon(json!(false)).root.is_bottom());
    }

    #[test]
    fn test_absent_type_expands_to_all_bases() {
        assert!(canon(json!({})).root.is_top());
        // A numeric keyword binds only the number atom; the others stay.
        let atoms = atoms(json!({ "minimum": 3 }));
        assert_eq!(atoms.len(), 6);
        let number = atoms
            .iter()
            .find(|a| a.base == BaseType::Number)
            .expect("number atom");
        assert!(matches!(&number.constraint, Constraint::Numeric(n)
            if n.min != Bound::Unbounded));
    }

    #[test]
    fn test_type_array_one_atom_each() {
        let atoms = atoms(json!({ "type": ["integer", "string"] }));
        assert_eq!(atoms.len(), 2);
        assert_eq!(atoms[0].base, BaseType::Integer);
        assert_eq!(atoms[1].base, BaseType::String);
    }

    #[test]
    fn test_enum_partitions_by_value_type() {
        let atoms = atoms(json!({ "enum": [1, "x", null, true] }));
        let bases: Vec<BaseType> = atoms.iter().map(|a| a.base).collect();
        assert!(bases.contains(&BaseType::Number));
        assert!(bases.contains(&BaseType::String));
        assert!(bases.contains(&BaseType::Null));
        assert!(bases.contains(&BaseType::Boolean));
        // The null atom drops its redundant singleton restriction.
        let null = atoms.iter().find(|a| a.base == BaseType::Null).unwrap();
        assert!(null.cases.is_none());
    }

    #[test]
    fn test_enum_values_pruned_by_type_and_constraints() {
        let atoms = atoms(json!({ "type": "integer", "minimum": 2, "enum": [1, 2, "x"] }));
        assert_eq!(atoms.len(), 1);
        assert_eq!(atoms[0].cases, Some(vec![json!(2)]));
    }

    #[test]
    fn test_unsatisfiable_atom_collapses() {
        assert!(canon(json!({ "type": "string", "minLength": 3, "maxLength": 1 }))
            .root
            .is_bottom());
        assert!(canon(json!({ "type": "integer", "enum": ["only", "strings"] }))
            .root
            .is_bottom());
    }

    #[test]
    fn test_allof_meets() {
        let atoms = atoms(json!({
            "allOf": [{ "type": "integer" }, { "minimum": 0 }, { "maximum": 9 }]
        }));
        assert_eq!(atoms.len(), 1);
        assert_eq!(atoms[0].base, BaseType::Integer);
    }

    #[test]
    fn test_not_over_top_is_bottom() {
        assert!(canon(json!({ "not": {} })).root.is_bottom());
        assert!(canon(json!({ "not": true })).root.is_bottom());
        assert!(canon(json!({ "not": false })).root.is_top());
    }

    #[test]
    fn test_not_string_drops_the_string_atom() {
        let atoms = atoms(json!({ "not": { "type": "string" } }));
        assert_eq!(atoms.len(), 5);
        assert!(atoms.iter().all(|a| a.base != BaseType::String));
    }

    #[test]
    fn test_not_multiple_of_becomes_opaque() {
        let atoms = atoms(json!({ "type": "integer", "not": { "multipleOf": 3 } }));
        assert_eq!(atoms.len(), 1);
        assert!(atoms[0].negated);
    }

    #[test]
    fn test_stype_propagates_to_every_atom() {
        let atoms = atoms(json!({
            "stype": "http://example.com/vocab/Thing",
            "anyOf": [{ "type": "integer" }, { "type": "string" }]
        }));
        assert_eq!(atoms.len(), 2);
        assert!(atoms
            .iter()
            .all(|a| a.semantic_type.as_deref() == Some("http://example.com/vocab/Thing")));
    }

    #[test]
    fn test_recursive_ref_becomes_named_definition() {
        let root = canon(json!({
            "type": "object",
            "properties": { "next": { "$ref": "#/$defs/Node" } },
            "$defs": {
                "Node": {
                    "type": "object",
                    "properties": { "next": { "$ref": "#/$defs/Node" } }
                }
            }
        }));
        assert!(root.defs.contains_key("#/$defs/Node"));
    }

    #[test]
    fn test_invalid_keyword_shapes_rejected() {
        let options = CompareOptions::default();
        for schema in [
            json!({ "minimum": "zero" }),
            json!({ "type": 3 }),
            json!({ "type": "float" }),
            json!({ "enum": "not-an-array" }),
            json!({ "required": [1] }),
            json!({ "multipleOf": 0 }),
        ] {
            let err = canonicalize(&schema, &options, &NullResolver).unwrap_err();
            assert!(
                matches!(err, SubtypeError::InvalidSchema { .. }),
                "expected InvalidSchema for {}",
                schema
            );
        }
    }

    #[test]
    fn test_pattern_outside_dialect_is_unsupported() {
        let err = canonicalize(
            &json!({ "type": "string", "pattern": "(?=a)b" }),
            &CompareOptions::default(),
            &NullResolver,
        )
        .unwrap_err();
        assert!(matches!(err, SubtypeError::Unsupported { .. }));
    }
}
