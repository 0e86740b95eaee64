//! Serialization of canonical schemas back to Draft-04-style JSON.
//!
//! Single-atom disjunctions flatten to a plain object, multi-atom ones to
//! `anyOf`. Top is `{}`, Bottom is `{"not": {}}`. Named definitions (from
//! recursive inputs or minted by meet/join) land in `$defs` with `$ref`
//! pointers. Negated atoms serialize as the type plus a `not` carrying the
//! interior constraints.

use num_rational::BigRational;
use num_traits::One;
use serde_json::{json, Map, Value};

use crate::canonical::canonicalize::CanonicalRoot;
use crate::canonical::refs::escape_pointer_segment;
use crate::canonical::{Atom, BaseType, Canonical, Constraint};
use crate::numeric::{number_from_rational, Bound, NumericShape};

pub(crate) fn root_to_schema(root: &CanonicalRoot) -> Value {
    let mut schema = to_value(&root.root);
    if !root.defs.is_empty() {
        let defs: Map<String, Value> = root
            .defs
            .iter()
            .map(|(name, def)| (name.clone(), to_value(def)))
            .collect();
        // `to_value` always yields an object; a bare `$ref` root carries
        // `$defs` as a sibling, which reference resolution reads before
        // any keyword interpretation.
        let obj = schema.as_object_mut().expect("canonical schemas serialize to objects");
        obj.insert("$defs".to_string(), Value::Object(defs));
    }
    schema
}

pub(crate) fn to_value(c: &Canonical) -> Value {
    match c {
        Canonical::Ref(name) => {
            json!({ "$ref": format!("#/$defs/{}", escape_pointer_segment(name)) })
        }
        Canonical::AnyOf(atoms) => {
            if atoms.is_empty() {
                return json!({ "not": {} });
            }
            if c.is_top() {
                return json!({});
            }
            if atoms.len() == 1 {
                return atom_to_value(&atoms[0]);
            }
            Value::Object(Map::from_iter([(
                "anyOf".to_string(),
                Value::Array(atoms.iter().map(atom_to_value).collect()),
            )]))
        }
    }
}

fn atom_to_value(atom: &Atom) -> Value {
    let mut obj = Map::new();
    obj.insert("type".to_string(), json!(atom.base.name()));
    if let Some(iri) = &atom.semantic_type {
        obj.insert("stype".to_string(), json!(iri));
    }

    if atom.negated {
        let mut interior = Map::new();
        constraint_keywords(&atom.constraint, atom.base, &mut interior);
        if let Some(values) = &atom.cases {
            interior.insert("enum".to_string(), Value::Array(values.clone()));
        }
        obj.insert("not".to_string(), Value::Object(interior));
        return Value::Object(obj);
    }

    constraint_keywords(&atom.constraint, atom.base, &mut obj);
    if let Some(values) = &atom.cases {
        obj.insert("enum".to_string(), Value::Array(values.clone()));
    }
    Value::Object(obj)
}

fn constraint_keywords(constraint: &Constraint, base: BaseType, obj: &mut Map<String, Value>) {
    match constraint {
        Constraint::None => {}
        Constraint::Numeric(shape) => numeric_keywords(shape, base, obj),
        Constraint::String(shape) => {
            if shape.min_length > 0 {
                obj.insert("minLength".to_string(), json!(shape.min_length));
            }
            if let Some(max) = shape.max_length {
                obj.insert("maxLength".to_string(), json!(max));
            }
            if let Some(p) = &shape.pattern {
                obj.insert("pattern".to_string(), json!(p.source()));
            }
        }
        Constraint::Array(shape) => {
            if shape.min_items > 0 {
                obj.insert("minItems".to_string(), json!(shape.min_items));
            }
            if let Some(max) = shape.max_items {
                obj.insert("maxItems".to_string(), json!(max));
            }
            if shape.unique_items {
                obj.insert("uniqueItems".to_string(), json!(true));
            }
            if shape.tuple.is_empty() {
                if let Some(items) = &shape.additional {
                    obj.insert("items".to_string(), to_value(items));
                }
            } else {
                obj.insert(
                    "items".to_string(),
                    Value::Array(shape.tuple.iter().map(to_value).collect()),
                );
                if let Some(add) = &shape.additional {
                    let rendered = if add.is_bottom() {
                        Value::Bool(false)
                    } else {
                        to_value(add)
                    };
                    obj.insert("additionalItems".to_string(), rendered);
                }
            }
        }
        Constraint::Object(shape) => {
            if shape.min_properties > 0 {
                obj.insert("minProperties".to_string(), json!(shape.min_properties));
            }
            if let Some(max) = shape.max_properties {
                obj.insert("maxProperties".to_string(), json!(max));
            }
            if !shape.properties.is_empty() {
                let props: Map<String, Value> = shape
                    .properties
                    .iter()
                    .map(|(k, v)| (k.clone(), to_value(v)))
                    .collect();
                obj.insert("properties".to_string(), Value::Object(props));
            }
            if !shape.patterns.is_empty() {
                let pats: Map<String, Value> = shape
                    .patterns
                    .iter()
                    .map(|p| (p.pattern.source().to_string(), to_value(&p.schema)))
                    .collect();
                obj.insert("patternProperties".to_string(), Value::Object(pats));
            }
            if let Some(add) = &shape.additional {
                let rendered = if add.is_bottom() {
                    Value::Bool(false)
                } else {
                    to_value(add)
                };
                obj.insert("additionalProperties".to_string(), rendered);
            }
            if !shape.required.is_empty() {
                obj.insert(
                    "required".to_string(),
                    Value::Array(shape.required.iter().map(|r| json!(r)).collect()),
                );
            }
        }
    }
}

fn numeric_keywords(shape: &NumericShape, base: BaseType, obj: &mut Map<String, Value>) {
    match &shape.min {
        Bound::Unbounded => {}
        Bound::Inclusive(v) => {
            obj.insert("minimum".to_string(), Value::Number(number_from_rational(v)));
        }
        Bound::Exclusive(v) => {
            obj.insert(
                "exclusiveMinimum".to_string(),
                Value::Number(number_from_rational(v)),
            );
        }
    }
    match &shape.max {
        Bound::Unbounded => {}
        Bound::Inclusive(v) => {
            obj.insert("maximum".to_string(), Value::Number(number_from_rational(v)));
        }
        Bound::Exclusive(v) => {
            obj.insert(
                "exclusiveMaximum".to_string(),
                Value::Number(number_from_rational(v)),
            );
        }
    }

    // Integrality beyond what the base type implies folds into the
    // multiple: integer multiples of p/q are exactly the multiples of p.
    let effective_multiple = match (&shape.multiple_of, shape.integral, base) {
        (Some(m), true, BaseType::Number) => Some(BigRational::from(m.numer().clone())),
        (None, true, BaseType::Number) => Some(BigRational::one()),
        (Some(m), _, _) => Some(m.clone()),
        (None, _, _) => None,
    };
    if let Some(m) = effective_multiple {
        if !(base == BaseType::Integer && m.is_one()) {
            obj.insert(
                "multipleOf".to_string(),
                Value::Number(number_from_rational(&m)),
            );
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================
