//! Integration tests for the subtype decision procedure — exercises the
//! public API only, never the internal kernels directly.

use json_subschema_core::{check_subschema, is_subschema, Decision, SubtypeError};
use serde_json::json;

fn subtype(s1: serde_json::Value, s2: serde_json::Value) -> bool {
    is_subschema(&s1, &s2).expect("well-formed schemas")
}

// ── Base types ──────────────────────────────────────────────────────────────

#[test]
fn test_integer_within_type_union() {
    assert!(subtype(
        json!({ "type": "integer" }),
        json!({ "type": ["integer", "string"] })
    ));
    assert!(!subtype(
        json!({ "type": ["integer", "string"] }),
        json!({ "type": "integer" })
    ));
}

#[test]
fn test_integer_refines_number() {
    assert!(subtype(json!({ "type": "integer" }), json!({ "type": "number" })));
    assert!(!subtype(json!({ "type": "number" }), json!({ "type": "integer" })));
}

#[test]
fn test_cross_type_is_never_subtype() {
    assert!(!subtype(json!({ "type": "string" }), json!({ "type": "object" })));
    assert!(!subtype(json!({ "type": "null" }), json!({ "type": "boolean" })));
}

#[test]
fn test_everything_below_top_and_bottom_below_everything() {
    for schema in [
        json!({ "type": "integer", "minimum": 3 }),
        json!({ "type": "object", "required": ["x"], "properties": { "x": {} } }),
        json!({ "enum": [1, "two", null] }),
    ] {
        assert!(subtype(schema.clone(), json!({})), "{} <: Top", schema);
        assert!(subtype(json!(false), schema.clone()), "Bottom <: {}", schema);
        assert!(subtype(json!({ "not": {} }), schema));
    }
}

// ── Numbers ─────────────────────────────────────────────────────────────────

#[test]
fn test_numeric_interval_nesting() {
    let narrow = json!({ "type": "number", "minimum": 0, "maximum": 100 });
    let wide = json!({ "type": "number", "minimum": -1, "maximum": 101 });
    assert!(subtype(narrow.clone(), wide.clone()));
    assert!(!subtype(wide, narrow));
}

#[test]
fn test_exclusive_endpoints() {
    let open = json!({ "type": "number", "exclusiveMinimum": 0, "exclusiveMaximum": 10 });
    let closed = json!({ "type": "number", "minimum": 0, "maximum": 10 });
    assert!(subtype(open.clone(), closed.clone()));
    assert!(!subtype(closed, open));
}

#[test]
fn test_draft4_boolean_exclusive_modifier() {
    let modified = json!({
        "type": "number", "minimum": 0, "exclusiveMinimum": true, "maximum": 10
    });
    let plain = json!({ "type": "number", "minimum": 0, "maximum": 10 });
    assert!(subtype(modified.clone(), plain.clone()));
    assert!(!subtype(plain, modified));
}

#[test]
fn test_multiple_of_divides() {
    assert!(subtype(
        json!({ "type": "integer", "multipleOf": 6 }),
        json!({ "type": "integer", "multipleOf": 3 })
    ));
    assert!(!subtype(
        json!({ "type": "integer", "multipleOf": 3 }),
        json!({ "type": "integer", "multipleOf": 6 })
    ));
}

#[test]
fn test_decimal_multiple_of() {
    assert!(subtype(
        json!({ "type": "number", "multipleOf": 0.2 }),
        json!({ "type": "number", "multipleOf": 0.1 })
    ));
}

#[test]
fn test_integer_bounds_tighten_across_fractional_endpoints() {
    // Integers > 0.5 are exactly integers >= 1.
    assert!(subtype(
        json!({ "type": "integer", "exclusiveMinimum": 0.5 }),
        json!({ "type": "integer", "minimum": 1 })
    ));
}

#[test]
fn test_unsatisfiable_numeric_collapses_to_bottom() {
    // No integer lives strictly between 0.1 and 0.9.
    let empty = json!({ "type": "integer", "exclusiveMinimum": 0.1, "exclusiveMaximum": 0.9 });
    assert!(subtype(empty, json!({ "type": "string" })));
}

// ── Strings ─────────────────────────────────────────────────────────────────

#[test]
fn test_pattern_language_equality() {
    let a = json!({ "type": "string", "pattern": "^a(b|c)$" });
    let b = json!({ "type": "string", "pattern": "^a[bc]$" });
    assert!(subtype(a.clone(), b.clone()));
    assert!(subtype(b, a));
}

#[test]
fn test_pattern_proper_containment() {
    let narrow = json!({ "type": "string", "pattern": "^[0-9]{4}$" });
    let wide = json!({ "type": "string", "pattern": "^[0-9]+$" });
    assert!(subtype(narrow.clone(), wide.clone()));
    assert!(!subtype(wide, narrow));
}

#[test]
fn test_length_bounds() {
    let narrow = json!({ "type": "string", "minLength": 2, "maxLength": 4 });
    let wide = json!({ "type": "string", "minLength": 1, "maxLength": 5 });
    assert!(subtype(narrow.clone(), wide.clone()));
    assert!(!subtype(wide, narrow));
}

#[test]
fn test_unpatterned_against_pattern() {
    // Any string of length 1-2 matches `^[\s\S]{1,2}$`-shaped languages.
    assert!(subtype(
        json!({ "type": "string", "minLength": 1, "maxLength": 2 }),
        json!({ "type": "string", "pattern": "^[\\s\\S]{1,4}$" })
    ));
    // But not every such string is a digit.
    assert!(!subtype(
        json!({ "type": "string", "minLength": 1, "maxLength": 2 }),
        json!({ "type": "string", "pattern": "^[0-9]+$" })
    ));
}

#[test]
fn test_lookahead_pattern_is_unsupported() {
    let err = is_subschema(
        &json!({ "type": "string", "pattern": "(?=a)b" }),
        &json!({ "type": "string" }),
    )
    .unwrap_err();
    assert!(matches!(err, SubtypeError::Unsupported { .. }));
}

// ── Enums and const ─────────────────────────────────────────────────────────

#[test]
fn test_enum_pointwise_containment() {
    assert!(subtype(json!({ "enum": [1, 2] }), json!({ "type": "integer" })));
    assert!(subtype(
        json!({ "enum": [1, "x"] }),
        json!({ "type": ["integer", "string"] })
    ));
    assert!(!subtype(
        json!({ "enum": [1, "x"] }),
        json!({ "type": "integer" })
    ));
}

#[test]
fn test_enum_within_enum() {
    assert!(subtype(json!({ "enum": [1, 2] }), json!({ "enum": [1, 2, 3] })));
    assert!(!subtype(json!({ "enum": [1, 4] }), json!({ "enum": [1, 2, 3] })));
}

#[test]
fn test_bounded_integers_fit_enum() {
    assert!(subtype(
        json!({ "type": "integer", "minimum": 1, "maximum": 2 }),
        json!({ "enum": [1, 2, 3] })
    ));
    assert!(!subtype(
        json!({ "type": "integer", "minimum": 1, "maximum": 4 }),
        json!({ "enum": [1, 2, 3] })
    ));
    assert!(!subtype(json!({ "type": "integer" }), json!({ "enum": [1, 2] })));
}

#[test]
fn test_const_is_singleton_enum() {
    assert!(subtype(json!({ "const": 5 }), json!({ "enum": [5, 6] })));
    assert!(subtype(json!({ "const": 5 }), json!({ "type": "integer", "minimum": 5 })));
    assert!(!subtype(json!({ "const": 4 }), json!({ "type": "integer", "minimum": 5 })));
}

#[test]
fn test_enum_values_pruned_by_constraints() {
    // Only 2 survives the sibling constraints; it fits the right side.
    assert!(subtype(
        json!({ "type": "integer", "enum": [1, 2, "x"], "minimum": 2 }),
        json!({ "const": 2 })
    ));
}

#[test]
fn test_boolean_enum_covers_domain() {
    assert!(subtype(
        json!({ "type": "boolean" }),
        json!({ "enum": [true, false, "extra"] })
    ));
    assert!(!subtype(json!({ "type": "boolean" }), json!({ "enum": [true] })));
}

// ── Arrays ──────────────────────────────────────────────────────────────────

#[test]
fn test_array_items_covariance() {
    assert!(subtype(
        json!({ "type": "array", "items": { "type": "integer" }, "minItems": 2 }),
        json!({ "type": "array", "items": { "type": "number" } })
    ));
    assert!(!subtype(
        json!({ "type": "array", "items": { "type": "number" } }),
        json!({ "type": "array", "items": { "type": "integer" } })
    ));
}

#[test]
fn test_array_size_bounds() {
    assert!(!subtype(
        json!({ "type": "array", "maxItems": 5 }),
        json!({ "type": "array", "maxItems": 3 })
    ));
    assert!(subtype(
        json!({ "type": "array", "minItems": 2, "maxItems": 3 }),
        json!({ "type": "array", "minItems": 1, "maxItems": 4 })
    ));
}

#[test]
fn test_unique_items_direction() {
    assert!(subtype(
        json!({ "type": "array", "uniqueItems": true }),
        json!({ "type": "array" })
    ));
    assert!(!subtype(
        json!({ "type": "array" }),
        json!({ "type": "array", "uniqueItems": true })
    ));
}

#[test]
fn test_tuple_within_single_items() {
    assert!(subtype(
        json!({
            "type": "array",
            "items": [{ "type": "integer" }, { "type": "integer" }],
            "additionalItems": { "type": "integer" }
        }),
        json!({ "type": "array", "items": { "type": "number" } })
    ));
    assert!(!subtype(
        json!({
            "type": "array",
            "items": [{ "type": "integer" }, { "type": "string" }]
        }),
        json!({ "type": "array", "items": { "type": "number" } })
    ));
}

#[test]
fn test_tuple_against_tuple() {
    assert!(subtype(
        json!({ "type": "array", "items": [{ "type": "integer" }, { "type": "string" }] }),
        json!({ "type": "array", "items": [{ "type": "number" }] })
    ));
    assert!(!subtype(
        json!({ "type": "array", "items": [{ "type": "string" }] }),
        json!({ "type": "array", "items": [{ "type": "number" }] })
    ));
}

#[test]
fn test_closed_tuple_tail_never_reached() {
    // maxItems caps the tuple, so the third position's mismatch is moot.
    assert!(subtype(
        json!({
            "type": "array",
            "items": [{ "type": "integer" }, { "type": "integer" }, { "type": "string" }],
            "maxItems": 2
        }),
        json!({ "type": "array", "items": { "type": "number" } })
    ));
}

// ── Objects ─────────────────────────────────────────────────────────────────

#[test]
fn test_property_covariance_with_required() {
    let a = json!({
        "type": "object",
        "properties": { "x": { "type": "integer" } },
        "required": ["x"]
    });
    let b = json!({ "type": "object", "properties": { "x": { "type": "number" } } });
    assert!(subtype(a, b.clone()));

    // B does not require x, so dropping required keeps the relation.
    let a_optional = json!({ "type": "object", "properties": { "x": { "type": "integer" } } });
    assert!(subtype(a_optional, b));
}

#[test]
fn test_required_must_be_preserved() {
    let unrequired = json!({ "type": "object", "properties": { "x": { "type": "integer" } } });
    let required = json!({
        "type": "object",
        "properties": { "x": { "type": "integer" } },
        "required": ["x"]
    });
    assert!(!subtype(unrequired, required.clone()));
    assert!(subtype(required.clone(), required));
}

#[test]
fn test_open_object_is_not_below_constrained_property() {
    // An open object may carry any `x` at all.
    assert!(!subtype(
        json!({ "type": "object" }),
        json!({ "type": "object", "properties": { "x": { "type": "integer" } } })
    ));
}

#[test]
fn test_closed_object_below_open() {
    assert!(subtype(
        json!({ "type": "object", "additionalProperties": false }),
        json!({ "type": "object" })
    ));
    assert!(!subtype(
        json!({ "type": "object" }),
        json!({ "type": "object", "additionalProperties": false })
    ));
}

#[test]
fn test_additional_properties_covariance() {
    assert!(subtype(
        json!({ "type": "object", "additionalProperties": { "type": "integer" } }),
        json!({ "type": "object", "additionalProperties": { "type": "number" } })
    ));
    assert!(!subtype(
        json!({ "type": "object", "additionalProperties": { "type": "number" } }),
        json!({ "type": "object", "additionalProperties": { "type": "integer" } })
    ));
}

#[test]
fn test_pattern_properties_closure() {
    let a = json!({
        "type": "object",
        "patternProperties": { "^x_": { "type": "integer" } },
        "additionalProperties": false
    });
    let b = json!({
        "type": "object",
        "patternProperties": { "^x_": { "type": "number" } },
        "additionalProperties": false
    });
    assert!(subtype(a.clone(), b.clone()));
    assert!(!subtype(b, a));
}

#[test]
fn test_pattern_names_must_land_somewhere() {
    // Names matching ^x_ escape B's declared surface and B is closed.
    let a = json!({
        "type": "object",
        "patternProperties": { "^x_": { "type": "integer" } },
        "additionalProperties": false
    });
    let closed_elsewhere = json!({
        "type": "object",
        "properties": { "other": {} },
        "additionalProperties": false
    });
    assert!(!subtype(a, closed_elsewhere));
}

#[test]
fn test_declared_name_against_pattern_side() {
    let a = json!({
        "type": "object",
        "properties": { "x_count": { "type": "integer" } },
        "additionalProperties": false
    });
    let b = json!({
        "type": "object",
        "patternProperties": { "^x_": { "type": "number" } },
        "additionalProperties": false
    });
    assert!(subtype(a, b));
}

#[test]
fn test_property_count_bounds() {
    assert!(subtype(
        json!({ "type": "object", "minProperties": 2, "maxProperties": 3 }),
        json!({ "type": "object", "minProperties": 1 })
    ));
    assert!(!subtype(
        json!({ "type": "object", "minProperties": 1 }),
        json!({ "type": "object", "minProperties": 2 })
    ));
}

// ── Combinators ─────────────────────────────────────────────────────────────

#[test]
fn test_allof_conjoins() {
    let a = json!({ "allOf": [{ "type": "number", "minimum": 0 }, { "maximum": 10 }] });
    assert!(subtype(a.clone(), json!({ "type": "number", "maximum": 10 })));
    assert!(subtype(json!({ "type": "number", "minimum": 5, "maximum": 7 }), a));
}

#[test]
fn test_anyof_union() {
    let union = json!({ "anyOf": [{ "type": "integer" }, { "type": "string" }] });
    assert!(subtype(json!({ "type": "integer" }), union.clone()));
    assert!(subtype(union.clone(), json!({ "type": ["integer", "string", "null"] })));
    assert!(!subtype(union, json!({ "type": "integer" })));
}

#[test]
fn test_oneof_treated_as_union() {
    let one = json!({ "oneOf": [{ "type": "integer" }, { "type": "string" }] });
    assert!(subtype(json!({ "type": "string" }), one));
}

#[test]
fn test_not_excludes_a_type() {
    let not_string = json!({ "not": { "type": "string" } });
    assert!(subtype(json!({ "type": "integer" }), not_string.clone()));
    assert!(!subtype(json!({ "type": "string" }), not_string.clone()));
    assert!(!subtype(json!({}), not_string));
}

#[test]
fn test_not_interval_complement() {
    // not(number in [0,10]) accepts numbers above 10.
    let outside = json!({ "type": "number", "not": { "minimum": 0, "maximum": 10 } });
    assert!(subtype(json!({ "type": "number", "minimum": 11 }), outside.clone()));
    assert!(!subtype(json!({ "type": "number", "minimum": 5 }), outside));
}

#[test]
fn test_not_pattern_complement() {
    let not_digits = json!({ "type": "string", "not": { "pattern": "^[0-9]+$" } });
    assert!(subtype(
        json!({ "type": "string", "pattern": "^[a-z]+$", "minLength": 1 }),
        not_digits
    ));
}

// ── $ref and recursion ──────────────────────────────────────────────────────

#[test]
fn test_inlined_ref() {
    let a = json!({
        "properties": { "v": { "$ref": "#/$defs/Int" } },
        "$defs": { "Int": { "type": "integer" } },
        "type": "object"
    });
    let b = json!({
        "type": "object",
        "properties": { "v": { "type": "number" } }
    });
    assert!(subtype(a, b));
}

#[test]
fn test_recursive_tree_subtype() {
    let tree = |value_type: &str| {
        json!({
            "$ref": "#/$defs/Node",
            "$defs": {
                "Node": {
                    "type": "object",
                    "properties": {
                        "value": { "type": value_type },
                        "child": { "$ref": "#/$defs/Node" }
                    },
                    "required": ["value"]
                }
            }
        })
    };
    assert!(subtype(tree("integer"), tree("number")));
    assert!(!subtype(tree("number"), tree("integer")));
    // Reflexive on the recursive schema (coinduction closes the loop).
    assert!(subtype(tree("integer"), tree("integer")));
}

#[test]
fn test_unresolvable_ref_is_an_error() {
    let err = is_subschema(
        &json!({ "$ref": "#/$defs/Ghost" }),
        &json!({ "type": "string" }),
    )
    .unwrap_err();
    assert!(matches!(err, SubtypeError::UnresolvableRef { .. }));
}

// ── Lattice laws on concrete chains ─────────────────────────────────────────

#[test]
fn test_transitivity_chain() {
    let a = json!({ "type": "integer", "minimum": 2, "maximum": 3 });
    let b = json!({ "type": "integer", "minimum": 0, "maximum": 10 });
    let c = json!({ "type": "number" });
    assert!(subtype(a.clone(), b.clone()));
    assert!(subtype(b, c.clone()));
    assert!(subtype(a, c));
}

// ── Tri-valued API ──────────────────────────────────────────────────────────

#[test]
fn test_mixed_negation_is_unknown() {
    // not(multipleOf 3) is an opaque negated atom; pairing it with a plain
    // interval cannot be decided structurally.
    let opaque = json!({ "type": "integer", "not": { "multipleOf": 3 } });
    let plain = json!({ "type": "integer", "minimum": 0 });
    let decision = check_subschema(&opaque, &plain).unwrap();
    assert_eq!(decision, Decision::Unknown);
    // The boolean façade reports the conservative answer.
    assert!(!is_subschema(&opaque, &plain).unwrap());
}

#[test]
fn test_invalid_schema_is_rejected_early() {
    let err = is_subschema(&json!({ "minimum": "zero" }), &json!({})).unwrap_err();
    assert!(matches!(err, SubtypeError::InvalidSchema { .. }));

    let err = is_subschema(&json!({ "type": "float" }), &json!({})).unwrap_err();
    assert!(matches!(err, SubtypeError::InvalidSchema { .. }));
}
