//! Integration tests for semantic-type reasoning through a resolver.

use json_subschema_core::{
    Comparator, Decision, GraphResolver, NullResolver, SubtypeError,
};
use serde_json::json;

fn qudt() -> Comparator<GraphResolver> {
    let resolver = GraphResolver::builder("qudt-test")
        .prefix("quantitykind", "http://qudt.org/vocab/quantitykind/")
        .broader(
            "quantitykind:ThermodynamicTemperature",
            "quantitykind:Temperature",
        )
        .broader("quantitykind:Temperature", "quantitykind:Quantity")
        .build()
        .unwrap();
    Comparator::with_resolver(resolver)
}

#[test]
fn test_broader_concept_subsumes() {
    let cmp = qudt();
    let thermo = json!({ "type": "number", "stype": "quantitykind:ThermodynamicTemperature" });
    let temp = json!({ "type": "number", "stype": "quantitykind:Temperature" });
    assert!(cmp.is_subschema(&thermo, &temp).unwrap());
    assert!(!cmp.is_subschema(&temp, &thermo).unwrap());
}

#[test]
fn test_transitive_subsumption() {
    let cmp = qudt();
    let thermo = json!({ "type": "number", "stype": "quantitykind:ThermodynamicTemperature" });
    let quantity = json!({ "type": "number", "stype": "quantitykind:Quantity" });
    assert!(cmp.is_subschema(&thermo, &quantity).unwrap());
}

#[test]
fn test_absent_stype_on_right_is_top_concept() {
    let cmp = qudt();
    let annotated = json!({ "type": "number", "stype": "quantitykind:Temperature" });
    let plain = json!({ "type": "number" });
    assert!(cmp.is_subschema(&annotated, &plain).unwrap());
    // An unannotated schema proves nothing against a required concept.
    assert!(!cmp.is_subschema(&plain, &annotated).unwrap());
}

#[test]
fn test_structural_constraints_still_apply() {
    let cmp = qudt();
    let narrow = json!({
        "type": "number", "minimum": 0,
        "stype": "quantitykind:ThermodynamicTemperature"
    });
    let wide = json!({ "type": "number", "stype": "quantitykind:Temperature" });
    let too_narrow = json!({
        "type": "number", "minimum": 10,
        "stype": "quantitykind:Temperature"
    });
    assert!(cmp.is_subschema(&narrow, &wide).unwrap());
    // Concept subsumption cannot rescue a failed interval check.
    assert!(!cmp.is_subschema(&narrow, &too_narrow).unwrap());
}

#[test]
fn test_unknown_concepts_are_tri_valued() {
    let cmp = qudt();
    let a = json!({ "type": "number", "stype": "http://example.com/vocab/Alien" });
    let b = json!({ "type": "number", "stype": "http://example.com/vocab/Other" });
    assert_eq!(cmp.check_subschema(&a, &b).unwrap(), Decision::Unknown);
    // The boolean façade answers conservatively.
    assert!(!cmp.is_subschema(&a, &b).unwrap());
    // Identical unknown concepts are still reflexively related.
    assert!(cmp.is_subschema(&a, &a).unwrap());
}

#[test]
fn test_null_resolver_is_reflexive_only() {
    let cmp = Comparator::with_resolver(NullResolver);
    let a = json!({ "type": "number", "stype": "http://example.com/vocab/A" });
    let b = json!({ "type": "number", "stype": "http://example.com/vocab/B" });
    assert!(cmp.is_subschema(&a, &a).unwrap());
    assert!(!cmp.is_subschema(&a, &b).unwrap());
}

#[test]
fn test_null_resolver_rejects_unbound_prefix() {
    let cmp = Comparator::new();
    let err = cmp
        .is_subschema(&json!({ "stype": "quantitykind:Temperature" }), &json!({}))
        .unwrap_err();
    assert!(matches!(err, SubtypeError::InvalidSchema { .. }));
}

#[test]
fn test_stype_without_type_constrains_all_base_types() {
    let cmp = qudt();
    let concept = json!({ "stype": "quantitykind:Temperature" });
    let number = json!({ "type": "number", "stype": "quantitykind:Temperature" });
    // A typed annotated schema is below the untyped annotated one.
    assert!(cmp.is_subschema(&number, &concept).unwrap());
    // The annotation still binds: an unannotated number is not below it.
    assert!(!cmp.is_subschema(&json!({ "type": "number" }), &concept).unwrap());
}

#[test]
fn test_join_keeps_broader_concept() {
    let cmp = qudt();
    let thermo = json!({ "type": "number", "stype": "quantitykind:ThermodynamicTemperature" });
    let temp = json!({ "type": "number", "stype": "quantitykind:Temperature" });
    let j = cmp.join(&thermo, &temp).unwrap();
    assert!(cmp.is_equivalent(&j, &temp).unwrap());
}

#[test]
fn test_meet_keeps_narrower_concept() {
    let cmp = qudt();
    let thermo = json!({ "type": "number", "stype": "quantitykind:ThermodynamicTemperature" });
    let temp = json!({ "type": "number", "stype": "quantitykind:Temperature" });
    let m = cmp.meet(&thermo, &temp).unwrap();
    assert!(cmp.is_equivalent(&m, &thermo).unwrap());
}

#[test]
fn test_backward_compatibility_without_stype() {
    // On stype-free schemas an ontology-backed comparator answers exactly
    // like the structural default.
    let semantic = qudt();
    let structural = Comparator::new();
    let cases = [
        (json!({ "type": "integer" }), json!({ "type": "number" })),
        (
            json!({ "type": "string", "pattern": "^a+$" }),
            json!({ "type": "string" }),
        ),
        (json!({ "enum": [1, 2] }), json!({ "type": "string" })),
    ];
    for (a, b) in cases {
        assert_eq!(
            semantic.is_subschema(&a, &b).unwrap(),
            structural.is_subschema(&a, &b).unwrap(),
        );
    }
}

#[test]
fn test_semantic_enum_pointwise_respects_annotation() {
    let cmp = qudt();
    let annotated_enum = json!({
        "type": "number",
        "enum": [1, 2],
        "stype": "quantitykind:ThermodynamicTemperature"
    });
    let temp = json!({ "type": "number", "stype": "quantitykind:Temperature" });
    let unrelated = json!({ "type": "number", "stype": "quantitykind:Quantity" });
    assert!(cmp.is_subschema(&annotated_enum, &temp).unwrap());
    assert!(cmp.is_subschema(&annotated_enum, &unrelated).unwrap());
    // Reverse direction fails: Temperature is not below ThermodynamicTemperature.
    let reversed = json!({ "type": "number", "enum": [1], "stype": "quantitykind:Temperature" });
    let thermo = json!({ "type": "number", "stype": "quantitykind:ThermodynamicTemperature" });
    assert!(!cmp.is_subschema(&reversed, &thermo).unwrap());
}
