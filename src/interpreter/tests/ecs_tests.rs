//! Tests for ENTITY NEW and COMP SET/GET/HAS/DEL

use super::helpers::*;
use crate::interpreter::{RuntimeError, Val};
use maplit::hashmap;

#[tokio::test]
async fn test_entity_ids_strictly_increase() {
    let harness = run_program("ENTITY NEW INTO a\nENTITY NEW INTO b\nENTITY NEW INTO c").await;
    let (a, b, c) = (harness.num("a"), harness.num("b"), harness.num("c"));
    assert!(a < b && b < c, "ids {} {} {}", a, b, c);
}

#[tokio::test]
async fn test_component_round_trip() {
    let harness = run_program(
        "ENTITY NEW INTO e\n\
         COMP SET e pos {\"x\": 1, \"y\": 2}\n\
         COMP SET e hp 10\n\
         COMP GET e pos INTO pos\n\
         COMP GET e hp INTO hp\n\
         COMP HAS e pos INTO has_pos\n\
         COMP HAS e vel INTO has_vel",
    )
    .await;
    assert_eq!(
        harness.get("pos"),
        Val::Obj(hashmap! {
            "x".to_string() => Val::Num(1.0),
            "y".to_string() => Val::Num(2.0),
        })
    );
    assert_eq!(harness.num("hp"), 10.0);
    assert_eq!(harness.get("has_pos"), Val::Bool(true));
    assert_eq!(harness.get("has_vel"), Val::Bool(false));
}

#[tokio::test]
async fn test_value_falls_back_to_expression() {
    let harness = run_program("SET speed TO 3\nENTITY NEW INTO e\nCOMP SET e vel speed * 2\nCOMP GET e vel INTO v").await;
    assert_eq!(harness.num("v"), 6.0);
}

#[tokio::test]
async fn test_delete_then_has_is_false() {
    let harness = run_program(
        "ENTITY NEW INTO e\n\
         COMP SET e tag true\n\
         COMP DEL e tag\n\
         COMP HAS e tag INTO has\n\
         COMP GET e tag INTO value",
    )
    .await;
    assert_eq!(harness.get("has"), Val::Bool(false));
    assert_eq!(harness.get("value"), Val::Null);
}

#[tokio::test]
async fn test_literal_entity_ids() {
    let harness = run_program("ENTITY NEW INTO e\nCOMP SET 1 name \"first\"\nCOMP GET e name INTO n").await;
    assert_eq!(harness.num("e"), 1.0);
    assert_eq!(harness.get("n"), Val::Str("first".into()));
}

#[tokio::test]
async fn test_entities_are_per_run() {
    let mut harness = Harness::new();
    harness.run("ENTITY NEW INTO a\nENTITY NEW INTO b").await.unwrap();
    assert_eq!(harness.num("b"), 2.0);
    harness.run("ENTITY NEW INTO a").await.unwrap();
    assert_eq!(harness.num("a"), 1.0);
}

#[tokio::test]
async fn test_non_entity_variable_fails() {
    let (_, err) = run_failing("SET e TO \"hero\"\nCOMP SET e hp 1").await;
    assert!(matches!(err, RuntimeError::TypeMismatch { .. }));
}
