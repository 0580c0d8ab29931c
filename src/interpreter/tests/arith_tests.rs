//! Tests for ADD/SUB/MUL/DIV/MOD, RANDOM and MATH

use super::helpers::*;
use crate::interpreter::{RuntimeError, Val};

#[tokio::test]
async fn test_add_then_sub() {
    let harness = run_program("SET x TO 10\nADD x BY 5\nSUB x BY 3").await;
    assert_eq!(harness.num("x"), 12.0);
}

#[tokio::test]
async fn test_mul_div_mod() {
    let harness = run_program(
        "SET a TO 6\nMUL a BY 7\n\
         SET b TO 9\nDIV b BY 2\n\
         SET c TO 17\nMOD c BY 5",
    )
    .await;
    assert_eq!(harness.num("a"), 42.0);
    assert_eq!(harness.num("b"), 4.5);
    assert_eq!(harness.num("c"), 2.0);
}

#[tokio::test]
async fn test_amount_is_an_expression() {
    let harness = run_program("SET step TO 2\nSET x TO 1\nADD x BY step * 10 + 1").await;
    assert_eq!(harness.num("x"), 22.0);
}

#[tokio::test]
async fn test_division_by_zero_follows_ieee() {
    let harness = run_program("SET a TO 1\nDIV a BY 0\nSET b TO -1\nDIV b BY 0\nSET c TO 5\nMOD c BY 0").await;
    assert_eq!(harness.num("a"), f64::INFINITY);
    assert_eq!(harness.num("b"), f64::NEG_INFINITY);
    assert!(harness.num("c").is_nan());
}

#[tokio::test]
async fn test_add_concatenates_strings() {
    let harness = run_program("SET s TO \"score: \"\nADD s BY 10").await;
    assert_eq!(harness.get("s"), Val::Str("score: 10".into()));
}

#[tokio::test]
async fn test_arith_on_undefined_name_fails() {
    let (_, err) = run_failing("ADD nope BY 1").await;
    match err {
        RuntimeError::UndefinedName { name } => assert_eq!(name, "nope"),
        other => panic!("Expected UndefinedName, got {:?}", other),
    }
}

#[tokio::test]
async fn test_sub_on_string_fails() {
    let (harness, err) = run_failing("SET s TO \"a\"\nSUB s BY 1").await;
    assert!(matches!(err, RuntimeError::TypeMismatch { .. }));
    assert_eq!(harness.get("s"), Val::Str("a".into()));
}

#[tokio::test]
async fn test_random_between_stays_in_range() {
    let harness = run_program(
        "SET ok TO 0\n\
         FOR i FROM 1 TO 50\n\
         RANDOM BETWEEN 3 5 INTO r\n\
         IF r >= 3 && r < 5 THEN\n\
         ADD ok BY 1\n\
         ENDIF\n\
         ENDFOR",
    )
    .await;
    assert_eq!(harness.num("ok"), 50.0);
}

#[tokio::test]
async fn test_math_statement() {
    let harness = run_program(
        "SET x TO 16\n\
         MATH sqrt x INTO root\n\
         MATH floor 2.7 INTO down\n\
         MATH abs 0 - 5 INTO dist",
    )
    .await;
    assert_eq!(harness.num("root"), 4.0);
    assert_eq!(harness.num("down"), 2.0);
    assert_eq!(harness.num("dist"), 5.0);
}

#[tokio::test]
async fn test_math_unknown_function_is_bad_expression() {
    let (_, err) = run_failing("MATH frobnicate 1 INTO x").await;
    assert!(matches!(err, RuntimeError::BadExpression { .. }));
}
