//! Tests for error propagation

use super::helpers::*;
use crate::interpreter::expressions::ExprError;
use crate::interpreter::RuntimeError;

#[tokio::test]
async fn test_unknown_statement_carries_line() {
    let (_, err) = run_failing("SET a TO 1\n  DANCE wildly  ").await;
    match err {
        RuntimeError::UnknownStatement { line } => assert_eq!(line, "DANCE wildly"),
        other => panic!("Expected UnknownStatement, got {:?}", other),
    }
}

#[tokio::test]
async fn test_error_aborts_the_stream() {
    let (harness, err) = run_failing("SET a TO 1\nPRINT nope\nSET a TO 2").await;
    assert!(matches!(err, RuntimeError::BadExpression { .. }));
    assert_eq!(harness.num("a"), 1.0);
}

#[tokio::test]
async fn test_bad_expression_wraps_cause() {
    let (_, err) = run_failing("SET a TO 1 +").await;
    match err {
        RuntimeError::BadExpression { expr, source } => {
            assert_eq!(expr, "1 +");
            assert!(matches!(source, ExprError::Syntax(_)));
        }
        other => panic!("Expected BadExpression, got {:?}", other),
    }

    let (_, err) = run_failing("SET a TO ghost + 1").await;
    match err {
        RuntimeError::BadExpression { source, .. } => {
            assert_eq!(source, ExprError::UndefinedName("ghost".into()));
        }
        other => panic!("Expected BadExpression, got {:?}", other),
    }
}

#[tokio::test]
async fn test_error_messages() {
    let (_, err) = run_failing("CALL nowhere()").await;
    assert_eq!(err.to_string(), "No such function: nowhere");

    let (_, err) = run_failing("FOR i FROM 0 TO 3").await;
    assert_eq!(err.to_string(), "Unterminated FOR block: FOR i FROM 0 TO 3");
}

#[tokio::test]
async fn test_canvas_size_needs_surface() {
    let mut harness = Harness::new();
    let err = harness
        .runtime
        .start("CANVAS SIZE 320 240", None)
        .await
        .unwrap_err();
    assert!(matches!(err, RuntimeError::MissingSurface));
}

#[tokio::test]
async fn test_drawing_without_surface_is_a_no_op() {
    let mut harness = Harness::new();
    harness
        .runtime
        .start("COLOR \"red\"\nRECT 0 0 10 10\nCLEAR\nSET done TO true", None)
        .await
        .unwrap();
    assert!(harness.surface.ops().is_empty());
}

#[tokio::test]
async fn test_unterminated_block_inside_loop_body() {
    // ENDWHILE closes the loop before the FOR finds its ENDFOR
    let mut harness = Harness::new();
    harness
        .start("SET n TO 0\nWHILE n < 1\nADD n BY 1\nFOR i FROM 0 TO 1\nENDWHILE\nENDFOR")
        .await
        .unwrap();
    let err = harness.runtime.settle().await.unwrap_err();
    match err {
        RuntimeError::UnterminatedBlock { keyword, .. } => assert_eq!(keyword, "FOR"),
        other => panic!("Expected UnterminatedBlock, got {:?}", other),
    }
}

#[tokio::test]
async fn test_new_run_resets_state() {
    let mut harness = Harness::new();
    harness.run("SET a TO 1\nFUNCTION f()\nENDFN").await.unwrap();
    harness.run("SET b TO 2").await.unwrap();
    assert!(harness.runtime.get("a").is_none());

    let err = harness.run("CALL f()").await.unwrap_err();
    assert!(matches!(err, RuntimeError::UndefinedFunction { .. }));
}

#[tokio::test]
async fn test_start_halts_previous_run() {
    let mut harness = Harness::new();
    harness
        .start("SET n TO 0\nWHILE true\nADD n BY 1\nENDWHILE")
        .await
        .unwrap();
    let first = harness.runtime.context().unwrap().clone();

    harness.start("SET m TO 1").await.unwrap();
    assert!(first.is_halted());
    assert!(!harness.runtime.is_halted());
    assert_eq!(first.tasks.live(), 0);
}
