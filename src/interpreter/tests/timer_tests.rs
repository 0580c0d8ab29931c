//! Tests for EVERY/TICK, CANCEL, HALT, SLEEP and ONKEY
//!
//! Timer tests run on tokio's paused clock, so sleeps advance virtual time
//! only.

use std::time::Duration;

use super::helpers::*;
use crate::interpreter::Val;

#[tokio::test(start_paused = true)]
async fn test_every_fires_on_period() {
    let mut harness = Harness::new();
    harness
        .start("SET n TO 0\nEVERY 100\nADD n BY 1\nENDEVERY")
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(350)).await;
    assert_eq!(harness.num("n"), 3.0);

    harness.runtime.stop();
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(harness.num("n"), 3.0);
}

#[tokio::test(start_paused = true)]
async fn test_every_does_not_block_top_level() {
    let mut harness = Harness::new();
    harness
        .start("EVERY 10\nPRINT \"tick\"\nENDEVERY\nPRINT \"after\"")
        .await
        .unwrap();
    assert_eq!(harness.output(), vec!["after"]);
}

#[tokio::test(start_paused = true)]
async fn test_tick_paces_by_frame() {
    let mut harness = Harness::with_frame_interval(10);
    harness
        .start("SET frames TO 0\nTICK 0\nADD frames BY 1\nEND")
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(55)).await;
    assert_eq!(harness.num("frames"), 5.0);

    harness.runtime.stop();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(harness.num("frames"), 5.0);
}

#[tokio::test(start_paused = true)]
async fn test_tick_delay_adds_to_frame() {
    let mut harness = Harness::with_frame_interval(10);
    harness
        .start("SET frames TO 0\nTICK 15\nADD frames BY 1\nEND")
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(harness.num("frames"), 2.0);
}

#[tokio::test(start_paused = true)]
async fn test_timers_share_globals() {
    let mut harness = Harness::new();
    harness
        .start("SET total TO 0\nEVERY 10\nADD total BY 1\nENDEVERY\nEVERY 20\nADD total BY 100\nENDEVERY")
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(45)).await;
    assert_eq!(harness.num("total"), 4.0 + 200.0);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_named_timer_from_its_body() {
    let mut harness = Harness::new();
    harness
        .start("SET n TO 0\nEVERY 10 AS spin\nADD n BY 1\nIF n >= 2 THEN\nCANCEL spin\nENDIF\nENDEVERY")
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(harness.num("n"), 2.0);
    assert!(!harness.runtime.is_halted());
}

#[tokio::test(start_paused = true)]
async fn test_named_timer_replaces_previous() {
    let mut harness = Harness::new();
    harness
        .start(
            "SET a TO 0\nSET b TO 0\n\
             EVERY 10 AS clock\nADD a BY 1\nENDEVERY\n\
             EVERY 10 AS clock\nADD b BY 1\nENDEVERY",
        )
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(55)).await;
    assert_eq!(harness.num("a"), 0.0);
    assert_eq!(harness.num("b"), 5.0);
}

#[tokio::test(start_paused = true)]
async fn test_stop_between_ticks() {
    let mut harness = Harness::with_frame_interval(10);
    harness
        .start("SET frames TO 0\nTICK 90\nADD frames BY 1\nEND")
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(harness.num("frames"), 1.0);

    // Next frame is due at 200ms
    harness.runtime.stop();
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(harness.num("frames"), 1.0);
    assert!(!harness.runtime.context().unwrap().tasks.has_timers());
}

#[tokio::test(start_paused = true)]
async fn test_stop_handle_interrupts_top_level_sleep() {
    let mut harness = Harness::new();
    let stopper = harness.runtime.stop_handle();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        stopper.stop();
    });

    let started = tokio::time::Instant::now();
    harness
        .start("SET a TO 1\nSLEEP 100000\nSET a TO 2")
        .await
        .unwrap();
    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(harness.num("a"), 1.0);
    assert!(harness.runtime.is_halted());
}

#[tokio::test(start_paused = true)]
async fn test_halt_from_program_stops_everything() {
    let mut harness = Harness::new();
    harness
        .start(
            "SET n TO 0\nSET frames TO 0\n\
             TICK 0\nADD frames BY 1\nEND\n\
             EVERY 10\nADD n BY 1\nIF n >= 3 THEN\nHALT\nENDIF\nENDEVERY",
        )
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(harness.num("n"), 3.0);
    assert!(harness.runtime.is_halted());
    let frames = harness.num("frames");

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(harness.num("frames"), frames);
}

#[tokio::test(start_paused = true)]
async fn test_halt_ends_top_level() {
    let harness = run_program("SET a TO 1\nHALT\nSET a TO 2").await;
    assert_eq!(harness.num("a"), 1.0);
    assert!(harness.runtime.is_halted());
}

#[tokio::test(start_paused = true)]
async fn test_sleep_suspends_stream() {
    let mut harness = Harness::new();
    let started = tokio::time::Instant::now();
    harness
        .start("SET a TO 1\nSLEEP 250\nSET a TO 2")
        .await
        .unwrap();
    assert!(started.elapsed() >= Duration::from_millis(250));
    assert_eq!(harness.num("a"), 2.0);
}

#[tokio::test(start_paused = true)]
async fn test_sleep_in_loop_lets_top_level_continue() {
    let mut harness = Harness::new();
    harness
        .start("SET n TO 0\nWHILE n < 3\nSLEEP 100\nADD n BY 1\nENDWHILE\nSET after TO true")
        .await
        .unwrap();
    assert_eq!(harness.get("after"), Val::Bool(true));
    assert_eq!(harness.num("n"), 0.0);

    harness.runtime.settle().await.unwrap();
    assert_eq!(harness.num("n"), 3.0);
}

#[tokio::test(start_paused = true)]
async fn test_stop_wakes_sleeping_loop() {
    let mut harness = Harness::new();
    harness
        .start("SET n TO 0\nWHILE true\nSLEEP 1000000\nADD n BY 1\nENDWHILE")
        .await
        .unwrap();
    let_tasks_run().await;
    harness.runtime.stop();
    harness.runtime.settle().await.unwrap();
    assert_eq!(harness.num("n"), 0.0);
}

#[tokio::test]
async fn test_onkey_runs_on_edges() {
    let mut harness = Harness::new();
    harness
        .start("SET downs TO 0\nSET ups TO 0\nONKEY DOWN \"ArrowUp\" ADD downs BY 1\nONKEY UP \"ArrowUp\" ADD ups BY 1")
        .await
        .unwrap();

    harness.keyboard.press("ArrowUp");
    harness.keyboard.press("ArrowUp");
    let_tasks_run().await;
    assert_eq!(harness.num("downs"), 1.0);
    assert_eq!(harness.num("ups"), 0.0);

    harness.keyboard.release("ArrowUp");
    harness.keyboard.press("ArrowDown");
    let_tasks_run().await;
    assert_eq!(harness.num("downs"), 1.0);
    assert_eq!(harness.num("ups"), 1.0);
}

#[tokio::test]
async fn test_failing_key_handler_keeps_listening() {
    let mut harness = Harness::new();
    harness
        .start("SET n TO 0\nONKEY DOWN \"x\" ADD n BY missing")
        .await
        .unwrap();

    harness.keyboard.press("x");
    let_tasks_run().await;
    harness.runtime.context().unwrap().globals.set("missing", Val::Num(1.0)).unwrap();
    harness.keyboard.release("x");
    harness.keyboard.press("x");
    let_tasks_run().await;

    assert_eq!(harness.num("n"), 1.0);
    assert!(harness.runtime.settle().await.is_err());
}
