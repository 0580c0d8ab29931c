//! Block scheduling
//!
//! When a block header runs, the stream hands the block to `enter_block`,
//! which resolves its extent, moves the stream's cursor past it and decides
//! what happens to the body:
//!
//! - IF: nothing is spawned; a false condition moves the cursor to the
//!   ELSE branch or past ENDIF.
//! - WHILE/FOR: a loop task is spawned. The header's stream continues after
//!   the terminator right away; the loop yields after every body pass.
//! - FUNCTION: the body is registered in the function table.
//! - EVERY/TICK: a timer task is spawned on the global scope.
//!
//! Every spawned task is registered in the run's `TaskSet` so `halt` can
//! abort all of them at once.

use std::future::Future;
use std::ops::Range;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, warn, Instrument};

use super::blocks::{find_branch, find_end, BlockKind, Branch};
use super::errors::RuntimeError;
use super::exec_loop::{run_range, Stream, StreamKind};
use super::functions::FunctionDef;
use super::runtime::RunContext;
use super::types::{Block, Cursor, Flow, KeyPhase, Program, Val};

/* ===================== Task Set ===================== */

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    While,
    For,
    Every,
    Tick,
    /// One EVERY trigger
    Trigger,
    KeyHandler,
}

impl TaskKind {
    /// Loops end on their own; everything else runs until cancelled
    pub fn is_finite(self) -> bool {
        matches!(self, TaskKind::While | TaskKind::For)
    }
}

#[derive(Debug)]
struct TaskEntry {
    id: u64,
    kind: TaskKind,
    name: Option<String>,
    handle: JoinHandle<()>,
}

/// Live tasks of one run
#[derive(Debug, Default)]
pub struct TaskSet {
    next_id: AtomicU64,
    entries: Mutex<Vec<TaskEntry>>,
}

impl TaskSet {
    fn entries(&self) -> MutexGuard<'_, Vec<TaskEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Track a spawned task; finished entries are dropped on the way
    pub fn register(&self, kind: TaskKind, name: Option<String>, handle: JoinHandle<()>) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut entries = self.entries();
        entries.retain(|e| !e.handle.is_finished());
        entries.push(TaskEntry {
            id,
            kind,
            name,
            handle,
        });
        id
    }

    /// Abort the timer registered under `name`; false if there is none
    pub fn cancel_named(&self, name: &str) -> bool {
        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|e| {
            let matches = e.name.as_deref() == Some(name);
            if matches {
                e.handle.abort();
            }
            !matches
        });
        entries.len() != before
    }

    /// Abort everything; returns how many tasks were still running
    pub fn abort_all(&self) -> usize {
        let entries = std::mem::take(&mut *self.entries());
        let mut running = 0;
        for entry in entries {
            if !entry.handle.is_finished() {
                running += 1;
            }
            entry.handle.abort();
        }
        running
    }

    /// Remove and return the handles of all WHILE/FOR tasks
    pub fn take_finite(&self) -> Vec<JoinHandle<()>> {
        let mut entries = self.entries();
        let (finite, rest): (Vec<_>, Vec<_>) =
            entries.drain(..).partition(|e| e.kind.is_finite());
        *entries = rest;
        finite.into_iter().map(|e| e.handle).collect()
    }

    /// Number of tasks that have not finished yet
    pub fn live(&self) -> usize {
        let mut entries = self.entries();
        entries.retain(|e| !e.handle.is_finished());
        entries.len()
    }

    /// Whether any EVERY/TICK/ONKEY task is still running
    pub fn has_timers(&self) -> bool {
        self.entries()
            .iter()
            .any(|e| !e.kind.is_finite() && e.kind != TaskKind::Trigger && !e.handle.is_finished())
    }
}

/// Spawn a background stream on the run's span and register it
///
/// An error ends the task; it is logged and recorded on the run.
fn spawn_task<F>(ctx: &Arc<RunContext>, kind: TaskKind, name: Option<String>, stream: F)
where
    F: Future<Output = Result<(), RuntimeError>> + Send + 'static,
{
    let run = ctx.clone();
    let task = async move {
        match stream.await {
            Ok(()) => debug!(?kind, "task finished"),
            Err(err) => {
                warn!(?kind, error = %err, "background stream failed");
                run.record_failure(err);
            }
        }
    };

    let handle = tokio::spawn(task.instrument(ctx.span.clone()));
    if ctx.is_halted() {
        handle.abort();
        return;
    }
    let id = ctx.tasks.register(kind, name, handle);
    debug!(?kind, id, "task spawned");
}

/* ===================== Block Entry ===================== */

/// Resolve the block opened at `header` and schedule its body
pub fn enter_block(
    stream: &Stream,
    block: Block,
    header: usize,
    cursor: &mut Cursor,
) -> Result<(), RuntimeError> {
    let program = &stream.program;
    let limit = cursor.end();

    match block {
        Block::If { taken } => {
            // Resolved even when taken so a missing ENDIF is always reported
            let branch = find_branch(program, header, limit)?;
            if !taken {
                let (Branch::Else(at) | Branch::EndIf(at)) = branch;
                cursor.jump_to(at + 1);
            }
        }
        Block::While { cond } => {
            let end = find_end(program, header, limit, BlockKind::While)?;
            cursor.jump_to(end + 1);
            let body = header + 1..end;
            debug!(header = header + 1, end = end + 1, "while resolved");
            spawn_task(
                &stream.ctx,
                TaskKind::While,
                None,
                drive_while(stream.fork(StreamKind::Loop), cond, body),
            );
        }
        Block::For {
            var,
            from,
            to,
            step,
        } => {
            let end = find_end(program, header, limit, BlockKind::For)?;
            cursor.jump_to(end + 1);
            stream.scope.set(&var, Val::Num(from))?;
            let body = header + 1..end;
            spawn_task(
                &stream.ctx,
                TaskKind::For,
                None,
                drive_for(stream.fork(StreamKind::Loop), var, to, step, body),
            );
        }
        Block::Function { name, params } => {
            let end = find_end(program, header, limit, BlockKind::Function)?;
            cursor.jump_to(end + 1);
            stream.ctx.functions.define(FunctionDef {
                name,
                params,
                body: header + 1..end,
                program: program.clone(),
            });
        }
        Block::Every { period, name } => {
            let end = find_end(program, header, limit, BlockKind::Every)?;
            cursor.jump_to(end + 1);
            let timer = timer_stream(stream);
            replace_named(&stream.ctx, name.as_deref());
            spawn_task(
                &stream.ctx,
                TaskKind::Every,
                name,
                drive_every(timer, period, header + 1..end),
            );
        }
        Block::Tick { delay, name } => {
            let end = find_end(program, header, limit, BlockKind::Tick)?;
            cursor.jump_to(end + 1);
            let timer = timer_stream(stream);
            replace_named(&stream.ctx, name.as_deref());
            spawn_task(
                &stream.ctx,
                TaskKind::Tick,
                name,
                drive_tick(timer, delay, header + 1..end),
            );
        }
    }
    Ok(())
}

/// Timer bodies always run against the global scope
fn timer_stream(stream: &Stream) -> Stream {
    Stream {
        ctx: stream.ctx.clone(),
        program: stream.program.clone(),
        scope: stream.ctx.globals.clone(),
        kind: StreamKind::Timer,
    }
}

/// A named timer replaces an earlier timer of the same name
fn replace_named(ctx: &RunContext, name: Option<&str>) {
    if let Some(name) = name {
        if ctx.tasks.cancel_named(name) {
            debug!(timer = name, "replaced named timer");
        }
    }
}

/* ===================== Drivers ===================== */

async fn drive_while(stream: Stream, cond: String, body: Range<usize>) -> Result<(), RuntimeError> {
    loop {
        if stream.ctx.is_halted() {
            return Ok(());
        }
        let keep_going = {
            let _gate = stream.ctx.statement_gate();
            super::statements::evaluate(&stream, &cond)?.is_truthy()
        };
        if !keep_going {
            return Ok(());
        }
        if run_range(&stream, body.clone()).await? == Flow::Halted {
            return Ok(());
        }
        tokio::task::yield_now().await;
    }
}

/// Counts up while `var <= to` (or down while `var >= to` for a negative
/// step). The variable is read back every pass, so the body may move it.
async fn drive_for(
    stream: Stream,
    var: String,
    to: f64,
    step: f64,
    body: Range<usize>,
) -> Result<(), RuntimeError> {
    loop {
        if stream.ctx.is_halted() {
            return Ok(());
        }
        let in_range = {
            let _gate = stream.ctx.statement_gate();
            let current = stream.scope.get(&var)?.to_number();
            if step >= 0.0 { current <= to } else { current >= to }
        };
        if !in_range {
            return Ok(());
        }
        if run_range(&stream, body.clone()).await? == Flow::Halted {
            return Ok(());
        }
        {
            let _gate = stream.ctx.statement_gate();
            let next = stream.scope.get(&var)?.to_number() + step;
            stream.scope.set(&var, Val::Num(next))?;
        }
        tokio::task::yield_now().await;
    }
}

/// Fixed-period trigger; each trigger is its own task and overlapping
/// triggers are neither queued nor merged
async fn drive_every(stream: Stream, period: Duration, body: Range<usize>) -> Result<(), RuntimeError> {
    let period = period.max(Duration::from_millis(1));
    let mut ticks = interval_at(Instant::now() + period, period);
    ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = stream.ctx.cancelled() => return Ok(()),
            _ = ticks.tick() => {}
        }
        if stream.ctx.is_halted() {
            return Ok(());
        }
        let trigger = stream.clone();
        let body = body.clone();
        spawn_task(&stream.ctx, TaskKind::Trigger, None, async move {
            run_range(&trigger, body).await.map(|_| ())
        });
    }
}

/// Chained frame driver: wait one frame plus the delay, run the body, repeat
async fn drive_tick(stream: Stream, delay: Duration, body: Range<usize>) -> Result<(), RuntimeError> {
    let wait = stream.ctx.settings.frame_interval + delay;
    loop {
        tokio::select! {
            _ = stream.ctx.cancelled() => return Ok(()),
            _ = tokio::time::sleep(wait) => {}
        }
        if stream.ctx.is_halted() {
            return Ok(());
        }
        if run_range(&stream, body.clone()).await? == Flow::Halted {
            return Ok(());
        }
    }
}

/* ===================== Key Handlers ===================== */

/// Run `stmt` as a one-line program on every matching key edge
///
/// A failing handler is recorded and keeps listening. Hosts without key
/// events make this a no-op.
pub fn spawn_key_handler(stream: &Stream, phase: KeyPhase, key: String, stmt: String) {
    let Some(mut events) = stream.ctx.host.keyboard.subscribe() else {
        debug!(key = %key, "keyboard has no events; ONKEY ignored");
        return;
    };

    let handler = Stream {
        ctx: stream.ctx.clone(),
        program: Arc::new(Program::single(&stmt)),
        scope: stream.ctx.globals.clone(),
        kind: StreamKind::Handler,
    };

    spawn_task(&stream.ctx, TaskKind::KeyHandler, None, async move {
        loop {
            let event = tokio::select! {
                _ = handler.ctx.cancelled() => return Ok(()),
                event = events.recv() => event,
            };
            match event {
                Ok(event) if event.phase == phase && event.key == key => {
                    let lines = 0..handler.program.len();
                    if let Err(err) = run_range(&handler, lines).await {
                        warn!(key = %key, error = %err, "key handler failed");
                        handler.ctx.record_failure(err);
                    }
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "key handler fell behind");
                }
                Err(RecvError::Closed) => return Ok(()),
            }
        }
    });
}
