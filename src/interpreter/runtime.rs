//! Run lifecycle
//!
//! `Runtime` is what an embedder holds. Each `start` builds a fresh
//! `RunContext` (variables, functions, entities, live tasks, halted flag)
//! and tears the previous one down first. Nothing about a run lives in
//! global state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use tracing::{info, info_span, warn, Instrument, Span};
use uuid::Uuid;

use super::ecs::EntityStore;
use super::environment::Scope;
use super::errors::RuntimeError;
use super::exec_loop::{run_range, Stream, StreamKind};
use super::functions::FunctionTable;
use super::scheduler::TaskSet;
use super::types::{Flow, Program, Val};
use crate::host::{Host, Surface};

pub const DEFAULT_COLOR: &str = "#fff";

/// Per-runtime settings copied into every run
#[derive(Debug, Clone)]
pub struct RuntimeSettings {
    pub frame_interval: Duration,
    pub trace: bool,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            frame_interval: Duration::from_millis(16),
            trace: false,
        }
    }
}

/* ===================== Run Context ===================== */

/// All state of one run, shared by every stream of that run
pub struct RunContext {
    pub id: Uuid,
    pub program: Arc<Program>,
    pub globals: Arc<Scope>,
    pub functions: FunctionTable,
    pub entities: Mutex<EntityStore>,
    pub tasks: TaskSet,
    pub surface: Option<Arc<dyn Surface>>,
    pub host: Host,
    pub settings: RuntimeSettings,
    pub span: Span,
    halted: AtomicBool,
    cancel: CancellationToken,
    gate: Mutex<()>,
    trace: AtomicBool,
    color: Mutex<String>,
    failures: Mutex<Vec<RuntimeError>>,
}

impl RunContext {
    fn new(
        program: Program,
        host: Host,
        settings: RuntimeSettings,
        surface: Option<Arc<dyn Surface>>,
    ) -> Self {
        let id = Uuid::new_v4();
        let span = info_span!("run", run_id = %id);
        Self {
            id,
            program: Arc::new(program),
            globals: Scope::global(),
            functions: FunctionTable::default(),
            entities: Mutex::new(EntityStore::new()),
            tasks: TaskSet::default(),
            surface,
            host,
            trace: AtomicBool::new(settings.trace),
            settings,
            span,
            halted: AtomicBool::new(false),
            cancel: CancellationToken::new(),
            gate: Mutex::new(()),
            color: Mutex::new(DEFAULT_COLOR.to_string()),
            failures: Mutex::default(),
        }
    }

    /// Stop every stream of this run
    ///
    /// Sets the halted flag, wakes every timer and sleep, and aborts all
    /// registered tasks. Idempotent.
    pub fn halt(&self) {
        if self.halted.swap(true, Ordering::SeqCst) {
            return;
        }
        self.cancel.cancel();
        let aborted = self.tasks.abort_all();
        info!(parent: &self.span, aborted, "run halted");
    }

    pub fn is_halted(&self) -> bool {
        self.halted.load(Ordering::SeqCst)
    }

    /// Resolves once the run is halted
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.cancel.cancelled()
    }

    /// Sleep that ends early when the run is halted
    pub async fn sleep(&self, duration: Duration) {
        tokio::select! {
            _ = tokio::time::sleep(duration) => {}
            _ = self.cancel.cancelled() => {}
        }
    }

    /// Held for the whole of one statement
    ///
    /// Streams may sit on different worker threads; the gate keeps their
    /// statements from interleaving. Never held across an await.
    pub fn statement_gate(&self) -> MutexGuard<'_, ()> {
        self.gate.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn trace_enabled(&self) -> bool {
        self.trace.load(Ordering::Relaxed)
    }

    pub fn set_trace(&self, on: bool) {
        self.trace.store(on, Ordering::Relaxed);
    }

    pub fn color(&self) -> String {
        self.color
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_color(&self, color: String) {
        *self.color.lock().unwrap_or_else(PoisonError::into_inner) = color;
    }

    pub fn entities(&self) -> MutexGuard<'_, EntityStore> {
        self.entities.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn output(&self, text: &str) {
        self.host.output.write(text);
    }

    /// Keep a background stream's error for `Runtime::settle`
    pub fn record_failure(&self, err: RuntimeError) {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(err);
    }

    pub fn take_failures(&self) -> Vec<RuntimeError> {
        std::mem::take(&mut *self.failures.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl std::fmt::Debug for RunContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunContext")
            .field("id", &self.id)
            .field("halted", &self.is_halted())
            .field("lines", &self.program.len())
            .finish_non_exhaustive()
    }
}

/* ===================== Stop Handle ===================== */

/// Halts the current run of a `Runtime` from outside it
///
/// Usable while `start` is still running the top level, e.g. from a
/// timeout task or a signal handler.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    run: Arc<Mutex<Option<Arc<RunContext>>>>,
}

impl StopHandle {
    fn attach(&self, ctx: Arc<RunContext>) {
        *self.run.lock().unwrap_or_else(PoisonError::into_inner) = Some(ctx);
    }

    /// Halt the run that is current right now; no-op before the first start
    pub fn stop(&self) {
        let current = self.run.lock().unwrap_or_else(PoisonError::into_inner).clone();
        if let Some(ctx) = current {
            ctx.halt();
        }
    }
}

/* ===================== Runtime ===================== */

#[derive(Debug)]
pub struct Runtime {
    host: Host,
    settings: RuntimeSettings,
    current: Option<Arc<RunContext>>,
    stopper: StopHandle,
}

impl Runtime {
    pub fn new(host: Host, settings: RuntimeSettings) -> Self {
        Self {
            host,
            settings,
            current: None,
            stopper: StopHandle::default(),
        }
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stopper.clone()
    }

    pub fn host(&self) -> &Host {
        &self.host
    }

    pub fn settings(&self) -> &RuntimeSettings {
        &self.settings
    }

    /// Reset and begin a run
    ///
    /// Halts the previous run, then executes the top-level stream of the new
    /// program. Returns when the top level has run off its last line (loops
    /// and timers it started keep running) or with the error that aborted
    /// it.
    ///
    /// Works on either tokio flavor: background streams may run on other
    /// worker threads, but each statement holds the run's statement gate.
    pub async fn start(
        &mut self,
        source: &str,
        surface: Option<Arc<dyn Surface>>,
    ) -> Result<(), RuntimeError> {
        self.stop();

        let program = Program::from_source(source);
        let ctx = Arc::new(RunContext::new(
            program,
            self.host.clone(),
            self.settings.clone(),
            surface,
        ));
        self.current = Some(ctx.clone());
        self.stopper.attach(ctx.clone());

        info!(
            parent: &ctx.span,
            digest = ctx.program.digest(),
            lines = ctx.program.len(),
            "run started"
        );

        let top = Stream::new(ctx.clone(), ctx.globals.clone(), StreamKind::TopLevel);
        let result = run_range(&top, 0..ctx.program.len())
            .instrument(ctx.span.clone())
            .await;

        match result {
            Ok(Flow::Halted) => {
                info!(parent: &ctx.span, "top level stopped by halt");
                Ok(())
            }
            Ok(_) => Ok(()),
            Err(err) => {
                warn!(parent: &ctx.span, error = %err, "top level failed");
                Err(err)
            }
        }
    }

    /// Halt the current run; its state stays readable until the next start
    pub fn stop(&mut self) {
        if let Some(ctx) = &self.current {
            ctx.halt();
        }
    }

    /// Wait for every WHILE/FOR stream of the run to finish, then report the
    /// first failure of any background stream
    ///
    /// Timers are not waited for; they only end through `stop`, `HALT` or
    /// `CANCEL`.
    pub async fn settle(&self) -> Result<(), RuntimeError> {
        let Some(ctx) = &self.current else {
            return Ok(());
        };

        loop {
            let pending = ctx.tasks.take_finite();
            if pending.is_empty() {
                break;
            }
            for handle in pending {
                // Aborted loops are fine here; failures are recorded separately
                let _ = handle.await;
            }
        }

        match ctx.take_failures().into_iter().next() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    pub fn context(&self) -> Option<&Arc<RunContext>> {
        self.current.as_ref()
    }

    /// Read a global variable of the current run
    pub fn get(&self, name: &str) -> Option<Val> {
        self.current.as_ref().and_then(|ctx| ctx.globals.lookup(name))
    }

    pub fn is_halted(&self) -> bool {
        self.current.as_ref().is_some_and(|ctx| ctx.is_halted())
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        self.stop();
    }
}
