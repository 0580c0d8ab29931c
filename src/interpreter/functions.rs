//! Function table and invocation

use std::collections::HashMap;
use std::ops::Range;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;

use super::environment::Scope;
use super::errors::RuntimeError;
use super::exec_loop::{run_range, Stream, StreamKind};
use super::types::{Flow, Program, Val};

/// A FUNCTION block as registered when its header was first executed
#[derive(Debug)]
pub struct FunctionDef {
    pub name: String,
    pub params: Vec<String>,
    /// Body lines, header and ENDFN excluded
    pub body: Range<usize>,
    pub program: Arc<Program>,
}

#[derive(Debug, Default)]
pub struct FunctionTable {
    defs: Mutex<HashMap<String, Arc<FunctionDef>>>,
}

impl FunctionTable {
    /// Register a function; a later definition with the same name wins
    pub fn define(&self, def: FunctionDef) {
        debug!(function = %def.name, params = def.params.len(), "function registered");
        self.defs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(def.name.clone(), Arc::new(def));
    }

    pub fn get(&self, name: &str) -> Option<Arc<FunctionDef>> {
        self.defs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }
}

/// Invoke `name` with already-evaluated arguments
///
/// The body runs in a child scope of the run's globals with the parameters
/// bound positionally; missing arguments are `Undefined`. The result is the
/// value of the first `RETURN`, or `Null` when the body runs off its end.
pub async fn call(caller: &Stream, name: &str, args: Vec<Val>) -> Result<Val, RuntimeError> {
    let def = caller
        .ctx
        .functions
        .get(name)
        .ok_or_else(|| RuntimeError::UndefinedFunction {
            name: name.to_string(),
        })?;

    let scope = Scope::child(&caller.ctx.globals);
    let mut args = args.into_iter();
    for param in def.params.iter().filter(|p| !p.is_empty()) {
        scope.define(param, args.next().unwrap_or_default());
    }

    let callee = Stream {
        ctx: caller.ctx.clone(),
        program: def.program.clone(),
        scope,
        kind: StreamKind::Function,
    };

    match run_range(&callee, def.body.clone()).await? {
        Flow::Returned(value) => Ok(value),
        Flow::Completed | Flow::Halted => Ok(Val::Null),
    }
}
