//! Variable scopes
//!
//! A `Scope` is one binding table plus an optional parent. The global scope
//! has no parent; every function call gets a child of the global scope.
//! Reads walk up the chain. Writes land in the nearest scope that already
//! owns the name, or in the innermost scope when the name is new.
//!
//! Scopes are shared between concurrently running streams, so the table
//! sits behind a mutex. The lock is only held for the duration of a single
//! read or write, never across a suspension point.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::errors::RuntimeError;
use super::expressions::Bindings;
use super::types::Val;

#[derive(Debug, Default)]
struct Frame {
    vars: HashMap<String, Val>,
    consts: HashSet<String>,
}

#[derive(Debug, Default)]
pub struct Scope {
    frame: Mutex<Frame>,
    parent: Option<Arc<Scope>>,
}

impl Scope {
    pub fn global() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn child(parent: &Arc<Scope>) -> Arc<Self> {
        Arc::new(Self {
            frame: Mutex::default(),
            parent: Some(parent.clone()),
        })
    }

    fn frame(&self) -> MutexGuard<'_, Frame> {
        self.frame.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /* ===================== Reads ===================== */

    /// Look a plain name up through the scope chain
    pub fn lookup(&self, name: &str) -> Option<Val> {
        if let Some(v) = self.frame().vars.get(name) {
            return Some(v.clone());
        }
        self.parent.as_ref().and_then(|p| p.lookup(name))
    }

    /// Strict read of a name, permissive read of a dotted path
    ///
    /// `a.b.c` resolves `a` strictly and then walks the fields; a missing
    /// intermediate behaves as an empty record, so the result is
    /// `Undefined` rather than an error.
    pub fn get(&self, path: &str) -> Result<Val, RuntimeError> {
        let mut parts = path.split('.');
        let base = parts.next().unwrap_or(path);
        let mut value = self
            .lookup(base)
            .ok_or_else(|| RuntimeError::UndefinedName {
                name: base.to_string(),
            })?;
        for field in parts {
            value = value.field(field);
        }
        Ok(value)
    }

    /* ===================== Writes ===================== */

    /// The nearest scope that already binds `name`
    fn owner(&self, name: &str) -> Option<&Scope> {
        if self.frame().vars.contains_key(name) {
            return Some(self);
        }
        self.parent.as_deref().and_then(|p| p.owner(name))
    }

    /// Assign to the owning scope, or bind in this scope if the name is new
    pub fn set(&self, name: &str, value: Val) -> Result<Val, RuntimeError> {
        let target = self.owner(name).unwrap_or(self);
        let mut frame = target.frame();
        if frame.consts.contains(name) {
            return Err(RuntimeError::ConstAssignment {
                name: name.to_string(),
            });
        }
        frame.vars.insert(name.to_string(), value.clone());
        Ok(value)
    }

    /// Bind in this scope, shadowing any outer binding (parameters)
    pub fn define(&self, name: &str, value: Val) {
        self.frame().vars.insert(name.to_string(), value);
    }

    /// Bind `name` and mark it constant in the owning scope
    ///
    /// Fails if `name` is already a constant; the stored value is left
    /// unchanged in that case.
    pub fn declare_const(&self, name: &str, value: Val) -> Result<Val, RuntimeError> {
        let target = self.owner(name).unwrap_or(self);
        let mut frame = target.frame();
        if frame.consts.contains(name) {
            return Err(RuntimeError::ConstAssignment {
                name: name.to_string(),
            });
        }
        frame.vars.insert(name.to_string(), value.clone());
        frame.consts.insert(name.to_string());
        Ok(value)
    }

    /// Mutate a bound value in place
    ///
    /// Read, modify and write happen under one lock, so concurrent PUSH/POP
    /// on the same list do not lose updates.
    pub fn with_value_mut<T>(
        &self,
        name: &str,
        f: impl FnOnce(&mut Val) -> Result<T, RuntimeError>,
    ) -> Result<T, RuntimeError> {
        let target = self.owner(name).ok_or_else(|| RuntimeError::UndefinedName {
            name: name.to_string(),
        })?;
        let mut frame = target.frame();
        if frame.consts.contains(name) {
            return Err(RuntimeError::ConstAssignment {
                name: name.to_string(),
            });
        }
        let value = frame
            .vars
            .get_mut(name)
            .ok_or_else(|| RuntimeError::UndefinedName {
                name: name.to_string(),
            })?;
        f(value)
    }
}

impl Bindings for Scope {
    fn lookup(&self, name: &str) -> Option<Val> {
        Scope::lookup(self, name)
    }
}
