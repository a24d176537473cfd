//! Evaluation scopes and the per-instance evaluation context.

use std::sync::Arc;

use indexmap::IndexMap;
use puzzleforge_core::Result;
use rand::RngCore;
use tracing::trace;

use crate::parser::parse_expr;
use crate::provenance::ProvenanceTable;
use crate::value::Value;
use crate::vars::VarRegistry;

/// Default cap on nested function calls.
pub const MAX_CALL_DEPTH: usize = 64;

/// Persistent chain of local frames.
///
/// Extending a scope never mutates it, so lambdas can capture the scope they
/// were defined in by cloning the handle.
#[derive(Clone, Default)]
pub struct Scope {
    frame: Option<Arc<Frame>>,
}

struct Frame {
    bindings: Vec<(Arc<str>, Value)>,
    parent: Scope,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(&self, bindings: Vec<(Arc<str>, Value)>) -> Scope {
        if bindings.is_empty() {
            return self.clone();
        }
        Scope {
            frame: Some(Arc::new(Frame {
                bindings,
                parent: self.clone(),
            })),
        }
    }

    pub fn bind(&self, name: &str, value: Value) -> Scope {
        self.with(vec![(Arc::from(name), value)])
    }

    pub fn lookup(&self, name: &str) -> Option<&Value> {
        let mut current = self.frame.as_deref();
        while let Some(frame) = current {
            if let Some((_, value)) = frame.bindings.iter().rev().find(|(n, _)| &**n == name) {
                return Some(value);
            }
            current = frame.parent.frame.as_deref();
        }
        None
    }
}

/// Everything one puzzle instance evaluates against: global bindings, the
/// random stream, declared solver variables, and the provenance table.
pub struct Context {
    globals: IndexMap<Arc<str>, Value>,
    rng: Box<dyn RngCore + Send>,
    vars: VarRegistry,
    provenance: ProvenanceTable,
    max_attempts: usize,
    pub(crate) depth: usize,
    pub(crate) letter_cursor: usize,
}

impl Context {
    pub fn new(rng: impl RngCore + Send + 'static) -> Self {
        Self {
            globals: IndexMap::new(),
            rng: Box::new(rng),
            vars: VarRegistry::new(),
            provenance: ProvenanceTable::new(),
            max_attempts: puzzleforge_sampler::DEFAULT_MAX_ATTEMPTS,
            depth: 0,
            letter_cursor: 0,
        }
    }

    /// Sets the retry budget used by random builtins with predicates.
    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    pub fn set_global(&mut self, name: &str, value: Value) {
        trace!(event = "bind_global", name, kind = value.type_name());
        self.globals.insert(Arc::from(name), value);
    }

    pub fn global(&self, name: &str) -> Option<&Value> {
        self.globals.get(name)
    }

    pub fn globals(&self) -> &IndexMap<Arc<str>, Value> {
        &self.globals
    }

    pub fn rng(&mut self) -> &mut dyn RngCore {
        self.rng.as_mut()
    }

    pub fn vars(&self) -> &VarRegistry {
        &self.vars
    }

    pub fn vars_mut(&mut self) -> &mut VarRegistry {
        &mut self.vars
    }

    pub fn provenance(&self) -> &ProvenanceTable {
        &self.provenance
    }

    pub fn provenance_mut(&mut self) -> &mut ProvenanceTable {
        &mut self.provenance
    }

    /// Borrows the variable registry and provenance table together.
    pub fn registries_mut(&mut self) -> (&mut VarRegistry, &mut ProvenanceTable) {
        (&mut self.vars, &mut self.provenance)
    }

    /// Parses and evaluates `source` against the globals.
    pub fn eval_str(&mut self, source: &str) -> Result<Value> {
        let expr = parse_expr(source)?;
        self.eval(&expr, &Scope::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_shadowing_is_persistent() {
        let outer = Scope::new().bind("x", Value::Int(1));
        let inner = outer.bind("x", Value::Int(2)).bind("y", Value::Int(3));
        assert_eq!(inner.lookup("x"), Some(&Value::Int(2)));
        assert_eq!(outer.lookup("x"), Some(&Value::Int(1)));
        assert!(outer.lookup("y").is_none());
    }
}
