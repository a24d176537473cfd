//! Registry of declared solver variables.

use std::sync::Arc;

use indexmap::IndexMap;
use puzzleforge_core::{PuzzleError, Result, Sort, TermRef, Term, VarId, Variable};

/// A declared variable with optional integer bounds.
#[derive(Debug, Clone)]
pub struct Declaration {
    pub var: Variable,
    pub bounds: Option<(i64, i64)>,
}

/// Name-deduplicated solver variables in declaration order.
#[derive(Debug, Default)]
pub struct VarRegistry {
    by_name: IndexMap<Arc<str>, Declaration>,
}

impl VarRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a variable, returning the existing one when the name is
    /// already declared with the same sort.
    pub fn declare(&mut self, name: &str, sort: Sort, bounds: Option<(i64, i64)>) -> Result<TermRef> {
        if let Some(existing) = self.by_name.get_mut(name) {
            if existing.var.sort != sort {
                return Err(PuzzleError::eval(format!(
                    "variable '{name}' redeclared as {sort}, previously {}",
                    existing.var.sort
                )));
            }
            if bounds.is_some() {
                existing.bounds = bounds;
            }
            return Ok(Term::var(existing.var.clone()));
        }
        if let Some((lo, hi)) = bounds {
            if lo > hi {
                return Err(PuzzleError::eval(format!(
                    "variable '{name}' has empty bounds [{lo}, {hi}]"
                )));
            }
        }
        let id = VarId(self.by_name.len() as u32);
        let var = Variable::new(id, name, sort);
        self.by_name.insert(
            Arc::clone(&var.name),
            Declaration {
                var: var.clone(),
                bounds,
            },
        );
        Ok(Term::var(var))
    }

    pub fn get(&self, name: &str) -> Option<&Declaration> {
        self.by_name.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Declaration> {
        self.by_name.values()
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}
