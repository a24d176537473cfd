//! Solver models (solutions).

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use crate::error::Result;
use crate::term::{Const, Term, VarId, Variable};

/// One satisfying assignment returned by a constraint solver.
///
/// Bindings are kept sorted by variable name, which is also the order of
/// [`Model::canonical_key`].
#[derive(Debug, Clone, Default)]
pub struct Model {
    bindings: Arc<Vec<(Variable, Const)>>,
}

impl Model {
    pub fn new(mut bindings: Vec<(Variable, Const)>) -> Self {
        bindings.sort_by(|a, b| a.0.name.cmp(&b.0.name).then(a.0.id.cmp(&b.0.id)));
        Self {
            bindings: Arc::new(bindings),
        }
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Value bound to a variable, if the model binds it.
    pub fn get(&self, id: VarId) -> Option<Const> {
        self.bindings
            .iter()
            .find(|(v, _)| v.id == id)
            .map(|(_, c)| *c)
    }

    pub fn get_by_name(&self, name: &str) -> Option<Const> {
        self.bindings
            .iter()
            .find(|(v, _)| &*v.name == name)
            .map(|(_, c)| *c)
    }

    pub fn bindings(&self) -> &[(Variable, Const)] {
        &self.bindings
    }

    /// Value of `var` with model completion: unbound variables read as
    /// `false` or `0` for their sort.
    pub fn value_of(&self, var: &Variable) -> Const {
        self.get(var.id)
            .unwrap_or_else(|| Const::default_for(var.sort))
    }

    /// Evaluates a term under this model with completion.
    pub fn eval(&self, term: &Term) -> Result<Const> {
        term.evaluate(&|v: &Variable| self.value_of(v))
    }

    /// Stringified values in variable-name order.
    pub fn canonical_key(&self) -> Vec<String> {
        self.bindings.iter().map(|(_, c)| c.to_string()).collect()
    }

    /// Orders models by canonical key.
    pub fn canonical_cmp(&self, other: &Model) -> Ordering {
        self.canonical_key().cmp(&other.canonical_key())
    }

    /// True when both models assign equal values to the same variables.
    pub fn same_assignment(&self, other: &Model) -> bool {
        self.bindings.len() == other.bindings.len()
            && self
                .bindings
                .iter()
                .zip(other.bindings.iter())
                .all(|((va, ca), (vb, cb))| va.id == vb.id && ca.equals(cb))
    }
}

impl PartialEq for Model {
    fn eq(&self, other: &Self) -> bool {
        self.same_assignment(other)
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, (var, value)) in self.bindings.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{} = {}", var.name, value)?;
        }
        write!(f, "]")
    }
}
