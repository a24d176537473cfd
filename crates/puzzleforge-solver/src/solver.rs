//! The constraint solver seam.

use std::fmt;

use puzzleforge_core::{Const, Model, TermRef, Variable};

/// Outcome of a satisfiability check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SatResult {
    Sat,
    Unsat,
    /// The solver gave up, typically on a time or node limit.
    Unknown(String),
}

/// Optimization direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Minimize,
    Maximize,
}

impl Direction {
    /// True when `candidate` strictly improves on `best`.
    pub fn improves(&self, candidate: &Const, best: &Const) -> bool {
        match self {
            Direction::Minimize => candidate.compare(best).is_lt(),
            Direction::Maximize => candidate.compare(best).is_gt(),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Minimize => write!(f, "minimize"),
            Direction::Maximize => write!(f, "maximize"),
        }
    }
}

/// Outcome of an optimizing check.
#[derive(Debug, Clone)]
pub enum OptimizeResult {
    Optimal { model: Model, value: Const },
    Unsat,
    Unknown(String),
}

/// An incremental constraint solver.
///
/// One instance serves one puzzle instance. Callers declare variables, add
/// assertions, and then alternate [`check`](Self::check) and
/// [`block`](Self::block) to enumerate distinct models.
pub trait ConstraintSolver: Send {
    /// Declares a variable with optional integer bounds.
    fn declare(&mut self, var: &Variable, bounds: Option<(i64, i64)>);

    fn assert(&mut self, term: TermRef);

    /// Number of assertions, including blocking clauses.
    fn assertion_count(&self) -> usize;

    fn check(&mut self) -> SatResult;

    /// Model of the last `Sat` check.
    fn model(&self) -> Option<Model>;

    /// Excludes `model`: at least one of its variables must differ.
    fn block(&mut self, model: &Model);

    /// Finds a model with the best objective value.
    fn check_optimize(&mut self, objective: &TermRef, direction: Direction) -> OptimizeResult;

    /// Drops every assertion and declaration.
    fn reset(&mut self);
}
