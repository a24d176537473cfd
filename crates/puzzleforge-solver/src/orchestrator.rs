//! Solving orchestration: base solve, post-generation re-solve, optimization.

use std::fmt;
use std::time::Instant;

use puzzleforge_config::SolverSettings;
use puzzleforge_core::{Const, Model, PuzzleError, Result, Term, TermRef, Variable};
use tracing::{debug, info};

use crate::finite::FiniteDomainSolver;
use crate::solver::{ConstraintSolver, Direction, OptimizeResult, SatResult};

/// Orchestrator lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Solving,
    PostGenSolving,
    Optimizing,
    Done,
    Failed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Idle => "Idle",
            Phase::Solving => "Solving",
            Phase::PostGenSolving => "PostGenSolving",
            Phase::Optimizing => "Optimizing",
            Phase::Done => "Done",
            Phase::Failed => "Failed",
        };
        f.write_str(name)
    }
}

/// Sorted solutions of a fully enumerated condition set.
#[derive(Debug, Clone)]
pub struct SolveOutcome {
    pub solutions: Vec<Model>,
    /// Assertions in force before any blocking clause was added.
    pub condition_count: usize,
}

/// The unique optimum of an objective.
#[derive(Debug, Clone)]
pub struct OptimumOutcome {
    pub model: Model,
    pub value: Const,
    pub condition_count: usize,
}

/// Drives one constraint solver through the solving phases of a single
/// puzzle instance.
pub struct Orchestrator<S: ConstraintSolver = FiniteDomainSolver> {
    solver: S,
    declarations: Vec<(Variable, Option<(i64, i64)>)>,
    max_solution: usize,
    baseline_limit: usize,
    phase: Phase,
}

impl Orchestrator<FiniteDomainSolver> {
    pub fn new(settings: &SolverSettings, max_solution: usize) -> Self {
        let baseline_limit = settings.post_gen_baseline_limit;
        Self::with_solver(
            FiniteDomainSolver::new(settings.clone()),
            max_solution,
            baseline_limit,
        )
    }
}

impl<S: ConstraintSolver> Orchestrator<S> {
    pub fn with_solver(solver: S, max_solution: usize, baseline_limit: usize) -> Self {
        Self {
            solver,
            declarations: Vec::new(),
            max_solution,
            baseline_limit,
            phase: Phase::Idle,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn max_solution(&self) -> usize {
        self.max_solution
    }

    /// Declares a solver-backed unknown. Declarations survive resets.
    pub fn declare(&mut self, var: &Variable, bounds: Option<(i64, i64)>) {
        self.solver.declare(var, bounds);
        self.declarations.push((var.clone(), bounds));
    }

    /// Enumerates every solution of `conditions`.
    pub fn solve(&mut self, conditions: &[TermRef]) -> Result<SolveOutcome> {
        self.run(Phase::Solving, |this| {
            let condition_count = this.load(conditions);
            let solutions = this.enumerate(Phase::Solving, None)?;
            if solutions.is_empty() {
                return Err(PuzzleError::NoSolution {
                    context: format!("{condition_count} conditions"),
                });
            }
            Ok(SolveOutcome {
                solutions,
                condition_count,
            })
        })
    }

    /// Enumerates at most the baseline limit of solutions, sorted. The first
    /// one anchors post-generation variables.
    pub fn baseline(&mut self, conditions: &[TermRef]) -> Result<Vec<Model>> {
        self.run(Phase::PostGenSolving, |this| {
            this.load(conditions);
            let limit = this.baseline_limit;
            let solutions = this.enumerate(Phase::PostGenSolving, Some(limit))?;
            if solutions.is_empty() {
                return Err(PuzzleError::NoSolution {
                    context: "post-generation baseline".into(),
                });
            }
            Ok(solutions)
        })
    }

    /// Re-solves the base conditions together with post-generation ones.
    pub fn resolve_with(&mut self, base: &[TermRef], post: &[TermRef]) -> Result<SolveOutcome> {
        self.run(Phase::PostGenSolving, |this| {
            let all: Vec<TermRef> = base.iter().chain(post).cloned().collect();
            let condition_count = this.load(&all);
            let solutions = this.enumerate(Phase::PostGenSolving, None)?;
            Ok(SolveOutcome {
                solutions,
                condition_count,
            })
        })
    }

    /// Finds the optimum of `objective` and proves that no other assignment
    /// reaches the same value.
    pub fn optimize(
        &mut self,
        conditions: &[TermRef],
        objective: &TermRef,
        direction: Direction,
    ) -> Result<OptimumOutcome> {
        self.run(Phase::Optimizing, |this| {
            let condition_count = this.load(conditions);
            let (model, value) = match this.solver.check_optimize(objective, direction) {
                OptimizeResult::Optimal { model, value } => (model, value),
                OptimizeResult::Unsat => {
                    return Err(PuzzleError::NoSolution {
                        context: format!("{direction} {objective}"),
                    })
                }
                OptimizeResult::Unknown(reason) => return Err(unknown(Phase::Optimizing, reason)),
            };
            debug!(event = "solution_found", phase = "Optimizing", value = %value);

            this.solver.block(&model);
            this.solver
                .assert(Term::eq(objective.clone(), Term::constant(value)));
            match this.solver.check() {
                SatResult::Unsat => Ok(OptimumOutcome {
                    model,
                    value,
                    condition_count,
                }),
                SatResult::Sat => Err(PuzzleError::AmbiguousOptimum {
                    objective: objective.to_string(),
                    value: value.to_string(),
                }),
                SatResult::Unknown(reason) => Err(unknown(Phase::Optimizing, reason)),
            }
        })
    }

    fn run<T, F>(&mut self, phase: Phase, body: F) -> Result<T>
    where
        F: FnOnce(&mut Self) -> Result<T>,
    {
        let started = Instant::now();
        self.phase = phase;
        info!(event = "phase_start", phase = %phase);
        let result = body(self);
        self.phase = if result.is_ok() { Phase::Done } else { Phase::Failed };
        info!(
            event = "phase_end",
            phase = %phase,
            duration_ms = started.elapsed().as_millis() as u64,
            outcome = %self.phase,
        );
        result
    }

    /// Resets the solver and asserts `conditions`; returns the assertion count.
    fn load(&mut self, conditions: &[TermRef]) -> usize {
        self.solver.reset();
        for (var, bounds) in &self.declarations {
            self.solver.declare(var, *bounds);
        }
        for condition in conditions {
            self.solver.assert(condition.clone());
        }
        self.solver.assertion_count()
    }

    /// Check, record, block, repeat. With `cap`, stops quietly at `cap`
    /// models; otherwise exceeding `max_solution` is an error.
    fn enumerate(&mut self, phase: Phase, cap: Option<usize>) -> Result<Vec<Model>> {
        let mut solutions = Vec::new();
        loop {
            if cap.is_some_and(|c| solutions.len() >= c) {
                break;
            }
            match self.solver.check() {
                SatResult::Sat => {}
                SatResult::Unsat => break,
                SatResult::Unknown(reason) => return Err(unknown(phase, reason)),
            }
            let Some(model) = self.solver.model() else {
                break;
            };
            debug!(event = "solution_found", phase = %phase, index = solutions.len());
            self.solver.block(&model);
            solutions.push(model);
            if cap.is_none() && solutions.len() > self.max_solution {
                return Err(PuzzleError::TooManySolutions {
                    found: solutions.len(),
                    limit: self.max_solution,
                });
            }
        }
        solutions.sort_by(Model::canonical_cmp);
        Ok(solutions)
    }
}

fn unknown(phase: Phase, reason: String) -> PuzzleError {
    PuzzleError::SolverUnknown {
        phase: phase.to_string(),
        reason,
    }
}
