//! PuzzleForge Solver - constraint solving for puzzle generation
//!
//! This crate provides:
//! - [`ConstraintSolver`], the seam every solver backend implements
//! - [`FiniteDomainSolver`], a resumable depth-first engine over bounded domains
//! - [`Orchestrator`], which runs the base solve, the post-generation
//!   re-solve, and optimization with a uniqueness proof

mod domain;
mod finite;
mod interval;
mod orchestrator;
mod solver;


pub use finite::FiniteDomainSolver;
pub use orchestrator::{OptimumOutcome, Orchestrator, Phase, SolveOutcome};
pub use solver::{ConstraintSolver, Direction, OptimizeResult, SatResult};
