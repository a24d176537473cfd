//! PuzzleForge Core - shared types for the puzzle compiler
//!
//! This crate provides:
//! - Solver terms, sorts and variables
//! - Solver models with canonical ordering
//! - The error taxonomy shared by every PuzzleForge crate

pub mod error;
pub mod model;
pub mod term;

#[cfg(test)]
mod term_tests;

pub use error::{PuzzleError, Result};
pub use model::Model;
pub use term::{
    arith, format_float, ArithOp, CmpOp, Const, Sort, Term, TermList, TermRef, VarId, Variable,
};
