//! Expression language for PuzzleForge.
//!
//! Every formula, condition, and description placeholder in a puzzle
//! specification is written in a small Python-flavoured expression language.
//! This crate parses it, evaluates it against a [`Context`], and lifts
//! operators over solver [`Term`](puzzleforge_core::Term)s so conditions can
//! be written with ordinary syntax.
//!
//! Runtime values ([`Value`]) include indexed variable families
//! ([`SymbolFamily`]) and solver models. Values built from sampled data carry
//! provenance (description template, bound data) through a side table keyed
//! by symbol id.

pub mod ast;
mod builtins;
pub mod eval;
pub mod family;
mod lexer;
mod methods;
pub mod parser;
pub mod provenance;
pub mod scope;
pub mod template;
pub mod value;
pub mod vars;

pub use ast::Expr;
pub use builtins::{is_builtin, names as builtin_names, Args};
pub use family::{FamilyDef, FamilyEntry, SymbolFamily};
pub use parser::{parse_expr, MAX_EXPR_NESTING};
pub use provenance::{Field, Provenance, ProvenanceTable, SymbolId};
pub use scope::{Context, Scope, MAX_CALL_DEPTH};
pub use template::{format_value, Segment, Template};
pub use value::{Function, Value};
pub use vars::{Declaration, VarRegistry};
