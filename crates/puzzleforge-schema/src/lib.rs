//! Specification documents for PuzzleForge.
//!
//! A [`Specification`] describes a puzzle family: sampled variables, symbol
//! families, conditions, an optional post-generation or optimization phase,
//! and the questions to ask. Documents load from YAML, JSON or TOML and are
//! validated fail-fast; the first violation is reported as a
//! [`PuzzleError::Schema`](puzzleforge_core::PuzzleError::Schema) naming the
//! offending field.
//!
//! ```
//! use puzzleforge_schema::{Specification, Symbol};
//!
//! let spec = Specification::from_yaml_str(r#"
//! variables:
//!   n: {type: int, domain: "[3, 5]"}
//! symbols:
//!   lamp: {source: ["range(n)"], type: bool}
//! conditions:
//!   three_on: {formula: "Sum([If(v, 1, 0) for v in lamp.to_list()]) == 3"}
//! desc: "There are {n} lamps."
//! "#).unwrap();
//!
//! assert!(matches!(spec.symbols["lamp"], Symbol::Defined(_)));
//! assert_eq!(spec.max_solution, 6000);
//! ```

mod document;
mod load;
mod validate;

#[cfg(test)]
mod tests;

pub use document::{
    parse_sort, Condition, CustomCond, DefinedSymbol, DerivedSymbol, DerivedSymbols, Direction,
    DynamicCondition, OneOrMany, OpenQuery, OptionCond, OptionSet, OptionTemplate, Optimization,
    PostGeneration, Query, SelectionQuery, Specification, StaticCondition, Symbol, VarType,
    Variable,
};
pub use load::Format;
