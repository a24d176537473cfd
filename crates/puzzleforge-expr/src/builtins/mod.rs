//! Registered operator table.
//!
//! Builtins are resolved by name when no scope binding shadows them. Each
//! group lives in its own module and exposes its names plus one dispatch
//! function.

mod puzzle;
mod python;
mod random;
mod solver;

use std::sync::Arc;

use puzzleforge_core::{PuzzleError, Result};

use crate::scope::Context;
use crate::value::Value;

/// Call arguments of a builtin.
#[derive(Debug, Default)]
pub struct Args {
    positional: Vec<Value>,
    keywords: Vec<(Arc<str>, Value)>,
}

impl Args {
    pub fn new(positional: Vec<Value>, keywords: Vec<(Arc<str>, Value)>) -> Self {
        Self {
            positional,
            keywords,
        }
    }

    pub fn len(&self) -> usize {
        self.positional.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positional.is_empty()
    }

    pub fn positional(&self) -> &[Value] {
        &self.positional
    }

    /// Argument by position, or by keyword when not given positionally.
    pub fn get(&self, index: usize, keyword: &str) -> Option<&Value> {
        self.positional.get(index).or_else(|| {
            self.keywords
                .iter()
                .find(|(k, _)| &**k == keyword)
                .map(|(_, v)| v)
        })
    }

    pub fn keyword(&self, keyword: &str) -> Option<&Value> {
        self.keywords
            .iter()
            .find(|(k, _)| &**k == keyword)
            .map(|(_, v)| v)
    }

    pub fn required(&self, index: usize, keyword: &str, function: &str) -> Result<&Value> {
        self.get(index, keyword).ok_or_else(|| {
            PuzzleError::eval(format!("{function}() missing required argument '{keyword}'"))
        })
    }

    pub fn int(&self, index: usize, keyword: &str, function: &str) -> Result<i64> {
        let value = self.required(index, keyword, function)?;
        value.as_int().ok_or_else(|| {
            PuzzleError::eval(format!(
                "{function}() argument '{keyword}' must be an integer, not {}",
                value.type_name()
            ))
        })
    }

    pub fn usize(&self, index: usize, keyword: &str, function: &str) -> Result<usize> {
        let n = self.int(index, keyword, function)?;
        usize::try_from(n).map_err(|_| {
            PuzzleError::eval(format!(
                "{function}() argument '{keyword}' must be non-negative, got {n}"
            ))
        })
    }

    pub fn str(&self, index: usize, keyword: &str, function: &str) -> Result<&str> {
        let value = self.required(index, keyword, function)?;
        value.as_str().ok_or_else(|| {
            PuzzleError::eval(format!(
                "{function}() argument '{keyword}' must be str, not {}",
                value.type_name()
            ))
        })
    }

    /// Items of a single iterable argument, or all positional arguments.
    pub fn variadic(&self) -> Result<Vec<Value>> {
        match self.positional.as_slice() {
            [single] if !single.is_numeric() && !single.is_term() => single.to_vec(),
            many => Ok(many.to_vec()),
        }
    }
}

/// True when `name` is a registered builtin.
pub fn is_builtin(name: &str) -> bool {
    python::NAMES.contains(&name)
        || random::NAMES.contains(&name)
        || solver::NAMES.contains(&name)
        || puzzle::NAMES.contains(&name)
}

/// Every registered builtin name.
pub fn names() -> impl Iterator<Item = &'static str> {
    python::NAMES
        .iter()
        .chain(random::NAMES)
        .chain(solver::NAMES)
        .chain(puzzle::NAMES)
        .copied()
}

pub(crate) fn call(ctx: &mut Context, name: &str, args: Args) -> Result<Value> {
    if python::NAMES.contains(&name) {
        python::call(ctx, name, args)
    } else if random::NAMES.contains(&name) {
        random::call(ctx, name, args)
    } else if solver::NAMES.contains(&name) {
        solver::call(ctx, name, args)
    } else if puzzle::NAMES.contains(&name) {
        puzzle::call(ctx, name, args)
    } else {
        Err(PuzzleError::eval(format!("name '{name}' is not defined")))
    }
}
