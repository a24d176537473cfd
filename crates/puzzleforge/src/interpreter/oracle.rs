//! Custom predicates evaluated on behalf of the sampler.

use std::cell::RefCell;

use puzzleforge_core::Result;
use puzzleforge_expr::{Context, Value};
use puzzleforge_sampler::{SamplingOracle, Selection};

/// Calls the compiled `custom_cond` constraints of one sampling site.
///
/// The context sits behind a `RefCell` because option selection needs it
/// from both the oracle and the option classifier during a single sampler
/// call. The sampler never runs the two at the same time.
pub(crate) struct PredicateOracle<'a, 'c> {
    ctx: &'a RefCell<&'c mut Context>,
    predicates: &'a [Option<Value>],
}

impl<'a, 'c> PredicateOracle<'a, 'c> {
    pub(crate) fn new(ctx: &'a RefCell<&'c mut Context>, predicates: &'a [Option<Value>]) -> Self {
        Self { ctx, predicates }
    }
}

impl SamplingOracle for PredicateOracle<'_, '_> {
    fn check(&mut self, index: usize, selection: &Selection) -> Result<bool> {
        let Some(Some(predicate)) = self.predicates.get(index) else {
            return Ok(true);
        };
        match predicate.untagged() {
            Value::Function(_) => {
                let mut ctx = self.ctx.borrow_mut();
                ctx.call(predicate, vec![selection_value(selection)], Vec::new())?
                    .is_truthy()
            }
            constant => constant.is_truthy(),
        }
    }
}

/// Index lists as the predicate sees them. Whole batches are nested tuples
/// so predicates can hash and compare them.
pub(crate) fn selection_value(selection: &Selection) -> Value {
    fn ints(indices: &[usize], wrap: fn(Vec<Value>) -> Value) -> Value {
        wrap(indices.iter().map(|&i| Value::from(i)).collect())
    }
    fn row(fields: &[Vec<usize>], wrap: fn(Vec<Value>) -> Value) -> Value {
        wrap(fields.iter().map(|f| ints(f, wrap)).collect())
    }
    fn draw(dims: &[Vec<Vec<usize>>], wrap: fn(Vec<Value>) -> Value) -> Value {
        wrap(dims.iter().map(|r| row(r, wrap)).collect())
    }

    match selection {
        Selection::Draw(dims) => draw(dims, Value::list),
        Selection::Batch(entries) => {
            Value::tuple(entries.iter().map(|e| draw(e, Value::tuple)).collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_selection_shapes() {
        let draw = Selection::Draw(vec![vec![vec![1, 2], vec![0]]]);
        assert_eq!(selection_value(&draw).to_string(), "[[[1, 2], [0]]]");
        let batch = Selection::Batch(vec![vec![vec![vec![3]]], vec![vec![vec![4]]]]);
        assert_eq!(selection_value(&batch).to_string(), "((((3,),),), (((4,),),))");
    }

    #[test]
    fn test_predicates_are_called_by_index() {
        let mut ctx = Context::new(ChaCha8Rng::seed_from_u64(1));
        let even = ctx.compile_function("lambda s: s[0][0][0] % 2 == 0").unwrap();
        let predicates = vec![None, Some(even), Some(Value::Bool(false))];
        let cell = RefCell::new(&mut ctx);
        let mut oracle = PredicateOracle::new(&cell, &predicates);

        let two = Selection::Draw(vec![vec![vec![2]]]);
        let three = Selection::Draw(vec![vec![vec![3]]]);
        assert!(oracle.check(0, &three).unwrap());
        assert!(oracle.check(1, &two).unwrap());
        assert!(!oracle.check(1, &three).unwrap());
        assert!(!oracle.check(2, &two).unwrap());
        assert!(oracle.check(9, &two).unwrap());
    }
}
