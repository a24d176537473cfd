//! Draws from the instance random stream.

use puzzleforge_core::{PuzzleError, Result};
use rand::seq::{index, SliceRandom};
use rand::Rng;

use super::Args;
use crate::scope::Context;
use crate::value::Value;

pub(super) const NAMES: &[&str] = &["randint", "uniform", "choice", "sample", "shuffle", "random"];

pub(super) fn call(ctx: &mut Context, name: &str, args: Args) -> Result<Value> {
    match name {
        "randint" => {
            let lo = args.int(0, "a", name)?;
            let hi = args.int(1, "b", name)?;
            if lo > hi {
                return Err(PuzzleError::random(
                    "randint",
                    format!("empty range for randint({lo}, {hi})"),
                ));
            }
            Ok(Value::Int(ctx.rng().random_range(lo..=hi)))
        }
        "uniform" => {
            let a = float_arg(&args, 0, "a", name)?;
            let b = float_arg(&args, 1, "b", name)?;
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            if lo == hi {
                return Ok(Value::Float(lo));
            }
            Ok(Value::Float(ctx.rng().random_range(lo..=hi)))
        }
        "random" => Ok(Value::Float(ctx.rng().random::<f64>())),
        "choice" => {
            let items = args.required(0, "seq", name)?.to_vec()?;
            if items.is_empty() {
                return Err(PuzzleError::random("choice", "cannot choose from an empty sequence"));
            }
            let i = ctx.rng().random_range(0..items.len());
            Ok(items[i].clone())
        }
        "sample" => {
            let items = args.required(0, "population", name)?.to_vec()?;
            let k = args.usize(1, "k", name)?;
            if k > items.len() {
                return Err(PuzzleError::random(
                    "sample",
                    format!("sample of {k} is larger than population of {}", items.len()),
                ));
            }
            let picked = index::sample(ctx.rng(), items.len(), k);
            Ok(Value::list(picked.iter().map(|i| items[i].clone()).collect()))
        }
        "shuffle" => {
            let mut items = args.required(0, "x", name)?.to_vec()?;
            items.shuffle(ctx.rng());
            Ok(Value::list(items))
        }
        _ => Err(PuzzleError::eval(format!("name '{name}' is not defined"))),
    }
}

fn float_arg(args: &Args, index: usize, keyword: &str, function: &str) -> Result<f64> {
    let value = args.required(index, keyword, function)?;
    value
        .as_f64()
        .filter(|f| f.is_finite())
        .ok_or_else(|| {
            PuzzleError::eval(format!(
                "{function}() argument '{keyword}' must be a finite number, not {}",
                value.type_name()
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn ctx(seed: u64) -> Context {
        Context::new(ChaCha8Rng::seed_from_u64(seed))
    }

    #[test]
    fn test_randint_stays_in_range() {
        let mut ctx = ctx(1);
        for _ in 0..50 {
            let v = ctx.eval_str("randint(3, 5)").unwrap();
            let n = v.as_int().unwrap();
            assert!((3..=5).contains(&n));
        }
    }

    #[test]
    fn test_same_seed_same_draws() {
        let a = ctx(42).eval_str("[randint(0, 1000) for _ in range(5)]").unwrap();
        let b = ctx(42).eval_str("[randint(0, 1000) for _ in range(5)]").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_sample_is_distinct_subset() {
        let mut ctx = ctx(7);
        let v = ctx.eval_str("sample([1, 2, 3, 4, 5], 3)").unwrap();
        let items = v.to_vec().unwrap();
        assert_eq!(items.len(), 3);
        let mut ints: Vec<i64> = items.iter().map(|v| v.as_int().unwrap()).collect();
        ints.sort();
        ints.dedup();
        assert_eq!(ints.len(), 3);
    }

    #[test]
    fn test_shuffle_returns_permutation() {
        let mut ctx = ctx(3);
        let v = ctx.eval_str("sorted(shuffle([3, 1, 2]))").unwrap();
        assert_eq!(v.to_string(), "[1, 2, 3]");
    }

    #[test]
    fn test_choice_of_empty_is_random_error() {
        let err = ctx(0).eval_str("choice([])").unwrap_err();
        assert_eq!(err.kind(), "RandomGenerationError");
    }

    #[test]
    fn test_sample_too_large_fails() {
        assert!(ctx(0).eval_str("sample([1, 2], 3)").is_err());
    }
}
