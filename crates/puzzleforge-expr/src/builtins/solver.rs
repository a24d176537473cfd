//! Solver-expression constructors and model readers.
//!
//! Constructors fold to concrete values when every operand is concrete, so
//! conditions over plain data stay plain booleans.

use indexmap::IndexMap;
use puzzleforge_core::{PuzzleError, Result, Sort, Term, TermRef};

use super::Args;
use crate::eval::compare::values_equal;
use crate::eval::ops::{bool_term, numeric_term};
use crate::scope::Context;
use crate::value::Value;

pub(super) const NAMES: &[&str] = &[
    "And", "Or", "Not", "Implies", "Xor", "If", "Sum", "Product", "Distinct", "Abs", "Int",
    "Bool", "Real", "BitVec", "Ints", "Bools", "Reals", "IntVal", "BoolVal", "is_true",
    "is_false", "get_value", "get_var_name",
];

pub(super) fn call(ctx: &mut Context, name: &str, args: Args) -> Result<Value> {
    match name {
        "And" | "Or" => connective(name == "And", args.variadic()?),
        "Not" => {
            let value = args.required(0, "a", name)?;
            match value.as_term() {
                Some(_) => Ok(Value::Term(Term::not(bool_term(value)?))),
                None => Ok(Value::Bool(!value.is_truthy()?)),
            }
        }
        "Implies" | "Xor" => {
            let a = args.required(0, "a", name)?;
            let b = args.required(1, "b", name)?;
            if !a.is_term() && !b.is_term() {
                let (a, b) = (a.is_truthy()?, b.is_truthy()?);
                return Ok(Value::Bool(if name == "Implies" { !a || b } else { a != b }));
            }
            let (a, b) = (bool_term(a)?, bool_term(b)?);
            Ok(Value::Term(if name == "Implies" {
                Term::implies(a, b)
            } else {
                Term::xor(a, b)
            }))
        }
        "If" => {
            let cond = args.required(0, "c", name)?;
            let then = args.required(1, "a", name)?;
            let otherwise = args.required(2, "b", name)?;
            if !cond.is_term() {
                return Ok(if cond.is_truthy()? { then.clone() } else { otherwise.clone() });
            }
            let (a, b) = (then.to_term()?, otherwise.to_term()?);
            let (a, b) = if a.is_boolean() && b.is_boolean() {
                (a, b)
            } else {
                (numeric_term(then)?, numeric_term(otherwise)?)
            };
            Ok(Value::Term(Term::ite(bool_term(cond)?, a, b)))
        }
        "Sum" | "Product" => fold_arith(name == "Sum", args.variadic()?),
        "Distinct" => {
            let items = args.variadic()?;
            if items.iter().any(Value::is_term) {
                let terms = items.iter().map(numeric_term).collect::<Result<Vec<_>>>()?;
                return Ok(Value::Term(Term::distinct(terms)));
            }
            let distinct = items
                .iter()
                .enumerate()
                .all(|(i, a)| items[i + 1..].iter().all(|b| !values_equal(a, b)));
            Ok(Value::Bool(distinct))
        }
        "Abs" => {
            let value = args.required(0, "a", name)?;
            if value.is_term() {
                return Ok(Value::Term(Term::abs(numeric_term(value)?)));
            }
            match value.untagged() {
                Value::Float(f) => Ok(Value::Float(f.abs())),
                v => v
                    .as_int()
                    .and_then(i64::checked_abs)
                    .map(Value::Int)
                    .ok_or_else(|| PuzzleError::eval(format!("Abs() of {}", v.repr()))),
            }
        }
        "Int" | "Bool" | "Real" => {
            let var_name = args.str(0, "name", name)?.to_string();
            let sort = scalar_sort(name);
            Ok(Value::Term(ctx.vars_mut().declare(&var_name, sort, None)?))
        }
        "BitVec" => {
            let var_name = args.str(0, "name", name)?.to_string();
            let bits = args.int(1, "bv", name)?;
            let bits = u32::try_from(bits)
                .ok()
                .filter(|b| (1..=62).contains(b))
                .ok_or_else(|| PuzzleError::eval(format!("BitVec() width {bits} is out of range")))?;
            Ok(Value::Term(ctx.vars_mut().declare(&var_name, Sort::BitVec(bits), None)?))
        }
        "Ints" | "Bools" | "Reals" => {
            let names = args.required(0, "names", name)?;
            let names: Vec<String> = match names.as_str() {
                Some(s) => s.split_whitespace().map(str::to_string).collect(),
                None => names.to_vec()?.iter().map(|v| v.to_string()).collect(),
            };
            let sort = scalar_sort(name.trim_end_matches('s'));
            let vars = ctx.vars_mut();
            let terms = names
                .iter()
                .map(|n| vars.declare(n, sort, None).map(Value::Term))
                .collect::<Result<Vec<_>>>()?;
            Ok(Value::list(terms))
        }
        "IntVal" => Ok(Value::Term(Term::int(args.int(0, "val", name)?))),
        "BoolVal" => Ok(Value::Term(Term::bool(args.required(0, "val", name)?.is_truthy()?))),
        "is_true" | "is_false" => {
            let value = args.required(0, "a", name)?;
            let truth = match value.as_term() {
                Some(term) => term.as_const().and_then(|c| c.as_bool()),
                None => match value.untagged() {
                    Value::Bool(b) => Some(*b),
                    _ => None,
                },
            };
            Ok(Value::Bool(truth == Some(name == "is_true")))
        }
        "get_value" => {
            let model = match args.required(0, "sol", name)?.untagged() {
                Value::Model(model) => model.clone(),
                other => {
                    return Err(PuzzleError::eval(format!(
                        "get_value() expects a model, not {}",
                        other.type_name()
                    )))
                }
            };
            read_model(&model, args.required(1, "vars", name)?)
        }
        "get_var_name" => {
            let value = args.required(0, "var", name)?;
            value
                .as_term()
                .and_then(|t| t.as_var())
                .map(|v| Value::str(&v.name))
                .ok_or_else(|| PuzzleError::eval(format!("{} is not a solver variable", value.repr())))
        }
        _ => Err(PuzzleError::eval(format!("name '{name}' is not defined"))),
    }
}

fn scalar_sort(name: &str) -> Sort {
    match name {
        "Bool" => Sort::Bool,
        "Real" => Sort::Real,
        _ => Sort::Int,
    }
}

fn connective(and: bool, items: Vec<Value>) -> Result<Value> {
    let mut terms = Vec::with_capacity(items.len());
    let mut concrete = and;
    for item in &items {
        if item.is_term() {
            terms.push(bool_term(item)?);
        } else if and {
            concrete &= item.is_truthy()?;
        } else {
            concrete |= item.is_truthy()?;
        }
    }
    if terms.is_empty() {
        return Ok(Value::Bool(concrete));
    }
    if concrete != and {
        return Ok(Value::Bool(concrete));
    }
    Ok(Value::Term(if and { Term::and(terms) } else { Term::or(terms) }))
}

fn fold_arith(sum: bool, items: Vec<Value>) -> Result<Value> {
    if items.iter().any(Value::is_term) {
        let terms: Vec<TermRef> = items.iter().map(numeric_term).collect::<Result<_>>()?;
        return Ok(Value::Term(if sum { Term::add(terms) } else { Term::mul(terms) }));
    }
    let mut int_acc: Option<i64> = Some(if sum { 0 } else { 1 });
    let mut float_acc: f64 = if sum { 0.0 } else { 1.0 };
    for item in &items {
        let f = item.as_f64().ok_or_else(|| {
            PuzzleError::eval(format!(
                "unsupported operand type for {}: '{}'",
                if sum { "Sum" } else { "Product" },
                item.type_name()
            ))
        })?;
        float_acc = if sum { float_acc + f } else { float_acc * f };
        int_acc = match (int_acc, item.untagged()) {
            (Some(_), Value::Float(_)) => None,
            (Some(acc), v) => v.as_int().and_then(|i| {
                if sum {
                    acc.checked_add(i)
                } else {
                    acc.checked_mul(i)
                }
            }),
            (None, _) => None,
        };
    }
    Ok(match int_acc {
        Some(i) => Value::Int(i),
        None => Value::Float(float_acc),
    })
}

/// Reads `vars` under `model`, keeping the container shape.
fn read_model(model: &puzzleforge_core::Model, vars: &Value) -> Result<Value> {
    match vars.untagged() {
        Value::Term(term) => model.eval(term).map(Value::from_const),
        Value::List(items) => Ok(Value::list(
            items.iter().map(|v| read_model(model, v)).collect::<Result<_>>()?,
        )),
        Value::Tuple(items) => Ok(Value::tuple(
            items.iter().map(|v| read_model(model, v)).collect::<Result<_>>()?,
        )),
        Value::Map(map) => {
            let mut out = IndexMap::with_capacity(map.len());
            for (k, v) in map.iter() {
                out.insert(k.clone(), read_model(model, v)?);
            }
            Ok(Value::map(out))
        }
        Value::Family(family) => {
            let mut out = IndexMap::with_capacity(family.len());
            for item in family.items() {
                if let [k, v] = item.to_vec()?.as_slice() {
                    out.insert(k.clone(), read_model(model, v)?);
                }
            }
            Ok(Value::map(out))
        }
        other => Ok(other.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn ctx() -> Context {
        Context::new(ChaCha8Rng::seed_from_u64(0))
    }

    #[test]
    fn test_and_folds_concrete_operands() {
        let mut ctx = ctx();
        assert_eq!(ctx.eval_str("And(True, 1 < 2)").unwrap(), Value::Bool(true));
        assert_eq!(ctx.eval_str("Or([False, 0])").unwrap(), Value::Bool(false));
    }

    #[test]
    fn test_and_short_circuits_on_concrete_false() {
        let mut ctx = ctx();
        let x = ctx.eval_str("Bool('x')").unwrap();
        ctx.set_global("x", x);
        assert_eq!(ctx.eval_str("And(x, False)").unwrap(), Value::Bool(false));
        assert!(ctx.eval_str("And(x, True)").unwrap().is_term());
    }

    #[test]
    fn test_declared_variables_are_shared_by_name() {
        let mut ctx = ctx();
        let a = ctx.eval_str("Int('a')").unwrap();
        let b = ctx.eval_str("Ints('a b')").unwrap();
        assert_eq!(ctx.vars().len(), 2);
        assert_eq!(b.to_vec().unwrap()[0].to_string(), a.to_string());
    }

    #[test]
    fn test_sort_conflict_is_an_error() {
        let mut ctx = ctx();
        ctx.eval_str("Int('a')").unwrap();
        assert!(ctx.eval_str("Bool('a')").is_err());
    }

    #[test]
    fn test_sum_of_terms_is_symbolic() {
        let mut ctx = ctx();
        let v = ctx.eval_str("Sum([Int('a'), 2])").unwrap();
        assert!(v.is_term());
        assert_eq!(ctx.eval_str("Sum(1, 2, 3)").unwrap(), Value::Int(6));
        assert_eq!(ctx.eval_str("Product([2, 2.5])").unwrap(), Value::Float(5.0));
    }

    #[test]
    fn test_distinct_concrete() {
        let mut ctx = ctx();
        assert_eq!(ctx.eval_str("Distinct(1, 2, 3)").unwrap(), Value::Bool(true));
        assert_eq!(ctx.eval_str("Distinct([1, 2, 1])").unwrap(), Value::Bool(false));
    }

    #[test]
    fn test_is_true_only_for_constants() {
        let mut ctx = ctx();
        assert_eq!(ctx.eval_str("is_true(True)").unwrap(), Value::Bool(true));
        assert_eq!(ctx.eval_str("is_false(Bool('p'))").unwrap(), Value::Bool(false));
    }

    #[test]
    fn test_get_var_name() {
        let mut ctx = ctx();
        let v = ctx.eval_str("get_var_name(Int('weight'))").unwrap();
        assert_eq!(v.as_str(), Some("weight"));
    }
}
