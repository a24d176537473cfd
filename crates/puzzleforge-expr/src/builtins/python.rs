//! Python-style builtins.

use std::sync::Arc;

use indexmap::IndexMap;
use puzzleforge_core::{PuzzleError, Result, Term};

use super::Args;
use crate::ast::{BinOp, CmpKind};
use crate::eval::compare::{sort_by_keys, sort_values, try_compare};
use crate::eval::ops::{self, bool_term, numeric_term};
use crate::scope::Context;
use crate::value::Value;

pub(super) const NAMES: &[&str] = &[
    "len", "range", "sum", "min", "max", "abs", "int", "float", "str", "repr", "bool", "list",
    "tuple", "dict", "set", "sorted", "reversed", "enumerate", "zip", "any", "all", "round", "map",
    "filter", "chr", "ord", "pow",
];

/// Longest list `range` may materialize.
const MAX_RANGE_LEN: i64 = 10_000_000;

pub(super) fn call(ctx: &mut Context, name: &str, args: Args) -> Result<Value> {
    match name {
        "len" => len(args.required(0, "obj", name)?),
        "range" => range(&args),
        "sum" => sum(&args),
        "min" | "max" => extreme(ctx, name, &args),
        "abs" => {
            let value = args.required(0, "x", name)?;
            if value.is_term() {
                return Ok(Value::Term(Term::abs(numeric_term(value)?)));
            }
            match value.untagged() {
                Value::Float(f) => Ok(Value::Float(f.abs())),
                v => v
                    .as_int()
                    .and_then(i64::checked_abs)
                    .map(Value::Int)
                    .ok_or_else(|| PuzzleError::eval(format!("bad operand type for abs(): '{}'", v.type_name()))),
            }
        }
        "int" => to_int(args.get(0, "x").unwrap_or(&Value::Int(0))),
        "float" => to_float(args.get(0, "x").unwrap_or(&Value::Float(0.0))),
        "str" => Ok(Value::from(
            args.get(0, "object").map(|v| v.to_string()).unwrap_or_default(),
        )),
        "repr" => Ok(Value::from(args.required(0, "object", name)?.repr())),
        "bool" => Ok(Value::Bool(match args.get(0, "x") {
            Some(v) => v.is_truthy()?,
            None => false,
        })),
        "list" => Ok(Value::list(match args.get(0, "iterable") {
            Some(v) => v.to_vec()?,
            None => Vec::new(),
        })),
        "tuple" => Ok(Value::tuple(match args.get(0, "iterable") {
            Some(v) => v.to_vec()?,
            None => Vec::new(),
        })),
        "set" => Ok(Value::set(match args.get(0, "iterable") {
            Some(v) => v.to_vec()?.into_iter().collect(),
            None => Default::default(),
        })),
        "dict" => dict(&args),
        "sorted" => sorted(ctx, &args),
        "reversed" => {
            let mut items = args.required(0, "seq", name)?.to_vec()?;
            items.reverse();
            Ok(Value::list(items))
        }
        "enumerate" => {
            let start = match args.get(1, "start") {
                Some(v) => v.as_int().unwrap_or(0),
                None => 0,
            };
            let items = args.required(0, "iterable", name)?.to_vec()?;
            Ok(Value::list(
                items
                    .into_iter()
                    .enumerate()
                    .map(|(i, v)| Value::tuple(vec![Value::Int(start + i as i64), v]))
                    .collect(),
            ))
        }
        "zip" => {
            let lists = args
                .positional()
                .iter()
                .map(Value::to_vec)
                .collect::<Result<Vec<_>>>()?;
            let shortest = lists.iter().map(Vec::len).min().unwrap_or(0);
            Ok(Value::list(
                (0..shortest)
                    .map(|i| Value::tuple(lists.iter().map(|l| l[i].clone()).collect()))
                    .collect(),
            ))
        }
        "any" | "all" => any_all(name == "all", args.required(0, "iterable", name)?),
        "round" => round(&args),
        "map" => {
            let function = args.required(0, "function", name)?.clone();
            let lists = args.positional().get(1..).unwrap_or_default()
                .iter()
                .map(Value::to_vec)
                .collect::<Result<Vec<_>>>()?;
            if lists.is_empty() {
                return Err(PuzzleError::eval("map() must have at least two arguments"));
            }
            let shortest = lists.iter().map(Vec::len).min().unwrap_or(0);
            let mut out = Vec::with_capacity(shortest);
            for i in 0..shortest {
                let call_args = lists.iter().map(|l| l[i].clone()).collect();
                out.push(ctx.call(&function, call_args, Vec::new())?);
            }
            Ok(Value::list(out))
        }
        "filter" => {
            let function = args.required(0, "function", name)?.clone();
            let items = args.required(1, "iterable", name)?.to_vec()?;
            let mut out = Vec::new();
            for item in items {
                let keep = match function {
                    Value::None => item.is_truthy()?,
                    _ => ctx.call(&function, vec![item.clone()], Vec::new())?.is_truthy()?,
                };
                if keep {
                    out.push(item);
                }
            }
            Ok(Value::list(out))
        }
        "chr" => {
            let code = args.int(0, "i", name)?;
            u32::try_from(code)
                .ok()
                .and_then(char::from_u32)
                .map(|c| Value::from(c.to_string()))
                .ok_or_else(|| PuzzleError::eval(format!("chr() arg not in range: {code}")))
        }
        "ord" => {
            let s = args.str(0, "c", name)?;
            let mut chars = s.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Ok(Value::Int(i64::from(u32::from(c)))),
                _ => Err(PuzzleError::eval(format!(
                    "ord() expected a character, but string of length {} found",
                    s.chars().count()
                ))),
            }
        }
        "pow" => {
            let base = args.required(0, "base", name)?;
            let exp = args.required(1, "exp", name)?;
            let result = ops::binary(BinOp::Pow, base, exp)?;
            match args.get(2, "mod") {
                Some(m) if !matches!(m, Value::None) => ops::binary(BinOp::Mod, &result, m),
                _ => Ok(result),
            }
        }
        _ => Err(PuzzleError::eval(format!("name '{name}' is not defined"))),
    }
}

fn len(value: &Value) -> Result<Value> {
    let n = match value.untagged() {
        Value::Str(s) => s.chars().count(),
        Value::List(items) | Value::Tuple(items) => items.len(),
        Value::Map(m) => m.len(),
        Value::Set(s) => s.len(),
        Value::Family(f) => f.len(),
        Value::Model(m) => m.len(),
        other => {
            return Err(PuzzleError::eval(format!(
                "object of type '{}' has no len()",
                other.type_name()
            )))
        }
    };
    Ok(Value::from(n))
}

fn range(args: &Args) -> Result<Value> {
    let ints = args
        .positional()
        .iter()
        .map(|v| {
            v.as_int().ok_or_else(|| {
                PuzzleError::eval(format!(
                    "'{}' object cannot be interpreted as an integer",
                    v.type_name()
                ))
            })
        })
        .collect::<Result<Vec<_>>>()?;
    let (start, stop, step) = match ints.as_slice() {
        [stop] => (0, *stop, 1),
        [start, stop] => (*start, *stop, 1),
        [start, stop, step] => (*start, *stop, *step),
        _ => return Err(PuzzleError::eval("range expected 1 to 3 integer arguments")),
    };
    if step == 0 {
        return Err(PuzzleError::eval("range() arg 3 must not be zero"));
    }
    let count = if step > 0 {
        (stop - start + step - 1).max(0) / step
    } else {
        (start - stop - step - 1).max(0) / -step
    };
    if count > MAX_RANGE_LEN {
        return Err(PuzzleError::eval(format!("range of {count} items is too large")));
    }
    Ok(Value::list(
        (0..count).map(|i| Value::Int(start + i * step)).collect(),
    ))
}

fn sum(args: &Args) -> Result<Value> {
    let items = args.required(0, "iterable", "sum")?.to_vec()?;
    let start = args.get(1, "start").cloned().unwrap_or(Value::Int(0));
    if items.iter().any(Value::is_term) {
        let mut parts = Vec::with_capacity(items.len() + 1);
        if start.as_int() != Some(0) {
            parts.push(numeric_term(&start)?);
        }
        for item in &items {
            parts.push(numeric_term(item)?);
        }
        return Ok(Value::Term(Term::add(parts)));
    }
    let mut acc = start;
    for item in &items {
        acc = ops::binary(BinOp::Add, &acc, item)?;
    }
    Ok(acc)
}

fn extreme(ctx: &mut Context, name: &str, args: &Args) -> Result<Value> {
    let items = match args.positional() {
        [single] => single.to_vec()?,
        many => many.to_vec(),
    };
    if items.is_empty() {
        return match args.keyword("default") {
            Some(d) => Ok(d.clone()),
            None => Err(PuzzleError::eval(format!("{name}() arg is an empty sequence"))),
        };
    }
    let want = if name == "max" { CmpKind::Gt } else { CmpKind::Lt };
    let key = args.keyword("key").cloned();
    if items.iter().any(Value::is_term) && key.is_none() {
        let mut best = items[0].clone();
        for item in &items[1..] {
            let better = ops::compare(want, item, &best)?;
            best = Value::Term(Term::ite(bool_term(&better)?, numeric_term(item)?, numeric_term(&best)?));
        }
        return Ok(best);
    }
    let mut best = items[0].clone();
    let mut best_key = match &key {
        Some(f) => ctx.call(f, vec![best.clone()], Vec::new())?,
        None => best.clone(),
    };
    for item in &items[1..] {
        let item_key = match &key {
            Some(f) => ctx.call(f, vec![item.clone()], Vec::new())?,
            None => item.clone(),
        };
        let ord = try_compare(&item_key, &best_key, if name == "max" { ">" } else { "<" })?;
        let better = match want {
            CmpKind::Gt => ord.is_gt(),
            _ => ord.is_lt(),
        };
        if better {
            best = item.clone();
            best_key = item_key;
        }
    }
    Ok(best)
}

fn to_int(value: &Value) -> Result<Value> {
    match value.untagged() {
        Value::Float(f) if f.is_finite() => Ok(Value::Int(f.trunc() as i64)),
        Value::Str(s) => {
            let text = s.trim().replace('_', "");
            text.parse::<i64>().map(Value::Int).map_err(|_| {
                PuzzleError::eval(format!("invalid literal for int() with base 10: {}", value.repr()))
            })
        }
        v => v.as_int().map(Value::Int).ok_or_else(|| {
            PuzzleError::eval(format!(
                "int() argument must be a string or a number, not '{}'",
                v.type_name()
            ))
        }),
    }
}

fn to_float(value: &Value) -> Result<Value> {
    match value.untagged() {
        Value::Str(s) => {
            let text = s.trim().to_ascii_lowercase();
            let parsed = match text.as_str() {
                "inf" | "+inf" | "infinity" => Ok(f64::INFINITY),
                "-inf" | "-infinity" => Ok(f64::NEG_INFINITY),
                "nan" => Ok(f64::NAN),
                other => other.parse::<f64>(),
            };
            parsed.map(Value::Float).map_err(|_| {
                PuzzleError::eval(format!("could not convert string to float: {}", value.repr()))
            })
        }
        v => v.as_f64().map(Value::Float).ok_or_else(|| {
            PuzzleError::eval(format!(
                "float() argument must be a string or a number, not '{}'",
                v.type_name()
            ))
        }),
    }
}

fn dict(args: &Args) -> Result<Value> {
    let mut map = IndexMap::new();
    if let Some(source) = args.positional().first() {
        match source.untagged() {
            Value::Map(m) => map.extend(m.iter().map(|(k, v)| (k.clone(), v.clone()))),
            other => {
                for pair in other.to_vec()? {
                    match pair.to_vec()?.as_slice() {
                        [k, v] => {
                            map.insert(k.clone(), v.clone());
                        }
                        _ => {
                            return Err(PuzzleError::eval(
                                "dictionary update sequence element must have length 2",
                            ))
                        }
                    }
                }
            }
        }
    }
    for (k, v) in &args.keywords {
        map.insert(Value::Str(Arc::clone(k)), v.clone());
    }
    Ok(Value::map(map))
}

fn sorted(ctx: &mut Context, args: &Args) -> Result<Value> {
    let mut items = args.required(0, "iterable", "sorted")?.to_vec()?;
    let reverse = match args.keyword("reverse") {
        Some(v) => v.is_truthy()?,
        None => false,
    };
    match args.keyword("key").filter(|k| !matches!(k, Value::None)) {
        Some(key) => {
            let key = key.clone();
            let keys = items
                .iter()
                .map(|item| ctx.call(&key, vec![item.clone()], Vec::new()))
                .collect::<Result<Vec<_>>>()?;
            items = sort_by_keys(items, keys)?;
        }
        None => sort_values(&mut items)?,
    }
    if reverse {
        items.reverse();
    }
    Ok(Value::list(items))
}

fn any_all(all: bool, iterable: &Value) -> Result<Value> {
    let items = iterable.to_vec()?;
    let mut terms = Vec::new();
    for item in &items {
        if item.is_term() {
            terms.push(bool_term(item)?);
            continue;
        }
        let truthy = item.is_truthy()?;
        if all && !truthy {
            return Ok(Value::Bool(false));
        }
        if !all && truthy {
            return Ok(Value::Bool(true));
        }
    }
    if terms.is_empty() {
        return Ok(Value::Bool(all));
    }
    Ok(Value::Term(if all {
        Term::and(terms)
    } else {
        Term::or(terms)
    }))
}

fn round(args: &Args) -> Result<Value> {
    let value = args.required(0, "number", "round")?;
    let digits = args.get(1, "ndigits").filter(|v| !matches!(v, Value::None));
    match (value.untagged(), digits) {
        (Value::Float(f), None) => Ok(Value::Int(f.round_ties_even() as i64)),
        (Value::Float(f), Some(d)) => {
            let d = d
                .as_int()
                .ok_or_else(|| PuzzleError::eval("round() ndigits must be an integer"))?;
            let scale = 10f64.powi(d as i32);
            Ok(Value::Float((f * scale).round_ties_even() / scale))
        }
        (v, _) => v.as_int().map(Value::Int).ok_or_else(|| {
            PuzzleError::eval(format!(
                "type {} doesn't define __round__ method",
                v.type_name()
            ))
        }),
    }
}
