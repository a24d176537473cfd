//! Puzzle-authoring helpers: provenance readers, counting conditions, and
//! random data generators.

use indexmap::IndexSet;
use puzzleforge_core::{CmpOp, PuzzleError, Result, Term, TermRef};
use puzzleforge_sampler::{pool, random_list, random_partition, Element, ElementDomain};
use rand::seq::{index, SliceRandom};
use tracing::debug;

use super::{solver, Args};
use crate::ast::{BinOp, CmpKind};
use crate::eval::ops::{self, bool_term};
use crate::provenance::Field;
use crate::scope::Context;
use crate::value::Value;

pub(super) const NAMES: &[&str] = &[
    "get_p",
    "get_desc",
    "desc",
    "get_data",
    "data",
    "event_count",
    "multi_event_count",
    "make_expr",
    "to_unique",
    "to_hashable",
    "generate_letters",
    "generate_var_names",
    "generate_random_list",
    "generate_random_list_with_total",
    "choose",
];

const CN_LETTERS: &str = "甲乙丙丁戊己庚辛壬癸子丑寅卯辰巳午未申酉戌亥";

pub(super) fn call(ctx: &mut Context, name: &str, args: Args) -> Result<Value> {
    match name {
        "get_p" => {
            let sym = args.required(0, "sym", name)?;
            let key = args.required(1, "p", name)?;
            ctx.provenance().param(sym, key)
        }
        "get_desc" | "desc" => ctx
            .provenance()
            .field(args.required(0, "sym", name)?, Field::Desc),
        "get_data" | "data" => ctx
            .provenance()
            .field(args.required(0, "cond", name)?, Field::Data),
        "event_count" => event_count(&args),
        "multi_event_count" => multi_event_count(&args),
        "make_expr" => make_expr(ctx, &args),
        "to_hashable" => Ok(to_hashable(args.required(0, "element", name)?)),
        "to_unique" => Ok(to_unique(args.required(0, "l", name)?)),
        "generate_letters" => {
            let n = args.usize(0, "n", name)?;
            let lang = match args.get(1, "lang") {
                Some(v) => v.as_str().unwrap_or("en").to_string(),
                None => "en".to_string(),
            };
            Ok(generate_letters(ctx, n, &lang))
        }
        "generate_var_names" => Ok(generate_var_names(args.usize(0, "n", name)?)),
        "generate_random_list" => generate_random_list(ctx, &args),
        "generate_random_list_with_total" => generate_random_list_with_total(ctx, &args),
        "choose" => choose(ctx, &args),
        _ => Err(PuzzleError::eval(format!("name '{name}' is not defined"))),
    }
}

/// Events of a family, map, or plain iterable.
fn event_list(events: &Value) -> Result<Vec<Value>> {
    match events.untagged() {
        Value::Family(family) => Ok(family.to_list()),
        Value::Map(map) => Ok(map.values().cloned().collect()),
        other => other.to_vec(),
    }
}

fn indicator(event: &Value) -> Result<TermRef> {
    Ok(Term::ite(bool_term(event)?, Term::int(1), Term::int(0)))
}

fn event_count(args: &Args) -> Result<Value> {
    let events = event_list(args.required(0, "events", "event_count")?)?;
    let fact = args.str(1, "fact", "event_count")?;
    let num = match args.get(2, "num") {
        Some(v) => v
            .as_int()
            .ok_or_else(|| PuzzleError::eval("event_count() num must be an integer"))?,
        None => 0,
    };
    let num = num.clamp(0, events.len() as i64);
    let count = || -> Result<TermRef> {
        Ok(Term::add(events.iter().map(indicator).collect::<Result<Vec<_>>>()?))
    };
    let condition = match fact {
        "most" => Term::cmp(CmpOp::Le, count()?, Term::int(num)),
        "least" => Term::cmp(CmpOp::Ge, count()?, Term::int(num)),
        "equal" => Term::eq(count()?, Term::int(num)),
        "distinct" => Term::distinct(events.iter().map(|e| e.to_term()).collect::<Result<Vec<_>>>()?),
        other => {
            return Err(PuzzleError::eval(format!(
                "event_count() fact must be most, least, equal or distinct, not '{other}'"
            )))
        }
    };
    Ok(Value::list(vec![Value::Term(condition)]))
}

fn multi_event_count(args: &Args) -> Result<Value> {
    let groups = event_list(args.required(0, "events", "multi_event_count")?)?;
    let op = args.str(1, "op", "multi_event_count")?;
    if op != "wc" {
        return Err(PuzzleError::eval(format!(
            "multi_event_count() does not support operator '{op}'"
        )));
    }
    let target = args.required(2, "target", "multi_event_count")?.to_vec()?;
    let group_counts = groups
        .iter()
        .map(|group| {
            let events = event_list(group)?;
            Ok(Term::add(events.iter().map(indicator).collect::<Result<Vec<_>>>()?))
        })
        .collect::<Result<Vec<_>>>()?;
    let mut constraints = Vec::new();
    for (i, required) in target.iter().enumerate() {
        let required = required.as_int().ok_or_else(|| {
            PuzzleError::eval(format!("invalid target count at index {i}: {}", required.repr()))
        })?;
        if required < 0 {
            return Err(PuzzleError::eval(format!(
                "invalid target count at index {i}: {required}"
            )));
        }
        if required == 0 {
            continue;
        }
        let actual = Term::add(group_counts.iter().map(|gc| {
            Term::ite(
                Term::eq(gc.clone(), Term::int(i as i64)),
                Term::int(1),
                Term::int(0),
            )
        }));
        constraints.push(Value::Term(Term::eq(actual, Term::int(required))));
    }
    Ok(Value::list(constraints))
}

fn make_expr(ctx: &mut Context, args: &Args) -> Result<Value> {
    let op = args.str(0, "op", "make_expr")?.to_string();
    let operands = args.positional().get(1..).map(<[Value]>::to_vec).unwrap_or_default();
    let binary = |operands: &[Value]| -> Result<(Value, Value)> {
        match operands {
            [a, b] => Ok((a.clone(), b.clone())),
            _ => Err(PuzzleError::eval(format!(
                "operator '{op}' requires exactly 2 operands"
            ))),
        }
    };
    let compare = |kind: CmpKind, operands: &[Value]| -> Result<Value> {
        let (a, b) = binary(operands)?;
        ops::compare(kind, &a, &b)
    };
    let arith = |bin: BinOp, operands: &[Value]| -> Result<Value> {
        let (a, b) = binary(operands)?;
        ops::binary(bin, &a, &b)
    };
    match op.as_str() {
        "eq" | "==" => compare(CmpKind::Eq, &operands),
        "neq" | "ne" | "!=" => compare(CmpKind::Ne, &operands),
        "gt" | ">" => compare(CmpKind::Gt, &operands),
        "ge" | ">=" => compare(CmpKind::Ge, &operands),
        "lt" | "<" => compare(CmpKind::Lt, &operands),
        "le" | "<=" => compare(CmpKind::Le, &operands),
        "and" | "&&" => solver::call(ctx, "And", Args::new(operands, Vec::new())),
        "or" | "||" => solver::call(ctx, "Or", Args::new(operands, Vec::new())),
        "not" | "!" => {
            if operands.len() != 1 {
                return Err(PuzzleError::eval(format!(
                    "operator '{op}' requires exactly 1 operand"
                )));
            }
            solver::call(ctx, "Not", Args::new(operands, Vec::new()))
        }
        "implies" | "=>" => solver::call(ctx, "Implies", Args::new(operands, Vec::new())),
        "add" => solver::call(ctx, "Sum", Args::new(vec![Value::list(operands)], Vec::new())),
        "+" => {
            binary(&operands)?;
            solver::call(ctx, "Sum", Args::new(vec![Value::list(operands)], Vec::new()))
        }
        "sub" | "-" => arith(BinOp::Sub, &operands),
        "mul" | "*" => arith(BinOp::Mul, &operands),
        "div" | "/" => arith(BinOp::Div, &operands),
        other => Err(PuzzleError::eval(format!("unsupported operator: '{other}'"))),
    }
}

/// Lists become tuples, recursively.
fn to_hashable(value: &Value) -> Value {
    match value.untagged() {
        Value::List(items) => Value::tuple(items.iter().map(to_hashable).collect()),
        _ => value.clone(),
    }
}

/// Order-preserving deduplication of a list; anything else is returned as is.
fn to_unique(value: &Value) -> Value {
    let Value::List(items) = value.untagged() else {
        return value.clone();
    };
    let mut seen = IndexSet::with_capacity(items.len());
    let mut out = Vec::with_capacity(items.len());
    for item in items.iter() {
        if seen.insert(to_hashable(item)) {
            out.push(item.clone());
        }
    }
    Value::list(out)
}

fn generate_letters(ctx: &mut Context, n: usize, lang: &str) -> Value {
    if lang == "en" {
        let base = char::from(b'A' + (ctx.letter_cursor % 26) as u8);
        ctx.letter_cursor += 1;
        return Value::list((1..=n).map(|i| Value::from(format!("{base}{i}"))).collect());
    }
    Value::from(CN_LETTERS.chars().take(n).collect::<String>())
}

fn generate_var_names(n: usize) -> Value {
    let names: Vec<String> = if n <= 3 {
        ["x", "y", "z"][..n].iter().map(|s| s.to_string()).collect()
    } else if n <= 11 {
        ["p", "q", "r", "s", "t", "u", "v", "w", "x", "y", "z"][..n]
            .iter()
            .map(|s| s.to_string())
            .collect()
    } else {
        (1..=n).map(|i| format!("x{i}")).collect()
    };
    Value::list(names.into_iter().map(Value::from).collect())
}

fn range_domain(kind: &str, domain: &Value, what: &str) -> Result<ElementDomain<Value>> {
    let bounds = domain.to_vec()?;
    if bounds.len() < 2 {
        return Err(PuzzleError::random(
            "generate_random_list",
            format!("{what} must have at least two elements for {kind} elements"),
        ));
    }
    let domain = if kind == "int" {
        let lo = bounds[0].as_int();
        let hi = bounds[1].as_int();
        match (lo, hi) {
            (Some(lo), Some(hi)) if lo <= hi => ElementDomain::IntRange(lo, hi),
            _ => {
                return Err(PuzzleError::random(
                    "generate_random_list",
                    format!("{what} must be an integer range [min, max]"),
                ))
            }
        }
    } else {
        match (bounds[0].as_f64(), bounds[1].as_f64()) {
            (Some(lo), Some(hi)) if lo <= hi => ElementDomain::FloatRange(lo, hi),
            _ => {
                return Err(PuzzleError::random(
                    "generate_random_list",
                    format!("{what} must be a numeric range [min, max]"),
                ))
            }
        }
    };
    Ok(domain)
}

fn element_domain(kind: &str, domain: &Value, what: &str) -> Result<ElementDomain<Value>> {
    match kind {
        "int" | "float" => range_domain(kind, domain, what),
        _ => {
            let values = domain.to_vec()?;
            if values.is_empty() {
                return Err(PuzzleError::random(
                    "generate_random_list",
                    format!("{what} must be a non-empty list for {kind} elements"),
                ));
            }
            Ok(ElementDomain::Choices(values))
        }
    }
}

fn generate_random_list(ctx: &mut Context, args: &Args) -> Result<Value> {
    const NAME: &str = "generate_random_list";
    let size = args.int(0, "size", NAME)?;
    if size <= 0 {
        return Err(PuzzleError::random(NAME, "size must be a positive integer"));
    }
    let size = size as usize;
    let kind = args.str(1, "ele_type", NAME)?.to_string();
    if !matches!(kind.as_str(), "int" | "bool" | "float" | "enum") {
        return Err(PuzzleError::random(NAME, format!("unsupported element type: {kind}")));
    }
    let domain = element_domain(&kind, args.required(2, "ele_domain", NAME)?, "ele_domain")?;

    let mut conditions = Vec::new();
    if let Some(cond) = args.get(3, "cond").filter(|v| !matches!(v, Value::None)) {
        for c in cond.to_vec()? {
            conditions.push(match c.as_str() {
                Some(source) => ctx.compile_function(source).map_err(|e| {
                    PuzzleError::random(NAME, format!("invalid condition string {}: {e}", c.repr()))
                })?,
                None => c,
            });
        }
    }

    let per_element = match args.get(4, "per_ele_domain").filter(|v| !matches!(v, Value::None)) {
        Some(per) => {
            let items = per.to_vec()?;
            if items.len() != size {
                return Err(PuzzleError::random(NAME, "per_ele_domain length must match size"));
            }
            let mut domains = Vec::with_capacity(size);
            for (i, item) in items.iter().enumerate() {
                domains.push(match item {
                    Value::None => None,
                    d => Some(element_domain(&kind, d, &format!("domain for index {i}"))?),
                });
            }
            Some(domains)
        }
        None => None,
    };

    let max_attempts = ctx.max_attempts();
    for attempt in 0..max_attempts {
        let drawn = random_list(size, &domain, per_element.as_deref(), 1, ctx.rng(), |_| Ok(true))?;
        let list = Value::list(
            drawn
                .into_iter()
                .map(|e| match e {
                    Element::Int(i) => Value::Int(i),
                    Element::Float(f) => Value::Float(f),
                    Element::Choice(v) => v,
                })
                .collect(),
        );
        let mut satisfied = true;
        for condition in &conditions {
            let holds = ctx
                .call(condition, vec![list.clone()], Vec::new())
                .and_then(|v| v.is_truthy())
                .unwrap_or(false);
            if !holds {
                satisfied = false;
                break;
            }
        }
        if satisfied {
            return Ok(list);
        }
        debug!(event = "random_list_retry", attempt);
    }
    Err(PuzzleError::random(
        NAME,
        format!("no list satisfied the conditions after {max_attempts} attempts"),
    ))
}

fn int_pair(value: &Value, what: &str) -> Result<(i64, i64)> {
    match value.to_vec()?.as_slice() {
        [lo, hi] => match (lo.untagged(), hi.untagged()) {
            (Value::Int(lo), Value::Int(hi)) => Ok((*lo, *hi)),
            _ => Err(PuzzleError::random(
                "generate_random_list_with_total",
                format!("{what} must be a list of two integers"),
            )),
        },
        _ => Err(PuzzleError::random(
            "generate_random_list_with_total",
            format!("{what} must be a list of two integers"),
        )),
    }
}

fn generate_random_list_with_total(ctx: &mut Context, args: &Args) -> Result<Value> {
    const NAME: &str = "generate_random_list_with_total";
    let size = args.int(0, "size", NAME)?;
    if size <= 0 {
        return Err(PuzzleError::random(NAME, "size must be a positive integer"));
    }
    let size = size as usize;
    let range = int_pair(args.required(1, "ele_domain", NAME)?, "ele_domain")?;
    let total = args.int(2, "total", NAME)?;
    let per_element = match args.get(3, "per_ele_domain").filter(|v| !matches!(v, Value::None)) {
        Some(per) => {
            let items = per.to_vec()?;
            if items.len() != size {
                return Err(PuzzleError::random(NAME, "per_ele_domain length must match size"));
            }
            Some(
                items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| match item {
                        Value::None => Ok(None),
                        d => int_pair(d, &format!("domain for index {i}")).map(Some),
                    })
                    .collect::<Result<Vec<_>>>()?,
            )
        }
        None => None,
    };
    let values = random_partition(size, range, total, per_element.as_deref(), ctx.rng())?;
    Ok(Value::list(values.into_iter().map(Value::Int).collect()))
}

fn choose(ctx: &mut Context, args: &Args) -> Result<Value> {
    let candidates = event_list(args.required(0, "candidates", "choose")?)?;
    let group_size = args.usize(1, "group_size", "choose")?;
    let group_num = args.usize(2, "group_num", "choose")?;

    let mut unique: IndexSet<Value> = IndexSet::new();
    for combination in pool::combinations_of(&candidates, group_size) {
        unique.insert(Value::tuple(combination));
    }
    let all: Vec<Value> = unique.into_iter().collect();
    let m = all.len();
    if m == 0 {
        return Ok(Value::list(Vec::new()));
    }
    if group_num <= m {
        let picked = index::sample(ctx.rng(), m, group_num);
        return Ok(Value::list(picked.iter().map(|i| all[i].clone()).collect()));
    }
    let mut result = Vec::with_capacity(group_num);
    for _ in 0..group_num / m {
        let mut round = all.clone();
        round.shuffle(ctx.rng());
        result.extend(round);
    }
    let remainder = group_num % m;
    if remainder > 0 {
        let mut round = all.clone();
        round.shuffle(ctx.rng());
        result.extend(round.into_iter().take(remainder));
    }
    result.shuffle(ctx.rng());
    Ok(Value::list(result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn ctx() -> Context {
        Context::new(ChaCha8Rng::seed_from_u64(11))
    }

    #[test]
    fn test_generate_letters_advances_cursor() {
        let mut ctx = ctx();
        assert_eq!(ctx.eval_str("generate_letters(3)").unwrap().to_string(), "['A1', 'A2', 'A3']");
        assert_eq!(ctx.eval_str("generate_letters(2)").unwrap().to_string(), "['B1', 'B2']");
        assert_eq!(ctx.eval_str("generate_letters(3, 'cn')").unwrap().as_str(), Some("甲乙丙"));
    }

    #[test]
    fn test_generate_var_names_tiers() {
        let mut ctx = ctx();
        assert_eq!(ctx.eval_str("generate_var_names(2)").unwrap().to_string(), "['x', 'y']");
        assert_eq!(
            ctx.eval_str("generate_var_names(4)").unwrap().to_string(),
            "['p', 'q', 'r', 's']"
        );
        let many = ctx.eval_str("generate_var_names(12)").unwrap().to_vec().unwrap();
        assert_eq!(many[11].as_str(), Some("x12"));
    }

    #[test]
    fn test_to_unique_keeps_first_occurrence() {
        let mut ctx = ctx();
        let v = ctx.eval_str("to_unique([[1, 2], 3, [1, 2], 1, 3])").unwrap();
        assert_eq!(v.to_string(), "[[1, 2], 3, 1]");
        assert_eq!(ctx.eval_str("to_unique('abc')").unwrap().as_str(), Some("abc"));
        assert_eq!(ctx.eval_str("to_hashable([1, [2]])").unwrap().to_string(), "(1, (2,))");
    }

    #[test]
    fn test_event_count_clamps_num() {
        let mut ctx = ctx();
        let v = ctx.eval_str("event_count(Bools('a b c'), 'most', 10)").unwrap();
        let conds = v.to_vec().unwrap();
        assert_eq!(conds.len(), 1);
        assert!(conds[0].to_string().ends_with("<= 3"));
    }

    #[test]
    fn test_event_count_rejects_unknown_fact() {
        assert!(ctx().eval_str("event_count(Bools('a b'), 'sometimes')").is_err());
    }

    #[test]
    fn test_multi_event_count_skips_zero_targets() {
        let mut ctx = ctx();
        let v = ctx
            .eval_str("multi_event_count([Bools('a b'), Bools('c d')], 'wc', [0, 2])")
            .unwrap();
        assert_eq!(v.to_vec().unwrap().len(), 1);
        assert!(ctx
            .eval_str("multi_event_count([Bools('a b')], 'wc', [-1])")
            .is_err());
    }

    #[test]
    fn test_make_expr_arity() {
        let mut ctx = ctx();
        assert_eq!(ctx.eval_str("make_expr('>=', 7, 5)").unwrap(), Value::Bool(true));
        assert_eq!(ctx.eval_str("make_expr('add', 1, 2, 3)").unwrap(), Value::Int(6));
        assert!(ctx.eval_str("make_expr('not', True, False)").is_err());
        assert!(ctx.eval_str("make_expr('+', 1, 2, 3)").is_err());
        assert!(ctx.eval_str("make_expr('%', 1, 2)").is_err());
    }

    #[test]
    fn test_random_list_honours_conditions() {
        let mut ctx = ctx();
        let v = ctx
            .eval_str("generate_random_list(4, 'int', [0, 3], ['lambda l: sum(l) == 6'])")
            .unwrap();
        let total: i64 = v.to_vec().unwrap().iter().map(|x| x.as_int().unwrap()).sum();
        assert_eq!(total, 6);
    }

    #[test]
    fn test_random_list_per_element_domain() {
        let mut ctx = ctx();
        let v = ctx
            .eval_str("generate_random_list(3, 'enum', ['a', 'b'], [], [None, ['z'], None])")
            .unwrap();
        assert_eq!(v.to_vec().unwrap()[1].as_str(), Some("z"));
    }

    #[test]
    fn test_random_list_with_total_sums() {
        let mut ctx = ctx();
        let v = ctx
            .eval_str("generate_random_list_with_total(4, [1, 5], 12)")
            .unwrap();
        let items: Vec<i64> = v.to_vec().unwrap().iter().map(|x| x.as_int().unwrap()).collect();
        assert_eq!(items.iter().sum::<i64>(), 12);
        assert!(items.iter().all(|x| (1..=5).contains(x)));
    }

    #[test]
    fn test_choose_repeats_when_short() {
        let mut ctx = ctx();
        let v = ctx.eval_str("choose([1, 2, 3], 2, 5)").unwrap();
        assert_eq!(v.to_vec().unwrap().len(), 5);
        let v = ctx.eval_str("choose([1, 2, 3], 2, 2)").unwrap();
        let picked = v.to_vec().unwrap();
        assert_eq!(picked.len(), 2);
        assert_ne!(picked[0], picked[1]);
    }
}
