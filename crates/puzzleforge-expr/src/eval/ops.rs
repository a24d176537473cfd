//! Operators over values.
//!
//! Concrete operands follow Python semantics. When either operand is a solver
//! term the operator builds a new term instead.

use std::sync::Arc;

use indexmap::IndexSet;
use puzzleforge_core::{CmpOp, PuzzleError, Result, Term, TermRef};

use crate::ast::{BinOp, CmpKind, UnaryOp};
use crate::eval::compare::try_compare;
use crate::value::Value;

/// Numeric term for a value; boolean terms count as 0 and 1.
pub fn numeric_term(value: &Value) -> Result<TermRef> {
    let term = value.to_term()?;
    if term.is_boolean() {
        return Ok(Term::ite(term, Term::int(1), Term::int(0)));
    }
    Ok(term)
}

/// Boolean term for a value; concrete values use their truthiness.
pub fn bool_term(value: &Value) -> Result<TermRef> {
    match value.as_term() {
        Some(t) if t.is_boolean() => Ok(Arc::clone(t)),
        Some(t) => Err(PuzzleError::eval(format!(
            "expected a boolean solver expression, got `{t}`"
        ))),
        None => Ok(Term::bool(value.is_truthy()?)),
    }
}

pub fn unary(op: UnaryOp, value: &Value) -> Result<Value> {
    if let Some(term) = value.as_term() {
        return Ok(Value::Term(match op {
            UnaryOp::Neg => Term::neg(numeric_term(value)?),
            UnaryOp::Pos => Arc::clone(term),
            UnaryOp::Not | UnaryOp::Invert => Term::not(bool_term(value)?),
        }));
    }
    match (op, value.untagged()) {
        (UnaryOp::Not, v) => Ok(Value::Bool(!v.is_truthy()?)),
        (UnaryOp::Neg, Value::Float(f)) => Ok(Value::Float(-f)),
        (UnaryOp::Neg, v) if v.as_int().is_some() => v
            .as_int()
            .and_then(i64::checked_neg)
            .map(Value::Int)
            .ok_or_else(|| PuzzleError::eval("integer overflow in negation")),
        (UnaryOp::Pos, Value::Float(f)) => Ok(Value::Float(*f)),
        (UnaryOp::Pos, v) if v.as_int().is_some() => Ok(Value::Int(v.as_int().unwrap_or(0))),
        (UnaryOp::Invert, v) if v.as_int().is_some() => Ok(Value::Int(!v.as_int().unwrap_or(0))),
        (_, v) => Err(PuzzleError::eval(format!(
            "bad operand type for unary {}: '{}'",
            match op {
                UnaryOp::Neg => "-",
                UnaryOp::Pos => "+",
                UnaryOp::Invert => "~",
                UnaryOp::Not => "not",
            },
            v.type_name()
        ))),
    }
}

pub fn binary(op: BinOp, left: &Value, right: &Value) -> Result<Value> {
    if left.is_term() || right.is_term() {
        return symbolic_binary(op, left, right).map(Value::Term);
    }
    let (l, r) = (left.untagged(), right.untagged());
    match op {
        BinOp::Add => add(l, r),
        BinOp::Sub => match (l, r) {
            (Value::Set(a), Value::Set(b)) => Ok(Value::set(
                a.iter().filter(|x| !b.contains(*x)).cloned().collect(),
            )),
            _ => numeric(op, l, r),
        },
        BinOp::Mul => multiply(l, r),
        BinOp::Div => {
            let (a, b) = floats(op, l, r)?;
            if b == 0.0 {
                return Err(PuzzleError::eval("division by zero"));
            }
            Ok(Value::Float(a / b))
        }
        BinOp::FloorDiv | BinOp::Mod | BinOp::Pow => numeric(op, l, r),
        BinOp::BitAnd | BinOp::BitOr | BinOp::BitXor => bitwise(op, l, r),
    }
}

fn symbolic_binary(op: BinOp, left: &Value, right: &Value) -> Result<TermRef> {
    match op {
        BinOp::Add => Ok(Term::add([numeric_term(left)?, numeric_term(right)?])),
        BinOp::Sub => Ok(Term::sub(numeric_term(left)?, numeric_term(right)?)),
        BinOp::Mul => Ok(Term::mul([numeric_term(left)?, numeric_term(right)?])),
        BinOp::Div | BinOp::FloorDiv => Ok(Term::div(numeric_term(left)?, numeric_term(right)?)),
        BinOp::Mod => Ok(Term::modulo(numeric_term(left)?, numeric_term(right)?)),
        BinOp::Pow => match right.as_int() {
            Some(0) if !right.is_term() => Ok(Term::int(1)),
            Some(n) if (1..=16).contains(&n) && !right.is_term() => {
                let base = numeric_term(left)?;
                Ok(Term::mul((0..n).map(|_| Arc::clone(&base))))
            }
            _ => Err(PuzzleError::eval(
                "solver expressions only support small constant integer exponents",
            )),
        },
        BinOp::BitAnd => Ok(Term::and([bool_term(left)?, bool_term(right)?])),
        BinOp::BitOr => Ok(Term::or([bool_term(left)?, bool_term(right)?])),
        BinOp::BitXor => Ok(Term::xor(bool_term(left)?, bool_term(right)?)),
    }
}

fn unsupported(op: BinOp, l: &Value, r: &Value) -> PuzzleError {
    PuzzleError::eval(format!(
        "unsupported operand type(s) for {}: '{}' and '{}'",
        op.symbol(),
        l.type_name(),
        r.type_name()
    ))
}

fn floats(op: BinOp, l: &Value, r: &Value) -> Result<(f64, f64)> {
    match (l.as_f64(), r.as_f64()) {
        (Some(a), Some(b)) => Ok((a, b)),
        _ => Err(unsupported(op, l, r)),
    }
}

fn add(l: &Value, r: &Value) -> Result<Value> {
    match (l, r) {
        (Value::Str(a), Value::Str(b)) => Ok(Value::from(format!("{a}{b}"))),
        (Value::List(a), Value::List(b)) => {
            Ok(Value::list(a.iter().chain(b.iter()).cloned().collect()))
        }
        (Value::Tuple(a), Value::Tuple(b)) => {
            Ok(Value::tuple(a.iter().chain(b.iter()).cloned().collect()))
        }
        _ => numeric(BinOp::Add, l, r),
    }
}

fn repeat(items: &[Value], times: i64) -> Vec<Value> {
    let times = usize::try_from(times).unwrap_or(0);
    let mut out = Vec::with_capacity(items.len() * times);
    for _ in 0..times {
        out.extend(items.iter().cloned());
    }
    out
}

fn multiply(l: &Value, r: &Value) -> Result<Value> {
    match (l, r) {
        (Value::Str(s), n) | (n, Value::Str(s)) if n.as_int().is_some() => Ok(Value::from(
            s.repeat(usize::try_from(n.as_int().unwrap_or(0)).unwrap_or(0)),
        )),
        (Value::List(items), n) | (n, Value::List(items)) if n.as_int().is_some() => {
            Ok(Value::list(repeat(items, n.as_int().unwrap_or(0))))
        }
        (Value::Tuple(items), n) | (n, Value::Tuple(items)) if n.as_int().is_some() => {
            Ok(Value::tuple(repeat(items, n.as_int().unwrap_or(0))))
        }
        _ => numeric(BinOp::Mul, l, r),
    }
}

/// Floor division with Python rounding toward negative infinity.
pub fn floor_div(a: i64, b: i64) -> Result<i64> {
    if b == 0 {
        return Err(PuzzleError::eval("integer division or modulo by zero"));
    }
    let q = a
        .checked_div(b)
        .ok_or_else(|| PuzzleError::eval("integer overflow in division"))?;
    if a % b != 0 && ((a < 0) != (b < 0)) {
        Ok(q - 1)
    } else {
        Ok(q)
    }
}

/// Modulo whose sign follows the divisor.
pub fn py_mod(a: i64, b: i64) -> Result<i64> {
    if b == 0 {
        return Err(PuzzleError::eval("integer division or modulo by zero"));
    }
    let r = a.checked_rem(b).unwrap_or(0);
    if r != 0 && ((r < 0) != (b < 0)) {
        Ok(r + b)
    } else {
        Ok(r)
    }
}

fn numeric(op: BinOp, l: &Value, r: &Value) -> Result<Value> {
    if let (Some(a), Some(b)) = (l.as_int(), r.as_int()) {
        let overflow = || PuzzleError::eval(format!("integer overflow in {a} {} {b}", op.symbol()));
        return match op {
            BinOp::Add => a.checked_add(b).map(Value::Int).ok_or_else(overflow),
            BinOp::Sub => a.checked_sub(b).map(Value::Int).ok_or_else(overflow),
            BinOp::Mul => a.checked_mul(b).map(Value::Int).ok_or_else(overflow),
            BinOp::FloorDiv => floor_div(a, b).map(Value::Int),
            BinOp::Mod => py_mod(a, b).map(Value::Int),
            BinOp::Pow if b >= 0 => u32::try_from(b)
                .ok()
                .and_then(|e| a.checked_pow(e))
                .map(Value::Int)
                .ok_or_else(overflow),
            BinOp::Pow => Ok(Value::Float((a as f64).powf(b as f64))),
            _ => Err(unsupported(op, l, r)),
        };
    }
    let (a, b) = floats(op, l, r)?;
    match op {
        BinOp::Add => Ok(Value::Float(a + b)),
        BinOp::Sub => Ok(Value::Float(a - b)),
        BinOp::Mul => Ok(Value::Float(a * b)),
        BinOp::FloorDiv if b == 0.0 => Err(PuzzleError::eval("float floor division by zero")),
        BinOp::FloorDiv => Ok(Value::Float((a / b).floor())),
        BinOp::Mod if b == 0.0 => Err(PuzzleError::eval("float modulo")),
        BinOp::Mod => {
            let r = a % b;
            Ok(Value::Float(if r != 0.0 && ((r < 0.0) != (b < 0.0)) {
                r + b
            } else {
                r
            }))
        }
        BinOp::Pow => Ok(Value::Float(a.powf(b))),
        _ => Err(unsupported(op, l, r)),
    }
}

fn bitwise(op: BinOp, l: &Value, r: &Value) -> Result<Value> {
    match (l, r) {
        (Value::Bool(a), Value::Bool(b)) => Ok(Value::Bool(match op {
            BinOp::BitAnd => a & b,
            BinOp::BitOr => a | b,
            _ => a ^ b,
        })),
        (Value::Set(a), Value::Set(b)) => {
            let out: IndexSet<Value> = match op {
                BinOp::BitAnd => a.iter().filter(|x| b.contains(*x)).cloned().collect(),
                BinOp::BitOr => a.iter().chain(b.iter()).cloned().collect(),
                _ => a
                    .iter()
                    .filter(|x| !b.contains(*x))
                    .chain(b.iter().filter(|x| !a.contains(*x)))
                    .cloned()
                    .collect(),
            };
            Ok(Value::set(out))
        }
        _ => match (l.as_int(), r.as_int()) {
            (Some(a), Some(b)) => Ok(Value::Int(match op {
                BinOp::BitAnd => a & b,
                BinOp::BitOr => a | b,
                _ => a ^ b,
            })),
            _ => Err(unsupported(op, l, r)),
        },
    }
}

fn cmp_op(kind: CmpKind) -> Option<CmpOp> {
    match kind {
        CmpKind::Eq => Some(CmpOp::Eq),
        CmpKind::Ne => Some(CmpOp::Ne),
        CmpKind::Lt => Some(CmpOp::Lt),
        CmpKind::Le => Some(CmpOp::Le),
        CmpKind::Gt => Some(CmpOp::Gt),
        CmpKind::Ge => Some(CmpOp::Ge),
        _ => None,
    }
}

/// Applies one comparison of a chain.
pub fn compare(kind: CmpKind, left: &Value, right: &Value) -> Result<Value> {
    match kind {
        CmpKind::In => contains(right, left),
        CmpKind::NotIn => match contains(right, left)? {
            Value::Term(t) => Ok(Value::Term(Term::not(t))),
            other => Ok(Value::Bool(!other.is_truthy()?)),
        },
        CmpKind::Is | CmpKind::IsNot => {
            let same = left.type_name() == right.type_name() && left == right;
            Ok(Value::Bool(same == (kind == CmpKind::Is)))
        }
        _ => {
            let op = cmp_op(kind).ok_or_else(|| PuzzleError::eval("invalid comparison"))?;
            if left.is_term() || right.is_term() {
                return symbolic_compare(op, left, right).map(Value::Term);
            }
            match op {
                CmpOp::Eq => Ok(Value::Bool(left == right)),
                CmpOp::Ne => Ok(Value::Bool(left != right)),
                _ => {
                    let ord = try_compare(left, right, op.symbol())?;
                    Ok(Value::Bool(op.holds(ord)))
                }
            }
        }
    }
}

fn symbolic_compare(op: CmpOp, left: &Value, right: &Value) -> Result<TermRef> {
    let (l, r) = (left.to_term()?, right.to_term()?);
    match op {
        CmpOp::Eq | CmpOp::Ne if l.is_boolean() && r.is_boolean() => Ok(Term::cmp(op, l, r)),
        _ => Ok(Term::cmp(op, numeric_term(left)?, numeric_term(right)?)),
    }
}

/// Membership test; symbolic items become a disjunction of equalities.
pub fn contains(container: &Value, item: &Value) -> Result<Value> {
    let items = match container.untagged() {
        Value::Str(haystack) => {
            let needle = item.as_str().ok_or_else(|| {
                PuzzleError::eval(format!(
                    "'in <string>' requires string as left operand, not {}",
                    item.type_name()
                ))
            })?;
            return Ok(Value::Bool(haystack.contains(needle)));
        }
        Value::Map(m) => return Ok(Value::Bool(m.contains_key(item))),
        Value::Family(f) => return Ok(Value::Bool(f.contains_key(item))),
        Value::Set(s) if !item.is_term() => return Ok(Value::Bool(s.contains(item))),
        other => other.to_vec()?,
    };
    if item.is_term() || items.iter().any(Value::is_term) {
        let mut parts = Vec::with_capacity(items.len());
        for candidate in &items {
            if candidate.is_numeric() || candidate.is_term() {
                parts.push(symbolic_compare(CmpOp::Eq, item, candidate)?);
            }
        }
        return Ok(Value::Term(Term::or(parts)));
    }
    Ok(Value::Bool(items.iter().any(|candidate| candidate == item)))
}

fn normalize_index(index: i64, len: usize) -> Option<usize> {
    let len = len as i64;
    let resolved = if index < 0 { index + len } else { index };
    (0..len).contains(&resolved).then_some(resolved as usize)
}

/// `obj[key]` for containers, families, and models.
pub fn subscript(obj: &Value, key: &Value) -> Result<Value> {
    match obj.untagged() {
        Value::List(items) | Value::Tuple(items) => {
            let index = key.as_int().ok_or_else(|| {
                PuzzleError::eval(format!(
                    "{} indices must be integers, not {}",
                    obj.type_name(),
                    key.type_name()
                ))
            })?;
            normalize_index(index, items.len())
                .map(|i| items[i].clone())
                .ok_or_else(|| PuzzleError::eval(format!("{} index out of range", obj.type_name())))
        }
        Value::Str(s) => {
            let chars: Vec<char> = s.chars().collect();
            let index = key
                .as_int()
                .ok_or_else(|| PuzzleError::eval("string indices must be integers"))?;
            normalize_index(index, chars.len())
                .map(|i| Value::from(chars[i].to_string()))
                .ok_or_else(|| PuzzleError::eval("string index out of range"))
        }
        Value::Map(m) => m
            .get(key)
            .cloned()
            .ok_or_else(|| PuzzleError::eval(format!("key {} not found", key.repr()))),
        Value::Family(f) => f.get_entry(key),
        Value::Model(model) => {
            let term = key.as_term().ok_or_else(|| {
                PuzzleError::eval(format!(
                    "models are indexed by solver variables, not {}",
                    key.type_name()
                ))
            })?;
            model.eval(term).map(Value::from_const)
        }
        other => Err(PuzzleError::eval(format!(
            "'{}' object is not subscriptable",
            other.type_name()
        ))),
    }
}

/// `obj[lower:upper:step]` with Python clamping rules.
pub fn slice(obj: &Value, lower: Option<i64>, upper: Option<i64>, step: Option<i64>) -> Result<Value> {
    let step = step.unwrap_or(1);
    if step == 0 {
        return Err(PuzzleError::eval("slice step cannot be zero"));
    }
    let pick = |len: usize| -> Vec<usize> {
        let len = len as i64;
        let clamp = |v: i64, lo: i64, hi: i64| {
            let v = if v < 0 { v + len } else { v };
            v.clamp(lo, hi)
        };
        let mut out = Vec::new();
        if step > 0 {
            let start = lower.map_or(0, |v| clamp(v, 0, len));
            let stop = upper.map_or(len, |v| clamp(v, 0, len));
            let mut i = start;
            while i < stop {
                out.push(i as usize);
                i += step;
            }
        } else {
            let start = lower.map_or(len - 1, |v| clamp(v, -1, len - 1));
            let stop = upper.map_or(-1, |v| clamp(v, -1, len - 1));
            let mut i = start;
            while i > stop {
                out.push(i as usize);
                i += step;
            }
        }
        out
    };
    match obj.untagged() {
        Value::List(items) => Ok(Value::list(pick(items.len()).into_iter().map(|i| items[i].clone()).collect())),
        Value::Tuple(items) => Ok(Value::tuple(pick(items.len()).into_iter().map(|i| items[i].clone()).collect())),
        Value::Str(s) => {
            let chars: Vec<char> = s.chars().collect();
            Ok(Value::from(pick(chars.len()).into_iter().map(|i| chars[i]).collect::<String>()))
        }
        other => Err(PuzzleError::eval(format!(
            "'{}' object cannot be sliced",
            other.type_name()
        ))),
    }
}
