//! Symbolic solver terms.
//!
//! A [`Term`] is an immutable expression tree over solver [`Variable`]s and
//! constants. Terms are built by the expression evaluator whenever an operand
//! is symbolic, asserted on a [`ConstraintSolver`], and evaluated against a
//! [`Model`](crate::Model) to read back concrete values.
//!
//! [`ConstraintSolver`]: https://docs.rs/puzzleforge-solver

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use smallvec::SmallVec;

use crate::error::{PuzzleError, Result};

/// Shared handle to a term node.
pub type TermRef = Arc<Term>;

/// Child list for n-ary nodes.
pub type TermList = SmallVec<[TermRef; 4]>;

/// Stable identifier of a solver variable within one puzzle instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId(pub u32);

/// Declared sort of a solver variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sort {
    Bool,
    Int,
    /// Fixed-width bit vector, modelled as a signed integer of that width.
    BitVec(u32),
    Real,
}

impl Sort {
    /// Parses a sort name (`int`, `bool`, `real`, `bitvec`, `bvN`), case-insensitive.
    pub fn parse(name: &str) -> Option<Sort> {
        let lower = name.trim().to_ascii_lowercase();
        match lower.as_str() {
            "int" => Some(Sort::Int),
            "bool" => Some(Sort::Bool),
            "real" => Some(Sort::Real),
            "bitvec" => Some(Sort::BitVec(8)),
            _ => {
                let bits = lower.strip_prefix("bv")?;
                match bits.parse::<u32>() {
                    Ok(n) if (1..=62).contains(&n) => Some(Sort::BitVec(n)),
                    Ok(_) => None,
                    Err(_) => Some(Sort::BitVec(8)),
                }
            }
        }
    }

    /// Signed range representable by a bit vector of this sort.
    pub fn bitvec_range(&self) -> Option<(i64, i64)> {
        match self {
            Sort::BitVec(bits) => {
                let half = 1i64 << (bits - 1);
                Some((-half, half - 1))
            }
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        !matches!(self, Sort::Bool)
    }
}

impl fmt::Display for Sort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sort::Bool => write!(f, "Bool"),
            Sort::Int => write!(f, "Int"),
            Sort::BitVec(bits) => write!(f, "BitVec({bits})"),
            Sort::Real => write!(f, "Real"),
        }
    }
}

/// A named solver variable.
///
/// Equality, ordering, and hashing use the id only.
#[derive(Debug, Clone)]
pub struct Variable {
    pub id: VarId,
    pub name: Arc<str>,
    pub sort: Sort,
}

impl Variable {
    pub fn new(id: VarId, name: impl Into<Arc<str>>, sort: Sort) -> Self {
        Self {
            id,
            name: name.into(),
            sort,
        }
    }
}

impl PartialEq for Variable {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Variable {}

impl Hash for Variable {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl PartialOrd for Variable {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Variable {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id.cmp(&other.id)
    }
}

/// A concrete solver value.
#[derive(Debug, Clone, Copy)]
pub enum Const {
    Bool(bool),
    Int(i64),
    Real(f64),
}

impl Const {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Const::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Numeric view; booleans count as 0 and 1.
    pub fn as_f64(&self) -> f64 {
        match self {
            Const::Bool(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            Const::Int(i) => *i as f64,
            Const::Real(r) => *r,
        }
    }

    fn as_int(&self) -> Option<i64> {
        match self {
            Const::Bool(b) => Some(i64::from(*b)),
            Const::Int(i) => Some(*i),
            Const::Real(_) => None,
        }
    }

    /// Default value used when a model does not bind a variable.
    pub fn default_for(sort: Sort) -> Const {
        match sort {
            Sort::Bool => Const::Bool(false),
            Sort::Real => Const::Real(0.0),
            Sort::Int | Sort::BitVec(_) => Const::Int(0),
        }
    }

    /// Total order on numeric constants; booleans compare as 0/1.
    pub fn compare(&self, other: &Const) -> Ordering {
        match (self.as_int(), other.as_int()) {
            (Some(a), Some(b)) => a.cmp(&b),
            _ => self
                .as_f64()
                .partial_cmp(&other.as_f64())
                .unwrap_or(Ordering::Equal),
        }
    }

    pub fn equals(&self, other: &Const) -> bool {
        match (self, other) {
            (Const::Bool(a), Const::Bool(b)) => a == b,
            _ => self.compare(other) == Ordering::Equal,
        }
    }
}

impl PartialEq for Const {
    fn eq(&self, other: &Self) -> bool {
        self.equals(other)
    }
}

impl fmt::Display for Const {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Const::Bool(true) => write!(f, "True"),
            Const::Bool(false) => write!(f, "False"),
            Const::Int(i) => write!(f, "{i}"),
            Const::Real(r) => write!(f, "{}", format_float(*r)),
        }
    }
}

/// Formats a float the way Python's `repr` does for common values.
pub fn format_float(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    let s = format!("{value}");
    if s.contains('.') || s.contains('e') {
        s
    } else {
        format!("{s}.0")
    }
}

/// Comparison operator inside a term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CmpOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            CmpOp::Eq => "==",
            CmpOp::Ne => "!=",
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
        }
    }

    /// Applies the operator to an ordering.
    pub fn holds(&self, ord: Ordering) -> bool {
        match self {
            CmpOp::Eq => ord == Ordering::Equal,
            CmpOp::Ne => ord != Ordering::Equal,
            CmpOp::Lt => ord == Ordering::Less,
            CmpOp::Le => ord != Ordering::Greater,
            CmpOp::Gt => ord == Ordering::Greater,
            CmpOp::Ge => ord != Ordering::Less,
        }
    }

    /// Operator with swapped operands (`a < b` iff `b > a`).
    pub fn flipped(&self) -> CmpOp {
        match self {
            CmpOp::Eq => CmpOp::Eq,
            CmpOp::Ne => CmpOp::Ne,
            CmpOp::Lt => CmpOp::Gt,
            CmpOp::Le => CmpOp::Ge,
            CmpOp::Gt => CmpOp::Lt,
            CmpOp::Ge => CmpOp::Le,
        }
    }
}

/// A symbolic expression over solver variables.
#[derive(Debug, Clone)]
pub enum Term {
    Var(Variable),
    Const(Const),
    Not(TermRef),
    And(TermList),
    Or(TermList),
    Xor(TermRef, TermRef),
    Implies(TermRef, TermRef),
    Ite(TermRef, TermRef, TermRef),
    Add(TermList),
    Mul(TermList),
    Sub(TermRef, TermRef),
    Div(TermRef, TermRef),
    Mod(TermRef, TermRef),
    Neg(TermRef),
    Abs(TermRef),
    Cmp(CmpOp, TermRef, TermRef),
    Distinct(TermList),
}

impl Term {
    pub fn var(v: Variable) -> TermRef {
        Arc::new(Term::Var(v))
    }

    pub fn constant(c: Const) -> TermRef {
        Arc::new(Term::Const(c))
    }

    pub fn bool(b: bool) -> TermRef {
        Term::constant(Const::Bool(b))
    }

    pub fn int(i: i64) -> TermRef {
        Term::constant(Const::Int(i))
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(t: TermRef) -> TermRef {
        Arc::new(Term::Not(t))
    }

    pub fn and(parts: impl IntoIterator<Item = TermRef>) -> TermRef {
        Arc::new(Term::And(parts.into_iter().collect()))
    }

    pub fn or(parts: impl IntoIterator<Item = TermRef>) -> TermRef {
        Arc::new(Term::Or(parts.into_iter().collect()))
    }

    pub fn xor(a: TermRef, b: TermRef) -> TermRef {
        Arc::new(Term::Xor(a, b))
    }

    pub fn implies(a: TermRef, b: TermRef) -> TermRef {
        Arc::new(Term::Implies(a, b))
    }

    pub fn ite(c: TermRef, a: TermRef, b: TermRef) -> TermRef {
        Arc::new(Term::Ite(c, a, b))
    }

    #[allow(clippy::should_implement_trait)]
    pub fn add(parts: impl IntoIterator<Item = TermRef>) -> TermRef {
        Arc::new(Term::Add(parts.into_iter().collect()))
    }

    #[allow(clippy::should_implement_trait)]
    pub fn mul(parts: impl IntoIterator<Item = TermRef>) -> TermRef {
        Arc::new(Term::Mul(parts.into_iter().collect()))
    }

    #[allow(clippy::should_implement_trait)]
    pub fn sub(a: TermRef, b: TermRef) -> TermRef {
        Arc::new(Term::Sub(a, b))
    }

    #[allow(clippy::should_implement_trait)]
    pub fn div(a: TermRef, b: TermRef) -> TermRef {
        Arc::new(Term::Div(a, b))
    }

    pub fn modulo(a: TermRef, b: TermRef) -> TermRef {
        Arc::new(Term::Mod(a, b))
    }

    #[allow(clippy::should_implement_trait)]
    pub fn neg(a: TermRef) -> TermRef {
        Arc::new(Term::Neg(a))
    }

    pub fn abs(a: TermRef) -> TermRef {
        Arc::new(Term::Abs(a))
    }

    pub fn cmp(op: CmpOp, a: TermRef, b: TermRef) -> TermRef {
        Arc::new(Term::Cmp(op, a, b))
    }

    pub fn eq(a: TermRef, b: TermRef) -> TermRef {
        Term::cmp(CmpOp::Eq, a, b)
    }

    pub fn ne(a: TermRef, b: TermRef) -> TermRef {
        Term::cmp(CmpOp::Ne, a, b)
    }

    pub fn distinct(parts: impl IntoIterator<Item = TermRef>) -> TermRef {
        Arc::new(Term::Distinct(parts.into_iter().collect()))
    }

    /// Returns the variable if this term is a bare variable.
    pub fn as_var(&self) -> Option<&Variable> {
        match self {
            Term::Var(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_const(&self) -> Option<Const> {
        match self {
            Term::Const(c) => Some(*c),
            _ => None,
        }
    }

    /// True when the term denotes a boolean formula rather than a number.
    pub fn is_boolean(&self) -> bool {
        match self {
            Term::Var(v) => v.sort == Sort::Bool,
            Term::Const(c) => matches!(c, Const::Bool(_)),
            Term::Not(_)
            | Term::And(_)
            | Term::Or(_)
            | Term::Xor(..)
            | Term::Implies(..)
            | Term::Cmp(..)
            | Term::Distinct(_) => true,
            Term::Ite(_, a, _) => a.is_boolean(),
            _ => false,
        }
    }

    /// Collects every variable mentioned by this term.
    pub fn collect_vars(&self, out: &mut BTreeSet<Variable>) {
        match self {
            Term::Var(v) => {
                out.insert(v.clone());
            }
            Term::Const(_) => {}
            Term::Not(a) | Term::Neg(a) | Term::Abs(a) => a.collect_vars(out),
            Term::And(xs) | Term::Or(xs) | Term::Add(xs) | Term::Mul(xs) | Term::Distinct(xs) => {
                for x in xs {
                    x.collect_vars(out);
                }
            }
            Term::Xor(a, b)
            | Term::Implies(a, b)
            | Term::Sub(a, b)
            | Term::Div(a, b)
            | Term::Mod(a, b)
            | Term::Cmp(_, a, b) => {
                a.collect_vars(out);
                b.collect_vars(out);
            }
            Term::Ite(c, a, b) => {
                c.collect_vars(out);
                a.collect_vars(out);
                b.collect_vars(out);
            }
        }
    }

    /// Evaluates the term exactly under a total assignment.
    ///
    /// `lookup` must return a value for every variable the term mentions.
    pub fn evaluate<F>(&self, lookup: &F) -> Result<Const>
    where
        F: Fn(&Variable) -> Const,
    {
        match self {
            Term::Var(v) => Ok(lookup(v)),
            Term::Const(c) => Ok(*c),
            Term::Not(a) => Ok(Const::Bool(!a.evaluate_bool(lookup)?)),
            Term::And(xs) => {
                for x in xs {
                    if !x.evaluate_bool(lookup)? {
                        return Ok(Const::Bool(false));
                    }
                }
                Ok(Const::Bool(true))
            }
            Term::Or(xs) => {
                for x in xs {
                    if x.evaluate_bool(lookup)? {
                        return Ok(Const::Bool(true));
                    }
                }
                Ok(Const::Bool(false))
            }
            Term::Xor(a, b) => Ok(Const::Bool(
                a.evaluate_bool(lookup)? != b.evaluate_bool(lookup)?,
            )),
            Term::Implies(a, b) => Ok(Const::Bool(
                !a.evaluate_bool(lookup)? || b.evaluate_bool(lookup)?,
            )),
            Term::Ite(c, a, b) => {
                if c.evaluate_bool(lookup)? {
                    a.evaluate(lookup)
                } else {
                    b.evaluate(lookup)
                }
            }
            Term::Add(xs) => {
                let mut acc = Const::Int(0);
                for x in xs {
                    acc = arith(acc, x.evaluate(lookup)?, ArithOp::Add)?;
                }
                Ok(acc)
            }
            Term::Mul(xs) => {
                let mut acc = Const::Int(1);
                for x in xs {
                    acc = arith(acc, x.evaluate(lookup)?, ArithOp::Mul)?;
                }
                Ok(acc)
            }
            Term::Sub(a, b) => arith(a.evaluate(lookup)?, b.evaluate(lookup)?, ArithOp::Sub),
            Term::Div(a, b) => arith(a.evaluate(lookup)?, b.evaluate(lookup)?, ArithOp::Div),
            Term::Mod(a, b) => arith(a.evaluate(lookup)?, b.evaluate(lookup)?, ArithOp::Mod),
            Term::Neg(a) => arith(Const::Int(0), a.evaluate(lookup)?, ArithOp::Sub),
            Term::Abs(a) => match a.evaluate(lookup)? {
                Const::Int(i) => i
                    .checked_abs()
                    .map(Const::Int)
                    .ok_or_else(|| PuzzleError::eval("integer overflow in Abs")),
                Const::Real(r) => Ok(Const::Real(r.abs())),
                Const::Bool(b) => Ok(Const::Int(i64::from(b))),
            },
            Term::Cmp(op, a, b) => {
                let l = a.evaluate(lookup)?;
                let r = b.evaluate(lookup)?;
                let holds = match (l, r, op) {
                    (Const::Bool(x), Const::Bool(y), CmpOp::Eq) => x == y,
                    (Const::Bool(x), Const::Bool(y), CmpOp::Ne) => x != y,
                    _ => op.holds(l.compare(&r)),
                };
                Ok(Const::Bool(holds))
            }
            Term::Distinct(xs) => {
                let values = xs
                    .iter()
                    .map(|x| x.evaluate(lookup))
                    .collect::<Result<Vec<_>>>()?;
                for i in 0..values.len() {
                    for j in (i + 1)..values.len() {
                        if values[i].equals(&values[j]) {
                            return Ok(Const::Bool(false));
                        }
                    }
                }
                Ok(Const::Bool(true))
            }
        }
    }

    /// Evaluates a boolean term exactly.
    pub fn evaluate_bool<F>(&self, lookup: &F) -> Result<bool>
    where
        F: Fn(&Variable) -> Const,
    {
        match self.evaluate(lookup)? {
            Const::Bool(b) => Ok(b),
            Const::Int(i) => Ok(i != 0),
            Const::Real(r) => Ok(r != 0.0),
        }
    }
}

/// Arithmetic operators shared by exact evaluation and the expression evaluator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

/// Applies solver arithmetic to two constants.
///
/// Integer division and modulo are Euclidean, matching SMT-LIB `div`/`mod`.
pub fn arith(l: Const, r: Const, op: ArithOp) -> Result<Const> {
    if let (Some(a), Some(b)) = (l.as_int(), r.as_int()) {
        let overflow = || PuzzleError::eval(format!("integer overflow in {a} {op:?} {b}"));
        return match op {
            ArithOp::Add => a.checked_add(b).map(Const::Int).ok_or_else(overflow),
            ArithOp::Sub => a.checked_sub(b).map(Const::Int).ok_or_else(overflow),
            ArithOp::Mul => a.checked_mul(b).map(Const::Int).ok_or_else(overflow),
            ArithOp::Div if b == 0 => Err(PuzzleError::eval("division by zero")),
            ArithOp::Mod if b == 0 => Err(PuzzleError::eval("modulo by zero")),
            ArithOp::Div => a.checked_div_euclid(b).map(Const::Int).ok_or_else(overflow),
            ArithOp::Mod => a.checked_rem_euclid(b).map(Const::Int).ok_or_else(overflow),
        };
    }
    let (a, b) = (l.as_f64(), r.as_f64());
    match op {
        ArithOp::Add => Ok(Const::Real(a + b)),
        ArithOp::Sub => Ok(Const::Real(a - b)),
        ArithOp::Mul => Ok(Const::Real(a * b)),
        ArithOp::Div if b == 0.0 => Err(PuzzleError::eval("division by zero")),
        ArithOp::Mod if b == 0.0 => Err(PuzzleError::eval("modulo by zero")),
        ArithOp::Div => Ok(Const::Real(a / b)),
        ArithOp::Mod => Ok(Const::Real(a.rem_euclid(b))),
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Var(v) => write!(f, "{}", v.name),
            Term::Const(c) => write!(f, "{c}"),
            Term::Not(a) => write!(f, "Not({a})"),
            Term::And(xs) => write_call(f, "And", xs),
            Term::Or(xs) => write_call(f, "Or", xs),
            Term::Xor(a, b) => write!(f, "Xor({a}, {b})"),
            Term::Implies(a, b) => write!(f, "Implies({a}, {b})"),
            Term::Ite(c, a, b) => write!(f, "If({c}, {a}, {b})"),
            Term::Add(xs) => write_infix(f, " + ", xs),
            Term::Mul(xs) => write_infix(f, "*", xs),
            Term::Sub(a, b) => {
                write_operand(f, a)?;
                write!(f, " - ")?;
                write_operand(f, b)
            }
            Term::Div(a, b) => {
                write_operand(f, a)?;
                write!(f, "/")?;
                write_operand(f, b)
            }
            Term::Mod(a, b) => {
                write_operand(f, a)?;
                write!(f, "%")?;
                write_operand(f, b)
            }
            Term::Neg(a) => {
                write!(f, "-")?;
                write_operand(f, a)
            }
            Term::Abs(a) => write!(f, "Abs({a})"),
            Term::Cmp(op, a, b) => {
                write_operand(f, a)?;
                write!(f, " {} ", op.symbol())?;
                write_operand(f, b)
            }
            Term::Distinct(xs) => write_call(f, "Distinct", xs),
        }
    }
}

fn is_atomic(t: &Term) -> bool {
    matches!(
        t,
        Term::Var(_)
            | Term::Const(_)
            | Term::Not(_)
            | Term::And(_)
            | Term::Or(_)
            | Term::Xor(..)
            | Term::Implies(..)
            | Term::Ite(..)
            | Term::Abs(_)
            | Term::Distinct(_)
    )
}

fn write_operand(f: &mut fmt::Formatter<'_>, t: &Term) -> fmt::Result {
    if is_atomic(t) {
        write!(f, "{t}")
    } else {
        write!(f, "({t})")
    }
}

fn write_infix(f: &mut fmt::Formatter<'_>, sep: &str, xs: &[TermRef]) -> fmt::Result {
    for (i, x) in xs.iter().enumerate() {
        if i > 0 {
            write!(f, "{sep}")?;
        }
        write_operand(f, x)?;
    }
    Ok(())
}

fn write_call(f: &mut fmt::Formatter<'_>, name: &str, xs: &[TermRef]) -> fmt::Result {
    write!(f, "{name}(")?;
    for (i, x) in xs.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{x}")?;
    }
    write!(f, ")")
}
