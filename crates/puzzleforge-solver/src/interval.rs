//! Bound propagation over partially assigned terms.
//!
//! A subterm is either known exactly or known to lie within a closed
//! interval. Booleans use the interval `[0, 1]`. Results are sound
//! over-approximations, so a `False` truth value prunes safely.

use puzzleforge_core::{arith, ArithOp, CmpOp, Const, Term, TermRef, Variable};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Interval {
    pub lo: f64,
    pub hi: f64,
}

impl Interval {
    pub const FULL: Interval = Interval {
        lo: f64::NEG_INFINITY,
        hi: f64::INFINITY,
    };

    pub const BOOL: Interval = Interval { lo: 0.0, hi: 1.0 };

    pub fn new(lo: f64, hi: f64) -> Self {
        Self { lo, hi }
    }

    pub fn point(v: f64) -> Self {
        Self { lo: v, hi: v }
    }

    pub fn contains(&self, v: f64) -> bool {
        self.lo <= v && v <= self.hi
    }

    pub fn hull(&self, other: &Interval) -> Interval {
        Interval::new(self.lo.min(other.lo), self.hi.max(other.hi))
    }

    fn add(&self, other: &Interval) -> Interval {
        Interval::new(self.lo + other.lo, self.hi + other.hi).sanitized()
    }

    fn sub(&self, other: &Interval) -> Interval {
        Interval::new(self.lo - other.hi, self.hi - other.lo).sanitized()
    }

    fn mul(&self, other: &Interval) -> Interval {
        let products = [
            self.lo * other.lo,
            self.lo * other.hi,
            self.hi * other.lo,
            self.hi * other.hi,
        ];
        if products.iter().any(|p| p.is_nan()) {
            return Interval::FULL;
        }
        let lo = products.iter().copied().fold(f64::INFINITY, f64::min);
        let hi = products.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        Interval::new(lo, hi)
    }

    fn div(&self, other: &Interval) -> Interval {
        if other.contains(0.0) {
            return Interval::FULL;
        }
        let quotients = [
            self.lo / other.lo,
            self.lo / other.hi,
            self.hi / other.lo,
            self.hi / other.hi,
        ];
        if quotients.iter().any(|q| q.is_nan()) {
            return Interval::FULL;
        }
        let lo = quotients.iter().copied().fold(f64::INFINITY, f64::min);
        let hi = quotients.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        // Euclidean integer division can round either way by one.
        Interval::new(lo.floor() - 1.0, hi.ceil() + 1.0)
    }

    fn modulo(&self, other: &Interval) -> Interval {
        if other.contains(0.0) {
            return Interval::FULL;
        }
        let m = other.lo.abs().max(other.hi.abs());
        Interval::new(0.0, m)
    }

    fn neg(&self) -> Interval {
        Interval::new(-self.hi, -self.lo)
    }

    fn abs(&self) -> Interval {
        if self.lo >= 0.0 {
            *self
        } else if self.hi <= 0.0 {
            self.neg()
        } else {
            Interval::new(0.0, (-self.lo).max(self.hi))
        }
    }

    fn sanitized(self) -> Interval {
        if self.lo.is_nan() || self.hi.is_nan() {
            Interval::FULL
        } else {
            self
        }
    }
}

/// Three-valued truth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Truth {
    True,
    False,
    Unknown,
}

impl From<bool> for Truth {
    fn from(b: bool) -> Self {
        if b {
            Truth::True
        } else {
            Truth::False
        }
    }
}

/// Partial value of a subterm.
#[derive(Debug, Clone, Copy)]
pub enum Bound {
    Known(Const),
    Range(Interval),
}

impl Bound {
    pub fn hull(&self) -> Interval {
        match self {
            Bound::Known(c) => Interval::point(c.as_f64()),
            Bound::Range(i) => *i,
        }
    }

    pub fn truth(&self) -> Truth {
        match self {
            Bound::Known(Const::Bool(b)) => (*b).into(),
            Bound::Known(c) => (c.as_f64() != 0.0).into(),
            Bound::Range(i) => {
                if i.lo > 0.0 || i.hi < 0.0 {
                    Truth::True
                } else if i.lo == 0.0 && i.hi == 0.0 {
                    Truth::False
                } else {
                    Truth::Unknown
                }
            }
        }
    }

    fn from_truth(t: Truth) -> Bound {
        match t {
            Truth::True => Bound::Known(Const::Bool(true)),
            Truth::False => Bound::Known(Const::Bool(false)),
            Truth::Unknown => Bound::Range(Interval::BOOL),
        }
    }
}

/// Evaluates `term` where `lookup` gives each variable's value or range.
pub fn bound<F>(term: &Term, lookup: &F) -> Bound
where
    F: Fn(&Variable) -> Bound,
{
    match term {
        Term::Var(v) => lookup(v),
        Term::Const(c) => Bound::Known(*c),
        Term::Not(a) => Bound::from_truth(match bound(a, lookup).truth() {
            Truth::True => Truth::False,
            Truth::False => Truth::True,
            Truth::Unknown => Truth::Unknown,
        }),
        Term::And(xs) => {
            let mut all_true = true;
            for x in xs {
                match bound(x, lookup).truth() {
                    Truth::False => return Bound::from_truth(Truth::False),
                    Truth::Unknown => all_true = false,
                    Truth::True => {}
                }
            }
            Bound::from_truth(if all_true { Truth::True } else { Truth::Unknown })
        }
        Term::Or(xs) => {
            let mut all_false = true;
            for x in xs {
                match bound(x, lookup).truth() {
                    Truth::True => return Bound::from_truth(Truth::True),
                    Truth::Unknown => all_false = false,
                    Truth::False => {}
                }
            }
            Bound::from_truth(if all_false { Truth::False } else { Truth::Unknown })
        }
        Term::Xor(a, b) => {
            Bound::from_truth(match (bound(a, lookup).truth(), bound(b, lookup).truth()) {
                (Truth::Unknown, _) | (_, Truth::Unknown) => Truth::Unknown,
                (x, y) => (x != y).into(),
            })
        }
        Term::Implies(a, b) => {
            Bound::from_truth(match (bound(a, lookup).truth(), bound(b, lookup).truth()) {
                (Truth::False, _) | (_, Truth::True) => Truth::True,
                (Truth::True, Truth::False) => Truth::False,
                _ => Truth::Unknown,
            })
        }
        Term::Ite(c, a, b) => match bound(c, lookup).truth() {
            Truth::True => bound(a, lookup),
            Truth::False => bound(b, lookup),
            Truth::Unknown => {
                let (x, y) = (bound(a, lookup), bound(b, lookup));
                Bound::Range(x.hull().hull(&y.hull()))
            }
        },
        Term::Add(xs) => fold(xs, Const::Int(0), ArithOp::Add, Interval::add, lookup),
        Term::Mul(xs) => fold(xs, Const::Int(1), ArithOp::Mul, Interval::mul, lookup),
        Term::Sub(a, b) => binary(a, b, ArithOp::Sub, Interval::sub, lookup),
        Term::Div(a, b) => binary(a, b, ArithOp::Div, Interval::div, lookup),
        Term::Mod(a, b) => binary(a, b, ArithOp::Mod, Interval::modulo, lookup),
        Term::Neg(a) => match bound(a, lookup) {
            Bound::Known(c) => exact_or_full(arith(Const::Int(0), c, ArithOp::Sub)),
            Bound::Range(i) => Bound::Range(i.neg()),
        },
        Term::Abs(a) => match bound(a, lookup) {
            Bound::Known(Const::Int(i)) => i
                .checked_abs()
                .map(|v| Bound::Known(Const::Int(v)))
                .unwrap_or(Bound::Range(Interval::FULL)),
            Bound::Known(Const::Real(r)) => Bound::Known(Const::Real(r.abs())),
            Bound::Known(Const::Bool(b)) => Bound::Known(Const::Int(i64::from(b))),
            Bound::Range(i) => Bound::Range(i.abs()),
        },
        Term::Cmp(op, a, b) => compare(*op, bound(a, lookup), bound(b, lookup)),
        Term::Distinct(xs) => {
            let parts: Vec<Bound> = xs.iter().map(|x| bound(x, lookup)).collect();
            let mut all_known = true;
            for (i, x) in parts.iter().enumerate() {
                for y in &parts[i + 1..] {
                    match compare(CmpOp::Eq, *x, *y).truth() {
                        Truth::True => return Bound::from_truth(Truth::False),
                        Truth::Unknown => all_known = false,
                        Truth::False => {}
                    }
                }
            }
            Bound::from_truth(if all_known { Truth::True } else { Truth::Unknown })
        }
    }
}

fn exact_or_full(result: puzzleforge_core::Result<Const>) -> Bound {
    // Evaluation errors are left to the exact check on complete assignments.
    result.map(Bound::Known).unwrap_or(Bound::Range(Interval::FULL))
}

fn fold<F>(
    xs: &[TermRef],
    unit: Const,
    op: ArithOp,
    widen: fn(&Interval, &Interval) -> Interval,
    lookup: &F,
) -> Bound
where
    F: Fn(&Variable) -> Bound,
{
    let mut acc = Bound::Known(unit);
    for x in xs {
        acc = match (acc, bound(x, lookup)) {
            (Bound::Known(l), Bound::Known(r)) => exact_or_full(arith(l, r, op)),
            (l, r) => Bound::Range(widen(&l.hull(), &r.hull())),
        };
    }
    acc
}

fn binary<F>(
    a: &Term,
    b: &Term,
    op: ArithOp,
    widen: fn(&Interval, &Interval) -> Interval,
    lookup: &F,
) -> Bound
where
    F: Fn(&Variable) -> Bound,
{
    match (bound(a, lookup), bound(b, lookup)) {
        (Bound::Known(l), Bound::Known(r)) => exact_or_full(arith(l, r, op)),
        (l, r) => Bound::Range(widen(&l.hull(), &r.hull())),
    }
}

fn compare(op: CmpOp, a: Bound, b: Bound) -> Bound {
    if let (Bound::Known(l), Bound::Known(r)) = (a, b) {
        let holds = match (l, r, op) {
            (Const::Bool(x), Const::Bool(y), CmpOp::Eq) => x == y,
            (Const::Bool(x), Const::Bool(y), CmpOp::Ne) => x != y,
            _ => op.holds(l.compare(&r)),
        };
        return Bound::Known(Const::Bool(holds));
    }
    let (l, r) = (a.hull(), b.hull());
    let truth = match op {
        CmpOp::Eq => eq_truth(&l, &r),
        CmpOp::Ne => match eq_truth(&l, &r) {
            Truth::True => Truth::False,
            Truth::False => Truth::True,
            Truth::Unknown => Truth::Unknown,
        },
        CmpOp::Lt => order_truth(l.hi < r.lo, l.lo >= r.hi),
        CmpOp::Le => order_truth(l.hi <= r.lo, l.lo > r.hi),
        CmpOp::Gt => order_truth(l.lo > r.hi, l.hi <= r.lo),
        CmpOp::Ge => order_truth(l.lo >= r.hi, l.hi < r.lo),
    };
    Bound::from_truth(truth)
}

fn eq_truth(l: &Interval, r: &Interval) -> Truth {
    if l.hi < r.lo || r.hi < l.lo {
        Truth::False
    } else if l.lo == l.hi && r.lo == r.hi && l.lo == r.lo {
        Truth::True
    } else {
        Truth::Unknown
    }
}

fn order_truth(surely: bool, never: bool) -> Truth {
    if surely {
        Truth::True
    } else if never {
        Truth::False
    } else {
        Truth::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use puzzleforge_core::{Sort, VarId};

    fn int_var(id: u32, name: &str) -> Variable {
        Variable::new(VarId(id), name, Sort::Int)
    }

    #[test]
    fn test_sum_bound_prunes_comparison() {
        let x = int_var(0, "x");
        let y = int_var(1, "y");
        let sum = Term::add([Term::var(x.clone()), Term::var(y.clone())]);
        let le = Term::cmp(CmpOp::Le, sum, Term::int(3));

        // x = 3, y in [1, 5]: x + y >= 4, so x + y <= 3 is impossible.
        let lookup = |v: &Variable| {
            if v.id == x.id {
                Bound::Known(Const::Int(3))
            } else {
                Bound::Range(Interval::new(1.0, 5.0))
            }
        };
        assert_eq!(bound(&le, &lookup).truth(), Truth::False);
    }

    #[test]
    fn test_unknown_when_ranges_overlap() {
        let x = int_var(0, "x");
        let eq = Term::eq(Term::var(x), Term::int(2));
        let lookup = |_: &Variable| Bound::Range(Interval::new(0.0, 4.0));
        assert_eq!(bound(&eq, &lookup).truth(), Truth::Unknown);
    }

    #[test]
    fn test_or_short_circuits_on_known_branch() {
        let p = Variable::new(VarId(0), "p", Sort::Bool);
        let q = Variable::new(VarId(1), "q", Sort::Bool);
        let or = Term::or([Term::var(p.clone()), Term::var(q)]);
        let lookup = |v: &Variable| {
            if v.id == p.id {
                Bound::Known(Const::Bool(true))
            } else {
                Bound::Range(Interval::BOOL)
            }
        };
        assert_eq!(bound(&or, &lookup).truth(), Truth::True);
    }

    #[test]
    fn test_distinct_detects_equal_known_pair() {
        let xs: Vec<TermRef> = (0..3).map(|i| Term::var(int_var(i, "v"))).collect();
        let lookup = |v: &Variable| match v.id.0 {
            0 | 2 => Bound::Known(Const::Int(1)),
            _ => Bound::Range(Interval::new(0.0, 9.0)),
        };
        assert_eq!(bound(&Term::distinct(xs), &lookup).truth(), Truth::False);
    }

    #[test]
    fn test_modulo_range_is_nonnegative() {
        let i = Interval::new(-7.0, 20.0).modulo(&Interval::point(3.0));
        assert_eq!(i, Interval::new(0.0, 3.0));
    }
}
