//! Finite value domains for search variables.

use std::collections::HashMap;

use puzzleforge_config::SolverSettings;
use puzzleforge_core::{CmpOp, Const, Sort, Term, TermRef, VarId, Variable};

use crate::interval::Interval;

/// Values a search variable ranges over, enumerated lazily.
#[derive(Debug, Clone, PartialEq)]
pub enum Domain {
    Bool,
    Int { lo: i64, hi: i64 },
    /// Multiples of `step` within `[lo, hi]`, or exactly `lo` when the two meet.
    Real { lo: f64, hi: f64, step: f64 },
}

impl Domain {
    pub fn len(&self) -> usize {
        match self {
            Domain::Bool => 2,
            Domain::Int { lo, hi } => {
                if lo > hi {
                    0
                } else {
                    usize::try_from(hi.abs_diff(*lo)).map_or(usize::MAX, |n| n.saturating_add(1))
                }
            }
            Domain::Real { lo, hi, step } => {
                if lo > hi {
                    0
                } else if lo == hi {
                    1
                } else {
                    let first = (lo / step).ceil();
                    let last = (hi / step).floor();
                    if last < first {
                        0
                    } else {
                        (last - first) as usize + 1
                    }
                }
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The `index`-th value in ascending order.
    pub fn value(&self, index: usize) -> Const {
        match self {
            Domain::Bool => Const::Bool(index != 0),
            Domain::Int { lo, .. } => Const::Int(lo.saturating_add(index as i64)),
            Domain::Real { lo, hi, step } => {
                if lo == hi {
                    Const::Real(*lo)
                } else {
                    Const::Real(((lo / step).ceil() + index as f64) * step)
                }
            }
        }
    }

    pub fn hull(&self) -> Interval {
        match self {
            Domain::Bool => Interval::BOOL,
            Domain::Int { lo, hi } => Interval::new(*lo as f64, *hi as f64),
            Domain::Real { lo, hi, .. } => Interval::new(*lo, *hi),
        }
    }
}

/// Bounds implied by top-level conjuncts of the form `var op const`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Inferred {
    lo: Option<f64>,
    hi: Option<f64>,
}

impl Inferred {
    fn tighten_lo(&mut self, v: f64) {
        self.lo = Some(self.lo.map_or(v, |lo| lo.max(v)));
    }

    fn tighten_hi(&mut self, v: f64) {
        self.hi = Some(self.hi.map_or(v, |hi| hi.min(v)));
    }
}

/// Derives search domains from declarations, settings, and assertions.
#[derive(Debug)]
pub struct DomainBuilder<'a> {
    settings: &'a SolverSettings,
    inferred: HashMap<VarId, Inferred>,
}

impl<'a> DomainBuilder<'a> {
    pub fn new(settings: &'a SolverSettings, assertions: &[TermRef]) -> Self {
        let mut builder = Self {
            settings,
            inferred: HashMap::new(),
        };
        for assertion in assertions {
            builder.scan(assertion);
        }
        builder
    }

    fn scan(&mut self, term: &Term) {
        match term {
            Term::And(parts) => parts.iter().for_each(|p| self.scan(p)),
            Term::Cmp(op, a, b) => match (a.as_ref(), b.as_ref()) {
                (Term::Var(v), Term::Const(c)) => self.record(v, *op, *c),
                (Term::Const(c), Term::Var(v)) => self.record(v, op.flipped(), *c),
                _ => {}
            },
            _ => {}
        }
    }

    fn record(&mut self, var: &Variable, op: CmpOp, c: Const) {
        if var.sort == Sort::Bool || matches!(c, Const::Bool(_)) {
            return;
        }
        let integral = var.sort != Sort::Real;
        let v = c.as_f64();
        let entry = self.inferred.entry(var.id).or_default();
        match op {
            CmpOp::Eq => {
                entry.tighten_lo(if integral { v.ceil() } else { v });
                entry.tighten_hi(if integral { v.floor() } else { v });
            }
            CmpOp::Le => entry.tighten_hi(if integral { v.floor() } else { v }),
            CmpOp::Lt => entry.tighten_hi(if integral { v.ceil() - 1.0 } else { v }),
            CmpOp::Ge => entry.tighten_lo(if integral { v.ceil() } else { v }),
            CmpOp::Gt => entry.tighten_lo(if integral { v.floor() + 1.0 } else { v }),
            CmpOp::Ne => {}
        }
    }

    /// Domain of `var` given its declared bounds.
    ///
    /// Declared bounds are intersected with inferred ones. Without declared
    /// bounds an inferred side replaces the matching default side; when that
    /// leaves the default side on the wrong end, it slides to keep the
    /// default span.
    pub fn domain(&self, var: &Variable, declared: Option<(i64, i64)>) -> Domain {
        if var.sort == Sort::Bool {
            return Domain::Bool;
        }
        let [dlo, dhi] = self.settings.default_int_bounds;
        let span = (dhi as f64) - (dlo as f64);
        let inferred = self.inferred.get(&var.id).copied().unwrap_or_default();

        let (mut lo, mut hi) = match declared {
            Some((lo, hi)) => (
                inferred.lo.map_or(lo as f64, |v| v.max(lo as f64)),
                inferred.hi.map_or(hi as f64, |v| v.min(hi as f64)),
            ),
            None => {
                let lo = inferred.lo.unwrap_or(dlo as f64);
                let hi = inferred.hi.unwrap_or(dhi as f64);
                match (inferred.lo, inferred.hi) {
                    (Some(l), None) if l > hi => (l, l + span),
                    (None, Some(h)) if h < lo => (h - span, h),
                    _ => (lo, hi),
                }
            }
        };
        if let Some((blo, bhi)) = var.sort.bitvec_range() {
            lo = lo.max(blo as f64);
            hi = hi.min(bhi as f64);
        }

        match var.sort {
            Sort::Real => Domain::Real {
                lo,
                hi,
                step: self.settings.real_step,
            },
            _ => Domain::Int {
                lo: clamp_i64(lo),
                hi: clamp_i64(hi),
            },
        }
    }
}

fn clamp_i64(v: f64) -> i64 {
    if v.is_nan() {
        0
    } else {
        v.clamp(i64::MIN as f64, i64::MAX as f64) as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var(id: u32, sort: Sort) -> Variable {
        Variable::new(VarId(id), format!("v{id}"), sort)
    }

    #[test]
    fn test_default_bounds_without_constraints() {
        let settings = SolverSettings::default();
        let builder = DomainBuilder::new(&settings, &[]);
        let d = builder.domain(&var(0, Sort::Int), None);
        assert_eq!(d, Domain::Int { lo: -100, hi: 100 });
        assert_eq!(d.len(), 201);
    }

    #[test]
    fn test_inferred_bounds_from_conjuncts() {
        let settings = SolverSettings::default();
        let x = var(0, Sort::Int);
        let a = Term::and([
            Term::cmp(CmpOp::Ge, Term::var(x.clone()), Term::int(2)),
            Term::cmp(CmpOp::Gt, Term::int(7), Term::var(x.clone())),
        ]);
        let builder = DomainBuilder::new(&settings, &[a]);
        assert_eq!(builder.domain(&x, None), Domain::Int { lo: 2, hi: 6 });
    }

    #[test]
    fn test_declared_bounds_intersect() {
        let settings = SolverSettings::default();
        let x = var(0, Sort::Int);
        let a = Term::cmp(CmpOp::Le, Term::var(x.clone()), Term::int(3));
        let builder = DomainBuilder::new(&settings, &[a]);
        assert_eq!(builder.domain(&x, Some((1, 9))), Domain::Int { lo: 1, hi: 3 });
    }

    #[test]
    fn test_lower_bound_above_default_slides_window() {
        let settings = SolverSettings::default();
        let x = var(0, Sort::Int);
        let a = Term::cmp(CmpOp::Ge, Term::var(x.clone()), Term::int(500));
        let builder = DomainBuilder::new(&settings, &[a]);
        assert_eq!(builder.domain(&x, None), Domain::Int { lo: 500, hi: 700 });
    }

    #[test]
    fn test_bitvec_width_caps_domain() {
        let settings = SolverSettings::default();
        let builder = DomainBuilder::new(&settings, &[]);
        let d = builder.domain(&var(0, Sort::BitVec(4)), None);
        assert_eq!(d, Domain::Int { lo: -8, hi: 7 });
    }

    #[test]
    fn test_real_grid() {
        let d = Domain::Real {
            lo: -1.0,
            hi: 1.0,
            step: 0.5,
        };
        assert_eq!(d.len(), 5);
        assert_eq!(d.value(0), Const::Real(-1.0));
        assert_eq!(d.value(4), Const::Real(1.0));

        let pinned = Domain::Real {
            lo: 0.3,
            hi: 0.3,
            step: 0.5,
        };
        assert_eq!(pinned.len(), 1);
        assert_eq!(pinned.value(0), Const::Real(0.3));
    }

    #[test]
    fn test_contradictory_bounds_are_empty() {
        let settings = SolverSettings::default();
        let x = var(0, Sort::Int);
        let a = Term::and([
            Term::cmp(CmpOp::Ge, Term::var(x.clone()), Term::int(5)),
            Term::cmp(CmpOp::Le, Term::var(x.clone()), Term::int(4)),
        ]);
        let builder = DomainBuilder::new(&settings, &[a]);
        assert!(builder.domain(&x, None).is_empty());
    }
}
