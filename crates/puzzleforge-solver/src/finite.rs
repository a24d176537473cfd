//! Built-in finite-domain constraint solver.
//!
//! Depth-first search over bounded domains with interval pruning. The search
//! keeps a cursor between calls, so the usual enumeration loop of check,
//! read the model, block it, and check again continues where the previous
//! check stopped instead of restarting from the root.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::time::Instant;

use puzzleforge_config::SolverSettings;
use puzzleforge_core::{Const, Model, Term, TermRef, VarId, Variable};
use tracing::{debug, trace};

use crate::domain::{Domain, DomainBuilder};
use crate::interval::{bound, Bound, Interval, Truth};
use crate::solver::{ConstraintSolver, Direction, OptimizeResult, SatResult};

/// Nodes between two clock reads.
const TIME_CHECK_INTERVAL: u64 = 1024;

/// Per-check search limits.
struct Budget {
    nodes: u64,
    node_limit: Option<u64>,
    started: Instant,
    time_limit_ms: Option<u64>,
}

impl Budget {
    fn new(settings: &SolverSettings) -> Self {
        Self {
            nodes: 0,
            node_limit: settings.node_limit,
            started: Instant::now(),
            time_limit_ms: settings.time_limit_ms,
        }
    }

    /// Counts one node; returns a reason once a limit is hit.
    fn tick(&mut self) -> Option<String> {
        self.nodes += 1;
        if let Some(limit) = self.node_limit {
            if self.nodes > limit {
                return Some(format!("node limit of {limit} reached"));
            }
        }
        if let Some(ms) = self.time_limit_ms {
            if self.nodes % TIME_CHECK_INTERVAL == 0
                && self.started.elapsed().as_millis() >= u128::from(ms)
            {
                return Some(format!("time limit of {ms} ms reached"));
            }
        }
        None
    }
}

enum Step {
    Found,
    Exhausted,
    Limit(String),
}

/// Resumable depth-first search state.
struct Search {
    order: Vec<Variable>,
    domains: Vec<Domain>,
    position: HashMap<VarId, usize>,
    /// Assertions to re-check after assigning the variable at each depth.
    watch: Vec<Vec<usize>>,
    values: Vec<Option<Const>>,
    next: Vec<usize>,
    depth: usize,
    done: bool,
}

impl Search {
    fn new(
        settings: &SolverSettings,
        declared: &BTreeMap<VarId, (Variable, Option<(i64, i64)>)>,
        assertions: &[TermRef],
        objective: Option<&TermRef>,
    ) -> Self {
        let mut vars = BTreeSet::new();
        for a in assertions {
            a.collect_vars(&mut vars);
        }
        if let Some(obj) = objective {
            obj.collect_vars(&mut vars);
        }

        let builder = DomainBuilder::new(settings, assertions);
        let order: Vec<Variable> = vars.into_iter().collect();
        let domains: Vec<Domain> = order
            .iter()
            .map(|v| builder.domain(v, declared.get(&v.id).and_then(|(_, b)| *b)))
            .collect();
        let position: HashMap<VarId, usize> =
            order.iter().enumerate().map(|(i, v)| (v.id, i)).collect();

        let mut watch = vec![Vec::new(); order.len()];
        let mut done = domains.iter().any(Domain::is_empty);
        for (idx, a) in assertions.iter().enumerate() {
            let mut mentioned = BTreeSet::new();
            a.collect_vars(&mut mentioned);
            if mentioned.is_empty() {
                if !a.evaluate_bool(&|v: &Variable| Const::default_for(v.sort)).unwrap_or(false) {
                    done = true;
                }
                continue;
            }
            for v in &mentioned {
                if let Some(&p) = position.get(&v.id) {
                    watch[p].push(idx);
                }
            }
        }

        let n = order.len();
        Self {
            order,
            domains,
            position,
            watch,
            values: vec![None; n],
            next: vec![0; n],
            depth: 0,
            done,
        }
    }

    fn lookup(&self, var: &Variable) -> Bound {
        match self.position.get(&var.id) {
            Some(&p) => match self.values[p] {
                Some(c) => Bound::Known(c),
                None => Bound::Range(self.domains[p].hull()),
            },
            None => Bound::Range(Interval::FULL),
        }
    }

    fn value_of(&self, var: &Variable) -> Const {
        self.position
            .get(&var.id)
            .and_then(|&p| self.values[p])
            .unwrap_or_else(|| Const::default_for(var.sort))
    }

    fn consistent(&self, depth: usize, assertions: &[TermRef]) -> bool {
        self.watch[depth].iter().all(|&idx| {
            bound(&assertions[idx], &|v: &Variable| self.lookup(v)).truth() != Truth::False
        })
    }

    /// Exact check of every assertion under the complete assignment.
    fn satisfies(&self, assertions: &[TermRef]) -> bool {
        let lookup = |v: &Variable| self.value_of(v);
        assertions
            .iter()
            .all(|a| a.evaluate_bool(&lookup).unwrap_or(false))
    }

    fn evaluate(&self, term: &Term) -> Option<Const> {
        term.evaluate(&|v: &Variable| self.value_of(v)).ok()
    }

    fn model(&self) -> Model {
        Model::new(
            self.order
                .iter()
                .zip(&self.values)
                .map(|(v, c)| (v.clone(), c.unwrap_or_else(|| Const::default_for(v.sort))))
                .collect(),
        )
    }

    /// Advances to the next complete assignment that satisfies `assertions`
    /// and survives `prune`.
    fn advance<P>(&mut self, assertions: &[TermRef], budget: &mut Budget, prune: P) -> Step
    where
        P: Fn(&Search) -> bool,
    {
        if self.done {
            return Step::Exhausted;
        }
        let n = self.order.len();
        if n == 0 {
            self.done = true;
            return if self.satisfies(assertions) && !prune(self) {
                Step::Found
            } else {
                Step::Exhausted
            };
        }
        loop {
            let d = self.depth;
            if self.next[d] >= self.domains[d].len() {
                self.next[d] = 0;
                self.values[d] = None;
                if d == 0 {
                    self.done = true;
                    return Step::Exhausted;
                }
                self.depth -= 1;
                continue;
            }
            self.values[d] = Some(self.domains[d].value(self.next[d]));
            self.next[d] += 1;
            if let Some(reason) = budget.tick() {
                return Step::Limit(reason);
            }
            if !self.consistent(d, assertions) || prune(self) {
                continue;
            }
            if d + 1 == n {
                if self.satisfies(assertions) {
                    return Step::Found;
                }
                continue;
            }
            self.depth = d + 1;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CursorState {
    /// The cursor points at the model returned by the last check.
    Holding,
    /// That model has been blocked; the next check advances.
    Ready,
}

/// Depth-first finite-domain solver.
pub struct FiniteDomainSolver {
    settings: SolverSettings,
    declared: BTreeMap<VarId, (Variable, Option<(i64, i64)>)>,
    assertions: Vec<TermRef>,
    cursor: Option<Search>,
    state: CursorState,
    last_model: Option<Model>,
}

impl FiniteDomainSolver {
    pub fn new(settings: SolverSettings) -> Self {
        Self {
            settings,
            declared: BTreeMap::new(),
            assertions: Vec::new(),
            cursor: None,
            state: CursorState::Ready,
            last_model: None,
        }
    }

    pub fn settings(&self) -> &SolverSettings {
        &self.settings
    }

    fn invalidate(&mut self) {
        self.cursor = None;
        self.state = CursorState::Ready;
    }
}

impl Default for FiniteDomainSolver {
    fn default() -> Self {
        Self::new(SolverSettings::default())
    }
}

impl std::fmt::Debug for FiniteDomainSolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FiniteDomainSolver")
            .field("declared", &self.declared.len())
            .field("assertions", &self.assertions.len())
            .field("resumable", &self.cursor.is_some())
            .finish()
    }
}

impl ConstraintSolver for FiniteDomainSolver {
    fn declare(&mut self, var: &Variable, bounds: Option<(i64, i64)>) {
        self.declared.insert(var.id, (var.clone(), bounds));
        self.invalidate();
    }

    fn assert(&mut self, term: TermRef) {
        self.assertions.push(term);
        self.invalidate();
    }

    fn assertion_count(&self) -> usize {
        self.assertions.len()
    }

    fn check(&mut self) -> SatResult {
        if self.cursor.is_some() && self.state == CursorState::Holding && self.last_model.is_some()
        {
            return SatResult::Sat;
        }
        let mut search = match self.cursor.take() {
            Some(search) => search,
            None => Search::new(&self.settings, &self.declared, &self.assertions, None),
        };
        let mut budget = Budget::new(&self.settings);
        let step = search.advance(&self.assertions, &mut budget, |_| false);
        trace!(event = "search_step", nodes = budget.nodes, vars = search.order.len());
        match step {
            Step::Found => {
                self.last_model = Some(search.model());
                self.cursor = Some(search);
                self.state = CursorState::Holding;
                SatResult::Sat
            }
            Step::Exhausted => {
                self.last_model = None;
                self.cursor = Some(search);
                self.state = CursorState::Ready;
                SatResult::Unsat
            }
            Step::Limit(reason) => {
                debug!(event = "search_limit", nodes = budget.nodes, reason = %reason);
                self.last_model = None;
                self.invalidate();
                SatResult::Unknown(reason)
            }
        }
    }

    fn model(&self) -> Option<Model> {
        self.last_model.clone()
    }

    fn block(&mut self, model: &Model) {
        let clause = Term::or(
            model
                .bindings()
                .iter()
                .map(|(v, c)| Term::ne(Term::var(v.clone()), Term::constant(*c))),
        );
        self.assertions.push(clause);

        let resumes = self.state == CursorState::Holding
            && self
                .last_model
                .as_ref()
                .is_some_and(|last| last.same_assignment(model));
        if resumes {
            self.state = CursorState::Ready;
        } else {
            self.invalidate();
        }
    }

    fn check_optimize(&mut self, objective: &TermRef, direction: Direction) -> OptimizeResult {
        self.invalidate();
        self.last_model = None;

        let mut search = Search::new(
            &self.settings,
            &self.declared,
            &self.assertions,
            Some(objective),
        );
        let mut budget = Budget::new(&self.settings);
        let mut best: Option<(Model, Const)> = None;

        loop {
            let incumbent = best.as_ref().map(|(_, v)| v.as_f64());
            let step = search.advance(&self.assertions, &mut budget, |s| match incumbent {
                Some(b) => {
                    let reach = bound(objective, &|v: &Variable| s.lookup(v)).hull();
                    !can_improve(&reach, b, direction)
                }
                None => false,
            });
            match step {
                Step::Found => {
                    if let Some(value) = search.evaluate(objective) {
                        let better = best
                            .as_ref()
                            .map_or(true, |(_, b)| direction.improves(&value, b));
                        if better {
                            trace!(event = "incumbent", value = %value, nodes = budget.nodes);
                            best = Some((search.model(), value));
                        }
                    }
                }
                Step::Exhausted => break,
                Step::Limit(reason) => {
                    debug!(event = "search_limit", nodes = budget.nodes, reason = %reason);
                    return OptimizeResult::Unknown(reason);
                }
            }
        }

        match best {
            Some((model, value)) => {
                self.last_model = Some(model.clone());
                OptimizeResult::Optimal { model, value }
            }
            None => OptimizeResult::Unsat,
        }
    }

    fn reset(&mut self) {
        self.declared.clear();
        self.assertions.clear();
        self.last_model = None;
        self.invalidate();
    }
}

fn can_improve(reach: &Interval, best: f64, direction: Direction) -> bool {
    match direction {
        Direction::Maximize => reach.hi > best,
        Direction::Minimize => reach.lo < best,
    }
}
