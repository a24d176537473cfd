//! Compiled instruction program.
//!
//! A [`Program`] is the typed intermediate form of one specification. Every
//! expression and template is parsed once by the [`Emitter`](crate::Emitter);
//! the interpreter walks the instructions in order and never touches source
//! text again except to name things in errors.

use std::fmt;
use std::sync::Arc;

use puzzleforge_core::{Result, Sort};
use puzzleforge_expr::{parse_expr, Expr, Template};
use puzzleforge_sampler::CondScope;
use puzzleforge_schema::OptionCond;
use puzzleforge_solver::Direction;

/// A parsed expression together with its source text.
#[derive(Debug, Clone, PartialEq)]
pub struct Formula {
    source: Arc<str>,
    expr: Expr,
}

impl Formula {
    pub fn parse(source: &str) -> Result<Self> {
        Ok(Self {
            source: Arc::from(source),
            expr: parse_expr(source)?,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }
}

impl fmt::Display for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// How a sampled variable gets its value.
#[derive(Debug, Clone, PartialEq)]
pub enum VariableSource {
    /// Computed from other names.
    Formula(Formula),
    /// Uniform integer in an inclusive `[lo, hi]` range.
    Int(Formula),
    /// Uniform real in `[lo, hi]`.
    Float(Formula),
    /// One item of a list; `None` means `[True, False]`.
    Choice(Option<Formula>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct VariableRule {
    pub name: String,
    pub source: VariableSource,
}

/// A family of solver unknowns indexed by the product of its sources.
#[derive(Debug, Clone, PartialEq)]
pub struct FamilyRule {
    pub name: String,
    pub sources: Vec<Formula>,
    pub attrs: Option<Vec<String>>,
    pub sorts: Vec<Sort>,
    pub descs: Vec<Option<String>>,
    pub bounds: Option<Formula>,
}

/// A custom predicate attached to a sampling site.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomRule {
    pub scope: CondScope,
    pub fields: Option<Vec<usize>>,
    pub constraint: Option<Formula>,
}

/// Sources and layered constraints of one sampler call.
#[derive(Debug, Clone, PartialEq)]
pub struct SamplingSite {
    pub sources: Vec<Formula>,
    /// Per-source pick counts. `None` picks one item and flattens `_sym`.
    pub amount: Option<Vec<Formula>>,
    pub order: Vec<bool>,
    pub duplicate: Vec<bool>,
    pub domain_cond: bool,
    pub dim: usize,
    pub dim_cond: Vec<Vec<usize>>,
    pub custom: Vec<CustomRule>,
}

/// A derived symbol, or one template of a derived group.
#[derive(Debug, Clone, PartialEq)]
pub struct DeriveRule {
    pub name: String,
    pub site: SamplingSite,
    /// Row count for a single symbol; a `[lo, hi]` range inside a group.
    pub domain: Option<Formula>,
    pub formula: Option<Formula>,
    pub desc: Template,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupRule {
    pub name: String,
    pub total: Formula,
    pub templates: Vec<DeriveRule>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StaticRule {
    pub name: String,
    pub formula: Formula,
    pub desc: Option<Template>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DynamicRule {
    pub name: String,
    pub site: SamplingSite,
    /// `[lo, hi]` range the instance count is drawn from; one when absent.
    pub count: Option<Formula>,
    pub formula: Formula,
    pub desc: Option<Template>,
}

/// The solving phase of a program.
#[derive(Debug, Clone, PartialEq)]
pub enum SolveRule {
    /// No solver call; `_solutions` stays empty.
    Skip,
    /// Enumerate every solution, failing above `max_solution`.
    Enumerate,
    PostGeneration {
        vars: Vec<(String, Formula)>,
        conditions: Vec<StaticRule>,
        calc_solution: bool,
    },
    Optimize {
        direction: Direction,
        objective: Formula,
    },
}

/// One option template of a selection query.
#[derive(Debug, Clone, PartialEq)]
pub struct OptionRule {
    pub site: SamplingSite,
    pub cond: OptionCond,
    pub opt_formula: Formula,
    pub opt_text: Template,
    /// Share of the options this template may provide, as `[lo, hi]`.
    pub range: Option<Formula>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum QueryRule {
    Open {
        name: String,
        desc: Template,
        ans_formula: Formula,
        ans_text: Formula,
        ans_assertion: Formula,
    },
    Selection {
        name: String,
        desc: Template,
        select_type: bool,
        opt_num: usize,
        templates: Vec<OptionRule>,
        /// Recorded in the multi-template layout even with one template.
        multiple: bool,
    },
}

impl QueryRule {
    pub fn name(&self) -> &str {
        match self {
            QueryRule::Open { name, .. } | QueryRule::Selection { name, .. } => name,
        }
    }
}

/// One step of a program.
#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    Operator { name: String, function: Formula },
    Variable(VariableRule),
    Family(FamilyRule),
    Derive(DeriveRule),
    DeriveGroup(GroupRule),
    StaticCondition(StaticRule),
    DynamicCondition(DynamicRule),
    Solve(SolveRule),
    Query(QueryRule),
    Problem(Template),
}

impl Instruction {
    /// Short name of the instruction kind, for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Instruction::Operator { .. } => "operator",
            Instruction::Variable(_) => "variable",
            Instruction::Family(_) => "family",
            Instruction::Derive(_) => "derive",
            Instruction::DeriveGroup(_) => "derive_group",
            Instruction::StaticCondition(_) => "static_condition",
            Instruction::DynamicCondition(_) => "dynamic_condition",
            Instruction::Solve(_) => "solve",
            Instruction::Query(_) => "query",
            Instruction::Problem(_) => "problem",
        }
    }
}

/// A compiled specification. Immutable and shared by every worker.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub(crate) instructions: Vec<Instruction>,
    pub(crate) max_solution: usize,
    pub(crate) sym_type: Vec<String>,
    pub(crate) optimizes: bool,
}

impl Program {
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn max_solution(&self) -> usize {
        self.max_solution
    }

    /// Declared sort names of every defined symbol, first appearance first.
    pub fn sym_type(&self) -> &[String] {
        &self.sym_type
    }

    pub fn optimizes(&self) -> bool {
        self.optimizes
    }

    pub fn queries(&self) -> impl Iterator<Item = &QueryRule> {
        self.instructions.iter().filter_map(|i| match i {
            Instruction::Query(q) => Some(q),
            _ => None,
        })
    }
}
