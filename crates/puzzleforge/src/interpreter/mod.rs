//! Program interpreter.
//!
//! One [`Interpreter`] runs a [`Program`] in either [`Mode`]. Every random
//! choice point asks the run whether it is generating: if so it draws and
//! records, otherwise it reads the recorded choice back. The two modes share
//! every other line, which keeps generation and replay in lock-step.

mod conditions;
mod oracle;
mod query;
mod sites;
mod solve;
mod symbols;

use std::collections::HashSet;

use puzzleforge_config::GeneratorConfig;
use puzzleforge_core::{Model, PuzzleError, Result, TermRef};
use puzzleforge_expr::{Context, Scope, Value};
use puzzleforge_sampler::IndexSampler;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::trace;

use crate::configuration::Configuration;
use crate::program::{Formula, Instruction, Program, VariableRule, VariableSource};
use crate::record::{Parameters, Puzzle};

/// Seed of the random stream used while replaying. Only spec-controlled
/// variables and formulas that call random builtins ever draw from it.
const REPLAY_SEED: u64 = 0;

/// Where random choices come from.
pub enum Mode {
    /// Draw fresh choices and record them.
    Generate(ChaCha8Rng),
    /// Read choices from a recorded configuration. Variables named in
    /// `spec_controlled` are recomputed instead.
    Replay {
        configuration: Configuration,
        spec_controlled: Vec<String>,
    },
}

impl Mode {
    pub fn generate(seed: u64) -> Self {
        Mode::Generate(ChaCha8Rng::seed_from_u64(seed))
    }

    pub fn replay(configuration: Configuration) -> Self {
        Mode::Replay {
            configuration,
            spec_controlled: Vec::new(),
        }
    }
}

/// Runs compiled programs.
#[derive(Debug, Clone)]
pub struct Interpreter {
    settings: GeneratorConfig,
    sampler: IndexSampler,
}

impl Interpreter {
    pub fn new(settings: &GeneratorConfig) -> Self {
        Self {
            settings: settings.clone(),
            sampler: IndexSampler::new()
                .with_max_attempts(settings.sampler.max_attempts)
                .with_max_pool_size(settings.sampler.max_pool_size),
        }
    }

    pub fn settings(&self) -> &GeneratorConfig {
        &self.settings
    }

    /// Runs every instruction of `program` and assembles the puzzle record.
    pub fn run(&self, program: &Program, mode: Mode) -> Result<Puzzle> {
        let mut run = Run::new(self, program, mode);
        for instruction in program.instructions() {
            trace!(event = "instruction", kind = instruction.kind());
            run.step(instruction)?;
        }
        run.finish()
    }
}

/// State of one puzzle instance.
pub(crate) struct Run<'a> {
    interpreter: &'a Interpreter,
    program: &'a Program,
    ctx: Context,
    replaying: bool,
    spec_controlled: HashSet<String>,
    config: Configuration,
    conditions: Vec<TermRef>,
    conditions_text: String,
    post_text: String,
    solutions: Vec<Model>,
    cond_num: usize,
    sym_num: usize,
    opt_solution: Option<String>,
    queries_text: String,
    query_count: usize,
    answers: Vec<String>,
    problem: String,
}

impl<'a> Run<'a> {
    fn new(interpreter: &'a Interpreter, program: &'a Program, mode: Mode) -> Self {
        let (rng, replaying, spec_controlled, config) = match mode {
            Mode::Generate(rng) => (rng, false, HashSet::new(), Configuration::new()),
            Mode::Replay {
                configuration,
                spec_controlled,
            } => (
                ChaCha8Rng::seed_from_u64(REPLAY_SEED),
                true,
                spec_controlled.into_iter().collect(),
                configuration,
            ),
        };
        let mut ctx = Context::new(rng).with_max_attempts(interpreter.settings.sampler.max_attempts);
        for name in ["conditions", "post_gen_conditions", "queries"] {
            ctx.set_global(name, Value::from(""));
        }
        ctx.set_global("_solutions", Value::list(Vec::new()));
        Self {
            interpreter,
            program,
            ctx,
            replaying,
            spec_controlled,
            config,
            conditions: Vec::new(),
            conditions_text: String::new(),
            post_text: String::new(),
            solutions: Vec::new(),
            cond_num: 0,
            sym_num: 0,
            opt_solution: None,
            queries_text: String::new(),
            query_count: 0,
            answers: Vec::new(),
            problem: String::new(),
        }
    }

    fn step(&mut self, instruction: &Instruction) -> Result<()> {
        match instruction {
            Instruction::Operator { name, function } => {
                let value = self.eval(function, &Scope::new())?;
                self.ctx.set_global(name, value);
                Ok(())
            }
            Instruction::Variable(rule) => self.variable(rule),
            Instruction::Family(rule) => self.family(rule),
            Instruction::Derive(rule) => self.derive(rule),
            Instruction::DeriveGroup(rule) => self.derive_group(rule),
            Instruction::StaticCondition(rule) => self.static_condition(rule),
            Instruction::DynamicCondition(rule) => self.dynamic_condition(rule),
            Instruction::Solve(rule) => self.solve(rule),
            Instruction::Query(rule) => self.query(rule),
            Instruction::Problem(template) => {
                self.problem = self.ctx.render(template, &Scope::new())?;
                Ok(())
            }
        }
    }

    fn finish(self) -> Result<Puzzle> {
        Ok(Puzzle {
            problem: self.problem,
            answer: self.answers.join(Puzzle::ANSWER_SEPARATOR),
            parameters: Parameters {
                cond_num: self.cond_num,
                sym_num: self.sym_num,
                sym_type: self.program.sym_type().to_vec(),
                opt_solution: self.opt_solution,
            },
            config: self.config.to_json(),
        })
    }

    fn generating(&self) -> bool {
        !self.replaying
    }

    /// True when the value named `name` is drawn or computed rather than
    /// read from the record.
    fn recomputes(&self, name: &str) -> bool {
        !self.replaying || self.spec_controlled.contains(name)
    }

    /// A private stream for one sampler call, split off the instance stream.
    fn fork_rng(&mut self) -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(self.ctx.rng().next_u64())
    }

    fn eval(&mut self, formula: &Formula, scope: &Scope) -> Result<Value> {
        self.ctx.eval(formula.expr(), scope)
    }

    fn set_text(&mut self, name: &str, text: &str) {
        self.ctx.set_global(name, Value::from(text));
    }

    /// Evaluates a `[lo, hi]` range.
    fn range(&mut self, formula: &Formula, scope: &Scope, context: &str) -> Result<(Value, Value)> {
        let items = self.eval(formula, scope)?.to_vec()?;
        match <[Value; 2]>::try_from(items) {
            Ok([lo, hi]) => Ok((lo, hi)),
            Err(items) => Err(PuzzleError::random(
                context,
                format!("`{formula}` must give [lo, hi], got {} items", items.len()),
            )),
        }
    }

    fn int_range(&mut self, formula: &Formula, scope: &Scope, context: &str) -> Result<(i64, i64)> {
        let (lo, hi) = self.range(formula, scope, context)?;
        Ok((to_int(&lo, context)?, to_int(&hi, context)?))
    }

    /// Evaluates a non-negative count.
    fn count(&mut self, formula: &Formula, scope: &Scope, context: &str) -> Result<usize> {
        let value = self.eval(formula, scope)?;
        let n = to_int(&value, context)?;
        usize::try_from(n).map_err(|_| {
            PuzzleError::random(context, format!("`{formula}` gave the negative count {n}"))
        })
    }

    fn set_solutions(&mut self, solutions: Vec<Model>) {
        let list = solutions.iter().cloned().map(Value::Model).collect();
        self.ctx.set_global("_solutions", Value::list(list));
        self.solutions = solutions;
    }

    fn variable(&mut self, rule: &VariableRule) -> Result<()> {
        let value = if self.recomputes(&rule.name) {
            self.draw_variable(rule)?
        } else {
            Value::from_json(self.config.require(&rule.name)?)
        };
        self.config.insert(rule.name.clone(), value.to_json());
        self.ctx.set_global(&rule.name, value);
        Ok(())
    }

    fn draw_variable(&mut self, rule: &VariableRule) -> Result<Value> {
        let scope = Scope::new();
        let name = rule.name.as_str();
        match &rule.source {
            VariableSource::Formula(formula) => self.eval(formula, &scope),
            VariableSource::Int(domain) => {
                let (lo, hi) = self.int_range(domain, &scope, name)?;
                if lo > hi {
                    return Err(PuzzleError::random(name, format!("empty range [{lo}, {hi}]")));
                }
                Ok(Value::Int(self.ctx.rng().random_range(lo..=hi)))
            }
            VariableSource::Float(domain) => {
                let (lo, hi) = self.range(domain, &scope, name)?;
                let (lo, hi) = (to_float(&lo, name)?, to_float(&hi, name)?);
                if lo > hi || lo.is_nan() || hi.is_nan() {
                    return Err(PuzzleError::random(name, format!("empty range [{lo}, {hi}]")));
                }
                if lo == hi {
                    return Ok(Value::Float(lo));
                }
                Ok(Value::Float(self.ctx.rng().random_range(lo..=hi)))
            }
            VariableSource::Choice(domain) => {
                let mut items = match domain {
                    Some(formula) => self.eval(formula, &scope)?.to_vec()?,
                    None => vec![Value::Bool(true), Value::Bool(false)],
                };
                match items.len() {
                    0 => Err(PuzzleError::random(name, "cannot choose from an empty domain")),
                    1 => Ok(items.swap_remove(0)),
                    n => {
                        let i = self.ctx.rng().random_range(0..n);
                        Ok(items.swap_remove(i))
                    }
                }
            }
        }
    }

    fn push_query(&mut self, name: &str, desc: String, separator: &str) {
        self.query_count += 1;
        self.queries_text
            .push_str(&format!("{}. {desc}{separator}", self.query_count));
        let text = self.queries_text.clone();
        self.set_text("queries", &text);
        self.ctx.set_global(name, Value::from(desc));
    }
}

/// Python `int()` of a bound: integers as-is, floats truncated.
fn to_int(value: &Value, context: &str) -> Result<i64> {
    if let Some(i) = value.as_int() {
        return Ok(i);
    }
    match value.as_f64() {
        Some(f) if f.is_finite() => Ok(f.trunc() as i64),
        _ => Err(PuzzleError::random(
            context,
            format!("expected an integer, got {}", value.repr()),
        )),
    }
}

fn to_float(value: &Value, context: &str) -> Result<f64> {
    value.as_f64().ok_or_else(|| {
        PuzzleError::random(context, format!("expected a number, got {}", value.repr()))
    })
}

#[cfg(test)]
mod tests;
