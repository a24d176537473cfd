//! The solving phase.

use puzzleforge_core::{PuzzleError, Result};
use puzzleforge_expr::{Scope, Value};
use puzzleforge_solver::{Direction, Orchestrator};
use serde_json::json;
use tracing::debug;

use super::conditions::terms_of;
use super::Run;
use crate::configuration::SOLUTION_ID_KEY;
use crate::program::{Formula, SolveRule, StaticRule};

impl Run<'_> {
    pub(super) fn solve(&mut self, rule: &SolveRule) -> Result<()> {
        match rule {
            SolveRule::Skip => {
                self.cond_num = 0;
                self.set_solutions(Vec::new());
                Ok(())
            }
            SolveRule::Enumerate => {
                let outcome = self.orchestrator().solve(&self.conditions)?;
                debug!(event = "solutions", count = outcome.solutions.len());
                self.cond_num = outcome.condition_count;
                self.set_solutions(outcome.solutions);
                Ok(())
            }
            SolveRule::PostGeneration {
                vars,
                conditions,
                calc_solution,
            } => self.post_generation(vars, conditions, *calc_solution),
            SolveRule::Optimize {
                direction,
                objective,
            } => self.optimize(*direction, objective),
        }
    }

    /// A fresh orchestrator with every declared unknown.
    fn orchestrator(&self) -> Orchestrator {
        let mut orchestrator =
            Orchestrator::new(&self.interpreter.settings.solver, self.program.max_solution());
        for declaration in self.ctx.vars().iter() {
            orchestrator.declare(&declaration.var, declaration.bounds);
        }
        orchestrator
    }

    fn post_generation(
        &mut self,
        vars: &[(String, Formula)],
        conditions: &[StaticRule],
        calc_solution: bool,
    ) -> Result<()> {
        let baseline = self.orchestrator().baseline(&self.conditions)?;
        let sol_id = if self.generating() {
            0
        } else {
            let recorded = self.config.require(SOLUTION_ID_KEY)?;
            recorded
                .as_u64()
                .and_then(|id| usize::try_from(id).ok())
                .ok_or_else(|| PuzzleError::replay(format!("'{SOLUTION_ID_KEY}' holds {recorded}")))?
        };
        let sol = baseline.get(sol_id).cloned().ok_or_else(|| {
            PuzzleError::replay(format!(
                "solution {sol_id} is out of range, the baseline has {}",
                baseline.len()
            ))
        })?;
        self.config.insert(SOLUTION_ID_KEY, json!(sol_id));
        self.ctx.set_global("_sol_id", Value::from(sol_id));
        self.ctx.set_global("_sol", Value::Model(sol));
        self.set_solutions(baseline);

        let scope = Scope::new();
        for (name, formula) in vars {
            let value = if self.recomputes(name) {
                self.eval(formula, &scope)?
            } else {
                Value::from_json(self.config.require(name)?)
            };
            self.config.insert(name.clone(), value.to_json());
            self.ctx.set_global(name, value);
        }

        if !calc_solution {
            self.cond_num = 0;
            return Ok(());
        }
        let mut post = Vec::new();
        for cond in conditions {
            let desc = self.render_desc(cond.desc.as_ref(), &scope)?;
            let value = self.eval(&cond.formula, &scope)?;
            post.extend(terms_of(&value)?);
            if !desc.is_empty() {
                self.post_text.push_str(&desc);
                self.post_text.push(';');
            }
            let text = self.post_text.clone();
            self.set_text("post_gen_conditions", &text);
            self.ctx.set_global(&cond.name, Value::from(desc));
        }
        let outcome = self.orchestrator().resolve_with(&self.conditions, &post)?;
        debug!(event = "solutions", count = outcome.solutions.len());
        self.cond_num = outcome.condition_count;
        self.set_solutions(outcome.solutions);
        Ok(())
    }

    fn optimize(&mut self, direction: Direction, objective: &Formula) -> Result<()> {
        let objective = self.eval(objective, &Scope::new())?.to_term()?;
        let outcome = self
            .orchestrator()
            .optimize(&self.conditions, &objective, direction)?;
        self.cond_num = outcome.condition_count;
        self.opt_solution = Some(outcome.model.to_string());
        self.ctx.set_global("_value", Value::from_const(outcome.value));
        self.ctx.set_global("_sol", Value::Model(outcome.model.clone()));
        self.set_solutions(vec![outcome.model]);
        Ok(())
    }
}
