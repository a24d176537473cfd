//! Open-ended and multiple-choice queries.

use puzzleforge_core::{PuzzleError, Result};
use puzzleforge_expr::{Context, Scope, Template, Value};
use puzzleforge_sampler::Row;
use puzzleforge_schema::OptionCond;
use rand::Rng;
use serde_json::{json, Value as Json};

use super::sites::PreparedSite;
use super::Run;
use crate::configuration::{decode_index_entry, decode_row, encode_row};
use crate::program::{Formula, OptionRule, QueryRule};

/// A chosen option: template id and its index row.
type Placed = (usize, Row);

impl Run<'_> {
    pub(super) fn query(&mut self, rule: &QueryRule) -> Result<()> {
        match rule {
            QueryRule::Open {
                name,
                desc,
                ans_formula,
                ans_text,
                ans_assertion,
            } => self.open_query(name, desc, ans_formula, ans_text, ans_assertion),
            QueryRule::Selection {
                name,
                desc,
                select_type,
                opt_num,
                templates,
                multiple,
            } => self.selection_query(name, desc, *select_type, *opt_num, templates, *multiple),
        }
    }

    fn open_query(
        &mut self,
        name: &str,
        desc: &Template,
        ans_formula: &Formula,
        ans_text: &Formula,
        ans_assertion: &Formula,
    ) -> Result<()> {
        let scope = Scope::new();
        let ans = self.eval(ans_formula, &scope)?;
        self.ctx.set_global("_ans", ans.clone());
        let holds = self
            .eval(ans_assertion, &scope)
            .and_then(|v| v.is_truthy())
            .map_err(|e| PuzzleError::AnswerAssertion {
                query: name.to_string(),
                message: format!("`{ans_assertion}` could not be evaluated: {e}"),
            })?;
        if !holds {
            return Err(PuzzleError::AnswerAssertion {
                query: name.to_string(),
                message: format!("answer {} does not satisfy `{ans_assertion}`", ans.repr()),
            });
        }
        let mut text = self.ctx.render(desc, &scope)?;
        text.push('\n');
        self.push_query(name, text, "");
        let answer = self.eval(ans_text, &scope)?.to_string();
        self.answers.push(answer);
        Ok(())
    }

    fn selection_query(
        &mut self,
        name: &str,
        desc: &Template,
        select_type: bool,
        opt_num: usize,
        templates: &[OptionRule],
        multiple: bool,
    ) -> Result<()> {
        self.ctx.set_global("opt_num", Value::from(opt_num));
        let mut prepared = Vec::with_capacity(templates.len());
        for (i, template) in templates.iter().enumerate() {
            prepared.push(self.prepare(&template.site, &format!("{name}[{i}]"))?);
        }
        let solutions: Vec<Value> = self.solutions.iter().cloned().map(Value::Model).collect();

        let (placed, answer) = if self.generating() {
            let (placed, at, recorded) = if multiple {
                self.draw_multiple(name, select_type, opt_num, templates, &prepared, &solutions)?
            } else {
                self.draw_single(name, select_type, opt_num, templates, &prepared, &solutions)?
            };
            self.config.insert_query(name, recorded);
            (placed, letter(at).to_string())
        } else {
            let placed = self.recorded_options(name, templates.len(), multiple)?;
            let mut answer = String::new();
            for (k, (t, row)) in placed.iter().enumerate() {
                let opt = option_value(&prepared[*t], row)?;
                let rule = &templates[*t];
                if classify(&mut self.ctx, &rule.opt_formula, rule.cond, &solutions, opt)? == select_type {
                    answer.push(letter(k));
                }
            }
            (placed, answer)
        };

        let mut text = self.ctx.render(desc, &Scope::new())?;
        text.push('\n');
        let mut lines = Vec::with_capacity(placed.len());
        for (k, (t, row)) in placed.iter().enumerate() {
            let scope = Scope::new()
                .bind("_opt", option_value(&prepared[*t], row)?)
                .bind("_index", Value::from(k));
            let line = self.ctx.render(&templates[*t].opt_text, &scope)?;
            lines.push(format!("{}. {line}", letter(k)));
        }
        text.push_str(&lines.join("\n"));
        text.push('\n');
        self.push_query(name, text, "\n");
        self.answers.push(answer);
        Ok(())
    }

    fn draw_single(
        &mut self,
        name: &str,
        select_type: bool,
        opt_num: usize,
        templates: &[OptionRule],
        prepared: &[PreparedSite],
        solutions: &[Value],
    ) -> Result<(Vec<Placed>, usize, Json)> {
        let (Some(rule), Some(site)) = (templates.first(), prepared.first()) else {
            return Err(PuzzleError::random(name, "selection query has no option template"));
        };
        let others = opt_num.saturating_sub(1);
        let (correct, incorrect) = if select_type { (1, others) } else { (others, 1) };
        let selection = self.select_for(name, rule, site, correct, incorrect, solutions)?;
        let at = self.ctx.rng().random_range(0..opt_num.max(1));
        let tag = |rows: Vec<Row>| rows.into_iter().map(|r| (0, r)).collect::<Vec<_>>();
        let placed = place(select_type, tag(selection.satisfied), tag(selection.unsatisfied), at);
        let pool: Vec<Json> = placed.iter().map(|(_, row)| encode_row(row)).collect();
        Ok((placed, at, json!({ "pool": pool })))
    }

    fn draw_multiple(
        &mut self,
        name: &str,
        select_type: bool,
        opt_num: usize,
        templates: &[OptionRule],
        prepared: &[PreparedSite],
        solutions: &[Value],
    ) -> Result<(Vec<Placed>, usize, Json)> {
        let n = templates.len();
        let total = i64::try_from(opt_num)
            .map_err(|_| PuzzleError::random(name, "too many options"))?;
        let mut ranges = Vec::with_capacity(n);
        for template in templates {
            ranges.push(match &template.range {
                Some(formula) => Some(self.int_range(formula, &Scope::new(), name)?),
                None => None,
            });
        }
        let domain = self.partition(n, total, &ranges)?;
        let caps: Vec<Option<(i64, i64)>> = domain.iter().map(|&d| Some((0, d))).collect();
        let part = self.partition(n, total - 1, &caps)?;
        let rest: Vec<i64> = domain.iter().zip(&part).map(|(d, p)| d - p).collect();
        let (correct, incorrect) = if select_type {
            (rest, part)
        } else {
            (part, rest)
        };

        let mut satisfied = Vec::new();
        let mut unsatisfied = Vec::new();
        for (t, (rule, site)) in templates.iter().zip(prepared).enumerate() {
            let want = |v: i64| usize::try_from(v).unwrap_or(0);
            let (c, i) = (want(correct[t]), want(incorrect[t]));
            if c + i == 0 {
                continue;
            }
            let context = format!("{name}[{t}]");
            let selection = self.select_for(&context, rule, site, c, i, solutions)?;
            satisfied.extend(selection.satisfied.into_iter().map(|r| (t, r)));
            unsatisfied.extend(selection.unsatisfied.into_iter().map(|r| (t, r)));
        }
        let at = self.ctx.rng().random_range(0..opt_num.max(1));
        let placed = place(select_type, satisfied, unsatisfied, at);
        let pool: Vec<Json> = placed
            .iter()
            .map(|(t, row)| json!({ "template_id": t, "config": encode_row(row) }))
            .collect();
        let recorded = json!({
            "pool_domain": domain,
            "pool_correct_num": correct,
            "pool_incorrect_num": incorrect,
            "pool": pool,
        });
        Ok((placed, at, recorded))
    }

    fn select_for(
        &mut self,
        context: &str,
        rule: &OptionRule,
        site: &PreparedSite,
        correct: usize,
        incorrect: usize,
        solutions: &[Value],
    ) -> Result<puzzleforge_sampler::OptionSelection> {
        let request = self.request(&rule.site, site, context, correct + incorrect);
        let classify_row = |ctx: &mut Context, row: &[Vec<usize>]| -> Result<bool> {
            let opt = option_value(site, row)?;
            classify(ctx, &rule.opt_formula, rule.cond, solutions, opt)
        };
        self.select(site, &request, correct, incorrect, &classify_row)
    }

    fn recorded_options(&self, name: &str, templates: usize, multiple: bool) -> Result<Vec<Placed>> {
        let recorded = self.config.query(name)?;
        let pool = recorded
            .get("pool")
            .and_then(Json::as_array)
            .ok_or_else(|| PuzzleError::replay(format!("options of query '{name}' have no 'pool' list")))?;
        pool.iter()
            .map(|entry| {
                if !multiple {
                    return Ok((0, decode_row(entry, &decode_index_entry)?));
                }
                let t = entry
                    .get("template_id")
                    .and_then(Json::as_u64)
                    .and_then(|t| usize::try_from(t).ok())
                    .filter(|&t| t < templates)
                    .ok_or_else(|| {
                        PuzzleError::replay(format!("query '{name}' option {entry} has no valid template_id"))
                    })?;
                let config = entry.get("config").ok_or_else(|| {
                    PuzzleError::replay(format!("query '{name}' option {entry} has no config"))
                })?;
                Ok((t, decode_row(config, &decode_index_entry)?))
            })
            .collect()
    }
}

/// `_opt` for one option row: one list of values per source.
fn option_value(site: &PreparedSite, row: &[Vec<usize>]) -> Result<Value> {
    let values = site.row_values(row)?;
    Ok(Value::list(values.into_iter().map(Value::list).collect()))
}

/// Whether the option formula holds in any (or every) solution.
fn classify(
    ctx: &mut Context,
    formula: &Formula,
    cond: OptionCond,
    solutions: &[Value],
    opt: Value,
) -> Result<bool> {
    let scope = Scope::new().bind("_opt", opt);
    for model in solutions {
        let holds = ctx
            .eval(formula.expr(), &scope.bind("_model", model.clone()))?
            .is_truthy()?;
        match cond {
            OptionCond::Any if holds => return Ok(true),
            OptionCond::All if !holds => return Ok(false),
            _ => {}
        }
    }
    Ok(cond == OptionCond::All)
}

/// Inserts the lone option at `at` among the others.
fn place<T>(select_type: bool, satisfied: Vec<T>, unsatisfied: Vec<T>, at: usize) -> Vec<T> {
    let (lone, mut others) = if select_type {
        (satisfied, unsatisfied)
    } else {
        (unsatisfied, satisfied)
    };
    let tail = others.split_off(at.min(others.len()));
    others.extend(lone);
    others.extend(tail);
    others
}

fn letter(index: usize) -> char {
    u32::try_from(index)
        .ok()
        .and_then(|i| char::from_u32(u32::from(b'A') + i))
        .unwrap_or('?')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_place_inserts_lone_option() {
        let placed = place(true, vec!['s'], vec!['a', 'b', 'c'], 2);
        assert_eq!(placed, ['a', 'b', 's', 'c']);
        let placed = place(false, vec!['a', 'b'], vec!['u'], 0);
        assert_eq!(placed, ['u', 'a', 'b']);
        let placed = place(true, vec!['s'], vec!['a'], 5);
        assert_eq!(placed, ['a', 's']);
    }

    #[test]
    fn test_letters() {
        assert_eq!(letter(0), 'A');
        assert_eq!(letter(3), 'D');
    }
}
