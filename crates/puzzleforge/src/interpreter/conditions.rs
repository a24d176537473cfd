//! Static and dynamic conditions.

use puzzleforge_core::{PuzzleError, Result, TermRef};
use puzzleforge_expr::{Provenance, Scope, Template, Value};
use rand::Rng;
use serde_json::{json, Value as Json};

use super::sites::index_values;
use super::Run;
use crate::configuration::{decode_rows, encode_rows};
use crate::program::{DynamicRule, StaticRule};

impl Run<'_> {
    pub(super) fn static_condition(&mut self, rule: &StaticRule) -> Result<()> {
        let scope = Scope::new();
        let desc = self.render_desc(rule.desc.as_ref(), &scope)?;
        let value = self.eval(&rule.formula, &scope)?;
        self.conditions.extend(terms_of(&value)?);
        self.append_conditions(&desc);
        self.ctx.set_global(&rule.name, Value::from(desc));
        Ok(())
    }

    pub(super) fn dynamic_condition(&mut self, rule: &DynamicRule) -> Result<()> {
        let scope = Scope::new();
        if rule.site.sources.is_empty() {
            let desc = self.render_desc(rule.desc.as_ref(), &scope)?;
            let value = self.eval(&rule.formula, &scope)?;
            self.conditions.extend(terms_of(&value)?);
            self.append_conditions(&desc);
            let provenance = Provenance::default().with_desc(Value::from(desc.as_str()));
            let tagged = self.ctx.provenance_mut().tag(Value::from(desc), provenance);
            self.ctx.set_global(&rule.name, tagged);
            return Ok(());
        }

        let prepared = self.prepare(&rule.site, &rule.name)?;
        let (count, rows, pool) = if self.generating() {
            let count = match &rule.count {
                Some(formula) => {
                    let (lo, hi) = self.int_range(formula, &scope, &rule.name)?;
                    if lo > hi {
                        return Err(PuzzleError::random(
                            rule.name.as_str(),
                            format!("empty condition count range [{lo}, {hi}]"),
                        ));
                    }
                    self.ctx.rng().random_range(lo..=hi)
                }
                None => 1,
            };
            let count = usize::try_from(count).map_err(|_| {
                PuzzleError::random(rule.name.as_str(), format!("negative condition count {count}"))
            })?;
            let sampled = if count == 0 {
                Vec::new()
            } else {
                let request = self.request(&rule.site, &prepared, &rule.name, count);
                self.sample(&prepared, &request)?.rows
            };
            let rows = sampled
                .iter()
                .filter_map(|entry| entry.first())
                .map(|row| Ok((prepared.row_values(row)?, index_values(row))))
                .collect::<Result<Vec<_>>>()?;
            (count, rows, encode_rows(&sampled, 1))
        } else {
            let entry = self.config.require(&rule.name)?;
            let count = entry
                .get("domain")
                .and_then(Json::as_u64)
                .and_then(|n| usize::try_from(n).ok())
                .ok_or_else(|| {
                    PuzzleError::replay(format!("configuration entry '{}' has no valid 'domain'", rule.name))
                })?;
            let pool = entry.get("pool").cloned().ok_or_else(|| {
                PuzzleError::replay(format!("configuration entry '{}' has no 'pool'", rule.name))
            })?;
            let rows = decode_rows(&pool, 1)?
                .iter()
                .filter_map(|entry| entry.first())
                .map(|row| prepared.recorded_values(row))
                .collect::<Result<Vec<_>>>()?;
            (count, rows, pool)
        };
        self.config
            .insert(rule.name.clone(), json!({ "domain": count, "pool": pool }));

        let mut desc = String::new();
        let mut data = Vec::with_capacity(rows.len());
        for (index, (values, indices)) in rows.into_iter().enumerate() {
            let sym = prepared.sym(values);
            let scope = Scope::new()
                .bind("_sym", sym.clone())
                .bind("_ind", prepared.sym(indices))
                .bind("_index", Value::from(index));
            let value = self.eval(&rule.formula, &scope)?;
            self.conditions.extend(terms_of(&value)?);
            desc.push_str(&self.render_desc(rule.desc.as_ref(), &scope)?);
            data.push(sym);
        }
        self.append_conditions(&desc);
        let provenance = Provenance::default()
            .with_desc(Value::from(desc.as_str()))
            .with_data(Value::list(data))
            .with_domain(Value::from(count));
        let tagged = self.ctx.provenance_mut().tag(Value::from(desc), provenance);
        self.ctx.set_global(&rule.name, tagged);
        Ok(())
    }

    pub(super) fn render_desc(&mut self, desc: Option<&Template>, scope: &Scope) -> Result<String> {
        match desc {
            Some(template) => self.ctx.render(template, scope),
            None => Ok(String::new()),
        }
    }

    fn append_conditions(&mut self, desc: &str) {
        self.conditions_text.push_str(desc);
        let text = self.conditions_text.clone();
        self.set_text("conditions", &text);
    }
}

/// Solver assertions of a condition value. Lists and tuples contribute one
/// assertion per item.
pub(super) fn terms_of(value: &Value) -> Result<Vec<TermRef>> {
    match value.untagged() {
        Value::List(items) | Value::Tuple(items) => {
            let mut terms = Vec::with_capacity(items.len());
            for item in items.iter() {
                terms.extend(terms_of(item)?);
            }
            Ok(terms)
        }
        other => Ok(vec![other.to_term()?]),
    }
}
