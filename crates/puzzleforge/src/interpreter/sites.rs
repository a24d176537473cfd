//! Sampling sites: evaluating sources, building requests, and mapping
//! sampled or recorded indices back to values.

use std::cell::RefCell;

use puzzleforge_core::{PuzzleError, Result};
use puzzleforge_expr::{Context, Scope, Value};
use puzzleforge_sampler::{
    random_partition, Batch, CondScope, CustomCondition, OptionClassifier, OptionSelection,
    SamplingRequest,
};

use super::oracle::PredicateOracle;
use super::Run;
use crate::configuration::PoolEntry;
use crate::program::SamplingSite;

/// A sampling site with its sources and predicates evaluated.
pub(crate) struct PreparedSite {
    pub sources: Vec<Vec<Value>>,
    pub amount: Vec<usize>,
    /// `_sym` holds one item per source instead of one list per source.
    pub flat: bool,
    pub predicates: Vec<Option<Value>>,
}

impl PreparedSite {
    /// Values of a sampled `[source][amount]` row.
    pub fn row_values(&self, row: &[Vec<usize>]) -> Result<Vec<Vec<Value>>> {
        row.iter()
            .enumerate()
            .map(|(s, indices)| {
                indices
                    .iter()
                    .map(|&i| self.item(s, i))
                    .collect::<Result<Vec<_>>>()
            })
            .collect()
    }

    /// Values and `_ind` entries of a recorded row.
    pub fn recorded_values(&self, row: &[Vec<PoolEntry>]) -> Result<(Vec<Vec<Value>>, Vec<Vec<Value>>)> {
        let mut values = Vec::with_capacity(row.len());
        let mut indices = Vec::with_capacity(row.len());
        for (s, entries) in row.iter().enumerate() {
            let mut field = Vec::with_capacity(entries.len());
            let mut field_ind = Vec::with_capacity(entries.len());
            for entry in entries {
                match entry {
                    PoolEntry::Index(i) => {
                        field.push(self.item(s, *i)?);
                        field_ind.push(Value::from(*i));
                    }
                    PoolEntry::Literal(v) => {
                        field.push(v.clone());
                        field_ind.push(v.clone());
                    }
                }
            }
            values.push(field);
            indices.push(field_ind);
        }
        Ok((values, indices))
    }

    /// `_sym` for one row.
    pub fn sym(&self, values: Vec<Vec<Value>>) -> Value {
        if self.flat {
            Value::list(
                values
                    .into_iter()
                    .map(|field| field.into_iter().next().unwrap_or(Value::None))
                    .collect(),
            )
        } else {
            Value::list(values.into_iter().map(Value::list).collect())
        }
    }

    fn item(&self, source: usize, index: usize) -> Result<Value> {
        self.sources
            .get(source)
            .and_then(|items| items.get(index))
            .cloned()
            .ok_or_else(|| {
                PuzzleError::replay(format!(
                    "index {index} is out of range for source {source}"
                ))
            })
    }
}

/// Sampled indices as the `_ind` binding sees them.
pub(crate) fn index_values(row: &[Vec<usize>]) -> Vec<Vec<Value>> {
    row.iter()
        .map(|field| field.iter().map(|&i| Value::from(i)).collect())
        .collect()
}

impl Run<'_> {
    pub(super) fn prepare(&mut self, site: &SamplingSite, context: &str) -> Result<PreparedSite> {
        let scope = Scope::new();
        let mut sources = Vec::with_capacity(site.sources.len());
        for source in &site.sources {
            sources.push(self.eval(source, &scope)?.to_vec()?);
        }
        let amount = match &site.amount {
            Some(amounts) => {
                let mut out = Vec::with_capacity(amounts.len());
                for formula in amounts {
                    out.push(self.count(formula, &scope, context)?);
                }
                out
            }
            None => vec![1; sources.len()],
        };
        let mut predicates = Vec::with_capacity(site.custom.len());
        for rule in &site.custom {
            predicates.push(match &rule.constraint {
                Some(formula) => Some(self.eval(formula, &scope)?),
                None => None,
            });
        }
        Ok(PreparedSite {
            sources,
            amount,
            flat: site.amount.is_none(),
            predicates,
        })
    }

    pub(super) fn request(
        &self,
        site: &SamplingSite,
        prepared: &PreparedSite,
        context: &str,
        domain: usize,
    ) -> SamplingRequest {
        let mut request = SamplingRequest::new(context, prepared.sources.iter().map(Vec::len).collect())
            .with_amount(prepared.amount.clone())
            .with_order(site.order.clone())
            .with_duplicate(site.duplicate.clone())
            .with_domain(domain)
            .with_domain_cond(site.domain_cond)
            .with_dim(site.dim)
            .with_dim_cond(site.dim_cond.clone());
        for rule in &site.custom {
            let scope = match rule.scope {
                CondScope::Option => CondScope::Dim,
                other => other,
            };
            let mut condition = CustomCondition::new(scope);
            if let Some(fields) = &rule.fields {
                condition = condition.with_fields(fields.clone());
            }
            if rule.constraint.is_none() {
                condition = condition.distinct();
            }
            request = request.with_custom(condition);
        }
        request
    }

    pub(super) fn sample(&mut self, prepared: &PreparedSite, request: &SamplingRequest) -> Result<Batch> {
        let sampler = self.interpreter.sampler;
        let mut rng = self.fork_rng();
        let ctx = RefCell::new(&mut self.ctx);
        let mut oracle = PredicateOracle::new(&ctx, &prepared.predicates);
        sampler.sample(request, &mut oracle, &mut rng)
    }

    /// Draws option rows. The classifier gets the context cell shared with
    /// the predicate oracle.
    pub(super) fn select(
        &mut self,
        prepared: &PreparedSite,
        request: &SamplingRequest,
        correct: usize,
        incorrect: usize,
        classify: &dyn Fn(&mut Context, &[Vec<usize>]) -> Result<bool>,
    ) -> Result<OptionSelection> {
        let sampler = self.interpreter.sampler;
        let mut rng = self.fork_rng();
        let ctx = RefCell::new(&mut self.ctx);
        let mut oracle = PredicateOracle::new(&ctx, &prepared.predicates);
        let mut classifier = |row: &[Vec<usize>]| -> Result<bool> {
            let mut guard = ctx.borrow_mut();
            classify(&mut **guard, row)
        };
        sampler.select_options(
            request,
            correct,
            incorrect,
            &mut oracle,
            &mut classifier as &mut dyn OptionClassifier,
            &mut rng,
        )
    }

    /// Splits `total` over `size` parts with optional per-part ranges.
    pub(super) fn partition(
        &mut self,
        size: usize,
        total: i64,
        ranges: &[Option<(i64, i64)>],
    ) -> Result<Vec<i64>> {
        let mut rng = self.fork_rng();
        random_partition(size, (0, total), total, Some(ranges), &mut rng)
    }
}
