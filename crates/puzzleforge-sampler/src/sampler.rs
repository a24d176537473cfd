//! Layered rejection sampler over index pools.

use std::collections::{HashMap, HashSet};

use puzzleforge_core::{PuzzleError, Result};
use rand::seq::{index, SliceRandom};
use rand::Rng;
use tracing::{debug, trace};

use crate::pool::{binomial, cartesian, combinations_of, field_pool, pool_size};
use crate::request::{
    Batch, CondScope, OptionClassifier, Row, SamplingOracle, SamplingRequest, Selection,
};

/// Default rejection budget.
pub const DEFAULT_MAX_ATTEMPTS: usize = 1000;

/// Default cap on any enumerated candidate pool.
pub const DEFAULT_MAX_POOL_SIZE: usize = 2_000_000;

/// A candidate domain entry: `[dim][source]`, with `None` for fields no
/// group or dim predicate constrains.
type Candidate = Vec<Vec<Option<Vec<usize>>>>;

/// Options drawn for a selection query.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OptionSelection {
    pub satisfied: Vec<Row>,
    pub unsatisfied: Vec<Row>,
}

/// Draws constrained index batches.
///
/// Constraints are applied in layers: per-source pools and `dim_cond` groups
/// are enumerated eagerly, dim-scope predicates prune that pool, and
/// domain-scope predicates are checked by rejection against at most
/// `max_attempts` random batches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexSampler {
    pub max_attempts: usize,
    pub max_pool_size: usize,
}

impl Default for IndexSampler {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            max_pool_size: DEFAULT_MAX_POOL_SIZE,
        }
    }
}

impl IndexSampler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_max_pool_size(mut self, max_pool_size: usize) -> Self {
        self.max_pool_size = max_pool_size;
        self
    }

    /// Draws `request.domain` entries satisfying every layer of the request.
    pub fn sample<O, R>(&self, request: &SamplingRequest, oracle: &mut O, rng: &mut R) -> Result<Batch>
    where
        O: SamplingOracle + ?Sized,
        R: Rng + ?Sized,
    {
        self.draw(request, oracle, None, true, rng)
    }

    /// Like [`IndexSampler::sample`], but every drawn row must also classify
    /// as `wanted`. Requires `dim == 1`.
    pub fn sample_classified<O, R>(
        &self,
        request: &SamplingRequest,
        oracle: &mut O,
        classifier: &mut dyn OptionClassifier,
        wanted: bool,
        rng: &mut R,
    ) -> Result<Batch>
    where
        O: SamplingOracle + ?Sized,
        R: Rng + ?Sized,
    {
        if request.dim != 1 {
            return Err(PuzzleError::random(
                request.context.clone(),
                "option classification requires dim = 1",
            ));
        }
        self.draw(request, oracle, Some(classifier), wanted, rng)
    }

    /// Picks `correct` satisfying and `incorrect` non-satisfying option rows.
    ///
    /// Candidates are shuffled and classified lazily, so only as many
    /// classifier calls are made as the draw needs. Domain-scope predicates
    /// must hold over the chosen rows taken together.
    pub fn select_options<O, R>(
        &self,
        request: &SamplingRequest,
        correct: usize,
        incorrect: usize,
        oracle: &mut O,
        classifier: &mut dyn OptionClassifier,
        rng: &mut R,
    ) -> Result<OptionSelection>
    where
        O: SamplingOracle + ?Sized,
        R: Rng + ?Sized,
    {
        if request.dim != 1 {
            return Err(PuzzleError::random(
                request.context.clone(),
                "option selection requires dim = 1",
            ));
        }
        let candidates = self.candidates(request, oracle)?;
        let fully_covered = candidates
            .iter()
            .all(|c| c.iter().all(|dim_row| dim_row.iter().all(Option::is_some)));
        let mut verdicts: HashMap<Row, bool> = HashMap::new();
        let mut order: Vec<usize> = (0..candidates.len()).collect();

        for attempt in 0..self.max_attempts {
            order.shuffle(rng);
            let mut chosen: HashSet<Row> = HashSet::new();
            let mut selection = OptionSelection::default();
            for &idx in &order {
                if selection.satisfied.len() >= correct && selection.unsatisfied.len() >= incorrect {
                    break;
                }
                let row = match fill(request, &candidates[idx], rng)?.into_iter().next() {
                    Some(row) => row,
                    None => continue,
                };
                if chosen.contains(&row) {
                    continue;
                }
                let verdict = match verdicts.get(&row) {
                    Some(&v) => v,
                    None => {
                        let v = classifier.classify(&row)?;
                        verdicts.insert(row.clone(), v);
                        v
                    }
                };
                if verdict && selection.satisfied.len() < correct {
                    chosen.insert(row.clone());
                    selection.satisfied.push(row);
                } else if !verdict && selection.unsatisfied.len() < incorrect {
                    chosen.insert(row.clone());
                    selection.unsatisfied.push(row);
                }
            }

            if selection.satisfied.len() < correct || selection.unsatisfied.len() < incorrect {
                if fully_covered {
                    return Err(PuzzleError::random(
                        request.context.clone(),
                        format!(
                            "found {} satisfying and {} non-satisfying options, need {correct} and {incorrect}",
                            selection.satisfied.len(),
                            selection.unsatisfied.len()
                        ),
                    ));
                }
                trace!(event = "sampling_retry", context = %request.context, attempt);
                continue;
            }

            let rows: Vec<Vec<Row>> = selection
                .satisfied
                .iter()
                .chain(selection.unsatisfied.iter())
                .map(|row| vec![row.clone()])
                .collect();
            if self.accept(request, oracle, &mut None, true, &rows)? {
                return Ok(selection);
            }
            trace!(event = "sampling_retry", context = %request.context, attempt);
        }

        Err(PuzzleError::random(
            request.context.clone(),
            format!("no valid option set after {} attempts", self.max_attempts),
        ))
    }

    fn draw<O, R>(
        &self,
        request: &SamplingRequest,
        oracle: &mut O,
        mut classifier: Option<&mut dyn OptionClassifier>,
        wanted: bool,
        rng: &mut R,
    ) -> Result<Batch>
    where
        O: SamplingOracle + ?Sized,
        R: Rng + ?Sized,
    {
        if request.domain == 0 {
            request.validate()?;
            return Ok(Batch::default());
        }
        let candidates = self.candidates(request, oracle)?;
        if candidates.is_empty() {
            return Err(PuzzleError::random(
                request.context.clone(),
                "no candidate satisfies the dimension constraints",
            ));
        }
        if request.domain_cond && candidates.len() < request.domain {
            return Err(PuzzleError::random(
                request.context.clone(),
                format!(
                    "{} candidates cannot supply {} distinct rows",
                    candidates.len(),
                    request.domain
                ),
            ));
        }

        for attempt in 0..self.max_attempts {
            let picks: Vec<usize> = if request.domain_cond {
                index::sample(rng, candidates.len(), request.domain).into_vec()
            } else {
                (0..request.domain)
                    .map(|_| rng.random_range(0..candidates.len()))
                    .collect()
            };
            let rows = picks
                .iter()
                .map(|&p| fill(request, &candidates[p], rng))
                .collect::<Result<Vec<_>>>()?;
            if self.accept(request, oracle, &mut classifier, wanted, &rows)? {
                debug!(
                    event = "sample_accepted",
                    context = %request.context,
                    rows = rows.len(),
                    attempts = attempt + 1,
                );
                return Ok(Batch::new(rows));
            }
            trace!(event = "sampling_retry", context = %request.context, attempt);
        }

        Err(PuzzleError::random(
            request.context.clone(),
            format!("no valid batch after {} attempts", self.max_attempts),
        ))
    }

    /// Enumerates the dim-filtered candidate pool.
    fn candidates<O>(&self, request: &SamplingRequest, oracle: &mut O) -> Result<Vec<Candidate>>
    where
        O: SamplingOracle + ?Sized,
    {
        request.validate()?;
        let k = request.sources();
        let dim = request.dim;
        let mut pools: Vec<Option<Vec<Vec<usize>>>> = vec![None; k];

        let mut candidates: Vec<Candidate> = vec![vec![vec![None; k]; dim]];
        let mut covered = vec![false; k];
        for group in request.groups() {
            if group.is_empty() {
                continue;
            }
            let field_pools = group
                .iter()
                .map(|&f| self.pool_for(request, f, &mut pools))
                .collect::<Result<Vec<_>>>()?;
            let group_pool_size = field_pools
                .iter()
                .try_fold(1usize, |acc, p| acc.checked_mul(p.len()));
            self.ensure_within(request, "group pool", group_pool_size)?;
            let group_pool = cartesian(&field_pools);
            if group_pool.len() < dim {
                return Err(PuzzleError::random(
                    request.context.clone(),
                    format!("no valid pool for dim_cond group {group:?}"),
                ));
            }
            self.ensure_within(request, "dimension combinations", binomial(group_pool.len(), dim))?;
            let group_candidates = combinations_of(&group_pool, dim);
            self.ensure_within(
                request,
                "crossed candidates",
                candidates.len().checked_mul(group_candidates.len()),
            )?;

            let mut next = Vec::with_capacity(candidates.len() * group_candidates.len());
            for base in &candidates {
                for gc in &group_candidates {
                    let mut merged = base.clone();
                    for (d, dim_values) in gc.iter().enumerate() {
                        for (j, &field) in group.iter().enumerate() {
                            merged[d][field] = Some(dim_values[j].clone());
                        }
                    }
                    next.push(merged);
                }
            }
            candidates = next;
            for &field in &group {
                covered[field] = true;
            }
        }

        let dim_conds: Vec<(usize, Vec<usize>)> = request
            .custom
            .iter()
            .enumerate()
            .filter(|(_, c)| c.scope == CondScope::Dim)
            .map(|(i, c)| (i, c.resolved_fields(k)))
            .collect();
        if dim_conds.is_empty() {
            debug!(event = "pool_built", context = %request.context, candidates = candidates.len());
            return Ok(candidates);
        }

        let (eager, deferred): (Vec<_>, Vec<_>) = dim_conds
            .into_iter()
            .partition(|(_, fields)| fields.iter().all(|&f| covered[f]));
        candidates = filter_dim(candidates, &eager, oracle)?;

        if !deferred.is_empty() {
            let mut extra: Vec<usize> = deferred
                .iter()
                .flat_map(|(_, fields)| fields.iter().copied())
                .filter(|&f| !covered[f])
                .collect();
            extra.sort_unstable();
            extra.dedup();

            let field_pools = extra
                .iter()
                .map(|&f| self.pool_for(request, f, &mut pools))
                .collect::<Result<Vec<_>>>()?;
            let extra_size = field_pools
                .iter()
                .try_fold(1usize, |acc, p| acc.checked_mul(p.len()))
                .and_then(|n| n.checked_pow(u32::try_from(dim).ok()?));
            self.ensure_within(request, "independent field pool", extra_size)?;
            let extra_pool = cartesian(&field_pools);
            let repeated = cartesian(&vec![extra_pool; dim]);
            self.ensure_within(
                request,
                "merged candidates",
                candidates.len().checked_mul(repeated.len()),
            )?;

            let mut next = Vec::with_capacity(candidates.len() * repeated.len());
            for base in &candidates {
                for rep in &repeated {
                    let mut merged = base.clone();
                    for (d, values) in rep.iter().enumerate() {
                        for (j, &field) in extra.iter().enumerate() {
                            merged[d][field] = Some(values[j].clone());
                        }
                    }
                    next.push(merged);
                }
            }
            candidates = filter_dim(next, &deferred, oracle)?;
        }

        debug!(event = "pool_built", context = %request.context, candidates = candidates.len());
        Ok(candidates)
    }

    fn pool_for(
        &self,
        request: &SamplingRequest,
        field: usize,
        pools: &mut [Option<Vec<Vec<usize>>>],
    ) -> Result<Vec<Vec<usize>>> {
        if let Some(pool) = &pools[field] {
            return Ok(pool.clone());
        }
        let (n, amount) = (request.sizes[field], request.amount[field]);
        let (order, duplicate) = (request.order[field], request.duplicate[field]);
        self.ensure_within(request, "source pool", pool_size(n, amount, order, duplicate))?;
        let pool = field_pool(n, amount, order, duplicate);
        if pool.is_empty() {
            return Err(PuzzleError::random(
                request.context.clone(),
                format!("source {field} cannot supply {amount} items from {n}"),
            ));
        }
        pools[field] = Some(pool.clone());
        Ok(pool)
    }

    fn ensure_within(&self, request: &SamplingRequest, what: &str, size: Option<usize>) -> Result<()> {
        match size {
            Some(n) if n <= self.max_pool_size => Ok(()),
            Some(n) => Err(PuzzleError::random(
                request.context.clone(),
                format!("{what} of {n} exceeds the pool limit {}", self.max_pool_size),
            )),
            None => Err(PuzzleError::random(
                request.context.clone(),
                format!("{what} overflows the pool limit {}", self.max_pool_size),
            )),
        }
    }

    fn accept<O>(
        &self,
        request: &SamplingRequest,
        oracle: &mut O,
        classifier: &mut Option<&mut dyn OptionClassifier>,
        wanted: bool,
        rows: &[Vec<Row>],
    ) -> Result<bool>
    where
        O: SamplingOracle + ?Sized,
    {
        let k = request.sources();
        for (i, cond) in request.custom.iter().enumerate() {
            if cond.scope != CondScope::Domain {
                continue;
            }
            let fields = cond.resolved_fields(k);
            let projected: Vec<Vec<Vec<Vec<usize>>>> = rows
                .iter()
                .map(|entry| {
                    entry
                        .iter()
                        .map(|row| fields.iter().map(|&f| row[f].clone()).collect())
                        .collect()
                })
                .collect();
            let holds = if cond.has_constraint {
                oracle.check(i, &Selection::Batch(projected))?
            } else {
                let mut seen = HashSet::new();
                projected.into_iter().all(|p| seen.insert(p))
            };
            if !holds {
                return Ok(false);
            }
        }
        if let Some(classifier) = classifier.as_mut() {
            for entry in rows {
                for row in entry {
                    if classifier.classify(row)? != wanted {
                        return Ok(false);
                    }
                }
            }
        }
        Ok(true)
    }
}

fn filter_dim<O>(
    candidates: Vec<Candidate>,
    conds: &[(usize, Vec<usize>)],
    oracle: &mut O,
) -> Result<Vec<Candidate>>
where
    O: SamplingOracle + ?Sized,
{
    if conds.is_empty() {
        return Ok(candidates);
    }
    let mut kept = Vec::with_capacity(candidates.len());
    'next: for candidate in candidates {
        for (i, fields) in conds {
            let projected: Vec<Vec<Vec<usize>>> = candidate
                .iter()
                .map(|dim_row| {
                    fields
                        .iter()
                        .map(|&f| dim_row[f].clone().unwrap_or_default())
                        .collect()
                })
                .collect();
            if !oracle.check(*i, &Selection::Draw(projected))? {
                continue 'next;
            }
        }
        kept.push(candidate);
    }
    Ok(kept)
}

/// Completes a candidate by drawing every unconstrained field independently.
fn fill<R: Rng + ?Sized>(request: &SamplingRequest, candidate: &Candidate, rng: &mut R) -> Result<Vec<Row>> {
    candidate
        .iter()
        .map(|dim_row| {
            dim_row
                .iter()
                .enumerate()
                .map(|(field, slot)| match slot {
                    Some(values) => Ok(values.clone()),
                    None => random_indices(request, field, rng),
                })
                .collect()
        })
        .collect()
}

fn random_indices<R: Rng + ?Sized>(request: &SamplingRequest, field: usize, rng: &mut R) -> Result<Vec<usize>> {
    let (n, amount) = (request.sizes[field], request.amount[field]);
    if amount <= n {
        Ok(index::sample(rng, n, amount).into_vec())
    } else if request.duplicate[field] && n > 0 {
        Ok((0..amount).map(|_| rng.random_range(0..n)).collect())
    } else {
        Err(PuzzleError::random(
            request.context.clone(),
            format!("source {field} cannot supply {amount} items from {n}"),
        ))
    }
}

#[cfg(test)]
#[path = "sampler_tests.rs"]
mod tests;
