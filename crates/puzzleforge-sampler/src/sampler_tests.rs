use super::*;
use crate::request::CustomCondition;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

struct FnOracle<F>(F);

impl<F> SamplingOracle for FnOracle<F>
where
    F: FnMut(usize, &Selection) -> Result<bool>,
{
    fn check(&mut self, index: usize, selection: &Selection) -> Result<bool> {
        (self.0)(index, selection)
    }
}

fn oracle_fn<F>(f: F) -> FnOracle<F>
where
    F: FnMut(usize, &Selection) -> Result<bool>,
{
    FnOracle(f)
}

fn rng() -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(42)
}

#[test]
fn test_five_distinct_pairs_from_six() {
    let req = SamplingRequest::new("pairs", vec![6])
        .with_amount(vec![2])
        .with_order(vec![false])
        .with_duplicate(vec![false])
        .with_domain(5);
    let batch = IndexSampler::new().sample(&req, &mut (), &mut rng()).unwrap();
    let rows = batch.flatten();
    assert_eq!(rows.len(), 5);
    let mut seen = HashSet::new();
    for row in &rows {
        let pair = &row[0];
        assert_eq!(pair.len(), 2);
        assert_ne!(pair[0], pair[1]);
        let mut key = pair.clone();
        key.sort_unstable();
        assert!(seen.insert(key), "repeated pair {pair:?}");
    }
}

#[test]
fn test_dim_repeats_differ_on_group_fields() {
    let req = SamplingRequest::new("dims", vec![3, 4])
        .with_dim(2)
        .with_dim_cond(vec![vec![0]])
        .with_domain(3);
    let batch = IndexSampler::new().sample(&req, &mut (), &mut rng()).unwrap();
    assert_eq!(batch.len(), 3);
    for entry in &batch.rows {
        assert_eq!(entry.len(), 2);
        assert_ne!(entry[0][0], entry[1][0]);
        assert!(entry.iter().all(|row| row[1].len() == 1 && row[1][0] < 4));
    }
}

#[test]
fn test_dim_predicate_prunes_pool() {
    let req = SamplingRequest::new("even", vec![10])
        .with_domain(5)
        .with_custom(CustomCondition::new(CondScope::Dim));
    let mut oracle = oracle_fn(|_, sel: &Selection| match sel {
        Selection::Draw(d) => Ok(d[0][0][0] % 2 == 0),
        Selection::Batch(_) => Ok(true),
    });
    let batch = IndexSampler::new().sample(&req, &mut oracle, &mut rng()).unwrap();
    let mut values: Vec<usize> = batch.flatten().iter().map(|r| r[0][0]).collect();
    values.sort_unstable();
    assert_eq!(values, vec![0, 2, 4, 6, 8]);
}

#[test]
fn test_deferred_dim_predicate_covers_extra_field() {
    let req = SamplingRequest::new("deferred", vec![4, 4])
        .with_dim_cond(vec![vec![0]])
        .with_domain(2)
        .with_custom(CustomCondition::new(CondScope::Dim).with_fields(vec![1]));
    let mut oracle = oracle_fn(|_, sel: &Selection| match sel {
        Selection::Draw(d) => Ok(d[0][0][0] == 3),
        Selection::Batch(_) => Ok(true),
    });
    let batch = IndexSampler::new().sample(&req, &mut oracle, &mut rng()).unwrap();
    assert!(batch.flatten().iter().all(|r| r[1] == vec![3]));
}

#[test]
fn test_domain_predicate_rejection() {
    let req = SamplingRequest::new("sum", vec![5, 5])
        .with_domain(2)
        .with_custom(CustomCondition::new(CondScope::Domain).with_fields(vec![0]));
    let mut calls = 0;
    let mut oracle = oracle_fn(|_, sel: &Selection| {
        calls += 1;
        match sel {
            Selection::Batch(b) => Ok(b.iter().map(|e| e[0][0][0]).sum::<usize>() == 4),
            Selection::Draw(_) => Ok(true),
        }
    });
    let batch = IndexSampler::new().sample(&req, &mut oracle, &mut rng()).unwrap();
    let sum: usize = batch.flatten().iter().map(|r| r[0][0]).sum();
    assert_eq!(sum, 4);
    assert!(calls >= 1);
}

#[test]
fn test_distinct_domain_condition_without_constraint() {
    let req = SamplingRequest::new("distinct", vec![3, 2])
        .with_domain(3)
        .with_custom(CustomCondition::new(CondScope::Domain).with_fields(vec![0]).distinct());
    let batch = IndexSampler::new().sample(&req, &mut (), &mut rng()).unwrap();
    let mut firsts: Vec<usize> = batch.flatten().iter().map(|r| r[0][0]).collect();
    firsts.sort_unstable();
    assert_eq!(firsts, vec![0, 1, 2]);
}

#[test]
fn test_too_few_candidates_is_random_generation_error() {
    let req = SamplingRequest::new("small", vec![3]).with_domain(4);
    let err = IndexSampler::new().sample(&req, &mut (), &mut rng()).unwrap_err();
    assert!(matches!(err, PuzzleError::RandomGeneration { .. }));
    assert!(err.is_recoverable());
}

#[test]
fn test_with_replacement_when_domain_cond_false() {
    let req = SamplingRequest::new("repl", vec![2]).with_domain(6).with_domain_cond(false);
    let batch = IndexSampler::new().sample(&req, &mut (), &mut rng()).unwrap();
    assert_eq!(batch.len(), 6);
}

#[test]
fn test_pool_limit_is_enforced() {
    let req = SamplingRequest::new("huge", vec![50, 50, 50]);
    let err = IndexSampler::new()
        .with_max_pool_size(1000)
        .sample(&req, &mut (), &mut rng())
        .unwrap_err();
    assert!(err.to_string().contains("pool limit"));
}

#[test]
fn test_budget_exhaustion() {
    let req = SamplingRequest::new("never", vec![4])
        .with_custom(CustomCondition::new(CondScope::Domain));
    let mut oracle = oracle_fn(|_, _: &Selection| Ok(false));
    let err = IndexSampler::new()
        .with_max_attempts(3)
        .sample(&req, &mut oracle, &mut rng())
        .unwrap_err();
    assert!(err.to_string().contains("after 3 attempts"));
}

#[test]
fn test_select_options_counts() {
    let req = SamplingRequest::new("options", vec![6]);
    let mut classifier = |row: &[Vec<usize>]| -> Result<bool> { Ok(row[0][0] == 2) };
    let selection = IndexSampler::new()
        .select_options(&req, 1, 3, &mut (), &mut classifier, &mut rng())
        .unwrap();
    assert_eq!(selection.satisfied, vec![vec![vec![2]]]);
    assert_eq!(selection.unsatisfied.len(), 3);
    assert!(selection.unsatisfied.iter().all(|r| r[0][0] != 2));
}

#[test]
fn test_select_options_reports_shortage() {
    let req = SamplingRequest::new("options", vec![3]);
    let mut classifier = |_: &[Vec<usize>]| -> Result<bool> { Ok(false) };
    let err = IndexSampler::new()
        .select_options(&req, 1, 2, &mut (), &mut classifier, &mut rng())
        .unwrap_err();
    assert!(matches!(err, PuzzleError::RandomGeneration { .. }));
}

#[test]
fn test_sample_classified_keeps_wanted_rows() {
    let req = SamplingRequest::new("classified", vec![8]).with_domain(3);
    let mut classifier = |row: &[Vec<usize>]| -> Result<bool> { Ok(row[0][0] < 4) };
    let batch = IndexSampler::new()
        .sample_classified(&req, &mut (), &mut classifier, false, &mut rng())
        .unwrap();
    assert!(batch.flatten().iter().all(|r| r[0][0] >= 4));
}
