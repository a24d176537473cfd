//! Random lists and bounded integer partitions.

use puzzleforge_core::{PuzzleError, Result};
use rand::Rng;
use tracing::trace;

/// Value domain for [`random_list`] elements.
#[derive(Debug, Clone, PartialEq)]
pub enum ElementDomain<T> {
    /// Inclusive integer range.
    IntRange(i64, i64),
    /// Uniform real range, rounded to two decimals.
    FloatRange(f64, f64),
    /// Uniform choice among the given values.
    Choices(Vec<T>),
}

/// One drawn element.
#[derive(Debug, Clone, PartialEq)]
pub enum Element<T> {
    Int(i64),
    Float(f64),
    Choice(T),
}

impl<T: Clone> ElementDomain<T> {
    fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Element<T>> {
        match self {
            ElementDomain::IntRange(lo, hi) if lo <= hi => Ok(Element::Int(rng.random_range(*lo..=*hi))),
            ElementDomain::FloatRange(lo, hi) if lo <= hi => {
                let x = if lo == hi { *lo } else { rng.random_range(*lo..=*hi) };
                Ok(Element::Float((x * 100.0).round() / 100.0))
            }
            ElementDomain::Choices(values) if !values.is_empty() => {
                Ok(Element::Choice(values[rng.random_range(0..values.len())].clone()))
            }
            _ => Err(PuzzleError::random("random list", "empty element domain")),
        }
    }
}

/// Draws `size` independent elements, redrawing the whole list until
/// `predicate` accepts it.
///
/// `per_element[i]`, when set, overrides `domain` for position `i`.
pub fn random_list<T, R, P>(
    size: usize,
    domain: &ElementDomain<T>,
    per_element: Option<&[Option<ElementDomain<T>>]>,
    max_attempts: usize,
    rng: &mut R,
    mut predicate: P,
) -> Result<Vec<Element<T>>>
where
    T: Clone,
    R: Rng + ?Sized,
    P: FnMut(&[Element<T>]) -> Result<bool>,
{
    for attempt in 0..max_attempts {
        let list = (0..size)
            .map(|i| {
                per_element
                    .and_then(|d| d.get(i))
                    .and_then(Option::as_ref)
                    .unwrap_or(domain)
                    .draw(rng)
            })
            .collect::<Result<Vec<_>>>()?;
        if predicate(&list)? {
            return Ok(list);
        }
        trace!(event = "sampling_retry", context = "random list", attempt);
    }
    Err(PuzzleError::random(
        "random list",
        format!("no list satisfied the conditions after {max_attempts} attempts"),
    ))
}

/// Splits `total` into `size` integers, each within its bounds.
///
/// Every element starts at its lower bound. The remainder is first allocated
/// in proportion to each element's headroom, then the leftover units go one
/// at a time by a draw weighted on remaining headroom.
pub fn random_partition<R: Rng + ?Sized>(
    size: usize,
    range: (i64, i64),
    total: i64,
    per_element: Option<&[Option<(i64, i64)>]>,
    rng: &mut R,
) -> Result<Vec<i64>> {
    let fail = |msg: String| Err(PuzzleError::random("partition", msg));
    if size == 0 {
        return fail("size must be positive".into());
    }
    let bounds: Vec<(i64, i64)> = (0..size)
        .map(|i| {
            per_element
                .and_then(|b| b.get(i).copied().flatten())
                .unwrap_or(range)
        })
        .collect();
    if let Some((lo, hi)) = bounds.iter().find(|(lo, hi)| lo > hi) {
        return fail(format!("invalid element bounds [{lo}, {hi}]"));
    }
    let min_total: i64 = bounds.iter().map(|b| b.0).sum();
    let max_total: i64 = bounds.iter().map(|b| b.1).sum();
    if total < min_total || total > max_total {
        return fail(format!("total {total} is outside [{min_total}, {max_total}]"));
    }

    let mut values: Vec<i64> = bounds.iter().map(|b| b.0).collect();
    let remaining = total - min_total;
    if remaining == 0 {
        return Ok(values);
    }
    let space: Vec<i64> = bounds.iter().map(|b| b.1 - b.0).collect();
    let total_space: i64 = space.iter().sum();

    let mut headroom = Vec::with_capacity(size);
    let mut left = remaining;
    for (value, s) in values.iter_mut().zip(&space) {
        let base = (i128::from(*s) * i128::from(remaining) / i128::from(total_space)) as i64;
        *value += base;
        left -= base;
        headroom.push(s - base);
    }

    while left > 0 {
        let weight: i64 = headroom.iter().sum();
        let r = rng.random_range(1..=weight);
        let mut acc = 0;
        for (value, h) in values.iter_mut().zip(headroom.iter_mut()) {
            acc += *h;
            if acc >= r {
                *value += 1;
                *h -= 1;
                break;
            }
        }
        left -= 1;
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_partition_respects_total_and_bounds() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let bounds = [Some((1, 2)), None, Some((0, 0))];
        for _ in 0..50 {
            let parts = random_partition(3, (0, 5), 6, Some(&bounds), &mut rng).unwrap();
            assert_eq!(parts.iter().sum::<i64>(), 6);
            assert!((1..=2).contains(&parts[0]));
            assert!((0..=5).contains(&parts[1]));
            assert_eq!(parts[2], 0);
        }
    }

    #[test]
    fn test_partition_rejects_infeasible_total() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert!(random_partition(2, (0, 3), 7, None, &mut rng).is_err());
        assert!(random_partition(0, (0, 3), 0, None, &mut rng).is_err());
        assert!(random_partition(2, (2, 3), 3, None, &mut rng).is_err());
    }

    #[test]
    fn test_random_list_predicate_and_domains() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let per = [None, Some(ElementDomain::IntRange(9, 9))];
        let list = random_list(
            2,
            &ElementDomain::<()>::IntRange(0, 4),
            Some(&per),
            100,
            &mut rng,
            |l| Ok(matches!(l[0], Element::Int(x) if x % 2 == 0)),
        )
        .unwrap();
        assert!(matches!(list[0], Element::Int(x) if x % 2 == 0));
        assert_eq!(list[1], Element::Int(9));
    }

    #[test]
    fn test_random_list_float_rounding_and_exhaustion() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let list = random_list(3, &ElementDomain::<()>::FloatRange(0.0, 1.0), None, 10, &mut rng, |_| Ok(true)).unwrap();
        for e in list {
            match e {
                Element::Float(x) => assert_eq!((x * 100.0).round() / 100.0, x),
                other => panic!("unexpected {other:?}"),
            }
        }
        let err = random_list(1, &ElementDomain::Choices(vec!['a']), None, 5, &mut rng, |_| Ok(false));
        assert!(err.is_err());
    }
}
