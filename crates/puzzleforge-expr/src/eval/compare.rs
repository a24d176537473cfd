//! Value comparison functions.

use std::cmp::Ordering;

use puzzleforge_core::{PuzzleError, Result};

use crate::value::Value;

/// Checks if two values are equal under Python rules.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    a == b
}

/// Compares two concrete values.
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a.untagged(), b.untagged()) {
        (Value::Str(x), Value::Str(y)) => Some(x.cmp(y)),
        (Value::List(x), Value::List(y)) | (Value::Tuple(x), Value::Tuple(y)) => {
            for (l, r) in x.iter().zip(y.iter()) {
                if l == r {
                    continue;
                }
                return compare_values(l, r);
            }
            Some(x.len().cmp(&y.len()))
        }
        (x, y) if x.is_numeric() && y.is_numeric() => match (x.as_int(), y.as_int()) {
            (Some(i), Some(j)) => Some(i.cmp(&j)),
            _ => x.as_f64()?.partial_cmp(&y.as_f64()?),
        },
        _ => None,
    }
}

/// Like [`compare_values`] but reports unorderable pairs.
pub fn try_compare(a: &Value, b: &Value, op: &str) -> Result<Ordering> {
    compare_values(a, b).ok_or_else(|| {
        PuzzleError::eval(format!(
            "'{op}' not supported between instances of '{}' and '{}'",
            a.type_name(),
            b.type_name()
        ))
    })
}

/// Sorts values in place, failing on the first unorderable pair.
pub fn sort_values(values: &mut [Value]) -> Result<()> {
    let mut failure = None;
    values.sort_by(|a, b| match compare_values(a, b) {
        Some(ord) => ord,
        None => {
            if failure.is_none() {
                failure = Some((a.type_name(), b.type_name()));
            }
            Ordering::Equal
        }
    });
    match failure {
        Some((l, r)) => Err(PuzzleError::eval(format!(
            "'<' not supported between instances of '{l}' and '{r}'"
        ))),
        None => Ok(()),
    }
}

/// Sorts values by precomputed keys.
pub fn sort_by_keys(values: Vec<Value>, keys: Vec<Value>) -> Result<Vec<Value>> {
    let mut paired: Vec<(Value, Value)> = keys.into_iter().zip(values).collect();
    let mut failure = false;
    paired.sort_by(|(a, _), (b, _)| {
        compare_values(a, b).unwrap_or_else(|| {
            failure = true;
            Ordering::Equal
        })
    });
    if failure {
        return Err(PuzzleError::eval("sort keys are not mutually comparable"));
    }
    Ok(paired.into_iter().map(|(_, v)| v).collect())
}
