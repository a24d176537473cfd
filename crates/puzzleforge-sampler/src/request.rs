//! Sampling requests and the predicate seams.

use puzzleforge_core::{PuzzleError, Result};

/// One sampled value per source: `row[source]` holds `amount[source]` indices.
pub type Row = Vec<Vec<usize>>;

/// Where a custom predicate is evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CondScope {
    /// One dimension-row at a time, pruning the candidate pool.
    Dim,
    /// The whole drawn batch, by rejection.
    Domain,
    /// Classification of option candidates against solved values.
    Option,
}

impl CondScope {
    pub fn parse(text: &str) -> Option<Self> {
        match text {
            "dim" => Some(CondScope::Dim),
            "domain" => Some(CondScope::Domain),
            "option" => Some(CondScope::Option),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CondScope::Dim => "dim",
            CondScope::Domain => "domain",
            CondScope::Option => "option",
        }
    }
}

/// A custom predicate attached to a request.
///
/// The predicate body lives with the caller; the sampler only knows its scope
/// and which source fields it reads. A domain-scope condition without a
/// constraint means the projected rows must be pairwise distinct.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomCondition {
    pub scope: CondScope,
    pub fields: Option<Vec<usize>>,
    pub has_constraint: bool,
}

impl CustomCondition {
    pub fn new(scope: CondScope) -> Self {
        Self {
            scope,
            fields: None,
            has_constraint: true,
        }
    }

    pub fn with_fields(mut self, fields: Vec<usize>) -> Self {
        self.fields = Some(fields);
        self
    }

    pub fn distinct(mut self) -> Self {
        self.has_constraint = false;
        self
    }

    /// Fields read by the predicate, defaulting to every source.
    pub fn resolved_fields(&self, sources: usize) -> Vec<usize> {
        match &self.fields {
            Some(fields) => fields.clone(),
            None => (0..sources).collect(),
        }
    }
}

/// Everything the sampler needs to draw one batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SamplingRequest {
    /// Name used in error messages and logs.
    pub context: String,
    pub sizes: Vec<usize>,
    pub amount: Vec<usize>,
    pub order: Vec<bool>,
    pub duplicate: Vec<bool>,
    /// Number of rows to produce.
    pub domain: usize,
    pub domain_cond: bool,
    pub dim: usize,
    /// Groups of source fields that must differ across dimension repeats.
    /// Empty means a single group covering every source.
    pub dim_cond: Vec<Vec<usize>>,
    pub custom: Vec<CustomCondition>,
}

impl SamplingRequest {
    /// A request picking one ordered, non-repeating item from each source.
    pub fn new(context: impl Into<String>, sizes: Vec<usize>) -> Self {
        let k = sizes.len();
        Self {
            context: context.into(),
            sizes,
            amount: vec![1; k],
            order: vec![true; k],
            duplicate: vec![false; k],
            domain: 1,
            domain_cond: true,
            dim: 1,
            dim_cond: Vec::new(),
            custom: Vec::new(),
        }
    }

    pub fn with_amount(mut self, amount: Vec<usize>) -> Self {
        self.amount = amount;
        self
    }

    pub fn with_order(mut self, order: Vec<bool>) -> Self {
        self.order = order;
        self
    }

    pub fn with_duplicate(mut self, duplicate: Vec<bool>) -> Self {
        self.duplicate = duplicate;
        self
    }

    pub fn with_domain(mut self, domain: usize) -> Self {
        self.domain = domain;
        self
    }

    pub fn with_domain_cond(mut self, domain_cond: bool) -> Self {
        self.domain_cond = domain_cond;
        self
    }

    pub fn with_dim(mut self, dim: usize) -> Self {
        self.dim = dim;
        self
    }

    pub fn with_dim_cond(mut self, dim_cond: Vec<Vec<usize>>) -> Self {
        self.dim_cond = dim_cond;
        self
    }

    pub fn with_custom(mut self, condition: CustomCondition) -> Self {
        self.custom.push(condition);
        self
    }

    pub fn sources(&self) -> usize {
        self.sizes.len()
    }

    /// Dimension groups with the single-group default applied.
    pub fn groups(&self) -> Vec<Vec<usize>> {
        if self.dim_cond.is_empty() {
            vec![(0..self.sources()).collect()]
        } else {
            self.dim_cond.clone()
        }
    }

    /// Checks shape consistency before any enumeration happens.
    pub fn validate(&self) -> Result<()> {
        let k = self.sources();
        let err = |msg: String| Err(PuzzleError::random(self.context.clone(), msg));
        if self.amount.len() != k || self.order.len() != k || self.duplicate.len() != k {
            return err(format!(
                "amount/order/duplicate must have one entry per source ({k})"
            ));
        }
        if self.dim == 0 {
            return err("dim must be at least 1".into());
        }
        let mut seen = vec![false; k];
        for group in &self.dim_cond {
            for &field in group {
                if field >= k {
                    return err(format!("dim_cond field {field} out of range"));
                }
                if seen[field] {
                    return err(format!("dim_cond field {field} appears twice"));
                }
                seen[field] = true;
            }
        }
        for cond in &self.custom {
            if let Some(fields) = &cond.fields {
                if let Some(bad) = fields.iter().find(|&&f| f >= k) {
                    return err(format!("custom_cond field {bad} out of range"));
                }
            }
        }
        Ok(())
    }
}

/// Indices handed to a predicate, projected onto its fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// One domain entry: `[dim][field][amount]`.
    Draw(Vec<Vec<Vec<usize>>>),
    /// The whole batch: `[domain][dim][field][amount]`.
    Batch(Vec<Vec<Vec<Vec<usize>>>>),
}

/// Evaluates the custom predicates of a request.
///
/// `index` is the position of the condition in [`SamplingRequest::custom`].
pub trait SamplingOracle {
    fn check(&mut self, index: usize, selection: &Selection) -> Result<bool>;
}

/// Oracle for requests without constrained predicates.
impl SamplingOracle for () {
    fn check(&mut self, _index: usize, _selection: &Selection) -> Result<bool> {
        Ok(true)
    }
}

/// Decides whether an option candidate satisfies the option formula.
pub trait OptionClassifier {
    fn classify(&mut self, row: &[Vec<usize>]) -> Result<bool>;
}

impl<F> OptionClassifier for F
where
    F: FnMut(&[Vec<usize>]) -> Result<bool>,
{
    fn classify(&mut self, row: &[Vec<usize>]) -> Result<bool> {
        self(row)
    }
}

/// A sampled batch, shaped `[domain][dim][source][amount]`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Batch {
    pub rows: Vec<Vec<Row>>,
}

impl Batch {
    pub fn new(rows: Vec<Vec<Row>>) -> Self {
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows of a one-dimensional batch.
    pub fn flatten(&self) -> Vec<Row> {
        self.rows
            .iter()
            .filter_map(|entry| entry.first().cloned())
            .collect()
    }
}

/// Renders a recorded index.
pub fn marker(index: usize) -> String {
    format!("__{index}__")
}

/// Parses `"__N__"` back into `N`.
pub fn parse_marker(text: &str) -> Option<usize> {
    text.strip_prefix("__")?
        .strip_suffix("__")?
        .parse()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marker_round_trip() {
        assert_eq!(marker(12), "__12__");
        assert_eq!(parse_marker("__12__"), Some(12));
        assert_eq!(parse_marker("__x__"), None);
        assert_eq!(parse_marker("12"), None);
    }

    #[test]
    fn test_validate_rejects_bad_dim_cond() {
        let req = SamplingRequest::new("t", vec![3, 3]).with_dim_cond(vec![vec![0], vec![0]]);
        assert!(req.validate().is_err());
        let req = SamplingRequest::new("t", vec![3, 3]).with_dim_cond(vec![vec![2]]);
        assert!(req.validate().is_err());
        let req = SamplingRequest::new("t", vec![3]).with_amount(vec![1, 1]);
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_default_group_covers_all_sources() {
        let req = SamplingRequest::new("t", vec![2, 2, 2]);
        assert_eq!(req.groups(), vec![vec![0, 1, 2]]);
    }

    #[test]
    fn test_scope_parse() {
        assert_eq!(CondScope::parse("dim"), Some(CondScope::Dim));
        assert_eq!(CondScope::parse("option").map(|s| s.as_str()), Some("option"));
        assert_eq!(CondScope::parse("row"), None);
    }
}
