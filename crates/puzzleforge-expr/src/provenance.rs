//! Provenance side table.
//!
//! Binds constructed values to the source data and description template they
//! came from. Entries are keyed by a [`SymbolId`] assigned when the value is
//! tagged, or by the [`VarId`] of a family variable, never by structural
//! value.

use std::collections::HashMap;

use puzzleforge_core::{PuzzleError, Result, Sort, VarId};

use crate::value::{Tagged, Value};

/// Stable identifier of a tagged value within one evaluation context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymbolId(pub u64);

/// Metadata bound to one symbol or condition.
#[derive(Debug, Clone, Default)]
pub struct Provenance {
    /// Index parameters of a family variable, keyed by source label.
    pub p: Option<Value>,
    pub sort: Option<Sort>,
    /// Raw description template or rendered text.
    pub desc: Option<Value>,
    /// Source data the value was sampled from.
    pub data: Option<Value>,
    /// Number of expressions of a dynamic condition.
    pub domain: Option<Value>,
}

impl Provenance {
    pub fn with_desc(mut self, desc: Value) -> Self {
        self.desc = Some(desc);
        self
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_domain(mut self, domain: Value) -> Self {
        self.domain = Some(domain);
        self
    }
}

/// Which provenance field a lookup reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Desc,
    Data,
    Domain,
}

impl Field {
    fn name(&self) -> &'static str {
        match self {
            Field::Desc => "description",
            Field::Data => "bound data",
            Field::Domain => "domain",
        }
    }
}

#[derive(Debug, Default)]
pub struct ProvenanceTable {
    next: u64,
    by_symbol: HashMap<SymbolId, Provenance>,
    by_var: HashMap<VarId, Provenance>,
}

impl ProvenanceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps `value` in a fresh tag and records its provenance.
    pub fn tag(&mut self, value: Value, provenance: Provenance) -> Value {
        let id = SymbolId(self.next);
        self.next += 1;
        self.by_symbol.insert(id, provenance);
        Value::Tagged(std::sync::Arc::new(Tagged {
            id,
            value: value.into_untagged(),
        }))
    }

    pub fn bind_var(&mut self, var: VarId, provenance: Provenance) {
        self.by_var.insert(var, provenance);
    }

    pub fn len(&self) -> usize {
        self.by_symbol.len() + self.by_var.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Provenance of a tagged value or a family variable.
    pub fn lookup(&self, value: &Value) -> Option<&Provenance> {
        match value {
            Value::Tagged(tagged) => self
                .by_symbol
                .get(&tagged.id)
                .or_else(|| self.lookup(&tagged.value)),
            Value::Term(term) => term.as_var().and_then(|v| self.by_var.get(&v.id)),
            _ => None,
        }
    }

    /// Reads one field, mapping element-wise over lists and tuples that carry
    /// no provenance of their own.
    pub fn field(&self, value: &Value, field: Field) -> Result<Value> {
        if let Some(prov) = self.lookup(value) {
            let found = match field {
                Field::Desc => return Ok(prov.desc.clone().unwrap_or(Value::None)),
                Field::Data => prov.data.clone(),
                Field::Domain => prov.domain.clone(),
            };
            return found.ok_or_else(|| {
                PuzzleError::eval(format!("cannot find the {} of {}", field.name(), value))
            });
        }
        self.map_elements(value, |table, item| table.field(item, field))
            .unwrap_or_else(|| {
                Err(PuzzleError::eval(format!(
                    "cannot find the {} of {}",
                    field.name(),
                    value
                )))
            })
    }

    /// Reads index parameter `name` of a family variable.
    pub fn param(&self, value: &Value, name: &Value) -> Result<Value> {
        if let Some(prov) = self.lookup(value) {
            let params = match &prov.p {
                Some(Value::Map(map)) => map,
                _ => {
                    return Err(PuzzleError::eval(format!(
                        "{value} carries no index parameters"
                    )))
                }
            };
            return params.get(name).cloned().ok_or_else(|| {
                PuzzleError::eval(format!("{value} has no index parameter {}", name.repr()))
            });
        }
        self.map_elements(value, |table, item| table.param(item, name))
            .unwrap_or_else(|| {
                Err(PuzzleError::eval(format!(
                    "cannot find the p of {value}"
                )))
            })
    }

    fn map_elements<F>(&self, value: &Value, mut f: F) -> Option<Result<Value>>
    where
        F: FnMut(&Self, &Value) -> Result<Value>,
    {
        match value.untagged() {
            Value::List(items) => Some(
                items
                    .iter()
                    .map(|item| f(self, item))
                    .collect::<Result<Vec<_>>>()
                    .map(Value::list),
            ),
            Value::Tuple(items) => Some(
                items
                    .iter()
                    .map(|item| f(self, item))
                    .collect::<Result<Vec<_>>>()
                    .map(Value::tuple),
            ),
            _ => None,
        }
    }
}
