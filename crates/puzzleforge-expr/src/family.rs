//! Indexed families of solver variables.
//!
//! A [`SymbolFamily`] is an ordered map from a composite key (one element per
//! source) to either a single solver variable or a small struct of named
//! attribute variables. Iteration goes through explicit accessors rather
//! than dictionary-style duck typing.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use puzzleforge_core::{PuzzleError, Result, Sort, TermRef};

use crate::provenance::{Provenance, ProvenanceTable};
use crate::value::Value;
use crate::vars::VarRegistry;

/// Definition of a family before its variables are declared.
#[derive(Debug, Clone)]
pub struct FamilyDef {
    pub name: String,
    /// Source label (the source expression text) and its items.
    pub sources: Vec<(String, Vec<Value>)>,
    pub attrs: Option<Vec<String>>,
    pub sorts: Vec<Sort>,
    pub descs: Vec<Option<String>>,
    pub bounds: Option<(i64, i64)>,
}

#[derive(Debug, Clone)]
pub enum FamilyEntry {
    Single(TermRef),
    Attrs(IndexMap<Arc<str>, TermRef>),
}

impl FamilyEntry {
    fn to_value(&self) -> Value {
        match self {
            FamilyEntry::Single(t) => Value::Term(Arc::clone(t)),
            FamilyEntry::Attrs(attrs) => Value::map(
                attrs
                    .iter()
                    .map(|(name, t)| (Value::Str(Arc::clone(name)), Value::Term(Arc::clone(t))))
                    .collect(),
            ),
        }
    }
}

#[derive(Debug)]
pub struct SymbolFamily {
    name: Arc<str>,
    dimension: usize,
    attrs: Option<Vec<Arc<str>>>,
    entries: IndexMap<Value, FamilyEntry>,
}

impl SymbolFamily {
    /// Declares one variable per key (and attribute) and records each
    /// variable's provenance.
    pub fn build(
        def: &FamilyDef,
        vars: &mut VarRegistry,
        provenance: &mut ProvenanceTable,
    ) -> Result<Self> {
        match &def.attrs {
            None if def.sorts.len() != 1 => {
                return Err(PuzzleError::eval(format!(
                    "family '{}' without attributes needs exactly one type",
                    def.name
                )))
            }
            Some(attrs) if attrs.len() != def.sorts.len() => {
                return Err(PuzzleError::eval(format!(
                    "family '{}' declares {} attributes but {} types",
                    def.name,
                    attrs.len(),
                    def.sorts.len()
                )))
            }
            _ => {}
        }
        if def.sources.is_empty() {
            return Err(PuzzleError::eval(format!(
                "family '{}' needs at least one source",
                def.name
            )));
        }

        let lists: Vec<Vec<Value>> = def.sources.iter().map(|(_, items)| items.clone()).collect();
        let keys = puzzleforge_sampler::pool::cartesian(&lists);
        let dimension = def.sources.len();
        let mut entries = IndexMap::with_capacity(keys.len());
        for parts in keys {
            let key_text = parts
                .iter()
                .map(|p| p.to_string())
                .collect::<Vec<_>>()
                .join("_");
            let key = if dimension == 1 {
                parts[0].clone()
            } else {
                Value::tuple(parts.clone())
            };
            let params = key_params(def, &parts);
            let entry = match &def.attrs {
                None => {
                    let var_name = format!("{}_{}", def.name, key_text);
                    let term = declare(vars, provenance, &var_name, def.sorts[0], def, &params, 0)?;
                    FamilyEntry::Single(term)
                }
                Some(attrs) => {
                    let mut fields = IndexMap::with_capacity(attrs.len());
                    for (i, attr) in attrs.iter().enumerate() {
                        let var_name = format!("{}_{}_{}", def.name, key_text, attr);
                        let term = declare(vars, provenance, &var_name, def.sorts[i], def, &params, i)?;
                        fields.insert(Arc::from(attr.as_str()), term);
                    }
                    FamilyEntry::Attrs(fields)
                }
            };
            if entries.insert(key.clone(), entry).is_some() {
                return Err(PuzzleError::eval(format!(
                    "family '{}' has duplicate key {}",
                    def.name,
                    key.repr()
                )));
            }
        }

        Ok(Self {
            name: Arc::from(def.name.as_str()),
            dimension,
            attrs: def
                .attrs
                .as_ref()
                .map(|attrs| attrs.iter().map(|a| Arc::from(a.as_str())).collect()),
            entries,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> Vec<Value> {
        self.entries.keys().cloned().collect()
    }

    pub fn contains_key(&self, key: &Value) -> bool {
        self.normalize_key(key)
            .map(|k| self.entries.contains_key(&k))
            .unwrap_or(false)
    }

    /// Entry for `key`. One-source families accept a one-element tuple;
    /// multi-source families require a tuple.
    pub fn get_entry(&self, key: &Value) -> Result<Value> {
        let normalized = self.normalize_key(key)?;
        self.entries
            .get(&normalized)
            .map(FamilyEntry::to_value)
            .ok_or_else(|| {
                PuzzleError::eval(format!("family '{}' has no key {}", self.name, key.repr()))
            })
    }

    /// All variables of one attribute in key order.
    pub fn by_attribute(&self, attr: &str) -> Result<Vec<Value>> {
        let attrs = self.attrs.as_ref().ok_or_else(|| {
            PuzzleError::eval(format!(
                "family '{}' has a single attribute; iterate its values instead",
                self.name
            ))
        })?;
        if !attrs.iter().any(|a| &**a == attr) {
            return Err(PuzzleError::eval(format!(
                "family '{}' has no attribute '{attr}'",
                self.name
            )));
        }
        Ok(self
            .entries
            .values()
            .filter_map(|entry| match entry {
                FamilyEntry::Attrs(fields) => fields.get(attr).map(|t| Value::Term(Arc::clone(t))),
                FamilyEntry::Single(_) => None,
            })
            .collect())
    }

    /// Variables as a flat list, or one list per attribute.
    pub fn to_list(&self) -> Vec<Value> {
        match &self.attrs {
            None => self.values(),
            Some(attrs) => attrs
                .iter()
                .map(|attr| Value::list(self.by_attribute(attr).unwrap_or_default()))
                .collect(),
        }
    }

    pub fn values(&self) -> Vec<Value> {
        self.entries.values().map(FamilyEntry::to_value).collect()
    }

    pub fn items(&self) -> Vec<Value> {
        self.entries
            .iter()
            .map(|(k, entry)| Value::tuple(vec![k.clone(), entry.to_value()]))
            .collect()
    }

    fn normalize_key(&self, key: &Value) -> Result<Value> {
        let key = key.untagged();
        if self.dimension == 1 {
            return Ok(match key {
                Value::Tuple(parts) if parts.len() == 1 => parts[0].clone(),
                other => other.clone(),
            });
        }
        match key {
            Value::Tuple(parts) if parts.len() == self.dimension => Ok(key.clone()),
            _ => Err(PuzzleError::eval(format!(
                "family '{}' has {}-part keys; index it with a tuple",
                self.name, self.dimension
            ))),
        }
    }
}

fn key_params(def: &FamilyDef, parts: &[Value]) -> Value {
    let mut params: IndexMap<Value, Value> = def
        .sources
        .iter()
        .zip(parts)
        .map(|((label, _), part)| (Value::str(label), part.clone()))
        .collect();
    if parts.len() > 1 {
        for (i, ((label, items), part)) in def.sources.iter().zip(parts).enumerate().skip(1) {
            let mut dim = IndexMap::new();
            dim.insert(Value::str("category"), Value::str(label));
            dim.insert(Value::str("value"), part.clone());
            dim.insert(Value::str("source_values"), Value::list(items.clone()));
            params.insert(Value::from(format!("dim_{i}")), Value::map(dim));
        }
    }
    Value::map(params)
}

fn declare(
    vars: &mut VarRegistry,
    provenance: &mut ProvenanceTable,
    var_name: &str,
    sort: Sort,
    def: &FamilyDef,
    params: &Value,
    attr_index: usize,
) -> Result<TermRef> {
    let bounds = match sort {
        Sort::Int | Sort::BitVec(_) => def.bounds,
        _ => None,
    };
    let term = vars.declare(var_name, sort, bounds)?;
    if let Some(var) = term.as_var() {
        provenance.bind_var(
            var.id,
            Provenance {
                p: Some(params.clone()),
                sort: Some(sort),
                desc: def
                    .descs
                    .get(attr_index)
                    .cloned()
                    .flatten()
                    .map(Value::from),
                data: None,
                domain: None,
            },
        );
    }
    Ok(term)
}

impl fmt::Display for SymbolFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (key, entry)) in self.entries.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", key.repr(), entry.to_value().repr())?;
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(attrs: Option<Vec<&str>>, sorts: Vec<Sort>) -> (SymbolFamily, VarRegistry, ProvenanceTable) {
        let def = FamilyDef {
            name: "grade".into(),
            sources: vec![
                ("levels".into(), vec![Value::str("A"), Value::str("B")]),
                ("subjects".into(), vec![Value::str("Math"), Value::str("Art")]),
            ],
            attrs: attrs.map(|a| a.into_iter().map(String::from).collect()),
            sorts,
            descs: vec![Some("score of {p}".into()), None],
            bounds: Some((0, 9)),
        };
        let mut vars = VarRegistry::new();
        let mut prov = ProvenanceTable::new();
        let family = SymbolFamily::build(&def, &mut vars, &mut prov).unwrap();
        (family, vars, prov)
    }

    #[test]
    fn test_variable_naming_and_bounds() {
        let (family, vars, _) = build(Some(vec!["score", "hard"]), vec![Sort::Int, Sort::Bool]);
        assert_eq!(family.len(), 4);
        assert_eq!(vars.len(), 8);
        let decl = vars.get("grade_A_Math_score").unwrap();
        assert_eq!(decl.bounds, Some((0, 9)));
        assert_eq!(vars.get("grade_B_Art_hard").unwrap().bounds, None);
    }

    #[test]
    fn test_multi_dim_keys_require_tuples() {
        let (family, _, _) = build(None, vec![Sort::Int]);
        assert!(family.get_entry(&Value::str("A")).is_err());
        let key = Value::tuple(vec![Value::str("A"), Value::str("Art")]);
        assert_eq!(family.get_entry(&key).unwrap().to_string(), "grade_A_Art");
        assert!(family.by_attribute("score").is_err());
    }

    #[test]
    fn test_to_list_groups_by_attribute() {
        let (family, _, _) = build(Some(vec!["score", "hard"]), vec![Sort::Int, Sort::Bool]);
        let lists = family.to_list();
        assert_eq!(lists.len(), 2);
        assert_eq!(
            lists[1].to_string(),
            "[grade_A_Math_hard, grade_A_Art_hard, grade_B_Math_hard, grade_B_Art_hard]"
        );
    }

    #[test]
    fn test_provenance_params() {
        let (family, _, prov) = build(None, vec![Sort::Int]);
        let var = family
            .get_entry(&Value::tuple(vec![Value::str("B"), Value::str("Math")]))
            .unwrap();
        assert_eq!(prov.param(&var, &Value::str("levels")).unwrap(), Value::str("B"));
        let dim = prov.param(&var, &Value::str("dim_1")).unwrap();
        assert_eq!(
            dim.to_string(),
            "{'category': 'subjects', 'value': 'Math', 'source_values': ['Math', 'Art']}"
        );
        let desc = prov.field(&var, crate::provenance::Field::Desc).unwrap();
        assert_eq!(desc, Value::str("score of {p}"));
    }
}
