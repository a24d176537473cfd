//! Defined and derived symbols.

use std::sync::Arc;

use puzzleforge_core::{PuzzleError, Result};
use puzzleforge_expr::{FamilyDef, Provenance, Scope, SymbolFamily, Value};
use serde_json::{json, Value as Json};

use super::sites::{index_values, PreparedSite};
use super::Run;
use crate::configuration::{decode_rows, encode_rows};
use crate::program::{DeriveRule, FamilyRule, GroupRule};

/// Values and `_ind` entries of one dimension-row.
struct DrawnRow {
    values: Vec<Vec<Value>>,
    indices: Vec<Vec<Value>>,
}

/// Items, descriptions, and raw pool values of a derived symbol.
#[derive(Default)]
struct Built {
    items: Vec<Value>,
    descs: Vec<Value>,
    data: Vec<Value>,
}

impl Run<'_> {
    pub(super) fn family(&mut self, rule: &FamilyRule) -> Result<()> {
        let scope = Scope::new();
        let mut sources = Vec::with_capacity(rule.sources.len());
        for source in &rule.sources {
            let items = self.eval(source, &scope)?.to_vec()?;
            sources.push((source.source().to_string(), items));
        }
        let bounds = match &rule.bounds {
            Some(formula) => Some(self.int_range(formula, &scope, &rule.name)?),
            None => None,
        };
        let def = FamilyDef {
            name: rule.name.clone(),
            sources,
            attrs: rule.attrs.clone(),
            sorts: rule.sorts.clone(),
            descs: rule.descs.clone(),
            bounds,
        };
        let (vars, provenance) = self.ctx.registries_mut();
        let family = SymbolFamily::build(&def, vars, provenance)?;
        self.sym_num += family.len();
        self.ctx.set_global(&rule.name, Value::Family(Arc::new(family)));
        Ok(())
    }

    pub(super) fn derive(&mut self, rule: &DeriveRule) -> Result<()> {
        let count = match &rule.domain {
            Some(formula) => self.count(formula, &Scope::new(), &rule.name)?,
            None => 1,
        };
        let prepared = self.prepare(&rule.site, &rule.name)?;
        let recorded = if self.generating() {
            None
        } else {
            let entry = self.config.require(&rule.name)?;
            Some(field(entry, "pool", &rule.name)?.clone())
        };
        let (entries, pool) = self.pool(rule, &prepared, &rule.name, count, recorded.as_ref())?;
        self.config.insert(rule.name.clone(), json!({ "pool": pool }));

        let mut built = Built::default();
        self.build(rule, &prepared, entries, 0, &mut built)?;
        self.bind_symbols(&rule.name, built);
        Ok(())
    }

    pub(super) fn derive_group(&mut self, rule: &GroupRule) -> Result<()> {
        let scope = Scope::new();
        let recorded = if self.generating() {
            None
        } else {
            Some(self.config.require(&rule.name)?.clone())
        };
        let domains: Vec<usize> = match &recorded {
            Some(entry) => field(entry, "pool_domain", &rule.name)?
                .as_array()
                .ok_or_else(|| PuzzleError::replay(format!("'{}.pool_domain' must be a list", rule.name)))?
                .iter()
                .map(|d| {
                    d.as_u64()
                        .and_then(|d| usize::try_from(d).ok())
                        .ok_or_else(|| {
                            PuzzleError::replay(format!("'{}.pool_domain' holds {d}", rule.name))
                        })
                })
                .collect::<Result<_>>()?,
            None => {
                let total = self.count(&rule.total, &scope, &rule.name)?;
                let mut ranges = Vec::with_capacity(rule.templates.len());
                for template in &rule.templates {
                    ranges.push(match &template.domain {
                        Some(formula) => Some(self.int_range(formula, &scope, &rule.name)?),
                        None => None,
                    });
                }
                let total = i64::try_from(total)
                    .map_err(|_| PuzzleError::random(rule.name.as_str(), "total is too large"))?;
                self.partition(rule.templates.len(), total, &ranges)?
                    .into_iter()
                    .map(|d| {
                        usize::try_from(d).map_err(|_| {
                            PuzzleError::random(rule.name.as_str(), format!("negative template share {d}"))
                        })
                    })
                    .collect::<Result<_>>()?
            }
        };

        let mut pools = Vec::with_capacity(rule.templates.len());
        let mut built = Built::default();
        let mut index = 0;
        for (i, template) in rule.templates.iter().enumerate() {
            let context = format!("{}[{i}]", rule.name);
            let prepared = self.prepare(&template.site, &context)?;
            let recorded_pool = match &recorded {
                Some(entry) => Some(
                    field(entry, "pool", &rule.name)?
                        .get(i)
                        .ok_or_else(|| PuzzleError::replay(format!("'{}.pool' has no template #{i}", rule.name)))?,
                ),
                None => None,
            };
            let count = domains.get(i).copied().unwrap_or(0);
            let (entries, pool) = self.pool(template, &prepared, &context, count, recorded_pool)?;
            let drawn = entries.len();
            self.build(template, &prepared, entries, index, &mut built)?;
            index += drawn;
            pools.push(pool);
        }
        self.config.insert(
            rule.name.clone(),
            json!({ "pool_domain": domains, "pool": pools }),
        );
        self.bind_symbols(&rule.name, built);
        Ok(())
    }

    /// Sampled rows in generation, recorded rows in replay.
    fn pool(
        &mut self,
        rule: &DeriveRule,
        prepared: &PreparedSite,
        context: &str,
        count: usize,
        recorded: Option<&Json>,
    ) -> Result<(Vec<Vec<DrawnRow>>, Json)> {
        if let Some(json) = recorded {
            let entries = decode_rows(json, rule.site.dim)?
                .iter()
                .map(|entry| {
                    entry
                        .iter()
                        .map(|row| {
                            let (values, indices) = prepared.recorded_values(row)?;
                            Ok(DrawnRow { values, indices })
                        })
                        .collect::<Result<Vec<_>>>()
                })
                .collect::<Result<Vec<_>>>()?;
            return Ok((entries, json.clone()));
        }
        if count == 0 {
            return Ok((Vec::new(), Json::Array(Vec::new())));
        }
        let request = self.request(&rule.site, prepared, context, count);
        let batch = self.sample(prepared, &request)?;
        let entries = batch
            .rows
            .iter()
            .map(|entry| {
                entry
                    .iter()
                    .map(|row| {
                        Ok(DrawnRow {
                            values: prepared.row_values(row)?,
                            indices: index_values(row),
                        })
                    })
                    .collect::<Result<Vec<_>>>()
            })
            .collect::<Result<Vec<_>>>()?;
        Ok((entries, encode_rows(&batch.rows, rule.site.dim)))
    }

    /// Evaluates the formula and description of every row. `start` is the
    /// `_index` of the first domain entry.
    fn build(
        &mut self,
        rule: &DeriveRule,
        prepared: &PreparedSite,
        entries: Vec<Vec<DrawnRow>>,
        start: usize,
        built: &mut Built,
    ) -> Result<()> {
        for (d, entry) in entries.into_iter().enumerate() {
            let mut items = Vec::with_capacity(entry.len());
            let mut descs = Vec::with_capacity(entry.len());
            let mut data = Vec::with_capacity(entry.len());
            for row in entry {
                let raw = Value::list(row.values.iter().cloned().map(Value::list).collect());
                let sym = prepared.sym(row.values);
                let scope = Scope::new()
                    .bind("_sym", sym.clone())
                    .bind("_ind", prepared.sym(row.indices))
                    .bind("_index", Value::from(start + d));
                let item = match &rule.formula {
                    Some(formula) => self.eval(formula, &scope)?,
                    None => sym.clone(),
                };
                let desc = Value::from(self.ctx.render(&rule.desc, &scope)?);
                let provenance = Provenance::default().with_desc(desc.clone()).with_data(sym);
                items.push(self.ctx.provenance_mut().tag(item, provenance));
                descs.push(desc);
                data.push(raw);
            }
            if rule.site.dim == 1 {
                built.items.extend(items);
                built.descs.extend(descs);
                built.data.extend(data);
            } else {
                built.items.push(Value::list(items));
                built.descs.push(Value::list(descs));
                built.data.push(Value::list(data));
            }
        }
        Ok(())
    }

    fn bind_symbols(&mut self, name: &str, built: Built) {
        let descs = Value::list(built.descs);
        let provenance = Provenance::default()
            .with_desc(descs.clone())
            .with_data(Value::list(built.data));
        let symbols = self.ctx.provenance_mut().tag(Value::list(built.items), provenance);
        self.ctx.set_global(name, symbols);
        self.ctx.set_global("_desc", descs);
    }
}

fn field<'j>(entry: &'j Json, key: &str, name: &str) -> Result<&'j Json> {
    entry
        .get(key)
        .ok_or_else(|| PuzzleError::replay(format!("configuration entry '{name}' has no '{key}'")))
}
