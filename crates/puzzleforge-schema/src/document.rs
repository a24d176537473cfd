//! Typed specification document.
//!
//! Every construct keeps its expression and template fields as source text;
//! parsing happens once in validation and again in the emitter, which owns
//! the parsed forms.

use indexmap::IndexMap;
use puzzleforge_core::Sort;
use puzzleforge_sampler::CondScope;
use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer, Serialize};

fn default_true() -> bool {
    true
}

fn default_max_solution() -> usize {
    6000
}

fn default_dim() -> usize {
    1
}

fn default_assertion() -> String {
    "len(_solutions) == 1".to_string()
}

fn default_query_type() -> String {
    "single_choice".to_string()
}

fn default_opt_num() -> usize {
    4
}

/// Treats an explicit `null` the same as a missing field.
fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Expression fields accept bare numbers and booleans as well as strings,
/// so `domain: 5` and `domain: "5"` mean the same thing.
mod text {
    use indexmap::IndexMap;
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer};

    fn scalar<E: serde::de::Error>(value: serde_json::Value) -> Result<String, E> {
        match value {
            serde_json::Value::String(s) => Ok(s),
            serde_json::Value::Number(n) => Ok(n.to_string()),
            serde_json::Value::Bool(true) => Ok("True".to_string()),
            serde_json::Value::Bool(false) => Ok("False".to_string()),
            other => Err(E::custom(format!(
                "expected expression text, found {other}"
            ))),
        }
    }

    pub fn required<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
        scalar(serde_json::Value::deserialize(deserializer)?)
    }

    pub fn optional<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<String>, D::Error> {
        match serde_json::Value::deserialize(deserializer)? {
            serde_json::Value::Null => Ok(None),
            value => scalar(value).map(Some),
        }
    }

    pub fn optional_list<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Vec<String>>, D::Error> {
        match serde_json::Value::deserialize(deserializer)? {
            serde_json::Value::Null => Ok(None),
            serde_json::Value::Array(items) => items
                .into_iter()
                .map(scalar)
                .collect::<Result<_, _>>()
                .map(Some),
            other => Err(D::Error::custom(format!("expected a list, found {other}"))),
        }
    }

    pub fn map<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<IndexMap<String, String>, D::Error> {
        let raw: Option<IndexMap<String, serde_json::Value>> = Option::deserialize(deserializer)?;
        raw.unwrap_or_default()
            .into_iter()
            .map(|(k, v)| scalar(v).map(|v| (k, v)))
            .collect()
    }
}

/// Root of a puzzle specification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Specification {
    /// Lambda sources bound into the global scope before variables.
    #[serde(default, deserialize_with = "text::map", skip_serializing_if = "IndexMap::is_empty")]
    pub custom_operator: IndexMap<String, String>,

    #[serde(deserialize_with = "nullable")]
    pub variables: IndexMap<String, Variable>,

    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "IndexMap::is_empty")]
    pub symbols: IndexMap<String, Symbol>,

    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "IndexMap::is_empty")]
    pub conditions: IndexMap<String, Condition>,

    /// When false the solver is never invoked and `_solutions` stays empty.
    #[serde(default = "default_true")]
    pub calc_solution: bool,

    /// Enumeration stops with an error once more solutions than this exist.
    #[serde(default = "default_max_solution")]
    pub max_solution: usize,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_generation: Option<PostGeneration>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optimize: Option<Optimization>,

    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "IndexMap::is_empty")]
    pub queries: IndexMap<String, Query>,

    /// Problem statement template.
    pub desc: String,
}

impl Specification {
    pub fn defined_symbols(&self) -> impl Iterator<Item = (&str, &DefinedSymbol)> {
        self.symbols.iter().filter_map(|(name, sym)| match sym {
            Symbol::Defined(def) => Some((name.as_str(), def)),
            _ => None,
        })
    }
}

/// Value type of a sampled variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarType {
    Int,
    Float,
    Bool,
    Enum,
}

impl VarType {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "int" => Some(VarType::Int),
            "float" | "real" => Some(VarType::Float),
            "bool" => Some(VarType::Bool),
            "enum" => Some(VarType::Enum),
            _ => None,
        }
    }
}

/// A sampled or computed input value.
///
/// Exactly one of `formula` or the pair (`type`, `domain`) is set; see
/// [`Specification::validate`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    #[serde(default, deserialize_with = "text::optional", skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,

    #[serde(default, deserialize_with = "text::optional", skip_serializing_if = "Option::is_none")]
    pub formula: Option<String>,
}

impl Variable {
    pub fn var_type(&self) -> Option<VarType> {
        self.kind.as_deref().and_then(VarType::parse)
    }
}

/// A single item or a list of items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    pub fn is_many(&self) -> bool {
        matches!(self, OneOrMany::Many(_))
    }

    pub fn len(&self) -> usize {
        match self {
            OneOrMany::One(_) => 1,
            OneOrMany::Many(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_slice(&self) -> &[T] {
        match self {
            OneOrMany::One(item) => std::slice::from_ref(item),
            OneOrMany::Many(items) => items,
        }
    }
}

/// Sort names accepted in symbol declarations, including the `float` alias.
pub fn parse_sort(name: &str) -> Option<Sort> {
    if name.trim().eq_ignore_ascii_case("float") {
        return Some(Sort::Real);
    }
    Sort::parse(name)
}

/// A family of solver unknowns indexed by the product of its sources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefinedSymbol {
    pub source: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attr: Option<Vec<String>>,

    #[serde(rename = "type")]
    pub sort: OneOrMany<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desc: Option<OneOrMany<String>>,

    /// Integer bounds for every declared variable, as `[lo, hi]`.
    #[serde(default, deserialize_with = "text::optional", skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
}

impl DefinedSymbol {
    /// Declared sorts in attribute order. Unknown names yield `None`.
    pub fn sorts(&self) -> Option<Vec<Sort>> {
        self.sort.as_slice().iter().map(|s| parse_sort(s)).collect()
    }

    /// One description template per sort, padded with `None`.
    pub fn descs(&self) -> Vec<Option<String>> {
        let n = self.sort.len();
        match &self.desc {
            None => vec![None; n],
            Some(d) => {
                let mut out: Vec<Option<String>> = d.as_slice().iter().cloned().map(Some).collect();
                out.resize(n, None);
                out
            }
        }
    }
}

/// A custom predicate attached to a sampling site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomCond {
    pub scope: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<usize>>,

    /// Lambda source. Absent on a domain-scope condition means "pairwise distinct".
    #[serde(default, deserialize_with = "text::optional", skip_serializing_if = "Option::is_none")]
    pub constraint: Option<String>,
}

impl CustomCond {
    pub fn cond_scope(&self) -> Option<CondScope> {
        CondScope::parse(&self.scope)
    }
}

/// A symbol family built from sampled rows of source data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedSymbol {
    pub source: Vec<String>,

    /// Items per source. `None` picks one item and flattens `_sym`.
    #[serde(default, deserialize_with = "text::optional_list", skip_serializing_if = "Option::is_none")]
    pub amount: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<Vec<bool>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duplicate: Option<Vec<bool>>,

    /// Number of rows. Inside a group this is a `[lo, hi]` range instead.
    #[serde(default, deserialize_with = "text::optional", skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,

    #[serde(default = "default_true")]
    pub domain_cond: bool,

    #[serde(default = "default_dim")]
    pub dim: usize,

    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Vec::is_empty")]
    pub dim_cond: Vec<Vec<usize>>,

    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Vec::is_empty")]
    pub custom_cond: Vec<CustomCond>,

    #[serde(default, deserialize_with = "text::optional", skip_serializing_if = "Option::is_none")]
    pub formula: Option<String>,

    #[serde(default)]
    pub desc: String,
}

impl DerivedSymbol {
    pub fn order_or_default(&self) -> Vec<bool> {
        self.order.clone().unwrap_or_else(|| vec![true; self.source.len()])
    }

    pub fn duplicate_or_default(&self) -> Vec<bool> {
        self.duplicate.clone().unwrap_or_else(|| vec![false; self.source.len()])
    }
}

/// Several derived templates sharing a randomly partitioned `total`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedSymbols {
    #[serde(deserialize_with = "text::required")]
    pub total: String,
    pub templates: Vec<DerivedSymbol>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Symbol {
    Defined(DefinedSymbol),
    Group(DerivedSymbols),
    Derived(DerivedSymbol),
}

fn has_key(raw: &serde_json::Value, key: &str) -> bool {
    raw.get(key).is_some_and(|v| !v.is_null())
}

fn decode<'de, D: Deserializer<'de>, T: DeserializeOwned>(raw: serde_json::Value) -> Result<T, D::Error> {
    serde_json::from_value(raw).map_err(D::Error::custom)
}

impl<'de> Deserialize<'de> for Symbol {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = serde_json::Value::deserialize(deserializer)?;
        if has_key(&raw, "type") {
            decode::<D, _>(raw).map(Symbol::Defined)
        } else if has_key(&raw, "total") && has_key(&raw, "templates") {
            decode::<D, _>(raw).map(Symbol::Group)
        } else {
            decode::<D, _>(raw).map(Symbol::Derived)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaticCondition {
    #[serde(deserialize_with = "text::required")]
    pub formula: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desc: Option<String>,
}

/// A condition instantiated once per sampled row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DynamicCondition {
    #[serde(deserialize_with = "text::required")]
    pub formula: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desc: Option<String>,

    pub source: Vec<String>,

    #[serde(default, deserialize_with = "text::optional_list", skip_serializing_if = "Option::is_none")]
    pub amount: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<Vec<bool>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duplicate: Option<Vec<bool>>,

    /// Row count range `[lo, hi]`; one row when absent.
    #[serde(default, deserialize_with = "text::optional", skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,

    #[serde(default = "default_true")]
    pub domain_cond: bool,

    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Vec::is_empty")]
    pub custom_cond: Vec<CustomCond>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Condition {
    Dynamic(DynamicCondition),
    Static(StaticCondition),
}

impl Condition {
    pub fn formula(&self) -> &str {
        match self {
            Condition::Static(c) => &c.formula,
            Condition::Dynamic(c) => &c.formula,
        }
    }

    pub fn desc(&self) -> Option<&str> {
        match self {
            Condition::Static(c) => c.desc.as_deref(),
            Condition::Dynamic(c) => c.desc.as_deref(),
        }
    }
}

impl<'de> Deserialize<'de> for Condition {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = serde_json::Value::deserialize(deserializer)?;
        if has_key(&raw, "source") {
            decode::<D, _>(raw).map(Condition::Dynamic)
        } else {
            decode::<D, _>(raw).map(Condition::Static)
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PostGeneration {
    /// Values computed from the baseline solution `_sol`.
    #[serde(default, deserialize_with = "text::map", skip_serializing_if = "IndexMap::is_empty")]
    pub post_gen_vars: IndexMap<String, String>,

    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "IndexMap::is_empty")]
    pub post_gen_conditions: IndexMap<String, StaticCondition>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Minimize,
    Maximize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Optimization {
    #[serde(rename = "type")]
    pub direction: Direction,

    #[serde(deserialize_with = "text::required")]
    pub formula: String,
}

/// Whether an option must hold for any or for all solutions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionCond {
    #[default]
    Any,
    All,
}

/// One way of building multiple-choice options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionTemplate {
    pub source: Vec<String>,

    #[serde(default, deserialize_with = "text::optional_list", skip_serializing_if = "Option::is_none")]
    pub amount: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<Vec<bool>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duplicate: Option<Vec<bool>>,

    #[serde(default)]
    pub cond: OptionCond,

    #[serde(deserialize_with = "text::required")]
    pub opt_formula: String,

    /// Option text template; the option letter is prefixed automatically.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opt_text: Option<String>,

    #[serde(default, deserialize_with = "nullable", skip_serializing_if = "Vec::is_empty")]
    pub custom_cond: Vec<CustomCond>,

    /// Share of the options as a `[lo, hi]` range (multi-template queries only).
    #[serde(default, deserialize_with = "text::optional", skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
}

impl OptionTemplate {
    /// The first source is unordered by default, the rest ordered.
    pub fn order_or_default(&self) -> Vec<bool> {
        self.order
            .clone()
            .unwrap_or_else(|| (0..self.source.len()).map(|i| i != 0).collect())
    }

    pub fn duplicate_or_default(&self) -> Vec<bool> {
        self.duplicate.clone().unwrap_or_else(|| vec![false; self.source.len()])
    }

    pub fn opt_text_or_default(&self) -> &str {
        self.opt_text.as_deref().unwrap_or("{_opt}")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum OptionSet {
    Multiple { templates: Vec<OptionTemplate> },
    Single(OptionTemplate),
}

impl OptionSet {
    pub fn templates(&self) -> &[OptionTemplate] {
        match self {
            OptionSet::Multiple { templates } => templates,
            OptionSet::Single(t) => std::slice::from_ref(t),
        }
    }
}

impl<'de> Deserialize<'de> for OptionSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Multiple {
            templates: Vec<OptionTemplate>,
        }

        let raw = serde_json::Value::deserialize(deserializer)?;
        if has_key(&raw, "templates") {
            decode::<D, Multiple>(raw).map(|m| OptionSet::Multiple { templates: m.templates })
        } else {
            decode::<D, _>(raw).map(OptionSet::Single)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenQuery {
    pub desc: String,

    #[serde(deserialize_with = "text::required")]
    pub ans_formula: String,

    /// Expression whose string form becomes the answer.
    #[serde(deserialize_with = "text::required")]
    pub ans_text: String,

    #[serde(default = "default_assertion", deserialize_with = "text::required")]
    pub ans_assertion: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionQuery {
    pub desc: String,

    #[serde(default = "default_query_type")]
    pub query_type: String,

    /// True asks for the satisfying option, false for the odd one out.
    #[serde(default = "default_true")]
    pub select_type: bool,

    #[serde(default = "default_opt_num")]
    pub opt_num: usize,

    #[serde(flatten)]
    pub options: OptionSet,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Query {
    Selection(SelectionQuery),
    Open(OpenQuery),
}

impl Query {
    pub fn desc(&self) -> &str {
        match self {
            Query::Selection(q) => &q.desc,
            Query::Open(q) => &q.desc,
        }
    }
}

impl<'de> Deserialize<'de> for Query {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = serde_json::Value::deserialize(deserializer)?;
        if has_key(&raw, "source") || has_key(&raw, "templates") {
            decode::<D, _>(raw).map(Query::Selection)
        } else {
            decode::<D, _>(raw).map(Query::Open)
        }
    }
}
