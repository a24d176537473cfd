//! Runtime values of the expression language.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use puzzleforge_core::{format_float, Const, Model, PuzzleError, Result, Term, TermRef};

use crate::ast::LambdaDef;
use crate::family::SymbolFamily;
use crate::provenance::SymbolId;
use crate::scope::Scope;

/// A value produced by evaluating an expression.
///
/// Containers are shared behind `Arc`, so cloning is cheap. Equality follows
/// Python: `1 == 1.0 == True`, lists never equal tuples.
#[derive(Clone)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Arc<str>),
    List(Arc<Vec<Value>>),
    Tuple(Arc<Vec<Value>>),
    Map(Arc<IndexMap<Value, Value>>),
    Set(Arc<IndexSet<Value>>),
    Term(TermRef),
    Family(Arc<SymbolFamily>),
    Model(Model),
    Function(Function),
    /// A value carrying a provenance id. Transparent to every operator.
    Tagged(Arc<Tagged>),
}

#[derive(Debug)]
pub struct Tagged {
    pub id: SymbolId,
    pub value: Value,
}

#[derive(Clone)]
pub enum Function {
    Lambda(Arc<Closure>),
    Builtin(Arc<str>),
    Method(Arc<BoundMethod>),
}

/// A lambda together with the scope it was defined in.
pub struct Closure {
    pub def: Arc<LambdaDef>,
    pub scope: Scope,
    pub defaults: Vec<Option<Value>>,
}

pub struct BoundMethod {
    pub receiver: Value,
    pub name: Arc<str>,
}

impl Value {
    pub fn list(items: Vec<Value>) -> Self {
        Value::List(Arc::new(items))
    }

    pub fn tuple(items: Vec<Value>) -> Self {
        Value::Tuple(Arc::new(items))
    }

    pub fn map(entries: IndexMap<Value, Value>) -> Self {
        Value::Map(Arc::new(entries))
    }

    pub fn set(items: IndexSet<Value>) -> Self {
        Value::Set(Arc::new(items))
    }

    pub fn str(text: &str) -> Self {
        Value::Str(Arc::from(text))
    }

    pub fn from_const(c: Const) -> Self {
        match c {
            Const::Bool(b) => Value::Bool(b),
            Const::Int(i) => Value::Int(i),
            Const::Real(r) => Value::Float(r),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "NoneType",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::List(_) => "list",
            Value::Tuple(_) => "tuple",
            Value::Map(_) => "dict",
            Value::Set(_) => "set",
            Value::Term(_) => "term",
            Value::Family(_) => "family",
            Value::Model(_) => "model",
            Value::Function(_) => "function",
            Value::Tagged(t) => t.value.type_name(),
        }
    }

    /// The value behind any provenance tags.
    pub fn untagged(&self) -> &Value {
        let mut current = self;
        while let Value::Tagged(t) = current {
            current = &t.value;
        }
        current
    }

    pub fn into_untagged(self) -> Value {
        match self {
            Value::Tagged(t) => t.value.clone().into_untagged(),
            other => other,
        }
    }

    pub fn as_term(&self) -> Option<&TermRef> {
        match self.untagged() {
            Value::Term(t) => Some(t),
            _ => None,
        }
    }

    pub fn is_term(&self) -> bool {
        self.as_term().is_some()
    }

    /// Integer view; booleans count as 0 and 1.
    pub fn as_int(&self) -> Option<i64> {
        match self.untagged() {
            Value::Bool(b) => Some(i64::from(*b)),
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self.untagged() {
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self.untagged() {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self.untagged(),
            Value::Bool(_) | Value::Int(_) | Value::Float(_)
        )
    }

    /// Python truthiness. Symbolic terms have none unless constant.
    pub fn is_truthy(&self) -> Result<bool> {
        Ok(match self.untagged() {
            Value::None => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(items) | Value::Tuple(items) => !items.is_empty(),
            Value::Map(m) => !m.is_empty(),
            Value::Set(s) => !s.is_empty(),
            Value::Term(t) => match t.as_const() {
                Some(c) => c.as_f64() != 0.0,
                None => {
                    return Err(PuzzleError::eval(format!(
                        "symbolic expression `{t}` has no concrete truth value"
                    )))
                }
            },
            Value::Family(f) => !f.is_empty(),
            Value::Model(_) | Value::Function(_) => true,
            Value::Tagged(t) => t.value.is_truthy()?,
        })
    }

    /// Solver term for a boolean or numeric value.
    pub fn to_term(&self) -> Result<TermRef> {
        match self.untagged() {
            Value::Term(t) => Ok(Arc::clone(t)),
            Value::Bool(b) => Ok(Term::bool(*b)),
            Value::Int(i) => Ok(Term::int(*i)),
            Value::Float(f) => Ok(Term::constant(Const::Real(*f))),
            other => Err(PuzzleError::eval(format!(
                "cannot use {} value {} in a solver expression",
                other.type_name(),
                other.repr()
            ))),
        }
    }

    /// Items of an iterable value.
    pub fn to_vec(&self) -> Result<Vec<Value>> {
        match self.untagged() {
            Value::List(items) | Value::Tuple(items) => Ok(items.as_ref().clone()),
            Value::Str(s) => Ok(s.chars().map(|c| Value::Str(Arc::from(c.to_string()))).collect()),
            Value::Map(m) => Ok(m.keys().cloned().collect()),
            Value::Set(s) => Ok(s.iter().cloned().collect()),
            Value::Family(f) => Ok(f.to_list()),
            Value::Model(m) => Ok(m
                .bindings()
                .iter()
                .map(|(v, _)| Value::Term(Term::var(v.clone())))
                .collect()),
            other => Err(PuzzleError::eval(format!(
                "'{}' object is not iterable",
                other.type_name()
            ))),
        }
    }

    /// Python `repr`.
    pub fn repr(&self) -> String {
        match self.untagged() {
            Value::Str(s) => quote(s),
            other => other.to_string(),
        }
    }

    /// JSON form used in configuration records.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as Json;
        match self.untagged() {
            Value::None => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Int(i) => Json::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(Json::Number)
                .unwrap_or(Json::Null),
            Value::Str(s) => Json::String(s.to_string()),
            Value::List(items) | Value::Tuple(items) => {
                Json::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Set(items) => Json::Array(items.iter().map(Value::to_json).collect()),
            Value::Map(m) => Json::Object(
                m.iter()
                    .map(|(k, v)| (k.to_string(), v.to_json()))
                    .collect(),
            ),
            Value::Family(f) => Json::Array(f.to_list().iter().map(Value::to_json).collect()),
            other => Json::String(other.to_string()),
        }
    }

    pub fn from_json(json: &serde_json::Value) -> Value {
        use serde_json::Value as Json;
        match json {
            Json::Null => Value::None,
            Json::Bool(b) => Value::Bool(*b),
            Json::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Json::String(s) => Value::str(s),
            Json::Array(items) => Value::list(items.iter().map(Value::from_json).collect()),
            Json::Object(entries) => Value::map(
                entries
                    .iter()
                    .map(|(k, v)| (Value::str(k), Value::from_json(v)))
                    .collect(),
            ),
        }
    }
}

/// Python-style quoting of a string.
pub fn quote(s: &str) -> String {
    let delimiter = if s.contains('\'') && !s.contains('"') {
        '"'
    } else {
        '\''
    };
    let mut out = String::with_capacity(s.len() + 2);
    out.push(delimiter);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c if c == delimiter => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out.push(delimiter);
    out
}

fn write_items<'a>(
    f: &mut fmt::Formatter<'_>,
    items: impl Iterator<Item = &'a Value>,
) -> fmt::Result {
    for (i, item) in items.enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", item.repr())?;
    }
    Ok(())
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => write!(f, "None"),
            Value::Bool(true) => write!(f, "True"),
            Value::Bool(false) => write!(f, "False"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{}", format_float(*x)),
            Value::Str(s) => write!(f, "{s}"),
            Value::List(items) => {
                write!(f, "[")?;
                write_items(f, items.iter())?;
                write!(f, "]")
            }
            Value::Tuple(items) => {
                write!(f, "(")?;
                write_items(f, items.iter())?;
                if items.len() == 1 {
                    write!(f, ",")?;
                }
                write!(f, ")")
            }
            Value::Set(items) if items.is_empty() => write!(f, "set()"),
            Value::Set(items) => {
                write!(f, "{{")?;
                write_items(f, items.iter())?;
                write!(f, "}}")
            }
            Value::Map(m) => {
                write!(f, "{{")?;
                for (i, (k, v)) in m.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", k.repr(), v.repr())?;
                }
                write!(f, "}}")
            }
            Value::Term(t) => write!(f, "{t}"),
            Value::Family(fam) => write!(f, "{fam}"),
            Value::Model(m) => write!(f, "{m}"),
            Value::Function(Function::Lambda(_)) => write!(f, "<function <lambda>>"),
            Value::Function(Function::Builtin(name)) => write!(f, "<built-in function {name}>"),
            Value::Function(Function::Method(m)) => write!(
                f,
                "<bound method {}.{}>",
                m.receiver.type_name(),
                m.name
            ),
            Value::Tagged(t) => write!(f, "{}", t.value),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.repr())
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self.untagged(), other.untagged()) {
            (Value::None, Value::None) => true,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) | (Value::Tuple(a), Value::Tuple(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => {
                a.len() == b.len() && a.iter().all(|(k, v)| b.get(k) == Some(v))
            }
            (Value::Set(a), Value::Set(b)) => a.len() == b.len() && a.iter().all(|x| b.contains(x)),
            (Value::Term(a), Value::Term(b)) => {
                Arc::ptr_eq(a, b) || a.to_string() == b.to_string()
            }
            (Value::Family(a), Value::Family(b)) => Arc::ptr_eq(a, b),
            (Value::Model(a), Value::Model(b)) => a.same_assignment(b),
            (Value::Function(a), Value::Function(b)) => match (a, b) {
                (Function::Builtin(x), Function::Builtin(y)) => x == y,
                (Function::Lambda(x), Function::Lambda(y)) => Arc::ptr_eq(x, y),
                (Function::Method(x), Function::Method(y)) => Arc::ptr_eq(x, y),
                _ => false,
            },
            (a, b) if a.is_numeric() && b.is_numeric() => match (a.as_int(), b.as_int()) {
                (Some(x), Some(y)) => x == y,
                _ => a.as_f64() == b.as_f64(),
            },
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self.untagged() {
            Value::None => 0u8.hash(state),
            Value::Bool(b) => i64::from(*b).hash(state),
            Value::Int(i) => i.hash(state),
            Value::Float(x) => {
                if x.fract() == 0.0 && x.abs() < 9.0e18 {
                    (*x as i64).hash(state)
                } else {
                    x.to_bits().hash(state)
                }
            }
            Value::Str(s) => s.hash(state),
            Value::List(items) | Value::Tuple(items) => {
                items.len().hash(state);
                for item in items.iter() {
                    item.hash(state);
                }
            }
            Value::Map(m) => m.len().hash(state),
            Value::Set(s) => s.len().hash(state),
            Value::Term(t) => t.to_string().hash(state),
            Value::Family(f) => (Arc::as_ptr(f) as usize).hash(state),
            Value::Model(m) => m.canonical_key().hash(state),
            Value::Function(Function::Builtin(name)) => name.hash(state),
            Value::Function(_) => 1u8.hash(state),
            Value::Tagged(t) => t.value.hash(state),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<usize> for Value {
    fn from(i: usize) -> Self {
        Value::Int(i as i64)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::str(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(Arc::from(s))
    }
}

impl From<TermRef> for Value {
    fn from(t: TermRef) -> Self {
        Value::Term(t)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::list(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_python_display() {
        let v = Value::list(vec![Value::Int(1), Value::str("a"), Value::Bool(true)]);
        assert_eq!(v.to_string(), "[1, 'a', True]");
        assert_eq!(Value::tuple(vec![Value::Int(1)]).to_string(), "(1,)");
        assert_eq!(Value::Float(2.0).to_string(), "2.0");
        assert_eq!(Value::str("it's").repr(), "\"it's\"");
        assert_eq!(Value::set(IndexSet::new()).to_string(), "set()");
    }

    #[test]
    fn test_numeric_cross_equality_and_hash() {
        let mut set = IndexSet::new();
        set.insert(Value::Int(1));
        assert!(set.contains(&Value::Float(1.0)));
        assert!(set.contains(&Value::Bool(true)));
        assert_ne!(Value::list(vec![]), Value::tuple(vec![]));
    }

    #[test]
    fn test_json_round_trip() {
        let json = serde_json::json!({"pool": [["__0__", "__3__"]], "n": 4, "x": 0.5});
        let value = Value::from_json(&json);
        assert_eq!(value.to_json(), json);
    }

    #[test]
    fn test_symbolic_truthiness() {
        use puzzleforge_core::{Sort, VarId, Variable};
        let x = Value::Term(Term::var(Variable::new(VarId(0), "x", Sort::Bool)));
        assert!(x.is_truthy().is_err());
        assert!(Value::Term(Term::bool(true)).is_truthy().unwrap());
    }
}
