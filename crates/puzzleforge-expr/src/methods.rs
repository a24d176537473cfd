//! Attribute access and method calls.

use std::sync::Arc;

use puzzleforge_core::{PuzzleError, Result};

use crate::eval::compare::values_equal;
use crate::provenance::Field;
use crate::scope::Context;
use crate::template::format_value;
use crate::value::{BoundMethod, Function, Value};

const STR_METHODS: &[&str] = &[
    "join", "upper", "lower", "split", "strip", "lstrip", "rstrip", "replace", "startswith",
    "endswith", "format", "count", "find", "capitalize", "title",
];
const SEQ_METHODS: &[&str] = &["index", "count"];
const MAP_METHODS: &[&str] = &["get", "keys", "values", "items"];
const FAMILY_METHODS: &[&str] = &["get", "keys", "values", "items", "to_list"];
const MODEL_METHODS: &[&str] = &["eval", "evaluate"];

fn methods_of(value: &Value) -> &'static [&'static str] {
    match value.untagged() {
        Value::Str(_) => STR_METHODS,
        Value::List(_) | Value::Tuple(_) => SEQ_METHODS,
        Value::Map(_) => MAP_METHODS,
        Value::Family(_) => FAMILY_METHODS,
        Value::Model(_) => MODEL_METHODS,
        _ => &[],
    }
}

fn no_attribute(value: &Value, name: &str) -> PuzzleError {
    PuzzleError::eval(format!(
        "'{}' object has no attribute '{name}'",
        value.type_name()
    ))
}

/// `obj.name` outside a call: provenance fields or a bound method.
pub(crate) fn get_attribute(ctx: &Context, obj: &Value, name: &str) -> Result<Value> {
    let field = match name {
        "desc" => Some(Field::Desc),
        "data" => Some(Field::Data),
        "domain" => Some(Field::Domain),
        _ => None,
    };
    if let Some(field) = field {
        if ctx.provenance().lookup(obj).is_some() {
            return ctx.provenance().field(obj, field);
        }
    }
    if let Value::Family(family) = obj.untagged() {
        if name == "name" {
            return Ok(Value::str(family.name()));
        }
    }
    if methods_of(obj).contains(&name) {
        return Ok(Value::Function(Function::Method(Arc::new(BoundMethod {
            receiver: obj.clone(),
            name: Arc::from(name),
        }))));
    }
    Err(no_attribute(obj, name))
}

fn arg<'a>(args: &'a [Value], i: usize, method: &str) -> Result<&'a Value> {
    args.get(i)
        .ok_or_else(|| PuzzleError::eval(format!("{method}() missing argument {}", i + 1)))
}

fn str_arg<'a>(args: &'a [Value], i: usize, method: &str) -> Result<&'a str> {
    arg(args, i, method)?.as_str().ok_or_else(|| {
        PuzzleError::eval(format!("{method}() argument {} must be str", i + 1))
    })
}

/// `obj.name(args...)`.
pub(crate) fn call_method(
    ctx: &mut Context,
    obj: &Value,
    name: &str,
    args: Vec<Value>,
    kwargs: Vec<(Arc<str>, Value)>,
) -> Result<Value> {
    match obj.untagged() {
        Value::Str(s) => string_method(s, name, &args, &kwargs),
        Value::List(items) | Value::Tuple(items) => match name {
            "index" => {
                let needle = arg(&args, 0, name)?;
                items
                    .iter()
                    .position(|item| values_equal(item, needle))
                    .map(Value::from)
                    .ok_or_else(|| PuzzleError::eval(format!("{} is not in list", needle.repr())))
            }
            "count" => {
                let needle = arg(&args, 0, name)?;
                Ok(Value::from(items.iter().filter(|item| values_equal(item, needle)).count()))
            }
            _ => Err(no_attribute(obj, name)),
        },
        Value::Map(map) => match name {
            "get" => {
                let key = arg(&args, 0, name)?;
                Ok(map
                    .get(key)
                    .cloned()
                    .unwrap_or_else(|| args.get(1).cloned().unwrap_or(Value::None)))
            }
            "keys" => Ok(Value::list(map.keys().cloned().collect())),
            "values" => Ok(Value::list(map.values().cloned().collect())),
            "items" => Ok(Value::list(
                map.iter()
                    .map(|(k, v)| Value::tuple(vec![k.clone(), v.clone()]))
                    .collect(),
            )),
            _ => Err(no_attribute(obj, name)),
        },
        Value::Family(family) => match name {
            "get" => Ok(Value::list(family.by_attribute(str_arg(&args, 0, name)?)?)),
            "keys" => Ok(Value::list(family.keys())),
            "values" => Ok(Value::list(family.values())),
            "items" => Ok(Value::list(family.items())),
            "to_list" => Ok(Value::list(family.to_list())),
            _ => Err(no_attribute(obj, name)),
        },
        Value::Model(model) => match name {
            "eval" | "evaluate" => {
                let target = arg(&args, 0, name)?;
                match target.as_term() {
                    Some(term) => model.eval(term).map(Value::from_const),
                    None => Ok(target.clone()),
                }
            }
            _ => Err(no_attribute(obj, name)),
        },
        _ => {
            let attribute = get_attribute(ctx, obj, name)?;
            ctx.call(&attribute, args, kwargs)
        }
    }
}

fn string_method(
    s: &str,
    name: &str,
    args: &[Value],
    kwargs: &[(Arc<str>, Value)],
) -> Result<Value> {
    match name {
        "join" => {
            let items = arg(args, 0, name)?.to_vec()?;
            let parts: Vec<String> = items.iter().map(|v| v.to_string()).collect();
            Ok(Value::from(parts.join(s)))
        }
        "upper" => Ok(Value::from(s.to_uppercase())),
        "lower" => Ok(Value::from(s.to_lowercase())),
        "capitalize" => {
            let mut chars = s.chars();
            Ok(Value::from(match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }))
        }
        "title" => {
            let mut out = String::with_capacity(s.len());
            let mut start = true;
            for c in s.chars() {
                if start {
                    out.extend(c.to_uppercase());
                } else {
                    out.extend(c.to_lowercase());
                }
                start = !c.is_alphanumeric();
            }
            Ok(Value::from(out))
        }
        "split" => {
            let parts: Vec<Value> = match args.first().filter(|v| !matches!(v, Value::None)) {
                Some(sep) => {
                    let sep = sep
                        .as_str()
                        .ok_or_else(|| PuzzleError::eval("split() separator must be str"))?;
                    if sep.is_empty() {
                        return Err(PuzzleError::eval("empty separator"));
                    }
                    s.split(sep).map(Value::from).collect()
                }
                None => s.split_whitespace().map(Value::from).collect(),
            };
            Ok(Value::list(parts))
        }
        "strip" | "lstrip" | "rstrip" => {
            let chars: Option<Vec<char>> = args
                .first()
                .and_then(Value::as_str)
                .map(|c| c.chars().collect());
            let pred = |c: char| match &chars {
                Some(set) => set.contains(&c),
                None => c.is_whitespace(),
            };
            Ok(Value::from(match name {
                "strip" => s.trim_matches(pred),
                "lstrip" => s.trim_start_matches(pred),
                _ => s.trim_end_matches(pred),
            }))
        }
        "replace" => Ok(Value::from(
            s.replace(str_arg(args, 0, name)?, str_arg(args, 1, name)?),
        )),
        "startswith" => Ok(Value::Bool(s.starts_with(str_arg(args, 0, name)?))),
        "endswith" => Ok(Value::Bool(s.ends_with(str_arg(args, 0, name)?))),
        "count" => Ok(Value::from(s.matches(str_arg(args, 0, name)?).count())),
        "find" => {
            let needle = str_arg(args, 0, name)?;
            Ok(Value::Int(match s.find(needle) {
                Some(byte) => s[..byte].chars().count() as i64,
                None => -1,
            }))
        }
        "format" => str_format(s, args, kwargs).map(Value::from),
        _ => Err(PuzzleError::eval(format!("'str' object has no attribute '{name}'"))),
    }
}

/// `str.format` with positional, numbered, and keyword fields.
pub(crate) fn str_format(
    fmt: &str,
    args: &[Value],
    kwargs: &[(Arc<str>, Value)],
) -> Result<String> {
    let mut out = String::with_capacity(fmt.len());
    let mut chars = fmt.chars().peekable();
    let mut auto = 0usize;
    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '{' => {
                let mut field = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(ch) => field.push(ch),
                        None => return Err(PuzzleError::eval("single '{' encountered in format string")),
                    }
                }
                let (head, spec) = match field.split_once(':') {
                    Some((h, s)) => (h, s),
                    None => (field.as_str(), ""),
                };
                let (key, conversion) = match head.split_once('!') {
                    Some((k, c)) => (k, Some(c)),
                    None => (head, None),
                };
                let found = if key.is_empty() {
                    auto += 1;
                    args.get(auto - 1)
                } else if let Ok(index) = key.parse::<usize>() {
                    args.get(index)
                } else {
                    kwargs.iter().find(|(k, _)| &**k == key).map(|(_, v)| v)
                };
                let value = found.ok_or_else(|| {
                    PuzzleError::eval(format!("format field '{{{key}}}' has no argument"))
                })?;
                let value = match conversion {
                    Some("r") => Value::from(value.repr()),
                    Some(_) => Value::from(value.to_string()),
                    None => value.clone(),
                };
                out.push_str(&format_value(&value, spec)?);
            }
            '}' => return Err(PuzzleError::eval("single '}' encountered in format string")),
            other => out.push(other),
        }
    }
    Ok(out)
}
