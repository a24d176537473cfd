//! Expression evaluation.

#[cfg(test)]
mod tests;

pub mod compare;
pub mod ops;

use std::sync::Arc;

use indexmap::IndexMap;
use puzzleforge_core::{PuzzleError, Result, Term};

use crate::ast::{Arg, Clause, CompKind, Comprehension, Expr, Index, LogicalOp, Target};
use crate::builtins::{self, Args};
use crate::methods;
use crate::parser::parse_expr;
use crate::scope::{Context, Scope, MAX_CALL_DEPTH};
use crate::template::{format_value, Segment, Template};
use crate::value::{Closure, Function, Value};

use self::ops::bool_term;

impl Context {
    /// Evaluates an expression in the given local scope.
    pub fn eval(&mut self, expr: &Expr, scope: &Scope) -> Result<Value> {
        match expr {
            Expr::Literal(v) => Ok(v.clone()),
            Expr::Name(name) => self.lookup(name, scope),
            Expr::List(items) => Ok(Value::list(self.eval_all(items, scope)?)),
            Expr::Tuple(items) => Ok(Value::tuple(self.eval_all(items, scope)?)),
            Expr::Set(items) => Ok(Value::set(self.eval_all(items, scope)?.into_iter().collect())),
            Expr::Dict(entries) => {
                let mut map = IndexMap::with_capacity(entries.len());
                for (k, v) in entries {
                    let key = self.eval(k, scope)?;
                    let value = self.eval(v, scope)?;
                    map.insert(key, value);
                }
                Ok(Value::map(map))
            }
            Expr::Unary(op, inner) => {
                let value = self.eval(inner, scope)?;
                ops::unary(*op, &value)
            }
            Expr::Binary(op, left, right) => {
                let l = self.eval(left, scope)?;
                let r = self.eval(right, scope)?;
                ops::binary(*op, &l, &r)
            }
            Expr::Logical(op, items) => self.eval_logical(*op, items, scope),
            Expr::Compare(first, rest) => self.eval_compare(first, rest, scope),
            Expr::IfElse {
                cond,
                then,
                otherwise,
            } => {
                let c = self.eval(cond, scope)?;
                if c.is_term() {
                    let t = self.eval(then, scope)?;
                    let o = self.eval(otherwise, scope)?;
                    return Ok(Value::Term(Term::ite(bool_term(&c)?, t.to_term()?, o.to_term()?)));
                }
                if c.is_truthy()? {
                    self.eval(then, scope)
                } else {
                    self.eval(otherwise, scope)
                }
            }
            Expr::Call(callee, args) => self.eval_call(callee, args, scope),
            Expr::Attribute(obj, name) => {
                let value = self.eval(obj, scope)?;
                methods::get_attribute(self, &value, name)
            }
            Expr::Subscript(obj, index) => {
                let value = self.eval(obj, scope)?;
                match index.as_ref() {
                    Index::Item(key) => {
                        let key = self.eval(key, scope)?;
                        ops::subscript(&value, &key)
                    }
                    Index::Slice { lower, upper, step } => {
                        let lower = self.eval_slice_bound(lower.as_ref(), scope)?;
                        let upper = self.eval_slice_bound(upper.as_ref(), scope)?;
                        let step = self.eval_slice_bound(step.as_ref(), scope)?;
                        ops::slice(&value, lower, upper, step)
                    }
                }
            }
            Expr::Lambda(def) => {
                let mut defaults = Vec::with_capacity(def.params.len());
                for param in &def.params {
                    defaults.push(match &param.default {
                        Some(d) => Some(self.eval(d, scope)?),
                        None => None,
                    });
                }
                Ok(Value::Function(Function::Lambda(Arc::new(Closure {
                    def: Arc::clone(def),
                    scope: scope.clone(),
                    defaults,
                }))))
            }
            Expr::Comprehension(comp) => self.eval_comprehension(comp, scope),
            Expr::FString(template) => Ok(Value::from(self.render(template, scope)?)),
        }
    }

    /// Calls a function value.
    pub fn call(
        &mut self,
        function: &Value,
        args: Vec<Value>,
        kwargs: Vec<(Arc<str>, Value)>,
    ) -> Result<Value> {
        match function.untagged() {
            Value::Function(Function::Lambda(closure)) => {
                let closure = Arc::clone(closure);
                self.call_lambda(&closure, args, kwargs)
            }
            Value::Function(Function::Builtin(name)) => {
                let name = Arc::clone(name);
                builtins::call(self, &name, Args::new(args, kwargs))
            }
            Value::Function(Function::Method(method)) => {
                let method = Arc::clone(method);
                methods::call_method(self, &method.receiver, &method.name, args, kwargs)
            }
            other => Err(PuzzleError::eval(format!(
                "'{}' object is not callable",
                other.type_name()
            ))),
        }
    }

    /// Renders a description template.
    pub fn render(&mut self, template: &Template, scope: &Scope) -> Result<String> {
        let mut out = String::new();
        for segment in template.segments() {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Field {
                    expr,
                    conversion,
                    spec,
                } => {
                    let value = self.eval(expr, scope)?;
                    let value = match conversion {
                        Some('r') => Value::from(value.repr()),
                        Some(_) => Value::from(value.to_string()),
                        None => value,
                    };
                    match spec {
                        Some(spec) => out.push_str(&format_value(&value, spec)?),
                        None => out.push_str(&value.to_string()),
                    }
                }
            }
        }
        Ok(out)
    }

    /// Parses and renders template text in one step.
    pub fn render_str(&mut self, source: &str, scope: &Scope) -> Result<String> {
        let template = Template::parse(source)?;
        self.render(&template, scope)
    }

    /// Evaluates lambda source text (or any expression yielding a function).
    pub fn compile_function(&mut self, source: &str) -> Result<Value> {
        let expr = parse_expr(source)?;
        let value = self.eval(&expr, &Scope::new())?;
        match value.untagged() {
            Value::Function(_) => Ok(value),
            other => Err(PuzzleError::eval(format!(
                "expected a function, got {}",
                other.type_name()
            ))),
        }
    }

    fn lookup(&self, name: &str, scope: &Scope) -> Result<Value> {
        if let Some(value) = scope.lookup(name) {
            return Ok(value.clone());
        }
        if let Some(value) = self.global(name) {
            return Ok(value.clone());
        }
        if builtins::is_builtin(name) {
            return Ok(Value::Function(Function::Builtin(Arc::from(name))));
        }
        Err(PuzzleError::eval(format!("name '{name}' is not defined")))
    }

    fn eval_all(&mut self, items: &[Expr], scope: &Scope) -> Result<Vec<Value>> {
        items.iter().map(|e| self.eval(e, scope)).collect()
    }

    fn eval_slice_bound(&mut self, bound: Option<&Expr>, scope: &Scope) -> Result<Option<i64>> {
        let Some(expr) = bound else {
            return Ok(None);
        };
        match self.eval(expr, scope)? {
            Value::None => Ok(None),
            v => v
                .as_int()
                .map(Some)
                .ok_or_else(|| PuzzleError::eval("slice indices must be integers or None")),
        }
    }

    /// `and`/`or` chains short-circuit on concrete operands and fold
    /// symbolic ones into a single term.
    fn eval_logical(&mut self, op: LogicalOp, items: &[Expr], scope: &Scope) -> Result<Value> {
        let mut terms = Vec::new();
        let mut last = Value::None;
        for item in items {
            let value = self.eval(item, scope)?;
            if value.is_term() || !terms.is_empty() {
                terms.push(bool_term(&value)?);
                continue;
            }
            let truthy = value.is_truthy()?;
            match op {
                LogicalOp::And if !truthy => return Ok(value),
                LogicalOp::Or if truthy => return Ok(value),
                _ => last = value,
            }
        }
        if terms.is_empty() {
            return Ok(last);
        }
        Ok(Value::Term(match op {
            LogicalOp::And => Term::and(terms),
            LogicalOp::Or => Term::or(terms),
        }))
    }

    fn eval_compare(
        &mut self,
        first: &Expr,
        rest: &[(crate::ast::CmpKind, Expr)],
        scope: &Scope,
    ) -> Result<Value> {
        let mut left = self.eval(first, scope)?;
        let mut terms = Vec::new();
        for (kind, expr) in rest {
            let right = self.eval(expr, scope)?;
            let result = ops::compare(*kind, &left, &right)?;
            match result.as_term() {
                Some(t) => terms.push(Arc::clone(t)),
                None => {
                    if !result.is_truthy()? {
                        return Ok(Value::Bool(false));
                    }
                }
            }
            left = right;
        }
        Ok(match terms.len() {
            0 => Value::Bool(true),
            1 => Value::Term(terms.remove(0)),
            _ => Value::Term(Term::and(terms)),
        })
    }

    fn eval_call(&mut self, callee: &Expr, args: &[Arg], scope: &Scope) -> Result<Value> {
        if let Expr::Attribute(obj, name) = callee {
            let receiver = self.eval(obj, scope)?;
            let (positional, keywords) = self.eval_args(args, scope)?;
            return methods::call_method(self, &receiver, name, positional, keywords);
        }
        let function = self.eval(callee, scope)?;
        let (positional, keywords) = self.eval_args(args, scope)?;
        self.call(&function, positional, keywords)
    }

    fn eval_args(
        &mut self,
        args: &[Arg],
        scope: &Scope,
    ) -> Result<(Vec<Value>, Vec<(Arc<str>, Value)>)> {
        let mut positional = Vec::with_capacity(args.len());
        let mut keywords = Vec::new();
        for arg in args {
            match arg {
                Arg::Positional(e) => positional.push(self.eval(e, scope)?),
                Arg::Keyword(name, e) => keywords.push((Arc::clone(name), self.eval(e, scope)?)),
                Arg::Star(e) => positional.extend(self.eval(e, scope)?.to_vec()?),
            }
        }
        Ok((positional, keywords))
    }

    fn call_lambda(
        &mut self,
        closure: &Closure,
        args: Vec<Value>,
        kwargs: Vec<(Arc<str>, Value)>,
    ) -> Result<Value> {
        let params = &closure.def.params;
        if args.len() > params.len() {
            return Err(PuzzleError::eval(format!(
                "<lambda>() takes {} positional arguments but {} were given",
                params.len(),
                args.len()
            )));
        }
        let mut slots: Vec<Option<Value>> = vec![None; params.len()];
        for (slot, value) in slots.iter_mut().zip(args) {
            *slot = Some(value);
        }
        for (name, value) in kwargs {
            let pos = params
                .iter()
                .position(|p| p.name == name)
                .ok_or_else(|| {
                    PuzzleError::eval(format!("<lambda>() got an unexpected keyword argument '{name}'"))
                })?;
            if slots[pos].is_some() {
                return Err(PuzzleError::eval(format!(
                    "<lambda>() got multiple values for argument '{name}'"
                )));
            }
            slots[pos] = Some(value);
        }
        let mut bindings = Vec::with_capacity(params.len());
        for (i, (param, slot)) in params.iter().zip(slots).enumerate() {
            let value = match slot.or_else(|| closure.defaults.get(i).cloned().flatten()) {
                Some(v) => v,
                None => {
                    return Err(PuzzleError::eval(format!(
                        "<lambda>() missing required argument '{}'",
                        param.name
                    )))
                }
            };
            bindings.push((Arc::clone(&param.name), value));
        }
        if self.depth >= MAX_CALL_DEPTH {
            return Err(PuzzleError::eval("maximum call depth exceeded"));
        }
        let scope = closure.scope.with(bindings);
        self.depth += 1;
        let result = self.eval(&closure.def.body, &scope);
        self.depth -= 1;
        result
    }

    fn eval_comprehension(&mut self, comp: &Comprehension, scope: &Scope) -> Result<Value> {
        let mut out = Vec::new();
        self.run_clauses(comp, &comp.clauses, scope, &mut out)?;
        Ok(match comp.kind {
            CompKind::List | CompKind::Generator => {
                Value::list(out.into_iter().map(|(k, _)| k).collect())
            }
            CompKind::Set => Value::set(out.into_iter().map(|(k, _)| k).collect()),
            CompKind::Dict => Value::map(
                out.into_iter()
                    .map(|(k, v)| (k, v.unwrap_or(Value::None)))
                    .collect(),
            ),
        })
    }

    fn run_clauses(
        &mut self,
        comp: &Comprehension,
        clauses: &[Clause],
        scope: &Scope,
        out: &mut Vec<(Value, Option<Value>)>,
    ) -> Result<()> {
        match clauses.split_first() {
            None => {
                let key = self.eval(&comp.element, scope)?;
                let value = match &comp.value {
                    Some(e) => Some(self.eval(e, scope)?),
                    None => None,
                };
                out.push((key, value));
                Ok(())
            }
            Some((Clause::For(target, iterable), rest)) => {
                let items = self.eval(iterable, scope)?.to_vec()?;
                for item in items {
                    let mut bindings = Vec::new();
                    bind_target(target, item, &mut bindings)?;
                    let inner = scope.with(bindings);
                    self.run_clauses(comp, rest, &inner, out)?;
                }
                Ok(())
            }
            Some((Clause::If(cond), rest)) => {
                if self.eval(cond, scope)?.is_truthy()? {
                    self.run_clauses(comp, rest, scope, out)
                } else {
                    Ok(())
                }
            }
        }
    }
}

/// Destructures `value` onto a `for` target.
pub(crate) fn bind_target(
    target: &Target,
    value: Value,
    bindings: &mut Vec<(Arc<str>, Value)>,
) -> Result<()> {
    match target {
        Target::Name(name) => {
            bindings.push((Arc::clone(name), value));
            Ok(())
        }
        Target::Tuple(targets) => {
            let items = value.to_vec()?;
            if items.len() != targets.len() {
                return Err(PuzzleError::eval(format!(
                    "cannot unpack {} values into {} targets",
                    items.len(),
                    targets.len()
                )));
            }
            for (t, item) in targets.iter().zip(items) {
                bind_target(t, item, bindings)?;
            }
            Ok(())
        }
    }
}
