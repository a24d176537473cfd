//! Fail-fast structural validation.
//!
//! Checks run in document order and stop at the first violation. Every error
//! names the offending field as a dotted path such as `symbols.pairs.type`.

use puzzleforge_core::{PuzzleError, Result};
use puzzleforge_expr::ast::Expr;
use puzzleforge_expr::{parse_expr, Template};
use puzzleforge_sampler::CondScope;

use crate::document::*;

impl Specification {
    /// Checks every structural invariant and the syntax of every expression
    /// and template.
    pub fn validate(&self) -> Result<()> {
        for (name, source) in &self.custom_operator {
            let path = format!("custom_operator.{name}");
            match parse(&path, source)? {
                Expr::Lambda(_) => {}
                _ => return Err(PuzzleError::schema(path, "custom operators must be lambda expressions")),
            }
        }
        for (name, var) in &self.variables {
            check_variable(&format!("variables.{name}"), var)?;
        }
        for (name, sym) in &self.symbols {
            let path = format!("symbols.{name}");
            match sym {
                Symbol::Defined(def) => check_defined(&path, def)?,
                Symbol::Derived(der) => check_derived(&path, der, false)?,
                Symbol::Group(group) => check_group(&path, group)?,
            }
        }
        for (name, cond) in &self.conditions {
            check_condition(&format!("conditions.{name}"), cond)?;
        }
        if self.max_solution == 0 {
            return Err(PuzzleError::schema("max_solution", "must be at least 1"));
        }
        if self.post_generation.is_some() && self.optimize.is_some() {
            return Err(PuzzleError::schema(
                "optimize",
                "`post_generation` and `optimize` cannot be used together",
            ));
        }
        if let Some(post) = &self.post_generation {
            for (name, source) in &post.post_gen_vars {
                parse(&format!("post_generation.post_gen_vars.{name}"), source)?;
            }
            for (name, cond) in &post.post_gen_conditions {
                let path = format!("post_generation.post_gen_conditions.{name}");
                parse(&format!("{path}.formula"), &cond.formula)?;
                template(&format!("{path}.desc"), cond.desc.as_deref())?;
            }
        }
        if let Some(opt) = &self.optimize {
            parse("optimize.formula", &opt.formula)?;
        }
        for (name, query) in &self.queries {
            check_query(&format!("queries.{name}"), query)?;
        }
        template("desc", Some(&self.desc))
    }
}

fn parse(path: &str, source: &str) -> Result<Expr> {
    parse_expr(source).map_err(|e| PuzzleError::schema(path, e.to_string()))
}

fn template(path: &str, source: Option<&str>) -> Result<()> {
    match source {
        Some(text) => Template::parse(text)
            .map(|_| ())
            .map_err(|e| PuzzleError::schema(path, e.to_string())),
        None => Ok(()),
    }
}

/// A `[lo, hi]` range. Non-literal expressions are accepted and checked at run time.
fn range(path: &str, source: &str) -> Result<()> {
    match parse(path, source)? {
        Expr::List(items) | Expr::Tuple(items) if items.len() != 2 => Err(PuzzleError::schema(
            path,
            format!("expected a `[lo, hi]` range, found {} items", items.len()),
        )),
        _ => Ok(()),
    }
}

fn check_variable(path: &str, var: &Variable) -> Result<()> {
    match (&var.formula, &var.kind, &var.domain) {
        (Some(formula), None, None) => {
            parse(&format!("{path}.formula"), formula)?;
        }
        (Some(_), _, _) => {
            return Err(PuzzleError::schema(
                path,
                "`formula` cannot be defined along with `type` or `domain`",
            ))
        }
        (None, Some(kind), Some(domain)) => {
            let var_type = VarType::parse(kind).ok_or_else(|| {
                PuzzleError::schema(format!("{path}.type"), format!("unsupported variable type '{kind}'"))
            })?;
            let domain_path = format!("{path}.domain");
            match var_type {
                VarType::Int | VarType::Float => range(&domain_path, domain)?,
                VarType::Bool | VarType::Enum => {
                    parse(&domain_path, domain)?;
                }
            }
        }
        (None, Some(kind), None) if VarType::parse(kind) == Some(VarType::Bool) => {}
        (None, _, _) => {
            return Err(PuzzleError::schema(
                path,
                "when `formula` is not defined, both `type` and `domain` must be defined",
            ))
        }
    }
    Ok(())
}

fn check_defined(path: &str, def: &DefinedSymbol) -> Result<()> {
    if def.source.is_empty() {
        return Err(PuzzleError::schema(format!("{path}.source"), "needs at least one source"));
    }
    for (i, source) in def.source.iter().enumerate() {
        parse(&format!("{path}.source[{i}]"), source)?;
    }
    let type_path = format!("{path}.type");
    match &def.attr {
        None => {
            if def.sort.is_many() {
                return Err(PuzzleError::schema(type_path, "must be a single type when `attr` is absent"));
            }
            if def.desc.as_ref().is_some_and(|d| d.is_many()) {
                return Err(PuzzleError::schema(
                    format!("{path}.desc"),
                    "must be a single text when `attr` is absent",
                ));
            }
        }
        Some(attrs) => {
            if !def.sort.is_many() || def.sort.len() != attrs.len() {
                return Err(PuzzleError::schema(
                    type_path,
                    format!("must be a list of {} types, one per attribute", attrs.len()),
                ));
            }
            if let Some(desc) = &def.desc {
                if !desc.is_many() || desc.len() != attrs.len() {
                    return Err(PuzzleError::schema(
                        format!("{path}.desc"),
                        format!("must be a list of {} texts, one per attribute", attrs.len()),
                    ));
                }
            }
            for (i, a) in attrs.iter().enumerate() {
                if attrs[..i].contains(a) {
                    return Err(PuzzleError::schema(
                        format!("{path}.attr"),
                        format!("duplicate attribute '{a}'"),
                    ));
                }
            }
        }
    }
    for name in def.sort.as_slice() {
        if parse_sort(name).is_none() {
            return Err(PuzzleError::schema(type_path, format!("unsupported sort '{name}'")));
        }
    }
    if let Some(desc) = &def.desc {
        for text in desc.as_slice() {
            template(&format!("{path}.desc"), Some(text))?;
        }
    }
    if let Some(domain) = &def.domain {
        range(&format!("{path}.domain"), domain)?;
    }
    Ok(())
}

/// Checks the per-source settings shared by derived symbols, dynamic
/// conditions and option templates.
fn check_sources(
    path: &str,
    source: &[String],
    amount: Option<&[String]>,
    order: Option<&[bool]>,
    duplicate: Option<&[bool]>,
) -> Result<()> {
    if source.is_empty() {
        return Err(PuzzleError::schema(format!("{path}.source"), "needs at least one source"));
    }
    for (i, s) in source.iter().enumerate() {
        parse(&format!("{path}.source[{i}]"), s)?;
    }
    let k = source.len();
    let lengths = [
        ("amount", amount.map(<[String]>::len)),
        ("order", order.map(<[bool]>::len)),
        ("duplicate", duplicate.map(<[bool]>::len)),
    ];
    for (field, len) in lengths {
        if let Some(len) = len {
            if len != k {
                return Err(PuzzleError::schema(
                    format!("{path}.{field}"),
                    format!("has {len} entries but there are {k} sources"),
                ));
            }
        }
    }
    if let Some(amount) = amount {
        for (i, a) in amount.iter().enumerate() {
            parse(&format!("{path}.amount[{i}]"), a)?;
        }
    }
    Ok(())
}

fn check_custom(path: &str, conds: &[CustomCond], sources: usize, allowed: &[CondScope]) -> Result<()> {
    for (i, cond) in conds.iter().enumerate() {
        let cond_path = format!("{path}.custom_cond[{i}]");
        match cond.cond_scope() {
            Some(scope) if allowed.contains(&scope) => {}
            _ => {
                let names: Vec<&str> = allowed.iter().map(CondScope::as_str).collect();
                return Err(PuzzleError::schema(
                    format!("{cond_path}.scope"),
                    format!("'{}' is not one of {}", cond.scope, names.join(", ")),
                ));
            }
        }
        if let Some(fields) = &cond.fields {
            if let Some(bad) = fields.iter().find(|&&f| f >= sources) {
                return Err(PuzzleError::schema(
                    format!("{cond_path}.fields"),
                    format!("field {bad} is out of range for {sources} sources"),
                ));
            }
        }
        match &cond.constraint {
            Some(source) => {
                if !matches!(parse(&format!("{cond_path}.constraint"), source)?, Expr::Lambda(_)) {
                    return Err(PuzzleError::schema(
                        format!("{cond_path}.constraint"),
                        "must be a lambda expression",
                    ));
                }
            }
            None if cond.cond_scope() != Some(CondScope::Domain) => {
                return Err(PuzzleError::schema(
                    format!("{cond_path}.constraint"),
                    "only domain-scope conditions may omit the constraint",
                ));
            }
            None => {}
        }
    }
    Ok(())
}

fn check_derived(path: &str, der: &DerivedSymbol, in_group: bool) -> Result<()> {
    check_sources(
        path,
        &der.source,
        der.amount.as_deref(),
        der.order.as_deref(),
        der.duplicate.as_deref(),
    )?;
    let k = der.source.len();
    if der.dim == 0 {
        return Err(PuzzleError::schema(format!("{path}.dim"), "must be at least 1"));
    }
    let mut seen = vec![false; k];
    for group in &der.dim_cond {
        for &field in group {
            if field >= k {
                return Err(PuzzleError::schema(
                    format!("{path}.dim_cond"),
                    format!("field {field} is out of range for {k} sources"),
                ));
            }
            if seen[field] {
                return Err(PuzzleError::schema(
                    format!("{path}.dim_cond"),
                    format!("field {field} appears more than once"),
                ));
            }
            seen[field] = true;
        }
    }
    check_custom(path, &der.custom_cond, k, &[CondScope::Dim, CondScope::Domain])?;
    if let Some(domain) = &der.domain {
        let domain_path = format!("{path}.domain");
        if in_group {
            range(&domain_path, domain)?;
        } else {
            parse(&domain_path, domain)?;
        }
    }
    if let Some(formula) = &der.formula {
        parse(&format!("{path}.formula"), formula)?;
    }
    template(&format!("{path}.desc"), Some(&der.desc))
}

fn check_group(path: &str, group: &DerivedSymbols) -> Result<()> {
    parse(&format!("{path}.total"), &group.total)?;
    if group.templates.is_empty() {
        return Err(PuzzleError::schema(format!("{path}.templates"), "needs at least one template"));
    }
    for (i, t) in group.templates.iter().enumerate() {
        check_derived(&format!("{path}.templates[{i}]"), t, true)?;
    }
    Ok(())
}

fn check_condition(path: &str, cond: &Condition) -> Result<()> {
    parse(&format!("{path}.formula"), cond.formula())?;
    template(&format!("{path}.desc"), cond.desc())?;
    if let Condition::Dynamic(dynamic) = cond {
        check_sources(
            path,
            &dynamic.source,
            dynamic.amount.as_deref(),
            dynamic.order.as_deref(),
            dynamic.duplicate.as_deref(),
        )?;
        check_custom(
            path,
            &dynamic.custom_cond,
            dynamic.source.len(),
            &[CondScope::Dim, CondScope::Domain],
        )?;
        if let Some(domain) = &dynamic.domain {
            range(&format!("{path}.domain"), domain)?;
        }
    }
    Ok(())
}

fn check_option(path: &str, t: &OptionTemplate, multiple: bool) -> Result<()> {
    check_sources(path, &t.source, t.amount.as_deref(), t.order.as_deref(), t.duplicate.as_deref())?;
    check_custom(
        path,
        &t.custom_cond,
        t.source.len(),
        &[CondScope::Dim, CondScope::Domain, CondScope::Option],
    )?;
    parse(&format!("{path}.opt_formula"), &t.opt_formula)?;
    template(&format!("{path}.opt_text"), t.opt_text.as_deref())?;
    match (&t.domain, multiple) {
        (Some(domain), true) => range(&format!("{path}.domain"), domain),
        (Some(_), false) => Err(PuzzleError::schema(
            format!("{path}.domain"),
            "only allowed on templates of a multi-template query",
        )),
        (None, _) => Ok(()),
    }
}

fn check_query(path: &str, query: &Query) -> Result<()> {
    template(&format!("{path}.desc"), Some(query.desc()))?;
    match query {
        Query::Open(q) => {
            parse(&format!("{path}.ans_formula"), &q.ans_formula)?;
            parse(&format!("{path}.ans_text"), &q.ans_text)?;
            parse(&format!("{path}.ans_assertion"), &q.ans_assertion)?;
        }
        Query::Selection(q) => {
            if q.opt_num < 2 {
                return Err(PuzzleError::schema(format!("{path}.opt_num"), "must be at least 2"));
            }
            match &q.options {
                OptionSet::Single(t) => check_option(path, t, false)?,
                OptionSet::Multiple { templates } => {
                    if templates.is_empty() {
                        return Err(PuzzleError::schema(
                            format!("{path}.templates"),
                            "needs at least one template",
                        ));
                    }
                    for (i, t) in templates.iter().enumerate() {
                        check_option(&format!("{path}.templates[{i}]"), t, true)?;
                    }
                }
            }
        }
    }
    Ok(())
}
