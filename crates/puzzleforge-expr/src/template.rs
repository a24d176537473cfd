//! Description templates: text with `{expr[!conv][:spec]}` placeholders.

use std::sync::Arc;

use puzzleforge_core::{format_float, PuzzleError, Result};

use crate::ast::Expr;
use crate::lexer::parse_error;
use crate::parser::parse_expr;
use crate::value::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    Text(String),
    Field {
        expr: Expr,
        /// `r` (repr) or `s` (str).
        conversion: Option<char>,
        spec: Option<String>,
    },
}

/// A parsed description template.
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    source: Arc<str>,
    segments: Vec<Segment>,
}

impl Template {
    pub fn parse(source: &str) -> Result<Self> {
        let mut segments = Vec::new();
        let mut text = String::new();
        let mut chars = source.char_indices().peekable();
        while let Some((pos, c)) = chars.next() {
            match c {
                '{' => {
                    if chars.peek().map(|&(_, n)| n) == Some('{') {
                        chars.next();
                        text.push('{');
                        continue;
                    }
                    let end = find_field_end(source, pos + 1)?;
                    if !text.is_empty() {
                        segments.push(Segment::Text(std::mem::take(&mut text)));
                    }
                    segments.push(parse_field(source, pos + 1, end)?);
                    while chars.peek().is_some_and(|&(p, _)| p <= end) {
                        chars.next();
                    }
                }
                '}' => {
                    if chars.peek().map(|&(_, n)| n) == Some('}') {
                        chars.next();
                        text.push('}');
                    } else {
                        return Err(parse_error(source, pos, "single '}' is not allowed"));
                    }
                }
                other => text.push(other),
            }
        }
        if !text.is_empty() {
            segments.push(Segment::Text(text));
        }
        Ok(Self {
            source: Arc::from(source),
            segments,
        })
    }

    /// Template without placeholders.
    pub fn literal(text: &str) -> Self {
        Self {
            source: Arc::from(text.replace('{', "{{").replace('}', "}}").as_str()),
            segments: if text.is_empty() {
                Vec::new()
            } else {
                vec![Segment::Text(text.to_string())]
            },
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

/// Byte offset of the `}` closing the field that starts at `start`.
fn find_field_end(source: &str, start: usize) -> Result<usize> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    for (offset, c) in source[start..].char_indices() {
        let pos = start + offset;
        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' => quote = Some(c),
            '(' | '[' | '{' => depth += 1,
            ')' | ']' => depth = depth.saturating_sub(1),
            '}' => {
                if depth == 0 {
                    return Ok(pos);
                }
                depth -= 1;
            }
            _ => {}
        }
    }
    Err(parse_error(source, start.saturating_sub(1), "unclosed '{' in template"))
}

fn parse_field(source: &str, start: usize, end: usize) -> Result<Segment> {
    let body = &source[start..end];
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut expr_end = body.len();
    let mut conversion = None;
    let mut spec = None;
    let bytes = body.as_bytes();
    for (i, c) in body.char_indices() {
        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' => quote = Some(c),
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth = depth.saturating_sub(1),
            '!' if depth == 0 && bytes.get(i + 1) != Some(&b'=') => {
                expr_end = i;
                let rest = &body[i + 1..];
                let (conv, tail) = match rest.find(':') {
                    Some(colon) => (&rest[..colon], Some(&rest[colon + 1..])),
                    None => (rest, None),
                };
                conversion = match conv.trim() {
                    "r" => Some('r'),
                    "s" => Some('s'),
                    other => {
                        return Err(parse_error(
                            source,
                            start + i,
                            format!("invalid conversion '!{other}'"),
                        ))
                    }
                };
                spec = tail.map(str::to_string);
                break;
            }
            ':' if depth == 0 => {
                expr_end = i;
                spec = Some(body[i + 1..].to_string());
                break;
            }
            _ => {}
        }
    }
    let expr_text = &body[..expr_end];
    if expr_text.trim().is_empty() {
        return Err(parse_error(source, start, "empty expression in template"));
    }
    let expr = parse_expr(expr_text).map_err(|e| match e {
        PuzzleError::Parse {
            position, message, ..
        } => parse_error(source, start + position, message),
        other => other,
    })?;
    Ok(Segment::Field {
        expr,
        conversion,
        spec,
    })
}

#[derive(Debug, Clone, PartialEq, Default)]
struct FormatSpec {
    fill: Option<char>,
    align: Option<char>,
    sign: Option<char>,
    zero: bool,
    width: Option<usize>,
    grouping: bool,
    precision: Option<usize>,
    kind: Option<char>,
}

fn parse_spec(spec: &str) -> Result<FormatSpec> {
    let chars: Vec<char> = spec.chars().collect();
    let mut out = FormatSpec::default();
    let mut i = 0;
    let is_align = |c: char| matches!(c, '<' | '>' | '^' | '=');
    if chars.len() >= 2 && is_align(chars[1]) {
        out.fill = Some(chars[0]);
        out.align = Some(chars[1]);
        i = 2;
    } else if !chars.is_empty() && is_align(chars[0]) {
        out.align = Some(chars[0]);
        i = 1;
    }
    if i < chars.len() && matches!(chars[i], '+' | '-' | ' ') {
        out.sign = Some(chars[i]);
        i += 1;
    }
    if i < chars.len() && chars[i] == '#' {
        i += 1;
    }
    if i < chars.len() && chars[i] == '0' {
        out.zero = true;
        i += 1;
    }
    let width_start = i;
    while i < chars.len() && chars[i].is_ascii_digit() {
        i += 1;
    }
    if i > width_start {
        out.width = chars[width_start..i].iter().collect::<String>().parse().ok();
    }
    if i < chars.len() && (chars[i] == ',' || chars[i] == '_') {
        out.grouping = true;
        i += 1;
    }
    if i < chars.len() && chars[i] == '.' {
        i += 1;
        let p_start = i;
        while i < chars.len() && chars[i].is_ascii_digit() {
            i += 1;
        }
        out.precision = chars[p_start..i].iter().collect::<String>().parse().ok();
    }
    if i < chars.len() {
        out.kind = Some(chars[i]);
        i += 1;
    }
    if i != chars.len() {
        return Err(PuzzleError::eval(format!("invalid format specifier '{spec}'")));
    }
    Ok(out)
}

/// Formats a value with a Python format specifier.
pub fn format_value(value: &Value, spec: &str) -> Result<String> {
    if spec.is_empty() {
        return Ok(value.to_string());
    }
    let spec = parse_spec(spec)?;
    let value = value.untagged();
    let number = match value {
        Value::Int(i) => Some(*i as f64),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::Float(f) => Some(*f),
        _ => None,
    };
    let body = match (spec.kind, number) {
        (Some('d'), _) => match value {
            Value::Int(i) => group(i.unsigned_abs().to_string(), spec.grouping, *i < 0),
            Value::Bool(b) => i64::from(*b).to_string(),
            other => {
                return Err(PuzzleError::eval(format!(
                    "format code 'd' needs an integer, got {}",
                    other.type_name()
                )))
            }
        },
        (Some('f') | Some('F'), Some(x)) => fixed(x, spec.precision.unwrap_or(6), spec.grouping),
        (Some('%'), Some(x)) => format!("{}%", fixed(x * 100.0, spec.precision.unwrap_or(6), spec.grouping)),
        (Some('e') | Some('E'), Some(x)) => exponent(x, spec.precision.unwrap_or(6)),
        (Some('g') | Some('G'), Some(x)) => general(x, spec.precision.unwrap_or(6)),
        (None, Some(x)) if spec.precision.is_some() && !matches!(value, Value::Int(_)) => {
            general(x, spec.precision.unwrap_or(6))
        }
        (None, Some(_)) if spec.grouping => match value {
            Value::Int(i) => group(i.unsigned_abs().to_string(), true, *i < 0),
            Value::Float(f) => group_float(&format_float(*f)),
            other => other.to_string(),
        },
        (Some('s') | None, _) => {
            let s = value.to_string();
            match spec.precision {
                Some(p) => s.chars().take(p).collect(),
                None => s,
            }
        }
        (Some(kind), _) => {
            return Err(PuzzleError::eval(format!(
                "unknown format code '{kind}' for {}",
                value.type_name()
            )))
        }
    };
    let body = apply_sign(body, spec.sign, number.is_some());
    Ok(pad(body, &spec, number.is_some()))
}

fn fixed(x: f64, precision: usize, grouping: bool) -> String {
    let s = format!("{x:.precision$}");
    if grouping {
        group_float(&s)
    } else {
        s
    }
}

fn exponent(x: f64, precision: usize) -> String {
    let s = format!("{x:.precision$e}");
    match s.split_once('e') {
        Some((mantissa, exp)) => {
            let (sign, digits) = match exp.strip_prefix('-') {
                Some(d) => ('-', d),
                None => ('+', exp),
            };
            format!("{mantissa}e{sign}{digits:0>2}")
        }
        None => s,
    }
}

fn general(x: f64, precision: usize) -> String {
    let p = precision.max(1);
    if x == 0.0 {
        return "0".to_string();
    }
    let exp = x.abs().log10().floor() as i32;
    if exp < -4 || exp >= p as i32 {
        let s = exponent(x, p - 1);
        match s.split_once('e') {
            Some((m, e)) => format!("{}e{e}", trim_zeros(m)),
            None => s,
        }
    } else {
        let decimals = (p as i32 - 1 - exp).max(0) as usize;
        trim_zeros(&format!("{x:.decimals$}"))
    }
}

fn trim_zeros(s: &str) -> String {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        s.to_string()
    }
}

fn group(digits: String, grouping: bool, negative: bool) -> String {
    let mut out = if grouping {
        let len = digits.len();
        let mut grouped = String::with_capacity(len + len / 3);
        for (i, c) in digits.chars().enumerate() {
            if i > 0 && (len - i) % 3 == 0 {
                grouped.push(',');
            }
            grouped.push(c);
        }
        grouped
    } else {
        digits
    };
    if negative {
        out.insert(0, '-');
    }
    out
}

fn group_float(s: &str) -> String {
    let (negative, unsigned) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s),
    };
    match unsigned.split_once('.') {
        Some((int_part, frac)) => format!("{}.{frac}", group(int_part.to_string(), true, negative)),
        None => group(unsigned.to_string(), true, negative),
    }
}

fn apply_sign(body: String, sign: Option<char>, numeric: bool) -> String {
    if !numeric || body.starts_with('-') {
        return body;
    }
    match sign {
        Some('+') => format!("+{body}"),
        Some(' ') => format!(" {body}"),
        _ => body,
    }
}

fn pad(body: String, spec: &FormatSpec, numeric: bool) -> String {
    let width = match spec.width {
        Some(w) => w,
        None => return body,
    };
    let len = body.chars().count();
    if len >= width {
        return body;
    }
    let missing = width - len;
    let (fill, align) = if spec.zero && spec.align.is_none() && numeric {
        ('0', '=')
    } else {
        (
            spec.fill.unwrap_or(' '),
            spec.align.unwrap_or(if numeric { '>' } else { '<' }),
        )
    };
    let filler = |n: usize| std::iter::repeat(fill).take(n).collect::<String>();
    match align {
        '<' => format!("{body}{}", filler(missing)),
        '^' => format!("{}{body}{}", filler(missing / 2), filler(missing - missing / 2)),
        '=' => {
            let (sign, rest) = match body.chars().next() {
                Some(c @ ('+' | '-' | ' ')) => (c.to_string(), body[1..].to_string()),
                _ => (String::new(), body.clone()),
            };
            format!("{sign}{}{rest}", filler(missing))
        }
        _ => format!("{}{body}", filler(missing)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_segments_and_escapes() {
        let t = Template::parse("{{a}} is {x + 1} and {y!r:>5}").unwrap();
        assert_eq!(t.segments().len(), 4);
        assert_eq!(t.segments()[0], Segment::Text("{a} is ".into()));
        match &t.segments()[3] {
            Segment::Field {
                conversion, spec, ..
            } => {
                assert_eq!(*conversion, Some('r'));
                assert_eq!(spec.as_deref(), Some(">5"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_nested_brackets_and_strings() {
        let t = Template::parse("{ {'a': 1}['a'] } {', '.join(names)}").unwrap();
        assert_eq!(t.segments().len(), 3);
        assert!(Template::parse("{d['}']}").is_ok());
    }

    #[test]
    fn test_template_errors() {
        assert!(Template::parse("oops }").is_err());
        assert!(Template::parse("{x").is_err());
        assert!(Template::parse("{}").is_err());
        assert!(Template::parse("{x!q}").is_err());
    }

    #[test]
    fn test_format_specs() {
        assert_eq!(format_value(&Value::Float(3.14159), ".2f").unwrap(), "3.14");
        assert_eq!(format_value(&Value::Float(0.256), ".1%").unwrap(), "25.6%");
        assert_eq!(format_value(&Value::Int(42), "d").unwrap(), "42");
        assert_eq!(format_value(&Value::Int(1234567), ",").unwrap(), "1,234,567");
        assert_eq!(format_value(&Value::Int(7), "03d").unwrap(), "007");
        assert_eq!(format_value(&Value::from("ab"), ">4").unwrap(), "  ab");
        assert_eq!(format_value(&Value::from("ab"), "*^6").unwrap(), "**ab**");
        assert_eq!(format_value(&Value::Float(12345.678), ".2e").unwrap(), "1.23e+04");
        assert_eq!(format_value(&Value::Float(0.5), "+.1f").unwrap(), "+0.5");
        assert!(format_value(&Value::from("x"), "d").is_err());
    }

    #[test]
    fn test_literal_template_round_trip() {
        let t = Template::literal("a {b}");
        assert_eq!(t.source(), "a {{b}}");
        assert_eq!(Template::parse(t.source()).unwrap().segments(), t.segments());
    }
}
