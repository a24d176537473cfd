//! Recursive-descent parser following Python's expression precedence.

use std::sync::Arc;

use puzzleforge_core::Result;

use crate::ast::{
    Arg, BinOp, Clause, CmpKind, CompKind, Comprehension, Expr, Index, LambdaDef, LogicalOp, Param,
    Target, UnaryOp,
};
use crate::lexer::{parse_error, Lexer, SpannedToken, Token};
use crate::template::Template;
use crate::value::Value;

/// Maximum nesting depth of parenthesised or prefixed sub-expressions.
pub const MAX_EXPR_NESTING: usize = 64;

/// Parses a complete expression. A top-level comma list becomes a tuple.
pub fn parse_expr(input: &str) -> Result<Expr> {
    let tokens = Lexer::new(input).lex()?;
    let mut parser = Parser {
        input,
        tokens,
        index: 0,
        nesting: 0,
    };
    if parser.at(&Token::Eof) {
        return Err(parse_error(input, 0, "expression is empty"));
    }
    let expr = parser.parse_test_list()?;
    parser.expect_eof()?;
    Ok(expr)
}

struct Parser<'a> {
    input: &'a str,
    tokens: Vec<SpannedToken>,
    index: usize,
    nesting: usize,
}

impl<'a> Parser<'a> {
    fn parse_test_list(&mut self) -> Result<Expr> {
        let first = self.parse_test()?;
        if !self.at(&Token::Comma) {
            return Ok(first);
        }
        let mut items = vec![first];
        while self.matches(&Token::Comma) {
            if self.at_expression_end() {
                break;
            }
            items.push(self.parse_test()?);
        }
        Ok(Expr::Tuple(items))
    }

    fn parse_test(&mut self) -> Result<Expr> {
        self.enter()?;
        let result = self.parse_test_inner();
        self.nesting -= 1;
        result
    }

    fn parse_test_inner(&mut self) -> Result<Expr> {
        if self.matches(&Token::Lambda) {
            return self.parse_lambda();
        }
        let body = self.parse_or()?;
        if self.matches(&Token::If) {
            let cond = self.parse_or()?;
            self.expect(&Token::Else, "'else'")?;
            let otherwise = self.parse_test()?;
            return Ok(Expr::IfElse {
                cond: Box::new(cond),
                then: Box::new(body),
                otherwise: Box::new(otherwise),
            });
        }
        Ok(body)
    }

    fn parse_lambda(&mut self) -> Result<Expr> {
        let mut params = Vec::new();
        while !self.at(&Token::Colon) {
            let name = self.expect_ident("lambda parameter")?;
            let default = if self.matches(&Token::Assign) {
                Some(self.parse_test()?)
            } else {
                None
            };
            params.push(Param {
                name: Arc::from(name.as_str()),
                default,
            });
            if !self.matches(&Token::Comma) {
                break;
            }
        }
        self.expect(&Token::Colon, "':'")?;
        let body = self.parse_test()?;
        Ok(Expr::Lambda(Arc::new(LambdaDef { params, body })))
    }

    fn parse_or(&mut self) -> Result<Expr> {
        let first = self.parse_and()?;
        if !self.at(&Token::Or) {
            return Ok(first);
        }
        let mut parts = vec![first];
        while self.matches(&Token::Or) {
            parts.push(self.parse_and()?);
        }
        Ok(Expr::Logical(LogicalOp::Or, parts))
    }

    fn parse_and(&mut self) -> Result<Expr> {
        let first = self.parse_not()?;
        if !self.at(&Token::And) {
            return Ok(first);
        }
        let mut parts = vec![first];
        while self.matches(&Token::And) {
            parts.push(self.parse_not()?);
        }
        Ok(Expr::Logical(LogicalOp::And, parts))
    }

    fn parse_not(&mut self) -> Result<Expr> {
        if self.matches(&Token::Not) {
            self.enter()?;
            let inner = self.parse_not();
            self.nesting -= 1;
            return Ok(Expr::Unary(UnaryOp::Not, Box::new(inner?)));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expr> {
        let first = self.parse_bitor()?;
        let mut rest = Vec::new();
        loop {
            let kind = match &self.current().token {
                Token::EqEq => CmpKind::Eq,
                Token::NotEq => CmpKind::Ne,
                Token::Lt => CmpKind::Lt,
                Token::Le => CmpKind::Le,
                Token::Gt => CmpKind::Gt,
                Token::Ge => CmpKind::Ge,
                Token::In => CmpKind::In,
                Token::Is => {
                    if self.peek_is(1, &Token::Not) {
                        self.advance();
                        CmpKind::IsNot
                    } else {
                        CmpKind::Is
                    }
                }
                Token::Not if self.peek_is(1, &Token::In) => {
                    self.advance();
                    CmpKind::NotIn
                }
                _ => break,
            };
            self.advance();
            rest.push((kind, self.parse_bitor()?));
        }
        if rest.is_empty() {
            Ok(first)
        } else {
            Ok(Expr::Compare(Box::new(first), rest))
        }
    }

    fn parse_bitor(&mut self) -> Result<Expr> {
        let mut left = self.parse_bitxor()?;
        while self.matches(&Token::Pipe) {
            let right = self.parse_bitxor()?;
            left = Expr::Binary(BinOp::BitOr, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_bitxor(&mut self) -> Result<Expr> {
        let mut left = self.parse_bitand()?;
        while self.matches(&Token::Caret) {
            let right = self.parse_bitand()?;
            left = Expr::Binary(BinOp::BitXor, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_bitand(&mut self) -> Result<Expr> {
        let mut left = self.parse_arith()?;
        while self.matches(&Token::Amp) {
            let right = self.parse_arith()?;
            left = Expr::Binary(BinOp::BitAnd, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_arith(&mut self) -> Result<Expr> {
        let mut left = self.parse_term()?;
        loop {
            let op = match self.current().token {
                Token::Plus => BinOp::Add,
                Token::Minus => BinOp::Sub,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.parse_term()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn parse_term(&mut self) -> Result<Expr> {
        let mut left = self.parse_factor()?;
        loop {
            let op = match self.current().token {
                Token::Star => BinOp::Mul,
                Token::Slash => BinOp::Div,
                Token::DoubleSlash => BinOp::FloorDiv,
                Token::Percent => BinOp::Mod,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.parse_factor()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn parse_factor(&mut self) -> Result<Expr> {
        let op = match self.current().token {
            Token::Minus => Some(UnaryOp::Neg),
            Token::Plus => Some(UnaryOp::Pos),
            Token::Tilde => Some(UnaryOp::Invert),
            _ => None,
        };
        match op {
            Some(op) => {
                self.advance();
                self.enter()?;
                let inner = self.parse_factor();
                self.nesting -= 1;
                let inner = inner?;
                if let (UnaryOp::Neg, Expr::Literal(Value::Int(i))) = (op, &inner) {
                    return Ok(Expr::Literal(Value::Int(-i)));
                }
                if let (UnaryOp::Neg, Expr::Literal(Value::Float(f))) = (op, &inner) {
                    return Ok(Expr::Literal(Value::Float(-f)));
                }
                Ok(Expr::Unary(op, Box::new(inner)))
            }
            None => self.parse_power(),
        }
    }

    fn parse_power(&mut self) -> Result<Expr> {
        let base = self.parse_postfix()?;
        if self.matches(&Token::DoubleStar) {
            let exponent = self.parse_factor()?;
            return Ok(Expr::Binary(BinOp::Pow, Box::new(base), Box::new(exponent)));
        }
        Ok(base)
    }

    fn parse_postfix(&mut self) -> Result<Expr> {
        let mut expr = self.parse_atom()?;
        loop {
            match self.current().token {
                Token::LParen => {
                    self.advance();
                    let args = self.parse_call_args()?;
                    expr = Expr::Call(Box::new(expr), args);
                }
                Token::LBracket => {
                    self.advance();
                    let index = self.parse_index()?;
                    self.expect(&Token::RBracket, "']'")?;
                    expr = Expr::Subscript(Box::new(expr), Box::new(index));
                }
                Token::Dot => {
                    self.advance();
                    let name = self.expect_ident("attribute name")?;
                    expr = Expr::Attribute(Box::new(expr), Arc::from(name.as_str()));
                }
                _ => return Ok(expr),
            }
        }
    }

    fn parse_call_args(&mut self) -> Result<Vec<Arg>> {
        let mut args = Vec::new();
        while !self.at(&Token::RParen) {
            if self.matches(&Token::Star) {
                args.push(Arg::Star(self.parse_test()?));
            } else if matches!(self.current().token, Token::Ident(_)) && self.peek_is(1, &Token::Assign) {
                let name = self.expect_ident("keyword")?;
                self.advance();
                args.push(Arg::Keyword(Arc::from(name.as_str()), self.parse_test()?));
            } else {
                let value = self.parse_test()?;
                if self.at(&Token::For) {
                    let clauses = self.parse_clauses()?;
                    args.push(Arg::Positional(Expr::Comprehension(Box::new(Comprehension {
                        kind: CompKind::Generator,
                        element: value,
                        value: None,
                        clauses,
                    }))));
                } else {
                    args.push(Arg::Positional(value));
                }
            }
            if !self.matches(&Token::Comma) {
                break;
            }
        }
        self.expect(&Token::RParen, "')'")?;
        Ok(args)
    }

    fn parse_index(&mut self) -> Result<Index> {
        let lower = if self.at(&Token::Colon) {
            None
        } else {
            let first = self.parse_test()?;
            if !self.at(&Token::Colon) {
                if self.at(&Token::Comma) {
                    let mut items = vec![first];
                    while self.matches(&Token::Comma) {
                        if self.at(&Token::RBracket) {
                            break;
                        }
                        items.push(self.parse_test()?);
                    }
                    return Ok(Index::Item(Expr::Tuple(items)));
                }
                return Ok(Index::Item(first));
            }
            Some(first)
        };
        self.expect(&Token::Colon, "':'")?;
        let upper = if self.at(&Token::Colon) || self.at(&Token::RBracket) {
            None
        } else {
            Some(self.parse_test()?)
        };
        let step = if self.matches(&Token::Colon) && !self.at(&Token::RBracket) {
            Some(self.parse_test()?)
        } else {
            None
        };
        Ok(Index::Slice { lower, upper, step })
    }

    fn parse_atom(&mut self) -> Result<Expr> {
        let spanned = self.current().clone();
        match spanned.token {
            Token::Int(i) => {
                self.advance();
                Ok(Expr::Literal(Value::Int(i)))
            }
            Token::Float(f) => {
                self.advance();
                Ok(Expr::Literal(Value::Float(f)))
            }
            Token::True => {
                self.advance();
                Ok(Expr::Literal(Value::Bool(true)))
            }
            Token::False => {
                self.advance();
                Ok(Expr::Literal(Value::Bool(false)))
            }
            Token::None => {
                self.advance();
                Ok(Expr::Literal(Value::None))
            }
            Token::Str(_) | Token::FStr(_) => self.parse_strings(),
            Token::Ident(name) => {
                self.advance();
                Ok(Expr::Name(Arc::from(name.as_str())))
            }
            Token::LParen => {
                self.advance();
                self.enter()?;
                let inner = self.parse_paren();
                self.nesting -= 1;
                inner
            }
            Token::LBracket => {
                self.advance();
                self.enter()?;
                let inner = self.parse_list();
                self.nesting -= 1;
                inner
            }
            Token::LBrace => {
                self.advance();
                self.enter()?;
                let inner = self.parse_brace();
                self.nesting -= 1;
                inner
            }
            other => Err(parse_error(
                self.input,
                spanned.position,
                format!("expected expression, found {}", other.describe()),
            )),
        }
    }

    /// Adjacent string literals concatenate; any f-string makes the whole
    /// run a template.
    fn parse_strings(&mut self) -> Result<Expr> {
        let position = self.current().position;
        let mut pieces: Vec<(String, bool)> = Vec::new();
        loop {
            match &self.current().token {
                Token::Str(s) => pieces.push((s.clone(), false)),
                Token::FStr(s) => pieces.push((s.clone(), true)),
                _ => break,
            }
            self.advance();
        }
        if pieces.iter().all(|(_, f)| !f) {
            let text: String = pieces.into_iter().map(|(s, _)| s).collect();
            return Ok(Expr::Literal(Value::from(text)));
        }
        let source: String = pieces
            .into_iter()
            .map(|(s, f)| if f { s } else { s.replace('{', "{{").replace('}', "}}") })
            .collect();
        let template = Template::parse(&source).map_err(|e| match e {
            puzzleforge_core::PuzzleError::Parse { message, .. } => {
                parse_error(self.input, position, format!("in f-string: {message}"))
            }
            other => other,
        })?;
        Ok(Expr::FString(template))
    }

    fn parse_paren(&mut self) -> Result<Expr> {
        if self.matches(&Token::RParen) {
            return Ok(Expr::Tuple(Vec::new()));
        }
        let first = self.parse_test()?;
        if self.at(&Token::For) {
            let clauses = self.parse_clauses()?;
            self.expect(&Token::RParen, "')'")?;
            return Ok(Expr::Comprehension(Box::new(Comprehension {
                kind: CompKind::Generator,
                element: first,
                value: None,
                clauses,
            })));
        }
        if self.matches(&Token::RParen) {
            return Ok(first);
        }
        let mut items = vec![first];
        while self.matches(&Token::Comma) {
            if self.at(&Token::RParen) {
                break;
            }
            items.push(self.parse_test()?);
        }
        self.expect(&Token::RParen, "')'")?;
        Ok(Expr::Tuple(items))
    }

    fn parse_list(&mut self) -> Result<Expr> {
        if self.matches(&Token::RBracket) {
            return Ok(Expr::List(Vec::new()));
        }
        let first = self.parse_test()?;
        if self.at(&Token::For) {
            let clauses = self.parse_clauses()?;
            self.expect(&Token::RBracket, "']'")?;
            return Ok(Expr::Comprehension(Box::new(Comprehension {
                kind: CompKind::List,
                element: first,
                value: None,
                clauses,
            })));
        }
        let mut items = vec![first];
        while self.matches(&Token::Comma) {
            if self.at(&Token::RBracket) {
                break;
            }
            items.push(self.parse_test()?);
        }
        self.expect(&Token::RBracket, "']'")?;
        Ok(Expr::List(items))
    }

    fn parse_brace(&mut self) -> Result<Expr> {
        if self.matches(&Token::RBrace) {
            return Ok(Expr::Dict(Vec::new()));
        }
        let first = self.parse_test()?;
        if self.matches(&Token::Colon) {
            let value = self.parse_test()?;
            if self.at(&Token::For) {
                let clauses = self.parse_clauses()?;
                self.expect(&Token::RBrace, "'}'")?;
                return Ok(Expr::Comprehension(Box::new(Comprehension {
                    kind: CompKind::Dict,
                    element: first,
                    value: Some(value),
                    clauses,
                })));
            }
            let mut entries = vec![(first, value)];
            while self.matches(&Token::Comma) {
                if self.at(&Token::RBrace) {
                    break;
                }
                let key = self.parse_test()?;
                self.expect(&Token::Colon, "':'")?;
                entries.push((key, self.parse_test()?));
            }
            self.expect(&Token::RBrace, "'}'")?;
            return Ok(Expr::Dict(entries));
        }
        if self.at(&Token::For) {
            let clauses = self.parse_clauses()?;
            self.expect(&Token::RBrace, "'}'")?;
            return Ok(Expr::Comprehension(Box::new(Comprehension {
                kind: CompKind::Set,
                element: first,
                value: None,
                clauses,
            })));
        }
        let mut items = vec![first];
        while self.matches(&Token::Comma) {
            if self.at(&Token::RBrace) {
                break;
            }
            items.push(self.parse_test()?);
        }
        self.expect(&Token::RBrace, "'}'")?;
        Ok(Expr::Set(items))
    }

    fn parse_clauses(&mut self) -> Result<Vec<Clause>> {
        let mut clauses = Vec::new();
        loop {
            if self.matches(&Token::For) {
                let target = self.parse_target_list()?;
                self.expect(&Token::In, "'in'")?;
                let iter = self.parse_or()?;
                clauses.push(Clause::For(target, iter));
            } else if self.matches(&Token::If) {
                clauses.push(Clause::If(self.parse_or()?));
            } else {
                return Ok(clauses);
            }
        }
    }

    fn parse_target_list(&mut self) -> Result<Target> {
        let first = self.parse_target()?;
        if !self.at(&Token::Comma) {
            return Ok(first);
        }
        let mut items = vec![first];
        while self.matches(&Token::Comma) {
            if self.at(&Token::In) {
                break;
            }
            items.push(self.parse_target()?);
        }
        Ok(Target::Tuple(items))
    }

    fn parse_target(&mut self) -> Result<Target> {
        if self.matches(&Token::LParen) {
            let inner = self.parse_target_list()?;
            self.expect(&Token::RParen, "')'")?;
            return Ok(match inner {
                Target::Name(n) => Target::Tuple(vec![Target::Name(n)]),
                tuple => tuple,
            });
        }
        if self.matches(&Token::LBracket) {
            let inner = self.parse_target_list()?;
            self.expect(&Token::RBracket, "']'")?;
            return Ok(inner);
        }
        let name = self.expect_ident("loop variable")?;
        Ok(Target::Name(Arc::from(name.as_str())))
    }

    fn enter(&mut self) -> Result<()> {
        self.nesting += 1;
        if self.nesting > MAX_EXPR_NESTING {
            self.nesting -= 1;
            return Err(parse_error(
                self.input,
                self.current().position,
                format!("expression nesting exceeds {MAX_EXPR_NESTING}"),
            ));
        }
        Ok(())
    }

    fn current(&self) -> &SpannedToken {
        let last = self.tokens.len() - 1;
        &self.tokens[self.index.min(last)]
    }

    fn advance(&mut self) {
        if self.index < self.tokens.len() - 1 {
            self.index += 1;
        }
    }

    fn at(&self, token: &Token) -> bool {
        &self.current().token == token
    }

    fn peek_is(&self, n: usize, token: &Token) -> bool {
        self.tokens
            .get(self.index + n)
            .is_some_and(|t| &t.token == token)
    }

    fn at_expression_end(&self) -> bool {
        matches!(
            self.current().token,
            Token::Eof | Token::RParen | Token::RBracket | Token::RBrace | Token::Colon
        )
    }

    fn matches(&mut self, token: &Token) -> bool {
        if self.at(token) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &Token, expected: &str) -> Result<()> {
        if self.matches(token) {
            Ok(())
        } else {
            Err(parse_error(
                self.input,
                self.current().position,
                format!("expected {expected}, found {}", self.current().token.describe()),
            ))
        }
    }

    fn expect_ident(&mut self, expected: &str) -> Result<String> {
        match &self.current().token {
            Token::Ident(name) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            other => Err(parse_error(
                self.input,
                self.current().position,
                format!("expected {expected}, found {}", other.describe()),
            )),
        }
    }

    fn expect_eof(&self) -> Result<()> {
        if self.at(&Token::Eof) {
            Ok(())
        } else {
            Err(parse_error(
                self.input,
                self.current().position,
                format!("unexpected trailing {}", self.current().token.describe()),
            ))
        }
    }
}

#[cfg(test)]
#[path = "parser_tests.rs"]
mod tests;
