//! Tokenizer for the expression language.

use puzzleforge_core::{PuzzleError, Result};

/// Maximum accepted expression size in bytes.
pub const MAX_EXPR_INPUT_BYTES: usize = 64 * 1024;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Int(i64),
    Float(f64),
    Str(String),
    /// Body of an f-string, escapes already processed.
    FStr(String),
    Ident(String),
    And,
    Or,
    Not,
    In,
    Is,
    If,
    Else,
    For,
    Lambda,
    True,
    False,
    None,
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Colon,
    Dot,
    Assign,
    Plus,
    Minus,
    Star,
    DoubleStar,
    Slash,
    DoubleSlash,
    Percent,
    Amp,
    Pipe,
    Caret,
    Tilde,
    EqEq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    Eof,
}

impl Token {
    pub fn describe(&self) -> String {
        match self {
            Token::Int(i) => i.to_string(),
            Token::Float(f) => f.to_string(),
            Token::Str(s) | Token::FStr(s) => format!("'{s}'"),
            Token::Ident(s) => s.clone(),
            Token::Eof => "end of input".to_string(),
            other => format!("{other:?}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpannedToken {
    pub token: Token,
    pub position: usize,
}

pub(crate) fn parse_error(input: &str, position: usize, message: impl Into<String>) -> PuzzleError {
    PuzzleError::Parse {
        source_text: input.to_string(),
        position,
        message: message.into(),
    }
}

pub struct Lexer<'a> {
    input: &'a str,
    offset: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self { input, offset: 0 }
    }

    pub fn lex(mut self) -> Result<Vec<SpannedToken>> {
        if self.input.len() > MAX_EXPR_INPUT_BYTES {
            return Err(parse_error(
                "",
                0,
                format!(
                    "expression exceeds size limit: {} bytes (max {MAX_EXPR_INPUT_BYTES})",
                    self.input.len()
                ),
            ));
        }
        let mut tokens = Vec::new();
        while let Some(ch) = self.peek_char() {
            let start = self.offset;
            match ch {
                ' ' | '\t' | '\n' | '\r' => self.offset += 1,
                '(' => tokens.push(self.simple(Token::LParen, 1)),
                ')' => tokens.push(self.simple(Token::RParen, 1)),
                '[' => tokens.push(self.simple(Token::LBracket, 1)),
                ']' => tokens.push(self.simple(Token::RBracket, 1)),
                '{' => tokens.push(self.simple(Token::LBrace, 1)),
                '}' => tokens.push(self.simple(Token::RBrace, 1)),
                ',' => tokens.push(self.simple(Token::Comma, 1)),
                ':' => tokens.push(self.simple(Token::Colon, 1)),
                '+' => tokens.push(self.simple(Token::Plus, 1)),
                '-' => tokens.push(self.simple(Token::Minus, 1)),
                '%' => tokens.push(self.simple(Token::Percent, 1)),
                '&' => tokens.push(self.simple(Token::Amp, 1)),
                '|' => tokens.push(self.simple(Token::Pipe, 1)),
                '^' => tokens.push(self.simple(Token::Caret, 1)),
                '~' => tokens.push(self.simple(Token::Tilde, 1)),
                '*' => {
                    if self.peek_at(1) == Some('*') {
                        tokens.push(self.simple(Token::DoubleStar, 2));
                    } else {
                        tokens.push(self.simple(Token::Star, 1));
                    }
                }
                '/' => {
                    if self.peek_at(1) == Some('/') {
                        tokens.push(self.simple(Token::DoubleSlash, 2));
                    } else {
                        tokens.push(self.simple(Token::Slash, 1));
                    }
                }
                '=' => {
                    if self.peek_at(1) == Some('=') {
                        tokens.push(self.simple(Token::EqEq, 2));
                    } else {
                        tokens.push(self.simple(Token::Assign, 1));
                    }
                }
                '!' => {
                    if self.peek_at(1) == Some('=') {
                        tokens.push(self.simple(Token::NotEq, 2));
                    } else {
                        return Err(parse_error(self.input, start, "expected '!='"));
                    }
                }
                '<' => {
                    if self.peek_at(1) == Some('=') {
                        tokens.push(self.simple(Token::Le, 2));
                    } else {
                        tokens.push(self.simple(Token::Lt, 1));
                    }
                }
                '>' => {
                    if self.peek_at(1) == Some('=') {
                        tokens.push(self.simple(Token::Ge, 2));
                    } else {
                        tokens.push(self.simple(Token::Gt, 1));
                    }
                }
                '.' => {
                    if self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
                        tokens.push(self.number()?);
                    } else {
                        tokens.push(self.simple(Token::Dot, 1));
                    }
                }
                '\'' | '"' => {
                    let text = self.string(false)?;
                    tokens.push(SpannedToken {
                        token: Token::Str(text),
                        position: start,
                    });
                }
                c if c.is_ascii_digit() => tokens.push(self.number()?),
                c if c.is_alphabetic() || c == '_' => {
                    if let Some(token) = self.prefixed_string()? {
                        tokens.push(token);
                        continue;
                    }
                    self.consume_while(|c| c.is_alphanumeric() || c == '_');
                    let word = &self.input[start..self.offset];
                    tokens.push(SpannedToken {
                        token: Self::keyword_or_ident(word),
                        position: start,
                    });
                }
                other => {
                    return Err(parse_error(
                        self.input,
                        start,
                        format!("unexpected character '{other}'"),
                    ));
                }
            }
        }
        tokens.push(SpannedToken {
            token: Token::Eof,
            position: self.offset,
        });
        Ok(tokens)
    }

    fn simple(&mut self, token: Token, width: usize) -> SpannedToken {
        let position = self.offset;
        self.offset += width;
        SpannedToken { token, position }
    }

    fn peek_char(&self) -> Option<char> {
        self.input[self.offset..].chars().next()
    }

    fn peek_at(&self, n: usize) -> Option<char> {
        self.input[self.offset..].chars().nth(n)
    }

    fn consume_while<F>(&mut self, condition: F)
    where
        F: Fn(char) -> bool,
    {
        while let Some(c) = self.peek_char() {
            if !condition(c) {
                break;
            }
            self.offset += c.len_utf8();
        }
    }

    fn keyword_or_ident(word: &str) -> Token {
        match word {
            "and" => Token::And,
            "or" => Token::Or,
            "not" => Token::Not,
            "in" => Token::In,
            "is" => Token::Is,
            "if" => Token::If,
            "else" => Token::Else,
            "for" => Token::For,
            "lambda" => Token::Lambda,
            "True" => Token::True,
            "False" => Token::False,
            "None" => Token::None,
            _ => Token::Ident(word.to_string()),
        }
    }

    /// Handles `r'..'`, `f'..'`, `rf'..'` and friends.
    fn prefixed_string(&mut self) -> Result<Option<SpannedToken>> {
        let start = self.offset;
        let rest = &self.input[start..];
        let prefix_len = rest
            .chars()
            .take_while(|c| matches!(c, 'r' | 'R' | 'f' | 'F' | 'u' | 'U' | 'b' | 'B'))
            .count();
        if prefix_len == 0 || prefix_len > 2 {
            return Ok(None);
        }
        match rest[prefix_len..].chars().next() {
            Some('\'') | Some('"') => {}
            _ => return Ok(None),
        }
        let prefix = rest[..prefix_len].to_ascii_lowercase();
        let raw = prefix.contains('r');
        let formatted = prefix.contains('f');
        self.offset += prefix_len;
        let text = self.string(raw)?;
        let token = if formatted {
            Token::FStr(text)
        } else {
            Token::Str(text)
        };
        Ok(Some(SpannedToken {
            token,
            position: start,
        }))
    }

    fn string(&mut self, raw: bool) -> Result<String> {
        let start = self.offset;
        let quote = match self.peek_char() {
            Some(q) => q,
            None => return Err(parse_error(self.input, start, "expected string")),
        };
        let triple = self.input[self.offset..].starts_with(&quote.to_string().repeat(3));
        self.offset += if triple { 3 } else { 1 };
        let mut out = String::new();
        loop {
            let c = match self.peek_char() {
                Some(c) => c,
                None => return Err(parse_error(self.input, start, "unterminated string")),
            };
            if c == quote {
                if !triple {
                    self.offset += 1;
                    return Ok(out);
                }
                if self.input[self.offset..].starts_with(&quote.to_string().repeat(3)) {
                    self.offset += 3;
                    return Ok(out);
                }
            }
            if c == '\n' && !triple {
                return Err(parse_error(self.input, start, "unterminated string"));
            }
            self.offset += c.len_utf8();
            if c != '\\' {
                out.push(c);
                continue;
            }
            let next = match self.peek_char() {
                Some(n) => n,
                None => return Err(parse_error(self.input, start, "unterminated string")),
            };
            self.offset += next.len_utf8();
            if raw {
                out.push('\\');
                out.push(next);
                continue;
            }
            match next {
                'n' => out.push('\n'),
                't' => out.push('\t'),
                'r' => out.push('\r'),
                '0' => out.push('\0'),
                '\\' => out.push('\\'),
                '\'' => out.push('\''),
                '"' => out.push('"'),
                '\n' => {}
                'x' => out.push(self.hex_escape(2, start)?),
                'u' => out.push(self.hex_escape(4, start)?),
                other => {
                    out.push('\\');
                    out.push(other);
                }
            }
        }
    }

    fn hex_escape(&mut self, digits: usize, start: usize) -> Result<char> {
        let end = self.offset + digits;
        let hex = self
            .input
            .get(self.offset..end)
            .ok_or_else(|| parse_error(self.input, start, "truncated escape"))?;
        let code = u32::from_str_radix(hex, 16)
            .map_err(|_| parse_error(self.input, start, "invalid escape"))?;
        self.offset = end;
        char::from_u32(code).ok_or_else(|| parse_error(self.input, start, "invalid escape"))
    }

    fn number(&mut self) -> Result<SpannedToken> {
        let start = self.offset;
        let rest = &self.input[start..];
        if rest.starts_with("0x") || rest.starts_with("0X") {
            self.offset += 2;
            self.consume_while(|c| c.is_ascii_hexdigit() || c == '_');
            let digits: String = self.input[start + 2..self.offset].replace('_', "");
            let value = i64::from_str_radix(&digits, 16)
                .map_err(|_| parse_error(self.input, start, "invalid hex literal"))?;
            return Ok(SpannedToken {
                token: Token::Int(value),
                position: start,
            });
        }
        let mut is_float = false;
        self.consume_while(|c| c.is_ascii_digit() || c == '_');
        if self.peek_char() == Some('.') && !self.peek_at(1).is_some_and(|c| c == '.') {
            is_float = true;
            self.offset += 1;
            self.consume_while(|c| c.is_ascii_digit() || c == '_');
        }
        if matches!(self.peek_char(), Some('e') | Some('E')) {
            let sign = matches!(self.peek_at(1), Some('+') | Some('-'));
            let digit_at = if sign { 2 } else { 1 };
            if self.peek_at(digit_at).is_some_and(|c| c.is_ascii_digit()) {
                is_float = true;
                self.offset += digit_at;
                self.consume_while(|c| c.is_ascii_digit());
            }
        }
        let text = self.input[start..self.offset].replace('_', "");
        let token = if is_float {
            Token::Float(
                text.parse()
                    .map_err(|_| parse_error(self.input, start, "invalid float literal"))?,
            )
        } else {
            Token::Int(
                text.parse()
                    .map_err(|_| parse_error(self.input, start, "integer literal out of range"))?,
            )
        };
        Ok(SpannedToken {
            token,
            position: start,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<Token> {
        Lexer::new(input)
            .lex()
            .unwrap()
            .into_iter()
            .map(|t| t.token)
            .collect()
    }

    #[test]
    fn test_operators_and_keywords() {
        assert_eq!(
            kinds("a // 2 ** b != not c"),
            vec![
                Token::Ident("a".into()),
                Token::DoubleSlash,
                Token::Int(2),
                Token::DoubleStar,
                Token::Ident("b".into()),
                Token::NotEq,
                Token::Not,
                Token::Ident("c".into()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_numbers() {
        assert_eq!(kinds("1.5 .5 2e3 1_000 0x10")[..5], [
            Token::Float(1.5),
            Token::Float(0.5),
            Token::Float(2000.0),
            Token::Int(1000),
            Token::Int(16),
        ]);
    }

    #[test]
    fn test_strings_and_prefixes() {
        assert_eq!(kinds(r#"'a\n' "b'c" r'\d' f'{x}'"#)[..4], [
            Token::Str("a\n".into()),
            Token::Str("b'c".into()),
            Token::Str("\\d".into()),
            Token::FStr("{x}".into()),
        ]);
        assert_eq!(kinds("'甲乙'")[0], Token::Str("甲乙".into()));
    }

    #[test]
    fn test_unterminated_string_reports_position() {
        let err = Lexer::new("x + 'abc").lex().unwrap_err();
        match err {
            PuzzleError::Parse { position, .. } => assert_eq!(position, 4),
            other => panic!("unexpected {other:?}"),
        }
    }
}
