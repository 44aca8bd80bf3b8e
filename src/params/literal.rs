//! Restricted literal parser for parameter blocks.
//!
//! Accepts JSON plus the relaxations people reach for when typing values by
//! hand: single-quoted strings, bare identifier keys and trailing commas.
//! Nothing is evaluated; identifiers are only legal as mapping keys.

use serde_json::{Map, Number, Value};
use thiserror::Error;

/// Deepest allowed nesting of sequences and mappings
pub const MAX_DEPTH: usize = 128;

/// Syntax error with the byte offset it was detected at
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message} at offset {offset}")]
pub struct LiteralError {
    pub offset: usize,
    pub message: String,
}

/// Parse a complete literal. Trailing non-whitespace is an error.
pub fn parse_literal(src: &str) -> Result<Value, LiteralError> {
    let mut parser = LiteralParser { src, pos: 0, depth: 0 };
    parser.skip_ws();
    let value = parser.parse_value()?;
    parser.skip_ws();
    if parser.pos < src.len() {
        return Err(parser.error("unexpected trailing input"));
    }
    Ok(value)
}

struct LiteralParser<'a> {
    src: &'a str,
    pos: usize,
    depth: usize,
}

impl<'a> LiteralParser<'a> {
    fn error(&self, message: impl Into<String>) -> LiteralError {
        LiteralError {
            offset: self.pos,
            message: message.into(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn expect(&mut self, expected: char) -> Result<(), LiteralError> {
        match self.peek() {
            Some(c) if c == expected => {
                self.pos += c.len_utf8();
                Ok(())
            },
            Some(c) => Err(self.error(format!("expected '{}', found '{}'", expected, c))),
            None => Err(self.error(format!("expected '{}', found end of input", expected))),
        }
    }

    fn skip_ws(&mut self) {
        while let Some(c) = self.peek() {
            if !c.is_whitespace() {
                break;
            }
            self.pos += c.len_utf8();
        }
    }

    fn parse_value(&mut self) -> Result<Value, LiteralError> {
        match self.peek() {
            Some('[') => self.nested(Self::parse_sequence),
            Some('{') => self.nested(Self::parse_mapping),
            Some(q @ ('"' | '\'')) => self.parse_string(q).map(Value::String),
            Some(c) if c == '-' || c == '+' || c == '.' || c.is_ascii_digit() => {
                self.parse_number()
            },
            Some(c) if is_ident_start(c) => {
                let start = self.pos;
                let word = self.parse_identifier();
                match word {
                    "true" => Ok(Value::Bool(true)),
                    "false" => Ok(Value::Bool(false)),
                    "null" => Ok(Value::Null),
                    other => Err(LiteralError {
                        offset: start,
                        message: format!("identifier '{}' is not a literal", other),
                    }),
                }
            },
            Some(c) => Err(self.error(format!("unexpected character '{}'", c))),
            None => Err(self.error("unexpected end of input")),
        }
    }

    fn nested(
        &mut self,
        parse: fn(&mut Self) -> Result<Value, LiteralError>,
    ) -> Result<Value, LiteralError> {
        if self.depth >= MAX_DEPTH {
            return Err(self.error("nesting too deep"));
        }
        self.depth += 1;
        let value = parse(self);
        self.depth -= 1;
        value
    }

    fn parse_sequence(&mut self) -> Result<Value, LiteralError> {
        self.expect('[')?;
        let mut items = Vec::new();
        loop {
            self.skip_ws();
            if self.peek() == Some(']') {
                self.pos += 1;
                return Ok(Value::Array(items));
            }
            items.push(self.parse_value()?);
            self.skip_ws();
            match self.bump() {
                Some(',') => continue,
                Some(']') => return Ok(Value::Array(items)),
                Some(c) => {
                    self.pos -= c.len_utf8();
                    return Err(self.error(format!("expected ',' or ']', found '{}'", c)));
                },
                None => return Err(self.error("unterminated sequence")),
            }
        }
    }

    fn parse_mapping(&mut self) -> Result<Value, LiteralError> {
        self.expect('{')?;
        let mut map = Map::new();
        loop {
            self.skip_ws();
            let key = match self.peek() {
                Some('}') => {
                    self.pos += 1;
                    return Ok(Value::Object(map));
                },
                Some(q @ ('"' | '\'')) => self.parse_string(q)?,
                Some(c) if is_ident_start(c) => self.parse_identifier().to_string(),
                Some(c) => return Err(self.error(format!("expected a key, found '{}'", c))),
                None => return Err(self.error("unterminated mapping")),
            };
            self.skip_ws();
            self.expect(':')?;
            self.skip_ws();
            let value = self.parse_value()?;
            map.insert(key, value);
            self.skip_ws();
            match self.bump() {
                Some(',') => continue,
                Some('}') => return Ok(Value::Object(map)),
                Some(c) => {
                    self.pos -= c.len_utf8();
                    return Err(self.error(format!("expected ',' or '}}', found '{}'", c)));
                },
                None => return Err(self.error("unterminated mapping")),
            }
        }
    }

    fn parse_identifier(&mut self) -> &'a str {
        let src = self.src;
        let start = self.pos;
        while let Some(c) = self.peek() {
            if !is_ident_continue(c) {
                break;
            }
            self.pos += c.len_utf8();
        }
        &src[start..self.pos]
    }

    fn parse_string(&mut self, quote: char) -> Result<String, LiteralError> {
        let start = self.pos;
        self.expect(quote)?;
        let mut out = String::new();
        loop {
            let c = match self.bump() {
                Some(c) => c,
                None => {
                    return Err(LiteralError {
                        offset: start,
                        message: "unterminated string".into(),
                    })
                },
            };
            if c == quote {
                return Ok(out);
            }
            if c != '\\' {
                out.push(c);
                continue;
            }
            let escape_at = self.pos - 1;
            match self.bump() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some('r') => out.push('\r'),
                Some('b') => out.push('\u{0008}'),
                Some('f') => out.push('\u{000C}'),
                Some('0') => out.push('\0'),
                Some('u') => out.push(self.parse_unicode_escape(escape_at)?),
                Some(c @ ('\\' | '/' | '\'' | '"')) => out.push(c),
                Some(c) => {
                    return Err(LiteralError {
                        offset: escape_at,
                        message: format!("unknown escape '\\{}'", c),
                    })
                },
                None => {
                    return Err(LiteralError {
                        offset: start,
                        message: "unterminated string".into(),
                    })
                },
            }
        }
    }

    fn parse_unicode_escape(&mut self, escape_at: usize) -> Result<char, LiteralError> {
        let invalid = || LiteralError {
            offset: escape_at,
            message: "invalid \\u escape".into(),
        };
        let hex = self.src.get(self.pos..self.pos + 4).ok_or_else(invalid)?;
        let code = u32::from_str_radix(hex, 16).map_err(|_| invalid())?;
        self.pos += 4;

        // Surrogate pairs arrive as two consecutive escapes.
        if (0xD800..0xDC00).contains(&code) {
            let low = self
                .src
                .get(self.pos..self.pos + 6)
                .and_then(|s| s.strip_prefix("\\u"))
                .and_then(|h| u32::from_str_radix(h, 16).ok())
                .filter(|low| (0xDC00..0xE000).contains(low))
                .ok_or_else(invalid)?;
            self.pos += 6;
            let combined = 0x10000 + ((code - 0xD800) << 10) + (low - 0xDC00);
            return char::from_u32(combined).ok_or_else(invalid);
        }
        char::from_u32(code).ok_or_else(invalid)
    }

    fn parse_number(&mut self) -> Result<Value, LiteralError> {
        let start = self.pos;
        if matches!(self.peek(), Some('-' | '+')) {
            self.pos += 1;
        }
        let mut digits = 0;
        let mut is_float = false;
        while let Some(c) = self.peek() {
            match c {
                '0'..='9' => digits += 1,
                '.' if !is_float => is_float = true,
                'e' | 'E' => {
                    is_float = true;
                    self.pos += 1;
                    if matches!(self.peek(), Some('-' | '+')) {
                        self.pos += 1;
                    }
                    continue;
                },
                _ => break,
            }
            self.pos += 1;
        }
        if digits == 0 {
            return Err(LiteralError {
                offset: start,
                message: "malformed number".into(),
            });
        }

        let text = self.src[start..self.pos].trim_start_matches('+');
        if !is_float {
            if let Ok(n) = text.parse::<i64>() {
                return Ok(Value::Number(n.into()));
            }
        }
        text.parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| LiteralError {
                offset: start,
                message: format!("malformed number '{}'", text),
            })
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '$'
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$'
}
