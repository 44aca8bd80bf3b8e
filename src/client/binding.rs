//! Placeholder rewriting
//!
//! Query files use `?` for positional values and `:name` for named values.
//! The PostgreSQL wire protocol wants `$1, $2, ...`, so placeholders are
//! rewritten before the statement is prepared. Quoted strings, quoted
//! identifiers and comments are copied verbatim, `::type` casts are left alone,
//! and `\?` / `\:` produce a literal `?` / `:`.

use std::collections::HashMap;

use serde_json::Value;

use crate::error::GatewayError;
use crate::params::{end_of_quoted, QueryParams};

/// Statement text with `$n` placeholders and the values in slot order
#[derive(Debug, Clone, PartialEq)]
pub struct BoundStatement {
    pub sql: String,
    pub values: Vec<Value>,
}

pub fn bind(sql: &str, params: &QueryParams) -> Result<BoundStatement, GatewayError> {
    let mut binder = Binder {
        src: sql,
        out: String::with_capacity(sql.len() + 8),
        values: Vec::new(),
        named_slots: HashMap::new(),
    };

    match params {
        QueryParams::Positional(values) => {
            let mut next = values.iter();
            let mut seen = 0usize;
            binder.rewrite(|b, placeholder| match placeholder {
                Placeholder::Question => {
                    seen += 1;
                    if let Some(value) = next.next() {
                        b.values.push(value.clone());
                    }
                    Ok(Some(format!("${}", seen)))
                },
                Placeholder::Named(_) => Ok(None),
            })?;
            if seen != values.len() {
                return Err(GatewayError::Binding(format!(
                    "statement has {} placeholder(s) but {} value(s) were given",
                    seen,
                    values.len()
                )));
            }
        },
        QueryParams::Named(values) => {
            binder.rewrite(|b, placeholder| match placeholder {
                Placeholder::Question => Ok(None),
                Placeholder::Named(name) => {
                    if let Some(slot) = b.named_slots.get(name) {
                        return Ok(Some(format!("${}", slot)));
                    }
                    let value = values.get(name).ok_or_else(|| {
                        GatewayError::Binding(format!("no value for named parameter ':{}'", name))
                    })?;
                    b.values.push(value.clone());
                    let slot = b.values.len();
                    b.named_slots.insert(name.to_string(), slot);
                    Ok(Some(format!("${}", slot)))
                },
            })?;
        },
    }

    Ok(BoundStatement {
        sql: binder.out,
        values: binder.values,
    })
}

enum Placeholder<'a> {
    Question,
    Named(&'a str),
}

struct Binder<'a> {
    src: &'a str,
    out: String,
    values: Vec<Value>,
    named_slots: HashMap<String, usize>,
}

impl<'a> Binder<'a> {
    /// Walk the statement, asking `replace` what to emit for each placeholder.
    /// `Ok(None)` keeps the original text.
    fn rewrite<F>(&mut self, mut replace: F) -> Result<(), GatewayError>
    where
        F: FnMut(&mut Self, Placeholder<'a>) -> Result<Option<String>, GatewayError>,
    {
        let src = self.src;
        let bytes = src.as_bytes();
        let mut i = 0;
        let mut copied_to = 0;

        while i < bytes.len() {
            match bytes[i] {
                b'\'' | b'"' => {
                    i = end_of_quoted(bytes, i);
                },
                b'-' if bytes.get(i + 1) == Some(&b'-') => {
                    i = skip_past(bytes, i + 2, |b, at| b[at] == b'\n');
                },
                b'/' if bytes.get(i + 1) == Some(&b'*') => {
                    let body = i + 2;
                    i = skip_past(bytes, body, |b, at| {
                        at > body && b[at - 1] == b'*' && b[at] == b'/'
                    });
                },
                b'\\' if matches!(bytes.get(i + 1), Some(b'?' | b':')) => {
                    self.out.push_str(&src[copied_to..i]);
                    copied_to = i + 1;
                    i += 2;
                },
                b':' if bytes.get(i + 1) == Some(&b':') => {
                    i += 2;
                },
                b'?' => {
                    if let Some(text) = replace(self, Placeholder::Question)? {
                        self.out.push_str(&src[copied_to..i]);
                        self.out.push_str(&text);
                        copied_to = i + 1;
                    }
                    i += 1;
                },
                b':' if bytes.get(i + 1).map_or(false, |&b| is_name_start(b)) => {
                    let start = i + 1;
                    let end = bytes[start..]
                        .iter()
                        .position(|&b| !is_name_continue(b))
                        .map_or(bytes.len(), |p| start + p);
                    if let Some(text) = replace(self, Placeholder::Named(&src[start..end]))? {
                        self.out.push_str(&src[copied_to..i]);
                        self.out.push_str(&text);
                        copied_to = end;
                    }
                    i = end;
                },
                _ => i += 1,
            }
        }
        self.out.push_str(&src[copied_to..]);
        Ok(())
    }
}

/// Index just past the first position at or after `from` where `done` holds.
fn skip_past(bytes: &[u8], from: usize, done: impl Fn(&[u8], usize) -> bool) -> usize {
    (from..bytes.len())
        .find(|&at| done(bytes, at))
        .map_or(bytes.len(), |at| at + 1)
}

fn is_name_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

fn is_name_continue(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map};

    fn positional(values: Value) -> QueryParams {
        match values {
            Value::Array(v) => QueryParams::Positional(v),
            _ => unreachable!(),
        }
    }

    fn named(values: Value) -> QueryParams {
        match values {
            Value::Object(v) => QueryParams::Named(v),
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_positional_rewrite() {
        let bound = bind(
            "SELECT * FROM t WHERE a = ? AND b > ?",
            &positional(json!([1, "x"])),
        )
        .unwrap();
        assert_eq!(bound.sql, "SELECT * FROM t WHERE a = $1 AND b > $2");
        assert_eq!(bound.values, vec![json!(1), json!("x")]);
    }

    #[test]
    fn test_skips_strings_comments_and_escapes() {
        let sql = "SELECT '?', \"col?\", a::int -- why?\n/* really? */ FROM t WHERE j \\? 'k' AND b = ?";
        let bound = bind(sql, &positional(json!([5]))).unwrap();
        assert_eq!(
            bound.sql,
            "SELECT '?', \"col?\", a::int -- why?\n/* really? */ FROM t WHERE j ? 'k' AND b = $1"
        );
    }

    #[test]
    fn test_escaped_quotes_keep_placeholders_inside_strings() {
        let sql = "SELECT 'it\\'s ?', 'O''Reilly?', \"a\"\"?\" FROM t WHERE b = ?";
        let bound = bind(sql, &positional(json!([7]))).unwrap();
        assert_eq!(
            bound.sql,
            "SELECT 'it\\'s ?', 'O''Reilly?', \"a\"\"?\" FROM t WHERE b = $1"
        );
        assert_eq!(bound.values, vec![json!(7)]);
    }

    #[test]
    fn test_positional_count_mismatch() {
        let err = bind("SELECT ?, ?", &positional(json!([1]))).unwrap_err();
        assert!(matches!(err, GatewayError::Binding(_)));

        let err = bind("SELECT ?", &positional(json!([1, 2]))).unwrap_err();
        assert!(err.to_string().contains("1 placeholder(s) but 2 value(s)"));
    }

    #[test]
    fn test_named_rewrite_reuses_slots() {
        let bound = bind(
            "SELECT :day::date, :limit, :day FROM t WHERE c = ':day'",
            &named(json!({"day": "2024-01-01", "limit": 10, "unused": true})),
        )
        .unwrap();
        assert_eq!(
            bound.sql,
            "SELECT $1::date, $2, $1 FROM t WHERE c = ':day'"
        );
        assert_eq!(bound.values, vec![json!("2024-01-01"), json!(10)]);
    }

    #[test]
    fn test_named_missing_value() {
        let err = bind("SELECT :missing", &QueryParams::Named(Map::new())).unwrap_err();
        assert!(err.to_string().contains(":missing"));
    }

    #[test]
    fn test_named_mode_leaves_question_marks() {
        let bound = bind("SELECT ?, :a", &named(json!({"a": 1}))).unwrap();
        assert_eq!(bound.sql, "SELECT ?, $1");
    }
}
