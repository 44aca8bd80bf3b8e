//! Query parameter blocks embedded in SQL comments
//!
//! A query file can carry its bind values inside a block comment, written as a
//! fenced code block tagged `params`:
//!
//! ````text
//! /*
//! ```params
//! ['2024-01-01', 42, true]
//! ```
//! */
//! SELECT * FROM events WHERE day = ? AND shard = ? AND active = ?
//! ````
//!
//! A sequence binds positionally, a mapping binds by name. Every block comment
//! is stripped from the query that gets executed.

pub mod literal;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{BenchError, Result};

pub use literal::{parse_literal, LiteralError};

/// Fence tag that marks a parameter block
const PARAMS_FENCE: &str = "```params";
const FENCE: &str = "```";

/// Bind values for one query
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum QueryParams {
    /// Values bound to `?` placeholders in order
    Positional(Vec<Value>),
    /// Values bound to `:name` placeholders
    Named(Map<String, Value>),
}

impl QueryParams {
    pub fn len(&self) -> usize {
        match self {
            QueryParams::Positional(values) => values.len(),
            QueryParams::Named(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn kind(&self) -> &'static str {
        match self {
            QueryParams::Positional(_) => "positional",
            QueryParams::Named(_) => "named",
        }
    }

    /// Fold another block into this one, keeping encounter order.
    fn merge(self, next: QueryParams) -> std::result::Result<QueryParams, QueryParams> {
        match (self, next) {
            (QueryParams::Positional(mut acc), QueryParams::Positional(more)) => {
                acc.extend(more);
                Ok(QueryParams::Positional(acc))
            },
            (QueryParams::Named(mut acc), QueryParams::Named(more)) => {
                acc.extend(more);
                Ok(QueryParams::Named(acc))
            },
            (_, rejected) => Err(rejected),
        }
    }
}

/// A query with its parameter blocks resolved
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedQuery {
    /// The SQL with every block comment removed
    pub clean_query: String,
    /// `None` when the file has no parameter block at all
    pub params: Option<QueryParams>,
}

/// Strip block comments from `sql` and collect the parameter blocks inside them.
pub fn extract_query_parameters(sql: &str) -> Result<ParsedQuery> {
    let mut clean_query = String::with_capacity(sql.len());
    let mut params: Option<QueryParams> = None;

    let mut copied_to = 0;
    for (start, end) in block_comments(sql) {
        clean_query.push_str(&sql[copied_to..start]);
        copied_to = end;

        let body = &sql[start + 2..end - 2];
        for block in params_blocks(body) {
            let parsed = parse_params_block(block)?;
            params = match params {
                None => Some(parsed),
                Some(acc) => {
                    let acc_kind = acc.kind();
                    Some(acc.merge(parsed).map_err(|rejected| {
                        BenchError::InvalidParameterShape(format!(
                            "{} block cannot be combined with {} parameters:\n---\n{}",
                            rejected.kind(),
                            acc_kind,
                            block.trim()
                        ))
                    })?)
                },
            };
        }
    }
    clean_query.push_str(&sql[copied_to..]);

    Ok(ParsedQuery {
        clean_query,
        params,
    })
}

fn parse_params_block(block: &str) -> Result<QueryParams> {
    let value = parse_literal(block).map_err(|e| BenchError::ParameterSyntax {
        offset: e.offset,
        message: format!("{}\n---\n{}", e.message, block.trim()),
    })?;
    match value {
        Value::Array(values) => Ok(QueryParams::Positional(values)),
        Value::Object(values) => Ok(QueryParams::Named(values)),
        other => Err(BenchError::InvalidParameterShape(format!(
            "expected a sequence or mapping, got {}:\n---\n{}",
            other,
            block.trim()
        ))),
    }
}

/// Byte ranges of `/* ... */` comments, delimiters included.
///
/// Comment openers inside string literals, quoted identifiers and `--` line
/// comments are ignored. An unterminated comment is left alone.
fn block_comments(sql: &str) -> Vec<(usize, usize)> {
    let bytes = sql.as_bytes();
    let mut ranges = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\'' | b'"' => {
                i = end_of_quoted(bytes, i);
            },
            b'-' if bytes.get(i + 1) == Some(&b'-') => {
                i = skip_past(bytes, i + 2, b'\n');
            },
            b'/' if bytes.get(i + 1) == Some(&b'*') => match sql[i + 2..].find("*/") {
                Some(offset) => {
                    let end = i + 2 + offset + 2;
                    ranges.push((i, end));
                    i = end;
                },
                None => break,
            },
            _ => i += 1,
        }
    }
    ranges
}

/// Index just past the quote closing the literal opened at `open`.
///
/// A doubled quote stays inside the literal. Inside single quotes a backslash
/// also escapes the byte after it.
pub(crate) fn end_of_quoted(bytes: &[u8], open: usize) -> usize {
    let quote = bytes[open];
    let mut at = open + 1;
    while at < bytes.len() {
        match bytes[at] {
            b'\\' if quote == b'\'' => at += 2,
            b if b == quote => {
                if bytes.get(at + 1) != Some(&quote) {
                    return at + 1;
                }
                at += 2;
            },
            _ => at += 1,
        }
    }
    bytes.len()
}

/// Index just past the next `stop` byte at or after `from`.
fn skip_past(bytes: &[u8], from: usize, stop: u8) -> usize {
    bytes[from.min(bytes.len())..]
        .iter()
        .position(|&b| b == stop)
        .map_or(bytes.len(), |p| from + p + 1)
}

/// Bodies of the fenced `params` blocks inside one comment.
fn params_blocks(comment: &str) -> Vec<&str> {
    let mut blocks = Vec::new();
    let mut rest = comment;
    while let Some(open) = rest.find(PARAMS_FENCE) {
        let after_tag = &rest[open + PARAMS_FENCE.len()..];
        // ```paramsfoo is some other fence
        if !after_tag.starts_with(char::is_whitespace) {
            rest = after_tag;
            continue;
        }
        match after_tag.find(FENCE) {
            Some(close) => {
                blocks.push(&after_tag[..close]);
                rest = &after_tag[close + FENCE.len()..];
            },
            None => {
                log::warn!("Ignoring unterminated ```params block");
                break;
            },
        }
    }
    blocks
}
