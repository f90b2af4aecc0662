use std::fmt;

use serde::{Deserialize, Serialize};

mod extract;
mod parsers;
mod scanner;
mod typing;

pub use extract::{ExtractedValue, Extraction, extract};
pub use typing::{TypedQuery, ValueClass, classify, type_values};

use parsers::{
    is_block_comment_end, is_block_comment_start, is_line_comment_start, is_quote,
    starts_with_at,
};
use scanner::{State, scan_quoted};

/// Placeholder substituted for every extracted literal.
pub const PLACEHOLDER: &str = "?";

/// Opening and closing tokens that mark an embeddable literal in a SQL template.
///
/// Serializes as a two-element array, e.g. `["<%", "%>"]`.
///
/// ```rust
/// use sql_stencil::prelude::*;
///
/// let pair = DelimiterPair::new("<%", "%>");
/// assert_eq!(pair.wrap("42"), "<%42%>");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(String, String)", into = "(String, String)")]
pub struct DelimiterPair {
    pub open: String,
    pub close: String,
}

impl DelimiterPair {
    #[must_use]
    pub fn new(open: impl Into<String>, close: impl Into<String>) -> Self {
        Self {
            open: open.into(),
            close: close.into(),
        }
    }

    /// Surround `inner` with this pair.
    #[must_use]
    pub fn wrap(&self, inner: &str) -> String {
        let mut out = String::with_capacity(self.open.len() + inner.len() + self.close.len());
        out.push_str(&self.open);
        out.push_str(inner);
        out.push_str(&self.close);
        out
    }

    /// The text between the pair when `value` is enclosed by it, else `None`.
    #[must_use]
    pub fn unwrap_enclosed<'a>(&self, value: &'a str) -> Option<&'a str> {
        if value.len() < self.open.len() + self.close.len() {
            return None;
        }
        value
            .strip_prefix(self.open.as_str())
            .and_then(|rest| rest.strip_suffix(self.close.as_str()))
    }

    /// Both tokens must be non-empty and distinct, otherwise scanning never progresses.
    pub(crate) fn is_usable(&self) -> bool {
        !self.open.is_empty() && !self.close.is_empty() && self.open != self.close
    }
}

impl Default for DelimiterPair {
    fn default() -> Self {
        Self::new("<%", "%>")
    }
}

impl From<(String, String)> for DelimiterPair {
    fn from((open, close): (String, String)) -> Self {
        Self { open, close }
    }
}

impl From<DelimiterPair> for (String, String) {
    fn from(pair: DelimiterPair) -> Self {
        (pair.open, pair.close)
    }
}

impl fmt::Display for DelimiterPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}…{}", self.open, self.close)
    }
}

/// Strip `--`, `#` and `/* */` comments and collapse whitespace runs to one space.
///
/// Quoted strings, backtick identifiers and template spans opened by `delimiters` are copied
/// verbatim, so literal values keep their exact text.
#[must_use]
pub fn normalize_sql(sql: &str, delimiters: &DelimiterPair) -> String {
    let bytes = sql.as_bytes();
    let open = delimiters.open.as_bytes();
    let close = delimiters.close.as_bytes();

    let mut out: Vec<u8> = Vec::with_capacity(bytes.len());
    let mut pending_space = false;
    let mut state = State::Normal;
    let mut idx = 0;

    let flush_space = |out: &mut Vec<u8>, pending: &mut bool| {
        if *pending && !out.is_empty() {
            out.push(b' ');
        }
        *pending = false;
    };

    while idx < bytes.len() {
        match state {
            State::Normal => {
                let b = bytes[idx];
                if starts_with_at(bytes, idx, open) {
                    flush_space(&mut out, &mut pending_space);
                    out.extend_from_slice(open);
                    idx += open.len();
                    state = State::Template;
                } else if is_quote(b) {
                    flush_space(&mut out, &mut pending_space);
                    let len = scan_quoted(bytes, idx);
                    out.extend_from_slice(&bytes[idx..idx + len]);
                    idx += len;
                } else if is_line_comment_start(bytes, idx) {
                    state = State::LineComment;
                    idx += 1;
                } else if is_block_comment_start(bytes, idx) {
                    state = State::BlockComment(1);
                    idx += 2;
                } else if b.is_ascii_whitespace() {
                    pending_space = true;
                    idx += 1;
                } else {
                    flush_space(&mut out, &mut pending_space);
                    out.push(b);
                    idx += 1;
                }
            }
            State::Template => {
                if starts_with_at(bytes, idx, close) {
                    out.extend_from_slice(close);
                    idx += close.len();
                    state = State::Normal;
                } else {
                    out.push(bytes[idx]);
                    idx += 1;
                }
            }
            State::LineComment => {
                if bytes[idx] == b'\n' {
                    state = State::Normal;
                    pending_space = true;
                }
                idx += 1;
            }
            State::BlockComment(depth) => {
                if is_block_comment_start(bytes, idx) {
                    state = State::BlockComment(depth + 1);
                    idx += 2;
                } else if is_block_comment_end(bytes, idx) {
                    if depth == 1 {
                        state = State::Normal;
                        pending_space = true;
                    } else {
                        state = State::BlockComment(depth - 1);
                    }
                    idx += 2;
                } else {
                    idx += 1;
                }
            }
        }
    }

    // Only ASCII bytes are ever dropped, so the output stays valid UTF-8.
    String::from_utf8_lossy(&out).into_owned()
}
