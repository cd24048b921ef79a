//! Request encoding: sentinels, module contexts, and evaluation request
//! lines.
//!
//! Every request occupies exactly one `\n`-terminated line on the wire.
//! String arguments are escaped so that embedded quotes or newlines can
//! never break the line framing.

use std::fmt::{Display, Formatter};

use uuid::Uuid;

use crate::{AppError, Result};

/// Per-request unique token delimiting one response frame within the shared
/// byte stream.
///
/// Rendered as the 36-character hyphenated form of a freshly generated
/// 128-bit UUID, which is exactly the shape the response framing scans for.
/// A sentinel is never reused within a session's lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sentinel(String);

impl Sentinel {
    /// Generate a fresh sentinel.
    #[must_use]
    pub fn fresh() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// The sentinel token text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Sentinel {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Evaluation context for a request: the evaluator's top level or a named
/// module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleRef {
    /// Evaluate at the evaluator's top level.
    TopLevel,
    /// Evaluate inside the named module.
    Named(String),
}

impl ModuleRef {
    /// Serialize for the wire: `#f` for the top level, a quoted symbol for
    /// a named module.
    #[must_use]
    pub fn encode(&self) -> String {
        match self {
            Self::TopLevel => "#f".into(),
            Self::Named(name) => format!("'{name}"),
        }
    }

    /// Decode a wire designator back into a `ModuleRef`.
    ///
    /// Accepts `#f`, a quoted symbol, or a bare symbol.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Decode` if the designator is empty or names an
    /// empty module.
    pub fn decode(text: &str) -> Result<Self> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(AppError::Decode("empty module designator".into()));
        }
        if trimmed == "#f" {
            return Ok(Self::TopLevel);
        }
        let name = trimmed.strip_prefix('\'').unwrap_or(trimmed);
        if name.is_empty() {
            return Err(AppError::Decode("empty module name after quote".into()));
        }
        Ok(Self::Named(name.to_owned()))
    }
}

impl Display for ModuleRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TopLevel => write!(f, "top level"),
            Self::Named(name) => write!(f, "{name}"),
        }
    }
}

/// Escape a string for embedding in a double-quoted wire literal.
///
/// Escapes backslash, double quote, and the control characters that would
/// otherwise break the one-line request framing.
#[must_use]
pub fn escape_string(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            other => out.push(other),
        }
    }
    out
}

/// Encode a normal evaluation request line.
///
/// The expression is evaluated through the evaluator's string-evaluation
/// entry point together with the request's standard input and module
/// context, all wrapped in the sentinel-tagging primitive.
#[must_use]
pub fn encode_eval(sentinel: &Sentinel, expr: &str, stdin: &str, module: &ModuleRef) -> String {
    format!(
        "(eval/sentinel {sentinel} (eval-string/input-string \"{}\" \"{}\" {}))\n",
        escape_string(expr),
        escape_string(stdin),
        module.encode(),
    )
}

/// Encode an init-phase request line: the expression is passed to the
/// sentinel-tagging primitive verbatim, without the string-evaluation
/// wrapper.
#[must_use]
pub fn encode_init(sentinel: &Sentinel, expr: &str) -> String {
    format!("(eval/sentinel {sentinel} {expr})\n")
}
