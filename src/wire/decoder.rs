//! Result payload decoding.
//!
//! A framed response payload is the textual serialization, in the
//! evaluator's own data notation, of a 3-element structure: the ordered
//! rendered values, captured stdout, and captured stderr. The reader here
//! supports nested lists, strings with escape sequences, numbers, booleans,
//! and symbols losslessly enough for display.
//!
//! Malformed payloads never crash and never leave the caller waiting: they
//! decode to [`EvalOutcome::DecodeFailed`] carrying the raw payload and the
//! failure reason.

use std::fmt::{Display, Formatter};

use crate::wire::request::escape_string;
use crate::{AppError, Result};

/// One datum of the evaluator's data notation.
#[derive(Debug, Clone, PartialEq)]
pub enum Datum {
    /// A parenthesized sequence of data.
    List(Vec<Datum>),
    /// A double-quoted string, unescaped.
    Str(String),
    /// A bare symbol.
    Sym(String),
    /// A numeric literal, kept as its original lexeme.
    Num(String),
    /// `#t` or `#f`.
    Bool(bool),
}

impl Datum {
    /// Text suitable for display: string content unquoted, everything else
    /// in its written form.
    #[must_use]
    pub fn display_text(&self) -> String {
        match self {
            Self::Str(content) => content.clone(),
            other => other.to_string(),
        }
    }
}

impl Display for Datum {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::List(items) => {
                write!(f, "(")?;
                for (idx, item) in items.iter().enumerate() {
                    if idx > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, ")")
            }
            Self::Str(content) => write!(f, "\"{}\"", escape_string(content)),
            Self::Sym(name) => write!(f, "{name}"),
            Self::Num(lexeme) => write!(f, "{lexeme}"),
            Self::Bool(true) => write!(f, "#t"),
            Self::Bool(false) => write!(f, "#f"),
        }
    }
}

/// Structured result of one evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EvalResult {
    /// Rendered text of each value produced, in order.
    pub values: Vec<String>,
    /// Output captured on the evaluator's standard output.
    pub stdout: String,
    /// Output captured on the evaluator's standard error, including
    /// evaluator-reported runtime errors.
    pub stderr: String,
}

/// Terminal outcome of one submitted request.
#[derive(Debug, Clone, PartialEq)]
pub enum EvalOutcome {
    /// The response frame arrived and decoded cleanly.
    Completed(EvalResult),
    /// The response frame arrived but its payload did not parse.
    DecodeFailed {
        /// The raw payload text as received.
        raw: String,
        /// Why decoding failed.
        reason: String,
    },
    /// The request was cancelled before a frame arrived.
    Cancelled,
}

/// How a completed frame's payload is decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    /// The 3-element (values, stdout, stderr) structure.
    Structured,
    /// Legacy plain framing: the payload is the printed result text itself.
    PlainText,
}

/// Decode a completed frame's payload into an outcome.
///
/// Never fails: a payload that does not parse yields
/// [`EvalOutcome::DecodeFailed`] so the pending completion is always
/// resolved.
#[must_use]
pub fn decode_payload(kind: PayloadKind, payload: &[u8]) -> EvalOutcome {
    let text = String::from_utf8_lossy(payload);
    match kind {
        PayloadKind::PlainText => EvalOutcome::Completed(EvalResult {
            values: vec![text.into_owned()],
            stdout: String::new(),
            stderr: String::new(),
        }),
        PayloadKind::Structured => match decode_result(&text) {
            Ok(result) => EvalOutcome::Completed(result),
            Err(err) => EvalOutcome::DecodeFailed {
                raw: text.into_owned(),
                reason: err.to_string(),
            },
        },
    }
}

/// Decode a structured payload into an [`EvalResult`].
///
/// # Errors
///
/// Returns `AppError::Decode` if the payload is not a 3-element list, if
/// the values field is not a list, or if stdout/stderr are not strings.
pub fn decode_result(payload: &str) -> Result<EvalResult> {
    let datum = parse_datum(payload)?;
    let Datum::List(items) = datum else {
        return Err(AppError::Decode("payload is not a list".into()));
    };
    let [values, stdout, stderr] = <[Datum; 3]>::try_from(items)
        .map_err(|items| AppError::Decode(format!("expected 3 payload fields, got {}", items.len())))?;

    let Datum::List(values) = values else {
        return Err(AppError::Decode("values field is not a list".into()));
    };
    let Datum::Str(stdout) = stdout else {
        return Err(AppError::Decode("stdout field is not a string".into()));
    };
    let Datum::Str(stderr) = stderr else {
        return Err(AppError::Decode("stderr field is not a string".into()));
    };

    Ok(EvalResult {
        values: values.into_iter().map(|v| v.display_text()).collect(),
        stdout,
        stderr,
    })
}

/// Parse exactly one datum from `text`, allowing surrounding whitespace.
///
/// # Errors
///
/// Returns `AppError::Decode` on unbalanced parentheses, unterminated
/// strings, or trailing data after the datum.
pub fn parse_datum(text: &str) -> Result<Datum> {
    let mut reader = Reader { rest: text };
    let datum = reader.read_datum()?;
    reader.skip_whitespace();
    if reader.rest.is_empty() {
        Ok(datum)
    } else {
        Err(AppError::Decode(format!(
            "trailing data after payload: {:?}",
            truncate(reader.rest, 32)
        )))
    }
}

// ── Private reader ───────────────────────────────────────────────────────────

struct Reader<'a> {
    rest: &'a str,
}

impl Reader<'_> {
    fn peek(&self) -> Option<char> {
        self.rest.chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.rest = &self.rest[ch.len_utf8()..];
        Some(ch)
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn read_datum(&mut self) -> Result<Datum> {
        self.skip_whitespace();
        match self.peek() {
            None => Err(AppError::Decode("unexpected end of payload".into())),
            Some('(') => self.read_list(),
            Some(')') => Err(AppError::Decode("unbalanced ')'".into())),
            Some('"') => self.read_string().map(Datum::Str),
            Some('\'') => {
                self.bump();
                let inner = self.read_datum()?;
                Ok(Datum::List(vec![Datum::Sym("quote".into()), inner]))
            }
            Some(_) => self.read_atom(),
        }
    }

    fn read_list(&mut self) -> Result<Datum> {
        self.bump();
        let mut items = Vec::new();
        loop {
            self.skip_whitespace();
            match self.peek() {
                None => return Err(AppError::Decode("unterminated list".into())),
                Some(')') => {
                    self.bump();
                    return Ok(Datum::List(items));
                }
                Some(_) => items.push(self.read_datum()?),
            }
        }
    }

    fn read_string(&mut self) -> Result<String> {
        self.bump();
        let mut out = String::new();
        loop {
            match self.bump() {
                None => return Err(AppError::Decode("unterminated string".into())),
                Some('"') => return Ok(out),
                Some('\\') => match self.bump() {
                    None => return Err(AppError::Decode("unterminated escape".into())),
                    Some('n') => out.push('\n'),
                    Some('r') => out.push('\r'),
                    Some('t') => out.push('\t'),
                    Some(other) => out.push(other),
                },
                Some(ch) => out.push(ch),
            }
        }
    }

    fn read_atom(&mut self) -> Result<Datum> {
        let mut token = String::new();
        while let Some(ch) = self.peek() {
            if ch.is_whitespace() || matches!(ch, '(' | ')' | '"' | '\'') {
                break;
            }
            token.push(ch);
            self.bump();
        }
        if token.is_empty() {
            return Err(AppError::Decode("empty atom".into()));
        }
        Ok(classify_atom(token))
    }
}

fn classify_atom(token: String) -> Datum {
    match token.as_str() {
        "#t" | "#true" => return Datum::Bool(true),
        "#f" | "#false" => return Datum::Bool(false),
        _ => {}
    }

    let mut chars = token.chars();
    let leading_digit = match chars.next() {
        Some(first) if first.is_ascii_digit() => true,
        Some('+' | '-' | '.') => chars.next().is_some_and(|c| c.is_ascii_digit()),
        _ => false,
    };
    if leading_digit {
        Datum::Num(token)
    } else {
        Datum::Sym(token)
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
