//! Prefix completion over an evaluator session.
//!
//! Reuses the ordinary submit/cancel path with a prefix-search expression
//! and decodes the returned candidate list with its own decoder. Ranking
//! is shortest-first, ties alphabetical.

use tracing::debug;

use crate::session::ReplSession;
use crate::wire::decoder::{parse_datum, Datum, EvalOutcome};
use crate::wire::request::escape_string;
use crate::{AppError, Result};

/// Fetch ranked completion candidates for `prefix`.
///
/// # Errors
///
/// Returns `AppError::Busy` or `AppError::Transport` from the submit
/// path, or `AppError::Decode` when the evaluator's candidate list does
/// not parse. A cancelled request yields an empty candidate list.
pub async fn completions(session: &ReplSession, prefix: &str) -> Result<Vec<String>> {
    let expr = completion_expr(prefix);
    let outcome = session.submit_init(&expr).await?.wait().await?;

    match outcome {
        EvalOutcome::Completed(result) => {
            let raw = result.values.into_iter().next().ok_or_else(|| {
                AppError::Decode("completion response carried no value".into())
            })?;
            let mut candidates = decode_candidates(&raw)?;
            rank_candidates(&mut candidates);
            debug!(count = candidates.len(), "completion candidates decoded");
            Ok(candidates)
        }
        EvalOutcome::DecodeFailed { reason, .. } => Err(AppError::Decode(format!(
            "completion response did not decode: {reason}"
        ))),
        EvalOutcome::Cancelled => Ok(Vec::new()),
    }
}

/// The prefix-search expression submitted to the evaluator.
#[must_use]
pub fn completion_expr(prefix: &str) -> String {
    format!("(complete/prefix \"{}\")", escape_string(prefix))
}

/// Decode a candidate list: a sequence of strings or symbols.
///
/// # Errors
///
/// Returns `AppError::Decode` if the value is not a list or contains a
/// datum that is neither a string nor a symbol.
pub fn decode_candidates(raw: &str) -> Result<Vec<String>> {
    let datum = parse_datum(raw)?;
    let Datum::List(items) = datum else {
        return Err(AppError::Decode("candidate list is not a list".into()));
    };

    items
        .into_iter()
        .map(|item| match item {
            Datum::Str(text) | Datum::Sym(text) => Ok(text),
            other => Err(AppError::Decode(format!(
                "unexpected candidate datum: {other}"
            ))),
        })
        .collect()
}

/// Rank candidates shortest-first, ties alphabetical, duplicates removed.
pub fn rank_candidates(candidates: &mut Vec<String>) {
    candidates.sort_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));
    candidates.dedup();
}
