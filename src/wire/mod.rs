//! Wire protocol for the evaluator byte stream.
//!
//! The evaluator emits continuous text on one channel: prompts, side-effect
//! output, and framed responses. Submodules:
//! - `request`: sentinel generation, module-context serialization, and
//!   request-line encoding.
//! - `framing`: incremental begin/end-marker scanning over the accumulated
//!   receive buffer, tolerant of chunk boundaries falling anywhere.
//! - `decoder`: the evaluator's s-expression data notation, decoded into a
//!   typed (values, stdout, stderr) result.

pub mod decoder;
pub mod framing;
pub mod request;
