#![forbid(unsafe_code)]

//! `replwire` — client engine for driving an interactive session with a
//! long-running external evaluator over a byte stream.
//!
//! The core is the streaming transport, response framing, and session-state
//! engine: spawn or connect to an evaluator, discover its dynamically chosen
//! port from early process output, tag each request with a unique sentinel,
//! scan the arbitrarily-chunked receive stream for the framed response, and
//! decode it into a structured result. Cancellation is best-effort and
//! mid-flight: the session commits to idle immediately and stale frames for
//! an old sentinel are discarded.

pub mod complete;
pub mod config;
pub mod errors;
pub mod resolver;
pub mod session;
pub mod transport;
pub mod wire;

pub use config::GlobalConfig;
pub use errors::{AppError, Result};
pub use session::{EvalHandle, ReplSession};
pub use wire::decoder::{EvalOutcome, EvalResult};
pub use wire::request::ModuleRef;
