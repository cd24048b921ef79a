//! Session engine: one evaluator connection, at most one in-flight
//! request.

pub mod engine;

pub use engine::{EvalHandle, ReplSession, OOB_INTERRUPT};
