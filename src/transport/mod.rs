//! Byte-stream transport to the evaluator.
//!
//! A [`connection::Connection`] either spawns a local evaluator process
//! (pipe channel) or opens a TCP socket to an already-listening evaluator.
//! Received bytes are delivered to a single installable receive slot;
//! replacing the slot's state is how a new request takes over the channel
//! and implicitly discards bytes meant for a prior request.
//!
//! [`handshake`] watches a freshly spawned evaluator's output for the
//! one-line announcement of its dynamically chosen listening port.

pub mod connection;
pub mod handshake;

pub use connection::Connection;
