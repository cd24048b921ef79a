//! Spawn handshake detection.
//!
//! A freshly spawned evaluator self-selects its listening port to avoid
//! conflicts, so the client discovers it dynamically: the process announces
//! `Running network REPL on port <N>.` on its output, and the scanner
//! extracts `<N>` from the first such line. Detection is one-shot; if the
//! line never appears the scanner stays silent forever, and the timeout is
//! the caller's responsibility.

use regex::bytes::Regex;
use tracing::warn;

use crate::{AppError, Result};

/// Upper bound on buffered announcement bytes; only a line-sized tail is
/// kept once the buffer grows past this.
const SCAN_BUFFER_LIMIT: usize = 8 * 1024;

/// Tail length retained when trimming the scan buffer.
const SCAN_BUFFER_TAIL: usize = 1024;

/// One-shot scanner for the evaluator's port announcement line.
#[derive(Debug)]
pub struct PortScanner {
    announcement: Regex,
    buf: Vec<u8>,
    done: bool,
}

impl PortScanner {
    /// Build a scanner.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the announcement pattern fails to
    /// compile.
    pub fn new() -> Result<Self> {
        let announcement = Regex::new(r"Running network REPL on port ([0-9]+)\.")
            .map_err(|err| AppError::Config(format!("invalid announcement pattern: {err}")))?;
        Ok(Self {
            announcement,
            buf: Vec::new(),
            done: false,
        })
    }

    /// Feed a receive event's bytes; returns the announced port on the
    /// first (and only the first) match.
    ///
    /// The announcement line may be split across events at any byte
    /// offset, so bytes accumulate until a match is found.
    pub fn push(&mut self, chunk: &[u8]) -> Option<u16> {
        if self.done {
            return None;
        }
        self.buf.extend_from_slice(chunk);

        let Some(caps) = self.announcement.captures(&self.buf) else {
            if self.buf.len() > SCAN_BUFFER_LIMIT {
                let keep_from = self.buf.len() - SCAN_BUFFER_TAIL;
                self.buf.drain(..keep_from);
            }
            return None;
        };

        self.done = true;
        let digits = caps.get(1).map(|m| m.as_bytes().to_vec()).unwrap_or_default();
        self.buf = Vec::new();

        let port = std::str::from_utf8(&digits)
            .ok()
            .and_then(|text| text.parse::<u16>().ok());
        if port.is_none() {
            warn!("port announcement did not parse as a valid port number");
        }
        port
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
