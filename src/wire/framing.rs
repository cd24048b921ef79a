//! Incremental response framing over the evaluator's byte stream.
//!
//! Delivery may split a response across arbitrarily many receive events, or
//! batch prompts and output into one event, and a marker may be split
//! mid-sequence across events. Parsers therefore accumulate every received
//! byte and re-scan; a marker cannot be matched while only partially
//! present. Both parsers implement [`tokio_util::codec::Decoder`] over the
//! accumulated [`BytesMut`] buffer.
//!
//! Two framing variants:
//! - [`SentinelParser`] (primary): the payload lies between a
//!   `(> )?|<sentinel>>>` begin marker and a `<<<sentinel>|` end marker.
//! - [`PlainParser`] (legacy): the payload is the trimmed content preceding
//!   a final prompt line with optional numeric prefix.

use bytes::{Buf, Bytes, BytesMut};
use regex::bytes::Regex;
use tokio_util::codec::Decoder;

use crate::wire::decoder::PayloadKind;
use crate::{AppError, Result};

/// Maximum bytes buffered for a single response frame.
///
/// A frame growing past this limit resolves the pending request with
/// [`AppError::Decode`] instead of buffering without bound.
pub const MAX_FRAME_BYTES: usize = 8 * 1024 * 1024;

/// Per-request frame parser: one framing variant plus the request's
/// accumulated receive buffer.
///
/// Created fresh on every submit, which is what clears any prior buffer;
/// dropped on completion or cancellation, which is what discards a stale
/// frame still in flight.
#[derive(Debug)]
pub struct FrameParser {
    buf: BytesMut,
    kind: PayloadKind,
    variant: Variant,
}

#[derive(Debug)]
enum Variant {
    Sentinel(SentinelParser),
    Plain(PlainParser),
}

impl FrameParser {
    /// Sentinel-framed parser for the given sentinel token.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Decode` if the marker pattern fails to compile.
    pub fn sentinel(token: &str) -> Result<Self> {
        Ok(Self {
            buf: BytesMut::new(),
            kind: PayloadKind::Structured,
            variant: Variant::Sentinel(SentinelParser::new(token)?),
        })
    }

    /// Legacy plain-framed parser.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Decode` if the prompt pattern fails to compile.
    pub fn plain() -> Result<Self> {
        Ok(Self {
            buf: BytesMut::new(),
            kind: PayloadKind::PlainText,
            variant: Variant::Plain(PlainParser::new()?),
        })
    }

    /// How this request's completed payload is decoded.
    #[must_use]
    pub fn payload_kind(&self) -> PayloadKind {
        self.kind
    }

    /// Append a receive event's bytes and scan for a complete frame.
    ///
    /// Returns `Ok(None)` until both markers are located; only then is the
    /// payload extracted and the buffer released.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Decode` when the buffered frame exceeds
    /// [`MAX_FRAME_BYTES`].
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Option<Bytes>> {
        self.buf.extend_from_slice(chunk);
        match &mut self.variant {
            Variant::Sentinel(parser) => parser.decode(&mut self.buf),
            Variant::Plain(parser) => parser.decode(&mut self.buf),
        }
    }
}

/// Sentinel-framed scanner (primary variant).
///
/// Two-phase: the whole buffer is re-scanned until the begin marker
/// appears; once it has matched it is authoritative, and only the region
/// past the remembered payload start is scanned for the end marker. The
/// payload start offset is the begin marker's match end, so it is always
/// derived from the literal width of the matched marker text.
#[derive(Debug)]
pub struct SentinelParser {
    begin: Regex,
    end: Regex,
    end_marker_len: usize,
    payload_start: Option<usize>,
    end_scan_from: usize,
}

impl SentinelParser {
    /// Build a scanner for the given sentinel token.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Decode` if the marker pattern fails to compile.
    pub fn new(token: &str) -> Result<Self> {
        let begin = Regex::new(&format!("(> )?\\|{}>>", regex::escape(token)))
            .map_err(|err| AppError::Decode(format!("invalid begin marker pattern: {err}")))?;
        let end_literal = format!("<<{token}|");
        let end = Regex::new(&regex::escape(&end_literal))
            .map_err(|err| AppError::Decode(format!("invalid end marker pattern: {err}")))?;
        Ok(Self {
            begin,
            end,
            end_marker_len: end_literal.len(),
            payload_start: None,
            end_scan_from: 0,
        })
    }
}

impl Decoder for SentinelParser {
    type Item = Bytes;
    type Error = AppError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Bytes>> {
        if self.payload_start.is_none() {
            if let Some(found) = self.begin.find(src) {
                self.payload_start = Some(found.end());
                self.end_scan_from = found.end();
            }
        }

        let Some(start) = self.payload_start else {
            check_frame_capacity(src.len())?;
            return Ok(None);
        };

        if let Some(found) = self.end.find(&src[self.end_scan_from..]) {
            let end = self.end_scan_from + found.start();
            let after = self.end_scan_from + found.end();
            let mut frame = src.split_to(after);
            frame.truncate(end);
            frame.advance(start);
            self.payload_start = None;
            self.end_scan_from = 0;
            return Ok(Some(frame.freeze()));
        }

        // The end marker may straddle the next chunk boundary; resume the
        // scan just before the unsearched tail.
        self.end_scan_from = src
            .len()
            .saturating_sub(self.end_marker_len - 1)
            .max(start);
        check_frame_capacity(src.len())?;
        Ok(None)
    }
}

/// Legacy plain-framed scanner: the trimmed content preceding a trailing
/// prompt line with optional numeric prefix.
#[derive(Debug)]
pub struct PlainParser {
    prompt: Regex,
}

impl PlainParser {
    /// Build the scanner.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Decode` if the prompt pattern fails to compile.
    pub fn new() -> Result<Self> {
        let prompt = Regex::new(r"(?s)\A(.*)\r\n[0-9]* > \z")
            .map_err(|err| AppError::Decode(format!("invalid prompt pattern: {err}")))?;
        Ok(Self { prompt })
    }
}

impl Decoder for PlainParser {
    type Item = Bytes;
    type Error = AppError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Bytes>> {
        if let Some(caps) = self.prompt.captures(src) {
            let content = caps
                .get(1)
                .map(|m| m.as_bytes().trim_ascii())
                .unwrap_or_default();
            let payload = Bytes::copy_from_slice(content);
            src.clear();
            return Ok(Some(payload));
        }
        check_frame_capacity(src.len())?;
        Ok(None)
    }
}

fn check_frame_capacity(len: usize) -> Result<()> {
    if len > MAX_FRAME_BYTES {
        return Err(AppError::Decode(format!(
            "response frame exceeded {MAX_FRAME_BYTES} bytes"
        )));
    }
    Ok(())
}
