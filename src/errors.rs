//! Error types shared across the crate.

use std::fmt::{Display, Formatter};

/// Shared crate result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error enumeration covering all domain failure modes.
#[derive(Debug)]
pub enum AppError {
    /// Configuration parsing or validation failure, including an evaluator
    /// binary that cannot be resolved.
    Config(String),
    /// Spawn or connect failure, startup timeout, or unexpected disconnect.
    Transport(String),
    /// A response payload or frame that does not parse as expected.
    Decode(String),
    /// Submit attempted while an evaluation is already pending.
    Busy(String),
    /// Cancel attempted while no evaluation is pending.
    CancelNoop(String),
    /// File-system or other I/O operation failure.
    Io(String),
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Transport(msg) => write!(f, "transport: {msg}"),
            Self::Decode(msg) => write!(f, "decode: {msg}"),
            Self::Busy(msg) => write!(f, "busy: {msg}"),
            Self::CancelNoop(msg) => write!(f, "cancel noop: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
