//! Unit tests for `AppError` display format and error behavior.

use replwire::AppError;

#[test]
fn each_variant_has_a_distinct_prefix() {
    assert_eq!(
        AppError::Config("bad".into()).to_string(),
        "config: bad"
    );
    assert_eq!(
        AppError::Transport("gone".into()).to_string(),
        "transport: gone"
    );
    assert_eq!(AppError::Decode("junk".into()).to_string(), "decode: junk");
    assert_eq!(AppError::Busy("pending".into()).to_string(), "busy: pending");
    assert_eq!(
        AppError::CancelNoop("idle".into()).to_string(),
        "cancel noop: idle"
    );
    assert_eq!(AppError::Io("denied".into()).to_string(), "io: denied");
}

#[test]
fn transport_error_is_distinct_from_io_error() {
    let transport = AppError::Transport("stream closed".into());
    let io = AppError::Io("stream closed".into());
    assert_ne!(transport.to_string(), io.to_string());
}

#[test]
fn error_message_has_no_trailing_period() {
    let err = AppError::Busy("an evaluation is already pending".into());
    let text = err.to_string();
    assert!(
        !text.ends_with('.'),
        "error message must not end with a period: {text}"
    );
}

#[test]
fn implements_std_error() {
    let err: Box<dyn std::error::Error> = Box::new(AppError::Decode("oops".into()));
    assert!(err.to_string().starts_with("decode:"));
}

#[test]
fn converts_io_errors() {
    let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
    let err: AppError = io.into();
    assert!(matches!(err, AppError::Io(_)));
}
