//! Unit tests for result payload decoding.

use replwire::wire::decoder::{
    decode_payload, decode_result, parse_datum, Datum, EvalOutcome, PayloadKind,
};
use replwire::AppError;

// ── Structured result decoding ───────────────────────────────────────────────

#[test]
fn decodes_values_stdout_and_stderr() {
    let result = decode_result(r#"(("1" "2") "out\n" "")"#).expect("decode");
    assert_eq!(result.values, vec!["1", "2"]);
    assert_eq!(result.stdout, "out\n");
    assert_eq!(result.stderr, "");
}

#[test]
fn decodes_empty_values_list() {
    let result = decode_result(r#"(() "" "warning: deprecated\n")"#).expect("decode");
    assert!(result.values.is_empty());
    assert_eq!(result.stderr, "warning: deprecated\n");
}

#[test]
fn renders_non_string_values_in_written_form() {
    let result = decode_result(r#"((42 foo #t ("a" "b")) "" "")"#).expect("decode");
    assert_eq!(result.values, vec!["42", "foo", "#t", r#"("a" "b")"#]);
}

#[test]
fn rejects_payload_that_is_not_a_list() {
    let err = decode_result(r#""just a string""#).expect_err("must fail");
    assert!(matches!(err, AppError::Decode(_)));
}

#[test]
fn rejects_wrong_field_count() {
    let err = decode_result(r#"(("1") "out")"#).expect_err("must fail");
    let msg = err.to_string();
    assert!(msg.contains("3 payload fields"), "unexpected message: {msg}");
}

#[test]
fn rejects_non_string_stdout() {
    let err = decode_result(r#"(("1") 42 "")"#).expect_err("must fail");
    assert!(err.to_string().contains("stdout"), "got: {err}");
}

// ── Outcome decoding ─────────────────────────────────────────────────────────

#[test]
fn malformed_payload_resolves_to_decode_failed_with_raw() {
    let outcome = decode_payload(PayloadKind::Structured, b"(unbalanced");
    match outcome {
        EvalOutcome::DecodeFailed { raw, reason } => {
            assert_eq!(raw, "(unbalanced");
            assert!(!reason.is_empty(), "reason must explain the failure");
        }
        other => panic!("expected DecodeFailed, got {other:?}"),
    }
}

#[test]
fn plain_text_payload_wraps_verbatim() {
    let outcome = decode_payload(PayloadKind::PlainText, b"\"1.2.3\"");
    match outcome {
        EvalOutcome::Completed(result) => {
            assert_eq!(result.values, vec!["\"1.2.3\""]);
            assert_eq!(result.stdout, "");
            assert_eq!(result.stderr, "");
        }
        other => panic!("expected Completed, got {other:?}"),
    }
}

// ── Datum reader ─────────────────────────────────────────────────────────────

#[test]
fn reads_nested_lists() {
    let datum = parse_datum("(a (b (c)) d)").expect("parse");
    assert_eq!(
        datum,
        Datum::List(vec![
            Datum::Sym("a".into()),
            Datum::List(vec![
                Datum::Sym("b".into()),
                Datum::List(vec![Datum::Sym("c".into())]),
            ]),
            Datum::Sym("d".into()),
        ])
    );
}

#[test]
fn reads_string_escapes() {
    let datum = parse_datum(r#""a\"b\\c\nd""#).expect("parse");
    assert_eq!(datum, Datum::Str("a\"b\\c\nd".into()));
}

#[test]
fn keeps_numeric_lexemes_lossless() {
    assert_eq!(parse_datum("1/3").expect("parse"), Datum::Num("1/3".into()));
    assert_eq!(
        parse_datum("-2.5e3").expect("parse"),
        Datum::Num("-2.5e3".into())
    );
    assert_eq!(parse_datum("42").expect("parse"), Datum::Num("42".into()));
}

#[test]
fn classifies_booleans_and_symbols() {
    assert_eq!(parse_datum("#t").expect("parse"), Datum::Bool(true));
    assert_eq!(parse_datum("#false").expect("parse"), Datum::Bool(false));
    assert_eq!(
        parse_datum("foo/bar").expect("parse"),
        Datum::Sym("foo/bar".into())
    );
    assert_eq!(parse_datum("+").expect("parse"), Datum::Sym("+".into()));
}

#[test]
fn expands_quote_sugar() {
    let datum = parse_datum("'foo").expect("parse");
    assert_eq!(
        datum,
        Datum::List(vec![Datum::Sym("quote".into()), Datum::Sym("foo".into())])
    );
    assert_eq!(datum.to_string(), "(quote foo)");
}

#[test]
fn display_round_trips_through_the_reader() {
    let datum = parse_datum(r#"((1 "two" three) #f "a\nb")"#).expect("parse");
    let reparsed = parse_datum(&datum.to_string()).expect("reparse");
    assert_eq!(datum, reparsed);
}

#[test]
fn rejects_unterminated_string() {
    let err = parse_datum(r#""no closing quote"#).expect_err("must fail");
    assert!(err.to_string().contains("unterminated string"), "got: {err}");
}

#[test]
fn rejects_unterminated_list() {
    let err = parse_datum("(a (b)").expect_err("must fail");
    assert!(err.to_string().contains("unterminated list"), "got: {err}");
}

#[test]
fn rejects_trailing_data() {
    let err = parse_datum("(a) (b)").expect_err("must fail");
    assert!(err.to_string().contains("trailing data"), "got: {err}");
}

#[test]
fn rejects_unbalanced_close() {
    let err = parse_datum(")").expect_err("must fail");
    assert!(matches!(err, AppError::Decode(_)));
}
