//! Unit tests for prefix completion: the search expression, the candidate
//! decoder, and the ranking.

use replwire::complete::{completion_expr, decode_candidates, rank_candidates};
use replwire::AppError;

#[test]
fn completion_expression_quotes_the_prefix() {
    assert_eq!(completion_expr("str"), "(complete/prefix \"str\")");
}

#[test]
fn completion_expression_escapes_the_prefix() {
    assert_eq!(
        completion_expr("we\"ird"),
        "(complete/prefix \"we\\\"ird\")"
    );
}

#[test]
fn decodes_symbol_and_string_candidates() {
    let candidates = decode_candidates(r#"(string-append "string-length" string->list)"#)
        .expect("decode");
    assert_eq!(
        candidates,
        vec!["string-append", "string-length", "string->list"]
    );
}

#[test]
fn decodes_empty_candidate_list() {
    assert!(decode_candidates("()").expect("decode").is_empty());
}

#[test]
fn rejects_non_list_candidates() {
    let err = decode_candidates("\"lone\"").expect_err("must fail");
    assert!(matches!(err, AppError::Decode(_)));
}

#[test]
fn rejects_nested_candidate_datum() {
    let err = decode_candidates("(foo (bar))").expect_err("must fail");
    assert!(err.to_string().contains("unexpected candidate"), "got: {err}");
}

#[test]
fn ranks_shortest_first_then_alphabetical() {
    let mut candidates = vec![
        "string-append".to_owned(),
        "str".to_owned(),
        "string".to_owned(),
        "strong".to_owned(),
    ];
    rank_candidates(&mut candidates);
    assert_eq!(candidates, vec!["str", "string", "strong", "string-append"]);
}

#[test]
fn ranking_removes_duplicates() {
    let mut candidates = vec!["map".to_owned(), "max".to_owned(), "map".to_owned()];
    rank_candidates(&mut candidates);
    assert_eq!(candidates, vec!["map", "max"]);
}
