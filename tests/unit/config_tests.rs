//! Unit tests for configuration parsing and validation.

use replwire::config::GlobalConfig;
use replwire::AppError;

#[test]
fn parses_minimal_evaluator_config_with_defaults() {
    let config = GlobalConfig::from_toml_str(
        r#"
[evaluator]
command = "scheme-repl"
"#,
    )
    .expect("valid config");

    let evaluator = config.evaluator.expect("evaluator section");
    assert_eq!(evaluator.command, "scheme-repl");
    assert!(evaluator.args.is_empty());
    assert_eq!(evaluator.startup_timeout_seconds, 30);
    assert_eq!(config.source_dirs, vec!["src"]);
    assert!(config.remote.is_none());
    assert!(config.workspace_root.is_none());
}

#[test]
fn parses_remote_only_config_with_default_host() {
    let config = GlobalConfig::from_toml_str(
        r#"
[remote]
port = 37146
"#,
    )
    .expect("valid config");

    let remote = config.remote.expect("remote section");
    assert_eq!(remote.host, "127.0.0.1");
    assert_eq!(remote.port, 37146);
}

#[test]
fn parses_evaluator_args_and_custom_source_dirs() {
    let config = GlobalConfig::from_toml_str(
        r#"
source_dirs = ["src", "lib"]

[evaluator]
command = "scheme-repl"
args = ["--listen", "0"]
startup_timeout_seconds = 5
"#,
    )
    .expect("valid config");

    let evaluator = config.evaluator.expect("evaluator section");
    assert_eq!(evaluator.args, vec!["--listen", "0"]);
    assert_eq!(evaluator.startup_timeout_seconds, 5);
    assert_eq!(config.source_dirs, vec!["src", "lib"]);
}

#[test]
fn rejects_config_without_evaluator_or_remote() {
    let err = GlobalConfig::from_toml_str("source_dirs = [\"src\"]\n").expect_err("must fail");
    match err {
        AppError::Config(msg) => assert!(
            msg.contains("[evaluator] or [remote]"),
            "unexpected message: {msg}"
        ),
        other => panic!("expected AppError::Config, got {other:?}"),
    }
}

#[test]
fn rejects_empty_evaluator_command() {
    let err = GlobalConfig::from_toml_str(
        r#"
[evaluator]
command = "  "
"#,
    )
    .expect_err("must fail");
    assert!(matches!(err, AppError::Config(_)));
}

#[test]
fn rejects_zero_startup_timeout() {
    let err = GlobalConfig::from_toml_str(
        r#"
[evaluator]
command = "scheme-repl"
startup_timeout_seconds = 0
"#,
    )
    .expect_err("must fail");
    assert!(matches!(err, AppError::Config(_)));
}

#[test]
fn rejects_empty_source_dirs() {
    let err = GlobalConfig::from_toml_str(
        r#"
source_dirs = []

[remote]
port = 37146
"#,
    )
    .expect_err("must fail");
    assert!(matches!(err, AppError::Config(_)));
}

#[test]
fn canonicalizes_workspace_root() {
    let temp = tempfile::tempdir().expect("tempdir");
    let toml = format!(
        r#"
workspace_root = '{root}'

[remote]
port = 37146
"#,
        root = temp.path().to_str().expect("utf8 path"),
    );

    let config = GlobalConfig::from_toml_str(&toml).expect("valid config");
    let root = config.workspace_root.expect("workspace root");
    assert_eq!(root, temp.path().canonicalize().expect("canonicalize"));
}

#[test]
fn rejects_missing_workspace_root() {
    let err = GlobalConfig::from_toml_str(
        r#"
workspace_root = "/definitely/not/a/real/path/xyzzy"

[remote]
port = 37146
"#,
    )
    .expect_err("must fail");
    assert!(matches!(err, AppError::Config(_)));
}

#[test]
fn loads_config_from_a_file_path() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join("config.toml");
    std::fs::write(&path, "[remote]\nport = 40000\n").expect("write config");

    let config = GlobalConfig::load_from_path(&path).expect("load");
    assert_eq!(config.remote.expect("remote").port, 40000);
}

#[test]
fn reports_unreadable_config_file() {
    let err =
        GlobalConfig::load_from_path("/definitely/not/a/real/config.toml").expect_err("must fail");
    assert!(matches!(err, AppError::Config(_)));
}

#[test]
fn reports_invalid_toml() {
    let err = GlobalConfig::from_toml_str("not valid toml [").expect_err("must fail");
    match err {
        AppError::Config(msg) => assert!(msg.contains("invalid config"), "got: {msg}"),
        other => panic!("expected AppError::Config, got {other:?}"),
    }
}
