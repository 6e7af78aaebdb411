//! End-to-end tests of the `tether` binary over stdio.

use std::fs;
use std::io::Write;
use std::process::{Command, Output, Stdio};

fn run_tether(args: &[&str], input: &str) -> Output {
    let mut child = Command::new(env!("CARGO_BIN_EXE_tether"))
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn tether");
    child
        .stdin
        .take()
        .expect("stdin is piped")
        .write_all(input.as_bytes())
        .expect("write input");
    child.wait_with_output().expect("tether runs")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn test_stdio_session() {
    let output = run_tether(&[], "x = 5\nx * 2\n");
    assert!(output.status.success());
    assert_eq!(stdout(&output), ">>> >>> 10\n>>> ");
}

#[test]
fn test_exit_code_is_propagated() {
    let output = run_tether(&[], "exit(4)\n");
    assert_eq!(output.status.code(), Some(4));
    assert_eq!(stdout(&output), ">>> ");
}

#[test]
fn test_negative_exit_code_wraps() {
    let output = run_tether(&[], "exit(-1)\n");
    assert_eq!(output.status.code(), Some(255));
}

#[test]
fn test_deep_recursion_is_reported() {
    let output = run_tether(&[], "def f():\n    return f()\n\nf()\n1\n");
    assert!(output.status.success());
    let out = stdout(&output);
    assert!(out.contains("RecursionError: maximum recursion depth exceeded\n"));
    assert!(out.ends_with(">>> 1\n>>> "));
}

#[test]
fn test_logs_stay_off_stdout() {
    let output = run_tether(&["--verbose"], "1\n");
    assert_eq!(stdout(&output), ">>> 1\n>>> ");
    assert!(String::from_utf8_lossy(&output.stderr).contains("console session started"));
}

#[test]
fn test_config_file_sets_prompts_and_banner() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tether.json");
    fs::write(
        &path,
        r#"{"console": {"prompt": "$ ", "banner": "tether"}}"#,
    )
    .unwrap();
    let output = run_tether(&["--config", path.to_str().unwrap()], "'ok'\n");
    assert_eq!(stdout(&output), "tether\n$ 'ok'\n$ ");
}

#[test]
fn test_bad_config_fails() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tether.json");
    fs::write(&path, "{ not json").unwrap();
    let output = run_tether(&["--config", path.to_str().unwrap()], "");
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("invalid config"));
}
