// Smoke tests for the djts binary
use std::path::PathBuf;
use std::process::{Command, Output};

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn djts(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_djts"))
        .args(args)
        .env_remove("TAGSPECS_PATH")
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to run djts")
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn test_verbose_flag_surfaces_library_debug_logs() {
    let project = fixture("ok/project.toml");
    let output = djts(&["-vv", "validate", project.to_str().unwrap()]);
    assert!(output.status.success(), "{}", stderr(&output));
    let logs = stderr(&output);
    assert!(logs.contains("merging 2 libraries over 1 libraries"), "{logs}");
    assert!(logs.contains("DEBUG"), "{logs}");
}

#[test]
fn test_quiet_by_default() {
    let project = fixture("ok/project.toml");
    let output = djts(&["validate", project.to_str().unwrap()]);
    assert!(output.status.success(), "{}", stderr(&output));
    assert!(!stderr(&output).contains("merging"));
    assert!(stdout(&output).contains("is valid: 2 libraries"));
}

#[test]
fn test_resolve_prints_requested_format() {
    let project = fixture("ok/project.toml");
    let output = djts(&["resolve", project.to_str().unwrap(), "--format", "json"]);
    assert!(output.status.success(), "{}", stderr(&output));
    let doc: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(doc["libraries"].as_array().unwrap().len(), 2);
}

#[test]
fn test_errors_exit_with_status_one() {
    let broken = fixture("err/broken.toml");
    let output = djts(&["validate", broken.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn test_list_tags_status_needs_catalog() {
    let registry = fixture("registry.json");
    let output = djts(&[
        "list-tags",
        "--registry",
        registry.to_str().unwrap(),
        "--status",
        "missing",
    ]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("requires --catalog"));
}

#[test]
fn test_list_tags_reports_empty_result() {
    let registry = fixture("registry.json");
    let output = djts(&["list-tags", "--registry", registry.to_str().unwrap(), "--name", "zzz"]);
    assert!(output.status.success(), "{}", stderr(&output));
    assert!(stdout(&output).contains("No tags found"));
}
