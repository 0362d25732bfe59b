use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn concordance() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_concordance"));
    cmd.env_remove("RUST_LOG")
        .env_remove("CONCORDANCE_CONTEXT_WORDS")
        .env_remove("CONCORDANCE_MAX_LINE_BYTES")
        .env_remove("CONCORDANCE_JOBS");
    cmd
}

fn run(args: &[&str]) -> Output {
    concordance().args(args).output().expect("spawn concordance")
}

fn path_str(path: &Path) -> &str {
    path.to_str().expect("utf-8 temp path")
}

fn read_report(path: &Path) -> serde_json::Value {
    serde_json::from_slice(&fs::read(path).unwrap()).unwrap()
}

#[test]
fn writes_report_file() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("report.json");
    let input = fixture("errors.log");
    let out = run(&[path_str(&input), path_str(&output), "error", "kernel"]);
    assert_eq!(out.status.code(), Some(0), "{out:?}");
    assert!(out.stdout.is_empty());

    let report = read_report(&output);
    assert_eq!(report["error"]["frequency"], 3);
    assert_eq!(report["error"]["occurrences"][2]["offset"], 58);
    assert_eq!(report["kernel"]["frequency"], 0);
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
}

#[test]
fn logs_one_run_summary_on_stderr() {
    let input = fixture("errors.log");
    let out = run(&[path_str(&input), "-", "error"]);
    assert_eq!(out.status.code(), Some(0));
    let stderr = String::from_utf8_lossy(&out.stderr);
    let summaries = stderr.lines().filter(|line| line.contains("matches")).count();
    assert_eq!(summaries, 1, "{stderr}");
    assert!(stderr.contains("3 matches across 3 lines"), "{stderr}");
}

#[test]
fn dash_writes_json_to_stdout() {
    let input = fixture("errors.log");
    let out = run(&["--compact", path_str(&input), "-", "up"]);
    assert_eq!(out.status.code(), Some(0));

    let stdout = String::from_utf8(out.stdout).unwrap();
    assert_eq!(stdout.lines().count(), 1);
    let report: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(report["up"]["occurrences"][0]["line"], 3);
    assert_eq!(report["up"]["occurrences"][0]["context_after"], "");
}

#[test]
fn repeated_runs_are_byte_identical() {
    let dir = tempfile::tempdir().unwrap();
    let input = fixture("prose.txt");
    let first = dir.path().join("a.json");
    let second = dir.path().join("b.json");
    for output in [&first, &second] {
        let out = run(&[path_str(&input), path_str(output), "the", "of", "was"]);
        assert_eq!(out.status.code(), Some(0));
    }
    assert_eq!(fs::read(&first).unwrap(), fs::read(&second).unwrap());
}

#[test]
fn jobs_flag_does_not_change_output() {
    let input = fixture("prose.txt");
    let single = run(&[path_str(&input), "-", "the", "we"]);
    let pooled = run(&["-j", "4", path_str(&input), "-", "the", "we"]);
    assert_eq!(single.status.code(), Some(0));
    assert_eq!(pooled.status.code(), Some(0));
    assert_eq!(single.stdout, pooled.stdout);
}

#[test]
fn context_flag_overrides_environment() {
    let input = fixture("errors.log");
    let from_env = concordance()
        .env("CONCORDANCE_CONTEXT_WORDS", "1")
        .args([path_str(&input), "-", "up"])
        .output()
        .unwrap();
    let report: serde_json::Value = serde_json::from_slice(&from_env.stdout).unwrap();
    assert_eq!(report["up"]["occurrences"][0]["context_before"], "giving");

    let from_flag = concordance()
        .env("CONCORDANCE_CONTEXT_WORDS", "1")
        .args(["-k", "3", path_str(&input), "-", "up"])
        .output()
        .unwrap();
    let report: serde_json::Value = serde_json::from_slice(&from_flag.stdout).unwrap();
    assert_eq!(
        report["up"]["occurrences"][0]["context_before"],
        "final error giving"
    );
}

#[test]
fn missing_keywords_exit_with_usage_error() {
    let input = fixture("errors.log");
    let out = run(&[path_str(&input), "-"]);
    assert_eq!(out.status.code(), Some(1));
    assert!(out.stdout.is_empty());
}

#[test]
fn duplicate_keywords_are_invalid_input() {
    let input = fixture("errors.log");
    let out = run(&[path_str(&input), "-", "error", "Error"]);
    assert_eq!(out.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("more than once"), "{stderr}");
}

#[test]
fn unreadable_inputs_exit_with_code_two() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("missing.txt");
    let out = run(&[path_str(&missing), "-", "error"]);
    assert_eq!(out.status.code(), Some(2));

    let out = run(&[path_str(dir.path()), "-", "error"]);
    assert_eq!(out.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("not a regular file"), "{stderr}");
}

#[cfg(unix)]
#[test]
fn symlinked_input_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let link = dir.path().join("link.log");
    std::os::unix::fs::symlink(fixture("errors.log"), &link).unwrap();
    let out = run(&[path_str(&link), "-", "error"]);
    assert_eq!(out.status.code(), Some(2));
}

#[test]
fn oversized_input_exits_with_code_two() {
    let input = fixture("errors.log");
    let out = run(&["--max-file-bytes", "16", path_str(&input), "-", "error"]);
    assert_eq!(out.status.code(), Some(2));
}

#[test]
fn unwritable_output_exits_with_code_three() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("no-such-dir").join("report.json");
    let input = fixture("errors.log");
    let out = run(&[path_str(&input), path_str(&output), "error"]);
    assert_eq!(out.status.code(), Some(3));
    assert!(!output.exists());
}
