//! functrace-coverage binary

use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

const TRACE: &str = "\
[PID:4242] [Image:/tmp/toy] [Called:add]
[PID:4242] [Image:/tmp/toy] [Called:mul]
[PID:4242] [Image:/usr/lib/libc.so.6] [Called:printf]
";

const LOG: &str = "\
[Image:/tmp/toy] [Section:.text]
[Image:/tmp/toy] [Function:add]
[Image:/tmp/toy] [Function:mul]
[Image:/tmp/toy] [Function:sub]
[Image:/usr/lib/libc.so.6] [Section:.text]
[Image:/usr/lib/libc.so.6] [Function:printf]
[Image:/usr/lib/libc.so.6] [Function:puts]
[Image:[vdso]] [Section:.text]
[PID:4242] [Exited:0]
";

fn write_logs(dir: &TempDir) -> (std::path::PathBuf, std::path::PathBuf) {
    let trace = dir.path().join("functrace.out");
    let log = dir.path().join("functrace.log");
    fs::write(&trace, TRACE).unwrap();
    fs::write(&log, LOG).unwrap();
    (trace, log)
}

#[test]
fn test_requires_log_files() {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("functrace-coverage");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("LOG"));
}

#[test]
fn test_console_report() {
    let dir = TempDir::new().unwrap();
    let (trace, log) = write_logs(&dir);

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("functrace-coverage");
    cmd.arg(&trace)
        .arg(&log)
        .assert()
        .success()
        .stdout(predicate::str::contains("--> Processing 2 log file(s)..."))
        .stdout(predicate::str::contains("Image: /tmp/toy"))
        .stdout(predicate::str::contains("Coverage:          66.67%"))
        .stdout(predicate::str::contains("Image: /usr/lib/libc.so.6"))
        .stdout(predicate::str::contains("Coverage:          50.00%"))
        .stdout(predicate::str::contains("Image: [vdso]"))
        .stdout(predicate::str::contains("--- End of Console Report ---"));
}

#[test]
fn test_missing_log_is_skipped() {
    let dir = TempDir::new().unwrap();
    let (trace, _) = write_logs(&dir);

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("functrace-coverage");
    cmd.arg(&trace)
        .arg(dir.path().join("nope.log"))
        .assert()
        .success()
        .stderr(predicate::str::contains("Warning: Log file not found"))
        .stdout(predicate::str::contains("Image: /tmp/toy"));
}

#[test]
fn test_no_data() {
    let dir = TempDir::new().unwrap();
    let empty = dir.path().join("empty.log");
    fs::write(&empty, "nothing to see\n").unwrap();

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("functrace-coverage");
    cmd.arg(&empty)
        .assert()
        .success()
        .stdout(predicate::str::contains("No data to report"));
}

#[test]
fn test_html_and_xunit_reports() {
    let dir = TempDir::new().unwrap();
    let (trace, log) = write_logs(&dir);
    let html_dir = dir.path().join("html");
    let xunit_dir = dir.path().join("xunit");

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("functrace-coverage");
    cmd.arg(&trace)
        .arg(&log)
        .arg("--html-output")
        .arg(&html_dir)
        .arg("--xunit-output")
        .arg(&xunit_dir)
        .assert()
        .success();

    let html = fs::read_to_string(html_dir.join("coverage_toy.html")).unwrap();
    assert!(html.contains(r#"<li class="uncalled" title="sub">sub</li>"#));
    assert!(html.contains("Coverage: 66.67%"));
    assert!(html_dir.join("coverage_libc.so.6.html").exists());
    assert!(html_dir.join("coverage__vdso_.html").exists());

    let xml = fs::read_to_string(xunit_dir.join("coverage_libc.so.6.xml")).unwrap();
    assert!(xml.contains(r#"skipped="1" tests="2""#));
    assert!(xml.contains("UNCALLED FUNCTIONS:\n  \u{2717} puts"));
}

#[test]
fn test_json_summary() {
    let dir = TempDir::new().unwrap();
    let (trace, log) = write_logs(&dir);
    let json_path = dir.path().join("coverage.json");

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("functrace-coverage");
    cmd.arg(&trace)
        .arg(&log)
        .arg("--json-output")
        .arg(&json_path)
        .assert()
        .success();

    let value: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&json_path).unwrap()).unwrap();
    let images = value["images"].as_array().unwrap();
    assert_eq!(images.len(), 3);
    assert_eq!(images[0]["image"], "/tmp/toy");
    assert_eq!(images[0]["uncalled"][0], "sub");
}
