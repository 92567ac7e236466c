use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;

fn bin() -> Command {
    Command::cargo_bin("market-client").unwrap()
}

#[test]
fn help_lists_connection_flags() {
    bin()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--origin"))
        .stdout(predicate::str::contains("--no-reconnect"));
}

#[test]
fn origin_is_required() {
    bin()
        .assert()
        .failure()
        .stderr(predicate::str::contains("--origin"));
}

#[test]
fn unsupported_scheme_fails_before_connecting() {
    bin()
        .args(["--origin", "ftp://example.com"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("ftp"));
}

#[test]
fn empty_symbols_file_is_rejected() {
    let mut f = tempfile::NamedTempFile::new().unwrap();
    writeln!(f, "# only comments").unwrap();

    bin()
        .args(["--origin", "http://127.0.0.1:9"])
        .arg("--symbols-file")
        .arg(f.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("symbols list is empty"));
}

#[test]
fn symbols_and_symbols_file_conflict() {
    bin()
        .args([
            "--origin",
            "http://127.0.0.1:9",
            "--symbols",
            "AAPL",
            "--symbols-file",
            "x.txt",
        ])
        .assert()
        .failure();
}
