//! End-to-end tests for the ispalindrome binary

use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn ispalindrome() -> Command {
    Command::cargo_bin("ispalindrome").unwrap()
}

#[test]
fn test_reads_stdin() {
    ispalindrome()
        .write_stdin("otto\nhello\n")
        .assert()
        .success()
        .stdout("otto is a palindrom\nhello is not a palindrom\n");
}

#[test]
fn test_flags_normalize_but_echo_original() {
    ispalindrome()
        .args(["-s", "-i"])
        .write_stdin("Never odd or Even\n")
        .assert()
        .success()
        .stdout("Never odd or Even is a palindrom\n");
}

#[test]
fn test_files_in_order_to_outfile() {
    let temp_dir = TempDir::new().unwrap();
    let first = temp_dir.path().join("first.txt");
    let second = temp_dir.path().join("second.txt");
    let out = temp_dir.path().join("out.txt");
    fs::write(&first, "abba\n").unwrap();
    fs::write(&second, "abc\nx").unwrap();

    ispalindrome()
        .arg("-o")
        .arg(&out)
        .arg(&first)
        .arg(&second)
        .assert()
        .success()
        .stdout(predicate::str::is_empty());

    assert_eq!(
        fs::read_to_string(&out).unwrap(),
        "abba is a palindrom\nabc is not a palindrom\nx is a palindrom\n"
    );
}

#[test]
fn test_missing_input_file_fails() {
    let temp_dir = TempDir::new().unwrap();
    ispalindrome()
        .arg(temp_dir.path().join("absent.txt"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to open input file"));
}

#[test]
fn test_unwritable_output_fails() {
    let temp_dir = TempDir::new().unwrap();
    ispalindrome()
        .arg("-o")
        .arg(temp_dir.path().join("no_such_dir").join("out.txt"))
        .write_stdin("a\n")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to open output file"));
}

#[test]
fn test_unknown_option_fails() {
    ispalindrome().arg("-x").assert().failure();
}

#[test]
fn test_invalid_utf8_line_keeps_going() {
    let temp_dir = TempDir::new().unwrap();
    let binary = temp_dir.path().join("binary.txt");
    let after = temp_dir.path().join("after.txt");
    fs::write(&binary, b"otto\n\xc3(\nabba\n").unwrap();
    fs::write(&after, "xyz\n").unwrap();

    ispalindrome()
        .arg(&binary)
        .arg(&after)
        .assert()
        .success()
        .stdout("otto is a palindrom\n\u{FFFD}( is not a palindrom\nabba is a palindrom\nxyz is not a palindrom\n");
}
