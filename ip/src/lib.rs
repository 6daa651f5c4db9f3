//! ispalindrome - line-by-line palindrome checker
//!
//! Every input line (without its trailing newline) is reported as
//! `<line> is a palindrom` or `<line> is not a palindrom`. Spaces can be
//! ignored and letters compared case-insensitively; the line is always
//! echoed as it was read.

pub mod cli;

use std::io::{self, BufRead, Write};

use tracing::debug;

/// How lines are normalized before the check
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CheckOptions {
    /// Drop ASCII spaces before comparing
    pub ignore_spaces: bool,
    /// Compare ASCII letters without regard to case
    pub ignore_case: bool,
}

/// Remove every ASCII space; other whitespace is kept
pub fn strip_spaces(value: &str) -> String {
    value.chars().filter(|c| *c != ' ').collect()
}

/// Whether `value` reads the same forwards and backwards.
///
/// The empty string is not a palindrome.
pub fn is_palindrome(value: &str, ignore_case: bool) -> bool {
    if value.is_empty() {
        return false;
    }
    let fold = |c: char| if ignore_case { c.to_ascii_uppercase() } else { c };
    value.chars().map(fold).eq(value.chars().rev().map(fold))
}

/// Check one line under `options`
pub fn check_line(line: &str, options: CheckOptions) -> bool {
    if options.ignore_spaces {
        is_palindrome(&strip_spaces(line), options.ignore_case)
    } else {
        is_palindrome(line, options.ignore_case)
    }
}

/// The report line for `line`, without a newline
pub fn verdict(line: &str, palindrome: bool) -> String {
    if palindrome {
        format!("{} is a palindrom", line)
    } else {
        format!("{} is not a palindrom", line)
    }
}

/// Check every line of `input` and write one verdict per line to `output`.
///
/// Returns the number of lines checked. A final line without a newline is
/// checked like any other. Bytes that are not valid UTF-8 become U+FFFD
/// instead of ending the run, and a trailing `\r` is dropped.
pub fn check_lines<R: BufRead, W: Write>(input: R, output: &mut W, options: CheckOptions) -> io::Result<usize> {
    let mut checked = 0;
    for raw in input.split(b'\n') {
        let mut raw = raw?;
        if raw.last() == Some(&b'\r') {
            raw.pop();
        }
        let line = String::from_utf8_lossy(&raw);
        let palindrome = check_line(&line, options);
        writeln!(output, "{}", verdict(&line, palindrome))?;
        checked += 1;
    }
    debug!(checked, "check_lines: done");
    Ok(checked)
}
