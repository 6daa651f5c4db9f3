//! CLI argument parsing for ispalindrome

use clap::Parser;
use std::path::PathBuf;

use crate::CheckOptions;

#[derive(Parser, Debug)]
#[command(name = "ispalindrome")]
#[command(version, about = "Report which input lines are palindromes", long_about = None)]
pub struct Cli {
    /// Ignore spaces when checking
    #[arg(short = 's')]
    pub ignore_spaces: bool,

    /// Compare letters case-insensitively
    #[arg(short = 'i')]
    pub ignore_case: bool,

    /// Write results to this file instead of stdout
    #[arg(short = 'o', value_name = "OUTFILE")]
    pub output: Option<PathBuf>,

    /// Enable verbose logging on stderr
    #[arg(short, long)]
    pub verbose: bool,

    /// Input files; stdin when none are given
    #[arg(value_name = "FILE")]
    pub files: Vec<PathBuf>,
}

impl Cli {
    pub fn options(&self) -> CheckOptions {
        CheckOptions {
            ignore_spaces: self.ignore_spaces,
            ignore_case: self.ignore_case,
        }
    }
}
