use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};

use clap::Parser;
use eyre::{Context, Result};
use tracing::{debug, info};

use ispalindrome::check_lines;
use ispalindrome::cli::Cli;

fn setup_logging(verbose: bool) {
    let level = if verbose { tracing::Level::DEBUG } else { tracing::Level::WARN };
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);
    debug!(?cli, "main: parsed arguments");

    let options = cli.options();
    let mut output: Box<dyn Write> = match &cli.output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).context(format!("Failed to open output file {}", path.display()))?,
        )),
        None => Box::new(io::stdout().lock()),
    };

    let mut checked = 0;
    if cli.files.is_empty() {
        checked += check_lines(io::stdin().lock(), &mut output, options).context("Failed to check stdin")?;
    } else {
        for path in &cli.files {
            let file = File::open(path).context(format!("Failed to open input file {}", path.display()))?;
            checked += check_lines(BufReader::new(file), &mut output, options)
                .context(format!("Failed to check {}", path.display()))?;
        }
    }

    output.flush().context("Failed to flush output")?;
    info!(checked, "Done");
    Ok(())
}
