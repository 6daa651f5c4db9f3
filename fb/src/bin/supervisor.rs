use clap::Parser;
use eyre::{Context, Result};
use tracing::{debug, info};

use fbarcset::cli::SupervisorCli;
use fbarcset::config::Config;
use fbarcset::logging::setup_logging;
use fbarcset::signals::install_termination_handler;
use fbarcset::supervisor::{ConsoleReporter, Supervisor};

fn main() -> Result<()> {
    let cli = SupervisorCli::parse();

    let mut config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    cli.apply(&mut config);
    setup_logging(cli.verbose, config.logging.file.as_deref())?;
    debug!(?config, "main: config loaded");

    let names = config.shm.names().context("Invalid shared resource prefix")?;
    install_termination_handler().context("Failed to install signal handlers")?;

    if cli.reclaim {
        let removed = names.reclaim().context("Failed to reclaim stale resources")?;
        info!(removed, "Reclaimed stale resources");
    }

    let mut supervisor = Supervisor::start(&names, config.shm.poll_interval())
        .context(format!("Failed to set up shared resources under {}", names.region))?;

    let mut reporter = ConsoleReporter::new(cli.format);
    let outcome = supervisor.run(&mut reporter);

    println!("Shutting down...");
    drop(supervisor);

    let outcome = outcome.context("Supervisor read loop failed")?;
    info!(?outcome, "Supervisor finished");
    Ok(())
}
