use clap::Parser;
use eyre::{Context, Result};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{debug, info};

use fbarcset::cli::GeneratorCli;
use fbarcset::config::Config;
use fbarcset::generator::{Generator, process_seed};
use fbarcset::graph::Graph;
use fbarcset::logging::setup_logging;
use fbarcset::shm::Ring;
use fbarcset::signals::{bind_phase, install_termination_handler};

fn main() -> Result<()> {
    let cli = GeneratorCli::parse();

    // Input errors are reported before any shared resource is touched.
    let graph = Graph::parse(&cli.edges).context("Invalid edge list")?;

    let mut config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    cli.apply(&mut config);
    setup_logging(cli.verbose, config.logging.file.as_deref())?;
    debug!(?config, "main: config loaded");

    let names = config.shm.names().context("Invalid shared resource prefix")?;
    install_termination_handler().context("Failed to install signal handlers")?;

    let ring = Ring::attach_ready(
        &names,
        config.shm.poll_interval(),
        config.generator.startup_poll(),
        config.generator.attach_timeout(),
    )
    .context(format!("Failed to attach to {} (is the supervisor running?)", names.region))?;
    let _binding = bind_phase(ring.state());

    if !ring
        .await_running(config.generator.startup_poll())
        .context("Shared region is not usable")?
    {
        info!("Run already terminating, nothing to do");
        return Ok(());
    }

    let seed = config.generator.seed.unwrap_or_else(process_seed);
    info!(
        seed,
        vertices = graph.vertex_count(),
        edges = graph.edges().len(),
        "Generator attached"
    );

    let mut generator = Generator::new(graph, StdRng::seed_from_u64(seed), config.generator.shuffle);
    let stats = generator.run(&ring).context("Generator failed")?;
    debug!(?stats, "main: generator finished");
    Ok(())
}
