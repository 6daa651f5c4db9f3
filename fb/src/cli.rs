//! CLI definitions for the supervisor and generator binaries

use clap::Parser;
use std::path::PathBuf;

use crate::config::Config;
use crate::generator::ShufflePolicy;

/// Supervisor - owns the shared ring and reports the best feedback arc set found
#[derive(Parser, Debug)]
#[command(
    name = "supervisor",
    about = "Create the shared ring and report the smallest feedback arc sets found by generators",
    version = env!("GIT_DESCRIBE")
)]
pub struct SupervisorCli {
    /// Path to config file
    #[arg(short, long, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    /// Shared resource name prefix (overrides config)
    #[arg(long, value_name = "PREFIX")]
    pub prefix: Option<String>,

    /// Remove resources left behind by a crashed run before starting
    #[arg(long)]
    pub reclaim: bool,

    /// Output format for progress lines
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,
}

impl SupervisorCli {
    /// Apply command-line overrides on top of the loaded config
    pub fn apply(&self, config: &mut Config) {
        if let Some(prefix) = &self.prefix {
            config.shm.prefix = prefix.clone();
        }
    }
}

/// Generator - searches for small feedback arc sets and publishes them to the supervisor
#[derive(Parser, Debug)]
#[command(
    name = "generator",
    about = "Search for small feedback arc sets and publish improvements to the supervisor",
    version = env!("GIT_DESCRIBE")
)]
pub struct GeneratorCli {
    /// Path to config file
    #[arg(short, long, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    /// Shared resource name prefix (overrides config)
    #[arg(long, value_name = "PREFIX")]
    pub prefix: Option<String>,

    /// Fixed RNG seed (overrides config)
    #[arg(long)]
    pub seed: Option<u64>,

    /// Shuffle before or after deriving each candidate (overrides config)
    #[arg(long, value_name = "POLICY")]
    pub shuffle: Option<ShufflePolicy>,

    /// Directed edges as FROM-TO, e.g. 0-1 1-2 2-0
    #[arg(value_name = "EDGE", required = true, allow_hyphen_values = true)]
    pub edges: Vec<String>,
}

impl GeneratorCli {
    /// Apply command-line overrides on top of the loaded config
    pub fn apply(&self, config: &mut Config) {
        if let Some(prefix) = &self.prefix {
            config.shm.prefix = prefix.clone();
        }
        if let Some(seed) = self.seed {
            config.generator.seed = Some(seed);
        }
        if let Some(shuffle) = self.shuffle {
            config.generator.shuffle = shuffle;
        }
    }
}

/// Output format for supervisor progress
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "plain" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown format: {}. Use: text or json", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Json => write!(f, "json"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supervisor_defaults() {
        let cli = SupervisorCli::parse_from(["supervisor"]);
        assert!(cli.config.is_none());
        assert!(!cli.verbose);
        assert!(!cli.reclaim);
        assert!(cli.prefix.is_none());
        assert_eq!(cli.format, OutputFormat::Text);
    }

    #[test]
    fn test_supervisor_options() {
        let cli = SupervisorCli::parse_from(["supervisor", "-v", "--reclaim", "--prefix", "/fb_x", "-f", "json"]);
        assert!(cli.verbose);
        assert!(cli.reclaim);
        assert_eq!(cli.format, OutputFormat::Json);

        let mut config = Config::default();
        cli.apply(&mut config);
        assert_eq!(config.shm.prefix, "/fb_x");
    }

    #[test]
    fn test_generator_edges() {
        let cli = GeneratorCli::parse_from(["generator", "0-1", "1-2", "2-0"]);
        assert_eq!(cli.edges, vec!["0-1", "1-2", "2-0"]);
        assert!(cli.seed.is_none());
        assert!(cli.shuffle.is_none());
    }

    #[test]
    fn test_generator_requires_an_edge() {
        assert!(GeneratorCli::try_parse_from(["generator"]).is_err());
    }

    #[test]
    fn test_generator_passes_malformed_edges_through() {
        // Edge validation happens in the graph parser, not in clap.
        let cli = GeneratorCli::parse_from(["generator", "--", "-1-2"]);
        assert_eq!(cli.edges, vec!["-1-2"]);
    }

    #[test]
    fn test_generator_overrides() {
        let cli = GeneratorCli::parse_from([
            "generator",
            "--seed",
            "9",
            "--shuffle",
            "before",
            "--prefix",
            "/fb_y",
            "0-1",
        ]);
        let mut config = Config::default();
        cli.apply(&mut config);
        assert_eq!(config.generator.seed, Some(9));
        assert_eq!(config.generator.shuffle, ShufflePolicy::Before);
        assert_eq!(config.shm.prefix, "/fb_y");
    }

    #[test]
    fn test_output_format_from_str() {
        assert!(matches!("text".parse::<OutputFormat>(), Ok(OutputFormat::Text)));
        assert!(matches!("JSON".parse::<OutputFormat>(), Ok(OutputFormat::Json)));
        assert!("table".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_cli_with_config() {
        let cli = GeneratorCli::parse_from(["generator", "-c", "/path/to/fbarcset.yml", "0-1"]);
        assert_eq!(cli.config, Some(PathBuf::from("/path/to/fbarcset.yml")));
    }
}
