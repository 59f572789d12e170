//! Command-line interface for meterbench benchmark binaries.

use crate::config::Config;
use clap::Parser;
use meterbench_core::{ArrangementKind, Resolution};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "meterbench")]
#[command(about = "Run micro-benchmarks with lifecycle hooks and per-meter statistics")]
#[command(version)]
pub struct Cli {
    /// Only run benchmarks whose `Class::method` id contains this string
    pub filter: Option<String>,

    /// Run count for benchmark methods that declare none
    #[arg(long)]
    pub runs: Option<u32>,

    /// Execution order: none, sequential or shuffle
    #[arg(long)]
    pub arrangement: Option<ArrangementKind>,

    /// Seed for randomized arrangements
    #[arg(long)]
    pub seed: Option<u64>,

    /// Time meter resolution: s, ms, us or ns
    #[arg(long)]
    pub resolution: Option<Resolution>,

    /// Disable colored terminal output
    #[arg(long)]
    pub no_color: bool,

    /// Path to config file
    #[arg(long, default_value = ".meterbench.toml")]
    pub config: PathBuf,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Passed by `cargo bench` to custom harnesses
    #[arg(long, hide = true)]
    pub bench: bool,
}

impl Cli {
    /// Apply CLI overrides to the configuration.
    ///
    /// CLI arguments take precedence over config file values.
    /// Only non-None optional values will override the config.
    pub fn apply_to_config(&self, config: &mut Config) {
        if let Some(filter) = &self.filter {
            config.run.filter = Some(filter.clone());
        }

        if let Some(runs) = self.runs {
            config.run.default_runs = runs;
        }

        if let Some(arrangement) = self.arrangement {
            config.run.arrangement = arrangement;
        }

        if let Some(seed) = self.seed {
            config.run.seed = Some(seed);
        }

        if let Some(resolution) = self.resolution {
            config.meters.resolution = resolution;
        }

        if self.no_color {
            config.output.colors = false;
        }
    }
}
