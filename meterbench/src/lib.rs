//! meterbench: micro-benchmark execution with lifecycle hooks
//!
//! This library runs benchmark methods declared on target types under a set
//! of meters, honoring once-only setup and teardown hooks, and aggregates
//! the samples into a per-class, per-method statistics tree. Failures in
//! benchmarked code are recorded without aborting the run.
//!
//! A `harness = false` bench target typically builds a [`Suite`] and hands
//! it to [`main_with`]:
//!
//! ```no_run
//! use meterbench::{main_with, Suite, Target};
//!
//! fn main() -> anyhow::Result<()> {
//!     let suite = Suite::new().with(
//!         Target::new("VecBench", Vec::<u64>::new)
//!             .runs(100)
//!             .before_each("clear", |v: &mut Vec<u64>| {
//!                 v.clear();
//!                 Ok(())
//!             })
//!             .bench("push_1k", |v: &mut Vec<u64>| {
//!                 v.extend(0..1_000);
//!                 Ok(())
//!             }),
//!     )?;
//!     main_with(suite)
//! }
//! ```

pub mod cli;
pub mod config;
pub mod executor;
pub mod runner;

// Re-export core types for convenience
pub use meterbench_core::{
    Arguments, Arrangement, ArrangementKind, BenchMethod, BenchmarkResult, ClassResult,
    CounterHandle, CounterMeter, Factory, Failure, Meter, MeterError, MeterSet, MethodResult,
    NoArrangement, Output, OutputError, Phase, Resolution, ResultNode, Sequential, Shuffle,
    Signature, Statistics, Suite, Target, TerminalOutput, TimeMeter, UnitError, UnitId,
};

// Re-export main types from this crate
pub use cli::Cli;
pub use config::Config;
pub use executor::{Executor, ExecutorCache, ExecutorState};
pub use runner::{Runner, RunnerError};

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;

/// A suite together with the extra meters and outputs of one run.
pub struct Harness {
    suite: Suite,
    meters: MeterSet,
    outputs: Vec<Box<dyn Output>>,
}

impl Harness {
    pub fn new(suite: Suite) -> Self {
        Self {
            suite,
            meters: MeterSet::new(),
            outputs: Vec::new(),
        }
    }

    /// Add a meter on top of the configured built-in ones.
    ///
    /// # Errors
    ///
    /// Returns an error if a meter with the same name was already added.
    pub fn meter(mut self, meter: impl Meter + 'static) -> Result<Self, MeterError> {
        self.meters.register(Arc::new(meter))?;
        Ok(self)
    }

    /// Add an output that receives streamed samples and the final tree.
    pub fn output(mut self, output: impl Output + 'static) -> Self {
        self.outputs.push(Box::new(output));
        self
    }

    /// Run the suite with `config`.
    ///
    /// The terminal output, when enabled, is visited before the added
    /// outputs.
    pub fn run(self, config: &Config) -> Result<BenchmarkResult, RunnerError> {
        let runner = Runner::from_config(config, &self.meters)?;

        let mut outputs: Vec<Box<dyn Output>> = Vec::with_capacity(self.outputs.len() + 1);
        if config.output.terminal {
            let terminal = if config.output.colors {
                TerminalOutput::new()
            } else {
                TerminalOutput::without_colors()
            };
            outputs.push(Box::new(terminal));
        }
        outputs.extend(self.outputs);

        runner.run(&self.suite, &mut outputs)
    }

    /// Load configuration as directed by `cli`, apply its overrides and run.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be loaded or the run
    /// cannot start.
    pub fn run_with_cli(self, cli: &Cli) -> Result<BenchmarkResult> {
        let mut config = if cli.config.exists() {
            Config::load(&cli.config)?
        } else {
            Config::default()
        };
        cli.apply_to_config(&mut config);
        config.validate().context("Invalid command-line overrides")?;

        tracing::debug!(?config, "Configuration");
        self.run(&config).context("Benchmark run failed")
    }

    /// Parse the process arguments, initialize logging and run.
    pub fn main(self) -> Result<()> {
        let cli = Cli::parse();
        init_logging(cli.verbose);

        self.run_with_cli(&cli)?;
        Ok(())
    }
}

/// Entry point for `harness = false` bench targets.
///
/// Parses the process arguments, initializes logging and runs `suite`.
///
/// # Errors
///
/// Returns an error if configuration is invalid or the run cannot complete.
/// Failures inside benchmarked code are reported, not returned.
pub fn main_with(suite: Suite) -> Result<()> {
    Harness::new(suite).main()
}

/// Initialize logging, honoring `RUST_LOG` when it is set.
pub fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let level = if verbose {
        "meterbench=debug,meterbench_core=debug"
    } else {
        "meterbench=info,meterbench_core=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .try_init()
        .ok(); // Ignore error if already initialized
}
