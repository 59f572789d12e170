//! Benchmark runner.
//!
//! The runner plans a suite into elements, orders them with the configured
//! arrangement and executes them one at a time through their unit's
//! executor, recording every sample and failure into a fresh result tree.
//! When the sequence is done the tree is handed to each output.

use std::collections::HashMap;

use thiserror::Error;
use tracing::{debug, info};

use meterbench_core::{
    Arrangement, BenchmarkResult, Element, MeterError, MeterSet, Output, OutputError, Recorder,
    ResultSink, Suite, UnitId,
};

use crate::config::Config;
use crate::executor::ExecutorCache;

/// Errors that abort a run.
///
/// Failures of benchmarked code never end up here; they are recorded in the
/// result tree.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// No meter is active, so nothing could be measured.
    #[error("No meters configured")]
    NoMeters,

    /// The meter set could not be assembled.
    #[error("Invalid meter set: {0}")]
    Meter(#[from] MeterError),

    /// An output failed to consume the result tree.
    #[error("Output failed: {0}")]
    Output(#[from] OutputError),
}

/// Runs benchmark suites.
pub struct Runner {
    /// Meters sampled around every benchmark invocation.
    meters: MeterSet,
    /// Execution-order strategy.
    arrangement: Box<dyn Arrangement>,
    /// Run count for units that declare none.
    default_runs: u32,
    /// Only units whose id contains this string are run.
    filter: Option<String>,
}

impl Runner {
    /// Create a runner with the given meters and arrangement.
    pub fn new(meters: MeterSet, arrangement: Box<dyn Arrangement>) -> Self {
        Self {
            meters,
            arrangement,
            default_runs: 1,
            filter: None,
        }
    }

    /// Create a runner from configuration, adding `extra` meters after the
    /// configured ones.
    ///
    /// # Errors
    ///
    /// Returns an error if meter names collide.
    pub fn from_config(config: &Config, extra: &MeterSet) -> Result<Self, RunnerError> {
        let mut meters = config.meters.build();
        for meter in extra.iter() {
            meters.register(meter.clone())?;
        }

        let arrangement = config.run.arrangement.build(config.run.seed);
        Ok(Self::new(meters, arrangement)
            .default_runs(config.run.default_runs)
            .filter(config.run.filter.clone()))
    }

    /// Set the run count for units that declare none.
    pub fn default_runs(mut self, runs: u32) -> Self {
        self.default_runs = runs.max(1);
        self
    }

    /// Restrict the run to units whose id contains `filter`.
    pub fn filter(mut self, filter: Option<String>) -> Self {
        self.filter = filter;
        self
    }

    pub fn meters(&self) -> &MeterSet {
        &self.meters
    }

    /// Run `suite` with a fresh executor cache.
    ///
    /// # Errors
    ///
    /// Returns an error if no meters are configured or an output fails.
    pub fn run(
        &self,
        suite: &Suite,
        outputs: &mut [Box<dyn Output>],
    ) -> Result<BenchmarkResult, RunnerError> {
        self.run_with(suite, &ExecutorCache::new(), outputs)
    }

    /// Run `suite` using the executors in `executors`.
    ///
    /// Executors left in `executors` by an earlier run are discarded first,
    /// so every run starts from fresh lifecycle state and fresh target
    /// instances. After the run the cache holds this run's executors.
    pub fn run_with(
        &self,
        suite: &Suite,
        executors: &ExecutorCache,
        outputs: &mut [Box<dyn Output>],
    ) -> Result<BenchmarkResult, RunnerError> {
        if self.meters.is_empty() {
            return Err(RunnerError::NoMeters);
        }
        executors.clear();

        let elements = self
            .arrangement
            .arrange(suite.plan(self.default_runs, self.filter.as_deref()));
        let schedule = Schedule::new(&elements);
        info!(
            elements = elements.len(),
            units = schedule.totals.len(),
            meters = self.meters.len(),
            "Starting benchmark run"
        );

        let mut result = BenchmarkResult::new();
        {
            let mut recorder = Recorder::new(&mut result, outputs);
            for (index, element) in elements.iter().enumerate() {
                self.run_element(element, &schedule, index, executors, &mut recorder);
            }
        }

        info!(
            failures = result.exceptions().len(),
            "Benchmark run complete"
        );

        for output in outputs.iter_mut() {
            output.visit_benchmark(&result)?;
        }

        Ok(result)
    }

    fn run_element(
        &self,
        element: &Element,
        schedule: &Schedule,
        index: usize,
        executors: &ExecutorCache,
        sink: &mut dyn ResultSink,
    ) {
        debug!(element = %element, "Running element");

        let executor = executors.get(element.unit());
        let mut executor = executor.lock();
        executor.run_element(
            element.arguments(),
            &self.meters,
            schedule.total(element.unit_id()),
            schedule.is_last(element.unit_id(), index),
            sink,
        );
    }
}

/// Occurrence bookkeeping over an arranged element sequence.
struct Schedule {
    /// Number of elements per unit.
    totals: HashMap<UnitId, u32>,
    /// Index of each unit's final element.
    last: HashMap<UnitId, usize>,
}

impl Schedule {
    fn new(elements: &[Element]) -> Self {
        let mut totals = HashMap::new();
        let mut last = HashMap::new();
        for (index, element) in elements.iter().enumerate() {
            *totals.entry(element.unit_id().clone()).or_insert(0) += 1;
            last.insert(element.unit_id().clone(), index);
        }
        Self { totals, last }
    }

    fn total(&self, unit: &UnitId) -> u32 {
        self.totals.get(unit).copied().unwrap_or(0)
    }

    fn is_last(&self, unit: &UnitId, index: usize) -> bool {
        self.last.get(unit) == Some(&index)
    }
}
