//! Hierarchical result tree.
//!
//! [`BenchmarkResult`] → [`ClassResult`] → [`MethodResult`]. Every node keeps
//! its own per-meter sample multiset; a sample recorded for a method is also
//! appended to its class and to the root, so statistics at any level are
//! computed from that level's own samples. Meters are registered at a node
//! lazily, on the first sample the node receives for them.

use std::collections::BTreeMap;

use crate::failure::Failure;
use crate::meter::Meter;
use crate::unit::{ClassId, UnitId};

mod stats;

pub use stats::{percentile, Statistics};

/// Samples recorded for one meter at one node.
#[derive(Debug, Clone, PartialEq)]
pub struct MeterSamples {
    unit: String,
    values: Vec<f64>,
}

impl MeterSamples {
    /// Display unit of the meter that produced the samples.
    pub fn unit(&self) -> &str {
        &self.unit
    }

    /// Raw samples in recording order.
    pub fn values(&self) -> &[f64] {
        &self.values
    }
}

/// Per-meter sample storage of a node.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampleTable {
    meters: BTreeMap<String, MeterSamples>,
}

impl SampleTable {
    fn push(&mut self, meter: &dyn Meter, value: f64) {
        self.meters
            .entry(meter.name().to_string())
            .or_insert_with(|| MeterSamples {
                unit: meter.unit().to_string(),
                values: Vec::new(),
            })
            .values
            .push(value);
    }

    pub fn get(&self, meter: &str) -> Option<&MeterSamples> {
        self.meters.get(meter)
    }

    /// Names of meters with at least one sample.
    pub fn meters(&self) -> impl Iterator<Item = &str> {
        self.meters.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.meters.is_empty()
    }
}

/// Common view over every level of the result tree.
///
/// Statistic accessors return `None` when the meter never produced a sample
/// at this node.
pub trait ResultNode {
    /// Display name of the node.
    fn name(&self) -> String;

    fn samples(&self) -> &SampleTable;

    /// Direct children of this node. Not recursive.
    fn included_results(&self) -> Vec<&dyn ResultNode>;

    /// Names of the meters registered at this node.
    fn registered_meters(&self) -> Vec<&str> {
        self.samples().meters().collect()
    }

    fn values(&self, meter: &str) -> Option<&[f64]> {
        self.samples().get(meter).map(MeterSamples::values)
    }

    fn unit(&self, meter: &str) -> Option<&str> {
        self.samples().get(meter).map(MeterSamples::unit)
    }

    fn sample_count(&self, meter: &str) -> usize {
        self.values(meter).map_or(0, <[f64]>::len)
    }

    fn sum(&self, meter: &str) -> Option<f64> {
        self.values(meter).map(|v| v.iter().sum())
    }

    fn min(&self, meter: &str) -> Option<f64> {
        self.values(meter)?.iter().copied().reduce(f64::min)
    }

    fn max(&self, meter: &str) -> Option<f64> {
        self.values(meter)?.iter().copied().reduce(f64::max)
    }

    fn mean(&self, meter: &str) -> Option<f64> {
        let values = self.values(meter)?;
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }

    fn square_sum(&self, meter: &str) -> Option<f64> {
        self.values(meter).map(stats::square_sum)
    }

    fn standard_deviation(&self, meter: &str) -> Option<f64> {
        self.values(meter).map(stats::standard_deviation)
    }

    fn conf05(&self, meter: &str) -> Option<f64> {
        self.statistics(meter).map(|s| s.conf05)
    }

    fn conf95(&self, meter: &str) -> Option<f64> {
        self.statistics(meter).map(|s| s.conf95)
    }

    /// All statistics for `meter` in one pass.
    fn statistics(&self, meter: &str) -> Option<Statistics> {
        self.values(meter).and_then(Statistics::from_samples)
    }
}

/// Receives observations from the executor.
pub trait ResultSink {
    /// Record one sample of `meter` for `unit`.
    fn add_data(&mut self, unit: &UnitId, meter: &dyn Meter, value: f64);

    /// Record a failure.
    fn add_exception(&mut self, failure: Failure);
}

/// Results of one benchmark method.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodResult {
    unit: UnitId,
    samples: SampleTable,
}

impl MethodResult {
    fn new(unit: UnitId) -> Self {
        Self {
            unit,
            samples: SampleTable::default(),
        }
    }

    pub fn unit_id(&self) -> &UnitId {
        &self.unit
    }
}

impl ResultNode for MethodResult {
    fn name(&self) -> String {
        self.unit.method.clone()
    }

    fn samples(&self) -> &SampleTable {
        &self.samples
    }

    fn included_results(&self) -> Vec<&dyn ResultNode> {
        Vec::new()
    }
}

/// Results of every method of one target type.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassResult {
    class: ClassId,
    samples: SampleTable,
    methods: BTreeMap<UnitId, MethodResult>,
}

impl ClassResult {
    fn new(class: ClassId) -> Self {
        Self {
            class,
            samples: SampleTable::default(),
            methods: BTreeMap::new(),
        }
    }

    pub fn class(&self) -> &ClassId {
        &self.class
    }

    pub fn method(&self, unit: &UnitId) -> Option<&MethodResult> {
        self.methods.get(unit)
    }

    pub fn methods(&self) -> impl Iterator<Item = &MethodResult> {
        self.methods.values()
    }
}

impl ResultNode for ClassResult {
    fn name(&self) -> String {
        self.class.to_string()
    }

    fn samples(&self) -> &SampleTable {
        &self.samples
    }

    fn included_results(&self) -> Vec<&dyn ResultNode> {
        self.methods.values().map(|m| m as &dyn ResultNode).collect()
    }
}

/// Root of the result tree for one benchmark invocation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BenchmarkResult {
    samples: SampleTable,
    classes: BTreeMap<ClassId, ClassResult>,
    exceptions: Vec<Failure>,
}

impl BenchmarkResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn class(&self, class: &ClassId) -> Option<&ClassResult> {
        self.classes.get(class)
    }

    pub fn classes(&self) -> impl Iterator<Item = &ClassResult> {
        self.classes.values()
    }

    pub fn method(&self, unit: &UnitId) -> Option<&MethodResult> {
        self.classes.get(&unit.class)?.method(unit)
    }

    /// Failures recorded during the run, in the order they occurred.
    pub fn exceptions(&self) -> &[Failure] {
        &self.exceptions
    }
}

impl ResultSink for BenchmarkResult {
    fn add_data(&mut self, unit: &UnitId, meter: &dyn Meter, value: f64) {
        let class = self
            .classes
            .entry(unit.class.clone())
            .or_insert_with(|| ClassResult::new(unit.class.clone()));
        class
            .methods
            .entry(unit.clone())
            .or_insert_with(|| MethodResult::new(unit.clone()))
            .samples
            .push(meter, value);
        class.samples.push(meter, value);
        self.samples.push(meter, value);
    }

    fn add_exception(&mut self, failure: Failure) {
        self.exceptions.push(failure);
    }
}

impl ResultNode for BenchmarkResult {
    fn name(&self) -> String {
        "benchmark".to_string()
    }

    fn samples(&self) -> &SampleTable {
        &self.samples
    }

    fn included_results(&self) -> Vec<&dyn ResultNode> {
        self.classes.values().map(|c| c as &dyn ResultNode).collect()
    }
}
