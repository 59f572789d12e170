//! Measurement instruments.
//!
//! A meter produces one numeric sample per invocation window. The executor
//! calls [`Meter::begin`] right before the benchmark body runs and
//! [`Meter::value`] right after it returns; the difference between the two
//! readings is the sample.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while assembling the active meter set.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MeterError {
    /// Two meters share the same name.
    #[error("Duplicate meter name: {0}")]
    Duplicate(String),
}

/// A named measurement instrument.
///
/// Meters are stateless with respect to benchmark structure. A meter's name
/// is its identity and its unit never changes after construction.
pub trait Meter: Send + Sync {
    /// Name identifying the meter in results.
    fn name(&self) -> &str;

    /// Display unit of the produced samples.
    fn unit(&self) -> &str;

    /// Take the opening reading of an invocation window.
    fn begin(&self) -> f64;

    /// Close the window opened by `begin` and return the sample.
    fn value(&self, begin: f64) -> f64;
}

/// Resolution of a [`TimeMeter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resolution {
    Seconds,
    Millis,
    Micros,
    #[default]
    Nanos,
}

impl Resolution {
    /// Unit string for samples taken at this resolution.
    pub fn unit(&self) -> &'static str {
        match self {
            Resolution::Seconds => "s",
            Resolution::Millis => "ms",
            Resolution::Micros => "us",
            Resolution::Nanos => "ns",
        }
    }

    /// Number of nanoseconds in one unit of this resolution.
    fn nanos_per_unit(&self) -> f64 {
        match self {
            Resolution::Seconds => 1_000_000_000.0,
            Resolution::Millis => 1_000_000.0,
            Resolution::Micros => 1_000.0,
            Resolution::Nanos => 1.0,
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Resolution::Seconds => "seconds",
            Resolution::Millis => "millis",
            Resolution::Micros => "micros",
            Resolution::Nanos => "nanos",
        };
        write!(f, "{}", name)
    }
}

impl std::str::FromStr for Resolution {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "s" | "seconds" => Ok(Resolution::Seconds),
            "ms" | "millis" => Ok(Resolution::Millis),
            "us" | "micros" => Ok(Resolution::Micros),
            "ns" | "nanos" => Ok(Resolution::Nanos),
            other => Err(format!("unknown resolution: {}", other)),
        }
    }
}

/// Wall-clock timer reading a monotonic clock at the start and end of the
/// invocation window.
#[derive(Debug, Clone)]
pub struct TimeMeter {
    name: String,
    resolution: Resolution,
    origin: Instant,
}

impl TimeMeter {
    /// Default name of the wall-clock meter.
    pub const DEFAULT_NAME: &'static str = "time";

    /// Create a timer with the given resolution named `time`.
    pub fn new(resolution: Resolution) -> Self {
        Self::named(Self::DEFAULT_NAME, resolution)
    }

    /// Create a timer with a custom name.
    pub fn named(name: impl Into<String>, resolution: Resolution) -> Self {
        Self {
            name: name.into(),
            resolution,
            origin: Instant::now(),
        }
    }

    /// Resolution this timer reports in.
    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    fn now_ns(&self) -> f64 {
        self.origin.elapsed().as_nanos() as f64
    }
}

impl Default for TimeMeter {
    fn default() -> Self {
        Self::new(Resolution::default())
    }
}

impl Meter for TimeMeter {
    fn name(&self) -> &str {
        &self.name
    }

    fn unit(&self) -> &str {
        self.resolution.unit()
    }

    fn begin(&self) -> f64 {
        self.now_ns()
    }

    fn value(&self, begin: f64) -> f64 {
        (self.now_ns() - begin) / self.resolution.nanos_per_unit()
    }
}

/// Handle the benchmarked code uses to tick a [`CounterMeter`].
#[derive(Debug, Clone, Default)]
pub struct CounterHandle {
    count: Arc<AtomicU64>,
}

impl CounterHandle {
    /// Increment the counter by one.
    pub fn tick(&self) {
        self.add(1);
    }

    /// Increment the counter by `n`.
    pub fn add(&self, n: u64) {
        self.count.fetch_add(n, Ordering::Relaxed);
    }

    /// Current counter value.
    pub fn get(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }
}

/// Monotonic counter incremented externally by the code under test.
///
/// The sample is the number of ticks observed during the invocation window.
#[derive(Debug, Clone)]
pub struct CounterMeter {
    name: String,
    unit: String,
    handle: CounterHandle,
}

impl CounterMeter {
    /// Create a counter meter and the handle used to tick it.
    pub fn new(name: impl Into<String>, unit: impl Into<String>) -> (Self, CounterHandle) {
        let handle = CounterHandle::default();
        let meter = Self {
            name: name.into(),
            unit: unit.into(),
            handle: handle.clone(),
        };
        (meter, handle)
    }

    /// Another handle to the same counter.
    pub fn handle(&self) -> CounterHandle {
        self.handle.clone()
    }
}

impl Meter for CounterMeter {
    fn name(&self) -> &str {
        &self.name
    }

    fn unit(&self) -> &str {
        &self.unit
    }

    fn begin(&self) -> f64 {
        self.handle.get() as f64
    }

    fn value(&self, begin: f64) -> f64 {
        self.handle.get() as f64 - begin
    }
}

/// The ordered set of meters active for a run.
#[derive(Clone, Default)]
pub struct MeterSet {
    meters: Vec<Arc<dyn Meter>>,
}

impl MeterSet {
    /// Create an empty meter set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a meter. Names must be unique within the set.
    pub fn register(&mut self, meter: Arc<dyn Meter>) -> Result<(), MeterError> {
        if self.get(meter.name()).is_some() {
            return Err(MeterError::Duplicate(meter.name().to_string()));
        }
        self.meters.push(meter);
        Ok(())
    }

    /// Builder-style variant of [`MeterSet::register`].
    pub fn with(mut self, meter: impl Meter + 'static) -> Result<Self, MeterError> {
        self.register(Arc::new(meter))?;
        Ok(self)
    }

    /// Look up a meter by name.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Meter>> {
        self.meters.iter().find(|m| m.name() == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Meter>> {
        self.meters.iter()
    }

    pub fn len(&self) -> usize {
        self.meters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.meters.is_empty()
    }
}

impl fmt::Debug for MeterSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.meters.iter().map(|m| (m.name(), m.unit())))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_resolution_units() {
        assert_eq!(Resolution::Seconds.unit(), "s");
        assert_eq!(Resolution::Millis.unit(), "ms");
        assert_eq!(Resolution::Micros.unit(), "us");
        assert_eq!(Resolution::Nanos.unit(), "ns");
    }

    #[test]
    fn test_resolution_from_str() {
        assert_eq!("millis".parse::<Resolution>(), Ok(Resolution::Millis));
        assert_eq!("US".parse::<Resolution>(), Ok(Resolution::Micros));
        assert!("fortnights".parse::<Resolution>().is_err());
    }

    #[test]
    fn test_time_meter_measures_elapsed() {
        let meter = TimeMeter::new(Resolution::Millis);
        let begin = meter.begin();
        thread::sleep(Duration::from_millis(5));
        let value = meter.value(begin);

        assert!(value >= 5.0, "expected at least 5ms, got {}", value);
        assert_eq!(meter.unit(), "ms");
        assert_eq!(meter.name(), "time");
    }

    #[test]
    fn test_counter_meter_reports_delta() {
        let (meter, handle) = CounterMeter::new("ops", "ops");
        handle.add(10);

        let begin = meter.begin();
        handle.tick();
        handle.tick();
        handle.tick();

        assert_eq!(meter.value(begin), 3.0);
        assert_eq!(handle.get(), 13);
        assert_eq!(meter.handle().get(), 13);
    }

    #[test]
    fn test_meter_set_rejects_duplicates() {
        let (counter, _) = CounterMeter::new("time", "ticks");
        let result = MeterSet::new()
            .with(TimeMeter::default())
            .and_then(|set| set.with(counter));

        assert_eq!(result.err(), Some(MeterError::Duplicate("time".to_string())));
    }

    #[test]
    fn test_meter_set_lookup() {
        let (counter, _) = CounterMeter::new("allocs", "allocs");
        let set = MeterSet::new()
            .with(TimeMeter::default())
            .unwrap()
            .with(counter)
            .unwrap();

        assert_eq!(set.len(), 2);
        assert_eq!(set.get("allocs").map(|m| m.unit()), Some("allocs"));
        assert!(set.get("missing").is_none());
        let names: Vec<&str> = set.iter().map(|m| m.name()).collect();
        assert_eq!(names, vec!["time", "allocs"]);
    }
}
