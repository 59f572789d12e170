use thiserror::Error;

use crate::failure::Failure;
use crate::meter::Meter;
use crate::result::{BenchmarkResult, ResultSink};
use crate::unit::UnitId;

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Consumer of benchmark results.
///
/// The streaming hooks are called while the run is in progress; returning
/// `false` unsubscribes the output from further events of that kind. The
/// finished tree is handed over through [`Output::visit_benchmark`].
pub trait Output {
    fn visit_benchmark(&mut self, result: &BenchmarkResult) -> Result<(), OutputError>;

    fn on_sample(&mut self, _unit: &UnitId, _meter: &str, _value: f64) -> bool {
        true
    }

    fn on_exception(&mut self, _failure: &Failure) -> bool {
        true
    }
}

struct Listener<'a> {
    output: &'a mut dyn Output,
    samples: bool,
    exceptions: bool,
}

/// A [`ResultSink`] that records into a [`BenchmarkResult`] and streams every
/// observation to the subscribed outputs.
pub struct Recorder<'a> {
    result: &'a mut BenchmarkResult,
    listeners: Vec<Listener<'a>>,
}

impl<'a> Recorder<'a> {
    pub fn new(result: &'a mut BenchmarkResult, outputs: &'a mut [Box<dyn Output>]) -> Self {
        let listeners = outputs
            .iter_mut()
            .map(|output| Listener {
                output: output.as_mut(),
                samples: true,
                exceptions: true,
            })
            .collect();
        Self { result, listeners }
    }
}

impl ResultSink for Recorder<'_> {
    fn add_data(&mut self, unit: &UnitId, meter: &dyn Meter, value: f64) {
        self.result.add_data(unit, meter, value);
        for listener in self.listeners.iter_mut().filter(|l| l.samples) {
            listener.samples = listener.output.on_sample(unit, meter.name(), value);
        }
    }

    fn add_exception(&mut self, failure: Failure) {
        for listener in self.listeners.iter_mut().filter(|l| l.exceptions) {
            listener.exceptions = listener.output.on_exception(&failure);
        }
        self.result.add_exception(failure);
    }
}

mod terminal;
pub use terminal::TerminalOutput;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::failure::{CheckFailure, Violation};
    use crate::meter::TimeMeter;
    use crate::result::ResultNode;
    use crate::unit::{ClassId, MethodRef, Phase};
    use std::cell::Cell;
    use std::rc::Rc;

    #[derive(Default, Clone)]
    struct Counts {
        samples: Rc<Cell<usize>>,
        exceptions: Rc<Cell<usize>>,
    }

    struct Counting {
        counts: Counts,
        sample_limit: usize,
    }

    impl Output for Counting {
        fn visit_benchmark(&mut self, _result: &BenchmarkResult) -> Result<(), OutputError> {
            Ok(())
        }

        fn on_sample(&mut self, _unit: &UnitId, _meter: &str, _value: f64) -> bool {
            let seen = self.counts.samples.get() + 1;
            self.counts.samples.set(seen);
            seen < self.sample_limit
        }

        fn on_exception(&mut self, _failure: &Failure) -> bool {
            self.counts.exceptions.set(self.counts.exceptions.get() + 1);
            true
        }
    }

    fn failure() -> Failure {
        Failure::from(CheckFailure {
            method: MethodRef {
                class: ClassId::new("Io"),
                method: "open".to_string(),
                phase: Phase::BeforeClass,
            },
            violation: Violation::NotPublic,
        })
    }

    #[test]
    fn test_recorder_streams_until_unsubscribed() {
        let meter = TimeMeter::default();
        let unit = UnitId::new("Io", "read");
        let counts = Counts::default();
        let mut result = BenchmarkResult::new();
        let mut outputs: Vec<Box<dyn Output>> = vec![Box::new(Counting {
            counts: counts.clone(),
            sample_limit: 2,
        })];

        {
            let mut recorder = Recorder::new(&mut result, &mut outputs);
            for v in [1.0, 2.0, 3.0, 4.0] {
                recorder.add_data(&unit, &meter, v);
            }
            recorder.add_exception(failure());
            recorder.add_exception(failure());
        }

        // The listener stopped after its second sample
        assert_eq!(counts.samples.get(), 2);
        assert_eq!(counts.exceptions.get(), 2);

        // The tree records everything regardless of listeners
        assert_eq!(result.sample_count("time"), 4);
        assert_eq!(result.exceptions().len(), 2);
    }

    #[test]
    fn test_recorder_without_outputs() {
        let meter = TimeMeter::default();
        let mut result = BenchmarkResult::new();
        let mut outputs: Vec<Box<dyn Output>> = Vec::new();

        let mut recorder = Recorder::new(&mut result, &mut outputs);
        recorder.add_data(&UnitId::new("Io", "write"), &meter, 3.0);
        recorder.add_exception(failure());

        assert_eq!(result.sample_count("time"), 1);
        assert_eq!(result.exceptions().len(), 1);
    }
}
