//! Per-unit lifecycle execution.
//!
//! An [`Executor`] drives the hooks and body of one benchmark unit. It keeps
//! the once-only bookkeeping for the unit (class setup, first run, last run,
//! class teardown) across all of the unit's elements, together with the
//! target instance those hooks prepare, so exactly one executor must exist
//! per unit within a run; [`ExecutorCache`] hands them out.
//!
//! Nothing that fails inside user code stops execution. Check and invocation
//! failures are reported to the [`ResultSink`] and the next hook, phase or
//! element is attempted as usual.

use std::any::Any;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use meterbench_core::{
    check_method, invoke_method, Arguments, BenchmarkUnit, CheckResult, Failure, Hook,
    InvocationFailure, MeterSet, MethodRef, Phase, ResultSink, UnitId,
};

/// Snapshot of an executor's bookkeeping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecutorState {
    pub class_started: bool,
    pub first_run_done: bool,
    pub completed_runs: u32,
    pub last_run_done: bool,
    pub class_finished: bool,
}

/// Lifecycle state machine of one benchmark unit.
#[derive(Debug)]
pub struct Executor {
    unit: Arc<BenchmarkUnit>,
    state: ExecutorState,
    /// Created on the first element; `None` afterwards if construction failed.
    target: Option<Box<dyn Any + Send>>,
    instantiated: bool,
}

impl Executor {
    pub fn new(unit: Arc<BenchmarkUnit>) -> Self {
        Self {
            unit,
            state: ExecutorState::default(),
            target: None,
            instantiated: false,
        }
    }

    pub fn unit(&self) -> &Arc<BenchmarkUnit> {
        &self.unit
    }

    pub fn state(&self) -> ExecutorState {
        self.state
    }

    /// Run one element of the unit against the unit's own target instance.
    ///
    /// The instance is constructed on the first call. If construction fails
    /// the failure is reported once and every element of the unit is
    /// skipped. Returns whether samples were recorded.
    pub fn run_element(
        &mut self,
        arguments: &Arguments,
        meters: &MeterSet,
        total_runs: u32,
        last_occurrence: bool,
        sink: &mut dyn ResultSink,
    ) -> bool {
        if !self.instantiated {
            self.instantiated = true;
            match instantiate(&self.unit) {
                Ok(target) => self.target = Some(target),
                Err(failure) => self.report(Failure::Invocation(failure), sink),
            }
        }

        let Some(mut target) = self.target.take() else {
            debug!(unit = %self.unit.id(), "Skipping element without target instance");
            return false;
        };

        self.run_before_methods(&mut *target, sink);
        let recorded = self.run_bench(&mut *target, arguments, meters, sink);
        self.run_after_methods(&mut *target, total_runs, last_occurrence, sink);

        self.target = Some(target);
        recorded
    }

    /// Run the hooks preceding one benchmark invocation.
    ///
    /// Class setup runs on the first call only, first-run setup is attempted
    /// at most once whatever its outcome, and per-run setup runs every call.
    pub fn run_before_methods(&mut self, target: &mut dyn Any, sink: &mut dyn ResultSink) {
        if !self.state.class_started {
            self.run_phase(Phase::BeforeClass, target, sink);
            self.state.class_started = true;
        }

        if !self.state.first_run_done {
            self.run_phase(Phase::BeforeFirst, target, sink);
            self.state.first_run_done = true;
        }

        self.run_phase(Phase::BeforeEach, target, sink);
    }

    /// Invoke the benchmark body under every meter.
    ///
    /// On success one sample per meter is reported. A failed check or
    /// invocation is reported instead and no sample is recorded. Returns
    /// whether samples were recorded.
    pub fn run_bench(
        &mut self,
        target: &mut dyn Any,
        arguments: &Arguments,
        meters: &MeterSet,
        sink: &mut dyn ResultSink,
    ) -> bool {
        let class = self.unit.class();
        let body = self.unit.body();

        if let CheckResult::Failed(failure) = check_method(class, body, arguments.len()) {
            self.report(Failure::Check(failure), sink);
            return false;
        }

        let begins: Vec<f64> = meters.iter().map(|m| m.begin()).collect();
        let outcome = invoke_method(class, body, target, arguments);
        let values: Vec<f64> = meters
            .iter()
            .zip(&begins)
            .map(|(m, begin)| m.value(*begin))
            .collect();

        match outcome {
            Ok(()) => {
                for (meter, value) in meters.iter().zip(values) {
                    sink.add_data(self.unit.id(), meter.as_ref(), value);
                }
                true
            }
            Err(failure) => {
                self.report(Failure::Invocation(failure), sink);
                false
            }
        }
    }

    /// Run the hooks following one benchmark invocation.
    ///
    /// Per-run teardown runs every call. Last-run teardown runs once, as
    /// soon as `total_runs` completed runs have been counted. Class teardown
    /// runs once, when `last_occurrence` marks the unit's final element.
    pub fn run_after_methods(
        &mut self,
        target: &mut dyn Any,
        total_runs: u32,
        last_occurrence: bool,
        sink: &mut dyn ResultSink,
    ) {
        self.run_phase(Phase::AfterEach, target, sink);

        self.state.completed_runs += 1;
        if self.state.completed_runs >= total_runs && !self.state.last_run_done {
            self.run_phase(Phase::AfterLast, target, sink);
            self.state.last_run_done = true;
        }

        if last_occurrence && !self.state.class_finished {
            self.run_phase(Phase::AfterClass, target, sink);
            self.state.class_finished = true;
        }
    }

    /// Check then invoke every hook of `phase` in declaration order.
    fn run_phase(&self, phase: Phase, target: &mut dyn Any, sink: &mut dyn ResultSink) {
        let hooks = self.unit.hooks(phase);
        if hooks.is_empty() {
            return;
        }
        debug!(unit = %self.unit.id(), %phase, count = hooks.len(), "Running hooks");

        for hook in hooks {
            if let Err(failure) = self.run_hook(hook, target) {
                self.report(failure, sink);
            }
        }
    }

    fn run_hook(&self, hook: &Hook, target: &mut dyn Any) -> Result<(), Failure> {
        let class = self.unit.class();
        match check_method(class, hook, 0) {
            CheckResult::Ok => {
                invoke_method(class, hook, target, &Arguments::none())?;
                Ok(())
            }
            CheckResult::Failed(failure) => Err(failure.into()),
        }
    }

    fn report(&self, failure: Failure, sink: &mut dyn ResultSink) {
        warn!(unit = %self.unit.id(), "{}", failure);
        sink.add_exception(failure);
    }
}

/// Construct a target instance for `unit`.
fn instantiate(unit: &BenchmarkUnit) -> Result<Box<dyn Any + Send>, InvocationFailure> {
    let method = MethodRef {
        class: unit.class().clone(),
        method: "new".to_string(),
        phase: Phase::Instantiate,
    };

    match panic::catch_unwind(AssertUnwindSafe(|| unit.factory().create())) {
        Ok(Ok(instance)) => Ok(instance),
        Ok(Err(error)) => Err(InvocationFailure {
            method,
            cause: format!("{:#}", error),
            panicked: false,
        }),
        Err(_) => Err(InvocationFailure {
            method,
            cause: "target construction panicked".to_string(),
            panicked: true,
        }),
    }
}

/// The executors of one run, one per unit identity.
///
/// Lookup and insertion are guarded by the cache lock; each executor has its
/// own lock guarding its state transitions.
#[derive(Debug, Default)]
pub struct ExecutorCache {
    executors: Mutex<HashMap<UnitId, Arc<Mutex<Executor>>>>,
}

impl ExecutorCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The executor for `unit`, created on first request.
    pub fn get(&self, unit: &Arc<BenchmarkUnit>) -> Arc<Mutex<Executor>> {
        let mut executors = self.executors.lock();
        Arc::clone(
            executors
                .entry(unit.id().clone())
                .or_insert_with(|| Arc::new(Mutex::new(Executor::new(Arc::clone(unit))))),
        )
    }

    /// State of the executor for `unit`, if one was created.
    pub fn state(&self, unit: &UnitId) -> Option<ExecutorState> {
        let executors = self.executors.lock();
        executors.get(unit).map(|e| e.lock().state())
    }

    pub fn len(&self) -> usize {
        self.executors.lock().len()
    }

    /// Drop every executor, along with its state and target instance.
    pub fn clear(&self) {
        self.executors.lock().clear();
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meterbench_core::{
        BenchmarkResult, Callable, CounterMeter, ResultNode, Signature, Suite, Target,
        TimeMeter, Visibility,
    };

    /// Records how often each hook ran.
    #[derive(Debug, Default)]
    struct Probe {
        calls: Vec<&'static str>,
    }

    impl Probe {
        fn count(&self, name: &str) -> usize {
            self.calls.iter().filter(|c| **c == name).count()
        }
    }

    fn record(name: &'static str) -> impl Fn(&mut Probe) -> anyhow::Result<()> + Send + Sync {
        move |p: &mut Probe| {
            p.calls.push(name);
            Ok(())
        }
    }

    fn probe_target() -> Target<Probe> {
        Target::new("Probe", Probe::default)
            .before_class("before_class", record("before_class"))
            .before_first("before_first", record("before_first"))
            .before_each("before_each", record("before_each"))
            .after_each("after_each", record("after_each"))
            .after_last("after_last", record("after_last"))
            .after_class("after_class", record("after_class"))
            .bench("body", record("body"))
    }

    fn unit_of(target: Target<Probe>) -> Arc<BenchmarkUnit> {
        Arc::clone(&Suite::new().with(target).unwrap().units()[0])
    }

    fn meters() -> MeterSet {
        MeterSet::new().with(TimeMeter::default()).unwrap()
    }

    #[test]
    fn test_before_methods_once_only() {
        let mut executor = Executor::new(unit_of(probe_target()));
        let mut probe = Probe::default();
        let mut result = BenchmarkResult::new();

        for _ in 0..3 {
            executor.run_before_methods(&mut probe, &mut result);
        }

        assert_eq!(probe.count("before_class"), 1);
        assert_eq!(probe.count("before_first"), 1);
        assert_eq!(probe.count("before_each"), 3);
        assert!(executor.state().class_started);
        assert!(executor.state().first_run_done);
        assert!(result.exceptions().is_empty());
    }

    #[test]
    fn test_hook_order_within_call() {
        let mut executor = Executor::new(unit_of(probe_target()));
        let mut probe = Probe::default();
        let mut result = BenchmarkResult::new();

        executor.run_before_methods(&mut probe, &mut result);
        executor.run_bench(&mut probe, &Arguments::none(), &meters(), &mut result);
        executor.run_after_methods(&mut probe, 1, true, &mut result);

        assert_eq!(
            probe.calls,
            vec![
                "before_class",
                "before_first",
                "before_each",
                "body",
                "after_each",
                "after_last",
                "after_class"
            ]
        );
    }

    #[test]
    fn test_after_last_waits_for_total_runs() {
        let mut executor = Executor::new(unit_of(probe_target()));
        let mut probe = Probe::default();
        let mut result = BenchmarkResult::new();

        executor.run_after_methods(&mut probe, 3, false, &mut result);
        executor.run_after_methods(&mut probe, 3, false, &mut result);
        assert_eq!(probe.count("after_last"), 0);
        assert!(!executor.state().last_run_done);

        executor.run_after_methods(&mut probe, 3, false, &mut result);
        assert_eq!(probe.count("after_last"), 1);

        executor.run_after_methods(&mut probe, 3, false, &mut result);
        executor.run_after_methods(&mut probe, 3, true, &mut result);
        assert_eq!(probe.count("after_last"), 1);
        assert_eq!(probe.count("after_each"), 5);
        assert_eq!(probe.count("after_class"), 1);
        assert_eq!(executor.state().completed_runs, 5);
    }

    #[test]
    fn test_after_class_runs_once() {
        let mut executor = Executor::new(unit_of(probe_target()));
        let mut probe = Probe::default();
        let mut result = BenchmarkResult::new();

        executor.run_after_methods(&mut probe, 1, true, &mut result);
        executor.run_after_methods(&mut probe, 1, true, &mut result);

        assert_eq!(probe.count("after_class"), 1);
        assert!(executor.state().class_finished);
    }

    #[test]
    fn test_failing_before_first_not_retried() {
        let target = probe_target().before_first("flaky", |_: &mut Probe| {
            anyhow::bail!("fixture unavailable")
        });
        let mut executor = Executor::new(unit_of(target));
        let mut probe = Probe::default();
        let mut result = BenchmarkResult::new();

        executor.run_before_methods(&mut probe, &mut result);
        executor.run_before_methods(&mut probe, &mut result);

        assert_eq!(result.exceptions().len(), 1);
        assert_eq!(result.exceptions()[0].phase(), Phase::BeforeFirst);
        assert!(executor.state().first_run_done);
    }

    #[test]
    fn test_failing_hook_does_not_block_later_hooks() {
        let target = Target::new("Probe", Probe::default)
            .before_class("broken", |_: &mut Probe| -> anyhow::Result<()> {
                panic!("setup exploded")
            })
            .before_class("after_broken", record("after_broken"))
            .before_each("before_each", record("before_each"))
            .bench("body", record("body"));
        let mut executor = Executor::new(unit_of(target));
        let mut probe = Probe::default();
        let mut result = BenchmarkResult::new();

        executor.run_before_methods(&mut probe, &mut result);

        assert_eq!(probe.count("after_broken"), 1);
        assert_eq!(probe.count("before_each"), 1);
        assert_eq!(result.exceptions().len(), 1);
        assert!(executor.state().class_started);
    }

    #[test]
    fn test_check_failure_skips_invocation() {
        let private = Hook::new(
            "hidden",
            Phase::BeforeEach,
            Callable::new(|p: &mut Probe, _: &Arguments| {
                p.calls.push("hidden");
                Ok(())
            }),
        )
        .with_signature(Signature {
            visibility: Visibility::Private,
            ..Signature::valid()
        });
        let mut executor = Executor::new(unit_of(probe_target().hook(private)));
        let mut probe = Probe::default();
        let mut result = BenchmarkResult::new();

        executor.run_before_methods(&mut probe, &mut result);

        assert_eq!(probe.count("hidden"), 0);
        assert_eq!(probe.count("before_each"), 1);
        assert_eq!(result.exceptions().len(), 1);
        assert!(result.exceptions()[0].is_check());
        assert_eq!(result.exceptions()[0].method().method, "hidden");
    }

    #[test]
    fn test_run_bench_records_one_sample_per_meter() {
        let (ops, handle) = CounterMeter::new("ops", "ops");
        let meters = meters().with(ops).unwrap();
        let target = Target::new("Probe", Probe::default).bench("tick", move |_: &mut Probe| {
            handle.add(3);
            Ok(())
        });
        let unit = unit_of(target);
        let mut executor = Executor::new(Arc::clone(&unit));
        let mut probe = Probe::default();
        let mut result = BenchmarkResult::new();

        assert!(executor.run_bench(&mut probe, &Arguments::none(), &meters, &mut result));

        let method = result.method(unit.id()).unwrap();
        assert_eq!(method.sample_count("time"), 1);
        assert_eq!(method.values("ops"), Some(&[3.0][..]));
    }

    #[test]
    fn test_failed_bench_records_no_sample() {
        let target = Target::new("Probe", Probe::default)
            .bench("fails", |_: &mut Probe| anyhow::bail!("bad input"));
        let unit = unit_of(target);
        let mut executor = Executor::new(Arc::clone(&unit));
        let mut probe = Probe::default();
        let mut result = BenchmarkResult::new();

        assert!(!executor.run_bench(&mut probe, &Arguments::none(), &meters(), &mut result));

        assert!(result.method(unit.id()).is_none());
        assert!(result.registered_meters().is_empty());
        assert_eq!(result.exceptions().len(), 1);
        assert_eq!(result.exceptions()[0].phase(), Phase::Bench);
    }

    #[test]
    fn test_bench_arity_checked_against_arguments() {
        let mut executor = Executor::new(unit_of(probe_target()));
        let mut probe = Probe::default();
        let mut result = BenchmarkResult::new();
        let arguments = Arguments::new(vec![1.into()]);

        assert!(!executor.run_bench(&mut probe, &arguments, &meters(), &mut result));
        assert_eq!(probe.count("body"), 0);
        assert!(result.exceptions()[0].is_check());
    }

    #[test]
    fn test_target_type_mismatch_is_invocation_failure() {
        let mut executor = Executor::new(unit_of(probe_target()));
        let mut wrong = String::new();
        let mut result = BenchmarkResult::new();

        executor.run_before_methods(&mut wrong, &mut result);

        assert_eq!(result.exceptions().len(), 3);
        assert!(result.exceptions().iter().all(|f| !f.is_check()));
    }

    #[test]
    fn test_run_element_keeps_instance_across_elements() {
        let target = Target::new("Probe", Probe::default)
            .runs(3)
            .before_first("before_first", record("before_first"))
            .bench("body", |p: &mut Probe| {
                anyhow::ensure!(p.count("before_first") == 1, "instance was not prepared");
                Ok(())
            });
        let mut executor = Executor::new(unit_of(target));
        let mut result = BenchmarkResult::new();

        for run in 1..=3 {
            assert!(executor.run_element(&Arguments::none(), &meters(), 3, run == 3, &mut result));
        }

        assert!(result.exceptions().is_empty());
        assert_eq!(result.sample_count("time"), 3);
        assert_eq!(executor.state().completed_runs, 3);
        assert!(executor.state().class_finished);
    }

    #[test]
    fn test_run_element_reports_failed_construction_once() {
        let target = Target::<Probe>::with_factory(
            "Probe",
            meterbench_core::Factory::fallible(|| -> anyhow::Result<Probe> {
                anyhow::bail!("no fixture")
            }),
        )
        .before_class("before_class", record("before_class"))
        .bench("body", record("body"));
        let mut executor = Executor::new(unit_of(target));
        let mut result = BenchmarkResult::new();

        assert!(!executor.run_element(&Arguments::none(), &meters(), 2, false, &mut result));
        assert!(!executor.run_element(&Arguments::none(), &meters(), 2, true, &mut result));

        assert_eq!(result.exceptions().len(), 1);
        assert_eq!(result.exceptions()[0].phase(), Phase::Instantiate);
        assert_eq!(executor.state(), ExecutorState::default());
    }

    #[test]
    fn test_cache_clear_drops_executors() {
        let suite = Suite::new().with(probe_target()).unwrap();
        let cache = ExecutorCache::new();
        cache.get(&suite.units()[0]).lock().state.completed_runs = 1;

        cache.clear();

        assert!(cache.is_empty());
        assert_eq!(
            cache.get(&suite.units()[0]).lock().state(),
            ExecutorState::default()
        );
    }

    #[test]
    fn test_cache_returns_single_executor_per_unit() {
        let suite = Suite::new().with(probe_target()).unwrap();
        let unit = &suite.units()[0];
        let cache = ExecutorCache::new();

        let first = cache.get(unit);
        let second = cache.get(unit);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);

        // An independently resolved descriptor of the same method shares it
        let again = Suite::new().with(probe_target()).unwrap();
        let third = cache.get(&again.units()[0]);
        assert!(Arc::ptr_eq(&first, &third));

        first.lock().state.completed_runs = 2;
        assert_eq!(cache.state(unit.id()).map(|s| s.completed_runs), Some(2));
        assert!(cache.state(&UnitId::new("Probe", "other")).is_none());
    }
}
