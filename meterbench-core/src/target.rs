//! Declaring benchmark targets.
//!
//! A [`Target`] collects everything discovery resolved for one target type:
//! how to construct it, its class-level run count, the lifecycle hooks per
//! phase and the benchmark methods. [`Target::build`] validates the
//! construction-time contracts and produces one [`BenchmarkUnit`] per
//! benchmark method; a [`Suite`] gathers units from several targets and
//! plans them into [`Element`]s.

use std::collections::HashSet;
use std::marker::PhantomData;
use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use crate::element::{Arguments, Element, ElementId};
use crate::unit::{
    BenchmarkUnit, Callable, ClassId, Factory, Hook, HookTable, Phase, Signature, UnitId,
};

/// Construction-time validation errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum UnitError {
    /// A target or method was given an empty name.
    #[error("Empty name in target '{0}'")]
    EmptyName(String),

    /// A run count of zero was declared.
    #[error("Run count for '{0}' must be at least 1")]
    ZeroRuns(String),

    /// The same hook method was declared twice for one phase.
    #[error("Hook '{name}' declared more than once for {phase} in '{class}'")]
    DuplicateHook {
        class: String,
        name: String,
        phase: Phase,
    },

    /// A hook was declared for a phase that does not take hooks.
    #[error("'{name}' in '{class}' cannot be a hook for {phase}")]
    InvalidHookPhase {
        class: String,
        name: String,
        phase: Phase,
    },

    /// Two benchmark methods share a name.
    #[error("Duplicate benchmark: {0}")]
    DuplicateBenchmark(String),

    /// Argument tuples of a parameterized method differ in length.
    #[error("Argument sets for '{unit}' have inconsistent lengths: expected {expected}, found {found}")]
    ArgumentArity {
        unit: String,
        expected: usize,
        found: usize,
    },

    /// A target declared no benchmark methods.
    #[error("Target '{0}' declares no benchmark methods")]
    NoBenchmarks(String),
}

/// A benchmark method declaration.
#[derive(Debug, Clone)]
pub struct BenchMethod {
    hook: Hook,
    runs: Option<u32>,
    argument_sets: Vec<Arguments>,
    skip: bool,
}

impl BenchMethod {
    /// A plain benchmark method.
    pub fn new<T, F>(name: impl Into<String>, f: F) -> Self
    where
        T: 'static,
        F: Fn(&mut T) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let callable = Callable::new(move |target: &mut T, _: &Arguments| f(target));
        Self {
            hook: Hook::new(name, Phase::Bench, callable),
            runs: None,
            argument_sets: Vec::new(),
            skip: false,
        }
    }

    /// A method invoked once per argument tuple in `argument_sets`.
    pub fn parameterized<T, F>(name: impl Into<String>, argument_sets: Vec<Arguments>, f: F) -> Self
    where
        T: 'static,
        F: Fn(&mut T, &Arguments) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let arity = argument_sets.first().map(Arguments::len).unwrap_or(0);
        let hook = Hook::new(name, Phase::Bench, Callable::new(f))
            .with_signature(Signature::with_arity(arity));
        Self {
            hook,
            runs: None,
            argument_sets,
            skip: false,
        }
    }

    /// Method-level run count, overriding the target's.
    pub fn runs(mut self, runs: u32) -> Self {
        self.runs = Some(runs);
        self
    }

    /// Exclude the method from scheduling.
    pub fn skip(mut self) -> Self {
        self.skip = true;
        self
    }

    /// Override the resolved signature.
    pub fn signature(mut self, signature: Signature) -> Self {
        self.hook = self.hook.with_signature(signature);
        self
    }
}

/// Builder for the units of one target type.
pub struct Target<T> {
    class: ClassId,
    factory: Factory,
    runs: Option<u32>,
    hooks: Vec<Hook>,
    methods: Vec<BenchMethod>,
    _target: PhantomData<fn() -> T>,
}

impl<T: Send + 'static> Target<T> {
    /// Declare a target constructed by `factory`.
    pub fn new<F>(name: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self::with_factory(name, Factory::new(factory))
    }

    /// Declare a target with an explicit (possibly fallible) factory.
    pub fn with_factory(name: impl Into<String>, factory: Factory) -> Self {
        Self {
            class: ClassId::new(name),
            factory,
            runs: None,
            hooks: Vec::new(),
            methods: Vec::new(),
            _target: PhantomData,
        }
    }

    /// Class-level run count.
    pub fn runs(mut self, runs: u32) -> Self {
        self.runs = Some(runs);
        self
    }

    /// Add an already-resolved hook descriptor.
    pub fn hook(mut self, hook: Hook) -> Self {
        self.hooks.push(hook);
        self
    }

    fn typed_hook<F>(self, name: impl Into<String>, phase: Phase, f: F) -> Self
    where
        F: Fn(&mut T) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let callable = Callable::new(move |target: &mut T, _: &Arguments| f(target));
        self.hook(Hook::new(name, phase, callable))
    }

    pub fn before_class<F>(self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&mut T) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.typed_hook(name, Phase::BeforeClass, f)
    }

    pub fn before_first<F>(self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&mut T) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.typed_hook(name, Phase::BeforeFirst, f)
    }

    pub fn before_each<F>(self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&mut T) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.typed_hook(name, Phase::BeforeEach, f)
    }

    pub fn after_each<F>(self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&mut T) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.typed_hook(name, Phase::AfterEach, f)
    }

    pub fn after_last<F>(self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&mut T) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.typed_hook(name, Phase::AfterLast, f)
    }

    pub fn after_class<F>(self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&mut T) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.typed_hook(name, Phase::AfterClass, f)
    }

    /// Add a plain benchmark method.
    pub fn bench<F>(self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&mut T) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.method(BenchMethod::new(name, f))
    }

    /// Add a parameterized benchmark method.
    pub fn bench_with_args<F>(self, name: impl Into<String>, argument_sets: Vec<Arguments>, f: F) -> Self
    where
        F: Fn(&mut T, &Arguments) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.method(BenchMethod::parameterized(name, argument_sets, f))
    }

    /// Add a fully specified benchmark method.
    pub fn method(mut self, method: BenchMethod) -> Self {
        self.methods.push(method);
        self
    }

    /// Validate the declarations and resolve one unit per benchmark method.
    pub fn build(self) -> Result<Vec<BenchmarkUnit>, UnitError> {
        let class_name = self.class.as_str().to_string();
        if class_name.is_empty() {
            return Err(UnitError::EmptyName(class_name));
        }
        if self.runs == Some(0) {
            return Err(UnitError::ZeroRuns(class_name));
        }
        if self.methods.is_empty() {
            return Err(UnitError::NoBenchmarks(class_name));
        }

        let mut table = HookTable::default();
        let mut seen = HashSet::new();
        for hook in self.hooks {
            if hook.name().is_empty() {
                return Err(UnitError::EmptyName(class_name));
            }
            if !seen.insert((hook.phase(), hook.name().to_string())) {
                return Err(UnitError::DuplicateHook {
                    class: class_name,
                    name: hook.name().to_string(),
                    phase: hook.phase(),
                });
            }
            table.push(hook).map_err(|hook| UnitError::InvalidHookPhase {
                class: class_name.clone(),
                name: hook.name().to_string(),
                phase: hook.phase(),
            })?;
        }

        let mut names = HashSet::new();
        let mut units = Vec::with_capacity(self.methods.len());
        for method in self.methods {
            let id = UnitId {
                class: self.class.clone(),
                method: method.hook.name().to_string(),
            };
            if id.method.is_empty() {
                return Err(UnitError::EmptyName(class_name));
            }
            if !names.insert(id.method.clone()) {
                return Err(UnitError::DuplicateBenchmark(id.to_string()));
            }
            if method.runs == Some(0) {
                return Err(UnitError::ZeroRuns(id.to_string()));
            }
            if let Some(first) = method.argument_sets.first() {
                let expected = first.len();
                if let Some(bad) = method.argument_sets.iter().find(|a| a.len() != expected) {
                    return Err(UnitError::ArgumentArity {
                        unit: id.to_string(),
                        expected,
                        found: bad.len(),
                    });
                }
            }

            units.push(BenchmarkUnit {
                id,
                runs: method.runs.or(self.runs),
                body: method.hook,
                hooks: table.clone(),
                argument_sets: method.argument_sets,
                skip: method.skip,
                factory: self.factory.clone(),
            });
        }

        Ok(units)
    }
}

/// The benchmark units available to a run, in discovery order.
#[derive(Debug, Clone, Default)]
pub struct Suite {
    units: Vec<Arc<BenchmarkUnit>>,
}

impl Suite {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve a target and add its units.
    pub fn add<T: Send + 'static>(&mut self, target: Target<T>) -> Result<&mut Self, UnitError> {
        for unit in target.build()? {
            if self.units.iter().any(|u| u.id() == unit.id()) {
                return Err(UnitError::DuplicateBenchmark(unit.id().to_string()));
            }
            self.units.push(Arc::new(unit));
        }
        Ok(self)
    }

    /// Builder-style variant of [`Suite::add`].
    pub fn with<T: Send + 'static>(mut self, target: Target<T>) -> Result<Self, UnitError> {
        self.add(target)?;
        Ok(self)
    }

    pub fn units(&self) -> &[Arc<BenchmarkUnit>] {
        &self.units
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Expand the units into scheduled elements in discovery order.
    ///
    /// Each non-skipped unit yields `runs` elements per argument tuple, with
    /// `default_runs` used when no run count was declared. Units whose id
    /// does not contain `filter` are left out.
    pub fn plan(&self, default_runs: u32, filter: Option<&str>) -> Vec<Element> {
        let mut elements = Vec::new();
        let mut next_id = 0u64;

        for unit in &self.units {
            if unit.is_skipped() {
                debug!(unit = %unit.id(), "Skipping unit");
                continue;
            }
            if let Some(filter) = filter {
                if !unit.id().to_string().contains(filter) {
                    continue;
                }
            }

            let runs = unit.runs(default_runs);
            let argument_sets = if unit.argument_sets().is_empty() {
                vec![Arguments::none()]
            } else {
                unit.argument_sets().to_vec()
            };

            for arguments in &argument_sets {
                for _ in 0..runs {
                    elements.push(Element::new(
                        ElementId(next_id),
                        Arc::clone(unit),
                        arguments.clone(),
                    ));
                    next_id += 1;
                }
            }
        }

        elements
    }
}
