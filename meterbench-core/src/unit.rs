//! Benchmark unit descriptors.
//!
//! A [`BenchmarkUnit`] is the resolved, immutable description of one
//! benchmarkable method: the target type it belongs to, the body to measure,
//! its run count and the lifecycle hooks declared for each phase. Units are
//! produced by a [`Target`](crate::Target) builder; the engine never looks at
//! how the hooks were declared, only at what they resolved to.

use std::any::Any;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::element::Arguments;

/// Identity of a target type.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ClassId(String);

impl ClassId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity of a benchmark method: its target type plus method name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UnitId {
    pub class: ClassId,
    pub method: String,
}

impl UnitId {
    pub fn new(class: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            class: ClassId::new(class),
            method: method.into(),
        }
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.class, self.method)
    }
}

/// Lifecycle phase a method was resolved for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Once per unit, before its first occurrence
    BeforeClass,
    /// Once per unit, before the first run
    BeforeFirst,
    /// Before every run
    BeforeEach,
    /// The measured benchmark body
    Bench,
    /// After every run
    AfterEach,
    /// Once per unit, after the configured run count is reached
    AfterLast,
    /// Once per unit, after its last scheduled occurrence
    AfterClass,
    /// Construction of the target instance
    Instantiate,
}

impl Phase {
    /// Marker string the phase is reported under.
    pub fn marker(&self) -> &'static str {
        match self {
            Phase::BeforeClass => "before_class",
            Phase::BeforeFirst => "before_first",
            Phase::BeforeEach => "before_each",
            Phase::Bench => "bench",
            Phase::AfterEach => "after_each",
            Phase::AfterLast => "after_last",
            Phase::AfterClass => "after_class",
            Phase::Instantiate => "instantiate",
        }
    }

    /// Whether methods in this phase are lifecycle hooks.
    pub fn is_hook(&self) -> bool {
        !matches!(self, Phase::Bench | Phase::Instantiate)
    }

    /// The hook phases in execution order.
    pub const HOOKS: [Phase; 6] = [
        Phase::BeforeClass,
        Phase::BeforeFirst,
        Phase::BeforeEach,
        Phase::AfterEach,
        Phase::AfterLast,
        Phase::AfterClass,
    ];
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.marker())
    }
}

/// A method reference carried by failure records.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MethodRef {
    pub class: ClassId,
    pub method: String,
    pub phase: Phase,
}

impl fmt::Display for MethodRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{} [{}]", self.class, self.method, self.phase)
    }
}

/// Visibility a method was declared with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Public,
    Private,
}

/// The declared shape of a resolved method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Signature {
    pub visibility: Visibility,
    /// Number of declared parameters.
    pub arity: usize,
    /// Whether the method declares a checked failure path.
    pub declares_failure: bool,
    /// Whether the method returns a value.
    pub returns_value: bool,
}

impl Signature {
    /// A public, zero-argument, non-failing method with no return value.
    pub fn valid() -> Self {
        Self::default()
    }

    /// A valid signature taking `arity` parameters.
    pub fn with_arity(arity: usize) -> Self {
        Self {
            arity,
            ..Self::default()
        }
    }
}

type ErasedFn = dyn Fn(&mut dyn Any, &Arguments) -> anyhow::Result<()> + Send + Sync;

/// A type-erased method bound to a target type.
#[derive(Clone)]
pub struct Callable(Arc<ErasedFn>);

impl Callable {
    /// Wrap a typed method. Calling it with a target of another type fails.
    pub fn new<T, F>(f: F) -> Self
    where
        T: 'static,
        F: Fn(&mut T, &Arguments) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self(Arc::new(move |target: &mut dyn Any, args: &Arguments| {
            let target = target.downcast_mut::<T>().ok_or_else(|| {
                anyhow::anyhow!("target is not a {}", std::any::type_name::<T>())
            })?;
            f(target, args)
        }))
    }

    pub fn call(&self, target: &mut dyn Any, args: &Arguments) -> anyhow::Result<()> {
        (self.0)(target, args)
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Callable")
    }
}

/// A resolved lifecycle hook or benchmark body.
#[derive(Debug, Clone)]
pub struct Hook {
    name: String,
    phase: Phase,
    signature: Signature,
    callable: Callable,
}

impl Hook {
    /// Create a hook with a valid zero-argument signature.
    pub fn new(name: impl Into<String>, phase: Phase, callable: Callable) -> Self {
        Self {
            name: name.into(),
            phase,
            signature: Signature::valid(),
            callable,
        }
    }

    /// Override the signature discovery resolved for this method.
    pub fn with_signature(mut self, signature: Signature) -> Self {
        self.signature = signature;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn callable(&self) -> &Callable {
        &self.callable
    }

    /// Reference to this hook as declared on `class`.
    pub fn method_ref(&self, class: &ClassId) -> MethodRef {
        MethodRef {
            class: class.clone(),
            method: self.name.clone(),
            phase: self.phase,
        }
    }
}

/// Hooks of a unit, grouped by phase in declaration order.
#[derive(Debug, Clone, Default)]
pub struct HookTable {
    before_class: Vec<Hook>,
    before_first: Vec<Hook>,
    before_each: Vec<Hook>,
    after_each: Vec<Hook>,
    after_last: Vec<Hook>,
    after_class: Vec<Hook>,
}

impl HookTable {
    /// Hooks declared for `phase`. Non-hook phases have none.
    pub fn get(&self, phase: Phase) -> &[Hook] {
        match phase {
            Phase::BeforeClass => &self.before_class,
            Phase::BeforeFirst => &self.before_first,
            Phase::BeforeEach => &self.before_each,
            Phase::AfterEach => &self.after_each,
            Phase::AfterLast => &self.after_last,
            Phase::AfterClass => &self.after_class,
            Phase::Bench | Phase::Instantiate => &[],
        }
    }

    /// Append a hook to the list of its phase.
    ///
    /// Returns the hook back if its phase does not hold hooks.
    pub(crate) fn push(&mut self, hook: Hook) -> Result<(), Hook> {
        let list = match hook.phase {
            Phase::BeforeClass => &mut self.before_class,
            Phase::BeforeFirst => &mut self.before_first,
            Phase::BeforeEach => &mut self.before_each,
            Phase::AfterEach => &mut self.after_each,
            Phase::AfterLast => &mut self.after_last,
            Phase::AfterClass => &mut self.after_class,
            Phase::Bench | Phase::Instantiate => return Err(hook),
        };
        list.push(hook);
        Ok(())
    }

    pub fn len(&self) -> usize {
        Phase::HOOKS.iter().map(|p| self.get(*p).len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

type ErasedFactory = dyn Fn() -> anyhow::Result<Box<dyn Any + Send>> + Send + Sync;

/// Constructs target instances for a unit's class.
#[derive(Clone)]
pub struct Factory(Arc<ErasedFactory>);

impl Factory {
    pub fn new<T, F>(f: F) -> Self
    where
        T: Send + 'static,
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self(Arc::new(move || Ok(Box::new(f()) as Box<dyn Any + Send>)))
    }

    /// A factory whose construction may fail.
    pub fn fallible<T, F>(f: F) -> Self
    where
        T: Send + 'static,
        F: Fn() -> anyhow::Result<T> + Send + Sync + 'static,
    {
        Self(Arc::new(move || Ok(Box::new(f()?) as Box<dyn Any + Send>)))
    }

    pub fn create(&self) -> anyhow::Result<Box<dyn Any + Send>> {
        (self.0)()
    }
}

impl fmt::Debug for Factory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Factory")
    }
}

/// Immutable descriptor of one benchmarkable method.
///
/// Equality and hashing use the method identity only, so two independently
/// resolved descriptors of the same method are interchangeable.
#[derive(Debug, Clone)]
pub struct BenchmarkUnit {
    pub(crate) id: UnitId,
    pub(crate) runs: Option<u32>,
    pub(crate) body: Hook,
    pub(crate) hooks: HookTable,
    pub(crate) argument_sets: Vec<Arguments>,
    pub(crate) skip: bool,
    pub(crate) factory: Factory,
}

impl BenchmarkUnit {
    pub fn id(&self) -> &UnitId {
        &self.id
    }

    pub fn class(&self) -> &ClassId {
        &self.id.class
    }

    pub fn method(&self) -> &str {
        &self.id.method
    }

    /// Run count from the most specific declaration, if any was made.
    pub fn declared_runs(&self) -> Option<u32> {
        self.runs
    }

    /// Resolved run count, falling back to `default_runs` when none was
    /// declared. Never less than 1.
    pub fn runs(&self, default_runs: u32) -> u32 {
        self.runs.unwrap_or(default_runs).max(1)
    }

    /// The benchmark body.
    pub fn body(&self) -> &Hook {
        &self.body
    }

    pub fn hooks(&self, phase: Phase) -> &[Hook] {
        self.hooks.get(phase)
    }

    pub fn hook_table(&self) -> &HookTable {
        &self.hooks
    }

    /// Argument tuples for parameterized invocation. Empty for plain units.
    pub fn argument_sets(&self) -> &[Arguments] {
        &self.argument_sets
    }

    /// Whether the unit is excluded from scheduling.
    pub fn is_skipped(&self) -> bool {
        self.skip
    }

    pub fn factory(&self) -> &Factory {
        &self.factory
    }
}

impl PartialEq for BenchmarkUnit {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for BenchmarkUnit {}

impl Hash for BenchmarkUnit {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for BenchmarkUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.id.fmt(f)
    }
}
