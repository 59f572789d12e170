//! Scheduled occurrences of benchmark units.

use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::unit::{BenchmarkUnit, UnitId};

/// Argument tuple passed to a parameterized benchmark body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Arguments(Vec<Value>);

impl Arguments {
    /// An empty tuple, used for plain invocations.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn new(values: Vec<Value>) -> Self {
        Self(values)
    }

    /// Deserialize the argument at `index`.
    pub fn get<T: DeserializeOwned>(&self, index: usize) -> anyhow::Result<T> {
        let value = self
            .0
            .get(index)
            .ok_or_else(|| anyhow::anyhow!("missing argument {} of {}", index, self.0.len()))?;
        Ok(serde_json::from_value(value.clone())?)
    }

    pub fn values(&self) -> &[Value] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<Value>> for Arguments {
    fn from(values: Vec<Value>) -> Self {
        Self(values)
    }
}

impl fmt::Display for Arguments {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|v| v.to_string()).collect();
        write!(f, "({})", parts.join(", "))
    }
}

/// Synthetic identity distinguishing repeated occurrences of a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ElementId(pub u64);

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One scheduled occurrence of a [`BenchmarkUnit`].
#[derive(Debug, Clone)]
pub struct Element {
    id: ElementId,
    unit: Arc<BenchmarkUnit>,
    arguments: Arguments,
}

impl Element {
    pub fn new(id: ElementId, unit: Arc<BenchmarkUnit>, arguments: Arguments) -> Self {
        Self {
            id,
            unit,
            arguments,
        }
    }

    pub fn id(&self) -> ElementId {
        self.id
    }

    pub fn unit(&self) -> &Arc<BenchmarkUnit> {
        &self.unit
    }

    pub fn unit_id(&self) -> &UnitId {
        self.unit.id()
    }

    pub fn arguments(&self) -> &Arguments {
        &self.arguments
    }
}

impl PartialEq for Element {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Element {}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.arguments.is_empty() {
            write!(f, "{} {}", self.unit.id(), self.id)
        } else {
            write!(f, "{}{} {}", self.unit.id(), self.arguments, self.id)
        }
    }
}
