//! Failure records.
//!
//! Failures originating from benchmarked code are values, not errors that
//! unwind the run: they are appended to the result tree and reported to
//! outputs, and execution continues with the next hook or element.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::unit::{MethodRef, Phase};

/// Structural contract a resolved method violated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Violation {
    NotPublic,
    WrongArity { expected: usize, found: usize },
    DeclaresFailure,
    ReturnsValue,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::NotPublic => write!(f, "method is not public"),
            Violation::WrongArity { expected, found } => {
                write!(f, "expected {} parameter(s), found {}", expected, found)
            }
            Violation::DeclaresFailure => write!(f, "method declares a failure path"),
            Violation::ReturnsValue => write!(f, "hook returns a value"),
        }
    }
}

/// A method did not satisfy the structural contract and was not invoked.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{method} failed check: {violation}")]
pub struct CheckFailure {
    pub method: MethodRef,
    pub violation: Violation,
}

/// A structurally valid method was invoked and the call failed.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{method} failed: {cause}")]
pub struct InvocationFailure {
    pub method: MethodRef,
    /// Rendered cause chain of the failure.
    pub cause: String,
    /// Whether the invoked code panicked rather than returning an error.
    pub panicked: bool,
}

/// Either kind of failure recorded during a run.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Failure {
    #[error(transparent)]
    Check(#[from] CheckFailure),

    #[error(transparent)]
    Invocation(#[from] InvocationFailure),
}

impl Failure {
    /// The offending method.
    pub fn method(&self) -> &MethodRef {
        match self {
            Failure::Check(f) => &f.method,
            Failure::Invocation(f) => &f.method,
        }
    }

    /// The phase the offending method was resolved for.
    pub fn phase(&self) -> Phase {
        self.method().phase
    }

    pub fn is_check(&self) -> bool {
        matches!(self, Failure::Check(_))
    }
}
