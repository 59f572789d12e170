//! Core types and utilities for meterbench.
//!
//! This crate holds everything the execution engine operates on: meters,
//! resolved benchmark units and their scheduled elements, arrangement
//! strategies, the method contract checks, failure records and the
//! hierarchical result tree handed to outputs.

pub mod arrange;
pub mod contract;
pub mod element;
pub mod failure;
pub mod meter;
pub mod output;
pub mod result;
pub mod target;
pub mod unit;

// Re-export main types for convenience
pub use arrange::{Arrangement, ArrangementKind, NoArrangement, Sequential, Shuffle};
pub use contract::{check_method, invoke_method, CheckResult};
pub use element::{Arguments, Element, ElementId};
pub use failure::{CheckFailure, Failure, InvocationFailure, Violation};
pub use meter::{CounterHandle, CounterMeter, Meter, MeterError, MeterSet, Resolution, TimeMeter};
pub use output::{Output, OutputError, Recorder, TerminalOutput};
pub use result::{
    BenchmarkResult, ClassResult, MethodResult, ResultNode, ResultSink, SampleTable, Statistics,
};
pub use target::{BenchMethod, Suite, Target, UnitError};
pub use unit::{
    BenchmarkUnit, Callable, ClassId, Factory, Hook, MethodRef, Phase, Signature, UnitId,
    Visibility,
};
