//! Checking and invoking resolved methods.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use crate::element::Arguments;
use crate::failure::{CheckFailure, InvocationFailure, Violation};
use crate::unit::{ClassId, Hook, Phase, Visibility};

/// Outcome of [`check_method`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckResult {
    Ok,
    Failed(CheckFailure),
}

impl CheckResult {
    pub fn is_ok(&self) -> bool {
        matches!(self, CheckResult::Ok)
    }
}

/// Verify that `hook` may be invoked with `expected_arity` arguments.
///
/// Methods must be public, take exactly `expected_arity` parameters and
/// declare no failure path. Lifecycle hooks must also return nothing. The
/// first violation found is reported; the method is never called.
pub fn check_method(class: &ClassId, hook: &Hook, expected_arity: usize) -> CheckResult {
    let signature = hook.signature();

    let violation = if signature.visibility != Visibility::Public {
        Some(Violation::NotPublic)
    } else if signature.arity != expected_arity {
        Some(Violation::WrongArity {
            expected: expected_arity,
            found: signature.arity,
        })
    } else if signature.declares_failure {
        Some(Violation::DeclaresFailure)
    } else if signature.returns_value && hook.phase() != Phase::Bench {
        Some(Violation::ReturnsValue)
    } else {
        None
    };

    match violation {
        None => CheckResult::Ok,
        Some(violation) => CheckResult::Failed(CheckFailure {
            method: hook.method_ref(class),
            violation,
        }),
    }
}

/// Invoke `hook` on `target`, converting errors and panics raised by the
/// invoked code into an [`InvocationFailure`].
pub fn invoke_method(
    class: &ClassId,
    hook: &Hook,
    target: &mut dyn Any,
    arguments: &Arguments,
) -> Result<(), InvocationFailure> {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        hook.callable().call(target, arguments)
    }));

    match outcome {
        Ok(Ok(())) => Ok(()),
        Ok(Err(error)) => Err(InvocationFailure {
            method: hook.method_ref(class),
            cause: format!("{:#}", error),
            panicked: false,
        }),
        Err(payload) => Err(InvocationFailure {
            method: hook.method_ref(class),
            cause: panic_message(payload.as_ref()),
            panicked: true,
        }),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}
