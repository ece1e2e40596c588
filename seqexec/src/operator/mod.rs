//! Operator interface consumed by the executor.
//!
//! Operators are opaque units created from `OpDesc`s through the
//! `OpRegistry`. The executor only needs their type tag, their output names,
//! `run`, and, for operators that execute nested blocks, a `HookSink`.
mod base;
mod builtin;
mod registry;

use std::sync::Arc;

use anyhow::Result;
use uuid::Uuid;

use crate::executor::HookFn;
use crate::place::Place;
use crate::scope::Scope;

pub use base::{describe_op, OperatorBase};
pub use registry::{OpCreator, OpRegistry};

pub trait Operator: Send + Sync {
    fn base(&self) -> &OperatorBase;

    fn run(&self, scope: &Arc<Scope>, place: &Place) -> Result<()>;

    /// Operators that run nested blocks expose a sink so hooks fire for
    /// every nested operator as well.
    fn hook_sink(&self) -> Option<&dyn HookSink> {
        None
    }

    fn op_type(&self) -> &str {
        self.base().op_type()
    }

    fn uuid(&self) -> Uuid {
        self.base().uuid()
    }

    fn output_vars(&self, include_intermediate: bool) -> Vec<String> {
        self.base().output_vars(include_intermediate)
    }

    fn debug_string(&self, scope: Option<&Scope>) -> String {
        describe_op(self.base(), scope)
    }
}

/// Receiver of the executor's hook lists.
pub trait HookSink {
    fn set_input_hooks(&self, hooks: Vec<HookFn>);
    fn set_output_hooks(&self, hooks: Vec<HookFn>);
}
