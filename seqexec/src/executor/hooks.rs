use std::sync::Arc;

use anyhow::{Context, Result};

use crate::operator::Operator;
use crate::place::Place;
use crate::scope::Scope;

/// Callback fired around an operator run.
pub type HookFn = Arc<dyn Fn(&dyn Operator, &Scope) + Send + Sync>;

/// Ordered, append-only lists of before-run and after-run hooks.
#[derive(Clone, Default)]
pub struct HookRegistry {
    input_hooks: Vec<HookFn>,
    output_hooks: Vec<HookFn>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_input_hook(&mut self, hook: HookFn) {
        self.input_hooks.push(hook);
    }

    pub fn add_output_hook(&mut self, hook: HookFn) {
        self.output_hooks.push(hook);
    }

    pub fn input_hooks(&self) -> &[HookFn] {
        &self.input_hooks
    }

    pub fn output_hooks(&self) -> &[HookFn] {
        &self.output_hooks
    }

    pub fn set_input_hooks(&mut self, hooks: Vec<HookFn>) {
        self.input_hooks = hooks;
    }

    pub fn set_output_hooks(&mut self, hooks: Vec<HookFn>) {
        self.output_hooks = hooks;
    }

    pub fn is_empty(&self) -> bool {
        self.input_hooks.is_empty() && self.output_hooks.is_empty()
    }

    pub fn fire_input(&self, op: &dyn Operator, scope: &Scope) {
        for hook in &self.input_hooks {
            hook(op, scope);
        }
    }

    pub fn fire_output(&self, op: &dyn Operator, scope: &Scope) {
        for hook in &self.output_hooks {
            hook(op, scope);
        }
    }

    /// Hand both lists to an operator that runs nested blocks.
    pub fn propagate_into(&self, op: &dyn Operator) {
        if let Some(sink) = op.hook_sink() {
            sink.set_output_hooks(self.output_hooks.clone());
            sink.set_input_hooks(self.input_hooks.clone());
        }
    }

    /// Run one operator wrapped by the hooks.
    pub fn run_op(&self, op: &dyn Operator, scope: &Arc<Scope>, place: &Place) -> Result<()> {
        self.fire_input(op, scope);
        self.propagate_into(op);
        op.run(scope, place)
            .with_context(|| format!("operator {} failed", op.op_type()))?;
        self.fire_output(op, scope);
        Ok(())
    }
}
