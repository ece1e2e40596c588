//! Operators that run a sub-block.
//!
//! Both operators build their sub-block's operators at creation time and run
//! them in a fresh child scope. Hooks pushed in through `HookSink` fire around
//! every nested operator, including operators nested further down.
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};

use crate::executor::{HookFn, HookRegistry};
use crate::operator::{HookSink, OpRegistry, Operator, OperatorBase};
use crate::place::Place;
use crate::program::{OpDesc, ProgramDesc, VarDesc, EMPTY_VAR_NAME};
use crate::scope::{initialize_variable, Scope};

use super::{ensure_cpu, read_input, read_var, tensor_to_bool};

struct NestedBlock {
    block_idx: usize,
    vars: Vec<VarDesc>,
    ops: Vec<Box<dyn Operator>>,
    hooks: Mutex<HookRegistry>,
}

impl NestedBlock {
    fn build(base: &OperatorBase, program: &ProgramDesc) -> Result<Self> {
        let block_idx = base.attr_block("sub_block")?;
        let block = program.block(block_idx)?;
        let ops = block
            .ops
            .iter()
            .map(|desc| OpRegistry::create_op(desc, program))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            block_idx,
            vars: block.vars.clone(),
            ops,
            hooks: Mutex::new(HookRegistry::new()),
        })
    }

    fn run(&self, scope: &Arc<Scope>, place: &Place) -> Result<()> {
        let child = scope.new_scope();
        let result = self.run_in(&child, place);
        scope.delete_scope(&child);
        result
    }

    fn run_in(&self, scope: &Arc<Scope>, place: &Place) -> Result<()> {
        for var in &self.vars {
            if var.name == EMPTY_VAR_NAME || scope.find_var(&var.name).is_some() {
                continue;
            }
            initialize_variable(&scope.var(&var.name), var.var_type)?;
        }
        let hooks = self
            .hooks
            .lock()
            .map_err(|_| anyhow!("nested hook lock poisoned"))?
            .clone();
        for op in &self.ops {
            hooks.run_op(op.as_ref(), scope, place)?;
        }
        crate::verbose!(
            "block {} finished {} nested operators",
            self.block_idx,
            self.ops.len()
        );
        Ok(())
    }

    fn set_hooks(&self, update: impl FnOnce(&mut HookRegistry)) {
        if let Ok(mut hooks) = self.hooks.lock() {
            update(&mut hooks);
        }
    }
}

/// Runs its sub-block once when the condition holds. With
/// `is_scalar_condition` (the default) the condition is the single element
/// of `Cond`; otherwise every `Input` tensor must be non-empty.
pub struct ConditionalBlockOp {
    base: OperatorBase,
    block: NestedBlock,
}

impl ConditionalBlockOp {
    pub fn create(desc: &OpDesc, program: &ProgramDesc) -> Result<Box<dyn Operator>> {
        let base = OperatorBase::from_desc(desc);
        let block = NestedBlock::build(&base, program)?;
        Ok(Box::new(Self { base, block }))
    }

    fn should_run(&self, scope: &Scope) -> Result<bool> {
        if self.base.attr_bool("is_scalar_condition", true)? {
            let cond = read_input(scope, &self.base, "Cond")?;
            return tensor_to_bool(&cond);
        }
        let inputs = self.base.inputs_of("Input");
        if inputs.is_empty() {
            return Ok(false);
        }
        for name in inputs {
            if read_var(scope, &self.base, name)?.numel() == 0 {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

impl Operator for ConditionalBlockOp {
    fn base(&self) -> &OperatorBase {
        &self.base
    }

    fn run(&self, scope: &Arc<Scope>, place: &Place) -> Result<()> {
        ensure_cpu(&self.base, place)?;
        if !self.should_run(scope)? {
            crate::verbose!("conditional_block skipped block {}", self.block.block_idx);
            return Ok(());
        }
        self.block.run(scope, place)
    }

    fn hook_sink(&self) -> Option<&dyn HookSink> {
        Some(self)
    }
}

impl HookSink for ConditionalBlockOp {
    fn set_input_hooks(&self, hooks: Vec<HookFn>) {
        self.block.set_hooks(|registry| registry.set_input_hooks(hooks));
    }

    fn set_output_hooks(&self, hooks: Vec<HookFn>) {
        self.block.set_hooks(|registry| registry.set_output_hooks(hooks));
    }
}

/// Runs its sub-block while the single element of `Condition` is true. The
/// sub-block is responsible for updating the condition.
pub struct WhileOp {
    base: OperatorBase,
    block: NestedBlock,
}

impl WhileOp {
    pub fn create(desc: &OpDesc, program: &ProgramDesc) -> Result<Box<dyn Operator>> {
        let base = OperatorBase::from_desc(desc);
        let block = NestedBlock::build(&base, program)?;
        Ok(Box::new(Self { base, block }))
    }
}

impl Operator for WhileOp {
    fn base(&self) -> &OperatorBase {
        &self.base
    }

    fn run(&self, scope: &Arc<Scope>, place: &Place) -> Result<()> {
        ensure_cpu(&self.base, place)?;
        let mut steps = 0usize;
        while tensor_to_bool(&read_input(scope, &self.base, "Condition")?)? {
            self.block.run(scope, place)?;
            steps += 1;
        }
        crate::verbose!("while ran block {} for {} steps", self.block.block_idx, steps);
        Ok(())
    }

    fn hook_sink(&self) -> Option<&dyn HookSink> {
        Some(self)
    }
}

impl HookSink for WhileOp {
    fn set_input_hooks(&self, hooks: Vec<HookFn>) {
        self.block.set_hooks(|registry| registry.set_input_hooks(hooks));
    }

    fn set_output_hooks(&self, hooks: Vec<HookFn>) {
        self.block.set_hooks(|registry| registry.set_output_hooks(hooks));
    }
}
