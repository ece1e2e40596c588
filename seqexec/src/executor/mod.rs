//! Sequential operator executor.
//!
//! `NaiveExecutor` owns a fixed list of operators built from one block of a
//! program and runs them in order against a bound scope. Around each operator
//! it fires the registered hooks and, once a reuse plan is built, lets outputs
//! that share a cluster alias the largest buffer seen so far.
mod delegate;
mod hooks;
mod reuse;
mod trace;
mod vars;

use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, Context, Result};

use crate::operator::{OpRegistry, Operator};
use crate::place::Place;
use crate::program::ProgramDesc;
use crate::scope::{Scope, Variable};

pub use delegate::DelegateExecutor;
pub use hooks::{HookFn, HookRegistry};
pub use reuse::{reuse_table_from_json, ReusePlan, ReuseTable};
pub use trace::{
    format_duration, ClusterGrowth, Instrumentation, TraceEvent, TraceEventKind, TraceRecorder,
};

/// Executor settings.
#[derive(Debug, Clone, Default)]
pub struct ExecutorConfig {
    pub place: Place,
    pub trace_enabled: bool,
    pub timer_enabled: bool,
}

impl ExecutorConfig {
    pub fn new(place: Place) -> Self {
        Self {
            place,
            ..Self::default()
        }
    }

    pub fn with_place(mut self, place: Place) -> Self {
        self.place = place;
        self
    }

    /// Record a `TraceEvent` per operator and print it as it happens.
    pub fn with_trace(mut self) -> Self {
        self.trace_enabled = true;
        self
    }

    /// Fill trace events with operator timings.
    pub fn with_timer(mut self) -> Self {
        self.timer_enabled = true;
        self
    }
}

pub struct NaiveExecutor {
    config: ExecutorConfig,
    scope: Option<Arc<Scope>>,
    ops: Vec<Box<dyn Operator>>,
    hooks: HookRegistry,
    reuse: ReusePlan,
    delegate: Option<Box<dyn DelegateExecutor>>,
    instrumentation: Vec<Box<dyn Instrumentation>>,
    recorder: Option<TraceRecorder>,
}

impl NaiveExecutor {
    pub fn new(place: Place) -> Self {
        Self::with_config(ExecutorConfig::new(place))
    }

    pub fn with_config(config: ExecutorConfig) -> Self {
        let recorder = config
            .trace_enabled
            .then(|| TraceRecorder::new(config.timer_enabled));
        Self {
            config,
            scope: None,
            ops: Vec::new(),
            hooks: HookRegistry::new(),
            reuse: ReusePlan::default(),
            delegate: None,
            instrumentation: Vec::new(),
            recorder,
        }
    }

    pub fn place(&self) -> &Place {
        &self.config.place
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Bind `scope`, or a fresh root scope when none is given, and build the
    /// operators of `block_id`. Feed and fetch markers are not built.
    pub fn prepare(
        &mut self,
        scope: Option<Arc<Scope>>,
        program: &ProgramDesc,
        block_id: usize,
    ) -> Result<()> {
        self.prepare_scope(scope);
        let block = program.block(block_id)?;
        let mut ops = Vec::with_capacity(block.ops.len());
        for desc in &block.ops {
            if desc.is_feed_or_fetch() {
                crate::trace!(
                    "---  skip [{}], {} -> {}",
                    desc.input("X").join(", "),
                    desc.op_type,
                    desc.output("Out").join(", ")
                );
                continue;
            }
            let op = OpRegistry::create_op(desc, program)
                .with_context(|| format!("creating operators of block {}", block_id))?;
            ops.push(op);
        }
        crate::trace!("block {}: prepared {} operators", block_id, ops.len());
        self.ops = ops;
        self.reuse = ReusePlan::default();
        Ok(())
    }

    /// Bind `scope`, or a fresh root scope, without building operators.
    pub fn prepare_scope(&mut self, scope: Option<Arc<Scope>>) {
        self.scope = Some(scope.unwrap_or_else(Scope::new));
    }

    pub fn scope(&self) -> Option<&Arc<Scope>> {
        self.scope.as_ref()
    }

    pub fn ops(&self) -> &[Box<dyn Operator>] {
        &self.ops
    }

    /// Run every operator once, in order. The first failing operator stops
    /// the run; later operators and their hooks do not run.
    pub fn run(&mut self) -> Result<()> {
        let scope = self
            .scope
            .clone()
            .ok_or_else(|| anyhow!("executor has no scope; call prepare first"))?;
        let place = self.config.place.clone();
        let run_start = Instant::now();
        for inst in &mut self.instrumentation {
            inst.on_run_begin(self.ops.len());
        }

        for (index, op) in self.ops.iter().enumerate() {
            let op = op.as_ref();
            for inst in &mut self.instrumentation {
                inst.on_op_begin(index, op);
            }
            let op_start = Instant::now();

            self.hooks.fire_input(op, &scope);
            self.hooks.propagate_into(op);

            crate::verbose!("{} {}", index, op.debug_string(Some(scope.as_ref())));
            if let Err(err) = op.run(&scope, &place) {
                crate::error!("operator {} ({}) failed: {:#}", index, op.op_type(), err);
                return Err(err.context(format!(
                    "operator {} ({}) failed",
                    index,
                    op.op_type()
                )));
            }

            for growth in self.reuse.update_after(index)? {
                for inst in &mut self.instrumentation {
                    inst.on_cluster_grow(index, op, &growth);
                }
                if let Some(recorder) = &mut self.recorder {
                    recorder.on_cluster_grow(index, op, &growth);
                }
            }

            self.hooks.fire_output(op, &scope);

            let elapsed = op_start.elapsed();
            for inst in &mut self.instrumentation {
                inst.on_op_end(index, op, elapsed);
            }
            if let Some(recorder) = &mut self.recorder {
                recorder.on_op_end(index, op, elapsed);
                if let Some(event) = recorder.events().last() {
                    log_trace_event(event);
                }
            }
        }

        let elapsed = run_start.elapsed();
        for inst in &mut self.instrumentation {
            inst.on_run_end(elapsed);
        }
        Ok(())
    }

    /// The dense tensor variable `name` as seen from the bound scope.
    pub fn find_tensor(&self, name: &str) -> Result<Variable> {
        let scope = self
            .scope
            .as_ref()
            .ok_or_else(|| anyhow!("executor has no scope; call prepare first"))?;
        let var = scope
            .find_var(name)
            .ok_or_else(|| anyhow!("no variable {} in scope", name))?;
        if !var.is_tensor() {
            return Err(anyhow!(
                "variable {} holds {:?}, not a dense tensor",
                name,
                var.var_type()
            ));
        }
        Ok(var)
    }

    pub fn register_input_hook<F>(&mut self, hook: F)
    where
        F: Fn(&dyn Operator, &Scope) + Send + Sync + 'static,
    {
        self.hooks.add_input_hook(Arc::new(hook));
        if let Some(delegate) = &self.delegate {
            delegate.set_input_hooks(self.hooks.input_hooks().to_vec());
        }
    }

    pub fn register_output_hook<F>(&mut self, hook: F)
    where
        F: Fn(&dyn Operator, &Scope) + Send + Sync + 'static,
    {
        self.hooks.add_output_hook(Arc::new(hook));
        if let Some(delegate) = &self.delegate {
            delegate.set_output_hooks(self.hooks.output_hooks().to_vec());
        }
    }

    pub fn hooks(&self) -> &HookRegistry {
        &self.hooks
    }

    /// Build the buffer reuse plan for the prepared operators, replacing any
    /// previous plan.
    pub fn make_reuse_plan(&mut self, table: &ReuseTable) -> Result<()> {
        let scope = self
            .scope
            .as_ref()
            .ok_or_else(|| anyhow!("executor has no scope; call prepare first"))?;
        self.reuse = ReusePlan::build(&self.ops, scope, table);
        Ok(())
    }

    pub fn reuse_plan(&self) -> &ReusePlan {
        &self.reuse
    }

    /// Attach a delegate and hand it the current hook lists.
    pub fn attach_delegate(&mut self, delegate: Box<dyn DelegateExecutor>) {
        delegate.set_input_hooks(self.hooks.input_hooks().to_vec());
        delegate.set_output_hooks(self.hooks.output_hooks().to_vec());
        self.delegate = Some(delegate);
    }

    pub fn has_delegate(&self) -> bool {
        self.delegate.is_some()
    }

    pub fn run_delegate(&mut self, feed_names: &[String], need_fetch: bool) -> Result<()> {
        match &mut self.delegate {
            Some(delegate) => delegate.run(feed_names, need_fetch),
            None => {
                crate::warning!("run_delegate called without an attached delegate");
                Err(anyhow!("no delegate executor attached"))
            }
        }
    }

    pub fn add_instrumentation(&mut self, inst: Box<dyn Instrumentation>) {
        self.instrumentation.push(inst);
    }

    /// Events recorded since the executor was created or the last
    /// `clear_trace`, empty unless tracing is enabled.
    pub fn trace(&self) -> Vec<TraceEvent> {
        self.recorder
            .as_ref()
            .map(|recorder| recorder.events().to_vec())
            .unwrap_or_default()
    }

    /// Drop the recorded events.
    pub fn clear_trace(&mut self) {
        if let Some(recorder) = &mut self.recorder {
            recorder.clear();
        }
    }
}

fn log_trace_event(event: &TraceEvent) {
    crate::log!(
        "{} {} [{}] -- {} -- ({})",
        event.op_index,
        event.op_uuid,
        event.op_type,
        event.outputs.join(", "),
        event.micros
    );
}
