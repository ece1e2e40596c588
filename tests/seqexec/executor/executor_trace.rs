use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Result};
use seqexec::{
    ClusterGrowth, DelegateExecutor, ExecutorConfig, HookFn, HookSink, Instrumentation,
    NaiveExecutor, OpDesc, Operator, Place, ReuseTable, TraceEventKind,
};

use crate::common;

#[derive(Clone, Default)]
struct Recording {
    calls: Arc<Mutex<Vec<String>>>,
}

impl Recording {
    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn push(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

impl Instrumentation for Recording {
    fn on_run_begin(&mut self, op_count: usize) {
        self.push(format!("run_begin:{}", op_count));
    }

    fn on_op_begin(&mut self, index: usize, op: &dyn Operator) {
        self.push(format!("op_begin:{}:{}", index, op.op_type()));
    }

    fn on_op_end(&mut self, index: usize, op: &dyn Operator, _elapsed: Duration) {
        self.push(format!("op_end:{}:{}", index, op.op_type()));
    }

    fn on_cluster_grow(&mut self, index: usize, _op: &dyn Operator, growth: &ClusterGrowth) {
        self.push(format!(
            "grow:{}:{}:{}:{}",
            index, growth.cluster_name, growth.var_name, growth.memory_size
        ));
    }

    fn on_run_end(&mut self, _elapsed: Duration) {
        self.push("run_end".to_string());
    }
}

#[test]
fn instrumentation_wraps_the_loop() -> Result<()> {
    let program = common::program(
        &["x", "y", "cluster1"],
        vec![
            common::fill_constant("x", &[2], 1.0),
            common::fill_constant("y", &[8], 1.0),
        ],
    )?;
    let (mut exec, _scope) = common::prepared(&program)?;
    let table: ReuseTable = [("x", "cluster1"), ("y", "cluster1")]
        .into_iter()
        .map(|(name, cluster)| (name.to_string(), cluster.to_string()))
        .collect();
    exec.make_reuse_plan(&table)?;
    let recording = Recording::default();
    exec.add_instrumentation(Box::new(recording.clone()));

    exec.run()?;

    assert_eq!(
        recording.calls(),
        vec![
            "run_begin:2",
            "op_begin:0:fill_constant",
            "grow:0:cluster1:x:8",
            "op_end:0:fill_constant",
            "op_begin:1:fill_constant",
            "grow:1:cluster1:y:32",
            "op_end:1:fill_constant",
            "run_end",
        ]
    );
    Ok(())
}

#[test]
fn failed_run_skips_run_end() -> Result<()> {
    let program = common::program(
        &["x"],
        vec![
            OpDesc::new("test_fail").with_output("Out", &["x"]),
            common::fill_constant("x", &[1], 1.0),
        ],
    )?;
    let (mut exec, _scope) = common::prepared(&program)?;
    let recording = Recording::default();
    exec.add_instrumentation(Box::new(recording.clone()));

    assert!(exec.run().is_err());
    assert_eq!(
        recording.calls(),
        vec!["run_begin:2", "op_begin:0:test_fail"]
    );
    Ok(())
}

#[test]
fn trace_records_one_event_per_op() -> Result<()> {
    let program = common::program(
        &["x", "y"],
        vec![
            common::fill_constant("x", &[4], 1.0),
            common::scale("x", "y", 2.0),
        ],
    )?;
    common::register_test_ops();
    let scope = seqexec::Scope::new();
    let config = ExecutorConfig::default()
        .with_place(Place::Cpu)
        .with_trace()
        .with_timer();
    let mut exec = NaiveExecutor::with_config(config);
    exec.create_variables(&program, 0, false, &scope)?;
    exec.prepare(Some(scope), &program, 0)?;

    assert!(exec.trace().is_empty());
    exec.run()?;

    let trace = exec.trace();
    assert_eq!(trace.len(), 2);
    assert_eq!(trace[0].kind, TraceEventKind::OpExecute);
    assert_eq!(trace[0].op_index, 0);
    assert_eq!(trace[0].op_uuid, exec.ops()[0].uuid());
    assert_eq!(trace[1].op_type, "scale");
    assert_eq!(trace[1].outputs, vec!["y".to_string()]);

    let json = serde_json::to_value(&trace[1])?;
    assert_eq!(json["kind"], "OpExecute");
    assert_eq!(json["op_type"], "scale");
    assert_eq!(json["micros"].as_array().map(Vec::len), Some(3));
    Ok(())
}

#[test]
fn clear_trace_drops_previous_runs() -> Result<()> {
    let program = common::program(&["x"], vec![common::fill_constant("x", &[2], 1.0)])?;
    common::register_test_ops();
    let scope = seqexec::Scope::new();
    let mut exec = NaiveExecutor::with_config(ExecutorConfig::new(Place::Cpu).with_trace());
    exec.create_variables(&program, 0, false, &scope)?;
    exec.prepare(Some(scope), &program, 0)?;

    exec.run()?;
    exec.run()?;
    assert_eq!(exec.trace().len(), 2);

    exec.clear_trace();
    assert!(exec.trace().is_empty());
    exec.run()?;
    assert_eq!(exec.trace().len(), 1);
    Ok(())
}

#[test]
fn trace_is_empty_without_trace_config() -> Result<()> {
    let program = common::program(&["x"], vec![common::fill_constant("x", &[1], 1.0)])?;
    let (mut exec, _scope) = common::prepared(&program)?;
    exec.run()?;
    assert!(exec.trace().is_empty());
    Ok(())
}

#[derive(Default)]
struct FakeDelegate {
    input_hooks: Arc<Mutex<usize>>,
    output_hooks: Arc<Mutex<usize>>,
    runs: Arc<Mutex<Vec<(Vec<String>, bool)>>>,
}

impl HookSink for FakeDelegate {
    fn set_input_hooks(&self, hooks: Vec<HookFn>) {
        *self.input_hooks.lock().unwrap() = hooks.len();
    }

    fn set_output_hooks(&self, hooks: Vec<HookFn>) {
        *self.output_hooks.lock().unwrap() = hooks.len();
    }
}

impl DelegateExecutor for FakeDelegate {
    fn run(&mut self, feed_names: &[String], need_fetch: bool) -> Result<()> {
        if feed_names.is_empty() {
            return Err(anyhow!("nothing to feed"));
        }
        self.runs
            .lock()
            .unwrap()
            .push((feed_names.to_vec(), need_fetch));
        Ok(())
    }
}

#[test]
fn delegate_receives_hooks_on_attach_and_registration() -> Result<()> {
    let mut exec = NaiveExecutor::new(Place::Cpu);
    exec.register_input_hook(|_, _| {});

    let delegate = FakeDelegate::default();
    let input_hooks = Arc::clone(&delegate.input_hooks);
    let output_hooks = Arc::clone(&delegate.output_hooks);
    let runs = Arc::clone(&delegate.runs);
    exec.attach_delegate(Box::new(delegate));
    assert!(exec.has_delegate());
    assert_eq!(*input_hooks.lock().unwrap(), 1);
    assert_eq!(*output_hooks.lock().unwrap(), 0);

    exec.register_input_hook(|_, _| {});
    exec.register_output_hook(|_, _| {});
    exec.register_output_hook(|_, _| {});
    assert_eq!(*input_hooks.lock().unwrap(), 2);
    assert_eq!(*output_hooks.lock().unwrap(), 2);

    exec.run_delegate(&["x".to_string()], true)?;
    assert!(exec.run_delegate(&[], false).is_err());
    assert_eq!(
        runs.lock().unwrap().clone(),
        vec![(vec!["x".to_string()], true)]
    );
    Ok(())
}

#[test]
fn run_delegate_without_delegate_is_an_error() {
    let mut exec = NaiveExecutor::new(Place::Cpu);
    assert!(!exec.has_delegate());
    assert!(exec.run_delegate(&[], false).is_err());
}
