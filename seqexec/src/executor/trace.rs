use std::fmt;
use std::time::Duration;

use serde::ser::{SerializeStruct, Serializer};
use uuid::Uuid;

use crate::operator::Operator;

/// Callbacks invoked around the executor loop. Every method defaults to a
/// no-op so implementations only override what they observe.
pub trait Instrumentation: Send {
    fn on_run_begin(&mut self, _op_count: usize) {}

    fn on_op_begin(&mut self, _index: usize, _op: &dyn Operator) {}

    fn on_op_end(&mut self, _index: usize, _op: &dyn Operator, _elapsed: Duration) {}

    fn on_cluster_grow(&mut self, _index: usize, _op: &dyn Operator, _growth: &ClusterGrowth) {}

    fn on_run_end(&mut self, _elapsed: Duration) {}
}

/// A reuse cluster whose representative buffer was replaced by a larger one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterGrowth {
    pub cluster: usize,
    pub cluster_name: String,
    pub var_name: String,
    pub memory_size: usize,
}

/// Kind of trace event recorded during execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum TraceEventKind {
    OpExecute,
    ClusterGrow,
}

impl fmt::Display for TraceEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TraceEventKind::OpExecute => write!(f, "OpExecute"),
            TraceEventKind::ClusterGrow => write!(f, "ClusterGrow"),
        }
    }
}

/// Execution trace record for a single operator.
#[derive(Debug, Clone)]
pub struct TraceEvent {
    pub kind: TraceEventKind,
    pub op_index: usize,
    pub op_uuid: Uuid,
    pub op_type: String,
    pub outputs: Vec<String>,
    pub detail: String,
    pub micros: String,
    pub micros_parts: [u64; 3],
}

impl serde::Serialize for TraceEvent {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_struct("TraceEvent", 7)?;
        state.serialize_field("kind", &self.kind)?;
        state.serialize_field("op_index", &self.op_index)?;
        state.serialize_field("op_uuid", &self.op_uuid)?;
        state.serialize_field("op_type", &self.op_type)?;
        state.serialize_field("outputs", &self.outputs)?;
        state.serialize_field("detail", &self.detail)?;
        state.serialize_field("micros", &self.micros_parts)?;
        state.end()
    }
}

/// Instrumentation that keeps a `TraceEvent` per operator run and per
/// cluster growth.
#[derive(Debug, Default)]
pub struct TraceRecorder {
    events: Vec<TraceEvent>,
    timer_enabled: bool,
}

impl TraceRecorder {
    pub fn new(timer_enabled: bool) -> Self {
        Self {
            events: Vec::new(),
            timer_enabled,
        }
    }

    pub fn events(&self) -> &[TraceEvent] {
        &self.events
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    fn event(&self, kind: TraceEventKind, index: usize, op: &dyn Operator) -> TraceEvent {
        TraceEvent {
            kind,
            op_index: index,
            op_uuid: op.uuid(),
            op_type: op.op_type().to_string(),
            outputs: op.output_vars(true),
            detail: String::new(),
            micros: "0ms 0us 0ns".to_string(),
            micros_parts: [0, 0, 0],
        }
    }
}

impl Instrumentation for TraceRecorder {
    fn on_op_end(&mut self, index: usize, op: &dyn Operator, elapsed: Duration) {
        let mut event = self.event(TraceEventKind::OpExecute, index, op);
        if self.timer_enabled {
            let (micros, parts) = format_duration(elapsed);
            event.micros = micros;
            event.micros_parts = parts;
        }
        self.events.push(event);
    }

    fn on_cluster_grow(&mut self, index: usize, op: &dyn Operator, growth: &ClusterGrowth) {
        let mut event = self.event(TraceEventKind::ClusterGrow, index, op);
        event.detail = format!(
            "cluster {} ({}) now backed by {} with {} bytes",
            growth.cluster, growth.cluster_name, growth.var_name, growth.memory_size
        );
        self.events.push(event);
    }
}

/// Split a duration into milliseconds, microseconds and nanoseconds.
pub fn format_duration(elapsed: Duration) -> (String, [u64; 3]) {
    let nanos = elapsed.as_nanos();
    let ms = (nanos / 1_000_000) as u64;
    let us = ((nanos / 1_000) % 1_000) as u64;
    let ns = (nanos % 1_000) as u64;
    (format!("{}ms {}us {}ns", ms, us, ns), [ms, us, ns])
}
