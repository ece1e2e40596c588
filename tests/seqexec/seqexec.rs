#[path = "common/mod.rs"]
mod common;

#[path = "executor/executor_hooks.rs"]
mod executor_hooks;
#[path = "executor/executor_reuse.rs"]
mod executor_reuse;
#[path = "executor/executor_prepare.rs"]
mod executor_prepare;
#[path = "executor/executor_control_flow.rs"]
mod executor_control_flow;
#[path = "executor/executor_trace.rs"]
mod executor_trace;

#[path = "scope/scope_vars.rs"]
mod scope_vars;

#[path = "program/program_serde.rs"]
mod program_serde;

#[path = "tensor/tensor_buffer.rs"]
mod tensor_buffer;
