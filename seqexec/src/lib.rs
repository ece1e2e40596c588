#[doc(hidden)]
pub mod logging;

mod executor;
mod operator;
mod place;
mod program;
mod scope;
mod tensor;

pub use executor::{
    format_duration, reuse_table_from_json, ClusterGrowth, DelegateExecutor, ExecutorConfig,
    HookFn, HookRegistry, Instrumentation, NaiveExecutor, ReusePlan, ReuseTable, TraceEvent,
    TraceEventKind, TraceRecorder,
};
pub use operator::{describe_op, HookSink, OpCreator, OpRegistry, Operator, OperatorBase};
pub use place::Place;
pub use program::{
    AttrValue, BlockDesc, OpDesc, ProgramDesc, ProgramDeserialize, ProgramSerialize, VarDesc,
    VarType, EMPTY_VAR_NAME, FEED_OP_TYPE, FETCH_OP_TYPE,
};
pub use scope::{initialize_variable, Scope, VarValue, Variable};
pub use tensor::{format_shape, numel, Buffer, DType, Element, Tensor};
