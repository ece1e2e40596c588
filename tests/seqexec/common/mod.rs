use std::sync::{Arc, Mutex, Once};

use anyhow::{anyhow, Result};
use seqexec::{
    AttrValue, DType, NaiveExecutor, OpDesc, OpRegistry, Operator, OperatorBase, Place,
    ProgramDesc, Scope, Tensor, VarDesc,
};

static REGISTER: Once = Once::new();

/// Operator that always fails.
struct FailOp {
    base: OperatorBase,
}

impl Operator for FailOp {
    fn base(&self) -> &OperatorBase {
        &self.base
    }

    fn run(&self, _scope: &Arc<Scope>, _place: &Place) -> Result<()> {
        Err(anyhow!("test_fail always fails"))
    }
}

/// Operator that does nothing.
struct NoopOp {
    base: OperatorBase,
}

impl Operator for NoopOp {
    fn base(&self) -> &OperatorBase {
        &self.base
    }

    fn run(&self, _scope: &Arc<Scope>, _place: &Place) -> Result<()> {
        Ok(())
    }
}

pub fn register_test_ops() {
    REGISTER.call_once(|| {
        OpRegistry::register("test_fail", |desc, _program| {
            Ok(Box::new(FailOp {
                base: OperatorBase::from_desc(desc),
            }) as Box<dyn Operator>)
        })
        .expect("register test_fail");
        OpRegistry::register("test_noop", |desc, _program| {
            Ok(Box::new(NoopOp {
                base: OperatorBase::from_desc(desc),
            }) as Box<dyn Operator>)
        })
        .expect("register test_noop");
    });
}

/// Ordered log shared between hooks.
pub type EventLog = Arc<Mutex<Vec<String>>>;

pub fn event_log() -> EventLog {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn events(log: &EventLog) -> Vec<String> {
    log.lock().expect("event log").clone()
}

/// Register before/after hooks that append `before:<type>` and
/// `after:<type>` to `log`.
pub fn record_hooks(exec: &mut NaiveExecutor, log: &EventLog) {
    let before = Arc::clone(log);
    exec.register_input_hook(move |op, _scope| {
        before
            .lock()
            .expect("event log")
            .push(format!("before:{}", op.op_type()));
    });
    let after = Arc::clone(log);
    exec.register_output_hook(move |op, _scope| {
        after
            .lock()
            .expect("event log")
            .push(format!("after:{}", op.op_type()));
    });
}

pub fn fill_constant(out: &str, shape: &[i64], value: f32) -> OpDesc {
    OpDesc::new("fill_constant")
        .with_output("Out", &[out])
        .with_attr("shape", AttrValue::IntList(shape.to_vec()))
        .with_attr("value", AttrValue::Float(value))
        .with_attr("dtype", AttrValue::DType(DType::F32))
}

/// `fill_constant` whose shape is read from the tensor `shape_var`.
pub fn fill_constant_from(out: &str, shape_var: &str, value: f32) -> OpDesc {
    OpDesc::new("fill_constant")
        .with_input("ShapeTensor", &[shape_var])
        .with_output("Out", &[out])
        .with_attr("value", AttrValue::Float(value))
}

pub fn scale(x: &str, out: &str, factor: f32) -> OpDesc {
    OpDesc::new("scale")
        .with_input("X", &[x])
        .with_output("Out", &[out])
        .with_attr("scale", AttrValue::Float(factor))
}

/// Block 0 program declaring `vars` as dense tensors and holding `ops`.
pub fn program(vars: &[&str], ops: Vec<OpDesc>) -> Result<ProgramDesc> {
    let mut program = ProgramDesc::new();
    for name in vars {
        program.add_var(0, VarDesc::tensor(*name))?;
    }
    for op in ops {
        program.add_op(0, op)?;
    }
    Ok(program)
}

/// Prepare an executor over block 0 of `program` with its variables created
/// in a fresh scope.
pub fn prepared(program: &ProgramDesc) -> Result<(NaiveExecutor, Arc<Scope>)> {
    register_test_ops();
    let scope = Scope::new();
    let mut exec = NaiveExecutor::new(Place::Cpu);
    exec.create_variables(program, 0, true, &scope)?;
    exec.create_variables(program, 0, false, &scope)?;
    exec.prepare(Some(Arc::clone(&scope)), program, 0)?;
    Ok((exec, scope))
}

pub fn set_shape(scope: &Scope, name: &str, dims: &[i64]) -> Result<()> {
    let var = scope
        .find_var(name)
        .ok_or_else(|| anyhow!("missing shape variable {}", name))?;
    let tensor = Tensor::from_vec(&[dims.len()], dims.to_vec())?;
    var.with_tensor_mut(|t| t.copy_from(&tensor))?
}

pub fn read_f32(scope: &Scope, name: &str) -> Result<Vec<f32>> {
    let var = scope
        .find_var(name)
        .ok_or_else(|| anyhow!("missing variable {}", name))?;
    var.get_tensor()?.to_vec::<f32>()
}
