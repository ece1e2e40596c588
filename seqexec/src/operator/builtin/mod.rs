mod control_flow;
mod tensor_ops;

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};

use crate::place::Place;
use crate::program::{OpDesc, ProgramDesc};
use crate::scope::{Scope, Variable};
use crate::tensor::{DType, Tensor};

use super::base::OperatorBase;
use super::registry::OpCreator;
use super::Operator;

pub(super) fn entries() -> Vec<(&'static str, OpCreator)> {
    vec![
        ("fill_constant", creator(tensor_ops::FillConstantOp::create)),
        ("assign", creator(tensor_ops::AssignOp::create)),
        ("scale", creator(tensor_ops::ScaleOp::create)),
        ("elementwise_add", creator(tensor_ops::ElementwiseAddOp::create)),
        ("relu", creator(tensor_ops::ReluOp::create)),
        ("increment", creator(tensor_ops::IncrementOp::create)),
        ("less_than", creator(tensor_ops::LessThanOp::create)),
        (
            "conditional_block",
            creator(control_flow::ConditionalBlockOp::create),
        ),
        ("while", creator(control_flow::WhileOp::create)),
    ]
}

fn creator<F>(create: F) -> OpCreator
where
    F: Fn(&OpDesc, &ProgramDesc) -> Result<Box<dyn Operator>> + Send + Sync + 'static,
{
    Arc::new(create)
}

fn ensure_cpu(base: &OperatorBase, place: &Place) -> Result<()> {
    if place.is_cpu() {
        Ok(())
    } else {
        Err(anyhow!(
            "operator {} has no kernel for {}",
            base.op_type(),
            place
        ))
    }
}

fn read_input(scope: &Scope, base: &OperatorBase, slot: &str) -> Result<Tensor> {
    let name = base.input(slot)?;
    read_var(scope, base, name)
}

fn read_var(scope: &Scope, base: &OperatorBase, name: &str) -> Result<Tensor> {
    let var = scope.find_var(name).ok_or_else(|| {
        anyhow!(
            "input variable {} of operator {} not found in scope",
            name,
            base.op_type()
        )
    })?;
    var.get_tensor()
        .with_context(|| format!("reading {} for operator {}", name, base.op_type()))
}

fn output_var(scope: &Scope, base: &OperatorBase, slot: &str) -> Result<Variable> {
    let name = base.output(slot)?;
    scope.find_var(name).ok_or_else(|| {
        anyhow!(
            "output variable {} of operator {} not found in scope",
            name,
            base.op_type()
        )
    })
}

fn write_output(var: &Variable, shape: &[usize], dtype: DType, values: &[f64]) -> Result<()> {
    var.with_tensor_mut(|tensor| write_values(tensor, dtype, shape, values))?
}

/// Store `values` into `tensor` converted to `dtype`.
fn write_values(tensor: &mut Tensor, dtype: DType, shape: &[usize], values: &[f64]) -> Result<()> {
    tensor.set_dtype(dtype);
    match dtype {
        DType::F32 => tensor.write(shape, &values.iter().map(|v| *v as f32).collect::<Vec<_>>()),
        DType::F64 => tensor.write(shape, values),
        DType::I32 => tensor.write(shape, &values.iter().map(|v| *v as i32).collect::<Vec<_>>()),
        DType::I64 => tensor.write(shape, &values.iter().map(|v| *v as i64).collect::<Vec<_>>()),
        DType::U8 | DType::Bool => {
            tensor.write(shape, &values.iter().map(|v| *v as u8).collect::<Vec<_>>())
        }
    }
}

/// Read any numeric tensor widened to `f64`.
fn read_values(tensor: &Tensor) -> Result<Vec<f64>> {
    let values = match tensor.dtype() {
        DType::F32 => tensor.to_vec::<f32>()?.into_iter().map(f64::from).collect(),
        DType::F64 => tensor.to_vec::<f64>()?,
        DType::I32 => tensor.to_vec::<i32>()?.into_iter().map(f64::from).collect(),
        DType::I64 => tensor.to_vec::<i64>()?.into_iter().map(|v| v as f64).collect(),
        DType::U8 | DType::Bool => tensor.to_vec::<u8>()?.into_iter().map(f64::from).collect(),
    };
    Ok(values)
}

fn tensor_to_bool(tensor: &Tensor) -> Result<bool> {
    if tensor.numel() != 1 {
        return Err(anyhow!(
            "expected scalar condition, got {}",
            tensor.describe()
        ));
    }
    let values = read_values(tensor)?;
    Ok(values[0] != 0.0)
}
