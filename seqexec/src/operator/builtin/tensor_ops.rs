use std::sync::Arc;

use anyhow::{anyhow, Result};

use crate::operator::{Operator, OperatorBase};
use crate::place::Place;
use crate::program::{AttrValue, OpDesc, ProgramDesc};
use crate::scope::Scope;
use crate::tensor::DType;

use super::{ensure_cpu, output_var, read_input, read_values, write_output};

/// Fills `Out` with `value`. The shape comes from the `ShapeTensor` input
/// when bound, otherwise from the `shape` attribute.
pub struct FillConstantOp {
    base: OperatorBase,
}

impl FillConstantOp {
    pub fn create(desc: &OpDesc, _program: &ProgramDesc) -> Result<Box<dyn Operator>> {
        Ok(Box::new(Self {
            base: OperatorBase::from_desc(desc),
        }))
    }

    fn shape(&self, scope: &Scope) -> Result<Vec<usize>> {
        let dims = if self.base.has_input("ShapeTensor") {
            read_values(&read_input(scope, &self.base, "ShapeTensor")?)?
                .into_iter()
                .map(|dim| dim as i64)
                .collect::<Vec<_>>()
        } else {
            match self.base.attr("shape") {
                Some(AttrValue::IntList(dims)) => dims.clone(),
                None => Vec::new(),
                Some(other) => {
                    return Err(anyhow!("fill_constant shape must be an int list, got {:?}", other))
                }
            }
        };
        dims.into_iter()
            .map(|dim| {
                usize::try_from(dim).map_err(|_| anyhow!("fill_constant got negative dim {}", dim))
            })
            .collect()
    }

    fn dtype(&self) -> Result<DType> {
        match self.base.attr("dtype") {
            None => Ok(DType::F32),
            Some(AttrValue::DType(dtype)) => Ok(*dtype),
            Some(AttrValue::Str(ident)) => DType::from_ident(ident),
            Some(other) => Err(anyhow!("fill_constant dtype must be a dtype, got {:?}", other)),
        }
    }
}

impl Operator for FillConstantOp {
    fn base(&self) -> &OperatorBase {
        &self.base
    }

    fn run(&self, scope: &Arc<Scope>, place: &Place) -> Result<()> {
        ensure_cpu(&self.base, place)?;
        let shape = self.shape(scope)?;
        let dtype = self.dtype()?;
        let value = f64::from(self.base.attr_f32("value", 0.0)?);
        let count = shape.iter().product::<usize>();
        let out = output_var(scope, &self.base, "Out")?;
        write_output(&out, &shape, dtype, &vec![value; count])
    }
}

/// Copies `X` into `Out`.
pub struct AssignOp {
    base: OperatorBase,
}

impl AssignOp {
    pub fn create(desc: &OpDesc, _program: &ProgramDesc) -> Result<Box<dyn Operator>> {
        Ok(Box::new(Self {
            base: OperatorBase::from_desc(desc),
        }))
    }
}

impl Operator for AssignOp {
    fn base(&self) -> &OperatorBase {
        &self.base
    }

    fn run(&self, scope: &Arc<Scope>, place: &Place) -> Result<()> {
        ensure_cpu(&self.base, place)?;
        let x = read_input(scope, &self.base, "X")?;
        let out = output_var(scope, &self.base, "Out")?;
        out.with_tensor_mut(|tensor| tensor.copy_from(&x))?
    }
}

/// `Out = scale * X + bias`, or `scale * (X + bias)` when
/// `bias_after_scale` is false.
pub struct ScaleOp {
    base: OperatorBase,
}

impl ScaleOp {
    pub fn create(desc: &OpDesc, _program: &ProgramDesc) -> Result<Box<dyn Operator>> {
        Ok(Box::new(Self {
            base: OperatorBase::from_desc(desc),
        }))
    }
}

impl Operator for ScaleOp {
    fn base(&self) -> &OperatorBase {
        &self.base
    }

    fn run(&self, scope: &Arc<Scope>, place: &Place) -> Result<()> {
        ensure_cpu(&self.base, place)?;
        let scale = f64::from(self.base.attr_f32("scale", 1.0)?);
        let bias = f64::from(self.base.attr_f32("bias", 0.0)?);
        let bias_after_scale = self.base.attr_bool("bias_after_scale", true)?;
        let x = read_input(scope, &self.base, "X")?;
        let values = read_values(&x)?
            .into_iter()
            .map(|v| {
                if bias_after_scale {
                    v * scale + bias
                } else {
                    (v + bias) * scale
                }
            })
            .collect::<Vec<_>>();
        let out = output_var(scope, &self.base, "Out")?;
        write_output(&out, x.shape(), x.dtype(), &values)
    }
}

/// `Out = X + Y`; `Y` is either the same shape as `X` or a single element.
pub struct ElementwiseAddOp {
    base: OperatorBase,
}

impl ElementwiseAddOp {
    pub fn create(desc: &OpDesc, _program: &ProgramDesc) -> Result<Box<dyn Operator>> {
        Ok(Box::new(Self {
            base: OperatorBase::from_desc(desc),
        }))
    }
}

impl Operator for ElementwiseAddOp {
    fn base(&self) -> &OperatorBase {
        &self.base
    }

    fn run(&self, scope: &Arc<Scope>, place: &Place) -> Result<()> {
        ensure_cpu(&self.base, place)?;
        let x = read_input(scope, &self.base, "X")?;
        let y = read_input(scope, &self.base, "Y")?;
        if x.dtype() != y.dtype() {
            return Err(anyhow!(
                "elementwise_add dtype mismatch: {} vs {}",
                x.dtype(),
                y.dtype()
            ));
        }
        let lhs = read_values(&x)?;
        let rhs = read_values(&y)?;
        let values = if rhs.len() == 1 {
            lhs.iter().map(|a| a + rhs[0]).collect::<Vec<_>>()
        } else if x.shape() == y.shape() {
            lhs.iter().zip(rhs.iter()).map(|(a, b)| a + b).collect()
        } else {
            return Err(anyhow!(
                "elementwise_add shape mismatch: {} vs {}",
                x.describe(),
                y.describe()
            ));
        };
        let out = output_var(scope, &self.base, "Out")?;
        write_output(&out, x.shape(), x.dtype(), &values)
    }
}

pub struct ReluOp {
    base: OperatorBase,
}

impl ReluOp {
    pub fn create(desc: &OpDesc, _program: &ProgramDesc) -> Result<Box<dyn Operator>> {
        Ok(Box::new(Self {
            base: OperatorBase::from_desc(desc),
        }))
    }
}

impl Operator for ReluOp {
    fn base(&self) -> &OperatorBase {
        &self.base
    }

    fn run(&self, scope: &Arc<Scope>, place: &Place) -> Result<()> {
        ensure_cpu(&self.base, place)?;
        let x = read_input(scope, &self.base, "X")?;
        let values = read_values(&x)?
            .into_iter()
            .map(|v| v.max(0.0))
            .collect::<Vec<_>>();
        let out = output_var(scope, &self.base, "Out")?;
        write_output(&out, x.shape(), x.dtype(), &values)
    }
}

/// `Out = X + step` for a single-element `X`.
pub struct IncrementOp {
    base: OperatorBase,
}

impl IncrementOp {
    pub fn create(desc: &OpDesc, _program: &ProgramDesc) -> Result<Box<dyn Operator>> {
        Ok(Box::new(Self {
            base: OperatorBase::from_desc(desc),
        }))
    }
}

impl Operator for IncrementOp {
    fn base(&self) -> &OperatorBase {
        &self.base
    }

    fn run(&self, scope: &Arc<Scope>, place: &Place) -> Result<()> {
        ensure_cpu(&self.base, place)?;
        let step = f64::from(self.base.attr_f32("step", 1.0)?);
        let x = read_input(scope, &self.base, "X")?;
        if x.numel() != 1 {
            return Err(anyhow!("increment expects one element, got {}", x.describe()));
        }
        let value = read_values(&x)?[0] + step;
        let out = output_var(scope, &self.base, "Out")?;
        write_output(&out, x.shape(), x.dtype(), &[value])
    }
}

/// Element-wise `X < Y` into a bool tensor.
pub struct LessThanOp {
    base: OperatorBase,
}

impl LessThanOp {
    pub fn create(desc: &OpDesc, _program: &ProgramDesc) -> Result<Box<dyn Operator>> {
        Ok(Box::new(Self {
            base: OperatorBase::from_desc(desc),
        }))
    }
}

impl Operator for LessThanOp {
    fn base(&self) -> &OperatorBase {
        &self.base
    }

    fn run(&self, scope: &Arc<Scope>, place: &Place) -> Result<()> {
        ensure_cpu(&self.base, place)?;
        let x = read_input(scope, &self.base, "X")?;
        let y = read_input(scope, &self.base, "Y")?;
        let lhs = read_values(&x)?;
        let rhs = read_values(&y)?;
        let values = if rhs.len() == 1 {
            lhs.iter()
                .map(|a| if *a < rhs[0] { 1.0 } else { 0.0 })
                .collect::<Vec<_>>()
        } else if x.shape() == y.shape() {
            lhs.iter()
                .zip(rhs.iter())
                .map(|(a, b)| if a < b { 1.0 } else { 0.0 })
                .collect()
        } else {
            return Err(anyhow!(
                "less_than shape mismatch: {} vs {}",
                x.describe(),
                y.describe()
            ));
        };
        let out = output_var(scope, &self.base, "Out")?;
        write_output(&out, x.shape(), DType::Bool, &values)
    }
}
