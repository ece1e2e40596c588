use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{anyhow, Result};

use crate::program::VarType;
use crate::tensor::Tensor;

use super::Scope;

/// Value held by a variable.
#[derive(Debug, Default)]
pub enum VarValue {
    #[default]
    Uninit,
    Tensor(Tensor),
    TensorArray(Vec<Tensor>),
    StepScopes(Vec<Arc<Scope>>),
    Raw(Vec<u8>),
}

impl VarValue {
    pub fn var_type(&self) -> Option<VarType> {
        match self {
            VarValue::Uninit => None,
            VarValue::Tensor(_) => Some(VarType::DenseTensor),
            VarValue::TensorArray(_) => Some(VarType::TensorArray),
            VarValue::StepScopes(_) => Some(VarType::StepScopes),
            VarValue::Raw(_) => Some(VarType::Raw),
        }
    }
}

/// Cloneable handle to a named value living in a `Scope`. Clones refer to
/// the same value.
#[derive(Debug, Clone, Default)]
pub struct Variable {
    inner: Arc<Mutex<VarValue>>,
}

impl Variable {
    pub fn new() -> Self {
        Self::default()
    }

    /// True if both handles refer to the same variable.
    pub fn ptr_eq(&self, other: &Variable) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn is_initialized(&self) -> bool {
        self.var_type().is_some()
    }

    pub fn var_type(&self) -> Option<VarType> {
        self.lock().ok().and_then(|value| value.var_type())
    }

    pub fn is_tensor(&self) -> bool {
        self.var_type() == Some(VarType::DenseTensor)
    }

    /// Replace the held value.
    pub fn set(&self, value: VarValue) -> Result<()> {
        *self.lock()? = value;
        Ok(())
    }

    /// Clone of the held tensor. The clone shares the tensor's buffer.
    pub fn get_tensor(&self) -> Result<Tensor> {
        self.with_tensor(Tensor::clone)
    }

    /// Borrow the held tensor; errors if the variable is not a tensor.
    pub fn with_tensor<R>(&self, f: impl FnOnce(&Tensor) -> R) -> Result<R> {
        let value = self.lock()?;
        match &*value {
            VarValue::Tensor(tensor) => Ok(f(tensor)),
            other => Err(anyhow!(
                "variable holds {:?}, expected a dense tensor",
                other.var_type()
            )),
        }
    }

    /// Mutably borrow the held tensor, turning an uninitialized variable into
    /// an empty tensor first.
    pub fn with_tensor_mut<R>(&self, f: impl FnOnce(&mut Tensor) -> R) -> Result<R> {
        let mut value = self.lock()?;
        if matches!(&*value, VarValue::Uninit) {
            *value = VarValue::Tensor(Tensor::default());
        }
        match &mut *value {
            VarValue::Tensor(tensor) => Ok(f(tensor)),
            other => Err(anyhow!(
                "variable holds {:?}, expected a dense tensor",
                other.var_type()
            )),
        }
    }

    /// Mutably borrow the held tensor array, initializing it when empty.
    pub fn with_tensor_array_mut<R>(&self, f: impl FnOnce(&mut Vec<Tensor>) -> R) -> Result<R> {
        let mut value = self.lock()?;
        if matches!(&*value, VarValue::Uninit) {
            *value = VarValue::TensorArray(Vec::new());
        }
        match &mut *value {
            VarValue::TensorArray(items) => Ok(f(items)),
            other => Err(anyhow!(
                "variable holds {:?}, expected a tensor array",
                other.var_type()
            )),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, VarValue>> {
        self.inner
            .lock()
            .map_err(|_| anyhow!("variable lock poisoned"))
    }
}

/// Give a freshly created variable the empty value of its declared type.
pub fn initialize_variable(var: &Variable, var_type: VarType) -> Result<()> {
    let value = match var_type {
        VarType::DenseTensor => VarValue::Tensor(Tensor::default()),
        VarType::TensorArray => VarValue::TensorArray(Vec::new()),
        VarType::StepScopes => VarValue::StepScopes(Vec::new()),
        VarType::Raw => VarValue::Raw(Vec::new()),
    };
    var.set(value)
}
