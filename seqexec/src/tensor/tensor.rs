//! Dense tensor with reference-counted backing storage.
//!
//! A `Tensor` is shape and dtype metadata over a shared `Buffer`. Several
//! tensors may point at the same buffer; each keeps its own metadata. The
//! buffer only ever grows through `mutable_data`, which reallocates when the
//! current allocation is too small and otherwise writes in place.
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};

use super::dtype::{DType, Element};
use super::shape::{format_shape, numel};

/// Reference-counted byte storage shared between aliased tensors.
pub type Buffer = Arc<Mutex<Vec<u8>>>;

#[derive(Debug, Clone, Default)]
pub struct Tensor {
    dtype: DType,
    shape: Vec<usize>,
    buffer: Option<Buffer>,
    offset: usize,
}

impl Tensor {
    /// Build an uninitialized tensor with no storage.
    pub fn new(dtype: DType) -> Self {
        Self {
            dtype,
            ..Self::default()
        }
    }

    /// Build a tensor that owns a fresh buffer holding `data`.
    pub fn from_vec<T: Element>(shape: &[usize], data: Vec<T>) -> Result<Self> {
        let mut tensor = Tensor::new(T::DTYPE);
        tensor.write(shape, &data)?;
        Ok(tensor)
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn numel(&self) -> usize {
        numel(&self.shape)
    }

    /// Bytes required by the current shape and dtype.
    pub fn required_bytes(&self) -> usize {
        self.numel() * self.dtype.size_of()
    }

    /// True once the tensor holds a buffer.
    pub fn is_initialized(&self) -> bool {
        self.buffer.is_some()
    }

    /// Usable bytes of the backing allocation past this tensor's offset.
    pub fn memory_size(&self) -> usize {
        match &self.buffer {
            Some(buffer) => buffer
                .lock()
                .map(|bytes| bytes.len().saturating_sub(self.offset))
                .unwrap_or(0),
            None => 0,
        }
    }

    /// Update shape metadata without touching storage.
    pub fn resize(&mut self, shape: &[usize]) {
        self.shape = shape.to_vec();
    }

    pub fn set_dtype(&mut self, dtype: DType) {
        self.dtype = dtype;
    }

    /// Make the tensor hold `shape` elements of `dtype`, reallocating only
    /// when the current buffer is too small.
    pub fn mutable_data(&mut self, dtype: DType, shape: &[usize]) -> Result<()> {
        self.dtype = dtype;
        self.shape = shape.to_vec();
        let required = self.required_bytes();
        if self.memory_size() < required || self.buffer.is_none() {
            self.buffer = Some(Arc::new(Mutex::new(vec![0u8; required])));
            self.offset = 0;
        }
        Ok(())
    }

    /// Write `data` as the tensor's contents with the given shape.
    pub fn write<T: Element>(&mut self, shape: &[usize], data: &[T]) -> Result<()> {
        let expected = numel(shape);
        if data.len() != expected {
            return Err(anyhow!(
                "element count mismatch: shape {} requires {} elements, got {}",
                format_shape(shape),
                expected,
                data.len()
            ));
        }
        let dtype = if T::accepts(self.dtype) {
            self.dtype
        } else {
            T::DTYPE
        };
        self.mutable_data(dtype, shape)?;
        let bytes: &[u8] = bytemuck::cast_slice(data);
        self.write_bytes(bytes)
    }

    /// Copy contents, dtype and shape from `src`. Safe when both tensors
    /// share one buffer.
    pub fn copy_from(&mut self, src: &Tensor) -> Result<()> {
        let bytes = src.read_bytes()?;
        self.mutable_data(src.dtype, &src.shape)?;
        self.write_bytes(&bytes)
    }

    /// Read the contents as a typed vector.
    pub fn to_vec<T: Element>(&self) -> Result<Vec<T>> {
        if !T::accepts(self.dtype) {
            return Err(anyhow!(
                "dtype mismatch: tensor is {}, requested {}",
                self.dtype,
                T::DTYPE
            ));
        }
        let bytes = self.read_bytes()?;
        Ok(bytemuck::pod_collect_to_vec::<u8, T>(&bytes))
    }

    /// Alias this tensor's storage to `other`'s buffer. Shape and dtype are
    /// kept; previous holders of the old buffer keep it alive.
    pub fn share_buffer_with(&mut self, other: &Tensor) {
        self.buffer = other.buffer.clone();
        self.offset = other.offset;
    }

    /// True if both tensors point at the same allocation.
    pub fn shares_buffer_with(&self, other: &Tensor) -> bool {
        match (&self.buffer, &other.buffer) {
            (Some(lhs), Some(rhs)) => Arc::ptr_eq(lhs, rhs),
            _ => false,
        }
    }

    /// Identity of the backing allocation, for diagnostics.
    pub fn buffer_id(&self) -> Option<usize> {
        self.buffer
            .as_ref()
            .map(|buffer| Arc::as_ptr(buffer) as *const () as usize)
    }

    /// Number of tensors (including this one) holding the current buffer.
    pub fn buffer_holders(&self) -> usize {
        self.buffer.as_ref().map(Arc::strong_count).unwrap_or(0)
    }

    pub fn describe(&self) -> String {
        format!("{}{}", self.dtype, format_shape(&self.shape))
    }

    fn read_bytes(&self) -> Result<Vec<u8>> {
        let required = self.required_bytes();
        let buffer = self
            .buffer
            .as_ref()
            .ok_or_else(|| anyhow!("tensor {} holds no buffer", self.describe()))?;
        let bytes = buffer
            .lock()
            .map_err(|_| anyhow!("tensor buffer lock poisoned"))?;
        let end = self.offset + required;
        if bytes.len() < end {
            return Err(anyhow!(
                "tensor {} needs {} bytes, buffer holds {}",
                self.describe(),
                required,
                bytes.len().saturating_sub(self.offset)
            ));
        }
        Ok(bytes[self.offset..end].to_vec())
    }

    fn write_bytes(&mut self, data: &[u8]) -> Result<()> {
        let buffer = self
            .buffer
            .as_ref()
            .ok_or_else(|| anyhow!("tensor {} holds no buffer", self.describe()))?;
        let mut bytes = buffer
            .lock()
            .map_err(|_| anyhow!("tensor buffer lock poisoned"))?;
        let end = self.offset + data.len();
        if bytes.len() < end {
            return Err(anyhow!(
                "write of {} bytes overflows buffer of {}",
                data.len(),
                bytes.len()
            ));
        }
        bytes[self.offset..end].copy_from_slice(data);
        Ok(())
    }
}
