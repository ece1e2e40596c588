//! Program description types.
//!
//! A program is a list of blocks; each block declares variables and holds an
//! ordered list of operator descriptors. Block 0 is the global block.
use std::collections::{BTreeMap, BTreeSet};

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

use crate::tensor::DType;

/// Reserved variable name for absent optional slots.
pub const EMPTY_VAR_NAME: &str = "@EMPTY@";
/// Operator type of the feed marker elided at prepare time.
pub const FEED_OP_TYPE: &str = "feed";
/// Operator type of the fetch marker elided at prepare time.
pub const FETCH_OP_TYPE: &str = "fetch";

/// Attribute value attached to an operator descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttrValue {
    Float(f32),
    Double(f64),
    Int(i64),
    Bool(bool),
    Str(String),
    IntList(Vec<i64>),
    FloatList(Vec<f32>),
    DType(DType),
    Block(usize),
}

/// Declared kind of a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VarType {
    #[default]
    DenseTensor,
    TensorArray,
    StepScopes,
    Raw,
}

/// Variable declaration inside a block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VarDesc {
    pub name: String,
    #[serde(default)]
    pub var_type: VarType,
    #[serde(default)]
    pub persistable: bool,
    #[serde(default)]
    pub dtype: DType,
    #[serde(default)]
    pub shape: Vec<i64>,
}

impl VarDesc {
    /// Declare a non-persistable dense tensor.
    pub fn tensor(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            var_type: VarType::DenseTensor,
            persistable: false,
            dtype: DType::F32,
            shape: Vec::new(),
        }
    }

    /// Declare a variable of the given kind.
    pub fn of_type(name: impl Into<String>, var_type: VarType) -> Self {
        Self {
            var_type,
            ..Self::tensor(name)
        }
    }

    pub fn persistable(mut self) -> Self {
        self.persistable = true;
        self
    }

    pub fn with_dtype(mut self, dtype: DType) -> Self {
        self.dtype = dtype;
        self
    }

    pub fn with_shape(mut self, shape: Vec<i64>) -> Self {
        self.shape = shape;
        self
    }
}

/// Operator descriptor: type tag plus named input/output slots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpDesc {
    #[serde(rename = "type")]
    pub op_type: String,
    #[serde(default)]
    pub inputs: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub outputs: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub attrs: BTreeMap<String, AttrValue>,
    /// Output slots that only hold intermediate results.
    #[serde(default)]
    pub intermediate_outputs: BTreeSet<String>,
}

impl OpDesc {
    pub fn new(op_type: impl Into<String>) -> Self {
        Self {
            op_type: op_type.into(),
            inputs: BTreeMap::new(),
            outputs: BTreeMap::new(),
            attrs: BTreeMap::new(),
            intermediate_outputs: BTreeSet::new(),
        }
    }

    pub fn with_input(mut self, slot: &str, names: &[&str]) -> Self {
        self.inputs
            .insert(slot.to_string(), names.iter().map(|n| n.to_string()).collect());
        self
    }

    pub fn with_output(mut self, slot: &str, names: &[&str]) -> Self {
        self.outputs
            .insert(slot.to_string(), names.iter().map(|n| n.to_string()).collect());
        self
    }

    /// Add an output slot flagged as intermediate.
    pub fn with_intermediate_output(mut self, slot: &str, names: &[&str]) -> Self {
        self.intermediate_outputs.insert(slot.to_string());
        self.with_output(slot, names)
    }

    pub fn with_attr(mut self, name: &str, value: AttrValue) -> Self {
        self.attrs.insert(name.to_string(), value);
        self
    }

    /// Names bound to an input slot, empty when the slot is absent.
    pub fn input(&self, slot: &str) -> &[String] {
        self.inputs.get(slot).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Names bound to an output slot, empty when the slot is absent.
    pub fn output(&self, slot: &str) -> &[String] {
        self.outputs.get(slot).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn attr(&self, name: &str) -> Option<&AttrValue> {
        self.attrs.get(name)
    }

    /// True for the feed/fetch markers that the executor never runs.
    pub fn is_feed_or_fetch(&self) -> bool {
        self.op_type == FEED_OP_TYPE || self.op_type == FETCH_OP_TYPE
    }
}

/// A block of variable declarations and operators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockDesc {
    pub idx: usize,
    #[serde(default)]
    pub parent_idx: Option<usize>,
    #[serde(default)]
    pub vars: Vec<VarDesc>,
    #[serde(default)]
    pub ops: Vec<OpDesc>,
}

impl BlockDesc {
    pub fn new(idx: usize, parent_idx: Option<usize>) -> Self {
        Self {
            idx,
            parent_idx,
            vars: Vec::new(),
            ops: Vec::new(),
        }
    }

    pub fn var(&self, name: &str) -> Option<&VarDesc> {
        self.vars.iter().find(|var| var.name == name)
    }
}

/// Whole-program description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgramDesc {
    pub blocks: Vec<BlockDesc>,
}

impl Default for ProgramDesc {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgramDesc {
    /// Build a program with an empty global block.
    pub fn new() -> Self {
        Self {
            blocks: vec![BlockDesc::new(0, None)],
        }
    }

    /// Append a sub-block and return its index.
    pub fn append_block(&mut self, parent_idx: usize) -> Result<usize> {
        self.block(parent_idx)?;
        let idx = self.blocks.len();
        self.blocks.push(BlockDesc::new(idx, Some(parent_idx)));
        Ok(idx)
    }

    pub fn block(&self, idx: usize) -> Result<&BlockDesc> {
        self.blocks
            .get(idx)
            .ok_or_else(|| anyhow!("missing block: {}", idx))
    }

    pub fn block_mut(&mut self, idx: usize) -> Result<&mut BlockDesc> {
        self.blocks
            .get_mut(idx)
            .ok_or_else(|| anyhow!("missing block: {}", idx))
    }

    /// Declare a variable; an existing declaration with the same name is
    /// replaced.
    pub fn add_var(&mut self, block: usize, var: VarDesc) -> Result<()> {
        let block = self.block_mut(block)?;
        match block.vars.iter_mut().find(|existing| existing.name == var.name) {
            Some(existing) => *existing = var,
            None => block.vars.push(var),
        }
        Ok(())
    }

    pub fn add_op(&mut self, block: usize, op: OpDesc) -> Result<()> {
        self.block_mut(block)?.ops.push(op);
        Ok(())
    }

    pub fn num_blocks(&self) -> usize {
        self.blocks.len()
    }
}
