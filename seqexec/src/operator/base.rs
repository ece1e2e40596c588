use std::collections::{BTreeMap, BTreeSet};

use anyhow::{anyhow, Result};
use uuid::Uuid;

use crate::program::{AttrValue, OpDesc, EMPTY_VAR_NAME};
use crate::scope::Scope;

/// Descriptor data shared by every operator implementation.
#[derive(Debug, Clone)]
pub struct OperatorBase {
    op_type: String,
    uuid: Uuid,
    inputs: BTreeMap<String, Vec<String>>,
    outputs: BTreeMap<String, Vec<String>>,
    attrs: BTreeMap<String, AttrValue>,
    intermediate_outputs: BTreeSet<String>,
}

impl OperatorBase {
    pub fn from_desc(desc: &OpDesc) -> Self {
        Self {
            op_type: desc.op_type.clone(),
            uuid: Uuid::new_v4(),
            inputs: desc.inputs.clone(),
            outputs: desc.outputs.clone(),
            attrs: desc.attrs.clone(),
            intermediate_outputs: desc.intermediate_outputs.clone(),
        }
    }

    pub fn op_type(&self) -> &str {
        &self.op_type
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    pub fn inputs(&self) -> &BTreeMap<String, Vec<String>> {
        &self.inputs
    }

    pub fn outputs(&self) -> &BTreeMap<String, Vec<String>> {
        &self.outputs
    }

    pub fn attrs(&self) -> &BTreeMap<String, AttrValue> {
        &self.attrs
    }

    /// Names bound to an input slot, empty when absent.
    pub fn inputs_of(&self, slot: &str) -> &[String] {
        self.inputs.get(slot).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The single name bound to an input slot.
    pub fn input(&self, slot: &str) -> Result<&str> {
        single(self.inputs_of(slot), &self.op_type, "input", slot)
    }

    pub fn has_input(&self, slot: &str) -> bool {
        self.inputs_of(slot)
            .iter()
            .any(|name| name != EMPTY_VAR_NAME)
    }

    /// The single name bound to an output slot.
    pub fn output(&self, slot: &str) -> Result<&str> {
        let names = self.outputs.get(slot).map(Vec::as_slice).unwrap_or(&[]);
        single(names, &self.op_type, "output", slot)
    }

    pub fn attr(&self, name: &str) -> Option<&AttrValue> {
        self.attrs.get(name)
    }

    pub fn attr_f32(&self, name: &str, default: f32) -> Result<f32> {
        match self.attrs.get(name) {
            None => Ok(default),
            Some(AttrValue::Float(value)) => Ok(*value),
            Some(AttrValue::Double(value)) => Ok(*value as f32),
            Some(AttrValue::Int(value)) => Ok(*value as f32),
            Some(other) => Err(self.attr_type_error(name, "float", other)),
        }
    }

    pub fn attr_bool(&self, name: &str, default: bool) -> Result<bool> {
        match self.attrs.get(name) {
            None => Ok(default),
            Some(AttrValue::Bool(value)) => Ok(*value),
            Some(other) => Err(self.attr_type_error(name, "bool", other)),
        }
    }

    pub fn attr_block(&self, name: &str) -> Result<usize> {
        match self.attrs.get(name) {
            Some(AttrValue::Block(idx)) => Ok(*idx),
            Some(other) => Err(self.attr_type_error(name, "block", other)),
            None => Err(anyhow!(
                "operator {} is missing attribute {}",
                self.op_type,
                name
            )),
        }
    }

    /// Output names in slot order. Intermediate slots are left out unless
    /// `include_intermediate` is set; the empty placeholder is always left out.
    pub fn output_vars(&self, include_intermediate: bool) -> Vec<String> {
        let mut names = Vec::new();
        for (slot, slot_names) in &self.outputs {
            if !include_intermediate && self.intermediate_outputs.contains(slot) {
                continue;
            }
            for name in slot_names {
                if name != EMPTY_VAR_NAME {
                    names.push(name.clone());
                }
            }
        }
        names
    }

    fn attr_type_error(&self, name: &str, expected: &str, got: &AttrValue) -> anyhow::Error {
        anyhow!(
            "operator {} attribute {} must be {}, got {:?}",
            self.op_type,
            name,
            expected,
            got
        )
    }
}

fn single<'a>(names: &'a [String], op_type: &str, kind: &str, slot: &str) -> Result<&'a str> {
    match names {
        [name] => Ok(name.as_str()),
        [] => Err(anyhow!("operator {} has no {} {}", op_type, kind, slot)),
        _ => Err(anyhow!(
            "operator {} expects one {} {}, got {}",
            op_type,
            kind,
            slot,
            names.len()
        )),
    }
}

/// One-line description of an operator, with tensor shapes when a scope is
/// available: `scale(X=[x:f32[2,3]]) -> (Out=[y:f32[2,3]])`.
pub fn describe_op(base: &OperatorBase, scope: Option<&Scope>) -> String {
    let inputs = describe_slots(base.inputs(), scope);
    let outputs = describe_slots(base.outputs(), scope);
    format!("{}({}) -> ({})", base.op_type(), inputs, outputs)
}

fn describe_slots(slots: &BTreeMap<String, Vec<String>>, scope: Option<&Scope>) -> String {
    slots
        .iter()
        .map(|(slot, names)| {
            let names = names
                .iter()
                .map(|name| describe_var(name, scope))
                .collect::<Vec<_>>()
                .join(", ");
            format!("{}=[{}]", slot, names)
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn describe_var(name: &str, scope: Option<&Scope>) -> String {
    let Some(var) = scope.and_then(|scope| scope.find_var(name)) else {
        return name.to_string();
    };
    match var.with_tensor(|tensor| tensor.describe()) {
        Ok(desc) => format!("{}:{}", name, desc),
        Err(_) => name.to_string(),
    }
}
