use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use anyhow::{anyhow, Result};
use once_cell::sync::Lazy;

use crate::program::{OpDesc, ProgramDesc};

use super::builtin;
use super::Operator;

/// Builds an operator from its descriptor. The program is passed so
/// control-flow operators can build their sub-blocks.
pub type OpCreator =
    Arc<dyn Fn(&OpDesc, &ProgramDesc) -> Result<Box<dyn Operator>> + Send + Sync>;

static REGISTRY: Lazy<RwLock<HashMap<String, OpCreator>>> = Lazy::new(|| {
    let entries = builtin::entries()
        .into_iter()
        .map(|(op_type, creator)| (op_type.to_string(), creator))
        .collect();
    RwLock::new(entries)
});

/// Process-wide table from operator type tag to creator.
pub struct OpRegistry;

impl OpRegistry {
    /// Register or replace the creator for `op_type`.
    pub fn register<F>(op_type: &str, creator: F) -> Result<()>
    where
        F: Fn(&OpDesc, &ProgramDesc) -> Result<Box<dyn Operator>> + Send + Sync + 'static,
    {
        let mut registry = REGISTRY
            .write()
            .map_err(|_| poisoned())?;
        registry.insert(op_type.to_string(), Arc::new(creator));
        Ok(())
    }

    pub fn contains(op_type: &str) -> bool {
        REGISTRY
            .read()
            .map(|registry| registry.contains_key(op_type))
            .unwrap_or(false)
    }

    /// Registered type tags, sorted.
    pub fn op_types() -> Vec<String> {
        let mut types = REGISTRY
            .read()
            .map(|registry| registry.keys().cloned().collect::<Vec<_>>())
            .unwrap_or_default();
        types.sort();
        types
    }

    pub fn create_op(desc: &OpDesc, program: &ProgramDesc) -> Result<Box<dyn Operator>> {
        // Creators may recurse into the registry for sub-blocks, so the lock
        // is released before calling one.
        let creator = {
            let registry = REGISTRY
                .read()
                .map_err(|_| poisoned())?;
            registry
                .get(&desc.op_type)
                .cloned()
                .ok_or_else(|| anyhow!("operator {} is not registered", desc.op_type))?
        };
        creator(desc, program)
    }
}

fn poisoned() -> anyhow::Error {
    crate::critical!("operator registry lock poisoned");
    anyhow!("operator registry lock poisoned")
}
