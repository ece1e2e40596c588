use anyhow::{Context, Result};
use serde_json::Value;

use super::types::ProgramDesc;

pub struct ProgramSerialize;

impl ProgramSerialize {
    pub fn json(program: &ProgramDesc) -> Result<Value> {
        Ok(serde_json::to_value(program)?)
    }

    pub fn json_string(program: &ProgramDesc) -> Result<String> {
        Ok(serde_json::to_string_pretty(program)?)
    }
}

pub struct ProgramDeserialize;

impl ProgramDeserialize {
    pub fn from_json(value: Value) -> Result<ProgramDesc> {
        Ok(serde_json::from_value(value)?)
    }

    pub fn from_str(text: &str) -> Result<ProgramDesc> {
        serde_json::from_str(text).context("failed to parse program description")
    }
}
