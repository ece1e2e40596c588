use std::fmt;

use serde::{Deserialize, Serialize};

/// Execution placement handed to every operator run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Place {
    #[default]
    Cpu,
    Gpu(usize),
    Custom { kind: String, device_id: usize },
}

impl Place {
    pub fn is_cpu(&self) -> bool {
        matches!(self, Place::Cpu)
    }
}

impl fmt::Display for Place {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Place::Cpu => write!(f, "Place(cpu)"),
            Place::Gpu(id) => write!(f, "Place(gpu:{})", id),
            Place::Custom { kind, device_id } => write!(f, "Place({}:{})", kind, device_id),
        }
    }
}
