use serde::{Deserialize, Serialize};

use crate::error::{FlError, Result};

/// Round-level training knobs. The defaults are what a coordinator round uses
/// unless the embedding application overrides them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoundConfig {
    /// Full passes over the training sequence per round.
    pub epochs: usize,
    /// Requested samples per batch; clamped to the training-set size.
    pub batch_size: usize,
}

impl Default for RoundConfig {
    fn default() -> Self {
        Self {
            epochs: 5,
            batch_size: 32,
        }
    }
}

impl RoundConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| FlError::InvalidConfig(e.to_string()))
    }
}
