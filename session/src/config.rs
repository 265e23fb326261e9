use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::Result;

/// Settings for a simulated room
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Members of the room, the host included
    pub peers: usize,
    /// Most members the room admits
    pub capacity: usize,
    /// Stop after this many moves if the game hasn't ended
    pub max_plies: usize,
    /// Seed for the players and, when shuffling, for the delivery order
    pub seed: Option<u64>,
    /// Deliver messages in a random interleaving instead of sender order
    pub shuffle: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            peers: 3,
            capacity: 4,
            max_plies: 200,
            seed: None,
            shuffle: false,
        }
    }
}

impl SimulationConfig {
    pub fn from_yaml(text: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Read the YAML file at `path`, or fall back to the defaults when there is none
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_yaml(&fs::read_to_string(path)?),
            None => Ok(Self::default()),
        }
    }
}
