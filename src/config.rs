//! Engine configuration loaded from a JSON file.
//!
//! Every field has a default, so `{}` is a valid configuration:
//!
//! ```json
//! {
//!   "base_weight": -50,
//!   "policy": "sequential",
//!   "placements": [
//!     { "parent": "tools:", "position": "above_node.add_page" }
//!   ]
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::ids::{ParentContext, Weight};
use crate::placement::{PlacementHooks, StaticPlacement};
use crate::position::TargetSpec;
use crate::renumber::{DEFAULT_BASE_WEIGHT, RenumberOptions, RenumberPolicy};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed config '{path}': {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("placement for '{parent}' must be 'above_<id>' or 'below_<id>', got '{position}'")]
    InvalidPlacement { parent: ParentContext, position: String },
}

/// A configured above/below rule for one parent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacementRule {
    pub parent: ParentContext,
    /// `above_<id>` or `below_<id>`
    pub position: String,
}

impl PlacementRule {
    pub fn to_hook(&self) -> Result<StaticPlacement, ConfigError> {
        match self.position.parse::<TargetSpec>() {
            Ok(TargetSpec::RelativeTo { id, side }) => Ok(StaticPlacement::new(self.parent.clone(), side, id)),
            _ => Err(ConfigError::InvalidPlacement {
                parent: self.parent.clone(),
                position: self.position.clone(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub base_weight: Weight,
    pub policy: RenumberPolicy,
    pub placements: Vec<PlacementRule>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            base_weight: DEFAULT_BASE_WEIGHT,
            policy: RenumberPolicy::default(),
            placements: Vec::new(),
        }
    }
}

impl EngineConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();
        let shown = path_ref.display().to_string();
        let json = fs::read_to_string(path_ref).map_err(|source| ConfigError::Io {
            path: shown.clone(),
            source,
        })?;
        let config: EngineConfig = serde_json::from_str(&json).map_err(|source| ConfigError::Json {
            path: shown.clone(),
            source,
        })?;
        // Surface bad placement rules at load time rather than on first use.
        config.hooks()?;
        tracing::debug!(path = %shown, policy = ?config.policy, base_weight = config.base_weight, "loaded config");
        Ok(config)
    }

    pub fn renumber_options(&self) -> RenumberOptions {
        RenumberOptions {
            policy: self.policy,
            base_weight: self.base_weight,
        }
    }

    pub fn hooks(&self) -> Result<PlacementHooks, ConfigError> {
        let mut hooks = PlacementHooks::new();
        for rule in &self.placements {
            hooks.register(rule.to_hook()?);
        }
        Ok(hooks)
    }
}
