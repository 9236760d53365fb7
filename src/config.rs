//! Naming conventions used when the builder and the region compiler synthesize views.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed configuration: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid configuration: '{0}' must not be empty")]
    Empty(&'static str),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FlowConfig {
    /// Prefix of histogram keys: `HISTO_<var>`.
    pub histogram_prefix: String,
    /// Joins extra requirements onto a histogram key: `HISTO_<var>__<req>`.
    pub requirement_separator: String,
    /// Prefix of region weight views: `regionWeight_<region id>`.
    pub region_weight_prefix: String,
    /// Algorithm of a region weight when no event weight applies.
    pub weight_identity: String,
    pub weight_product: String,
    pub histogram_tag: String,
    /// Identity of the region with no selections.
    pub base_region: String,
    pub mask_prefix: String,
    pub indices_prefix: String,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            histogram_prefix: "HISTO_".into(),
            requirement_separator: "__".into(),
            region_weight_prefix: "regionWeight_".into(),
            weight_identity: "1.0f".into(),
            weight_product: " * ".into(),
            histogram_tag: "H1D::".into(),
            base_region: "base".into(),
            mask_prefix: "mask_".into(),
            indices_prefix: "indices_".into(),
        }
    }
}

impl FlowConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_json_str(&std::fs::read_to_string(path)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            ("histogram_prefix", &self.histogram_prefix),
            ("requirement_separator", &self.requirement_separator),
            ("region_weight_prefix", &self.region_weight_prefix),
            ("weight_identity", &self.weight_identity),
            ("weight_product", &self.weight_product),
            ("histogram_tag", &self.histogram_tag),
            ("base_region", &self.base_region),
            ("mask_prefix", &self.mask_prefix),
            ("indices_prefix", &self.indices_prefix),
        ];
        match required.iter().find(|(_, v)| v.is_empty()) {
            Some((field, _)) => Err(ConfigError::Empty(*field)),
            None => Ok(()),
        }
    }
}
