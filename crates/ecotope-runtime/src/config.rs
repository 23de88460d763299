//! Engine configuration.
//!
//! All tunables of the step coordinator and the population layer. Every
//! field has a documented default, so a partial TOML file (or none at all)
//! is a valid configuration.

use ecotope_core::component::MAX_CATCH_UP_STEPS;
use ecotope_core::error::{ConfigError, EcotopeError, Result};
use crate::population::DEFAULT_REGION_SIZE;
use ecotope_core::types::DEFAULT_CELL_SIZE;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration for the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Upper bound on elapsed steps applied in one pass (default: 24000).
    #[serde(default = "default_max_catch_up_steps")]
    pub max_catch_up_steps: u64,
    /// Unobserved agents run once every this many steps (default: 20).
    #[serde(default = "default_distant_update_interval")]
    pub distant_update_interval: u64,
    /// Side length of a spatial/population cell (default: 16).
    #[serde(default = "default_cell_size")]
    pub cell_size: u32,
    /// Cells per side of a population region (default: 8).
    #[serde(default = "default_region_size")]
    pub region_size: u32,
    /// Fraction of a cap at which spawning starts to thin out (default: 0.8).
    #[serde(default = "default_soft_cap_ratio")]
    pub soft_cap_ratio: f64,
    /// Seconds before unused spawn placements are dropped (default: 600).
    #[serde(default = "default_placement_expiry_secs")]
    pub placement_expiry_secs: u64,
}

fn default_max_catch_up_steps() -> u64 {
    MAX_CATCH_UP_STEPS
}

fn default_distant_update_interval() -> u64 {
    20
}

fn default_cell_size() -> u32 {
    DEFAULT_CELL_SIZE
}

fn default_region_size() -> u32 {
    DEFAULT_REGION_SIZE
}

fn default_soft_cap_ratio() -> f64 {
    0.8
}

fn default_placement_expiry_secs() -> u64 {
    600
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_catch_up_steps: default_max_catch_up_steps(),
            distant_update_interval: default_distant_update_interval(),
            cell_size: default_cell_size(),
            region_size: default_region_size(),
            soft_cap_ratio: default_soft_cap_ratio(),
            placement_expiry_secs: default_placement_expiry_secs(),
        }
    }
}

impl EngineConfig {
    /// Parse and validate a TOML document. Missing fields take defaults.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_catch_up_steps == 0 {
            return Err(EcotopeError::invalid_config(
                "max_catch_up_steps",
                "0",
                "must allow at least one step",
            ));
        }
        if self.distant_update_interval == 0 {
            return Err(EcotopeError::invalid_config(
                "distant_update_interval",
                "0",
                "must be at least 1",
            ));
        }
        if self.cell_size == 0 {
            return Err(EcotopeError::invalid_config("cell_size", "0", "must be at least 1"));
        }
        if self.region_size == 0 {
            return Err(EcotopeError::invalid_config("region_size", "0", "must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.soft_cap_ratio) {
            return Err(ConfigError::OutOfRange {
                field: "soft_cap_ratio".to_string(),
                min: 0.0,
                max: 1.0,
                value: self.soft_cap_ratio,
            }
            .into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_is_all_defaults() {
        let config = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.max_catch_up_steps, 24_000);
        assert_eq!(config.cell_size, 16);
        assert_eq!(config.region_size, 8);
    }

    #[test]
    fn partial_documents_override_only_their_keys() {
        let config = EngineConfig::from_toml_str("distant_update_interval = 40\nsoft_cap_ratio = 0.5").unwrap();
        assert_eq!(config.distant_update_interval, 40);
        assert_eq!(config.soft_cap_ratio, 0.5);
        assert_eq!(config.placement_expiry_secs, 600);
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(matches!(
            EngineConfig::from_toml_str("cell_size = 0"),
            Err(EcotopeError::Config(ConfigError::InvalidValue { .. }))
        ));
        assert!(matches!(
            EngineConfig::from_toml_str("region_size = 0"),
            Err(EcotopeError::Config(ConfigError::InvalidValue { .. }))
        ));
        assert!(matches!(
            EngineConfig::from_toml_str("soft_cap_ratio = 1.5"),
            Err(EcotopeError::Config(ConfigError::OutOfRange { .. }))
        ));
        assert!(matches!(
            EngineConfig::from_toml_str("cell_size = \"big\""),
            Err(EcotopeError::Config(ConfigError::Parse(_)))
        ));
    }

    #[test]
    fn reads_from_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.toml");
        std::fs::write(&path, "max_catch_up_steps = 1200\n").unwrap();
        assert_eq!(EngineConfig::from_file(&path).unwrap().max_catch_up_steps, 1_200);
        assert!(matches!(
            EngineConfig::from_file(dir.path().join("missing.toml")),
            Err(EcotopeError::Io(_))
        ));
    }
}
