//! Engine builder: species from code bundles and profile data.
//!
//! Code bundles supply handle lists and default numbers; profile files
//! supply per-species overrides and may name handles of their own. When
//! both describe the same species they are merged, data winning.
//!
//! ```rust,ignore
//! use ecotope_runtime::engine_builder::EngineBuilder;
//! use ecotope_handles::bundles::{herbivore, predator};
//!
//! let engine = EngineBuilder::new()
//!     .with_bundle(herbivore("minecraft:sheep", &["minecraft:wolf"]))
//!     .with_bundle(predator("minecraft:wolf", &["minecraft:sheep"]))
//!     .with_profiles_dir("config/ecotope")
//!     .build()?;
//! ```

use crate::config::EngineConfig;
use crate::engine::Engine;
use crate::loader::ProfileLoader;
use crate::registry::{HandleCatalog, SpeciesRegistry};
use ecotope_core::error::Result;
use ecotope_core::handle::{Handle, SpeciesBundle};
use ecotope_core::profile::Profile;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// Builder for an [`Engine`] with its species registered.
pub struct EngineBuilder {
    config: EngineConfig,
    catalog: HandleCatalog,
    bundles: Vec<SpeciesBundle>,
    profiles: Vec<Profile>,
    profiles_dir: Option<PathBuf>,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineBuilder {
    /// A builder with default settings and the built-in handle catalog.
    pub fn new() -> Self {
        Self {
            config: EngineConfig::default(),
            catalog: HandleCatalog::builtin(),
            bundles: Vec::new(),
            profiles: Vec::new(),
            profiles_dir: None,
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Add a code bundle.
    pub fn with_bundle(mut self, bundle: SpeciesBundle) -> Self {
        self.bundles.push(bundle);
        self
    }

    /// Add an in-memory data profile.
    pub fn with_profile(mut self, profile: Profile) -> Self {
        self.profiles.push(profile);
        self
    }

    /// Load data profiles from a directory on build.
    ///
    /// See [`ProfileLoader`] for the layout.
    pub fn with_profiles_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.profiles_dir = Some(dir.into());
        self
    }

    /// Make a custom handle available to profiles that name it in
    /// `handles.order`.
    pub fn with_handle(mut self, handle: impl Handle + 'static) -> Self {
        self.catalog.insert(Arc::new(handle));
        self
    }

    pub fn with_catalog(mut self, catalog: HandleCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// Validate the configuration, load profiles and register every species.
    pub fn build(self) -> Result<Engine> {
        self.config.validate()?;

        let mut data = self.profiles;
        if let Some(dir) = &self.profiles_dir {
            let report = ProfileLoader::new(dir).load()?;
            for (path, reason) in &report.skipped {
                warn!(path = %path.display(), %reason, "profile skipped");
            }
            data.extend(report.profiles);
        }

        let mut registry = SpeciesRegistry::new();
        let mut bundles = self.bundles;
        for profile in &data {
            match bundles.iter().position(|b| &b.species == profile.species()) {
                Some(i) => {
                    let bundle = bundles.swap_remove(i);
                    registry.register_merged(bundle, profile, &self.catalog);
                }
                None => {
                    registry.register_data(profile, &self.catalog);
                }
            }
        }
        for bundle in bundles {
            registry.register_bundle(bundle);
        }

        info!(species = registry.len(), handles = self.catalog.len(), "engine built");
        Ok(Engine::from_parts(self.config, registry, self.catalog))
    }
}
