//! Species registry — species id to ordered handles plus profile.
//!
//! Registration is idempotent per species: the first `register` wins and
//! later calls report `false` without touching the entry. Hot reload goes
//! through [`SpeciesRegistry::replace`] or [`SpeciesRegistry::reload_profile`],
//! which publish a new entry under a fresh generation. Agents holding the old
//! entry keep using it until their next step picks up the new one.
//!
//! Handle order inside an entry is registration order and is the execution
//! order within a step.

use ecotope_core::error::{EcotopeError, Result};
use ecotope_core::handle::{Handle, SpeciesBundle};
use ecotope_core::profile::Profile;
use ecotope_core::types::SpeciesId;
use ecotope_handles::bundles::builtin_handles;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Profile key listing the handles a data profile wants, in order.
pub const HANDLE_ORDER_KEY: &str = "handles.order";

/// One published species entry.
pub struct SpeciesEntry {
    species: SpeciesId,
    handles: Vec<Arc<dyn Handle>>,
    profile: Arc<Profile>,
    generation: u64,
}

impl SpeciesEntry {
    pub fn species(&self) -> &SpeciesId {
        &self.species
    }

    pub fn handles(&self) -> &[Arc<dyn Handle>] {
        &self.handles
    }

    pub fn profile(&self) -> &Arc<Profile> {
        &self.profile
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn handle_ids(&self) -> Vec<&'static str> {
        self.handles.iter().map(|h| h.id()).collect()
    }
}

impl fmt::Debug for SpeciesEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpeciesEntry")
            .field("species", &self.species)
            .field("handles", &self.handle_ids())
            .field("generation", &self.generation)
            .finish()
    }
}

/// Handles that data profiles may name in `handles.order`.
#[derive(Clone, Default)]
pub struct HandleCatalog {
    handles: HashMap<&'static str, Arc<dyn Handle>>,
}

impl HandleCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every built-in handle.
    pub fn builtin() -> Self {
        let mut catalog = Self::new();
        for handle in builtin_handles() {
            catalog.insert(handle);
        }
        catalog
    }

    /// Add or replace a handle under its id.
    pub fn insert(&mut self, handle: Arc<dyn Handle>) {
        self.handles.insert(handle.id(), handle);
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn Handle>> {
        self.handles.get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

impl fmt::Debug for HandleCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ids: Vec<_> = self.handles.keys().collect();
        ids.sort();
        f.debug_struct("HandleCatalog").field("handles", &ids).finish()
    }
}

/// Keep the first handle for each id.
fn dedupe(species: &SpeciesId, handles: Vec<Arc<dyn Handle>>) -> Vec<Arc<dyn Handle>> {
    let mut seen = HashSet::new();
    handles
        .into_iter()
        .filter(|h| {
            let fresh = seen.insert(h.id());
            if !fresh {
                warn!(species = %species, handle = h.id(), "duplicate handle ignored");
            }
            fresh
        })
        .collect()
}

/// Combine a code bundle with a data profile.
///
/// Handles start from the data profile's `handles.order`, resolved through
/// `catalog`; unknown names are skipped with a warning. A code handle with
/// the same id replaces the catalog one in place; other code handles are
/// appended. The data profile is deep-merged over the bundle's defaults, so
/// keys the data leaves out keep their code values.
pub fn merge_with_data(bundle: SpeciesBundle, data: &Profile, catalog: &HandleCatalog) -> SpeciesBundle {
    if data.species() != &bundle.species {
        warn!(
            species = %bundle.species,
            data_species = %data.species(),
            "data profile names a different species, merging anyway"
        );
    }

    let mut handles: Vec<Arc<dyn Handle>> = Vec::new();
    for id in data.get_string_list(HANDLE_ORDER_KEY) {
        match catalog.get(&id) {
            Some(handle) => handles.push(handle),
            None => warn!(species = %bundle.species, handle = %id, "profile names an unknown handle"),
        }
    }
    for handle in bundle.handles {
        match handles.iter().position(|h| h.id() == handle.id()) {
            Some(at) => handles[at] = handle,
            None => handles.push(handle),
        }
    }

    let profile = Profile::builder(bundle.species.clone())
        .merge(bundle.profile.table())
        .merge(data.table())
        .build();

    SpeciesBundle {
        species: bundle.species,
        handles,
        profile,
    }
}

/// Species id to published entry. Lookups are a single hash probe.
#[derive(Debug, Default)]
pub struct SpeciesRegistry {
    entries: HashMap<SpeciesId, Arc<SpeciesEntry>>,
    generation: u64,
}

impl SpeciesRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn publish(&mut self, species: SpeciesId, handles: Vec<Arc<dyn Handle>>, profile: Profile) -> u64 {
        self.generation += 1;
        let generation = self.generation;
        let handles = dedupe(&species, handles);
        let profile = Arc::new(Profile::new(species.clone(), profile.table().clone()).with_generation(generation));
        self.entries.insert(
            species.clone(),
            Arc::new(SpeciesEntry {
                species,
                handles,
                profile,
                generation,
            }),
        );
        generation
    }

    /// Register a species. Returns `true` if it was newly inserted; a
    /// repeated registration is a no-op.
    pub fn register(
        &mut self,
        species: impl Into<SpeciesId>,
        handles: Vec<Arc<dyn Handle>>,
        profile: Profile,
    ) -> bool {
        let species = species.into();
        if self.entries.contains_key(&species) {
            debug!(species = %species, "species already registered");
            return false;
        }
        let generation = self.publish(species.clone(), handles, profile);
        debug!(species = %species, generation, "species registered");
        true
    }

    pub fn register_bundle(&mut self, bundle: SpeciesBundle) -> bool {
        self.register(bundle.species, bundle.handles, bundle.profile)
    }

    /// Register a code bundle merged with a data profile. Idempotent like
    /// [`register`](Self::register).
    pub fn register_merged(&mut self, bundle: SpeciesBundle, data: &Profile, catalog: &HandleCatalog) -> bool {
        if self.entries.contains_key(&bundle.species) {
            debug!(species = %bundle.species, "species already registered");
            return false;
        }
        self.register_bundle(merge_with_data(bundle, data, catalog))
    }

    /// Register a species described only by data.
    pub fn register_data(&mut self, data: &Profile, catalog: &HandleCatalog) -> bool {
        let empty = SpeciesBundle::new(Profile::empty(data.species().clone()));
        self.register_merged(empty, data, catalog)
    }

    /// Publish a new entry whether or not one exists. Returns its generation.
    pub fn replace(
        &mut self,
        species: impl Into<SpeciesId>,
        handles: Vec<Arc<dyn Handle>>,
        profile: Profile,
    ) -> u64 {
        let species = species.into();
        let generation = self.publish(species.clone(), handles, profile);
        info!(species = %species, generation, "species entry replaced");
        generation
    }

    /// Swap a species' profile, keeping its handles.
    pub fn reload_profile(&mut self, profile: Profile) -> Result<u64> {
        let species = profile.species().clone();
        let entry = self
            .entries
            .get(&species)
            .ok_or_else(|| EcotopeError::unknown_species(species.as_str()))?;
        let handles = entry.handles.clone();
        let generation = self.publish(species.clone(), handles, profile);
        info!(species = %species, generation, "profile reloaded");
        Ok(generation)
    }

    pub fn get(&self, species: &SpeciesId) -> Option<Arc<SpeciesEntry>> {
        self.entries.get(species).cloned()
    }

    pub fn contains(&self, species: &SpeciesId) -> bool {
        self.entries.contains_key(species)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Latest generation handed out.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn species(&self) -> impl Iterator<Item = &SpeciesId> {
        self.entries.keys()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ecotope_core::error::RegistryError;
    use ecotope_handles::bundles::herbivore;
    use ecotope_handles::hunger::HungerHandle;
    use ecotope_handles::social::SocialHandle;

    fn snapshot(registry: &SpeciesRegistry, species: &str) -> (Vec<&'static str>, u64, Profile) {
        let entry = registry.get(&SpeciesId::from(species)).unwrap();
        (entry.handle_ids(), entry.generation(), Profile::clone(entry.profile()))
    }

    #[test]
    fn registration_is_idempotent() {
        let mut registry = SpeciesRegistry::new();
        let handles: Vec<Arc<dyn Handle>> = vec![Arc::new(HungerHandle::new())];
        let profile = Profile::builder("minecraft:pig").set("hunger.decay_rate", 0.02).build();

        assert!(registry.register("minecraft:pig", handles.clone(), profile.clone()));
        let first = snapshot(&registry, "minecraft:pig");

        let other = Profile::builder("minecraft:pig").set("hunger.decay_rate", 0.5).build();
        assert!(!registry.register("minecraft:pig", handles, other));
        assert_eq!(snapshot(&registry, "minecraft:pig"), first);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn duplicate_handle_ids_keep_the_first() {
        let mut registry = SpeciesRegistry::new();
        let handles: Vec<Arc<dyn Handle>> = vec![
            Arc::new(HungerHandle::with_interval(5)),
            Arc::new(SocialHandle::new()),
            Arc::new(HungerHandle::new()),
        ];
        registry.register("minecraft:pig", handles, Profile::empty("minecraft:pig"));
        let entry = registry.get(&SpeciesId::from("minecraft:pig")).unwrap();
        assert_eq!(entry.handle_ids(), vec!["hunger", "social"]);
        assert_eq!(entry.handles()[0].tick_interval(), 5);
    }

    #[test]
    fn reload_bumps_generation_and_keeps_handles() {
        let mut registry = SpeciesRegistry::new();
        registry.register_bundle(herbivore("minecraft:sheep", &["minecraft:wolf"]));
        let before = registry.get(&SpeciesId::from("minecraft:sheep")).unwrap();

        let generation = registry
            .reload_profile(Profile::builder("minecraft:sheep").set("hunger.decay_rate", 0.03).build())
            .unwrap();
        let after = registry.get(&SpeciesId::from("minecraft:sheep")).unwrap();

        assert!(generation > before.generation());
        assert_eq!(after.profile().generation(), generation);
        assert_eq!(after.handle_ids(), before.handle_ids());
        assert_eq!(after.profile().get_f64("hunger.decay_rate", 0.0), 0.03);
        // The old entry is still intact for agents that hold it.
        assert_eq!(before.profile().get_f64("hunger.decay_rate", 0.0), 0.0);

        assert!(matches!(
            registry.reload_profile(Profile::empty("minecraft:cow")),
            Err(EcotopeError::Registry(RegistryError::UnknownSpecies(_)))
        ));
    }

    #[test]
    fn merged_registration_overlays_data_on_code() {
        let code = SpeciesBundle::new(
            Profile::builder("minecraft:goat")
                .set("hunger.decay_rate", 0.01)
                .set("hunger.max_value", 80)
                .build(),
        )
        .with_handle(HungerHandle::with_interval(7))
        .with_handle(SocialHandle::new());

        let data = Profile::builder("minecraft:goat")
            .set(HANDLE_ORDER_KEY, vec!["thirst", "hunger", "teleport"])
            .set("hunger.decay_rate", 0.05)
            .build();

        let mut registry = SpeciesRegistry::new();
        assert!(registry.register_merged(code, &data, &HandleCatalog::builtin()));
        let entry = registry.get(&SpeciesId::from("minecraft:goat")).unwrap();

        assert_eq!(entry.handle_ids(), vec!["thirst", "hunger", "social"]);
        assert_eq!(entry.handles()[1].tick_interval(), 7, "code handle wins in place");
        assert_eq!(entry.profile().get_f64("hunger.decay_rate", 0.0), 0.05);
        assert_eq!(entry.profile().get_i64("hunger.max_value", 0), 80);
    }

    #[test]
    fn data_only_species_use_the_catalog() {
        let data = Profile::builder("minecraft:llama")
            .set(HANDLE_ORDER_KEY, vec!["age", "hunger"])
            .build();
        let mut registry = SpeciesRegistry::new();
        assert!(registry.register_data(&data, &HandleCatalog::builtin()));
        assert!(!registry.register_data(&data, &HandleCatalog::builtin()));
        let entry = registry.get(&SpeciesId::from("minecraft:llama")).unwrap();
        assert_eq!(entry.handle_ids(), vec!["age", "hunger"]);
    }
}
