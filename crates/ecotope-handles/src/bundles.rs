//! Generic species bundles.
//!
//! Species differ mostly in numbers, so code ships only a few shapes and
//! leaves the rest to profile data. Every bundle lists its handles in the
//! canonical execution order: needs first, then the handles that read the
//! flags they publish.

use crate::age::AgeHandle;
use crate::breeding::BreedingHandle;
use crate::condition::ConditionHandle;
use crate::diet::DietHandle;
use crate::energy::EnergyHandle;
use crate::hunger::HungerHandle;
use crate::predation::PredationHandle;
use crate::production::ProductionHandle;
use crate::social::SocialHandle;
use crate::thirst::ThirstHandle;
use ecotope_core::handle::{Handle, SpeciesBundle};
use ecotope_core::profile::{Profile, ProfileBuilder};
use ecotope_core::types::SpeciesId;
use std::sync::Arc;

/// One instance of every built-in handle, in canonical order.
pub fn builtin_handles() -> Vec<Arc<dyn Handle>> {
    vec![
        Arc::new(AgeHandle::new()),
        Arc::new(HungerHandle::new()),
        Arc::new(ThirstHandle::new()),
        Arc::new(ConditionHandle::new()),
        Arc::new(SocialHandle::new()),
        Arc::new(EnergyHandle::new()),
        Arc::new(PredationHandle::new()),
        Arc::new(BreedingHandle::new()),
        Arc::new(DietHandle::new()),
        Arc::new(ProductionHandle::new()),
    ]
}

fn with_needs(species: impl Into<SpeciesId>) -> ProfileBuilder {
    Profile::builder(species)
        .set("hunger.enabled", true)
        .set("thirst.enabled", true)
        .set("condition.enabled", true)
}

fn bundle(profile: Profile) -> SpeciesBundle {
    builtin_handles()
        .into_iter()
        .fold(SpeciesBundle::new(profile), SpeciesBundle::with_shared)
}

/// A grazing animal that flees from `predators`.
pub fn herbivore(species: impl Into<SpeciesId>, predators: &[&str]) -> SpeciesBundle {
    let profile = with_needs(species)
        .set("predation.as_prey.enabled", !predators.is_empty())
        .set("predation.as_prey.predators", predators.to_vec())
        .build();
    bundle(profile)
}

/// A hunter of `prey`. Predators are not prey unless the profile data says so.
pub fn predator(species: impl Into<SpeciesId>, prey: &[&str]) -> SpeciesBundle {
    let profile = with_needs(species)
        .set("predation.as_predator.enabled", true)
        .set("predation.as_predator.prey", prey.to_vec())
        .set("energy.costs.hunt", 0.5)
        .build();
    bundle(profile)
}

/// An animal that produces a harvestable `resource`.
pub fn producer(species: impl Into<SpeciesId>, resource: &str) -> SpeciesBundle {
    let profile = with_needs(species)
        .set("production.enabled", true)
        .set("production.resource_type", resource)
        .build();
    bundle(profile)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predation;

    const ORDER: [&str; 10] = [
        "age",
        "hunger",
        "thirst",
        "condition",
        "social",
        "energy",
        "predation",
        "breeding",
        "diet",
        "production",
    ];

    #[test]
    fn builtin_ids_are_unique_and_ordered() {
        let ids: Vec<_> = builtin_handles().iter().map(|h| h.id()).collect();
        assert_eq!(ids, ORDER);
    }

    #[test]
    fn herbivores_flee() {
        let b = herbivore("minecraft:sheep", &["minecraft:wolf"]);
        assert_eq!(b.species.as_str(), "minecraft:sheep");
        assert_eq!(b.handle_ids(), ORDER);
        let cfg = predation::config(&b.profile);
        assert!(cfg.as_prey.enabled);
        assert!(!cfg.as_predator.enabled);
    }

    #[test]
    fn herbivores_without_predators_skip_predation() {
        let b = herbivore("minecraft:cow", &[]);
        let handle = PredationHandle::new();
        assert!(!handle.supports(&b.profile));
    }

    #[test]
    fn predators_hunt_and_producers_produce() {
        let wolf = predator("minecraft:wolf", &["minecraft:sheep", "minecraft:rabbit"]);
        assert!(predation::is_predator(&wolf.profile));

        let bee = producer("minecraft:bee", "honey");
        assert!(ProductionHandle::new().supports(&bee.profile));
        assert_eq!(bee.profile.get_str("production.resource_type", ""), "honey");
    }
}
