//! Predation — predator/prey relationships.
//!
//! A species can be prey, predator, or both. As prey it watches for the
//! listed predator species and registers a flee intent; as predator it looks
//! for prey while hungry and registers a hunt intent. The kill itself is
//! confirmed by the host through the engine's removal callback, which
//! restores the killer's hunger by [`kill_restore_amount`].

use ecotope_core::component::{DerivedFlags, Slot};
use ecotope_core::error::HandleError;
use ecotope_core::handle::{AttachContext, Handle, TickContext};
use ecotope_core::intent::{BehaviorIntent, IntentEffect};
use ecotope_core::profile::Profile;
use ecotope_core::types::{AgentId, SpeciesId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const ID: &str = "predation";

/// Fraction of the base restore granted for a juvenile victim.
pub const JUVENILE_RESTORE_FRACTION: f64 = 0.25;

#[derive(Debug, Clone, PartialEq)]
pub struct PreyConfig {
    pub enabled: bool,
    pub predators: Vec<SpeciesId>,
    pub detection_range: f64,
    pub flee_distance: f64,
    pub walk_speed: f64,
    pub flee_speed: f64,
    pub priority: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PredatorConfig {
    pub enabled: bool,
    pub prey: Vec<SpeciesId>,
    pub detection_range: f64,
    pub kill_restore: i32,
    pub priority: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PredationConfig {
    pub as_prey: PreyConfig,
    pub as_predator: PredatorConfig,
}

/// Species lists may carry `#tag` entries meant for the host's own lookup.
/// Only concrete species ids take part in spatial scans.
fn species_list(p: &Profile, path: &str) -> Vec<SpeciesId> {
    p.get_string_list(path)
        .into_iter()
        .filter(|s| !s.starts_with('#'))
        .map(SpeciesId::new)
        .collect()
}

impl PredationConfig {
    pub fn from_profile(p: &Profile) -> Self {
        // Older profiles put the prey ranges directly under `predation`.
        let flee_distance = p.get_f64("predation.flee_distance", 10.0);
        let detection_range = p.get_f64("predation.detection_range", 16.0);
        Self {
            as_prey: PreyConfig {
                enabled: p.get_bool("predation.as_prey.enabled", false),
                predators: species_list(p, "predation.as_prey.predators"),
                detection_range: p.get_f64("predation.as_prey.detection_range", detection_range),
                flee_distance: p.get_f64("predation.as_prey.flee_distance", flee_distance),
                walk_speed: p.get_f64("predation.as_prey.walk_speed", 1.0),
                flee_speed: p.get_f64("predation.as_prey.flee_speed", 1.5),
                priority: p.get_i32("predation.as_prey.priority", 2),
            },
            as_predator: PredatorConfig {
                enabled: p.get_bool("predation.as_predator.enabled", false),
                prey: species_list(p, "predation.as_predator.prey"),
                detection_range: p.get_f64("predation.as_predator.detection_range", 24.0),
                kill_restore: p.get_i32("predation.as_predator.kill_restore", 20).max(0),
                priority: p.get_i32("predation.as_predator.priority", 12),
            },
        }
    }
}

pub fn config(profile: &Profile) -> Arc<PredationConfig> {
    profile.cached("ecotope:predation", PredationConfig::from_profile)
}

pub fn is_predator(profile: &Profile) -> bool {
    config(profile).as_predator.enabled
}

/// Hunger restored to a predator for one confirmed kill: the full base for an
/// adult victim, a quarter of it (rounded up) for a juvenile.
pub fn kill_restore_amount(profile: &Profile, victim_is_baby: bool) -> i32 {
    let base = config(profile).as_predator.kill_restore;
    if victim_is_baby {
        (f64::from(base) * JUVENILE_RESTORE_FRACTION).ceil() as i32
    } else {
        base
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PredationState {
    /// Closest predator seen on the last scan.
    #[serde(default)]
    pub threat: Option<AgentId>,
    /// Prey picked on the last scan.
    #[serde(default)]
    pub target: Option<AgentId>,
}

/// The prey an agent is currently tracking, if any.
pub fn current_target(slot: &Slot) -> Option<AgentId> {
    slot.read::<PredationState>().target
}

#[derive(Debug, Clone, Copy)]
pub struct PredationHandle {
    interval: u64,
}

impl PredationHandle {
    pub fn new() -> Self {
        Self { interval: 5 }
    }
}

impl Default for PredationHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl Handle for PredationHandle {
    fn id(&self) -> &'static str {
        ID
    }

    fn tick_interval(&self) -> u64 {
        self.interval
    }

    fn supports(&self, profile: &Profile) -> bool {
        let cfg = config(profile);
        cfg.as_prey.enabled || cfg.as_predator.enabled
    }

    fn tick(&self, ctx: &mut TickContext<'_>) -> Result<(), HandleError> {
        let cfg = config(ctx.profile);
        let world = ctx.agent.world().clone();
        let position = ctx.agent.position();
        let nearest =
            |species: &[SpeciesId], range: f64| ctx.neighbors.nearest_of_any(&world, position, species, range);

        let mut state: PredationState = ctx.slot.read();
        state.threat = if cfg.as_prey.enabled {
            nearest(&cfg.as_prey.predators, cfg.as_prey.detection_range)
        } else {
            None
        };
        let wants_prey = cfg.as_predator.enabled && ctx.flags.is_hungry && !ctx.flags.is_exhausted;
        state.target = if wants_prey {
            nearest(&cfg.as_predator.prey, cfg.as_predator.detection_range)
        } else {
            None
        };
        ctx.slot.write(&state)
    }

    fn refresh_flags(&self, slot: &Slot, _profile: &Profile, flags: &mut DerivedFlags) {
        flags.threatened = slot.read::<PredationState>().threat.is_some();
    }

    fn register_intents(&self, ctx: &AttachContext<'_>) -> Vec<BehaviorIntent> {
        let cfg = config(ctx.profile);
        let mut intents = Vec::new();
        if cfg.as_prey.enabled {
            let prey = &cfg.as_prey;
            intents.push(
                BehaviorIntent::new(
                    ID,
                    prey.priority,
                    IntentEffect::Flee {
                        predators: prey.predators.iter().map(|s| s.as_str().to_string()).collect(),
                        detection_range: prey.detection_range,
                        flee_distance: prey.flee_distance,
                        walk_speed: prey.walk_speed,
                        sprint_speed: prey.flee_speed,
                    },
                )
                .when(|f| f.threatened && !f.is_exhausted),
            );
        }
        if cfg.as_predator.enabled {
            let hunter = &cfg.as_predator;
            intents.push(
                BehaviorIntent::new(
                    ID,
                    hunter.priority,
                    IntentEffect::Hunt {
                        prey: hunter.prey.iter().map(|s| s.as_str().to_string()).collect(),
                        detection_range: hunter.detection_range,
                    },
                )
                .when(|f| f.is_hungry && !f.is_exhausted),
            );
        }
        intents
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ecotope_core::handle::Clock;
    use ecotope_core::testing::{run_tick, FixedNeighbors, MockAgent};

    fn fox() -> Profile {
        Profile::builder("minecraft:fox")
            .set("predation.as_prey.enabled", true)
            .set("predation.as_prey.predators", vec!["minecraft:wolf", "#minecraft:raiders"])
            .set("predation.as_predator.enabled", true)
            .set("predation.as_predator.prey", vec!["minecraft:chicken", "minecraft:rabbit"])
            .set("predation.as_predator.kill_restore", 30)
            .build()
    }

    #[test]
    fn kill_restore_scales_for_juveniles() {
        let profile = fox();
        assert_eq!(kill_restore_amount(&profile, false), 30);
        assert_eq!(kill_restore_amount(&profile, true), 8, "ceil(30 * 0.25)");

        let default = Profile::empty("minecraft:wolf");
        assert_eq!(kill_restore_amount(&default, false), 20);
        assert_eq!(kill_restore_amount(&default, true), 5);
    }

    #[test]
    fn tags_are_not_scanned() {
        let cfg = config(&fox());
        assert_eq!(cfg.as_prey.predators, vec![SpeciesId::new("minecraft:wolf")]);
    }

    #[test]
    fn supports_needs_a_role() {
        assert!(!PredationHandle::new().supports(&Profile::empty("minecraft:cow")));
        assert!(PredationHandle::new().supports(&fox()));
    }

    #[test]
    fn prey_notices_predators() {
        let mut agent = MockAgent::new(8, "minecraft:fox");
        let mut slot = Slot::new(ID, serde_json::Value::Null);
        let mut flags = DerivedFlags::default();
        let wolf = AgentId::from_seed(99);
        let neighbors = FixedNeighbors {
            same_type_nearby: 0,
            nearest: Some(wolf),
        };
        run_tick(&PredationHandle::new(), &mut agent, &fox(), &mut slot, &mut flags, Clock::live(5), &neighbors)
            .unwrap();
        assert!(flags.threatened);
        assert_eq!(slot.read::<PredationState>().threat, Some(wolf));
        assert_eq!(current_target(&slot), None, "not hungry, so no hunt");
    }

    #[test]
    fn hungry_predators_pick_a_target() {
        let mut agent = MockAgent::new(8, "minecraft:fox");
        let mut slot = Slot::new(ID, serde_json::Value::Null);
        let rabbit = AgentId::from_seed(12);
        let neighbors = FixedNeighbors {
            same_type_nearby: 0,
            nearest: Some(rabbit),
        };
        let mut flags = DerivedFlags {
            is_hungry: true,
            ..DerivedFlags::default()
        };
        run_tick(&PredationHandle::new(), &mut agent, &fox(), &mut slot, &mut flags, Clock::live(5), &neighbors)
            .unwrap();
        assert_eq!(current_target(&slot), Some(rabbit));

        flags.is_exhausted = true;
        run_tick(&PredationHandle::new(), &mut agent, &fox(), &mut slot, &mut flags, Clock::live(10), &neighbors)
            .unwrap();
        assert_eq!(current_target(&slot), None);
    }

    #[test]
    fn intents_carry_priorities_and_predicates() {
        let agent = MockAgent::new(8, "minecraft:fox");
        let profile = fox();
        let slot = Slot::new(ID, serde_json::Value::Null);
        let ctx = AttachContext {
            agent: &agent,
            profile: &profile,
            slot: &slot,
        };
        let intents = PredationHandle::new().register_intents(&ctx);
        assert_eq!(intents.len(), 2);
        assert_eq!(intents[0].priority, 2);
        assert_eq!(intents[1].priority, 12);
        match &intents[0].effect {
            IntentEffect::Flee {
                flee_distance,
                sprint_speed,
                ..
            } => {
                assert_eq!(*flee_distance, 10.0);
                assert_eq!(*sprint_speed, 1.5);
            }
            other => panic!("unexpected effect {other:?}"),
        }

        let mut flags = DerivedFlags {
            threatened: true,
            ..DerivedFlags::default()
        };
        assert!(intents[0].applies(&flags));
        flags.is_exhausted = true;
        assert!(!intents[0].applies(&flags));
    }
}
