//! Breeding eligibility.
//!
//! An agent can breed when it is an adult, healthy enough, at or above the
//! configured condition, hunger and age minimums, and past its cooldown.
//! Eligibility is recomputed every pass. The act of breeding happens in the
//! host, which reports it back through `on_breed` so the cooldown restarts.

use crate::common::{cooldown_elapsed, section_enabled};
use ecotope_core::capability::{Capabilities, Capability};
use ecotope_core::component::{DerivedFlags, Slot};
use ecotope_core::error::HandleError;
use ecotope_core::handle::{AttachContext, EventContext, Handle, TickContext};
use ecotope_core::host::AgentHost;
use ecotope_core::intent::{BehaviorIntent, IntentEffect};
use ecotope_core::profile::Profile;
use ecotope_core::types::Tick;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const ID: &str = "breeding";

#[derive(Debug, Clone, PartialEq)]
pub struct BreedingConfig {
    pub min_health: f64,
    pub min_condition: i32,
    pub min_hunger: i32,
    pub min_age: u64,
    pub cooldown: u64,
    pub priority: i32,
}

impl BreedingConfig {
    pub fn from_profile(p: &Profile) -> Self {
        Self {
            min_health: p.get_f64("breeding.min_health", 0.7),
            min_condition: p.get_i32("breeding.min_condition", 0),
            min_hunger: p.get_i32("breeding.min_hunger", 0),
            min_age: p.get_u64("breeding.min_age", 0),
            cooldown: p.get_u64("breeding.cooldown", 6_000),
            priority: p.get_i32("breeding.priority", 5),
        }
    }

    /// The eligibility conjunction. Readings a species does not publish
    /// impose no requirement.
    pub fn is_eligible(
        &self,
        agent: &dyn AgentHost,
        flags: &DerivedFlags,
        last_breed: Option<Tick>,
        now: Tick,
    ) -> bool {
        let meets = |reading: Option<i32>, min: i32| reading.map_or(true, |v| v >= min);
        !agent.is_baby()
            && agent.health_fraction() >= self.min_health
            && flags.readings.age.map_or(true, |age| age >= self.min_age)
            && meets(flags.readings.condition, self.min_condition)
            && meets(flags.readings.hunger, self.min_hunger)
            && cooldown_elapsed(last_breed, now, self.cooldown)
    }
}

pub fn config(profile: &Profile) -> Arc<BreedingConfig> {
    profile.cached("ecotope:breeding", BreedingConfig::from_profile)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BreedingState {
    #[serde(default)]
    pub last_breed: Option<Tick>,
    #[serde(default)]
    pub eligible: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BreedingHandle;

impl BreedingHandle {
    pub fn new() -> Self {
        Self
    }
}

impl Handle for BreedingHandle {
    fn id(&self) -> &'static str {
        ID
    }

    fn required_capabilities(&self) -> Capabilities {
        Capabilities::of(Capability::Breed)
    }

    fn supports(&self, profile: &Profile) -> bool {
        section_enabled(profile, ID)
    }

    fn tick(&self, ctx: &mut TickContext<'_>) -> Result<(), HandleError> {
        let cfg = config(ctx.profile);
        let mut state: BreedingState = ctx.slot.read();
        state.eligible = cfg.is_eligible(&*ctx.agent, ctx.flags, state.last_breed, ctx.clock.now);
        ctx.slot.write(&state)
    }

    fn refresh_flags(&self, slot: &Slot, _profile: &Profile, flags: &mut DerivedFlags) {
        flags.can_breed = slot.read::<BreedingState>().eligible;
    }

    fn register_intents(&self, ctx: &AttachContext<'_>) -> Vec<BehaviorIntent> {
        let cfg = config(ctx.profile);
        vec![BehaviorIntent::new(ID, cfg.priority, IntentEffect::Breed).when(|f| f.can_breed)]
    }

    fn on_breed(&self, ctx: &mut EventContext<'_>) -> Result<(), HandleError> {
        let state = BreedingState {
            last_breed: Some(ctx.now),
            eligible: false,
        };
        ctx.slot.write(&state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ecotope_core::component::Readings;
    use ecotope_core::handle::Clock;
    use ecotope_core::neighborhood::NoNeighbors;
    use ecotope_core::testing::{run_tick, MockAgent};

    fn profile() -> Profile {
        Profile::builder("minecraft:cow")
            .set("breeding.min_condition", 50)
            .set("breeding.min_hunger", 40)
            .set("breeding.cooldown", 1_000)
            .build()
    }

    fn healthy_flags() -> DerivedFlags {
        DerivedFlags {
            readings: Readings {
                hunger: Some(80),
                condition: Some(70),
                age: Some(30_000),
                ..Readings::default()
            },
            ..DerivedFlags::default()
        }
    }

    fn tick(agent: &mut MockAgent, slot: &mut Slot, flags: DerivedFlags, now: Tick) -> bool {
        let mut flags = flags;
        run_tick(&BreedingHandle, agent, &profile(), slot, &mut flags, Clock::live(now), &NoNeighbors)
            .unwrap();
        flags.can_breed
    }

    #[test]
    fn healthy_adults_can_breed() {
        let mut agent = MockAgent::new(7, "minecraft:cow");
        let mut slot = Slot::new(ID, serde_json::Value::Null);
        assert!(tick(&mut agent, &mut slot, healthy_flags(), 10));
    }

    #[test]
    fn each_requirement_can_veto() {
        let mut slot = Slot::new(ID, serde_json::Value::Null);

        let mut baby = MockAgent::new(7, "minecraft:cow").baby();
        assert!(!tick(&mut baby, &mut slot, healthy_flags(), 10));

        let mut hurt = MockAgent::new(7, "minecraft:cow");
        hurt.health = 0.5;
        assert!(!tick(&mut hurt, &mut slot, healthy_flags(), 10));

        let mut agent = MockAgent::new(7, "minecraft:cow");
        let mut thin = healthy_flags();
        thin.readings.condition = Some(20);
        assert!(!tick(&mut agent, &mut slot, thin, 10));

        let mut hungry = healthy_flags();
        hungry.readings.hunger = Some(10);
        assert!(!tick(&mut agent, &mut slot, hungry, 10));
    }

    #[test]
    fn missing_readings_do_not_block() {
        let mut agent = MockAgent::new(7, "minecraft:cow");
        let mut slot = Slot::new(ID, serde_json::Value::Null);
        assert!(tick(&mut agent, &mut slot, DerivedFlags::default(), 10));
    }

    #[test]
    fn on_breed_starts_the_cooldown() {
        let mut agent = MockAgent::new(7, "minecraft:cow");
        let profile = profile();
        let mut slot = Slot::new(ID, serde_json::Value::Null);
        {
            let mut ctx = EventContext {
                agent: &mut agent,
                profile: &profile,
                slot: &mut slot,
                now: 100,
            };
            BreedingHandle.on_breed(&mut ctx).unwrap();
        }
        assert!(!tick(&mut agent, &mut slot, healthy_flags(), 500));
        assert!(!tick(&mut agent, &mut slot, healthy_flags(), 1_099));
        assert!(tick(&mut agent, &mut slot, healthy_flags(), 1_100));
    }
}
