//! Hunger — linear decay scaled by elapsed steps.
//!
//! On a live pass (one elapsed step) hunger may fall to zero, and while it
//! sits at or below `damage_threshold` the agent takes starvation damage at
//! most once every `damage_interval` steps. On a catch-up pass hunger stops
//! one unit above the threshold and no damage is dealt.
//!
//! Profile keys (section `hunger`):
//!
//! | key | default |
//! |-----|---------|
//! | `max_value` | 100 |
//! | `starting_value` | 80 |
//! | `decay_rate` | 0.015 |
//! | `damage_threshold` | 5 |
//! | `damage_amount` | 1.0 |
//! | `damage_interval` | 200 |
//! | `hungry_threshold` | 30 |
//! | `satiated_threshold` | 75 |
//! | `seek_priority` | 4 |

use crate::common::{cooldown_elapsed, decay_floor, section_enabled};
use ecotope_core::component::{DerivedFlags, Slot};
use ecotope_core::error::HandleError;
use ecotope_core::handle::{AttachContext, Clock, Handle, TickContext};
use ecotope_core::host::DamageCause;
use ecotope_core::intent::{BehaviorIntent, IntentEffect};
use ecotope_core::profile::Profile;
use ecotope_core::types::Tick;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const ID: &str = "hunger";

/// Parsed `hunger` section.
#[derive(Debug, Clone, PartialEq)]
pub struct HungerConfig {
    pub max_value: i32,
    pub starting_value: i32,
    pub decay_rate: f64,
    pub damage_threshold: i32,
    pub damage_amount: f64,
    pub damage_interval: u64,
    pub hungry_threshold: i32,
    pub satiated_threshold: i32,
    pub seek_priority: i32,
}

impl HungerConfig {
    pub fn from_profile(p: &Profile) -> Self {
        let max_value = p.get_i32("hunger.max_value", 100).max(1);
        Self {
            max_value,
            starting_value: p.get_i32("hunger.starting_value", 80).clamp(0, max_value),
            decay_rate: p.get_f64("hunger.decay_rate", 0.015).max(0.0),
            damage_threshold: p.get_i32("hunger.damage_threshold", 5),
            damage_amount: p.get_f64("hunger.damage_amount", 1.0),
            damage_interval: p.get_u64("hunger.damage_interval", 200),
            hungry_threshold: p.get_i32("hunger.hungry_threshold", 30),
            satiated_threshold: p.get_i32("hunger.satiated_threshold", 75),
            seek_priority: p.get_i32("hunger.seek_priority", 4),
        }
    }
}

pub fn config(profile: &Profile) -> Arc<HungerConfig> {
    profile.cached("ecotope:hunger", HungerConfig::from_profile)
}

/// Blob shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HungerState {
    pub hunger: i32,
    #[serde(default)]
    pub last_damage_tick: Option<Tick>,
}

impl HungerState {
    pub fn new(hunger: i32) -> Self {
        Self {
            hunger,
            last_damage_tick: None,
        }
    }
}

/// New hunger value after one pass.
pub fn decayed(current: i32, cfg: &HungerConfig, clock: Clock) -> i32 {
    let min = if clock.is_catch_up() {
        cfg.damage_threshold + 1
    } else {
        0
    };
    decay_floor(current, cfg.decay_rate, clock.elapsed, min, cfg.max_value)
}

fn read(slot: &Slot, cfg: &HungerConfig) -> HungerState {
    slot.read_or_else(|| HungerState::new(cfg.starting_value))
}

/// Add `amount` hunger, capped at `max_value`. Returns the new value.
pub fn restore(slot: &mut Slot, profile: &Profile, amount: i32) -> Result<i32, HandleError> {
    let cfg = config(profile);
    let mut state = read(slot, &cfg);
    state.hunger = state.hunger.saturating_add(amount.max(0)).min(cfg.max_value);
    slot.write(&state)?;
    Ok(state.hunger)
}

#[derive(Debug, Clone, Copy)]
pub struct HungerHandle {
    interval: u64,
}

impl HungerHandle {
    pub fn new() -> Self {
        Self { interval: 20 }
    }

    pub fn with_interval(interval: u64) -> Self {
        Self {
            interval: interval.max(1),
        }
    }
}

impl Default for HungerHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl Handle for HungerHandle {
    fn id(&self) -> &'static str {
        ID
    }

    fn tick_interval(&self) -> u64 {
        self.interval
    }

    fn supports(&self, profile: &Profile) -> bool {
        section_enabled(profile, ID)
    }

    fn tick(&self, ctx: &mut TickContext<'_>) -> Result<(), HandleError> {
        let cfg = config(ctx.profile);
        let mut state = read(ctx.slot, &cfg);
        state.hunger = decayed(state.hunger, &cfg, ctx.clock);

        let now = ctx.clock.now;
        if !ctx.clock.is_catch_up()
            && state.hunger <= cfg.damage_threshold
            && cooldown_elapsed(state.last_damage_tick, now, cfg.damage_interval)
        {
            ctx.agent.damage(DamageCause::Starvation, cfg.damage_amount);
            state.last_damage_tick = Some(now);
        }

        ctx.slot.write(&state)
    }

    fn refresh_flags(&self, slot: &Slot, profile: &Profile, flags: &mut DerivedFlags) {
        let cfg = config(profile);
        let state = read(slot, &cfg);
        flags.is_starving = state.hunger <= cfg.damage_threshold;
        flags.is_hungry = state.hunger < cfg.hungry_threshold;
        flags.is_satiated = state.hunger > cfg.satiated_threshold;
        flags.readings.hunger = Some(state.hunger);
    }

    fn register_intents(&self, ctx: &AttachContext<'_>) -> Vec<BehaviorIntent> {
        let cfg = config(ctx.profile);
        vec![BehaviorIntent::new(ID, cfg.seek_priority, IntentEffect::SeekFood).when(|f| f.is_hungry)]
    }
}
