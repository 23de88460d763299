//! Thirst — hydration decays like hunger, with three named levels.
//!
//! Above `satisfied_threshold` the agent is content, below
//! `thirsty_threshold` it starts looking for water, and at or below
//! `dehydrated_threshold` it takes dehydration damage on live passes.
//! Catch-up passes stop one unit above the dehydrated level.

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

pub const ID: &str = "thirst";

#[derive(Debug, Clone, PartialEq)]
pub struct ThirstConfig {
    pub max_value: i32,
    pub starting_value: i32,
    pub decay_rate: f64,
    pub satisfied_threshold: i32,
    pub thirsty_threshold: i32,
    pub dehydrated_threshold: i32,
    pub damage_amount: f64,
    pub damage_interval: u64,
    pub seek_priority: i32,
}

impl ThirstConfig {
    pub fn from_profile(p: &Profile) -> Self {
        let max_value = p.get_i32("thirst.max_value", 100).max(1);
        Self {
            max_value,
            starting_value: p.get_i32("thirst.starting_value", max_value).clamp(0, max_value),
            decay_rate: p.get_f64("thirst.decay_rate", 0.01).max(0.0),
            satisfied_threshold: p.get_i32("thirst.satisfied_threshold", 70),
            thirsty_threshold: p.get_i32("thirst.thirsty_threshold", 40),
            dehydrated_threshold: p.get_i32("thirst.dehydrated_threshold", 15),
            damage_amount: p.get_f64("thirst.damage_amount", 1.0),
            damage_interval: p.get_u64("thirst.damage_interval", 200),
            seek_priority: p.get_i32("thirst.seek_priority", 3),
        }
    }
}

pub fn config(profile: &Profile) -> Arc<ThirstConfig> {
    profile.cached("ecotope:thirst", ThirstConfig::from_profile)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThirstState {
    pub thirst: i32,
    #[serde(default)]
    pub last_damage_tick: Option<Tick>,
}

/// Where hydration currently sits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThirstLevel {
    Satisfied,
    Normal,
    Thirsty,
    Dehydrated,
}

impl ThirstConfig {
    pub fn level(&self, thirst: i32) -> ThirstLevel {
        if thirst <= self.dehydrated_threshold {
            ThirstLevel::Dehydrated
        } else if thirst < self.thirsty_threshold {
            ThirstLevel::Thirsty
        } else if thirst >= self.satisfied_threshold {
            ThirstLevel::Satisfied
        } else {
            ThirstLevel::Normal
        }
    }
}

fn read(slot: &Slot, cfg: &ThirstConfig) -> ThirstState {
    slot.read_or_else(|| ThirstState {
        thirst: cfg.starting_value,
        last_damage_tick: None,
    })
}

pub fn decayed(current: i32, cfg: &ThirstConfig, clock: Clock) -> i32 {
    let min = if clock.is_catch_up() {
        cfg.dehydrated_threshold + 1
    } else {
        0
    };
    decay_floor(current, cfg.decay_rate, clock.elapsed, min, cfg.max_value)
}

/// Add `amount` hydration, capped at `max_value`. Returns the new value.
pub fn restore_hydration(slot: &mut Slot, profile: &Profile, amount: i32) -> Result<i32, HandleError> {
    let cfg = config(profile);
    let mut state = read(slot, &cfg);
    state.thirst = state.thirst.saturating_add(amount.max(0)).min(cfg.max_value);
    slot.write(&state)?;
    Ok(state.thirst)
}

#[derive(Debug, Clone, Copy)]
pub struct ThirstHandle {
    interval: u64,
}

impl ThirstHandle {
    pub fn new() -> Self {
        Self { interval: 5 }
    }
}

impl Default for ThirstHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl Handle for ThirstHandle {
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
        state.thirst = decayed(state.thirst, &cfg, ctx.clock);

        let now = ctx.clock.now;
        if !ctx.clock.is_catch_up()
            && cfg.level(state.thirst) == ThirstLevel::Dehydrated
            && cooldown_elapsed(state.last_damage_tick, now, cfg.damage_interval)
        {
            ctx.agent.damage(DamageCause::Dehydration, cfg.damage_amount);
            state.last_damage_tick = Some(now);
        }
        ctx.slot.write(&state)
    }

    fn refresh_flags(&self, slot: &Slot, profile: &Profile, flags: &mut DerivedFlags) {
        let cfg = config(profile);
        let state = read(slot, &cfg);
        let level = cfg.level(state.thirst);
        flags.is_thirsty = matches!(level, ThirstLevel::Thirsty | ThirstLevel::Dehydrated);
        flags.is_dehydrated = level == ThirstLevel::Dehydrated;
        flags.readings.thirst = Some(state.thirst);
    }

    fn register_intents(&self, ctx: &AttachContext<'_>) -> Vec<BehaviorIntent> {
        let cfg = config(ctx.profile);
        vec![BehaviorIntent::new(ID, cfg.seek_priority, IntentEffect::SeekWater).when(|f| f.is_thirsty)]
    }
}
