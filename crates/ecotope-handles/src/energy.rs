//! Energy — activity cost and recovery.
//!
//! At most one costly activity drains energy per pass, picked in the order
//! fleeing, hunting, swimming. With no costly activity energy recovers.
//! Dropping below `exhaustion_threshold` clears `is_hunting` and
//! `is_fleeing` so the host interrupts those behaviors.

use crate::common::{decay_floor, recover_ceil, section_enabled};
use ecotope_core::component::{DerivedFlags, Slot};
use ecotope_core::error::HandleError;
use ecotope_core::handle::{Handle, TickContext};
use ecotope_core::profile::Profile;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const ID: &str = "energy";

#[derive(Debug, Clone, PartialEq)]
pub struct EnergyConfig {
    pub max_value: i32,
    pub recovery_rate: f64,
    pub exhaustion_threshold: i32,
    pub flee_cost: f64,
    pub hunt_cost: f64,
    pub swim_cost: f64,
}

impl EnergyConfig {
    pub fn from_profile(p: &Profile) -> Self {
        Self {
            max_value: p.get_i32("energy.max_value", 100).max(1),
            recovery_rate: p.get_f64("energy.recovery_rate", 0.5).max(0.0),
            exhaustion_threshold: p.get_i32("energy.exhaustion_threshold", 10),
            flee_cost: p.get_f64("energy.costs.flee", 0.4),
            hunt_cost: p.get_f64("energy.costs.hunt", 0.5),
            swim_cost: p.get_f64("energy.costs.swim", 0.2),
        }
    }

    /// Cost of the single activity that applies, if any.
    pub fn activity_cost(&self, flags: &DerivedFlags) -> Option<f64> {
        if flags.is_fleeing {
            Some(self.flee_cost)
        } else if flags.is_hunting {
            Some(self.hunt_cost)
        } else if flags.is_swimming {
            Some(self.swim_cost)
        } else {
            None
        }
    }
}

pub fn config(profile: &Profile) -> Arc<EnergyConfig> {
    profile.cached("ecotope:energy", EnergyConfig::from_profile)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnergyState {
    pub energy: i32,
}

fn read(slot: &Slot, cfg: &EnergyConfig) -> EnergyState {
    slot.read_or_else(|| EnergyState {
        energy: cfg.max_value,
    })
}

#[derive(Debug, Clone, Copy)]
pub struct EnergyHandle {
    interval: u64,
}

impl EnergyHandle {
    pub fn new() -> Self {
        Self { interval: 2 }
    }
}

impl Default for EnergyHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl Handle for EnergyHandle {
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
        let elapsed = ctx.clock.elapsed;
        state.energy = match cfg.activity_cost(ctx.flags) {
            Some(cost) => {
                let min = if ctx.clock.is_catch_up() {
                    cfg.exhaustion_threshold + 1
                } else {
                    0
                };
                decay_floor(state.energy, cost, elapsed, min, cfg.max_value)
            }
            None => recover_ceil(state.energy, cfg.recovery_rate, elapsed, cfg.max_value),
        };
        ctx.slot.write(&state)
    }

    fn refresh_flags(&self, slot: &Slot, profile: &Profile, flags: &mut DerivedFlags) {
        let cfg = config(profile);
        let state = read(slot, &cfg);
        flags.readings.energy = Some(state.energy);
        flags.is_exhausted = state.energy < cfg.exhaustion_threshold;
        if flags.is_exhausted {
            flags.is_hunting = false;
            flags.is_fleeing = false;
        }
    }
}
