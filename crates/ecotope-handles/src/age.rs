//! Age — a monotonic step counter with life-stage transitions.
//!
//! Babies become adults exactly once, when `age_ticks` first reaches
//! `baby_duration`; later ticks never toggle the stage back. Optional
//! `elderly_age` and `max_age` (0 disables either) mark old agents and end
//! their lives.

use crate::common::section_enabled;
use ecotope_core::capability::{Capabilities, Capability};
use ecotope_core::component::{DerivedFlags, Slot};
use ecotope_core::error::HandleError;
use ecotope_core::handle::{Handle, TickContext};
use ecotope_core::host::DamageCause;
use ecotope_core::profile::Profile;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

pub const ID: &str = "age";

#[derive(Debug, Clone, PartialEq)]
pub struct AgeConfig {
    pub baby_duration: u64,
    pub elderly_age: u64,
    pub max_age: u64,
}

impl AgeConfig {
    pub fn from_profile(p: &Profile) -> Self {
        Self {
            baby_duration: p.get_u64("age.baby_duration", 24_000),
            elderly_age: p.get_u64("age.elderly_age", 0),
            max_age: p.get_u64("age.max_age", 0),
        }
    }
}

pub fn config(profile: &Profile) -> Arc<AgeConfig> {
    profile.cached("ecotope:age", AgeConfig::from_profile)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgeState {
    pub age_ticks: u64,
    pub matured: bool,
    #[serde(default)]
    pub died_of_age: bool,
}

impl AgeState {
    /// Agents that arrive as adults start at the end of childhood.
    pub fn initial(is_baby: bool, cfg: &AgeConfig) -> Self {
        Self {
            age_ticks: if is_baby { 0 } else { cfg.baby_duration },
            matured: !is_baby,
            died_of_age: false,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AgeHandle {
    interval: u64,
}

impl AgeHandle {
    pub fn new() -> Self {
        Self { interval: 20 }
    }
}

impl Default for AgeHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl Handle for AgeHandle {
    fn id(&self) -> &'static str {
        ID
    }

    fn tick_interval(&self) -> u64 {
        self.interval
    }

    fn required_capabilities(&self) -> Capabilities {
        Capabilities::of(Capability::Age)
    }

    fn supports(&self, profile: &Profile) -> bool {
        section_enabled(profile, ID)
    }

    fn tick(&self, ctx: &mut TickContext<'_>) -> Result<(), HandleError> {
        let cfg = config(ctx.profile);
        let is_baby = ctx.agent.is_baby();
        let mut state = ctx.slot.read_or_else(|| AgeState::initial(is_baby, &cfg));
        state.age_ticks = state.age_ticks.saturating_add(ctx.clock.elapsed);

        if !state.matured && state.age_ticks >= cfg.baby_duration {
            state.matured = true;
            if ctx.agent.is_baby() {
                ctx.agent.set_baby(false);
            }
            debug!(agent = %ctx.agent.id(), age = state.age_ticks, "agent matured");
        }

        if cfg.max_age > 0 && state.age_ticks >= cfg.max_age && !state.died_of_age {
            state.died_of_age = true;
            ctx.agent.kill(DamageCause::OldAge);
        }

        ctx.slot.write(&state)
    }

    fn refresh_flags(&self, slot: &Slot, profile: &Profile, flags: &mut DerivedFlags) {
        if slot.is_empty() {
            return;
        }
        let cfg = config(profile);
        let state: AgeState = slot.read_or_else(|| AgeState::initial(flags.is_baby, &cfg));
        flags.readings.age = Some(state.age_ticks);
        flags.is_elderly = cfg.elderly_age > 0 && state.age_ticks >= cfg.elderly_age;
    }
}
