//! Social — need for company, satisfied by nearby members of the species.
//!
//! The spatial check runs at most once per `check_interval` steps; after a
//! positive finding the interval doubles, since groups tend to stay
//! together. With company nearby the social value moves toward `max_value`
//! as a moving average; alone, it decays linearly. Below
//! `loneliness_threshold` the agent is lonely. A catch-up pass never leaves
//! it below that threshold.

use crate::common::{cooldown_elapsed, ema_fraction, section_enabled};
use ecotope_core::component::{DerivedFlags, Slot};
use ecotope_core::error::HandleError;
use ecotope_core::handle::{AttachContext, Handle, TickContext};
use ecotope_core::intent::{BehaviorIntent, IntentEffect};
use ecotope_core::profile::Profile;
use ecotope_core::types::Tick;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const ID: &str = "social";

#[derive(Debug, Clone, PartialEq)]
pub struct SocialConfig {
    pub max_value: f64,
    pub starting_value: f64,
    pub decay_rate: f64,
    pub recovery_rate: f64,
    pub loneliness_threshold: f64,
    pub check_interval: u64,
    pub group_radius: f64,
    pub seek_priority: i32,
}

impl SocialConfig {
    pub fn from_profile(p: &Profile) -> Self {
        let max_value = p.get_f64("social.max_value", 100.0).max(1.0);
        Self {
            max_value,
            starting_value: p.get_f64("social.starting_value", max_value).clamp(0.0, max_value),
            decay_rate: p.get_f64("social.decay_rate", 0.01).max(0.0),
            recovery_rate: p.get_f64("social.recovery_rate", 0.1),
            loneliness_threshold: p.get_f64("social.loneliness_threshold", 30.0),
            check_interval: p.get_u64("social.check_interval", 100),
            group_radius: p.get_f64("social.group_radius", 32.0),
            seek_priority: p.get_i32("social.seek_priority", 7),
        }
    }
}

pub fn config(profile: &Profile) -> Arc<SocialConfig> {
    profile.cached("ecotope:social", SocialConfig::from_profile)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SocialState {
    pub social: f64,
    #[serde(default)]
    pub last_check: Option<Tick>,
    #[serde(default)]
    pub group_nearby: bool,
}

fn read(slot: &Slot, cfg: &SocialConfig) -> SocialState {
    slot.read_or_else(|| SocialState {
        social: cfg.starting_value,
        last_check: None,
        group_nearby: false,
    })
}

#[derive(Debug, Clone, Copy)]
pub struct SocialHandle {
    interval: u64,
}

impl SocialHandle {
    pub fn new() -> Self {
        Self { interval: 20 }
    }
}

impl Default for SocialHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl Handle for SocialHandle {
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
        let now = ctx.clock.now;

        let poll_every = if state.group_nearby {
            cfg.check_interval.saturating_mul(2)
        } else {
            cfg.check_interval
        };
        if cooldown_elapsed(state.last_check, now, poll_every) {
            state.group_nearby = ctx
                .neighbors
                .has_nearby_same_type(ctx.agent.id(), cfg.group_radius);
            state.last_check = Some(now);
        }

        if state.group_nearby {
            let gap = cfg.max_value - state.social;
            state.social += gap * ema_fraction(cfg.recovery_rate, ctx.clock.elapsed);
        } else {
            state.social -= cfg.decay_rate * ctx.clock.elapsed as f64;
        }
        state.social = state.social.clamp(0.0, cfg.max_value);

        if ctx.clock.is_catch_up() && state.social < cfg.loneliness_threshold {
            state.social = cfg.loneliness_threshold.min(cfg.max_value);
        }
        ctx.slot.write(&state)
    }

    fn refresh_flags(&self, slot: &Slot, profile: &Profile, flags: &mut DerivedFlags) {
        let cfg = config(profile);
        flags.is_lonely = read(slot, &cfg).social < cfg.loneliness_threshold;
    }

    fn register_intents(&self, ctx: &AttachContext<'_>) -> Vec<BehaviorIntent> {
        let cfg = config(ctx.profile);
        vec![BehaviorIntent::new(
            ID,
            cfg.seek_priority,
            IntentEffect::SeekGroup {
                radius: cfg.group_radius,
            },
        )
        .when(|f| f.is_lonely)]
    }
}
