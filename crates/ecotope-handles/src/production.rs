//! Production — a resource the agent accumulates over time and the host can
//! harvest (honey, wool, milk and the like).
//!
//! Every `production_interval` steps the agent adds `production_rate` units,
//! up to `max_capacity`. Each production also updates a running quality
//! factor taken from the agent's condition and needs.

use crate::common::cooldown_elapsed;
use ecotope_core::component::{ConditionLevel, DerivedFlags, Slot, MAX_CATCH_UP_STEPS};
use ecotope_core::error::HandleError;
use ecotope_core::handle::{Handle, TickContext};
use ecotope_core::profile::Profile;
use ecotope_core::types::Tick;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const ID: &str = "production";

/// Smallest amount worth handing out.
pub const MIN_HARVEST: f64 = 10.0;

#[derive(Debug, Clone, PartialEq)]
pub struct ProductionConfig {
    pub resource_type: String,
    pub max_capacity: f64,
    pub production_interval: u64,
    pub production_rate: f64,
}

impl ProductionConfig {
    pub fn from_profile(p: &Profile) -> Self {
        Self {
            resource_type: p.get_str("production.resource_type", "honey").to_string(),
            max_capacity: p.get_f64("production.max_capacity", 100.0).max(0.0),
            production_interval: p.get_u64("production.production_interval", 1_200).max(1),
            production_rate: p.get_f64("production.production_rate", 1.0).max(0.0),
        }
    }
}

pub fn config(profile: &Profile) -> Arc<ProductionConfig> {
    profile.cached("ecotope:production", ProductionConfig::from_profile)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProductionState {
    pub amount: f64,
    pub quality: f64,
    #[serde(default)]
    pub last_production: Option<Tick>,
}

impl Default for ProductionState {
    fn default() -> Self {
        Self {
            amount: 0.0,
            quality: 1.0,
            last_production: None,
        }
    }
}

/// What a harvest yields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Harvest {
    pub resource_type: String,
    pub amount: u32,
    pub quality: f64,
}

/// Output quality multiplier for the agent's current state.
pub fn quality_factor(flags: &DerivedFlags) -> f64 {
    let base = match flags.condition {
        Some(ConditionLevel::Excellent) => 1.2,
        Some(ConditionLevel::Good) | None => 1.0,
        Some(ConditionLevel::Fair) => 0.8,
        Some(ConditionLevel::Poor) => 0.6,
        Some(ConditionLevel::Critical) => 0.4,
    };
    let hunger = if flags.is_hungry { 0.8 } else { 1.0 };
    let company = if flags.is_lonely { 0.9 } else { 1.0 };
    base * hunger * company
}

/// Take the accumulated resource if there is enough of it, resetting the
/// stock. Returns `None` below [`MIN_HARVEST`].
pub fn harvest(slot: &mut Slot, profile: &Profile) -> Result<Option<Harvest>, HandleError> {
    let cfg = config(profile);
    let mut state: ProductionState = slot.read();
    if state.amount < MIN_HARVEST {
        return Ok(None);
    }
    let yielded = Harvest {
        resource_type: cfg.resource_type.clone(),
        amount: state.amount.floor() as u32,
        quality: state.quality,
    };
    state.amount = 0.0;
    state.quality = 1.0;
    slot.write(&state)?;
    Ok(Some(yielded))
}

#[derive(Debug, Clone, Copy)]
pub struct ProductionHandle {
    interval: u64,
}

impl ProductionHandle {
    pub fn new() -> Self {
        Self { interval: 20 }
    }
}

impl Default for ProductionHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl Handle for ProductionHandle {
    fn id(&self) -> &'static str {
        ID
    }

    fn tick_interval(&self) -> u64 {
        self.interval
    }

    fn supports(&self, profile: &Profile) -> bool {
        profile.get_bool("production.enabled", profile.contains("production"))
    }

    fn tick(&self, ctx: &mut TickContext<'_>) -> Result<(), HandleError> {
        let cfg = config(ctx.profile);
        let mut state: ProductionState = ctx.slot.read();
        let now = ctx.clock.now;

        let Some(last) = state.last_production else {
            state.last_production = Some(now);
            return ctx.slot.write(&state);
        };
        if !cooldown_elapsed(Some(last), now, cfg.production_interval) {
            return Ok(());
        }

        // Catch-up passes may cover several production rounds at once, but
        // never more time than a catch-up pass may simulate.
        let gap = now.saturating_sub(last).min(MAX_CATCH_UP_STEPS);
        let rounds = (gap / cfg.production_interval).max(1);
        let added = cfg.production_rate * rounds as f64;
        let factor = quality_factor(ctx.flags);
        if state.amount + added > 0.0 {
            state.quality = (state.quality * state.amount + factor * added) / (state.amount + added);
        }
        state.amount = (state.amount + added).min(cfg.max_capacity);
        let leftover = gap.saturating_sub(rounds * cfg.production_interval);
        state.last_production = Some(now - leftover);
        ctx.slot.write(&state)
    }
}
