//! Condition — body condition that trends with hunger.
//!
//! Each pass moves condition toward `max_value` while the agent is satiated
//! and toward zero while it is hungry or starving, as an exponential moving
//! average whose step rate depends on which state applies. Starving wins
//! over hungry. A catch-up pass never leaves condition below
//! `critical_threshold`.

use crate::common::{ema_fraction, section_enabled};
use ecotope_core::component::{ConditionLevel, DerivedFlags, Slot};
use ecotope_core::error::HandleError;
use ecotope_core::handle::{Handle, TickContext};
use ecotope_core::profile::Profile;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const ID: &str = "condition";

#[derive(Debug, Clone, PartialEq)]
pub struct ConditionConfig {
    pub max_value: f64,
    pub starting_value: f64,
    pub gain_when_satiated: f64,
    pub loss_when_hungry: f64,
    pub loss_when_starving: f64,
    pub excellent: f64,
    pub good: f64,
    pub fair: f64,
    pub poor: f64,
    pub critical: f64,
}

impl ConditionConfig {
    pub fn from_profile(p: &Profile) -> Self {
        let max_value = p.get_f64("condition.max_value", 100.0).max(1.0);
        Self {
            max_value,
            starting_value: p.get_f64("condition.starting_value", 70.0).clamp(0.0, max_value),
            gain_when_satiated: p.get_f64("condition.gain_when_satiated", 0.01),
            loss_when_hungry: p.get_f64("condition.loss_when_hungry", 0.02),
            loss_when_starving: p.get_f64("condition.loss_when_starving", 0.1),
            excellent: p.get_f64("condition.excellent_threshold", 85.0),
            good: p.get_f64("condition.good_threshold", 65.0),
            fair: p.get_f64("condition.fair_threshold", 45.0),
            poor: p.get_f64("condition.poor_threshold", 25.0),
            critical: p.get_f64("condition.critical_threshold", 10.0),
        }
    }

    pub fn level(&self, value: f64) -> ConditionLevel {
        if value >= self.excellent {
            ConditionLevel::Excellent
        } else if value >= self.good {
            ConditionLevel::Good
        } else if value >= self.fair {
            ConditionLevel::Fair
        } else if value >= self.poor {
            ConditionLevel::Poor
        } else {
            ConditionLevel::Critical
        }
    }
}

pub fn config(profile: &Profile) -> Arc<ConditionConfig> {
    profile.cached("ecotope:condition", ConditionConfig::from_profile)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConditionState {
    pub condition: f64,
}

fn read(slot: &Slot, cfg: &ConditionConfig) -> ConditionState {
    slot.read_or_else(|| ConditionState {
        condition: cfg.starting_value,
    })
}

/// Target and per-step rate for the current hunger state, if any applies.
fn trend(cfg: &ConditionConfig, flags: &DerivedFlags) -> Option<(f64, f64)> {
    if flags.is_starving {
        Some((0.0, cfg.loss_when_starving))
    } else if flags.is_satiated {
        Some((cfg.max_value, cfg.gain_when_satiated))
    } else if flags.is_hungry {
        Some((0.0, cfg.loss_when_hungry))
    } else {
        None
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ConditionHandle {
    interval: u64,
}

impl ConditionHandle {
    pub fn new() -> Self {
        Self { interval: 10 }
    }
}

impl Default for ConditionHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl Handle for ConditionHandle {
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
        if let Some((target, rate)) = trend(&cfg, ctx.flags) {
            let step = (target - state.condition) * ema_fraction(rate, ctx.clock.elapsed);
            state.condition = (state.condition + step).clamp(0.0, cfg.max_value);
        }
        if ctx.clock.is_catch_up() && state.condition < cfg.critical {
            state.condition = cfg.critical.min(cfg.max_value);
        }
        ctx.slot.write(&state)
    }

    fn refresh_flags(&self, slot: &Slot, profile: &Profile, flags: &mut DerivedFlags) {
        let cfg = config(profile);
        let value = read(slot, &cfg).condition.round();
        let level = cfg.level(value);
        flags.condition = Some(level);
        flags.readings.condition = Some(value as i32);
        if level <= ConditionLevel::Poor {
            flags.is_hungry = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ecotope_core::handle::Clock;
    use ecotope_core::neighborhood::NoNeighbors;
    use ecotope_core::testing::{run_tick, MockAgent};

    fn slot_with(condition: f64) -> Slot {
        let mut slot = Slot::new(ID, serde_json::Value::Null);
        slot.write(&ConditionState { condition }).unwrap();
        slot
    }

    fn tick(slot: &mut Slot, mut flags: DerivedFlags, clock: Clock) -> DerivedFlags {
        let mut agent = MockAgent::new(3, "minecraft:sheep");
        let profile = Profile::empty("minecraft:sheep");
        run_tick(&ConditionHandle::new(), &mut agent, &profile, slot, &mut flags, clock, &NoNeighbors)
            .unwrap();
        flags
    }

    fn value(slot: &Slot) -> f64 {
        serde_json::from_value::<ConditionState>(slot.raw().clone()).unwrap().condition
    }

    #[test]
    fn satiated_agents_gain_toward_max() {
        let mut slot = slot_with(70.0);
        let flags = DerivedFlags {
            is_satiated: true,
            ..DerivedFlags::default()
        };
        tick(&mut slot, flags.clone(), Clock::live(10));
        assert!((value(&slot) - 70.3).abs() < 1e-9);

        let mut slot = slot_with(70.0);
        tick(&mut slot, flags, Clock::new(10, 100));
        assert!(value(&slot) > 88.0 && value(&slot) < 90.0);
    }

    #[test]
    fn starving_outweighs_hungry() {
        let mut hungry = slot_with(50.0);
        tick(
            &mut hungry,
            DerivedFlags {
                is_hungry: true,
                ..DerivedFlags::default()
            },
            Clock::live(10),
        );
        let mut starving = slot_with(50.0);
        tick(
            &mut starving,
            DerivedFlags {
                is_hungry: true,
                is_starving: true,
                ..DerivedFlags::default()
            },
            Clock::live(10),
        );
        assert!((value(&hungry) - 49.0).abs() < 1e-9);
        assert!((value(&starving) - 45.0).abs() < 1e-9);
    }

    #[test]
    fn neutral_state_holds_steady() {
        let mut slot = slot_with(55.5);
        tick(&mut slot, DerivedFlags::default(), Clock::new(10, 5_000));
        assert_eq!(value(&slot), 55.5);
    }

    #[test]
    fn stays_within_bounds() {
        let mut slot = slot_with(100.0);
        tick(
            &mut slot,
            DerivedFlags {
                is_satiated: true,
                ..DerivedFlags::default()
            },
            Clock::new(10, 24_000),
        );
        assert!(value(&slot) <= 100.0);

        let mut slot = slot_with(1.0);
        tick(
            &mut slot,
            DerivedFlags {
                is_starving: true,
                ..DerivedFlags::default()
            },
            Clock::live(10),
        );
        assert!(value(&slot) >= 0.0);
    }

    #[test]
    fn catch_up_floors_at_critical() {
        let mut slot = slot_with(40.0);
        let flags = tick(
            &mut slot,
            DerivedFlags {
                is_starving: true,
                ..DerivedFlags::default()
            },
            Clock::new(10, 24_000),
        );
        assert_eq!(value(&slot), 10.0);
        assert_eq!(flags.condition, Some(ConditionLevel::Critical));
    }

    #[test]
    fn poor_condition_marks_agent_hungry() {
        let mut flags = DerivedFlags::default();
        ConditionHandle::new().refresh_flags(&slot_with(30.0), &Profile::empty("x"), &mut flags);
        assert_eq!(flags.condition, Some(ConditionLevel::Poor));
        assert_eq!(flags.readings.condition, Some(30));
        assert!(flags.is_hungry);

        let mut flags = DerivedFlags::default();
        ConditionHandle::new().refresh_flags(&slot_with(90.0), &Profile::empty("x"), &mut flags);
        assert_eq!(flags.condition, Some(ConditionLevel::Excellent));
        assert!(!flags.is_hungry);
    }
}
