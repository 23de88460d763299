//! Diet — per-species overrides of the host's "is this food" decision.
//!
//! `diet.rejects` always wins; `diet.foods` turns items into food the host
//! would not have accepted. Anything else passes through unchanged.

use ecotope_core::error::HandleError;
use ecotope_core::handle::{FoodContext, Handle, TickContext};
use ecotope_core::profile::Profile;
use std::collections::BTreeSet;
use std::sync::Arc;

pub const ID: &str = "diet";

#[derive(Debug, Clone, PartialEq, Default)]
pub struct DietConfig {
    pub foods: BTreeSet<String>,
    pub rejects: BTreeSet<String>,
}

impl DietConfig {
    pub fn from_profile(p: &Profile) -> Self {
        let items = |path: &str| -> BTreeSet<String> {
            p.get_string_list(path)
                .into_iter()
                .filter(|s| !s.starts_with('#'))
                .collect()
        };
        Self {
            foods: items("diet.foods"),
            rejects: items("diet.rejects"),
        }
    }

    pub fn decide(&self, item: &str, original: bool) -> bool {
        if self.rejects.contains(item) {
            false
        } else if self.foods.contains(item) {
            true
        } else {
            original
        }
    }
}

pub fn config(profile: &Profile) -> Arc<DietConfig> {
    profile.cached("ecotope:diet", DietConfig::from_profile)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DietHandle;

impl DietHandle {
    pub fn new() -> Self {
        Self
    }
}

impl Handle for DietHandle {
    fn id(&self) -> &'static str {
        ID
    }

    fn tick_interval(&self) -> u64 {
        // Nothing to do per step; the handle only answers food queries.
        u64::MAX
    }

    fn supports(&self, profile: &Profile) -> bool {
        profile.contains("diet.foods") || profile.contains("diet.rejects")
    }

    fn tick(&self, _ctx: &mut TickContext<'_>) -> Result<(), HandleError> {
        Ok(())
    }

    fn override_is_food(&self, ctx: &FoodContext<'_>, item: &str, original: bool) -> bool {
        config(ctx.profile).decide(item, original)
    }
}
