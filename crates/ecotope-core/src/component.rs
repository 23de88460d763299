//! Per-agent state store.
//!
//! A [`Component`] holds one opaque blob per handle id, the agent's shared
//! species profile, the derived flags recomputed on every update pass, and
//! the bookkeeping needed to turn wall-clock gaps into elapsed steps.
//!
//! Handles never touch a `Component` directly. The engine hands each one a
//! scratch [`Slot`] holding a copy of its own blob and commits it back only
//! if the handle succeeds, so a failing handle cannot leave partial writes
//! behind in anyone's state.

use crate::error::HandleError;
use crate::host::Activity;
use crate::profile::Profile;
use crate::types::Tick;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::warn;

/// Upper bound on elapsed steps applied in one pass: one simulated day.
pub const MAX_CATCH_UP_STEPS: u64 = 24_000;

/// Opaque handle-owned state. `Null` means "no state yet".
pub type Blob = serde_json::Value;

/// Coarse body condition published by the condition handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ConditionLevel {
    Critical,
    Poor,
    Fair,
    Good,
    Excellent,
}

/// Numeric readings that handles publish for others to read.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Readings {
    pub hunger: Option<i32>,
    pub thirst: Option<i32>,
    pub condition: Option<i32>,
    pub energy: Option<i32>,
    pub age: Option<u64>,
}

/// Transient flags shared between handles of one agent.
///
/// Rebuilt from scratch at the start of every update pass and filled in as
/// each handle runs, so they always reflect the blobs that produced them.
/// Never persisted.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DerivedFlags {
    pub is_hungry: bool,
    pub is_starving: bool,
    pub is_satiated: bool,
    pub is_thirsty: bool,
    pub is_dehydrated: bool,
    pub is_fleeing: bool,
    pub is_hunting: bool,
    pub is_swimming: bool,
    pub is_exhausted: bool,
    pub is_lonely: bool,
    pub is_elderly: bool,
    pub is_baby: bool,
    pub threatened: bool,
    pub can_breed: bool,
    pub condition: Option<ConditionLevel>,
    pub readings: Readings,
}

impl DerivedFlags {
    /// Starting point for a pass: only what the host reports directly.
    pub fn seeded(activity: Activity, is_baby: bool) -> Self {
        Self {
            is_fleeing: activity.fleeing,
            is_hunting: activity.hunting,
            is_swimming: activity.swimming,
            is_baby,
            ..Self::default()
        }
    }
}

/// Elapsed-time bookkeeping, persisted in its own reserved record entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SimulatedTime {
    /// Step at which the agent was last updated; `None` before the first
    /// update.
    #[serde(default)]
    pub last_observed: Option<Tick>,
    /// Total steps applied to this agent across all passes.
    #[serde(default)]
    pub simulated_steps: u64,
}

impl SimulatedTime {
    /// Steps since the last update, clamped to `[1, max_catch_up]`.
    pub fn resolve_elapsed(&self, now: Tick, max_catch_up: u64) -> u64 {
        match self.last_observed {
            None => 1,
            Some(last) => now.saturating_sub(last).clamp(1, max_catch_up.max(1)),
        }
    }
}

/// A handle's private working copy of its blob.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Slot {
    handle: &'static str,
    data: Blob,
    dirty: bool,
}

impl Slot {
    pub fn new(handle: &'static str, data: Blob) -> Self {
        Self {
            handle,
            data,
            dirty: false,
        }
    }

    pub fn handle(&self) -> &'static str {
        self.handle
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_null()
    }

    pub fn raw(&self) -> &Blob {
        &self.data
    }

    /// Decode the blob into `T`. An empty blob yields `init()`; a blob that
    /// does not decode logs a warning and also yields `init()`.
    pub fn read_or_else<T, F>(&self, init: F) -> T
    where
        T: DeserializeOwned,
        F: FnOnce() -> T,
    {
        if self.data.is_null() {
            return init();
        }
        match T::deserialize(&self.data) {
            Ok(value) => value,
            Err(e) => {
                warn!(handle = self.handle, error = %e, "malformed handle state, resetting");
                init()
            }
        }
    }

    pub fn read<T: DeserializeOwned + Default>(&self) -> T {
        self.read_or_else(T::default)
    }

    pub fn write<T: Serialize>(&mut self, value: &T) -> Result<(), HandleError> {
        let encoded = serde_json::to_value(value).map_err(|e| HandleError::Encode {
            handle: self.handle.to_string(),
            message: e.to_string(),
        })?;
        if encoded != self.data {
            self.data = encoded;
            self.dirty = true;
        }
        Ok(())
    }

    pub fn clear(&mut self) {
        if !self.data.is_null() {
            self.data = Blob::Null;
            self.dirty = true;
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn into_data(self) -> Blob {
        self.data
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
struct SlotEntry {
    data: Blob,
    version: u64,
}

/// Per-agent state container.
#[derive(Debug, Clone)]
pub struct Component {
    slots: BTreeMap<String, SlotEntry>,
    aux: BTreeMap<String, Blob>,
    profile: Arc<Profile>,
    flags: DerivedFlags,
    time: SimulatedTime,
    goals_registered: bool,
}

impl Component {
    pub fn new(profile: Arc<Profile>) -> Self {
        Self {
            slots: BTreeMap::new(),
            aux: BTreeMap::new(),
            profile,
            flags: DerivedFlags::default(),
            time: SimulatedTime::default(),
            goals_registered: false,
        }
    }

    pub fn profile(&self) -> &Arc<Profile> {
        &self.profile
    }

    /// Swap in a newly published profile. Handle state is kept.
    pub fn set_profile(&mut self, profile: Arc<Profile>) {
        self.profile = profile;
    }

    pub fn flags(&self) -> &DerivedFlags {
        &self.flags
    }

    pub fn set_flags(&mut self, flags: DerivedFlags) {
        self.flags = flags;
    }

    pub fn data(&self, handle: &str) -> Option<&Blob> {
        self.slots.get(handle).map(|e| &e.data)
    }

    /// A working copy of `handle`'s blob.
    pub fn slot(&self, handle: &'static str) -> Slot {
        Slot::new(handle, self.data(handle).cloned().unwrap_or(Blob::Null))
    }

    /// Store a slot back. Only dirty slots change anything; each change
    /// bumps the handle's version.
    pub fn commit(&mut self, slot: Slot) -> bool {
        if !slot.is_dirty() {
            return false;
        }
        let handle = slot.handle();
        let data = slot.into_data();
        if data.is_null() {
            return self.slots.remove(handle).is_some();
        }
        let entry = self.slots.entry(handle.to_string()).or_default();
        entry.data = data;
        entry.version += 1;
        true
    }

    /// Replace a blob verbatim, used when restoring from a record.
    pub fn insert_data(&mut self, handle: impl Into<String>, data: Blob) {
        if data.is_null() {
            return;
        }
        let entry = self.slots.entry(handle.into()).or_default();
        entry.data = data;
        entry.version += 1;
    }

    /// Number of committed changes to `handle`'s blob.
    pub fn handle_version(&self, handle: &str) -> u64 {
        self.slots.get(handle).map_or(0, |e| e.version)
    }

    pub fn handle_ids(&self) -> impl Iterator<Item = &str> {
        self.slots.keys().map(String::as_str)
    }

    /// Snapshot of every non-empty handle blob.
    pub fn handle_data(&self) -> BTreeMap<String, Blob> {
        self.slots
            .iter()
            .map(|(k, e)| (k.clone(), e.data.clone()))
            .collect()
    }

    /// Species-specific side records stored next to handle data.
    pub fn aux(&self) -> &BTreeMap<String, Blob> {
        &self.aux
    }

    pub fn set_aux(&mut self, key: impl Into<String>, data: Blob) {
        self.aux.insert(key.into(), data);
    }

    pub fn time(&self) -> SimulatedTime {
        self.time
    }

    pub fn resolve_elapsed(&self, now: Tick, max_catch_up: u64) -> u64 {
        self.time.resolve_elapsed(now, max_catch_up)
    }

    pub fn mark_observed(&mut self, now: Tick, elapsed: u64) {
        self.time.last_observed = Some(now);
        self.time.simulated_steps = self.time.simulated_steps.saturating_add(elapsed);
    }

    /// Restore persisted time. The last-observed step is reset to `now` so
    /// time spent unloaded is not applied as one huge catch-up pass.
    pub fn restore_time(&mut self, stored: SimulatedTime, now: Tick) {
        self.time = SimulatedTime {
            last_observed: Some(now),
            simulated_steps: stored.simulated_steps,
        };
    }

    pub fn goals_registered(&self) -> bool {
        self.goals_registered
    }

    /// Returns `true` the first time only.
    pub fn mark_goals_registered(&mut self) -> bool {
        !std::mem::replace(&mut self.goals_registered, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn component() -> Component {
        Component::new(Arc::new(Profile::empty("minecraft:cow")))
    }

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Counter {
        value: i32,
    }

    #[test]
    fn first_update_counts_as_one_step() {
        let c = component();
        assert_eq!(c.resolve_elapsed(500, MAX_CATCH_UP_STEPS), 1);
    }

    #[test]
    fn elapsed_is_clamped_both_ways() {
        let mut c = component();
        c.mark_observed(100, 1);
        assert_eq!(c.resolve_elapsed(101, MAX_CATCH_UP_STEPS), 1);
        assert_eq!(c.resolve_elapsed(100, MAX_CATCH_UP_STEPS), 1);
        assert_eq!(c.resolve_elapsed(50, MAX_CATCH_UP_STEPS), 1, "clock went backwards");
        assert_eq!(c.resolve_elapsed(140, MAX_CATCH_UP_STEPS), 40);
        assert_eq!(c.resolve_elapsed(10_000_000, MAX_CATCH_UP_STEPS), MAX_CATCH_UP_STEPS);
    }

    #[test]
    fn elapsed_stays_in_range_for_many_gaps() {
        let mut c = component();
        c.mark_observed(1_000, 1);
        for gap in [0u64, 1, 2, 19, 20, 23_999, 24_000, 24_001, u32::MAX as u64] {
            let e = c.resolve_elapsed(1_000 + gap, MAX_CATCH_UP_STEPS);
            assert!((1..=MAX_CATCH_UP_STEPS).contains(&e), "gap {} gave {}", gap, e);
        }
    }

    #[test]
    fn commit_only_applies_dirty_slots() {
        let mut c = component();
        let slot = c.slot("hunger");
        assert!(!c.commit(slot));
        assert_eq!(c.handle_version("hunger"), 0);

        let mut slot = c.slot("hunger");
        slot.write(&Counter { value: 3 }).unwrap();
        assert!(c.commit(slot));
        assert_eq!(c.handle_version("hunger"), 1);
        assert_eq!(c.data("hunger"), Some(&json!({ "value": 3 })));

        // Writing the same value again is not a change.
        let mut slot = c.slot("hunger");
        slot.write(&Counter { value: 3 }).unwrap();
        assert!(!c.commit(slot));
        assert_eq!(c.handle_version("hunger"), 1);
    }

    #[test]
    fn cleared_slots_remove_the_blob() {
        let mut c = component();
        c.insert_data("thirst", json!({ "thirst": 10 }));
        let mut slot = c.slot("thirst");
        slot.clear();
        assert!(c.commit(slot));
        assert!(c.data("thirst").is_none());
    }

    #[test]
    fn malformed_blobs_read_as_initial_state() {
        let slot = Slot::new("hunger", json!({ "value": "not a number" }));
        let value: Counter = slot.read_or_else(|| Counter { value: 9 });
        assert_eq!(value, Counter { value: 9 });
        let empty = Slot::new("hunger", Blob::Null);
        assert_eq!(empty.read::<Counter>(), Counter::default());
    }

    #[test]
    fn restored_time_does_not_replay_the_gap() {
        let mut c = component();
        c.restore_time(
            SimulatedTime {
                last_observed: Some(10),
                simulated_steps: 777,
            },
            90_000,
        );
        assert_eq!(c.resolve_elapsed(90_001, MAX_CATCH_UP_STEPS), 1);
        assert_eq!(c.time().simulated_steps, 777);
    }

    #[test]
    fn goals_register_once() {
        let mut c = component();
        assert!(c.mark_goals_registered());
        assert!(!c.mark_goals_registered());
        assert!(c.goals_registered());
    }

    #[test]
    fn seeded_flags_copy_host_activity() {
        let flags = DerivedFlags::seeded(
            Activity {
                fleeing: true,
                hunting: false,
                swimming: true,
            },
            true,
        );
        assert!(flags.is_fleeing && flags.is_swimming && flags.is_baby);
        assert!(!flags.is_hunting && !flags.can_breed);
    }
}
