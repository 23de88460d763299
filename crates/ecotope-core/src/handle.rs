//! The Handle trait — one pluggable ecological subsystem.
//!
//! A handle carries no per-agent state of its own. Everything it remembers
//! lives in its blob inside the agent's [`Component`](crate::component::Component),
//! which it reaches only through the [`Slot`] handed to it for the call.
//! A handle may read any derived flag, and may set the flags it owns.
//!
//! Per step the engine calls, in species order:
//! 1. `tick` when the handle is due (`step % tick_interval() == 0`)
//! 2. `refresh_flags` always, so flags are rebuilt from the committed blob

use crate::capability::Capabilities;
use crate::component::{Blob, DerivedFlags, Slot};
use crate::error::HandleError;
use crate::host::AgentHost;
use crate::intent::BehaviorIntent;
use crate::neighborhood::Neighborhood;
use crate::profile::Profile;
use crate::types::{SpeciesId, Tick};
use std::fmt;
use std::sync::Arc;

/// Current step and how many steps this pass covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Clock {
    pub now: Tick,
    pub elapsed: u64,
}

impl Clock {
    pub fn new(now: Tick, elapsed: u64) -> Self {
        Self {
            now,
            elapsed: elapsed.max(1),
        }
    }

    /// A pass covering exactly one step.
    pub fn live(now: Tick) -> Self {
        Self::new(now, 1)
    }

    /// More than one step elapsed: thresholds are not checked and damage is
    /// suppressed for this pass.
    pub fn is_catch_up(&self) -> bool {
        self.elapsed > 1
    }
}

/// Everything a handle may touch during `tick`.
pub struct TickContext<'a> {
    pub agent: &'a mut dyn AgentHost,
    pub profile: &'a Profile,
    pub slot: &'a mut Slot,
    pub flags: &'a mut DerivedFlags,
    pub clock: Clock,
    pub neighbors: &'a dyn Neighborhood,
}

/// Read-only view given to `register_intents`.
pub struct AttachContext<'a> {
    pub agent: &'a dyn AgentHost,
    pub profile: &'a Profile,
    pub slot: &'a Slot,
}

/// Context for one-off events such as a successful breed.
pub struct EventContext<'a> {
    pub agent: &'a mut dyn AgentHost,
    pub profile: &'a Profile,
    pub slot: &'a mut Slot,
    pub now: Tick,
}

/// Context for the "is this item food" override chain.
pub struct FoodContext<'a> {
    pub agent: &'a dyn AgentHost,
    pub profile: &'a Profile,
    pub flags: &'a DerivedFlags,
}

pub trait Handle: Send + Sync {
    /// Unique, stable id. Also the key of this handle's blob.
    fn id(&self) -> &'static str;

    /// Run `tick` only on steps divisible by this.
    fn tick_interval(&self) -> u64 {
        1
    }

    /// Host capabilities this handle needs; checked once at attach.
    fn required_capabilities(&self) -> Capabilities {
        Capabilities::NONE
    }

    /// Whether the species profile turns this handle on.
    fn supports(&self, _profile: &Profile) -> bool {
        true
    }

    fn tick(&self, ctx: &mut TickContext<'_>) -> Result<(), HandleError>;

    /// Publish flags and readings derived from this handle's blob.
    fn refresh_flags(&self, _slot: &Slot, _profile: &Profile, _flags: &mut DerivedFlags) {}

    /// Behavior intents for the host executor, collected once at attach.
    fn register_intents(&self, _ctx: &AttachContext<'_>) -> Vec<BehaviorIntent> {
        Vec::new()
    }

    /// Called on both parents after a successful breed.
    fn on_breed(&self, _ctx: &mut EventContext<'_>) -> Result<(), HandleError> {
        Ok(())
    }

    /// Override the host's "is this item food" decision. Receives the
    /// decision of the previous handle in the chain.
    fn override_is_food(&self, _ctx: &FoodContext<'_>, _item: &str, original: bool) -> bool {
        original
    }

    /// Blob to write into the agent's durable record, if any.
    fn save(&self, data: &Blob) -> Option<Blob> {
        if data.is_null() {
            None
        } else {
            Some(data.clone())
        }
    }

    /// Blob to restore from the agent's durable record.
    fn load(&self, stored: &Blob) -> Blob {
        stored.clone()
    }
}

/// A species' handle list and default profile, built by free functions and
/// handed to the registry.
#[derive(Clone)]
pub struct SpeciesBundle {
    pub species: SpeciesId,
    pub handles: Vec<Arc<dyn Handle>>,
    pub profile: Profile,
}

impl SpeciesBundle {
    pub fn new(profile: Profile) -> Self {
        Self {
            species: profile.species().clone(),
            handles: Vec::new(),
            profile,
        }
    }

    pub fn with_handle(mut self, handle: impl Handle + 'static) -> Self {
        self.handles.push(Arc::new(handle));
        self
    }

    pub fn with_shared(mut self, handle: Arc<dyn Handle>) -> Self {
        self.handles.push(handle);
        self
    }

    pub fn handle_ids(&self) -> Vec<&'static str> {
        self.handles.iter().map(|h| h.id()).collect()
    }
}

impl fmt::Debug for SpeciesBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpeciesBundle")
            .field("species", &self.species)
            .field("handles", &self.handle_ids())
            .finish()
    }
}
