//! The step coordinator.
//!
//! The host owns every agent; the engine keeps a side table from agent id
//! to its [`Component`] plus the handles that were activated for it. The
//! host drives everything through three callbacks:
//!
//! 1. `on_attach` creates the component, activates handles and collects
//!    behavior intents (implicitly run by the first `on_step`)
//! 2. `on_step` resolves elapsed time and runs the due handles in order
//! 3. `on_remove` cleans up the spatial index and population counts and
//!    applies the kill reward for predation
//!
//! A handle that fails or panics is skipped for that step only. Its slot is
//! discarded, the flags it may have touched are rolled back, and the step
//! carries on with the next handle.

use crate::config::EngineConfig;
use crate::placements::SpawnPlacementStore;
use crate::population::{capacity, CapacityMethod, DenyReason, PopulationTracker, SpawnDecision};
use crate::record::AgentRecord;
use crate::registry::{HandleCatalog, SpeciesEntry, SpeciesRegistry};
use crate::spatial::SpatialIndex;
use ecotope_core::capability::Capabilities;
use ecotope_core::component::{Blob, Component, DerivedFlags};
use ecotope_core::error::{EcotopeError, HandleError, Result};
use ecotope_core::handle::{AttachContext, Clock, EventContext, FoodContext, Handle, SpeciesBundle, TickContext};
use ecotope_core::host::{AgentHost, RemovalReason};
use ecotope_core::intent::{sort_by_priority, BehaviorIntent};
use ecotope_core::profile::Profile;
use ecotope_core::types::{AgentId, CellKey, CellPos, Position, SpeciesId, Tick, WorldId};
use ecotope_handles::production::Harvest;
use ecotope_handles::{hunger, predation, production, thirst};
use serde::Serialize;
use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// How an agent is simulated on a given step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UpdateMode {
    /// Observed: full cadence.
    Active,
    /// Unobserved, on its staggered step: every handle runs over the
    /// accumulated gap.
    CatchUp,
    /// Unobserved, off-step: nothing runs and time keeps accumulating.
    Skip,
}

/// Event emitted by the engine.
#[derive(Debug, Clone, Serialize)]
pub enum EngineEvent {
    /// An agent got its component.
    Attached {
        agent: AgentId,
        species: SpeciesId,
        handles: usize,
        intents: usize,
    },
    /// An agent left the simulation for good.
    Removed {
        agent: AgentId,
        species: SpeciesId,
        reason: RemovalReason,
    },
    /// An agent was unloaded with its region; its record went to the host.
    Unloaded { agent: AgentId },
    /// A handle failed or panicked and was skipped for one step.
    HandleFailed {
        agent: AgentId,
        handle: String,
        message: String,
    },
    /// An agent switched to a newly published profile.
    ProfileReloaded {
        agent: AgentId,
        species: SpeciesId,
        generation: u64,
    },
    /// A spawn request was refused.
    SpawnDenied {
        species: SpeciesId,
        world: WorldId,
        cell: CellPos,
        reason: DenyReason,
    },
    /// A predator was fed for a confirmed kill.
    KillRewarded {
        killer: AgentId,
        victim: AgentId,
        restored: i32,
    },
}

/// Statistics about the engine.
#[derive(Debug, Clone, Serialize)]
pub struct EngineStats {
    pub tick: Tick,
    pub agents_tracked: usize,
    pub steps_run: u64,
    pub handle_failures: u64,
    pub species_registered: usize,
    pub spatial_entries: usize,
    pub occupied_cells: usize,
    pub placement_cells: usize,
}

/// Per-agent side-table entry.
struct Tracked {
    component: Component,
    entry: Arc<SpeciesEntry>,
    capabilities: Capabilities,
    active: Vec<Arc<dyn Handle>>,
    intents: Vec<BehaviorIntent>,
    cell: CellKey,
}

impl Tracked {
    fn is_active(&self, id: &str) -> bool {
        self.active.iter().any(|h| h.id() == id)
    }
}

/// Handles an agent runs: the species list filtered by host capabilities,
/// profile support and `handles.<id>.requires`, in species order.
fn activate(entry: &SpeciesEntry, capabilities: Capabilities) -> Vec<Arc<dyn Handle>> {
    let profile = entry.profile();
    let mut active: Vec<Arc<dyn Handle>> = entry
        .handles()
        .iter()
        .filter(|h| capabilities.satisfies(h.required_capabilities()) && h.supports(profile))
        .cloned()
        .collect();

    // Dropping one handle can orphan another, so repeat until stable.
    loop {
        let ids: HashSet<&'static str> = active.iter().map(|h| h.id()).collect();
        let before = active.len();
        active.retain(|h| {
            let requires = profile.get_string_list(&format!("handles.{}.requires", h.id()));
            let missing = requires.iter().find(|r| !ids.contains(r.as_str()));
            if let Some(missing) = missing {
                debug!(species = %entry.species(), handle = h.id(), requires = %missing, "handle not activated");
            }
            missing.is_none()
        });
        if active.len() == before {
            return active;
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// The step coordinator.
pub struct Engine {
    config: EngineConfig,
    registry: SpeciesRegistry,
    catalog: HandleCatalog,
    spatial: SpatialIndex,
    population: PopulationTracker,
    placements: SpawnPlacementStore,
    agents: HashMap<AgentId, Tracked>,
    events: Vec<(Tick, EngineEvent)>,
    tick: Tick,
    steps_run: u64,
    handle_failures: u64,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        Self::from_parts(config, SpeciesRegistry::new(), HandleCatalog::builtin())
    }

    pub fn from_parts(config: EngineConfig, registry: SpeciesRegistry, catalog: HandleCatalog) -> Self {
        Self {
            spatial: SpatialIndex::new(config.cell_size),
            population: PopulationTracker::new(config.cell_size, config.soft_cap_ratio).with_region_size(config.region_size),
            placements: SpawnPlacementStore::new(Duration::from_secs(config.placement_expiry_secs)),
            config,
            registry,
            catalog,
            agents: HashMap::new(),
            events: Vec::new(),
            tick: 0,
            steps_run: 0,
            handle_failures: 0,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ---- Species ----

    /// Register a code bundle. Returns `false` if the species already exists.
    pub fn register_species(&mut self, bundle: SpeciesBundle) -> bool {
        self.registry.register_bundle(bundle)
    }

    /// Register a species described by a data profile, optionally on top of
    /// a code bundle.
    pub fn register_profile(&mut self, data: &Profile, bundle: Option<SpeciesBundle>) -> bool {
        match bundle {
            Some(bundle) => self.registry.register_merged(bundle, data, &self.catalog),
            None => self.registry.register_data(data, &self.catalog),
        }
    }

    /// Publish a new profile for a registered species. Agents pick it up on
    /// their next step.
    pub fn reload_profile(&mut self, profile: Profile) -> Result<u64> {
        self.registry.reload_profile(profile)
    }

    pub fn registry(&self) -> &SpeciesRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut SpeciesRegistry {
        &mut self.registry
    }

    pub fn catalog(&self) -> &HandleCatalog {
        &self.catalog
    }

    pub fn catalog_mut(&mut self) -> &mut HandleCatalog {
        &mut self.catalog
    }

    // ---- Lifecycle ----

    /// Create the agent's component and collect its behavior intents.
    /// Attaching an agent twice returns the intents from the first time.
    pub fn on_attach(&mut self, agent: &mut dyn AgentHost, now: Tick) -> Result<&[BehaviorIntent]> {
        let id = agent.id();
        if !self.agents.contains_key(&id) {
            self.attach(agent, now, None)?;
        }
        Ok(self.intents(id).unwrap_or(&[]))
    }

    /// Restore an agent from its durable record (or defaults when `None`)
    /// and attach it. Replaces any state the engine already had for it.
    pub fn load(
        &mut self,
        agent: &mut dyn AgentHost,
        record: Option<&AgentRecord>,
        now: Tick,
    ) -> Result<&[BehaviorIntent]> {
        let id = agent.id();
        if self.agents.contains_key(&id) {
            debug!(agent = %id, "reloading an attached agent");
            self.detach(id);
        }
        self.attach(agent, now, record)?;
        Ok(self.intents(id).unwrap_or(&[]))
    }

    fn attach(&mut self, agent: &mut dyn AgentHost, now: Tick, record: Option<&AgentRecord>) -> Result<()> {
        let id = agent.id();
        let species = agent.species().clone();
        let entry = self
            .registry
            .get(&species)
            .ok_or_else(|| EcotopeError::unknown_species(species.as_str()))?;

        let capabilities = agent.capabilities();
        let active = activate(&entry, capabilities);
        let mut component = Component::new(Arc::clone(entry.profile()));

        if let Some(record) = record {
            for (handle_id, blob) in &record.handles {
                let data = match entry.handles().iter().find(|h| h.id() == handle_id.as_str()) {
                    Some(handle) => handle.load(blob),
                    None => blob.clone(),
                };
                component.insert_data(handle_id.clone(), data);
            }
            for (key, blob) in &record.aux {
                component.set_aux(key.clone(), blob.clone());
            }
            component.restore_time(record.time, now);
        }

        let mut intents = Vec::new();
        if component.mark_goals_registered() {
            let profile = Arc::clone(component.profile());
            for handle in &active {
                let slot = component.slot(handle.id());
                let ctx = AttachContext {
                    agent: &*agent,
                    profile: &profile,
                    slot: &slot,
                };
                match catch_unwind(AssertUnwindSafe(|| handle.register_intents(&ctx))) {
                    Ok(mut registered) => intents.append(&mut registered),
                    Err(payload) => {
                        let message = panic_message(payload);
                        self.record_failure(id, handle.id(), message);
                    }
                }
            }
            sort_by_priority(&mut intents);
        }

        let world = agent.world().clone();
        let position = agent.position();
        let cell = self.population.cell_key(&world, position);
        self.spatial.register(id, species.clone(), world, position);
        self.population.on_spawn(&cell, &species);

        debug!(agent = %id, species = %species, handles = active.len(), intents = intents.len(), "agent attached");
        self.push_event(EngineEvent::Attached {
            agent: id,
            species,
            handles: active.len(),
            intents: intents.len(),
        });
        self.agents.insert(
            id,
            Tracked {
                component,
                entry,
                capabilities,
                active,
                intents,
                cell,
            },
        );
        Ok(())
    }

    /// Drop an agent from every index without touching its handles.
    fn detach(&mut self, id: AgentId) -> Option<Tracked> {
        let tracked = self.agents.remove(&id)?;
        self.spatial.unregister(id);
        self.population.on_despawn(&tracked.cell, tracked.entry.species());
        Some(tracked)
    }

    fn update_mode(&self, agent: &dyn AgentHost, component: &Component, now: Tick) -> UpdateMode {
        if component.time().last_observed.is_none() || agent.is_observed() {
            return UpdateMode::Active;
        }
        let interval = self.config.distant_update_interval.max(1);
        let stagger = agent.id().stagger(interval);
        if now.wrapping_add(stagger) % interval == 0 {
            UpdateMode::CatchUp
        } else {
            UpdateMode::Skip
        }
    }

    /// Advance one agent by one host step.
    pub fn on_step(&mut self, agent: &mut dyn AgentHost, now: Tick) -> Result<UpdateMode> {
        self.tick = self.tick.max(now);
        let id = agent.id();
        if !self.agents.contains_key(&id) {
            self.attach(agent, now, None)?;
        }
        let Some(mut tracked) = self.agents.remove(&id) else {
            return Ok(UpdateMode::Skip);
        };

        self.pick_up_reload(id, &mut tracked);
        self.track_movement(agent, &mut tracked);

        let mode = self.update_mode(&*agent, &tracked.component, now);
        if mode != UpdateMode::Skip {
            self.run_handles(agent, &mut tracked, now, mode);
            self.steps_run += 1;
        }
        self.agents.insert(id, tracked);
        Ok(mode)
    }

    /// Swap in a newer registry entry if one was published. Handle blobs
    /// carry over; intents registered at attach stay as they are.
    fn pick_up_reload(&mut self, id: AgentId, tracked: &mut Tracked) {
        let Some(latest) = self.registry.get(tracked.entry.species()) else {
            return;
        };
        if latest.generation() == tracked.entry.generation() {
            return;
        }
        tracked.component.set_profile(Arc::clone(latest.profile()));
        tracked.active = activate(&latest, tracked.capabilities);
        let species = latest.species().clone();
        let generation = latest.generation();
        tracked.entry = latest;
        debug!(agent = %id, species = %species, generation, "profile reloaded");
        self.push_event(EngineEvent::ProfileReloaded {
            agent: id,
            species,
            generation,
        });
    }

    fn track_movement(&mut self, agent: &dyn AgentHost, tracked: &mut Tracked) {
        let id = agent.id();
        let world = agent.world();
        let position = agent.position();
        if &tracked.cell.world != world {
            self.spatial
                .register(id, tracked.entry.species().clone(), world.clone(), position);
        } else {
            self.spatial.update(id, position);
        }
        let cell = self.population.cell_key(world, position);
        if cell != tracked.cell {
            self.population.relocate(tracked.entry.species(), &tracked.cell, &cell);
            tracked.cell = cell;
        }
    }

    fn run_handles(&mut self, agent: &mut dyn AgentHost, tracked: &mut Tracked, now: Tick, mode: UpdateMode) {
        let id = agent.id();
        let component = &mut tracked.component;
        let first_run = component.time().last_observed.is_none();
        let elapsed = component.resolve_elapsed(now, self.config.max_catch_up_steps);
        let clock = Clock::new(now, elapsed);
        let profile = Arc::clone(component.profile());
        let mut flags = DerivedFlags::seeded(agent.activity(), agent.is_baby());

        for handle in &tracked.active {
            let interval = handle.tick_interval().max(1);
            let due = mode == UpdateMode::CatchUp || first_run || now % interval == 0;
            if due {
                let before = flags.clone();
                let mut slot = component.slot(handle.id());
                let spatial = &self.spatial;
                let outcome = catch_unwind(AssertUnwindSafe(|| {
                    let mut ctx = TickContext {
                        agent: &mut *agent,
                        profile: &profile,
                        slot: &mut slot,
                        flags: &mut flags,
                        clock,
                        neighbors: spatial,
                    };
                    handle.tick(&mut ctx)
                }));
                let failure = match outcome {
                    Ok(Ok(())) => None,
                    Ok(Err(e)) => Some(e),
                    Err(payload) => Some(HandleError::Panicked {
                        handle: handle.id().to_string(),
                        message: panic_message(payload),
                    }),
                };
                match failure {
                    None => {
                        component.commit(slot);
                    }
                    Some(e) => {
                        flags = before;
                        let message = match e {
                            HandleError::Failed { message, .. }
                            | HandleError::Panicked { message, .. }
                            | HandleError::Encode { message, .. } => message,
                        };
                        self.handle_failures += 1;
                        warn!(agent = %id, handle = handle.id(), %message, "handle failed, skipped for this step");
                        self.events.push((
                            self.tick,
                            EngineEvent::HandleFailed {
                                agent: id,
                                handle: handle.id().to_string(),
                                message,
                            },
                        ));
                    }
                }
            }

            let committed = component.slot(handle.id());
            let before = flags.clone();
            let refreshed = catch_unwind(AssertUnwindSafe(|| {
                handle.refresh_flags(&committed, &profile, &mut flags);
            }));
            if let Err(payload) = refreshed {
                flags = before;
                let message = panic_message(payload);
                self.handle_failures += 1;
                warn!(agent = %id, handle = handle.id(), %message, "flag refresh panicked");
                self.events.push((
                    self.tick,
                    EngineEvent::HandleFailed {
                        agent: id,
                        handle: handle.id().to_string(),
                        message,
                    },
                ));
            }
        }

        component.set_flags(flags);
        component.mark_observed(now, elapsed);
    }

    /// Permanent removal. Returns `false` if the engine did not know the
    /// agent.
    pub fn on_remove(&mut self, victim: &dyn AgentHost, reason: RemovalReason) -> bool {
        let id = victim.id();
        let Some(tracked) = self.detach(id) else {
            debug!(agent = %id, "removal of an untracked agent");
            return false;
        };
        if let RemovalReason::Killed { by } = reason {
            self.reward_kill(by, id, victim.is_baby());
        }
        debug!(agent = %id, species = %tracked.entry.species(), ?reason, "agent removed");
        self.push_event(EngineEvent::Removed {
            agent: id,
            species: tracked.entry.species().clone(),
            reason,
        });
        true
    }

    /// Release an agent whose region is unloading. Returns the record the
    /// host should store with it.
    pub fn on_unload(&mut self, agent: AgentId) -> Option<AgentRecord> {
        let record = self.save(agent);
        self.detach(agent)?;
        self.push_event(EngineEvent::Unloaded { agent });
        record
    }

    /// Feed a predator for a confirmed kill. Returns the new hunger value.
    fn reward_kill(&mut self, killer: AgentId, victim: AgentId, victim_is_baby: bool) -> Option<i32> {
        let tracked = self.agents.get_mut(&killer)?;
        let profile = Arc::clone(tracked.component.profile());
        if !predation::is_predator(&profile) || !tracked.is_active(hunger::ID) {
            return None;
        }
        let amount = predation::kill_restore_amount(&profile, victim_is_baby);
        let mut slot = tracked.component.slot(hunger::ID);
        match hunger::restore(&mut slot, &profile, amount) {
            Ok(restored) => {
                tracked.component.commit(slot);
                debug!(killer = %killer, victim = %victim, amount, restored, "kill rewarded");
                self.push_event(EngineEvent::KillRewarded {
                    killer,
                    victim,
                    restored,
                });
                Some(restored)
            }
            Err(e) => {
                warn!(killer = %killer, error = %e, "kill reward failed");
                None
            }
        }
    }

    // ---- Events from the host ----

    /// Two agents bred. Every active handle of each parent gets `on_breed`.
    pub fn on_breed(&mut self, a: &mut dyn AgentHost, b: &mut dyn AgentHost, now: Tick) -> Result<()> {
        self.breed_one(a, now)?;
        self.breed_one(b, now)
    }

    fn breed_one(&mut self, agent: &mut dyn AgentHost, now: Tick) -> Result<()> {
        let id = agent.id();
        if !self.agents.contains_key(&id) {
            self.attach(agent, now, None)?;
        }
        let Some(mut tracked) = self.agents.remove(&id) else {
            return Ok(());
        };
        let profile = Arc::clone(tracked.component.profile());
        for handle in &tracked.active {
            let mut slot = tracked.component.slot(handle.id());
            let outcome = catch_unwind(AssertUnwindSafe(|| {
                let mut ctx = EventContext {
                    agent: &mut *agent,
                    profile: &profile,
                    slot: &mut slot,
                    now,
                };
                handle.on_breed(&mut ctx)
            }));
            match outcome {
                Ok(Ok(())) => {
                    tracked.component.commit(slot);
                }
                Ok(Err(e)) => self.record_failure(id, handle.id(), e.to_string()),
                Err(payload) => {
                    let message = panic_message(payload);
                    self.record_failure(id, handle.id(), message);
                }
            }
        }
        self.agents.insert(id, tracked);
        Ok(())
    }

    /// The host's "is this food" decision after every handle's override, in
    /// handle order. Untracked agents get `original` back.
    pub fn is_food(&self, agent: &dyn AgentHost, item: &str, original: bool) -> bool {
        let Some(tracked) = self.agents.get(&agent.id()) else {
            return original;
        };
        let ctx = FoodContext {
            agent,
            profile: tracked.component.profile(),
            flags: tracked.component.flags(),
        };
        tracked.active.iter().fold(original, |decision, handle| {
            catch_unwind(AssertUnwindSafe(|| handle.override_is_food(&ctx, item, decision)))
                .unwrap_or_else(|_| {
                    warn!(agent = %agent.id(), handle = handle.id(), "food override panicked");
                    decision
                })
        })
    }

    /// Take the agent's produced resource if enough has built up.
    pub fn harvest(&mut self, agent: AgentId) -> Result<Option<Harvest>> {
        let Some(tracked) = self.agents.get_mut(&agent) else {
            return Ok(None);
        };
        if !tracked.is_active(production::ID) {
            return Ok(None);
        }
        let profile = Arc::clone(tracked.component.profile());
        let mut slot = tracked.component.slot(production::ID);
        let harvested = production::harvest(&mut slot, &profile)?;
        tracked.component.commit(slot);
        Ok(harvested)
    }

    /// Restore hunger from eating. Returns the new value, or `None` if the
    /// agent has no active hunger handle.
    pub fn feed(&mut self, agent: AgentId, amount: i32) -> Result<Option<i32>> {
        let Some(tracked) = self.agents.get_mut(&agent) else {
            return Ok(None);
        };
        if !tracked.is_active(hunger::ID) {
            return Ok(None);
        }
        let profile = Arc::clone(tracked.component.profile());
        let mut slot = tracked.component.slot(hunger::ID);
        let value = hunger::restore(&mut slot, &profile, amount)?;
        tracked.component.commit(slot);
        Ok(Some(value))
    }

    /// Restore hydration from drinking.
    pub fn drink(&mut self, agent: AgentId, amount: i32) -> Result<Option<i32>> {
        let Some(tracked) = self.agents.get_mut(&agent) else {
            return Ok(None);
        };
        if !tracked.is_active(thirst::ID) {
            return Ok(None);
        }
        let profile = Arc::clone(tracked.component.profile());
        let mut slot = tracked.component.slot(thirst::ID);
        let value = thirst::restore_hydration(&mut slot, &profile, amount)?;
        tracked.component.commit(slot);
        Ok(Some(value))
    }

    /// Store a species-specific side record next to the handle data.
    pub fn set_aux(&mut self, agent: AgentId, key: impl Into<String>, data: Blob) -> bool {
        match self.agents.get_mut(&agent) {
            Some(tracked) => {
                tracked.component.set_aux(key, data);
                true
            }
            None => false,
        }
    }

    // ---- Spawning ----

    /// Whether `species` may spawn at `position`, using the species'
    /// carrying capacity. The region cap, when the profile sets one, is
    /// checked before the cell cap. `roll` is a uniform sample in `[0, 1)`
    /// used by soft caps.
    pub fn can_spawn(&mut self, world: &WorldId, position: Position, species: &SpeciesId, roll: f64) -> SpawnDecision {
        let cfg = match self.registry.get(species) {
            Some(entry) => *capacity(entry.profile()),
            None => *capacity(&Profile::empty(species.clone())),
        };
        let regional = match cfg.per_region {
            Some(max) => self.population.can_spawn_in_region(world, position, species, max),
            None => SpawnDecision::Allowed,
        };
        let decision = match (regional, cfg.method) {
            (SpawnDecision::Denied(_), _) => regional,
            (_, CapacityMethod::HardCap) => self.population.can_spawn(world, position, species, cfg.per_cell),
            (_, CapacityMethod::SoftCap) => {
                self.population
                    .can_spawn_with_roll(world, position, species, cfg.per_cell, roll)
            }
        };
        if let SpawnDecision::Denied(reason) = decision {
            let cell = position.cell(self.config.cell_size);
            debug!(species = %species, world = %world, x = cell.x, z = cell.z, ?reason, "spawn denied");
            self.push_event(EngineEvent::SpawnDenied {
                species: species.clone(),
                world: world.clone(),
                cell,
                reason,
            });
        }
        decision
    }

    /// Flag a cell whose spawn conditions changed.
    pub fn mark_cell_dirty(&mut self, cell: CellKey) {
        self.population.mark_cell_dirty(cell);
    }

    /// Periodic housekeeping: drop placements of dirty cells and expired
    /// placement records. Returns how many records were dropped.
    pub fn maintain(&mut self, now: Instant) -> usize {
        let mut dropped = 0;
        for cell in self.population.take_dirty() {
            if self.placements.invalidate(&cell) {
                dropped += 1;
            }
        }
        dropped + self.placements.expire(now)
    }

    // ---- Persistence ----

    /// Everything needed to restore the agent later. Blobs of handles that
    /// are not active right now are kept verbatim.
    pub fn save(&self, agent: AgentId) -> Option<AgentRecord> {
        let tracked = self.agents.get(&agent)?;
        let component = &tracked.component;
        let mut handles = component.handle_data();
        for handle in tracked.entry.handles() {
            if let Some(data) = component.data(handle.id()) {
                match handle.save(data) {
                    Some(saved) => {
                        handles.insert(handle.id().to_string(), saved);
                    }
                    None => {
                        handles.remove(handle.id());
                    }
                }
            }
        }
        Some(AgentRecord::new(handles, component.time(), component.aux().clone()))
    }

    // ---- Queries ----

    pub fn is_tracked(&self, agent: AgentId) -> bool {
        self.agents.contains_key(&agent)
    }

    pub fn agent_ids(&self) -> impl Iterator<Item = AgentId> + '_ {
        self.agents.keys().copied()
    }

    pub fn component(&self, agent: AgentId) -> Option<&Component> {
        self.agents.get(&agent).map(|t| &t.component)
    }

    pub fn intents(&self, agent: AgentId) -> Option<&[BehaviorIntent]> {
        self.agents.get(&agent).map(|t| t.intents.as_slice())
    }

    /// Ids of the handles running for an agent, in execution order.
    pub fn active_handles(&self, agent: AgentId) -> Option<Vec<&'static str>> {
        self.agents
            .get(&agent)
            .map(|t| t.active.iter().map(|h| h.id()).collect())
    }

    pub fn spatial(&self) -> &SpatialIndex {
        &self.spatial
    }

    pub fn population(&self) -> &PopulationTracker {
        &self.population
    }

    pub fn placements(&self) -> &SpawnPlacementStore {
        &self.placements
    }

    pub fn placements_mut(&mut self) -> &mut SpawnPlacementStore {
        &mut self.placements
    }

    pub fn stats(&self) -> EngineStats {
        EngineStats {
            tick: self.tick,
            agents_tracked: self.agents.len(),
            steps_run: self.steps_run,
            handle_failures: self.handle_failures,
            species_registered: self.registry.len(),
            spatial_entries: self.spatial.len(),
            occupied_cells: self.population.occupied_cells(),
            placement_cells: self.placements.len(),
        }
    }

    pub fn event_history(&self) -> &[(Tick, EngineEvent)] {
        &self.events
    }

    /// Take every event emitted since the last drain.
    pub fn drain_events(&mut self) -> Vec<(Tick, EngineEvent)> {
        std::mem::take(&mut self.events)
    }

    fn push_event(&mut self, event: EngineEvent) {
        self.events.push((self.tick, event));
    }

    fn record_failure(&mut self, agent: AgentId, handle: &str, message: String) {
        self.handle_failures += 1;
        warn!(agent = %agent, handle, %message, "handle failed");
        self.push_event(EngineEvent::HandleFailed {
            agent,
            handle: handle.to_string(),
            message,
        });
    }

    /// Log a summary line, for hosts that want one per save cycle.
    pub fn log_summary(&self) {
        let stats = self.stats();
        info!(
            tick = stats.tick,
            agents = stats.agents_tracked,
            steps = stats.steps_run,
            failures = stats.handle_failures,
            species = stats.species_registered,
            "engine summary"
        );
    }
}
