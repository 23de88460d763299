//! Test doubles for driving handles without a host world.
//!
//! Enabled for this crate's own tests and, through the `testing` feature,
//! for other crates' dev-dependencies.

use crate::capability::Capabilities;
use crate::component::{DerivedFlags, Slot};
use crate::error::HandleError;
use crate::handle::{Clock, Handle, TickContext};
use crate::host::{Activity, AgentHost, DamageCause};
use crate::neighborhood::Neighborhood;
use crate::profile::Profile;
use crate::types::{AgentId, Position, SpeciesId, WorldId};

/// An in-memory agent that records everything the engine asks of it.
#[derive(Debug, Clone)]
pub struct MockAgent {
    pub id: AgentId,
    pub species: SpeciesId,
    pub world: WorldId,
    pub position: Position,
    pub capabilities: Capabilities,
    pub baby: bool,
    pub health: f64,
    pub activity: Activity,
    pub observed: bool,
    pub damage_taken: Vec<(DamageCause, f64)>,
    pub killed_by: Option<DamageCause>,
}

impl MockAgent {
    pub fn new(seed: u64, species: &str) -> Self {
        Self {
            id: AgentId::from_seed(seed),
            species: SpeciesId::from(species),
            world: WorldId::from("overworld"),
            position: Position::default(),
            capabilities: Capabilities::all(),
            baby: false,
            health: 1.0,
            activity: Activity::default(),
            observed: true,
            damage_taken: Vec::new(),
            killed_by: None,
        }
    }

    pub fn at(mut self, x: f64, y: f64, z: f64) -> Self {
        self.position = Position::new(x, y, z);
        self
    }

    pub fn baby(mut self) -> Self {
        self.baby = true;
        self
    }

    pub fn in_world(mut self, world: &str) -> Self {
        self.world = WorldId::from(world);
        self
    }

    pub fn with_capabilities(mut self, caps: Capabilities) -> Self {
        self.capabilities = caps;
        self
    }

    pub fn unobserved(mut self) -> Self {
        self.observed = false;
        self
    }

    pub fn total_damage(&self) -> f64 {
        self.damage_taken.iter().map(|(_, amount)| amount).sum()
    }
}

impl AgentHost for MockAgent {
    fn id(&self) -> AgentId {
        self.id
    }

    fn species(&self) -> &SpeciesId {
        &self.species
    }

    fn world(&self) -> &WorldId {
        &self.world
    }

    fn position(&self) -> Position {
        self.position
    }

    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    fn is_baby(&self) -> bool {
        self.baby
    }

    fn set_baby(&mut self, baby: bool) {
        self.baby = baby;
    }

    fn health_fraction(&self) -> f64 {
        self.health
    }

    fn activity(&self) -> Activity {
        self.activity
    }

    fn is_observed(&self) -> bool {
        self.observed
    }

    fn damage(&mut self, cause: DamageCause, amount: f64) {
        self.damage_taken.push((cause, amount));
    }

    fn kill(&mut self, cause: DamageCause) {
        self.killed_by = Some(cause);
    }
}

/// A neighborhood with a fixed answer for same-type queries.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedNeighbors {
    pub same_type_nearby: usize,
    pub nearest: Option<AgentId>,
}

impl Neighborhood for FixedNeighbors {
    fn has_nearby_same_type(&self, _agent: AgentId, _radius: f64) -> bool {
        self.same_type_nearby > 0
    }

    fn count_nearby_same_type(&self, _agent: AgentId, _radius: f64) -> usize {
        self.same_type_nearby
    }

    fn nearest_of_any(
        &self,
        _world: &WorldId,
        _position: Position,
        _species: &[SpeciesId],
        _radius: f64,
    ) -> Option<AgentId> {
        self.nearest
    }
}

/// Run one `tick` + `refresh_flags` for `handle` outside the engine.
pub fn run_tick(
    handle: &dyn Handle,
    agent: &mut MockAgent,
    profile: &Profile,
    slot: &mut Slot,
    flags: &mut DerivedFlags,
    clock: Clock,
    neighbors: &dyn Neighborhood,
) -> Result<(), HandleError> {
    {
        let mut ctx = TickContext {
            agent,
            profile,
            slot: &mut *slot,
            flags: &mut *flags,
            clock,
            neighbors,
        };
        handle.tick(&mut ctx)?;
    }
    handle.refresh_flags(slot, profile, flags);
    Ok(())
}
