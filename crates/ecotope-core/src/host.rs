//! The host boundary.
//!
//! The host world owns every agent. It hands the engine a short-lived
//! `&mut dyn AgentHost` view for each callback; the engine never stores it.

use crate::capability::Capabilities;
use crate::types::{AgentId, Position, SpeciesId, WorldId};
use serde::{Deserialize, Serialize};

/// Why the host is being asked to hurt or kill an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DamageCause {
    Starvation,
    Dehydration,
    OldAge,
}

/// Why an agent left the simulation for good.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RemovalReason {
    /// Died of non-predation causes.
    Died,
    /// Killed by another agent.
    Killed { by: AgentId },
    /// Removed by the host (despawn, cleanup).
    Despawned,
}

/// What the host's own task executor currently has the agent doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Activity {
    pub fleeing: bool,
    pub hunting: bool,
    pub swimming: bool,
}

/// Host-side view of one agent.
pub trait AgentHost {
    fn id(&self) -> AgentId;

    fn species(&self) -> &SpeciesId;

    fn world(&self) -> &WorldId;

    fn position(&self) -> Position;

    /// What this agent's body supports. Read once at attach.
    fn capabilities(&self) -> Capabilities;

    fn is_baby(&self) -> bool;

    fn set_baby(&mut self, baby: bool);

    /// Current health as a fraction of maximum health.
    fn health_fraction(&self) -> f64;

    fn activity(&self) -> Activity;

    /// Whether the agent is close to an observer (player nearby, tamed,
    /// ridden). Unobserved agents run on a reduced, staggered cadence.
    fn is_observed(&self) -> bool {
        true
    }

    fn damage(&mut self, cause: DamageCause, amount: f64);

    fn kill(&mut self, cause: DamageCause);
}
