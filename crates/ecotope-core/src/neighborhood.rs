//! The Neighborhood trait — read-only proximity queries for handles.
//!
//! Handles see the spatial index only through this trait, so they can be
//! tested against [`NoNeighbors`] or a fixed stub.

use crate::types::{AgentId, Position, SpeciesId, WorldId};

pub trait Neighborhood {
    /// Is another agent of `agent`'s species registered within `radius`?
    fn has_nearby_same_type(&self, agent: AgentId, radius: f64) -> bool;

    /// How many other agents of `agent`'s species are within `radius`.
    fn count_nearby_same_type(&self, agent: AgentId, radius: f64) -> usize;

    /// The closest agent to `position` within `radius` whose species is any
    /// of `species`. List order does not matter; ties go to the lower id.
    fn nearest_of_any(
        &self,
        world: &WorldId,
        position: Position,
        species: &[SpeciesId],
        radius: f64,
    ) -> Option<AgentId>;

    /// The closest agent of `species` to `position` within `radius`.
    fn nearest_of_type(
        &self,
        world: &WorldId,
        position: Position,
        species: &SpeciesId,
        radius: f64,
    ) -> Option<AgentId> {
        self.nearest_of_any(world, position, std::slice::from_ref(species), radius)
    }
}

/// A neighborhood with nobody in it.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoNeighbors;

impl Neighborhood for NoNeighbors {
    fn has_nearby_same_type(&self, _agent: AgentId, _radius: f64) -> bool {
        false
    }

    fn count_nearby_same_type(&self, _agent: AgentId, _radius: f64) -> usize {
        0
    }

    fn nearest_of_any(
        &self,
        _world: &WorldId,
        _position: Position,
        _species: &[SpeciesId],
        _radius: f64,
    ) -> Option<AgentId> {
        None
    }
}
