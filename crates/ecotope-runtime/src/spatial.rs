//! Spatial Index — per-world uniform grid of live agents.
//!
//! Agents are bucketed by their horizontal cell (`x`/`z` floored by the cell
//! size). Radius queries visit only the cells the query circle can touch,
//! or the occupied cells when that is the smaller set, so the common small
//! radius case costs a handful of buckets regardless of world population.
//!
//! The index stores the last registered position only. Callers that move an
//! agent must call [`SpatialIndex::update`].

use ecotope_core::neighborhood::Neighborhood;
use ecotope_core::types::{AgentId, CellKey, CellPos, Position, SpeciesId, WorldId, DEFAULT_CELL_SIZE};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Past this radius cell bounds stop fitting in cell coordinates; such
/// queries scan every occupied cell.
const MAX_BOUNDED_RADIUS: f64 = 1.0e7;

#[derive(Debug, Clone)]
struct Entry {
    species: SpeciesId,
    world: WorldId,
    position: Position,
    cell: CellPos,
}

#[derive(Debug, Default)]
struct WorldGrid {
    cells: HashMap<CellPos, Vec<AgentId>>,
}

impl WorldGrid {
    fn insert(&mut self, cell: CellPos, agent: AgentId) {
        self.cells.entry(cell).or_default().push(agent);
    }

    fn remove(&mut self, cell: CellPos, agent: AgentId) {
        if let Some(bucket) = self.cells.get_mut(&cell) {
            if let Some(at) = bucket.iter().position(|a| *a == agent) {
                bucket.swap_remove(at);
            }
            if bucket.is_empty() {
                self.cells.remove(&cell);
            }
        }
    }
}

/// Grid-bucketed positions of every registered agent.
#[derive(Debug)]
pub struct SpatialIndex {
    cell_size: u32,
    entries: HashMap<AgentId, Entry>,
    worlds: HashMap<WorldId, WorldGrid>,
}

impl Default for SpatialIndex {
    fn default() -> Self {
        Self::new(DEFAULT_CELL_SIZE)
    }
}

impl SpatialIndex {
    pub fn new(cell_size: u32) -> Self {
        Self {
            cell_size: cell_size.max(1),
            entries: HashMap::new(),
            worlds: HashMap::new(),
        }
    }

    pub fn cell_size(&self) -> u32 {
        self.cell_size
    }

    /// Add an agent, or move it if it is already registered. Returns `true`
    /// for a new entry.
    pub fn register(&mut self, agent: AgentId, species: SpeciesId, world: WorldId, position: Position) -> bool {
        let cell = position.cell(self.cell_size);
        let fresh = match self.entries.remove(&agent) {
            Some(old) => {
                if let Some(grid) = self.worlds.get_mut(&old.world) {
                    grid.remove(old.cell, agent);
                }
                false
            }
            None => true,
        };
        self.worlds.entry(world.clone()).or_default().insert(cell, agent);
        self.entries.insert(
            agent,
            Entry {
                species,
                world,
                position,
                cell,
            },
        );
        fresh
    }

    /// Remove an agent. Must be called exactly once per permanent removal;
    /// a second call is a caller bug and fails in debug builds.
    pub fn unregister(&mut self, agent: AgentId) -> bool {
        let Some(entry) = self.entries.remove(&agent) else {
            debug_assert!(false, "agent {agent} unregistered twice or never registered");
            warn!(agent = %agent, "unregister for an agent not in the spatial index");
            return false;
        };
        if let Some(grid) = self.worlds.get_mut(&entry.world) {
            grid.remove(entry.cell, agent);
            if grid.cells.is_empty() {
                self.worlds.remove(&entry.world);
            }
        }
        true
    }

    /// Record a new position. Buckets only change when the cell does.
    /// Returns `false` for an unknown agent.
    pub fn update(&mut self, agent: AgentId, position: Position) -> bool {
        let cell = position.cell(self.cell_size);
        let Some(entry) = self.entries.get_mut(&agent) else {
            return false;
        };
        entry.position = position;
        if entry.cell != cell {
            let old = std::mem::replace(&mut entry.cell, cell);
            let grid = self.worlds.entry(entry.world.clone()).or_default();
            grid.remove(old, agent);
            grid.insert(cell, agent);
        }
        true
    }

    pub fn contains(&self, agent: AgentId) -> bool {
        self.entries.contains_key(&agent)
    }

    pub fn position_of(&self, agent: AgentId) -> Option<Position> {
        self.entries.get(&agent).map(|e| e.position)
    }

    pub fn cell_of(&self, agent: AgentId) -> Option<CellKey> {
        self.entries
            .get(&agent)
            .map(|e| CellKey::new(e.world.clone(), e.cell))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Agents whose last position lies in `cell`.
    pub fn in_cell(&self, world: &WorldId, cell: CellPos) -> Vec<AgentId> {
        self.worlds
            .get(world)
            .and_then(|g| g.cells.get(&cell))
            .cloned()
            .unwrap_or_default()
    }

    /// Drop every agent in `world`. Returns how many were removed.
    pub fn clear_world(&mut self, world: &WorldId) -> usize {
        let Some(grid) = self.worlds.remove(world) else {
            return 0;
        };
        let mut removed = 0;
        for agent in grid.cells.into_values().flatten() {
            self.entries.remove(&agent);
            removed += 1;
        }
        debug!(world = %world, removed, "spatial index cleared for world");
        removed
    }

    /// Visit every agent in `world` within `radius` of `center`, with its
    /// squared distance.
    fn for_each_within(
        &self,
        world: &WorldId,
        center: Position,
        radius: f64,
        mut visit: impl FnMut(AgentId, &Entry, f64),
    ) {
        if radius.is_nan() || radius < 0.0 {
            return;
        }
        let Some(grid) = self.worlds.get(world) else {
            return;
        };
        let radius_sq = radius * radius;
        let mut check = |agent: &AgentId| {
            if let Some(entry) = self.entries.get(agent) {
                let d = entry.position.distance_squared(&center);
                if d <= radius_sq {
                    visit(*agent, entry, d);
                }
            }
        };

        if radius > MAX_BOUNDED_RADIUS {
            grid.cells.values().flatten().for_each(&mut check);
            return;
        }
        let low = Position::new(center.x - radius, center.y, center.z - radius).cell(self.cell_size);
        let high = Position::new(center.x + radius, center.y, center.z + radius).cell(self.cell_size);
        let span = (i64::from(high.x) - i64::from(low.x) + 1) * (i64::from(high.z) - i64::from(low.z) + 1);

        if span > grid.cells.len() as i64 {
            for (cell, bucket) in &grid.cells {
                if (low.x..=high.x).contains(&cell.x) && (low.z..=high.z).contains(&cell.z) {
                    bucket.iter().for_each(&mut check);
                }
            }
        } else {
            for x in low.x..=high.x {
                for z in low.z..=high.z {
                    if let Some(bucket) = grid.cells.get(&CellPos::new(x, z)) {
                        bucket.iter().for_each(&mut check);
                    }
                }
            }
        }
    }

    /// Agents of `species` within `radius`, nearest first.
    pub fn nearby_of_type(
        &self,
        world: &WorldId,
        position: Position,
        species: &SpeciesId,
        radius: f64,
    ) -> Vec<(AgentId, f64)> {
        let mut found = Vec::new();
        self.for_each_within(world, position, radius, |agent, entry, d| {
            if &entry.species == species {
                found.push((agent, d));
            }
        });
        found.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        found.into_iter().map(|(agent, d)| (agent, d.sqrt())).collect()
    }
}

impl Neighborhood for SpatialIndex {
    fn has_nearby_same_type(&self, agent: AgentId, radius: f64) -> bool {
        self.count_nearby_same_type(agent, radius) > 0
    }

    fn count_nearby_same_type(&self, agent: AgentId, radius: f64) -> usize {
        let Some(me) = self.entries.get(&agent) else {
            return 0;
        };
        let mut count = 0;
        self.for_each_within(&me.world, me.position, radius, |other, entry, _| {
            if other != agent && entry.species == me.species {
                count += 1;
            }
        });
        count
    }

    fn nearest_of_any(
        &self,
        world: &WorldId,
        position: Position,
        species: &[SpeciesId],
        radius: f64,
    ) -> Option<AgentId> {
        if species.is_empty() {
            return None;
        }
        let mut best: Option<(f64, AgentId)> = None;
        self.for_each_within(world, position, radius, |agent, entry, d| {
            if !species.contains(&entry.species) {
                return;
            }
            let closer = match best {
                None => true,
                Some((bd, ba)) => d < bd || (d == bd && agent < ba),
            };
            if closer {
                best = Some((d, agent));
            }
        });
        best.map(|(_, agent)| agent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn overworld() -> WorldId {
        WorldId::from("overworld")
    }

    fn sheep() -> SpeciesId {
        SpeciesId::from("minecraft:sheep")
    }

    fn wolf() -> SpeciesId {
        SpeciesId::from("minecraft:wolf")
    }

    #[test]
    fn finds_same_type_within_radius() {
        let mut index = SpatialIndex::new(16);
        let a = AgentId::from_seed(1);
        let b = AgentId::from_seed(2);
        let c = AgentId::from_seed(3);
        index.register(a, sheep(), overworld(), Position::new(0.0, 64.0, 0.0));
        index.register(b, sheep(), overworld(), Position::new(10.0, 64.0, 0.0));
        index.register(c, wolf(), overworld(), Position::new(1.0, 64.0, 1.0));

        assert!(index.has_nearby_same_type(a, 12.0));
        assert!(!index.has_nearby_same_type(a, 5.0));
        assert_eq!(index.count_nearby_same_type(a, 100.0), 1);
        assert_eq!(
            index.nearest_of_type(&overworld(), Position::new(0.0, 64.0, 0.0), &wolf(), 8.0),
            Some(c)
        );
    }

    #[test]
    fn nearest_of_any_ignores_list_order() {
        let mut index = SpatialIndex::new(16);
        let far_wolf = AgentId::from_seed(1);
        let near_fox = AgentId::from_seed(2);
        let fox = SpeciesId::from("minecraft:fox");
        index.register(far_wolf, wolf(), overworld(), Position::new(20.0, 64.0, 0.0));
        index.register(near_fox, fox.clone(), overworld(), Position::new(3.0, 64.0, 0.0));
        let here = Position::new(0.0, 64.0, 0.0);

        for hunters in [vec![wolf(), fox.clone()], vec![fox.clone(), wolf()]] {
            assert_eq!(index.nearest_of_any(&overworld(), here, &hunters, 32.0), Some(near_fox));
        }
        assert_eq!(index.nearest_of_any(&overworld(), here, &[wolf()], 32.0), Some(far_wolf));
        assert_eq!(index.nearest_of_any(&overworld(), here, &[], 32.0), None);
        assert_eq!(index.nearest_of_any(&overworld(), here, &[wolf(), fox], 2.0), None);
    }

    #[test]
    fn worlds_are_separate() {
        let mut index = SpatialIndex::new(16);
        let a = AgentId::from_seed(1);
        let b = AgentId::from_seed(2);
        index.register(a, sheep(), overworld(), Position::default());
        index.register(b, sheep(), WorldId::from("nether"), Position::default());
        assert!(!index.has_nearby_same_type(a, 50.0));
    }

    #[test]
    fn unregistered_agents_disappear_from_every_query() {
        let mut index = SpatialIndex::new(16);
        let a = AgentId::from_seed(1);
        let b = AgentId::from_seed(2);
        index.register(a, sheep(), overworld(), Position::new(5.0, 0.0, 5.0));
        index.register(b, sheep(), overworld(), Position::new(6.0, 0.0, 6.0));
        assert!(index.unregister(b));

        for radius in [0.0, 1.0, 10.0, 1_000.0, 1.0e9, f64::INFINITY] {
            assert!(!index.has_nearby_same_type(a, radius));
            let nearest = index.nearest_of_type(&overworld(), Position::new(6.0, 0.0, 6.0), &sheep(), radius);
            assert_ne!(nearest, Some(b), "radius {radius}");
        }
        assert_eq!(index.len(), 1);
        assert!(index.in_cell(&overworld(), CellPos::new(0, 0)) == vec![a]);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "unregistered twice")]
    fn double_unregister_fails_loudly_in_debug() {
        let mut index = SpatialIndex::new(16);
        let a = AgentId::from_seed(1);
        index.register(a, sheep(), overworld(), Position::default());
        index.unregister(a);
        index.unregister(a);
    }

    #[test]
    fn update_moves_between_buckets() {
        let mut index = SpatialIndex::new(16);
        let a = AgentId::from_seed(1);
        index.register(a, sheep(), overworld(), Position::new(1.0, 0.0, 1.0));
        assert!(index.update(a, Position::new(2.0, 0.0, 2.0)));
        assert_eq!(index.in_cell(&overworld(), CellPos::new(0, 0)), vec![a]);

        index.update(a, Position::new(-3.0, 0.0, 40.0));
        assert!(index.in_cell(&overworld(), CellPos::new(0, 0)).is_empty());
        assert_eq!(index.in_cell(&overworld(), CellPos::new(-1, 2)), vec![a]);
        assert_eq!(index.position_of(a), Some(Position::new(-3.0, 0.0, 40.0)));

        assert!(!index.update(AgentId::from_seed(9), Position::default()));
    }

    #[test]
    fn nearby_is_sorted_by_distance() {
        let mut index = SpatialIndex::new(8);
        for (seed, x) in [(1, 30.0), (2, 5.0), (3, 17.0), (4, 90.0)] {
            index.register(AgentId::from_seed(seed), sheep(), overworld(), Position::new(x, 0.0, 0.0));
        }
        let found = index.nearby_of_type(&overworld(), Position::default(), &sheep(), 40.0);
        let ids: Vec<_> = found.iter().map(|(a, _)| *a).collect();
        assert_eq!(ids, vec![AgentId::from_seed(2), AgentId::from_seed(3), AgentId::from_seed(1)]);
        assert!((found[0].1 - 5.0).abs() < 1e-9);
    }

    #[test]
    fn clear_world_drops_only_that_world() {
        let mut index = SpatialIndex::new(16);
        index.register(AgentId::from_seed(1), sheep(), overworld(), Position::default());
        index.register(AgentId::from_seed(2), sheep(), overworld(), Position::new(100.0, 0.0, 0.0));
        index.register(AgentId::from_seed(3), sheep(), WorldId::from("end"), Position::default());
        assert_eq!(index.clear_world(&overworld()), 2);
        assert_eq!(index.len(), 1);
        assert!(index.contains(AgentId::from_seed(3)));
    }
}
