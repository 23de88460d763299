//! Population Tracker — live agent counts per cell and species.
//!
//! Counts change only on confirmed spawns and removals. Spawn checks compare
//! the count in the target cell with a per-cell cap. A denial is an ordinary
//! answer, never an error.
//!
//! Cells are also grouped into square regions of `region_size` cells a side
//! (8 by default), and a species may carry a cap for the whole region.
//!
//! Above `floor(cap * soft_cap_ratio)` a soft cap applies: spawning is
//! allowed with probability `1 - (over / (cap - soft)) * 0.9`. The caller
//! rolls the dice and passes the roll in, so the tracker stays deterministic.

use ecotope_core::profile::Profile;
use ecotope_core::types::{CellKey, CellPos, Position, SpeciesId, WorldId, DEFAULT_CELL_SIZE};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, warn};

/// How far the spawn probability drops across the soft-cap band.
const SOFT_CAP_REDUCTION: f64 = 0.9;

/// Why a spawn was refused.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum DenyReason {
    /// The cell is at or above the cap.
    HardCap { count: u32, cap: u32 },
    /// The cell is in the soft-cap band and the roll missed.
    SoftCap { count: u32, cap: u32, probability: f64 },
    /// The surrounding region is at or above its cap.
    RegionCap { count: u32, cap: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SpawnDecision {
    Allowed,
    Denied(DenyReason),
}

impl SpawnDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, SpawnDecision::Allowed)
    }
}

/// How a species' cap is enforced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CapacityMethod {
    HardCap,
    SoftCap,
}

/// Carrying capacity read from `population.carrying_capacity`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapacityConfig {
    pub per_cell: u32,
    pub method: CapacityMethod,
    /// `population.spawning.max_per_region`; no region cap when absent.
    pub per_region: Option<u32>,
}

impl CapacityConfig {
    pub fn from_profile(p: &Profile) -> Self {
        let per_cell = p.get_i64("population.carrying_capacity.caps.per_chunk", 10);
        let method = match p
            .get_str("population.carrying_capacity.method", "SOFT_CAP")
            .to_ascii_uppercase()
            .as_str()
        {
            "HARD_CAP" => CapacityMethod::HardCap,
            _ => CapacityMethod::SoftCap,
        };
        let per_region = p
            .contains("population.spawning.max_per_region")
            .then(|| p.get_i64("population.spawning.max_per_region", 10))
            .map(|n| u32::try_from(n.max(0)).unwrap_or(u32::MAX));
        Self {
            per_cell: u32::try_from(per_cell.max(0)).unwrap_or(u32::MAX),
            method,
            per_region,
        }
    }
}

pub fn capacity(profile: &Profile) -> Arc<CapacityConfig> {
    profile.cached("ecotope:capacity", CapacityConfig::from_profile)
}

/// Spawn probability for `count` agents under `cap`, or `None` at or above
/// the cap.
pub fn spawn_probability(count: u32, cap: u32, soft_cap_ratio: f64) -> Option<f64> {
    if count >= cap {
        return None;
    }
    let soft = (f64::from(cap) * soft_cap_ratio).floor();
    let count = f64::from(count);
    if count < soft {
        return Some(1.0);
    }
    let band = f64::from(cap) - soft;
    Some(1.0 - ((count - soft) / band) * SOFT_CAP_REDUCTION)
}

/// Cells per region side unless configured otherwise.
pub const DEFAULT_REGION_SIZE: u32 = 8;

/// Live counts per cell and species.
#[derive(Debug)]
pub struct PopulationTracker {
    cell_size: u32,
    region_size: u32,
    soft_cap_ratio: f64,
    counts: HashMap<CellKey, HashMap<SpeciesId, u32>>,
    /// Same counts rolled up per region; keys hold region coordinates.
    regions: HashMap<CellKey, HashMap<SpeciesId, u32>>,
    dirty: BTreeSet<CellKey>,
}

impl Default for PopulationTracker {
    fn default() -> Self {
        Self::new(DEFAULT_CELL_SIZE, 0.8)
    }
}

impl PopulationTracker {
    pub fn new(cell_size: u32, soft_cap_ratio: f64) -> Self {
        Self {
            cell_size: cell_size.max(1),
            region_size: DEFAULT_REGION_SIZE,
            soft_cap_ratio: soft_cap_ratio.clamp(0.0, 1.0),
            counts: HashMap::new(),
            regions: HashMap::new(),
            dirty: BTreeSet::new(),
        }
    }

    /// Group cells into regions of `cells` a side. Only meaningful before
    /// the first spawn is counted.
    pub fn with_region_size(mut self, cells: u32) -> Self {
        self.region_size = cells.max(1);
        self
    }

    /// The region a cell belongs to, floor-divided so negative cells group
    /// the same way positive ones do.
    pub fn region_of(&self, cell: &CellKey) -> CellKey {
        let size = self.region_size as i32;
        CellKey::new(
            cell.world.clone(),
            CellPos::new(cell.cell.x.div_euclid(size), cell.cell.z.div_euclid(size)),
        )
    }

    /// The cell key for a world position.
    pub fn cell_key(&self, world: &WorldId, position: Position) -> CellKey {
        CellKey::new(world.clone(), position.cell(self.cell_size))
    }

    pub fn count(&self, cell: &CellKey, species: &SpeciesId) -> u32 {
        self.counts
            .get(cell)
            .and_then(|m| m.get(species))
            .copied()
            .unwrap_or(0)
    }

    /// All species together in one cell.
    pub fn total(&self, cell: &CellKey) -> u32 {
        self.counts.get(cell).map_or(0, |m| m.values().sum())
    }

    /// Per-species counts for a cell, sorted by species.
    pub fn counts(&self, cell: &CellKey) -> BTreeMap<SpeciesId, u32> {
        self.counts
            .get(cell)
            .map(|m| m.iter().map(|(s, c)| (s.clone(), *c)).collect())
            .unwrap_or_default()
    }

    /// Agents of `species` in the region around `position`.
    pub fn count_in_region(&self, world: &WorldId, position: Position, species: &SpeciesId) -> u32 {
        let region = self.region_of(&self.cell_key(world, position));
        self.regions
            .get(&region)
            .and_then(|m| m.get(species))
            .copied()
            .unwrap_or(0)
    }

    /// Hard-cap check for one species over the whole region.
    pub fn can_spawn_in_region(
        &self,
        world: &WorldId,
        position: Position,
        species: &SpeciesId,
        max_per_region: u32,
    ) -> SpawnDecision {
        let count = self.count_in_region(world, position, species);
        if count >= max_per_region {
            SpawnDecision::Denied(DenyReason::RegionCap {
                count,
                cap: max_per_region,
            })
        } else {
            SpawnDecision::Allowed
        }
    }

    /// Hard-cap check for one species.
    pub fn can_spawn(&self, world: &WorldId, position: Position, species: &SpeciesId, cap: u32) -> SpawnDecision {
        let count = self.count(&self.cell_key(world, position), species);
        if count >= cap {
            SpawnDecision::Denied(DenyReason::HardCap { count, cap })
        } else {
            SpawnDecision::Allowed
        }
    }

    /// Soft-cap check for one species. `roll` is a uniform sample in
    /// `[0, 1)`; the spawn goes ahead when it falls below the probability.
    pub fn can_spawn_with_roll(
        &self,
        world: &WorldId,
        position: Position,
        species: &SpeciesId,
        cap: u32,
        roll: f64,
    ) -> SpawnDecision {
        let count = self.count(&self.cell_key(world, position), species);
        match spawn_probability(count, cap, self.soft_cap_ratio) {
            None => SpawnDecision::Denied(DenyReason::HardCap { count, cap }),
            Some(p) if roll < p => SpawnDecision::Allowed,
            Some(probability) => SpawnDecision::Denied(DenyReason::SoftCap {
                count,
                cap,
                probability,
            }),
        }
    }

    /// Hard-cap check on every species in the cell combined.
    pub fn can_spawn_total(&self, world: &WorldId, position: Position, cap: u32) -> SpawnDecision {
        let count = self.total(&self.cell_key(world, position));
        if count >= cap {
            SpawnDecision::Denied(DenyReason::HardCap { count, cap })
        } else {
            SpawnDecision::Allowed
        }
    }

    /// Count a confirmed spawn.
    pub fn on_spawn(&mut self, cell: &CellKey, species: &SpeciesId) {
        let region = self.region_of(cell);
        *self
            .counts
            .entry(cell.clone())
            .or_default()
            .entry(species.clone())
            .or_insert(0) += 1;
        *self.regions.entry(region).or_default().entry(species.clone()).or_insert(0) += 1;
    }

    /// Uncount a removal. Returns `false` if nothing was counted there.
    pub fn on_despawn(&mut self, cell: &CellKey, species: &SpeciesId) -> bool {
        let Some(by_species) = self.counts.get_mut(cell) else {
            warn!(species = %species, "despawn in a cell with no population");
            return false;
        };
        let Some(count) = by_species.get_mut(species) else {
            warn!(species = %species, "despawn of a species not counted in its cell");
            return false;
        };
        *count -= 1;
        if *count == 0 {
            by_species.remove(species);
        }
        if by_species.is_empty() {
            self.counts.remove(cell);
        }

        let region = self.region_of(cell);
        if let Some(by_species) = self.regions.get_mut(&region) {
            if let Some(count) = by_species.get_mut(species) {
                *count = count.saturating_sub(1);
                if *count == 0 {
                    by_species.remove(species);
                }
            }
            if by_species.is_empty() {
                self.regions.remove(&region);
            }
        }
        true
    }

    /// Move one agent's count between cells.
    pub fn relocate(&mut self, species: &SpeciesId, from: &CellKey, to: &CellKey) {
        if from == to {
            return;
        }
        if !self.on_despawn(from, species) {
            debug!(species = %species, "relocate without a prior count");
        }
        self.on_spawn(to, species);
    }

    /// Flag a cell whose spawn conditions changed (terrain edits, lighting)
    /// so its cached placements get recomputed.
    pub fn mark_cell_dirty(&mut self, cell: CellKey) {
        self.dirty.insert(cell);
    }

    /// Cells marked dirty since the last call.
    pub fn take_dirty(&mut self) -> Vec<CellKey> {
        std::mem::take(&mut self.dirty).into_iter().collect()
    }

    /// Forget every count in `world`.
    pub fn clear_world(&mut self, world: &WorldId) {
        self.counts.retain(|cell, _| &cell.world != world);
        self.regions.retain(|region, _| &region.world != world);
        self.dirty.retain(|cell| &cell.world != world);
    }

    /// Number of cells with at least one live agent.
    pub fn occupied_cells(&self) -> usize {
        self.counts.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn overworld() -> WorldId {
        WorldId::from("overworld")
    }

    fn rabbit() -> SpeciesId {
        SpeciesId::from("minecraft:rabbit")
    }

    fn origin_cell() -> CellKey {
        CellKey::new(overworld(), CellPos::new(0, 0))
    }

    #[test]
    fn hard_cap_denies_the_next_spawn() {
        let mut tracker = PopulationTracker::default();
        let here = Position::new(3.0, 70.0, 9.0);
        for _ in 0..4 {
            tracker.on_spawn(&origin_cell(), &rabbit());
        }
        assert_eq!(
            tracker.can_spawn(&overworld(), here, &rabbit(), 4),
            SpawnDecision::Denied(DenyReason::HardCap { count: 4, cap: 4 })
        );
        assert!(tracker.can_spawn(&overworld(), here, &rabbit(), 5).is_allowed());

        tracker.on_despawn(&origin_cell(), &rabbit());
        assert!(tracker.can_spawn(&overworld(), here, &rabbit(), 4).is_allowed());
    }

    #[test]
    fn other_cells_and_species_do_not_count() {
        let mut tracker = PopulationTracker::default();
        tracker.on_spawn(&origin_cell(), &SpeciesId::from("minecraft:fox"));
        tracker.on_spawn(&CellKey::new(overworld(), CellPos::new(1, 0)), &rabbit());
        assert!(tracker
            .can_spawn(&overworld(), Position::new(1.0, 0.0, 1.0), &rabbit(), 1)
            .is_allowed());
        assert!(!tracker
            .can_spawn_total(&overworld(), Position::new(1.0, 0.0, 1.0), 1)
            .is_allowed());
    }

    #[test]
    fn soft_cap_probability_falls_across_the_band() {
        assert_eq!(spawn_probability(0, 10, 0.8), Some(1.0));
        assert_eq!(spawn_probability(7, 10, 0.8), Some(1.0));
        assert_eq!(spawn_probability(8, 10, 0.8), Some(1.0));
        let p9 = spawn_probability(9, 10, 0.8).unwrap();
        assert!((p9 - 0.55).abs() < 1e-9);
        assert_eq!(spawn_probability(10, 10, 0.8), None);
    }

    #[test]
    fn soft_cap_uses_the_callers_roll() {
        let mut tracker = PopulationTracker::default();
        for _ in 0..9 {
            tracker.on_spawn(&origin_cell(), &rabbit());
        }
        let here = Position::default();
        assert!(tracker.can_spawn_with_roll(&overworld(), here, &rabbit(), 10, 0.5).is_allowed());
        assert!(matches!(
            tracker.can_spawn_with_roll(&overworld(), here, &rabbit(), 10, 0.6),
            SpawnDecision::Denied(DenyReason::SoftCap { count: 9, cap: 10, .. })
        ));
    }

    #[test]
    fn despawn_cleans_up_empty_cells() {
        let mut tracker = PopulationTracker::default();
        tracker.on_spawn(&origin_cell(), &rabbit());
        assert!(tracker.on_despawn(&origin_cell(), &rabbit()));
        assert!(!tracker.on_despawn(&origin_cell(), &rabbit()));
        assert_eq!(tracker.occupied_cells(), 0);
        assert!(tracker.counts(&origin_cell()).is_empty());
    }

    #[test]
    fn dirty_cells_are_taken_once() {
        let mut tracker = PopulationTracker::default();
        tracker.on_spawn(&origin_cell(), &rabbit());
        assert!(tracker.take_dirty().is_empty(), "spawns alone do not dirty a cell");
        tracker.mark_cell_dirty(origin_cell());
        tracker.mark_cell_dirty(origin_cell());
        assert_eq!(tracker.take_dirty(), vec![origin_cell()]);
        assert!(tracker.take_dirty().is_empty());
    }

    #[test]
    fn relocate_moves_the_count() {
        let mut tracker = PopulationTracker::default();
        let east = CellKey::new(overworld(), CellPos::new(1, 0));
        tracker.on_spawn(&origin_cell(), &rabbit());
        tracker.relocate(&rabbit(), &origin_cell(), &east);
        assert_eq!(tracker.count(&origin_cell(), &rabbit()), 0);
        assert_eq!(tracker.count(&east, &rabbit()), 1);
    }

    #[test]
    fn region_counts_span_eight_by_eight_cells() {
        let mut tracker = PopulationTracker::default();
        let far_corner = CellKey::new(overworld(), CellPos::new(7, 7));
        let next_region = CellKey::new(overworld(), CellPos::new(8, 0));
        let negative = CellKey::new(overworld(), CellPos::new(-1, 0));
        tracker.on_spawn(&origin_cell(), &rabbit());
        tracker.on_spawn(&far_corner, &rabbit());
        tracker.on_spawn(&next_region, &rabbit());
        tracker.on_spawn(&negative, &rabbit());

        let here = Position::new(5.0, 64.0, 5.0);
        assert_eq!(tracker.count_in_region(&overworld(), here, &rabbit()), 2);
        assert_eq!(tracker.count_in_region(&overworld(), Position::new(130.0, 64.0, 3.0), &rabbit()), 1);
        assert_eq!(tracker.count_in_region(&overworld(), Position::new(-3.0, 64.0, 3.0), &rabbit()), 1);
        assert_eq!(tracker.count_in_region(&WorldId::from("nether"), here, &rabbit()), 0);
        assert_eq!(tracker.count_in_region(&overworld(), here, &SpeciesId::from("minecraft:fox")), 0);
    }

    #[test]
    fn region_cap_follows_spawns_moves_and_despawns() {
        let mut tracker = PopulationTracker::default();
        let here = Position::new(1.0, 64.0, 1.0);
        let inside = CellKey::new(overworld(), CellPos::new(3, 4));
        let outside = CellKey::new(overworld(), CellPos::new(9, 4));
        tracker.on_spawn(&origin_cell(), &rabbit());
        tracker.on_spawn(&inside, &rabbit());
        assert_eq!(
            tracker.can_spawn_in_region(&overworld(), here, &rabbit(), 2),
            SpawnDecision::Denied(DenyReason::RegionCap { count: 2, cap: 2 })
        );

        tracker.relocate(&rabbit(), &inside, &outside);
        assert!(tracker.can_spawn_in_region(&overworld(), here, &rabbit(), 2).is_allowed());

        tracker.on_spawn(&inside, &rabbit());
        tracker.on_despawn(&origin_cell(), &rabbit());
        assert_eq!(tracker.count_in_region(&overworld(), here, &rabbit()), 1);
        tracker.on_despawn(&inside, &rabbit());
        tracker.on_despawn(&outside, &rabbit());
        assert_eq!(tracker.count_in_region(&overworld(), here, &rabbit()), 0);
        assert_eq!(tracker.occupied_cells(), 0);
    }

    #[test]
    fn region_size_is_configurable() {
        let mut tracker = PopulationTracker::new(16, 0.8).with_region_size(2);
        tracker.on_spawn(&CellKey::new(overworld(), CellPos::new(1, 1)), &rabbit());
        tracker.on_spawn(&CellKey::new(overworld(), CellPos::new(2, 1)), &rabbit());
        assert_eq!(tracker.count_in_region(&overworld(), Position::new(0.0, 0.0, 0.0), &rabbit()), 1);
        assert_eq!(tracker.count_in_region(&overworld(), Position::new(40.0, 0.0, 20.0), &rabbit()), 1);
    }

    #[test]
    fn capacity_reads_the_profile() {
        let profile = Profile::builder("minecraft:rabbit")
            .set("population.carrying_capacity.caps.per_chunk", 6)
            .set("population.carrying_capacity.method", "hard_cap")
            .build();
        let cfg = capacity(&profile);
        assert_eq!(cfg.per_cell, 6);
        assert_eq!(cfg.method, CapacityMethod::HardCap);

        let defaults = capacity(&Profile::empty("minecraft:cow"));
        assert_eq!(defaults.per_cell, 10);
        assert_eq!(defaults.method, CapacityMethod::SoftCap);
        assert_eq!(defaults.per_region, None);

        let regional = Profile::builder("minecraft:bee")
            .set("population.spawning.max_per_region", 12)
            .build();
        assert_eq!(capacity(&regional).per_region, Some(12));
    }
}
