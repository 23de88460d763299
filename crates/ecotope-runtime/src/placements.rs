//! Persisted spawn placements.
//!
//! Valid spawn points for a cell are expensive to find, so they are computed
//! once, kept while the cell is loaded, and handed to the host to store with
//! the cell when it unloads. Loading the cell restores them. They are
//! recomputed only when the record is missing, invalidated, or has expired.
//!
//! On disk a cell's record is a JSON list of `{ species, x, y, z }` under the
//! key [`PLACEMENTS_KEY`].

use ecotope_core::component::Blob;
use ecotope_core::error::{EcotopeError, Result};
use ecotope_core::types::{BlockPos, CellKey, SpeciesId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::time::{Duration, Instant};
use tracing::debug;

/// Key of the placement list inside a cell's stored record.
pub const PLACEMENTS_KEY: &str = "ecotope:spawn_placements";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct PlacementEntry {
    species: SpeciesId,
    x: i32,
    y: i32,
    z: i32,
}

/// Spawn points for one cell, per species.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CellPlacements {
    by_species: BTreeMap<SpeciesId, BTreeSet<BlockPos>>,
}

impl CellPlacements {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, species: impl Into<SpeciesId>, pos: BlockPos) -> bool {
        self.by_species.entry(species.into()).or_default().insert(pos)
    }

    pub fn positions(&self, species: &SpeciesId) -> Vec<BlockPos> {
        self.by_species
            .get(species)
            .map(|s| s.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn remove(&mut self, species: &SpeciesId, pos: BlockPos) -> bool {
        let Some(set) = self.by_species.get_mut(species) else {
            return false;
        };
        let removed = set.remove(&pos);
        if set.is_empty() {
            self.by_species.remove(species);
        }
        removed
    }

    /// Remove and return the lowest remaining position for `species`.
    pub fn take(&mut self, species: &SpeciesId) -> Option<BlockPos> {
        let set = self.by_species.get_mut(species)?;
        let pos = set.pop_first();
        if set.is_empty() {
            self.by_species.remove(species);
        }
        pos
    }

    pub fn has_remaining(&self, species: &SpeciesId) -> bool {
        self.by_species.contains_key(species)
    }

    pub fn species(&self) -> impl Iterator<Item = &SpeciesId> {
        self.by_species.keys()
    }

    pub fn total(&self) -> usize {
        self.by_species.values().map(BTreeSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_species.is_empty()
    }

    /// Encode as `{ "ecotope:spawn_placements": [ { species, x, y, z }, .. ] }`.
    pub fn to_blob(&self) -> Result<Blob> {
        let entries: Vec<PlacementEntry> = self
            .by_species
            .iter()
            .flat_map(|(species, set)| {
                set.iter().map(move |p| PlacementEntry {
                    species: species.clone(),
                    x: p.x,
                    y: p.y,
                    z: p.z,
                })
            })
            .collect();
        let mut record = serde_json::Map::new();
        record.insert(PLACEMENTS_KEY.to_string(), serde_json::to_value(entries)?);
        Ok(Blob::Object(record))
    }

    /// Decode a cell record. A record without the key holds no placements.
    pub fn from_blob(blob: &Blob) -> Result<Self> {
        let Some(list) = blob.get(PLACEMENTS_KEY) else {
            return Ok(Self::new());
        };
        let entries: Vec<PlacementEntry> = serde_json::from_value(list.clone())
            .map_err(|e| EcotopeError::corrupt(format!("spawn placements: {e}")))?;
        let mut placements = Self::new();
        for e in entries {
            placements.add(e.species, BlockPos::new(e.x, e.y, e.z));
        }
        Ok(placements)
    }
}

#[derive(Debug, Clone)]
struct Stored {
    placements: CellPlacements,
    created: Instant,
}

/// Placements for every loaded cell.
#[derive(Debug)]
pub struct SpawnPlacementStore {
    expiry: Duration,
    cells: HashMap<CellKey, Stored>,
}

impl Default for SpawnPlacementStore {
    fn default() -> Self {
        Self::new(Duration::from_secs(600))
    }
}

impl SpawnPlacementStore {
    pub fn new(expiry: Duration) -> Self {
        Self {
            expiry,
            cells: HashMap::new(),
        }
    }

    pub fn get(&self, cell: &CellKey) -> Option<&CellPlacements> {
        self.cells.get(cell).map(|s| &s.placements)
    }

    /// The cell's placements, running `compute` only if there are none.
    pub fn get_or_compute<F>(&mut self, cell: &CellKey, compute: F) -> &CellPlacements
    where
        F: FnOnce() -> CellPlacements,
    {
        let stored = self.cells.entry(cell.clone()).or_insert_with(|| {
            debug!(world = %cell.world, x = cell.cell.x, z = cell.cell.z, "computing spawn placements");
            Stored {
                placements: compute(),
                created: Instant::now(),
            }
        });
        &stored.placements
    }

    /// Claim one placement for `species`. Empty records are dropped.
    pub fn take(&mut self, cell: &CellKey, species: &SpeciesId) -> Option<BlockPos> {
        let stored = self.cells.get_mut(cell)?;
        let pos = stored.placements.take(species);
        if stored.placements.is_empty() {
            self.cells.remove(cell);
        }
        pos
    }

    /// Forget a cell's placements so the next request recomputes them.
    pub fn invalidate(&mut self, cell: &CellKey) -> bool {
        self.cells.remove(cell).is_some()
    }

    /// Release a cell and return the record the host should store with it.
    /// `None` when there is nothing worth storing.
    pub fn on_cell_unload(&mut self, cell: &CellKey) -> Result<Option<Blob>> {
        match self.cells.remove(cell) {
            Some(stored) if !stored.placements.is_empty() => stored.placements.to_blob().map(Some),
            _ => Ok(None),
        }
    }

    /// Restore a cell from its stored record. Returns `true` if any
    /// placements were restored.
    pub fn on_cell_load(&mut self, cell: &CellKey, record: &Blob) -> Result<bool> {
        let placements = CellPlacements::from_blob(record)?;
        if placements.is_empty() {
            return Ok(false);
        }
        self.insert(cell.clone(), placements);
        Ok(true)
    }

    pub fn insert(&mut self, cell: CellKey, placements: CellPlacements) {
        if placements.is_empty() {
            self.cells.remove(&cell);
            return;
        }
        self.cells.insert(
            cell,
            Stored {
                placements,
                created: Instant::now(),
            },
        );
    }

    /// Drop records older than the expiry. Returns how many were dropped.
    pub fn expire(&mut self, now: Instant) -> usize {
        let before = self.cells.len();
        let expiry = self.expiry;
        self.cells
            .retain(|_, s| now.saturating_duration_since(s.created) < expiry);
        let dropped = before - self.cells.len();
        if dropped > 0 {
            debug!(dropped, "expired spawn placements");
        }
        dropped
    }

    pub fn cells(&self) -> impl Iterator<Item = (&CellKey, &CellPlacements)> {
        self.cells.iter().map(|(k, s)| (k, &s.placements))
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ecotope_core::types::{CellPos, WorldId};

    fn cell() -> CellKey {
        CellKey::new(WorldId::from("overworld"), CellPos::new(2, -1))
    }

    fn rabbit() -> SpeciesId {
        SpeciesId::from("minecraft:rabbit")
    }

    fn two_spots() -> CellPlacements {
        let mut p = CellPlacements::new();
        p.add("minecraft:rabbit", BlockPos::new(33, 64, -10));
        p.add("minecraft:rabbit", BlockPos::new(40, 65, -2));
        p
    }

    #[test]
    fn computes_once_per_cell() {
        let mut store = SpawnPlacementStore::default();
        let mut runs = 0;
        store.get_or_compute(&cell(), || {
            runs += 1;
            two_spots()
        });
        store.get_or_compute(&cell(), || {
            runs += 1;
            CellPlacements::new()
        });
        assert_eq!(runs, 1);
        assert_eq!(store.get(&cell()).map(CellPlacements::total), Some(2));

        store.invalidate(&cell());
        store.get_or_compute(&cell(), || {
            runs += 1;
            two_spots()
        });
        assert_eq!(runs, 2);
    }

    #[test]
    fn unload_and_load_keep_placements() {
        let mut store = SpawnPlacementStore::default();
        store.insert(cell(), two_spots());
        let record = store.on_cell_unload(&cell()).unwrap().expect("non-empty record");
        assert!(store.is_empty());
        assert_eq!(record[PLACEMENTS_KEY][0]["species"], "minecraft:rabbit");

        assert!(store.on_cell_load(&cell(), &record).unwrap());
        assert_eq!(store.get(&cell()), Some(&two_spots()));
    }

    #[test]
    fn records_without_the_key_are_empty() {
        let mut store = SpawnPlacementStore::default();
        assert!(!store.on_cell_load(&cell(), &serde_json::json!({ "other": 1 })).unwrap());
        assert!(store
            .on_cell_load(&cell(), &serde_json::json!({ (PLACEMENTS_KEY): "nope" }))
            .is_err());
    }

    #[test]
    fn taking_the_last_spot_drops_the_record() {
        let mut store = SpawnPlacementStore::default();
        store.insert(cell(), two_spots());
        assert_eq!(store.take(&cell(), &rabbit()), Some(BlockPos::new(33, 64, -10)));
        assert_eq!(store.take(&cell(), &SpeciesId::from("minecraft:fox")), None);
        assert_eq!(store.take(&cell(), &rabbit()), Some(BlockPos::new(40, 65, -2)));
        assert!(store.get(&cell()).is_none());
        assert_eq!(store.on_cell_unload(&cell()).unwrap(), None);
    }

    #[test]
    fn old_records_expire() {
        let mut store = SpawnPlacementStore::new(Duration::from_secs(60));
        store.insert(cell(), two_spots());
        assert_eq!(store.expire(Instant::now()), 0);
        assert_eq!(store.expire(Instant::now() + Duration::from_secs(61)), 1);
        assert!(store.is_empty());
    }
}
