//! Shared types used across all Ecotope crates.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Simulation step counter, owned by the host.
pub type Tick = u64;

/// Side length of a spatial cell in world units (chunk-equivalent).
pub const DEFAULT_CELL_SIZE: u32 = 16;

/// Unique identifier for an agent. The host owns the agent; the engine only
/// ever sees this handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AgentId(pub Uuid);

impl AgentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Deterministic id, useful for tests.
    pub fn from_seed(seed: u64) -> Self {
        Self(Uuid::from_u128(seed as u128))
    }

    /// Phase offset in `[0, interval)` used to spread unobserved agents
    /// across steps.
    pub fn stagger(&self, interval: u64) -> u64 {
        if interval == 0 {
            return 0;
        }
        (self.0.as_u128() % interval as u128) as u64
    }
}

impl Default for AgentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Species identifier, e.g. `minecraft:wolf`. A small closed set known at
/// startup.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpeciesId(String);

impl SpeciesId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SpeciesId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SpeciesId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for SpeciesId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// World / dimension identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorldId(String);

impl WorldId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for WorldId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A continuous world position. `y` is height; cells partition `x`/`z`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Position {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn distance_squared(&self, other: &Position) -> f64 {
        (self.x - other.x).powi(2) + (self.y - other.y).powi(2) + (self.z - other.z).powi(2)
    }

    pub fn distance_to(&self, other: &Position) -> f64 {
        self.distance_squared(other).sqrt()
    }

    /// The cell containing this position for the given cell size.
    pub fn cell(&self, cell_size: u32) -> CellPos {
        CellPos::containing(self, cell_size)
    }

    pub fn block(&self) -> BlockPos {
        BlockPos::new(self.x.floor() as i32, self.y.floor() as i32, self.z.floor() as i32)
    }
}

/// Integer block coordinates, used for persisted spawn placements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockPos {
    pub fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    pub fn center(&self) -> Position {
        Position::new(self.x as f64 + 0.5, self.y as f64, self.z as f64 + 0.5)
    }
}

/// Horizontal cell coordinates (truncated world coordinates).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellPos {
    pub x: i32,
    pub z: i32,
}

impl CellPos {
    pub fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// Floor division so negative coordinates land in the right cell.
    pub fn containing(pos: &Position, cell_size: u32) -> Self {
        let size = cell_size.max(1) as i64;
        Self {
            x: (pos.x.floor() as i64).div_euclid(size) as i32,
            z: (pos.z.floor() as i64).div_euclid(size) as i32,
        }
    }
}

/// A cell within a particular world.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellKey {
    pub world: WorldId,
    pub cell: CellPos,
}

impl CellKey {
    pub fn new(world: WorldId, cell: CellPos) -> Self {
        Self { world, cell }
    }
}
