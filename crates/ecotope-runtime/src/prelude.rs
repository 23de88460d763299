//! Ecotope Runtime Prelude — convenient imports for common usage.
//!
//! ```rust
//! use ecotope_runtime::prelude::*;
//! ```

// Re-export engine
pub use crate::engine::{Engine, EngineEvent, EngineStats, UpdateMode};

// Re-export engine builder
pub use crate::engine_builder::EngineBuilder;

// Re-export configuration
pub use crate::config::EngineConfig;

// Re-export registry and loader
pub use crate::loader::{LoadReport, ProfileLoader};
pub use crate::registry::{HandleCatalog, SpeciesEntry, SpeciesRegistry};

// Re-export spatial and population
pub use crate::placements::{CellPlacements, SpawnPlacementStore};
pub use crate::population::{CapacityMethod, DenyReason, PopulationTracker, SpawnDecision};
pub use crate::spatial::SpatialIndex;

// Re-export persistence
pub use crate::record::{AgentRecord, RECORD_KEY};
pub use crate::session::{
    capture_session, load_session, restore_placements, save_session, SavedAgent, SavedCell,
    SessionMetadata, SessionState,
};

// Re-export SQLite store when feature is enabled
#[cfg(feature = "sqlite")]
pub use crate::sqlite_store::SqliteRecordStore;

// Re-export from handles
pub use ecotope_handles::prelude::*;
