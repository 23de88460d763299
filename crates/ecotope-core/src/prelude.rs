//! Ecotope Core Prelude — convenient imports for common usage.
//!
//! ```rust
//! use ecotope_core::prelude::*;
//! ```

// Re-export commonly used types
pub use crate::types::{
    AgentId, SpeciesId, WorldId,
    Position, BlockPos, CellPos, CellKey,
    Tick, DEFAULT_CELL_SIZE,
};

pub use crate::capability::{Capabilities, Capability};
pub use crate::host::{Activity, AgentHost, DamageCause, RemovalReason};
pub use crate::profile::{Profile, ProfileBuilder, ProfileTable, ProfileValue};
pub use crate::component::{
    Blob, Component, ConditionLevel, DerivedFlags, Readings, SimulatedTime, Slot,
    MAX_CATCH_UP_STEPS,
};
pub use crate::intent::{BehaviorIntent, IntentEffect};
pub use crate::neighborhood::{Neighborhood, NoNeighbors};

// Re-export the Handle trait and its contexts
pub use crate::handle::{
    AttachContext, Clock, EventContext, FoodContext, Handle, SpeciesBundle, TickContext,
};

// Re-export error types
pub use crate::error::{ConfigError, EcotopeError, HandleError, PersistenceError, Result};
