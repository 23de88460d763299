//! Ecotope Handles Prelude — convenient imports for common usage.
//!
//! ```rust
//! use ecotope_handles::prelude::*;
//! ```

// Re-export handle types
pub use crate::age::AgeHandle;
pub use crate::breeding::BreedingHandle;
pub use crate::condition::ConditionHandle;
pub use crate::diet::DietHandle;
pub use crate::energy::EnergyHandle;
pub use crate::hunger::HungerHandle;
pub use crate::predation::{kill_restore_amount, PredationHandle};
pub use crate::production::{Harvest, ProductionHandle};
pub use crate::social::SocialHandle;
pub use crate::thirst::{ThirstHandle, ThirstLevel};

// Re-export bundle constructors
pub use crate::bundles::{builtin_handles, herbivore, predator, producer};

// Re-export from core
pub use ecotope_core::prelude::*;
