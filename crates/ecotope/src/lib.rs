//! # Ecotope
//!
//! A data-driven ecology engine for voxel-world agents.
//!
//! The host world owns its agents. Ecotope keeps a side table of per-agent
//! state and runs a list of small, independent *handles* (hunger, thirst,
//! condition, energy, age, social, breeding, predation, diet, production)
//! over it. Which handles a species runs, and every number they use, come
//! from layered TOML profiles, so adding a species is mostly a data change.
//!
//! ## Quick Start
//!
//! ```rust
//! use ecotope::prelude::*;
//!
//! let mut engine = Engine::default();
//! engine.register_species(herbivore("minecraft:sheep", &["minecraft:wolf"]));
//! engine.register_species(predator("minecraft:wolf", &["minecraft:sheep"]));
//!
//! assert_eq!(engine.stats().species_registered, 2);
//! ```
//!
//! The host then calls the engine from its own loop:
//!
//! ```rust,ignore
//! // once per agent per step
//! let mode = engine.on_step(&mut agent_view, now)?;
//!
//! // when an agent dies
//! engine.on_remove(&agent_view, RemovalReason::Killed { by: wolf_id });
//!
//! // when its region unloads, store the record with the agent
//! if let Some(record) = engine.on_unload(agent_id) {
//!     host_data.insert(RECORD_KEY, record.to_namespaced()?);
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`ecotope_core`] - Shared types, the per-agent component, profiles and
//!   the `Handle` trait
//! - [`ecotope_handles`] - The built-in handles and species bundles
//! - [`ecotope_runtime`] - Registry, profile loader, spatial index,
//!   population tracking, the engine and persistence
//!
//! ## Key Concepts
//!
//! ### Elapsed time
//!
//! Agents far from any observer are not updated every step. When they are,
//! each handle is told how many steps passed and scales its effect by it.
//! Catch-up passes never apply threshold damage retroactively.
//!
//! ### Profiles
//!
//! | Layer | Source |
//! |-------|--------|
//! | base | `base.toml` |
//! | archetypes | `archetypes/<name>.toml`, listed in `identity.archetypes` |
//! | species | `species/<name>.toml` |
//!
//! Later layers deep-merge over earlier ones. A published profile can be
//! replaced at runtime; agents pick it up on their next step.

// Re-export all subcrates
pub use ecotope_core as core;
pub use ecotope_handles as handles;
pub use ecotope_runtime as runtime;

/// Prelude module for convenient imports.
///
/// ```rust
/// use ecotope::prelude::*;
/// ```
pub mod prelude {
    pub use ecotope_runtime::prelude::*;
}
