//! # Ecotope Core
//!
//! Core types and traits for the Ecotope agent ecology engine.
//!
//! Ecotope attaches persistent ecological state (hunger, thirst, condition,
//! energy, age, social standing, breeding, predation) to agents owned by a
//! host world simulation. This crate defines the pieces every other crate
//! builds on:
//!
//! - **Component**: per-agent store of handle-owned blobs and derived flags
//! - **Handle**: one pluggable ecological subsystem
//! - **Profile**: declarative per-species parameters with dotted-path lookup
//! - **AgentHost**: the host's view of a single agent
//! - **Neighborhood**: read-only proximity queries
//! - **BehaviorIntent**: priority/predicate/effect registrations for the host
//!
//! ## Quick Start
//!
//! ```rust
//! use ecotope_core::prelude::*;
//!
//! let profile = Profile::builder("minecraft:wolf")
//!     .set("hunger.max_value", 100)
//!     .set("predation.as_predator.enabled", true)
//!     .build();
//! assert_eq!(profile.get_i64("hunger.max_value", 20), 100);
//!
//! // Create a deterministic agent ID (for testing)
//! let id = AgentId::from_seed(42);
//! assert_eq!(id, AgentId::from_seed(42));
//! ```

pub mod types;
pub mod error;
pub mod capability;
pub mod host;
pub mod profile;
pub mod component;
pub mod intent;
pub mod neighborhood;
pub mod handle;
pub mod prelude;

#[cfg(any(test, feature = "testing"))]
pub mod testing;
