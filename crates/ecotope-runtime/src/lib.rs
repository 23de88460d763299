//! # Ecotope Runtime
//!
//! Species registry, profile loading, spatial and population indexes, and
//! the step coordinator.
//!
//! The runtime is the glue between a host world and the handles: the host
//! calls into the [`engine::Engine`] on attach, every step and removal, and
//! the engine decides which handles run, over how many elapsed steps, and
//! what survives when one of them fails.

pub mod config;
pub mod registry;
pub mod loader;
pub mod spatial;
pub mod population;
pub mod placements;
pub mod record;
pub mod engine;
pub mod engine_builder;
pub mod session;
pub mod prelude;

#[cfg(feature = "sqlite")]
pub mod sqlite_store;
