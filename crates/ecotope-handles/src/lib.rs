//! # Ecotope Handles
//!
//! Built-in ecological handles. Each handle owns one blob in the agent's
//! component and publishes the flags it is responsible for:
//!
//! - **Age** - life-stage transitions, elderly flag, natural death
//! - **Hunger** / **Thirst** - linear decay with damage cooldowns
//! - **Condition** - body condition that trends with hunger
//! - **Social** - need for company, polled through the spatial index
//! - **Energy** - activity cost and recovery, exhaustion interrupts
//! - **Predation** - flee and hunt intents, kill restore amounts
//! - **Breeding** - eligibility and cooldown
//! - **Diet** - food overrides
//! - **Production** - harvestable resources
//!
//! Generic species shapes live in [`bundles`].

mod common;

pub mod age;
pub mod hunger;
pub mod thirst;
pub mod condition;
pub mod social;
pub mod energy;
pub mod predation;
pub mod breeding;
pub mod diet;
pub mod production;
pub mod bundles;
pub mod prelude;
