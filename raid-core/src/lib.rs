//! Raid Simulator - Core Library
//!
//! This crate provides the deterministic simulation logic for tile-based
//! cooperative raid encounters:
//! - Status effects (stacking, duration, derived modifiers, periodic ticks)
//! - Combat resolution (damage, healing, shields, reflection, death)
//! - Grid maps, collision-aware boss pathfinding and targeting
//! - Data-driven boss definitions and the boss AI orchestrator
//! - Boss action preparation (telegraph) and resolution
//! - Player movement and skill casting
//! - Per-raid tick stepping
//! - JSON data store with hot reload, configuration, and logging
//!
//! Nothing in here awaits: the server crate owns timers and suspension.

pub mod actions;
pub mod boss;
pub mod combat;
pub mod config;
pub mod constants;
pub mod data;
pub mod error;
pub mod events;
pub mod grid;
pub mod input;
pub mod logging;
pub mod pathfinding;
pub mod raid;
pub mod simulation;
pub mod skills;
pub mod status;
