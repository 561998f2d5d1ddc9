//! Authoritative zone simulation core.
//!
//! Each zone runs its own tick-scheduled runtime: patrolling and idle
//! agents admitted through budgeted spawn orders, plus depletable
//! resource deposits that refill on a timer.

pub mod agent;
pub mod clock;
pub mod command;
pub mod config;
pub mod error;
pub mod event;
pub mod resource_node;
pub mod rng;
pub mod scheduler;
pub mod snapshot;
pub mod terrain;
pub mod types;
pub mod world;
pub mod zone;
