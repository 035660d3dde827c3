//! Background Tasks Module
//!
//! Contains background tasks that run for the lifetime of the engine.
//!
//! # Tasks
//! - Expiry janitor: removes expired cache entries at configured intervals
//!   and persists the statistics artifact on a cadence

mod janitor;

pub use janitor::spawn_janitor_task;
