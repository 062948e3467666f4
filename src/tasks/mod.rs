//! Background Tasks Module
//!
//! Contains background tasks that run periodically while the daemon is up.
//!
//! # Tasks
//! - Sweep: drops expired index entries, removes their files, persists the index

mod sweep;

pub use sweep::spawn_sweep_task;
