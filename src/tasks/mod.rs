//! Background Tasks Module
//!
//! Contains background tasks that run periodically alongside the engine.
//!
//! # Tasks
//! - Sweep: releases expired TTL floors and finalizes reclaimed entries

mod sweep;

pub use sweep::{spawn_sweep_task, Sweep};
