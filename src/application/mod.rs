//! Application layer: import resolution, synchronization and profile workflows

pub mod services;
pub mod use_cases;
