//! Use cases driven by the CLI

pub mod import_manifest;
pub mod manage_profiles;
pub mod sync_universe;
pub mod update_workspace;
