//! Common test utilities and helpers
//!
//! Shared across the integration test binaries; not every binary uses every helper.
#![allow(dead_code)]

pub mod fake_vcs;
pub mod fixtures;

pub use fake_vcs::FakeVcs;
pub use fixtures::TestWorkspace;
