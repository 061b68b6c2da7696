//! Application services

pub mod import_resolver;
pub mod manifest_source;

pub use import_resolver::{ImportResolver, ResolveError, ResolveOptions};
pub use manifest_source::{ManifestSource, SourceError, WorkspaceManifestSource};
