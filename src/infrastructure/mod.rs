/// Infrastructure layer modules
///
/// This layer provides concrete implementations for external system interactions:
/// - VCS operations (git executable and libgit2)
/// - File system stores (manifests, update history, profile manifest, locks)
/// - Profile managers and their registry
pub mod filesystem;
pub mod profiles;
pub mod vcs;

// Re-export commonly used types
pub use filesystem::{HistoryStore, ManifestStore, ProfileStore, ProjectMetadataStore, WorkspaceLock};
pub use profiles::{ProfileManager, ProfileRegistry};
pub use vcs::{CloneOptions, GitVcs, VcsError, VcsOperations};
