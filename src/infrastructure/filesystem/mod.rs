/// File system infrastructure
///
/// Stores for the documents kept under the workspace root: manifests, the
/// update history, the profile manifest, per-project metadata, configuration,
/// plus the process-level lock that serializes their writers.
pub mod atomic;
pub mod config_store;
pub mod history_store;
pub mod manifest_store;
pub mod profile_store;
pub mod project_metadata;
pub mod workspace_lock;

pub use config_store::{ConfigStore, ConfigStoreError, WorkspaceConfig};
pub use history_store::{HistoryError, HistoryPointer, HistoryStore};
pub use manifest_store::{ManifestStore, ManifestStoreError};
pub use profile_store::{ProfileStore, ProfileStoreError};
pub use project_metadata::{ProjectMetadataError, ProjectMetadataStore};
pub use workspace_lock::{LockError, WorkspaceLock};
