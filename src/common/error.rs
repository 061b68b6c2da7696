use crate::application::services::import_resolver::ResolveError;
use crate::application::use_cases::import_manifest::ImportError;
use crate::application::use_cases::manage_profiles::ManageProfilesError;
use crate::application::use_cases::sync_universe::SyncError;
use crate::application::use_cases::update_workspace::UpdateError;
use crate::domain::entities::manifest::ManifestError;
use crate::domain::entities::workspace::WorkspaceError;
use crate::domain::value_objects::target::TargetError;
use crate::infrastructure::filesystem::{ConfigStoreError, HistoryError, ManifestStoreError};
use crate::infrastructure::profiles::ProfileError;
use thiserror::Error;

/// Exit status used when the user interrupts a run
pub const ABORT_EXIT_CODE: i32 = 130;

/// Crate-wide error
#[derive(Error, Debug)]
pub enum WsyncError {
    #[error(transparent)]
    Workspace(#[from] WorkspaceError),

    #[error(transparent)]
    Config(#[from] ConfigStoreError),

    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error(transparent)]
    ManifestStore(#[from] ManifestStoreError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error(transparent)]
    Update(#[from] UpdateError),

    #[error(transparent)]
    Import(#[from] ImportError),

    #[error(transparent)]
    History(#[from] HistoryError),

    #[error(transparent)]
    Profiles(#[from] ManageProfilesError),

    #[error(transparent)]
    Profile(#[from] ProfileError),

    #[error(transparent)]
    Target(#[from] TargetError),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl WsyncError {
    /// Process exit status for this error
    ///
    /// A single failing VCS subprocess propagates its own status; an
    /// interrupted run exits with 130; everything else exits with 1.
    pub fn exit_code(&self) -> i32 {
        let sync = match self {
            Self::Sync(e) => Some(e),
            Self::Update(UpdateError::Sync(e)) => Some(e),
            _ => None,
        };
        if let Some(SyncError::Aborted) = sync {
            return ABORT_EXIT_CODE;
        }

        let code = match self {
            Self::Sync(e) | Self::Update(UpdateError::Sync(e)) => e.exit_code(),
            Self::Resolve(e) | Self::Update(UpdateError::Resolve(e)) => e.exit_code(),
            _ => None,
        };
        code.unwrap_or(1)
    }
}
