//! # wsync - Multi-Repository Workspace Synchronizer
//!
//! `wsync` keeps a directory of version-controlled projects in line with a
//! declarative manifest. The root manifest may import manifests published by
//! other repositories; the resolver follows those imports, merges everything
//! into one consolidated manifest (the *universe*) and the synchronizer clones,
//! moves, updates and optionally removes checkouts until the workspace matches.
//! Every successful update is recorded so a previous state can be restored.
//!
//! ## Workspace Layout
//!
//! ```text
//! $WSYNC_ROOT/
//!   .wsync_manifest            root manifest
//!   .wsync_root/
//!     bin/  data/              tool binaries and data
//!     update_history/          recorded universes
//!     profiles/                installed build profiles
//!     profile_manifest.yaml    installed profile database
//!     config.yaml              workspace settings
//!   <project>/.wsync/project.yaml
//! ```
//!
//! ## Manifest
//!
//! ```yaml
//! imports:
//!   - type: remote
//!     name: manifest
//!     manifest: public
//!     remote: https://example.com/manifest.git
//!     root: third_party
//!   - type: file
//!     file: local/extra
//! projects:
//!   - name: tools
//!     path: tools
//!     remote: https://example.com/tools.git
//!     branch: main
//! hosts:
//!   - name: mirror
//!     location: https://mirror.example.com
//! tools:
//!   - name: builder
//!     project: tools
//! ```
//!
//! ## Architecture
//!
//! - [`domain`]: manifests, the universe, history entries, profiles and targets
//! - [`application`]: the import resolver and the update, import and profile use cases
//! - [`infrastructure`]: git, on-disk stores, locks and profile managers
//! - [`presentation`]: the `wsync` command line
//! - [`common`]: the crate-wide error and exit statuses
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use wsync::application::use_cases::update_workspace::{UpdateOptions, UpdateWorkspaceUseCase};
//! use wsync::domain::entities::workspace::Workspace;
//! use wsync::infrastructure::vcs::GitVcs;
//!
//! # async fn example() -> wsync::Result<()> {
//! let workspace = Workspace::from_env()?;
//! let result = UpdateWorkspaceUseCase::new(workspace, Arc::new(GitVcs::new()))
//!     .with_options(UpdateOptions::default().with_gc(true))
//!     .execute()
//!     .await?;
//!
//! println!("Recorded update {}", result.entry.id);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod application;
pub mod common;
pub mod domain;
pub mod infrastructure;
pub mod presentation;

pub use crate::common::error::WsyncError;
pub use crate::common::result::WsyncResult as Result;
