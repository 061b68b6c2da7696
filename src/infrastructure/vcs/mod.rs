/// Version control operations infrastructure
///
/// `VcsOperations` is the seam the import resolver and the synchronizer
/// drive; `GitVcs` is the production implementation.
pub mod git_vcs;
pub mod vcs_interface;

pub use git_vcs::GitVcs;
pub use vcs_interface::{CloneOptions, VcsError, VcsOperations};
