/// Profile manager infrastructure
///
/// Every installable profile implements `ProfileManager`; the registry maps
/// names to managers.
pub mod manager_interface;
pub mod native;
pub mod registry;
pub mod sysroot;

pub use manager_interface::{
    FlagSet, ProfileContext, ProfileError, ProfileManager, VersionInfo,
};
pub use registry::ProfileRegistry;
