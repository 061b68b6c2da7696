use super::manager_interface::{ProfileError, ProfileManager};
use super::native::NativeProfile;
use super::sysroot::SysrootProfile;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Named profile managers known to this process
///
/// Built once at startup and passed to whatever needs lookups.
#[derive(Clone, Default)]
pub struct ProfileRegistry {
    managers: BTreeMap<String, Arc<dyn ProfileManager>>,
}

impl ProfileRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in managers
    pub fn with_builtin() -> Self {
        Self::new()
            .with_manager(Arc::new(NativeProfile::new()))
            .with_manager(Arc::new(SysrootProfile::new()))
    }

    /// Register a manager under its own name
    pub fn with_manager(mut self, manager: Arc<dyn ProfileManager>) -> Self {
        self.managers.insert(manager.name().to_string(), manager);
        self
    }

    /// Look up a manager by name
    pub fn get(&self, name: &str) -> Result<Arc<dyn ProfileManager>, ProfileError> {
        self.managers
            .get(name)
            .cloned()
            .ok_or_else(|| ProfileError::UnsupportedProfile(name.to_string()))
    }

    /// Registered names in order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.managers.keys().map(String::as_str)
    }
}

impl std::fmt::Debug for ProfileRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProfileRegistry")
            .field("managers", &self.managers.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_lookup() {
        let registry = ProfileRegistry::with_builtin();
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["native", "sysroot"]);
        assert_eq!(registry.get("native").unwrap().name(), "native");
        assert!(matches!(
            registry.get("cuda"),
            Err(ProfileError::UnsupportedProfile(name)) if name == "cuda"
        ));
    }
}
