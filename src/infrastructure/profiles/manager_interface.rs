use crate::domain::value_objects::target::Target;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Capability set of one installable profile
///
/// Managers do not consult the profile manifest; state checks and
/// persistence are the caller's job.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProfileManager: Send + Sync {
    /// Registry name of the profile
    fn name(&self) -> &'static str;

    /// One-line description
    fn info(&self) -> String;

    /// Supported versions and the default
    fn versions(&self) -> VersionInfo;

    /// Declare the flags this manager understands
    fn add_flags(&self, flags: &mut FlagSet);

    /// Install for `target` (whose version is already resolved) and return the
    /// entry to persist
    async fn install(&self, ctx: &ProfileContext, target: &Target) -> Result<Target, ProfileError>;

    /// Move an installed target to `version`; may return
    /// [`ProfileError::NoIncrementalUpdate`]
    async fn update(
        &self,
        ctx: &ProfileContext,
        installed: &Target,
        version: &str,
    ) -> Result<Target, ProfileError>;

    /// Remove everything installed for `target`
    async fn uninstall(&self, ctx: &ProfileContext, target: &Target) -> Result<(), ProfileError>;
}

/// Versions a manager can install
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionInfo {
    /// Version installed when none is requested
    pub default: String,
    /// All installable versions, oldest first
    pub supported: Vec<String>,
}

impl VersionInfo {
    /// Create version information
    pub fn new(default: impl Into<String>, supported: &[&str]) -> Self {
        Self {
            default: default.into(),
            supported: supported.iter().map(|v| v.to_string()).collect(),
        }
    }

    /// Whether `version` can be installed
    pub fn is_supported(&self, version: &str) -> bool {
        self.supported.iter().any(|v| v == version)
    }
}

/// A flag declared by a manager
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlagSpec {
    /// Help text
    pub usage: String,
    /// Value used when the flag is not given
    pub default: String,
    /// Value given on the command line
    pub value: Option<String>,
}

/// Named flags a manager reads during install and update
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlagSet {
    flags: BTreeMap<String, FlagSpec>,
}

impl FlagSet {
    /// Create an empty flag set
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a flag
    pub fn declare(&mut self, name: &str, default: &str, usage: &str) {
        self.flags.insert(
            name.to_string(),
            FlagSpec {
                usage: usage.to_string(),
                default: default.to_string(),
                value: None,
            },
        );
    }

    /// Whether a flag is declared
    pub fn is_declared(&self, name: &str) -> bool {
        self.flags.contains_key(name)
    }

    /// Set a declared flag, returning `false` when the flag is unknown
    pub fn set(&mut self, name: &str, value: &str) -> bool {
        match self.flags.get_mut(name) {
            Some(spec) => {
                spec.value = Some(value.to_string());
                true
            }
            None => false,
        }
    }

    /// Effective value of a flag
    pub fn get(&self, name: &str) -> Option<&str> {
        self.flags
            .get(name)
            .map(|spec| spec.value.as_deref().unwrap_or(&spec.default))
    }

    /// Declared flags by name
    pub fn iter(&self) -> impl Iterator<Item = (&String, &FlagSpec)> {
        self.flags.iter()
    }
}

/// Parse `name=value` flag arguments
pub fn parse_flag_args(args: &[String]) -> Result<Vec<(String, String)>, ProfileError> {
    args.iter()
        .map(|arg| match arg.split_once('=') {
            Some((name, value)) if !name.is_empty() => Ok((name.to_string(), value.to_string())),
            _ => Err(ProfileError::InvalidFlag(arg.clone())),
        })
        .collect()
}

/// Everything a manager needs to install into the workspace
#[derive(Debug, Clone)]
pub struct ProfileContext {
    /// Root under which each profile gets its own directory
    pub profiles_root: PathBuf,
    /// Flags for the manager being invoked
    pub flags: FlagSet,
}

impl ProfileContext {
    /// Create a context
    pub fn new(profiles_root: impl Into<PathBuf>, flags: FlagSet) -> Self {
        Self {
            profiles_root: profiles_root.into(),
            flags,
        }
    }

    /// Install directory of `profile` for `target`
    pub fn install_dir(&self, profile: &str, target: &Target) -> PathBuf {
        self.profiles_root.join(profile).join(target.dir_name())
    }
}

/// Profile errors
#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    #[error("Unsupported profile: {0}")]
    UnsupportedProfile(String),

    #[error("Profile {profile} does not support version {version} (supported: {supported})")]
    UnsupportedVersion {
        profile: String,
        version: String,
        supported: String,
    },

    #[error("Invalid flag '{0}': expected name=value")]
    InvalidFlag(String),

    #[error("Flag '{0}' is not declared by any selected profile")]
    UnknownFlag(String),

    #[error("Profile {profile} is already installed for {target}")]
    AlreadyInstalled { profile: String, target: String },

    #[error("Profile {profile} is not installed for {target}")]
    NotInstalled { profile: String, target: String },

    #[error("Profile {profile} has no incremental update for {target}")]
    NoIncrementalUpdate { profile: String, target: String },

    #[error("Profile {profile} failed for {target}: {message}")]
    OperationFailed {
        profile: String,
        target: String,
        message: String,
    },

    #[error("Reinstall of {profile} for {target} failed: {source}")]
    FallbackFailed {
        profile: String,
        target: String,
        #[source]
        source: Box<ProfileError>,
    },

    #[error("Profile IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ProfileError {
    /// Wrap an IO failure at `path`
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether the error is a precondition failure on the (profile, target) state
    pub fn is_state_error(&self) -> bool {
        matches!(
            self,
            Self::AlreadyInstalled { .. } | Self::NotInstalled { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_set_defaults_and_overrides() {
        let mut flags = FlagSet::new();
        flags.declare("cc", "cc", "C compiler");

        assert_eq!(flags.get("cc"), Some("cc"));
        assert!(flags.set("cc", "clang"));
        assert_eq!(flags.get("cc"), Some("clang"));
        assert!(!flags.set("ld", "lld"));
        assert_eq!(flags.get("ld"), None);
    }

    #[test]
    fn test_parse_flag_args() {
        let parsed = parse_flag_args(&["cc=clang".to_string(), "opt=".to_string()]).unwrap();
        assert_eq!(
            parsed,
            vec![
                ("cc".to_string(), "clang".to_string()),
                ("opt".to_string(), String::new())
            ]
        );
        assert!(matches!(
            parse_flag_args(&["=x".to_string()]),
            Err(ProfileError::InvalidFlag(_))
        ));
    }

    #[test]
    fn test_version_info() {
        let info = VersionInfo::new("2", &["1", "2"]);
        assert!(info.is_supported("1"));
        assert!(!info.is_supported("3"));
    }

    #[test]
    fn test_install_dir_includes_version() {
        let ctx = ProfileContext::new("/ws/.wsync_root/profiles", FlagSet::new());
        let target = Target::new("amd64", "linux").with_version("2");
        assert_eq!(
            ctx.install_dir("native", &target),
            PathBuf::from("/ws/.wsync_root/profiles/native/amd64-linux_2")
        );
    }
}
