use super::manager_interface::{FlagSet, ProfileContext, ProfileError, ProfileManager, VersionInfo};
use crate::domain::value_objects::target::Target;
use async_trait::async_trait;
use tracing::info;

const NAME: &str = "sysroot";

/// Target sysroot skeleton profile
///
/// Each version lays out a fresh tree, so moving between versions always
/// goes through uninstall and install.
#[derive(Debug, Clone, Default)]
pub struct SysrootProfile;

impl SysrootProfile {
    /// Create the manager
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ProfileManager for SysrootProfile {
    fn name(&self) -> &'static str {
        NAME
    }

    fn info(&self) -> String {
        "Cross-compilation sysroot layout".to_string()
    }

    fn versions(&self) -> VersionInfo {
        VersionInfo::new("2025.1", &["2024.1", "2025.1"])
    }

    fn add_flags(&self, _flags: &mut FlagSet) {}

    async fn install(&self, ctx: &ProfileContext, target: &Target) -> Result<Target, ProfileError> {
        let version = target.version.clone().unwrap_or_else(|| self.versions().default);
        let target = target.clone().with_version(version.clone());
        let dir = ctx.install_dir(NAME, &target);
        let sysroot = dir.join("sysroot");

        for sub in ["usr/include", "usr/lib"] {
            let path = sysroot.join(sub);
            tokio::fs::create_dir_all(&path)
                .await
                .map_err(|e| ProfileError::io(&path, e))?;
        }
        let version_file = dir.join("VERSION");
        tokio::fs::write(&version_file, format!("{}\n", version))
            .await
            .map_err(|e| ProfileError::io(&version_file, e))?;

        let mut installed = target.with_install_dir(&dir);
        let sysroot = sysroot.to_string_lossy();
        installed.set_env_var("SYSROOT", &sysroot);
        installed.set_env_var("PKG_CONFIG_SYSROOT_DIR", &sysroot);

        info!("Installed {} {} into {}", NAME, installed, dir.display());
        Ok(installed)
    }

    async fn update(
        &self,
        _ctx: &ProfileContext,
        installed: &Target,
        _version: &str,
    ) -> Result<Target, ProfileError> {
        Err(ProfileError::NoIncrementalUpdate {
            profile: NAME.to_string(),
            target: installed.to_string(),
        })
    }

    async fn uninstall(&self, ctx: &ProfileContext, target: &Target) -> Result<(), ProfileError> {
        let dir = target
            .install_dir
            .clone()
            .unwrap_or_else(|| ctx.install_dir(NAME, target));
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ProfileError::io(dir, e)),
        }
    }
}
