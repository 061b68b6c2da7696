use super::manager_interface::{FlagSet, ProfileContext, ProfileError, ProfileManager, VersionInfo};
use crate::domain::value_objects::target::Target;
use async_trait::async_trait;
use std::path::Path;
use tracing::info;

const NAME: &str = "native";
const VERSION_FILE: &str = "VERSION";

/// Host toolchain wrapper profile
///
/// Records the C compiler to use for a target and an install directory that
/// build scripts can drop generated wrappers into. Supports moving between
/// versions in place.
#[derive(Debug, Clone, Default)]
pub struct NativeProfile;

impl NativeProfile {
    /// Create the manager
    pub fn new() -> Self {
        Self
    }

    fn configure(ctx: &ProfileContext, target: &Target, dir: &Path) -> Target {
        let mut installed = target.clone().with_install_dir(dir);
        installed.set_env_var("CC", ctx.flags.get("cc").unwrap_or("cc"));
        installed.set_env_var("NATIVE_PROFILE_ROOT", &dir.to_string_lossy());
        installed
    }
}

async fn write_version(dir: &Path, version: &str) -> Result<(), ProfileError> {
    let path = dir.join(VERSION_FILE);
    tokio::fs::write(&path, format!("{}\n", version))
        .await
        .map_err(|e| ProfileError::io(path, e))
}

#[async_trait]
impl ProfileManager for NativeProfile {
    fn name(&self) -> &'static str {
        NAME
    }

    fn info(&self) -> String {
        "Host compiler toolchain settings".to_string()
    }

    fn versions(&self) -> VersionInfo {
        VersionInfo::new("2", &["1", "2"])
    }

    fn add_flags(&self, flags: &mut FlagSet) {
        flags.declare("cc", "cc", "C compiler recorded in the CC variable");
    }

    async fn install(&self, ctx: &ProfileContext, target: &Target) -> Result<Target, ProfileError> {
        let version = target.version.clone().unwrap_or_else(|| self.versions().default);
        let target = target.clone().with_version(version.clone());
        let dir = ctx.install_dir(NAME, &target);

        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| ProfileError::io(&dir, e))?;
        write_version(&dir, &version).await?;

        info!("Installed {} {} into {}", NAME, target, dir.display());
        Ok(Self::configure(ctx, &target, &dir))
    }

    async fn update(
        &self,
        ctx: &ProfileContext,
        installed: &Target,
        version: &str,
    ) -> Result<Target, ProfileError> {
        let updated = installed.clone().with_version(version);
        let old_dir = installed
            .install_dir
            .clone()
            .unwrap_or_else(|| ctx.install_dir(NAME, installed));
        let new_dir = ctx.install_dir(NAME, &updated);

        if old_dir != new_dir {
            if old_dir.exists() {
                tokio::fs::rename(&old_dir, &new_dir)
                    .await
                    .map_err(|e| ProfileError::io(&old_dir, e))?;
            } else {
                tokio::fs::create_dir_all(&new_dir)
                    .await
                    .map_err(|e| ProfileError::io(&new_dir, e))?;
            }
        }
        write_version(&new_dir, version).await?;

        info!("Updated {} {} to version {}", NAME, installed.tag(), version);
        Ok(Self::configure(ctx, &updated, &new_dir))
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
