use anyhow::Result;
use std::sync::Arc;

use super::{CommandContext, OutputFormat};
use crate::application::services::import_resolver::{ImportResolver, ResolveOptions};
use crate::application::services::manifest_source::WorkspaceManifestSource;
use crate::common::error::WsyncError;
use crate::infrastructure::filesystem::WorkspaceLock;

/// Handler for the resolve command
///
/// Resolving may clone manifest providers, so it runs under the update lock.
pub struct ResolveCommand {
    pub format: OutputFormat,
    pub refresh: bool,
}

impl ResolveCommand {
    pub async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        ctx.workspace.ensure_layout().map_err(WsyncError::from)?;
        let mut lock = WorkspaceLock::open(ctx.workspace.update_lock_path())?;
        let _guard = lock.acquire()?;

        let source = Arc::new(WorkspaceManifestSource::new(
            ctx.workspace.root_path.clone(),
            ctx.vcs(),
        ));
        let universe = ImportResolver::new(source)
            .with_options(
                ResolveOptions::default()
                    .with_refresh(self.refresh)
                    .with_jobs(ctx.config.jobs),
            )
            .resolve(&ctx.workspace.manifest_path())
            .await
            .map_err(WsyncError::from)?;

        print!("{}", self.format.render(&universe.to_manifest())?);
        Ok(())
    }
}
