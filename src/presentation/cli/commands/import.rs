use anyhow::Result;
use colored::Colorize;

use super::CommandContext;
use crate::application::use_cases::import_manifest::{ImportManifestUseCase, ImportRequest};
use crate::common::error::WsyncError;

/// Handler for the import command
pub struct ImportCommand {
    pub manifest: String,
    pub remote: String,
    pub name: Option<String>,
    pub root: Option<String>,
    pub branch: Option<String>,
    pub revision: Option<String>,
    pub overwrite: bool,
}

impl ImportCommand {
    pub async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        let request = ImportRequest {
            manifest: self.manifest.clone(),
            remote: self.remote.clone(),
            name: self.name.clone(),
            root: self.root.clone(),
            branch: self.branch.clone(),
            revision: self.revision.clone(),
            overwrite: self.overwrite,
        };

        let manifest = ImportManifestUseCase::new(ctx.workspace.clone())
            .execute(request)
            .await
            .map_err(WsyncError::from)?;

        println!(
            "{} Imported {} from {} ({} import(s) in {})",
            "✓".green().bold(),
            self.manifest,
            self.remote,
            manifest.imports.len(),
            ctx.workspace.manifest_path().display()
        );
        Ok(())
    }
}
