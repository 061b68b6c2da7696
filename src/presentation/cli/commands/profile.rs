use anyhow::Result;
use colored::Colorize;

use super::CommandContext;
use crate::application::use_cases::manage_profiles::{
    ManageProfilesUseCase, ProfileBatchReport, ProfileRequest, TargetState,
};
use crate::common::error::WsyncError;
use crate::domain::value_objects::target::{parse_env_vars, Target};
use crate::infrastructure::profiles::manager_interface::parse_flag_args;
use crate::infrastructure::profiles::ProfileRegistry;

/// Handler for the profile subcommands
pub struct ProfileCommand<'a> {
    ctx: &'a CommandContext,
    use_case: ManageProfilesUseCase,
}

impl<'a> ProfileCommand<'a> {
    pub fn new(ctx: &'a CommandContext) -> Self {
        Self {
            ctx,
            use_case: ManageProfilesUseCase::new(
                ctx.workspace.clone(),
                ProfileRegistry::with_builtin(),
            ),
        }
    }

    pub async fn install(
        &self,
        names: &[String],
        targets: &[Target],
        env: &[String],
        flags: &[String],
    ) -> Result<()> {
        let request = ProfileRequest {
            names: names.to_vec(),
            targets: targets.to_vec(),
            env: parse_env_vars(env).map_err(WsyncError::from)?,
            flags: parse_flag_args(flags).map_err(WsyncError::from)?,
        };
        let report = self
            .use_case
            .install(&request)
            .await
            .map_err(WsyncError::from)?;
        print_batch("Installed", &report);
        Ok(())
    }

    pub async fn update(
        &self,
        names: &[String],
        targets: &[Target],
        env: &[String],
        flags: &[String],
        force: bool,
    ) -> Result<()> {
        let request = ProfileRequest {
            names: names.to_vec(),
            targets: targets.to_vec(),
            env: parse_env_vars(env).map_err(WsyncError::from)?,
            flags: parse_flag_args(flags).map_err(WsyncError::from)?,
        };
        let report = self
            .use_case
            .update(&request, force)
            .await
            .map_err(WsyncError::from)?;
        print_batch("Updated", &report);
        Ok(())
    }

    pub async fn uninstall(
        &self,
        names: &[String],
        targets: &[Target],
        all_targets: bool,
    ) -> Result<()> {
        let request = ProfileRequest {
            names: names.to_vec(),
            targets: targets.to_vec(),
            ..Default::default()
        };
        let report = self
            .use_case
            .uninstall(&request, all_targets)
            .await
            .map_err(WsyncError::from)?;
        print_batch("Uninstalled", &report);
        Ok(())
    }

    pub fn list(&self, show_manifest: bool) -> Result<()> {
        if show_manifest {
            print!("{}", self.use_case.manifest_yaml().map_err(WsyncError::from)?);
            return Ok(());
        }

        let listings = self.use_case.list().map_err(WsyncError::from)?;
        if listings.is_empty() {
            println!("No profiles installed");
            let registry = ProfileRegistry::with_builtin();
            let available: Vec<&str> = registry.names().collect();
            println!("Available profiles: {}", available.join(", "));
            return Ok(());
        }

        for listing in listings {
            println!("{} {}", listing.name.bold(), listing.info.dimmed());
            for (target, state) in listing.targets {
                let state = match state {
                    TargetState::UpToDate => "up-to-date".green(),
                    TargetState::OutOfDate => "out-of-date".yellow(),
                };
                println!("  {} ({})", target, state);
            }
        }
        Ok(())
    }

    pub fn env(&self, profile: &str, target: Option<&Target>, vars: &[String]) -> Result<()> {
        let target = target
            .cloned()
            .unwrap_or_else(|| self.ctx.workspace.host_target());
        let lines = self
            .use_case
            .env(profile, &target, vars)
            .map_err(WsyncError::from)?;
        for line in lines {
            println!("{}", line);
        }
        Ok(())
    }
}

fn print_batch(verb: &str, report: &ProfileBatchReport) {
    for (name, target) in &report.changed {
        println!("{} {} {} for {}", "✓".green().bold(), verb, name, target);
    }
    for (name, target) in &report.up_to_date {
        println!("  {} {} for {} is up to date", "=".dimmed(), name, target);
    }
}
