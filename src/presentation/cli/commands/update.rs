use anyhow::Result;
use colored::Colorize;

use super::CommandContext;
use crate::application::use_cases::sync_universe::{AbortSignal, SyncReport};
use crate::application::use_cases::update_workspace::{
    SnapshotSource, UpdateOptions, UpdateWorkspaceUseCase,
};
use crate::common::error::WsyncError;

/// Handler for the update command
pub struct UpdateCommand {
    pub gc: bool,
    pub refresh: bool,
    pub snapshot: Option<String>,
    pub verbose: bool,
}

impl UpdateCommand {
    pub async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        println!(
            "{} Updating workspace at {}",
            "::".blue().bold(),
            ctx.workspace.root_path.display()
        );

        let options = UpdateOptions::default()
            .with_gc(self.gc)
            .with_refresh(self.refresh)
            .with_jobs(ctx.config.jobs)
            .with_snapshot(self.snapshot.as_deref().map(snapshot_source))
            .with_history_read_retries(ctx.config.history_read_retries);

        let abort = AbortSignal::new();
        let listener = abort.listen_for_ctrl_c();
        let result = UpdateWorkspaceUseCase::new(ctx.workspace.clone(), ctx.vcs())
            .with_options(options)
            .with_abort_signal(abort)
            .execute()
            .await;
        listener.abort();

        let result = result.map_err(WsyncError::from)?;
        self.print_report(&result.report);
        println!(
            "{} Workspace updated ({})",
            "✓".green().bold(),
            result.entry.id
        );
        Ok(())
    }

    fn print_report(&self, report: &SyncReport) {
        for name in &report.cloned {
            println!("  {} {}", "+".green(), name);
        }
        for name in &report.moved {
            println!("  {} {}", ">".cyan(), name);
        }
        for name in &report.updated {
            println!("  {} {}", "*".blue(), name);
        }
        for name in &report.removed {
            println!("  {} {}", "-".red(), name);
        }
        if self.verbose {
            for name in &report.unchanged {
                println!("  {} {}", "=".dimmed(), name);
            }
        }
        for path in &report.orphaned {
            println!(
                "  {} {} is no longer declared (use --gc to remove it)",
                "?".yellow(),
                path
            );
        }
        for (path, reason) in &report.kept {
            println!("  {} kept {}: {}", "!".yellow().bold(), path, reason);
        }
        if !report.changed_anything() {
            println!("  {}", "Everything up to date".dimmed());
        }
    }
}

/// Interpret `--snapshot`; file paths are taken relative to the current directory
fn snapshot_source(value: &str) -> SnapshotSource {
    match SnapshotSource::parse(value) {
        SnapshotSource::File(path) if path.is_relative() => {
            let absolute = std::env::current_dir()
                .map(|cwd| cwd.join(&path))
                .unwrap_or(path);
            SnapshotSource::File(absolute)
        }
        source => source,
    }
}
