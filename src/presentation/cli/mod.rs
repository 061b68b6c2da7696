pub mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;

use crate::common::error::WsyncError;
use crate::domain::value_objects::target::Target;
use commands::{
    history::HistoryCommand, import::ImportCommand, profile::ProfileCommand,
    resolve::ResolveCommand, update::UpdateCommand, CommandContext, OutputFormat,
};

/// wsync - keep a multi-repository workspace in sync with its manifest
#[derive(Parser)]
#[command(name = "wsync")]
#[command(about = "Keep a multi-repository workspace in sync with its manifest")]
#[command(version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("WSYNC_GIT_HASH"), ")"))]
#[command(long_version = concat!(
    env!("CARGO_PKG_VERSION"),
    " (", env!("WSYNC_GIT_HASH"), ")\nbuilt ", env!("WSYNC_BUILD_DATE"),
    " for ", env!("WSYNC_BUILD_TARGET")
))]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Resolve the manifest and bring every project to its declared state
    Update {
        /// Remove checkouts that are no longer declared
        #[arg(long)]
        gc: bool,

        /// Fetch manifest providers and branch-tracking projects even when up to date
        #[arg(long)]
        refresh: bool,

        /// Number of parallel jobs
        #[arg(short, long)]
        jobs: Option<usize>,

        /// Synchronize against a recorded snapshot (latest, second-latest or a file)
        #[arg(long)]
        snapshot: Option<String>,
    },

    /// Add a remote manifest import to the root manifest
    Import {
        /// Manifest file inside the provider project
        manifest: String,

        /// Remote of the provider project
        remote: String,

        /// Provider project name (defaults to the last component of the remote)
        #[arg(long)]
        name: Option<String>,

        /// Directory under which every imported project is placed
        #[arg(long)]
        root: Option<String>,

        /// Branch of the provider project
        #[arg(long)]
        branch: Option<String>,

        /// Revision of the provider project
        #[arg(long)]
        revision: Option<String>,

        /// Replace all existing imports
        #[arg(long)]
        overwrite: bool,
    },

    /// Print the consolidated manifest
    Resolve {
        /// Output format
        #[arg(short, long, value_enum, default_value = "yaml")]
        format: OutputFormat,

        /// Fetch manifest providers that are already present
        #[arg(long)]
        refresh: bool,
    },

    /// Print a recorded update
    History {
        /// Show the update before the latest one
        #[arg(long)]
        second_latest: bool,

        /// Output format
        #[arg(short, long, value_enum, default_value = "yaml")]
        format: OutputFormat,
    },

    /// Manage per-target build profiles
    Profile {
        #[command(subcommand)]
        command: ProfileCommands,
    },
}

#[derive(Subcommand)]
pub enum ProfileCommands {
    /// Install profiles for the given targets
    Install {
        /// Profile names
        #[arg(required = true)]
        names: Vec<String>,

        /// Target as <arch>-<os>[@<version>] (defaults to the host)
        #[arg(long = "target")]
        targets: Vec<Target>,

        /// Environment for the target as KEY=VALUE[,KEY=VALUE]
        #[arg(long)]
        env: Vec<String>,

        /// Manager flag as name=value
        #[arg(long = "flag")]
        flags: Vec<String>,
    },

    /// Update installed profiles to their default version
    Update {
        /// Profile names
        #[arg(required = true)]
        names: Vec<String>,

        /// Target as <arch>-<os>[@<version>] (defaults to the host)
        #[arg(long = "target")]
        targets: Vec<Target>,

        /// Variables to set on the updated targets as KEY=VALUE[,KEY=VALUE]
        #[arg(long)]
        env: Vec<String>,

        /// Manager flag as name=value
        #[arg(long = "flag")]
        flags: Vec<String>,

        /// Reinstall even when an incremental update is possible
        #[arg(long)]
        force: bool,
    },

    /// Uninstall profiles
    Uninstall {
        /// Profile names
        #[arg(required = true)]
        names: Vec<String>,

        /// Target as <arch>-<os> (defaults to the host)
        #[arg(long = "target")]
        targets: Vec<Target>,

        /// Uninstall every installed target
        #[arg(long, conflicts_with = "targets")]
        all_targets: bool,
    },

    /// List installed profiles
    List {
        /// Print the persisted profile manifest
        #[arg(long)]
        show_manifest: bool,
    },

    /// Print environment variables of an installed profile
    Env {
        /// Profile name
        #[arg(long)]
        profile: String,

        /// Target as <arch>-<os> (defaults to the host)
        #[arg(long)]
        target: Option<Target>,

        /// Variables to print (all when omitted)
        vars: Vec<String>,
    },
}

/// CLI application runner
pub struct CliApp {
    cli: Cli,
}

impl CliApp {
    /// Wrap parsed arguments
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Run the command and return the process exit status
    pub async fn run(self) -> i32 {
        if self.cli.no_color {
            colored::control::set_override(false);
        }

        match self.handle_command().await {
            Ok(()) => 0,
            Err(e) => {
                eprintln!("{} {}", "Error:".red().bold(), e);
                e.downcast_ref::<WsyncError>()
                    .map_or(1, WsyncError::exit_code)
            }
        }
    }

    async fn handle_command(&self) -> Result<()> {
        match &self.cli.command {
            Commands::Update {
                gc,
                refresh,
                jobs,
                snapshot,
            } => {
                let ctx = CommandContext::load(*jobs)?;
                UpdateCommand {
                    gc: *gc,
                    refresh: *refresh,
                    snapshot: snapshot.clone(),
                    verbose: self.cli.verbose,
                }
                .execute(&ctx)
                .await
            }
            Commands::Import {
                manifest,
                remote,
                name,
                root,
                branch,
                revision,
                overwrite,
            } => {
                let ctx = CommandContext::load(None)?;
                ImportCommand {
                    manifest: manifest.clone(),
                    remote: remote.clone(),
                    name: name.clone(),
                    root: root.clone(),
                    branch: branch.clone(),
                    revision: revision.clone(),
                    overwrite: *overwrite,
                }
                .execute(&ctx)
                .await
            }
            Commands::Resolve { format, refresh } => {
                let ctx = CommandContext::load(None)?;
                ResolveCommand {
                    format: *format,
                    refresh: *refresh,
                }
                .execute(&ctx)
                .await
            }
            Commands::History {
                second_latest,
                format,
            } => {
                let ctx = CommandContext::load(None)?;
                HistoryCommand {
                    second_latest: *second_latest,
                    format: *format,
                }
                .execute(&ctx)
            }
            Commands::Profile { command } => {
                let ctx = CommandContext::load(None)?;
                self.handle_profile_command(&ctx, command).await
            }
        }
    }

    async fn handle_profile_command(
        &self,
        ctx: &CommandContext,
        command: &ProfileCommands,
    ) -> Result<()> {
        let profiles = ProfileCommand::new(ctx);
        match command {
            ProfileCommands::Install {
                names,
                targets,
                env,
                flags,
            } => profiles.install(names, targets, env, flags).await,
            ProfileCommands::Update {
                names,
                targets,
                env,
                flags,
                force,
            } => profiles.update(names, targets, env, flags, *force).await,
            ProfileCommands::Uninstall {
                names,
                targets,
                all_targets,
            } => profiles.uninstall(names, targets, *all_targets).await,
            ProfileCommands::List { show_manifest } => profiles.list(*show_manifest),
            ProfileCommands::Env {
                profile,
                target,
                vars,
            } => profiles.env(profile, target.as_ref(), vars),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_profile_install() {
        let cli = Cli::try_parse_from([
            "wsync",
            "profile",
            "install",
            "native",
            "--target",
            "arm64-linux@1",
            "--env",
            "A=1,B=2",
            "--flag",
            "cc=clang",
        ])
        .unwrap();

        match cli.command {
            Commands::Profile {
                command:
                    ProfileCommands::Install {
                        names,
                        targets,
                        env,
                        flags,
                    },
            } => {
                assert_eq!(names, vec!["native".to_string()]);
                assert_eq!(targets, vec![Target::new("arm64", "linux").with_version("1")]);
                assert_eq!(env, vec!["A=1,B=2".to_string()]);
                assert_eq!(flags, vec!["cc=clang".to_string()]);
            }
            _ => panic!("Expected profile install"),
        }
    }

    #[test]
    fn test_invalid_target_is_rejected() {
        assert!(Cli::try_parse_from(["wsync", "profile", "install", "native", "--target", "bad"]).is_err());
    }

    #[test]
    fn test_update_flags() {
        let cli = Cli::try_parse_from(["wsync", "update", "--gc", "--snapshot", "second-latest"]).unwrap();
        match cli.command {
            Commands::Update { gc, snapshot, refresh, .. } => {
                assert!(gc);
                assert!(!refresh);
                assert_eq!(snapshot.as_deref(), Some("second-latest"));
            }
            _ => panic!("Expected update"),
        }
    }
}
