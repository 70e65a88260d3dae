//! CLI argument parsing with clap derive

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::app::{AppContext, AppFlags};
use crate::commands;

/// Report this machine's state to a Sal server
#[derive(Parser)]
#[command(
    name = "sal-submit",
    version,
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Log debug detail, including server responses
    #[arg(short, long, global = true)]
    pub debug: bool,

    /// Log progress
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Override the configured server URL
    #[arg(long, global = true, value_name = "URL")]
    pub url: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run a full checkin and send the results
    Submit(commands::submit::SubmitArgs),

    /// Bring plugin scripts in line with the server, then exit
    SyncScripts,

    /// Show version
    Version,
}

impl Cli {
    /// Default log directive implied by the verbosity flags.
    #[must_use]
    pub fn log_level(&self) -> &'static str {
        if self.debug {
            "debug"
        } else if self.verbose {
            "info"
        } else {
            "warn"
        }
    }

    /// Execute the CLI command.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration is invalid or the command fails.
    pub async fn run(self) -> Result<()> {
        let Cli { url, command, .. } = self;
        match command {
            Command::Version => {
                commands::version::run();
                Ok(())
            }
            Command::Submit(args) => {
                let app = AppContext::new(&AppFlags { url })?;
                commands::submit::run(&app, &args).await
            }
            Command::SyncScripts => {
                let app = AppContext::new(&AppFlags { url })?;
                commands::sync_scripts::run(&app)
            }
        }
    }
}
