use anyhow::Result;

use super::config::cmd_config;
use super::detect::cmd_detect;
use super::env::CliArgs;
use super::fill::cmd_fill;
use super::identify::cmd_identify;
use super::profile::cmd_profile;
use crate::cli::commands::Commands;
use crate::cli::context::CliContext;

pub async fn dispatch(cli: &CliArgs, ctx: &CliContext) -> Result<()> {
    match cli.command.clone() {
        Commands::Identify(args) => cmd_identify(args, ctx).await,
        Commands::Detect(args) => cmd_detect(args, ctx).await,
        Commands::Fill(args) => cmd_fill(args, ctx).await,
        Commands::Profile(args) => cmd_profile(args, ctx).await,
        Commands::Config(args) => cmd_config(args, ctx).await,
    }
}
