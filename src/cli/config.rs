use anyhow::Result;
use clap::{Args, Subcommand};

use super::context::CliContext;
use super::output::OutputFormat;

#[derive(Args, Clone, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Clone, Debug)]
pub enum ConfigAction {
    /// Print the effective configuration after file and environment overlays
    Show,
    /// Print the configuration file in use
    Path,
}

pub async fn cmd_config(args: ConfigArgs, ctx: &CliContext) -> Result<()> {
    match args.action {
        ConfigAction::Show => match ctx.output() {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(ctx.config())?),
            _ => {
                if let Some(path) = ctx.config_path() {
                    println!("# {}", path.display());
                }
                print!("{}", serde_yaml::to_string(ctx.config())?);
            }
        },
        ConfigAction::Path => match ctx.config_path() {
            Some(path) => println!("{}", path.display()),
            None => println!("(defaults, no configuration file)"),
        },
    }
    Ok(())
}
