use clap::Subcommand;

use super::config::ConfigArgs;
use super::detect::DetectArgs;
use super::fill::FillArgs;
use super::identify::IdentifyArgs;
use super::profile::ProfileArgs;

#[derive(Subcommand, Clone, Debug)]
pub enum Commands {
    /// Identify the application platform behind a URL
    Identify(IdentifyArgs),

    /// Report the fields detected on an application page
    Detect(DetectArgs),

    /// Fill an application page from a profile and drive it to completion
    Fill(FillArgs),

    /// Manage the local profile cache
    Profile(ProfileArgs),

    /// Inspect the effective configuration
    Config(ConfigArgs),
}
