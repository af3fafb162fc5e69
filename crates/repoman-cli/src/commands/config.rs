use clap::Subcommand;
use repoman_core::config::RepomanConfig;

use super::Context;

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Write a default config to ~/.repoman/config.toml
    Init,
    /// Show the effective configuration
    Show,
}

pub fn run(ctx: &Context, action: ConfigAction) -> anyhow::Result<()> {
    match action {
        ConfigAction::Init => {
            let path = RepomanConfig::init()?;
            println!("Initialized repoman config at {}", path.display());
            Ok(())
        }
        ConfigAction::Show => {
            let mut config = ctx.config.clone();
            config.api_url = ctx.api_url();
            let toml_str = toml::to_string_pretty(&config)?;
            println!("{toml_str}");
            Ok(())
        }
    }
}
