use {anyhow::Result, clap::Subcommand};

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the config file path in use (or the one that would be created).
    Path,
    /// Print the resolved config as TOML.
    Show,
}

pub fn handle_config(action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Path => {
            println!("{}", zahra_config::find_or_default_config_path().display());
            Ok(())
        },
        ConfigAction::Show => {
            let config = zahra_config::discover_and_load();
            print!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        },
    }
}
