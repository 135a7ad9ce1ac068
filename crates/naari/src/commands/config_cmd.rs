//! Config subcommand handlers.

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::commands::config_path;
use crate::error::CliError;

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let path = config_path(global);

    match args.command {
        ConfigCommand::Init { force } => {
            if path.exists() && !force {
                return Err(CliError::ConfigExists {
                    path: path.display().to_string(),
                });
            }
            naari_config::write_empty_config(&path)?;
            eprintln!("Wrote starter config to {}", path.display());
            eprintln!("Add [[devices]] entries with id and address to get started.");
            Ok(())
        }

        ConfigCommand::Show => {
            if !path.exists() {
                return Err(CliError::NoConfig {
                    path: path.display().to_string(),
                });
            }
            let config = naari_config::load_config(&path)?;
            let (_, warnings) = config.resolve_settings();
            for warning in &warnings {
                eprintln!("warning: {warning}");
            }
            println!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }

        ConfigCommand::Path => {
            println!("{}", path.display());
            Ok(())
        }
    }
}
