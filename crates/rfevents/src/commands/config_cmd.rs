//! `config` subcommand handlers.

use rfevents_core::EventServiceConfig;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::error::CliError;
use crate::output;

pub fn handle(
    args: &ConfigArgs,
    config: &EventServiceConfig,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let text = match args.command {
        ConfigCommand::Show => rfevents_config::render_config(config)?,
        ConfigCommand::Path => rfevents_config::config_path().display().to_string(),
    };
    output::print_output(&text, global.quiet);
    Ok(())
}
