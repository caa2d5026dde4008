//! `plugins` subcommand handlers.

use rfevents_core::SubscriptionStore;

use crate::cli::{GlobalOpts, PluginsArgs, PluginsCommand};
use crate::error::CliError;
use crate::output;

use super::Context;

pub async fn handle(ctx: &Context, args: PluginsArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let monitor = ctx.service().monitor();
    let health = match args.command {
        PluginsCommand::Probe { id: None } => monitor.sweep().await?,
        PluginsCommand::Probe { id: Some(id) } => {
            let plugin = ctx
                .store
                .read_plugin(&id)
                .await?
                .ok_or_else(|| CliError::PluginNotFound { plugin: id.clone() })?;
            vec![monitor.check_plugin(&plugin).await]
        }
    };
    let rendered = output::render(&global.output, &health)?;
    output::print_output(&rendered, global.quiet);
    Ok(())
}
