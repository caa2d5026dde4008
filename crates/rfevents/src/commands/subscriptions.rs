//! `subscriptions` subcommand handlers.

use serde_json::json;
use tracing::info;

use crate::cli::{GlobalOpts, SubscriptionsArgs, SubscriptionsCommand};
use crate::error::CliError;
use crate::output;

use super::{Context, emit, read_body};

pub async fn handle(
    ctx: &Context,
    args: SubscriptionsArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let reconciler = ctx.service().reconciler();
    match args.command {
        SubscriptionsCommand::List => {
            emit(&reconciler.get_event_subscriptions_collection().await, global)
        }

        SubscriptionsCommand::Get { id } => {
            emit(&reconciler.get_event_subscription(&id).await, global)
        }

        SubscriptionsCommand::Create { file, user } => {
            let body = read_body(&file)?;
            let task_id = uuid::Uuid::new_v4().to_string();
            let response = reconciler.create_subscription(&task_id, &user, &body).await;
            if !response.is_success() {
                return Err(CliError::from_response(&response));
            }
            let location = response.location.unwrap_or_default();
            let id = location.rsplit('/').next().unwrap_or_default();
            info!(%location, "subscription created");
            let rendered = output::render(
                &global.output,
                &json!({ "Id": id, "Location": &location }),
            )?;
            output::print_output(&rendered, global.quiet);
            Ok(())
        }

        SubscriptionsCommand::Delete { id } => {
            let task_id = uuid::Uuid::new_v4().to_string();
            emit(&reconciler.delete_subscription(&task_id, &id).await, global)
        }

        SubscriptionsCommand::DeleteByDevice { uuid } => {
            let task_id = uuid::Uuid::new_v4().to_string();
            emit(
                &reconciler.delete_subscriptions_by_origin(&task_id, &uuid).await,
                global,
            )
        }
    }
}
