//! `publish` and `test-event` handlers.

use serde_json::json;

use crate::cli::{GlobalOpts, PublishArgs, TestEventArgs};
use crate::error::CliError;
use crate::output;

use super::{Context, emit, read_body};

/// Route one inbound envelope and report whether any subscriber matched.
pub async fn publish(ctx: &Context, args: PublishArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let raw = read_body(&args.file)?;
    let router = ctx.service().router();
    let matched = router.publish_event(&args.host, &raw).await;
    router.wait_idle().await;

    let rendered = output::render(
        &global.output,
        &json!({ "Host": args.host, "Matched": matched }),
    )?;
    output::print_output(&rendered, global.quiet);
    Ok(())
}

pub async fn test_event(
    ctx: &Context,
    args: TestEventArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let body = read_body(&args.file)?;
    let router = ctx.service().router();
    let response = router.submit_test_event(&args.user, &body).await;
    router.wait_idle().await;
    emit(&response, global)
}
