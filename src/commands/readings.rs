use std::process::ExitCode;

use anyhow::Result;

use super::Context;
use crate::cli::ReadingsArgs;
use crate::render;

// ---

/// Print the device document untouched, either as JSON or one key per line.
pub(super) async fn run(ctx: &Context, args: &ReadingsArgs) -> Result<ExitCode> {
    // ---
    let snapshot = ctx
        .fetch_and_maybe_store(ctx.config.storage.store_on_read)
        .await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&snapshot.document)?);
    } else {
        println!("{}", render::readings_view(&ctx.painter, &snapshot.document));
    }
    Ok(ExitCode::SUCCESS)
}
