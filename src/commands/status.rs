use std::process::ExitCode;

use anyhow::Result;

use super::Context;
use crate::render;

// ---

pub(super) async fn run(ctx: &Context) -> Result<ExitCode> {
    // ---
    let snapshot = ctx
        .fetch_and_maybe_store(ctx.config.storage.store_on_read)
        .await?;

    println!(
        "{}",
        render::status_view(
            &ctx.painter,
            ctx.device.display_name(),
            &snapshot.reading,
            &ctx.config.thresholds,
        )
    );
    Ok(ExitCode::SUCCESS)
}
