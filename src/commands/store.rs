use std::process::ExitCode;

use anyhow::Result;

use super::Context;
use crate::render;

// ---

/// Fetch one reading and always append it, regardless of `store_on_read`.
pub(super) async fn run(ctx: &Context) -> Result<ExitCode> {
    // ---
    let snapshot = ctx.fetch_and_maybe_store(true).await?;
    let painter = &ctx.painter;

    println!("{}", render::stored_line(painter, snapshot.reading.timestamp));
    if ctx.config.storage.echo_summary {
        println!(
            "{}",
            render::status_view(
                painter,
                ctx.device.display_name(),
                &snapshot.reading,
                &ctx.config.thresholds,
            )
        );
    }
    Ok(ExitCode::SUCCESS)
}
