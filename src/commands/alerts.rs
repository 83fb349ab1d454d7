use std::process::ExitCode;

use anyhow::Result;

use super::Context;
use crate::{evaluate, render};

// ---

/// Evaluate the configured thresholds against a fresh reading. The exit
/// status is the worst severity found.
pub(super) async fn run(ctx: &Context) -> Result<ExitCode> {
    // ---
    let snapshot = ctx
        .fetch_and_maybe_store(ctx.config.storage.store_on_read)
        .await?;

    let evaluation = evaluate(&snapshot.reading, &ctx.config.thresholds);
    tracing::info!(
        severity = evaluation.severity.tag(),
        violations = evaluation.violations.len(),
        "thresholds evaluated"
    );

    println!("{}", render::alerts_view(&ctx.painter, &evaluation));
    Ok(ExitCode::from(evaluation.exit_code()))
}
