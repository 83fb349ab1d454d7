use std::collections::VecDeque;
use std::pin::pin;
use std::process::ExitCode;

use anyhow::{Context as _, Result};
use chrono::{Duration, Utc};
use futures::TryStreamExt;

use super::Context;
use crate::cli::HistoryArgs;
use crate::render::{self, HISTORY_ROW_LIMIT};
use crate::HistoryStore;

// ---

/// Stored readings for the selected device over the last `--days`, oldest
/// first. Never contacts the device.
pub(super) async fn run(ctx: &Context, args: &HistoryArgs) -> Result<ExitCode> {
    // ---
    let db_path = &ctx.config.storage.db_path;
    let store = HistoryStore::open_existing(db_path).await?;

    let label = ctx.device.storage_label();
    let until = Utc::now();
    let since = until - Duration::days(i64::from(args.days));
    tracing::debug!(device = label, %since, %until, "querying history");

    if args.json {
        let mut all = Vec::new();
        let mut records = pin!(store.query_range(label, since, until));
        while let Some(record) = records.try_next().await? {
            all.push(record);
        }
        println!("{}", render::history_json(&all)?);
        return Ok(ExitCode::SUCCESS);
    }

    // Only the newest rows are shown; keep memory bounded on long windows.
    let mut tail = VecDeque::with_capacity(HISTORY_ROW_LIMIT);
    {
        // The stream holds the store's only connection until dropped.
        let mut records = pin!(store.query_range(label, since, until));
        while let Some(record) = records.try_next().await? {
            if tail.len() == HISTORY_ROW_LIMIT {
                tail.pop_front();
            }
            tail.push_back(record);
        }
    }
    let summary = store
        .summarize(label, since, until)
        .await
        .context("could not summarize history")?;

    let rows: Vec<_> = tail.into_iter().collect();
    println!(
        "{}",
        render::history_view(&ctx.painter, args.days, &rows, &summary)
    );

    Ok(ExitCode::SUCCESS)
}
