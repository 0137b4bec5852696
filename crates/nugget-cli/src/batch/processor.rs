//! The batch driver loop: serialized, paced, cancellable between items.
//!
//! Exactly one item is in flight at a time. Each item is marked
//! `in_progress`, run through the analysis pipeline, and persisted to a
//! terminal status before the next item starts; a mandatory delay separates
//! items because the upstream endpoints rate-limit. Fetch failures are
//! recorded on the item and never abort the batch (fail-soft); store errors
//! propagate because losing writes silently is worse than stopping.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;

use nugget_appstore::{AnalysisOutcome, AppStoreClient};
use nugget_core::AppConfig;

/// Persisted error messages are capped so one huge body cannot bloat a row.
const MAX_ERROR_LEN: usize = 200;

const NO_APPS_MESSAGE: &str = "no apps found";

/// Run all pending items of a batch to a terminal status.
///
/// Before selecting work, items stranded `in_progress` by an earlier
/// abnormal termination are reset to `pending`. Ctrl-C requests cooperative
/// cancellation: the current item finishes and the batch is left
/// `in_progress` for a later invocation to resume.
pub async fn run_batch_process(
    pool: &PgPool,
    config: &AppConfig,
    batch_id: i64,
    delay_override: Option<u64>,
) -> anyhow::Result<()> {
    let batch = nugget_db::get_batch(pool, batch_id).await?;
    if batch.status == "completed" {
        anyhow::bail!("batch #{batch_id} is already completed");
    }

    let reset = nugget_db::reset_stale_items(pool, batch_id).await?;
    if reset > 0 {
        tracing::warn!(
            batch_id,
            reset,
            "reset items left in progress by an earlier run back to pending"
        );
    }

    let pending = nugget_db::count_pending_items(pool, batch_id).await?;
    if pending == 0 {
        // A previous run can die after the last item reached a terminal
        // status but before the batch did; close the batch out here.
        if batch.status == "in_progress" {
            nugget_db::refresh_batch_counters(pool, batch_id).await?;
            nugget_db::finalize_batch(pool, batch_id).await?;
            let finished = nugget_db::get_batch(pool, batch_id).await?;
            println!("batch #{batch_id} finalized as {}", finished.status);
        } else {
            println!("batch #{batch_id} has no pending items");
        }
        return Ok(());
    }

    let client = AppStoreClient::new(config)?;
    let delay_ms = delay_override.unwrap_or(config.inter_item_delay_ms);
    let cancel = cancel_on_ctrl_c();

    nugget_db::start_batch(pool, batch_id).await?;
    tracing::info!(batch_id, pending, delay_ms, "processing batch");

    let mut succeeded: u32 = 0;
    let mut failed: u32 = 0;

    loop {
        if cancel.load(Ordering::SeqCst) {
            tracing::warn!(batch_id, "cancellation requested; stopping before next item");
            break;
        }

        let Some(item) = nugget_db::next_pending_item(pool, batch_id).await? else {
            break;
        };

        nugget_db::mark_item_in_progress(pool, item.id).await?;
        tracing::info!(item_id = item.id, term = %item.search_term, "analyzing keyword");

        let outcome = nugget_appstore::analyze_keyword(
            &client,
            &item.search_term,
            &config.storefront,
            &config.language,
            config.result_limit,
            chrono::Utc::now(),
        )
        .await;

        match outcome {
            Ok(AnalysisOutcome::NoResults) => {
                nugget_db::complete_item(pool, item.id, None, Some(NO_APPS_MESSAGE)).await?;
                succeeded += 1;
            }
            Ok(AnalysisOutcome::Analyzed(analysis)) => {
                let analysis_id = nugget_db::insert_analysis(
                    pool,
                    &item.search_term,
                    &item.country,
                    &analysis.results,
                    analysis.summary.as_ref(),
                    analysis.omitted_count,
                )
                .await?;
                nugget_db::complete_item(pool, item.id, Some(analysis_id), None).await?;
                succeeded += 1;
            }
            Err(err) => {
                let message = truncate_error(&err.to_string());
                tracing::warn!(item_id = item.id, error = %err, "keyword analysis failed");
                nugget_db::fail_item(pool, item.id, &message).await?;
                failed += 1;
            }
        }

        nugget_db::refresh_batch_counters(pool, batch_id).await?;

        let remaining = nugget_db::count_pending_items(pool, batch_id).await?;
        if remaining > 0 && delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        }
    }

    let remaining = nugget_db::count_pending_items(pool, batch_id).await?;
    if remaining == 0 {
        nugget_db::finalize_batch(pool, batch_id).await?;
        let finished = nugget_db::get_batch(pool, batch_id).await?;
        println!(
            "batch #{batch_id} {}: {succeeded} succeeded, {failed} failed",
            finished.status
        );
    } else {
        println!(
            "batch #{batch_id} stopped with {remaining} item(s) pending; run process again to resume"
        );
    }
    Ok(())
}

/// Returns a flag that flips to `true` on the first Ctrl-C.
fn cancel_on_ctrl_c() -> Arc<AtomicBool> {
    let cancel = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&cancel);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            flag.store(true, Ordering::SeqCst);
        }
    });
    cancel
}

/// Cap an error message at [`MAX_ERROR_LEN`] characters on a char boundary.
fn truncate_error(message: &str) -> String {
    if message.chars().count() <= MAX_ERROR_LEN {
        message.to_owned()
    } else {
        message.chars().take(MAX_ERROR_LEN).collect()
    }
}
