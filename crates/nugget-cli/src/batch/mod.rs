//! Batch command handlers: create, list, status, process, analysis.
//!
//! These are called from `main` after the database pool and config are
//! established. Per-item processing failures are recorded on the item and
//! never abort the batch; see [`processor`] for the driver loop.

mod processor;

use std::path::PathBuf;

use clap::Subcommand;
use serde::Deserialize;
use sqlx::PgPool;

use nugget_core::AppConfig;
use nugget_db::{BatchRow, NewBatchItem};

/// Sub-commands available under `batch`.
#[derive(Debug, Subcommand)]
pub enum BatchCommands {
    /// Create a batch from a JSON keyword selection
    Create {
        /// Path to a JSON array of {"search_term", "genre"} objects
        selection: PathBuf,
        /// Reporting month the selection came from, `YYYY-MM`
        #[arg(long)]
        month: String,
        /// Country the keywords were reported for
        #[arg(long, default_value = "United States")]
        country: String,
        /// Free-form note stored on the batch
        #[arg(long)]
        notes: Option<String>,
    },
    /// List recent batches
    List {
        /// Maximum batches to show
        #[arg(long, default_value = "20")]
        limit: i64,
        /// Filter by status (pending/in_progress/completed/failed)
        #[arg(long)]
        status: Option<String>,
    },
    /// Show one batch with all of its items
    Status {
        /// Batch id
        batch_id: i64,
    },
    /// Process a batch's pending items to completion
    Process {
        /// Batch id
        batch_id: i64,
        /// Override the configured inter-item delay
        #[arg(long)]
        delay_ms: Option<u64>,
    },
    /// Print one stored keyword analysis
    Analysis {
        /// Analysis id (shown by `batch status`)
        analysis_id: i64,
    },
}

/// One entry of the external keyword selection file.
#[derive(Debug, Deserialize)]
struct Selection {
    search_term: String,
    genre: String,
}

/// Dispatch a `batch` sub-command.
pub async fn run(pool: &PgPool, config: &AppConfig, command: BatchCommands) -> anyhow::Result<()> {
    match command {
        BatchCommands::Create {
            selection,
            month,
            country,
            notes,
        } => run_create(pool, &selection, &month, &country, notes.as_deref()).await,
        BatchCommands::List { limit, status } => run_list(pool, limit, status.as_deref()).await,
        BatchCommands::Status { batch_id } => run_status(pool, batch_id).await,
        BatchCommands::Process { batch_id, delay_ms } => {
            processor::run_batch_process(pool, config, batch_id, delay_ms).await
        }
        BatchCommands::Analysis { analysis_id } => run_analysis(pool, analysis_id).await,
    }
}

/// Print one stored analysis artifact: the ranked results and the summary.
async fn run_analysis(pool: &PgPool, analysis_id: i64) -> anyhow::Result<()> {
    let row = nugget_db::get_analysis(pool, analysis_id).await?;

    println!(
        "analysis #{} for \"{}\" ({}) at {}",
        row.id,
        row.search_term,
        row.country,
        row.analyzed_at.format("%Y-%m-%d %H:%M:%S")
    );
    if row.omitted_count > 0 {
        println!("({} ranked identifier(s) were omitted for missing metadata)", row.omitted_count);
    }

    println!("{:<4} {:<12} {:<44} {:>5} {:>6} {:>8}", "rank", "app id", "title", "match", "rating", "age(d)");
    for r in &row.results.0 {
        println!(
            "{:<4} {:<12} {:<44} {:>5} {:>6.2} {:>8}",
            r.rank,
            r.app_id,
            r.title.chars().take(42).collect::<String>(),
            r.title_match_score,
            r.rating_score,
            r.age_days,
        );
    }
    if let Some(summary) = &row.summary.0 {
        println!();
        println!("competitiveness: {:.1}/100", summary.competitiveness);
        println!("avg title match: {:.2}/5", summary.avg_title_match);
        println!("median app age:  {} days", summary.median_age_days);
        println!("avg ratings/day: {:.1}", summary.avg_ratings_per_day);
    }
    Ok(())
}

/// Create a batch from a selection file, resolving each entry against the
/// active report for the given month and country.
///
/// Entries that do not resolve to a keyword row are warned about and left
/// out; the batch's `total_items` reflects only resolved entries.
async fn run_create(
    pool: &PgPool,
    selection_path: &std::path::Path,
    month: &str,
    country: &str,
    notes: Option<&str>,
) -> anyhow::Result<()> {
    let contents = std::fs::read_to_string(selection_path)
        .map_err(|e| anyhow::anyhow!("cannot read {}: {e}", selection_path.display()))?;
    let selections: Vec<Selection> = serde_json::from_str(&contents)
        .map_err(|e| anyhow::anyhow!("invalid selection file {}: {e}", selection_path.display()))?;
    if selections.is_empty() {
        anyhow::bail!("selection file contains no keywords");
    }

    let report = nugget_db::find_active_report_for(pool, month, country)
        .await?
        .ok_or_else(|| {
            anyhow::anyhow!(
                "no active report for month={month}, country={country}; import a report first"
            )
        })?;

    let mut items = Vec::with_capacity(selections.len());
    for selection in &selections {
        match nugget_db::find_keyword(
            pool,
            report.id,
            country,
            &selection.search_term,
            &selection.genre,
        )
        .await?
        {
            Some(kw) => items.push(NewBatchItem {
                keyword_id: kw.id,
                search_term: kw.search_term,
                country: kw.country,
                genre: kw.genre,
            }),
            None => tracing::warn!(
                search_term = %selection.search_term,
                genre = %selection.genre,
                "selection entry not found in report; leaving it out"
            ),
        }
    }

    if items.is_empty() {
        anyhow::bail!("none of the selected keywords exist in report {}", report.id);
    }

    let batch = nugget_db::create_batch(pool, report.id, &items, notes).await?;
    println!(
        "created batch #{} ({} of {} keywords resolved against report {})",
        batch.id,
        items.len(),
        selections.len(),
        report.id
    );
    println!("run: nugget batch process {}", batch.id);
    Ok(())
}

async fn run_list(pool: &PgPool, limit: i64, status: Option<&str>) -> anyhow::Result<()> {
    let batches = nugget_db::list_batches(pool, limit, status).await?;
    if batches.is_empty() {
        println!("no batches found");
        return Ok(());
    }

    println!(
        "{:<6} {:<20} {:<12} {:>6} {:<16} {:<10}",
        "id", "created", "status", "items", "progress", "duration"
    );
    for batch in &batches {
        println!(
            "{:<6} {:<20} {:<12} {:>6} {:<16} {:<10}",
            batch.id,
            batch.created_at.format("%Y-%m-%d %H:%M:%S"),
            batch.status,
            batch.total_items,
            progress_display(batch),
            batch
                .duration_secs
                .map_or_else(|| "-".to_string(), format_duration),
        );
        if let Some(notes) = &batch.notes {
            println!("       notes: {notes}");
        }
    }
    Ok(())
}

async fn run_status(pool: &PgPool, batch_id: i64) -> anyhow::Result<()> {
    let batch = nugget_db::get_batch(pool, batch_id).await?;
    let report = nugget_db::get_report(pool, batch.report_id).await?;
    let items = nugget_db::list_batch_items(pool, batch_id).await?;

    println!("batch #{} ({})", batch.id, batch.public_id);
    println!("report:    {} ({} {})", report.id, report.data_month, report.locale);
    println!("status:    {}", batch.status);
    println!(
        "items:     {} total, {} completed, {} failed, {} pending",
        batch.total_items,
        batch.completed_items,
        batch.failed_items,
        batch.total_items - batch.completed_items - batch.failed_items
    );
    if let Some(duration) = batch.duration_secs {
        println!("duration:  {}", format_duration(duration));
    }
    if let Some(notes) = &batch.notes {
        println!("notes:     {notes}");
    }

    println!();
    println!("{:<12} {:<40} {:<20} {:<10}", "status", "keyword", "genre", "analysis");
    for item in &items {
        println!(
            "{:<12} {:<40} {:<20} {:<10}",
            item.status,
            item.search_term.chars().take(38).collect::<String>(),
            item.genre.chars().take(18).collect::<String>(),
            item.analysis_id
                .map_or_else(|| "-".to_string(), |id| id.to_string()),
        );
        if let Some(error) = &item.error_message {
            println!("             {error}");
        }
    }
    Ok(())
}

/// Compact progress cell for the batch listing.
fn progress_display(batch: &BatchRow) -> String {
    match batch.status.as_str() {
        "pending" => format!("0/{}", batch.total_items),
        "in_progress" => format!(
            "{}/{}",
            batch.completed_items + batch.failed_items,
            batch.total_items
        ),
        _ if batch.failed_items > 0 => {
            format!("{} ok, {} failed", batch.completed_items, batch.failed_items)
        }
        _ => format!("{} ok", batch.completed_items),
    }
}

/// Format a duration in seconds as `2h 13m 5s` / `4m 2s` / `38s`.
fn format_duration(seconds: i64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    if hours > 0 {
        format!("{hours}h {minutes}m {secs}s")
    } else if minutes > 0 {
        format!("{minutes}m {secs}s")
    } else {
        format!("{secs}s")
    }
}
