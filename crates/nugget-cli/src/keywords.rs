//! Read-only report and keyword queries.

use sqlx::PgPool;

/// Run the `reports` command: list imported report snapshots, newest first.
pub async fn run_reports(pool: &PgPool, limit: i64) -> anyhow::Result<()> {
    let reports = nugget_db::list_reports(pool, limit).await?;
    if reports.is_empty() {
        println!("no reports imported yet");
        return Ok(());
    }

    println!(
        "{:<5} {:<16} {:<10} {:<8} {:>9} {:<7}",
        "id", "source", "month", "locale", "keywords", "active"
    );
    for report in &reports {
        println!(
            "{:<5} {:<16} {:<10} {:<8} {:>9} {:<7}",
            report.id,
            truncate(&report.source_id, 14),
            report.data_month,
            report.locale,
            report.total_keywords,
            if report.is_active { "yes" } else { "" },
        );
    }
    Ok(())
}

/// Run the `keywords` command: print the best-scoring keywords of the
/// active report for one month and country.
pub async fn run_keywords(
    pool: &PgPool,
    month: &str,
    country: &str,
    min_score: i16,
    limit: i64,
) -> anyhow::Result<()> {
    let report = nugget_db::find_active_report_for(pool, month, country)
        .await?
        .ok_or_else(|| {
            anyhow::anyhow!(
                "no active report for month={month}, country={country}; import a report first"
            )
        })?;

    let rows = nugget_db::list_top_keywords(pool, report.id, country, min_score, limit).await?;
    if rows.is_empty() {
        println!("no keywords with score >= {min_score} in report {}", report.id);
        return Ok(());
    }

    println!(
        "report {} ({} {}), {} keyword(s):",
        report.id, report.data_month, report.locale, rows.len()
    );
    println!("{:<5} {:<40} {:<24} {:>5} {:>5} {:>5} {:>5}", "score", "search term", "genre", "rank", "r", "g", "o");
    for kw in &rows {
        println!(
            "{:<5} {:<40} {:<24} {:>5} {:>5} {:>5} {:>5}",
            kw.total_score,
            truncate(&kw.search_term, 38),
            truncate(&kw.genre, 22),
            kw.rank_in_genre,
            kw.score_rank,
            kw.score_genre,
            kw.score_overall,
        );
    }
    Ok(())
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_owned()
    } else {
        s.chars().take(max_chars).collect()
    }
}
