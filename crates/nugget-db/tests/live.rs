//! Live integration tests for nugget-db using `#[sqlx::test]`.
//!
//! Each test gets a fresh, fully-migrated Postgres database spun up by the
//! sqlx test harness. The `migrations` path is relative to the crate root
//! (`crates/nugget-db/`), so `"../../migrations"` resolves to the workspace
//! migration directory.

use chrono::{TimeZone, Utc};
use nugget_core::{score_keyword, CompetitionResult};
use nugget_db::{
    complete_item, count_pending_items, create_batch, fail_item, finalize_batch,
    find_active_report_for, find_keyword, get_analysis, get_batch, import_report, insert_analysis,
    list_batch_items, list_top_keywords, mark_item_in_progress, next_pending_item,
    refresh_batch_counters, reset_stale_items, start_batch, DbError, NewBatchItem, NewKeywordRow,
    ReportMeta,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn report_meta(source_id: &str, minute: u32) -> ReportMeta {
    ReportMeta {
        source_id: source_id.to_string(),
        generated_at: Utc.with_ymd_and_hms(2025, 10, 13, 17, minute, 0).unwrap(),
        data_month: "2025-09".to_string(),
        locale: "en_US".to_string(),
        source_filename: Some("rankings.tsv".to_string()),
    }
}

fn keyword_row(term: &str, rank: i32, pop_genre: i32, pop_overall: i32) -> NewKeywordRow {
    NewKeywordRow {
        country: "United States".to_string(),
        genre: "Education".to_string(),
        search_term: term.to_string(),
        rank_in_genre: rank,
        popularity_genre: pop_genre,
        popularity_overall: pop_overall,
        scores: score_keyword(rank, pop_genre, pop_overall),
    }
}

fn sample_rows() -> Vec<NewKeywordRow> {
    vec![
        keyword_row("fish identifier", 1, 100, 100),
        keyword_row("plant identifier", 12, 70, 80),
        keyword_row("rock identifier", 40, 55, 55),
    ]
}

async fn import_sample_report(pool: &sqlx::PgPool) -> i64 {
    import_report(pool, &report_meta("93070_144880", 50), &sample_rows())
        .await
        .expect("import_report failed")
        .report_id
}

async fn resolved_items(pool: &sqlx::PgPool, report_id: i64, terms: &[&str]) -> Vec<NewBatchItem> {
    let mut items = Vec::new();
    for term in terms {
        let kw = find_keyword(pool, report_id, "United States", term, "Education")
            .await
            .expect("find_keyword failed")
            .expect("keyword should exist");
        items.push(NewBatchItem {
            keyword_id: kw.id,
            search_term: kw.search_term,
            country: kw.country,
            genre: kw.genre,
        });
    }
    items
}

fn sample_result(rank: u32, app_id: i64) -> CompetitionResult {
    CompetitionResult {
        rank,
        app_id,
        title: format!("App {app_id}"),
        title_match_score: 4,
        rating_score: 3.2,
        rating_average: Some(4.1),
        rating_count: 900,
        age_days: 700,
        freshness_days: 30,
        ratings_per_day: 1.3,
        first_release_date: None,
    }
}

// ---------------------------------------------------------------------------
// Section 1: Report import
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn import_report_is_idempotent(pool: sqlx::PgPool) {
    let meta = report_meta("93070_144880", 50);
    let rows = sample_rows();

    let first = import_report(&pool, &meta, &rows).await.expect("first import failed");
    assert!(first.created);

    let second = import_report(&pool, &meta, &rows).await.expect("second import failed");
    assert!(!second.created, "re-import must be a no-op");
    assert_eq!(second.report_id, first.report_id);

    let active: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM reports WHERE month_locale_key = '2025-09_en_US' AND is_active",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(active, 1);

    let keywords: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM keywords")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(keywords, 3, "keyword rows must not be duplicated");
}

#[sqlx::test(migrations = "../../migrations")]
async fn newer_import_supersedes_prior_report_for_same_period(pool: sqlx::PgPool) {
    let first = import_report(&pool, &report_meta("93070_144880", 50), &sample_rows())
        .await
        .expect("first import failed");
    let second = import_report(&pool, &report_meta("93070_998877", 55), &sample_rows())
        .await
        .expect("second import failed");
    assert!(second.created);

    let active_ids: Vec<i64> = sqlx::query_scalar(
        "SELECT id FROM reports WHERE month_locale_key = '2025-09_en_US' AND is_active",
    )
    .fetch_all(&pool)
    .await
    .unwrap();
    assert_eq!(active_ids, vec![second.report_id]);

    let superseded = nugget_db::get_report(&pool, first.report_id).await.unwrap();
    assert!(!superseded.is_active);
}

#[sqlx::test(migrations = "../../migrations")]
async fn active_report_resolves_by_month_and_country(pool: sqlx::PgPool) {
    let report_id = import_sample_report(&pool).await;

    let found = find_active_report_for(&pool, "2025-09", "United States")
        .await
        .expect("query failed")
        .expect("active report should exist");
    assert_eq!(found.id, report_id);

    let missing = find_active_report_for(&pool, "2025-09", "Japan")
        .await
        .expect("query failed");
    assert!(missing.is_none(), "no keywords for that country");
}

#[sqlx::test(migrations = "../../migrations")]
async fn deleting_a_report_cascades_to_its_keywords(pool: sqlx::PgPool) {
    let report_id = import_sample_report(&pool).await;

    sqlx::query("DELETE FROM reports WHERE id = $1")
        .bind(report_id)
        .execute(&pool)
        .await
        .unwrap();

    let keywords: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM keywords")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(keywords, 0);
}

#[sqlx::test(migrations = "../../migrations")]
async fn top_keywords_are_ordered_by_composite_score(pool: sqlx::PgPool) {
    let report_id = import_sample_report(&pool).await;

    let top = list_top_keywords(&pool, report_id, "United States", 0, 10)
        .await
        .expect("query failed");
    let terms: Vec<&str> = top.iter().map(|k| k.search_term.as_str()).collect();
    assert_eq!(terms, vec!["fish identifier", "plant identifier", "rock identifier"]);
    assert_eq!(top[0].total_score, 11);

    let floored = list_top_keywords(&pool, report_id, "United States", 5, 10)
        .await
        .expect("query failed");
    assert_eq!(floored.len(), 2, "score floor should exclude the weakest row");
}

// ---------------------------------------------------------------------------
// Section 2: Batch lifecycle
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn batch_completes_when_every_item_completes(pool: sqlx::PgPool) {
    let report_id = import_sample_report(&pool).await;
    let items = resolved_items(&pool, report_id, &["fish identifier", "plant identifier"]).await;
    let batch = create_batch(&pool, report_id, &items, Some("smoke"))
        .await
        .expect("create_batch failed");

    assert_eq!(batch.status, "pending");
    assert_eq!(batch.total_items, 2);

    start_batch(&pool, batch.id).await.expect("start_batch failed");

    while let Some(item) = next_pending_item(&pool, batch.id).await.expect("next failed") {
        mark_item_in_progress(&pool, item.id).await.expect("mark failed");
        let analysis_id = insert_analysis(
            &pool,
            &item.search_term,
            &item.country,
            &[sample_result(1, 42)],
            None,
            0,
        )
        .await
        .expect("insert_analysis failed");
        complete_item(&pool, item.id, Some(analysis_id), None)
            .await
            .expect("complete_item failed");
        refresh_batch_counters(&pool, batch.id).await.expect("refresh failed");
    }

    finalize_batch(&pool, batch.id).await.expect("finalize failed");

    let finished = get_batch(&pool, batch.id).await.unwrap();
    assert_eq!(finished.status, "completed");
    assert_eq!(finished.completed_items, 2);
    assert_eq!(finished.failed_items, 0);
    assert!(finished.started_at.is_some());
    assert!(finished.completed_at.is_some());
    assert!(finished.duration_secs.is_some());
}

#[sqlx::test(migrations = "../../migrations")]
async fn one_failed_item_fails_the_batch_but_not_the_rest(pool: sqlx::PgPool) {
    let report_id = import_sample_report(&pool).await;
    let items = resolved_items(&pool, report_id, &["fish identifier", "plant identifier"]).await;
    let batch = create_batch(&pool, report_id, &items, None).await.unwrap();
    start_batch(&pool, batch.id).await.unwrap();

    let first = next_pending_item(&pool, batch.id).await.unwrap().unwrap();
    mark_item_in_progress(&pool, first.id).await.unwrap();
    fail_item(&pool, first.id, "HTTP error: connection reset").await.unwrap();
    refresh_batch_counters(&pool, batch.id).await.unwrap();

    // Fail-soft: the remaining item still processes to completion.
    let second = next_pending_item(&pool, batch.id).await.unwrap().unwrap();
    assert_ne!(second.id, first.id);
    mark_item_in_progress(&pool, second.id).await.unwrap();
    complete_item(&pool, second.id, None, Some("no apps found")).await.unwrap();
    refresh_batch_counters(&pool, batch.id).await.unwrap();

    finalize_batch(&pool, batch.id).await.unwrap();

    let finished = get_batch(&pool, batch.id).await.unwrap();
    assert_eq!(finished.status, "failed");
    assert_eq!(finished.completed_items, 1);
    assert_eq!(finished.failed_items, 1);
    assert!(finished.completed_items + finished.failed_items <= finished.total_items);

    let rows = list_batch_items(&pool, batch.id).await.unwrap();
    assert_eq!(rows[0].status, "failed", "failures sort first in the listing");
}

#[sqlx::test(migrations = "../../migrations")]
async fn no_results_item_completes_with_null_analysis_reference(pool: sqlx::PgPool) {
    let report_id = import_sample_report(&pool).await;
    let items = resolved_items(&pool, report_id, &["rock identifier"]).await;
    let batch = create_batch(&pool, report_id, &items, None).await.unwrap();
    start_batch(&pool, batch.id).await.unwrap();

    let item = next_pending_item(&pool, batch.id).await.unwrap().unwrap();
    mark_item_in_progress(&pool, item.id).await.unwrap();
    complete_item(&pool, item.id, None, Some("no apps found")).await.unwrap();
    refresh_batch_counters(&pool, batch.id).await.unwrap();
    finalize_batch(&pool, batch.id).await.unwrap();

    let rows = list_batch_items(&pool, batch.id).await.unwrap();
    assert_eq!(rows[0].status, "completed");
    assert!(rows[0].analysis_id.is_none());
    assert_eq!(rows[0].error_message.as_deref(), Some("no apps found"));

    let finished = get_batch(&pool, batch.id).await.unwrap();
    assert_eq!(finished.status, "completed");
}

#[sqlx::test(migrations = "../../migrations")]
async fn stale_in_progress_items_reset_to_pending(pool: sqlx::PgPool) {
    let report_id = import_sample_report(&pool).await;
    let items =
        resolved_items(&pool, report_id, &["fish identifier", "plant identifier", "rock identifier"])
            .await;
    let batch = create_batch(&pool, report_id, &items, None).await.unwrap();
    start_batch(&pool, batch.id).await.unwrap();

    // Simulate a crash: one item in flight, one already terminal.
    let first = next_pending_item(&pool, batch.id).await.unwrap().unwrap();
    mark_item_in_progress(&pool, first.id).await.unwrap();
    let second = next_pending_item(&pool, batch.id).await.unwrap().unwrap();
    mark_item_in_progress(&pool, second.id).await.unwrap();
    complete_item(&pool, second.id, None, Some("no apps found")).await.unwrap();

    let reset = reset_stale_items(&pool, batch.id).await.unwrap();
    assert_eq!(reset, 1, "only the stranded item is reset");

    assert_eq!(count_pending_items(&pool, batch.id).await.unwrap(), 2);
    let rows = list_batch_items(&pool, batch.id).await.unwrap();
    let completed: Vec<_> = rows.iter().filter(|r| r.status == "completed").collect();
    assert_eq!(completed.len(), 1, "terminal statuses are never touched");
}

#[sqlx::test(migrations = "../../migrations")]
async fn terminal_item_statuses_are_permanent(pool: sqlx::PgPool) {
    let report_id = import_sample_report(&pool).await;
    let items = resolved_items(&pool, report_id, &["fish identifier"]).await;
    let batch = create_batch(&pool, report_id, &items, None).await.unwrap();
    start_batch(&pool, batch.id).await.unwrap();

    let item = next_pending_item(&pool, batch.id).await.unwrap().unwrap();

    // Completing an item that was never marked in_progress is rejected.
    let premature = complete_item(&pool, item.id, None, None).await;
    assert!(matches!(premature, Err(DbError::InvalidBatchTransition { .. })));

    mark_item_in_progress(&pool, item.id).await.unwrap();
    complete_item(&pool, item.id, None, Some("no apps found")).await.unwrap();

    // A terminal item cannot transition again.
    let again = fail_item(&pool, item.id, "late failure").await;
    assert!(matches!(again, Err(DbError::InvalidBatchTransition { .. })));

    let re_mark = mark_item_in_progress(&pool, item.id).await;
    assert!(matches!(re_mark, Err(DbError::InvalidBatchTransition { .. })));
}

#[sqlx::test(migrations = "../../migrations")]
async fn finalize_requires_in_progress_batch(pool: sqlx::PgPool) {
    let report_id = import_sample_report(&pool).await;
    let items = resolved_items(&pool, report_id, &["fish identifier"]).await;
    let batch = create_batch(&pool, report_id, &items, None).await.unwrap();

    let premature = finalize_batch(&pool, batch.id).await;
    assert!(matches!(premature, Err(DbError::InvalidBatchTransition { .. })));
}

// ---------------------------------------------------------------------------
// Section 3: Analysis artifacts
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn analysis_round_trips_results_and_summary(pool: sqlx::PgPool) {
    let results = vec![sample_result(1, 222), sample_result(2, 333)];
    let summary = nugget_core::summarize(&results);

    let id = insert_analysis(
        &pool,
        "fish identifier",
        "US",
        &results,
        summary.as_ref(),
        1,
    )
    .await
    .expect("insert_analysis failed");

    let row = get_analysis(&pool, id).await.expect("get_analysis failed");
    assert_eq!(row.search_term, "fish identifier");
    assert_eq!(row.result_count, 2);
    assert_eq!(row.omitted_count, 1);
    assert_eq!(row.results.0.len(), 2);
    assert_eq!(row.results.0[0].app_id, 222);
    assert_eq!(row.results.0[0].rank, 1);
    let stored_summary = row.summary.0.expect("summary should round-trip");
    assert!((stored_summary.avg_title_match - 4.0).abs() < f64::EPSILON);
}

#[sqlx::test(migrations = "../../migrations")]
async fn analysis_with_no_survivors_stores_null_summary(pool: sqlx::PgPool) {
    let id = insert_analysis(&pool, "zqxjkwv", "US", &[], None, 3)
        .await
        .expect("insert_analysis failed");

    let row = get_analysis(&pool, id).await.unwrap();
    assert_eq!(row.result_count, 0);
    assert_eq!(row.omitted_count, 3);
    assert!(row.results.0.is_empty());
    assert!(row.summary.0.is_none());
}
