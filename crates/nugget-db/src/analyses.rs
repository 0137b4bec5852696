//! Database operations for the `keyword_analyses` artifact table.

use chrono::{DateTime, Utc};
use nugget_core::{AnalysisSummary, CompetitionResult};
use sqlx::types::Json;
use sqlx::PgPool;

use crate::DbError;

/// A row from the `keyword_analyses` table.
#[derive(Debug, sqlx::FromRow)]
pub struct AnalysisRow {
    pub id: i64,
    pub search_term: String,
    pub country: String,
    pub analyzed_at: DateTime<Utc>,
    pub result_count: i32,
    pub omitted_count: i32,
    pub summary: Json<Option<AnalysisSummary>>,
    pub results: Json<Vec<CompetitionResult>>,
}

/// Persist one keyword's scored analysis and return the new row id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn insert_analysis(
    pool: &PgPool,
    search_term: &str,
    country: &str,
    results: &[CompetitionResult],
    summary: Option<&AnalysisSummary>,
    omitted_count: usize,
) -> Result<i64, DbError> {
    let result_count = i32::try_from(results.len()).unwrap_or(i32::MAX);
    let omitted = i32::try_from(omitted_count).unwrap_or(i32::MAX);

    let id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO keyword_analyses \
             (search_term, country, result_count, omitted_count, summary, results) \
         VALUES ($1, $2, $3, $4, $5, $6) \
         RETURNING id",
    )
    .bind(search_term)
    .bind(country)
    .bind(result_count)
    .bind(omitted)
    .bind(Json(summary))
    .bind(Json(results))
    .fetch_one(pool)
    .await?;

    Ok(id)
}

/// Fetches one stored analysis by id.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row exists with the given `id`, or
/// [`DbError::Sqlx`] if the query fails.
pub async fn get_analysis(pool: &PgPool, id: i64) -> Result<AnalysisRow, DbError> {
    let row = sqlx::query_as::<_, AnalysisRow>(
        "SELECT id, search_term, country, analyzed_at, result_count, omitted_count, \
                summary, results \
         FROM keyword_analyses WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)?;

    Ok(row)
}
