//! Read-side queries over scored keyword rows.

use sqlx::PgPool;

use crate::DbError;

/// A row from the `keywords` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct KeywordRow {
    pub id: i64,
    pub report_id: i64,
    pub country: String,
    pub genre: String,
    pub search_term: String,
    pub rank_in_genre: i32,
    pub popularity_genre: i32,
    pub popularity_overall: i32,
    pub score_rank: i16,
    pub score_genre: i16,
    pub score_overall: i16,
    pub total_score: i16,
}

const KEYWORD_COLUMNS: &str = "id, report_id, country, genre, search_term, rank_in_genre, \
     popularity_genre, popularity_overall, score_rank, score_genre, score_overall, total_score";

/// Returns the best-scoring keywords of a report for one country.
///
/// Ordered by composite score descending; `min_score` filters out rows below
/// the floor and `limit` caps the result.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_top_keywords(
    pool: &PgPool,
    report_id: i64,
    country: &str,
    min_score: i16,
    limit: i64,
) -> Result<Vec<KeywordRow>, DbError> {
    let rows = sqlx::query_as::<_, KeywordRow>(&format!(
        "SELECT {KEYWORD_COLUMNS} \
         FROM keywords \
         WHERE report_id = $1 AND country = $2 AND total_score >= $3 \
         ORDER BY total_score DESC, search_term \
         LIMIT $4"
    ))
    .bind(report_id)
    .bind(country)
    .bind(min_score)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Resolves one keyword row by its business key inside a report.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn find_keyword(
    pool: &PgPool,
    report_id: i64,
    country: &str,
    search_term: &str,
    genre: &str,
) -> Result<Option<KeywordRow>, DbError> {
    let row = sqlx::query_as::<_, KeywordRow>(&format!(
        "SELECT {KEYWORD_COLUMNS} \
         FROM keywords \
         WHERE report_id = $1 AND country = $2 AND search_term = $3 AND genre = $4 \
         LIMIT 1"
    ))
    .bind(report_id)
    .bind(country)
    .bind(search_term)
    .bind(genre)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}
