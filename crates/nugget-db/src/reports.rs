//! Database operations for the `reports` and `keywords` tables at import time.

use chrono::{DateTime, Utc};
use nugget_core::KeywordScores;
use sqlx::PgPool;

use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `reports` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ReportRow {
    pub id: i64,
    pub source_id: String,
    pub generated_at: DateTime<Utc>,
    pub data_month: String,
    pub locale: String,
    pub month_locale_key: String,
    pub source_filename: Option<String>,
    pub total_keywords: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Metadata of one report snapshot, parsed by the ingestion boundary.
#[derive(Debug, Clone)]
pub struct ReportMeta {
    pub source_id: String,
    pub generated_at: DateTime<Utc>,
    pub data_month: String,
    pub locale: String,
    pub source_filename: Option<String>,
}

impl ReportMeta {
    /// Derived key used for the single-active-report invariant.
    #[must_use]
    pub fn month_locale_key(&self) -> String {
        format!("{}_{}", self.data_month, self.locale)
    }
}

/// One validated, scored keyword row ready for insertion.
#[derive(Debug, Clone)]
pub struct NewKeywordRow {
    pub country: String,
    pub genre: String,
    pub search_term: String,
    pub rank_in_genre: i32,
    pub popularity_genre: i32,
    pub popularity_overall: i32,
    pub scores: KeywordScores,
}

/// Result of an import call.
#[derive(Debug, Clone, Copy)]
pub struct ImportOutcome {
    pub report_id: i64,
    /// `false` when the (source id, generated-at) pair was already present
    /// and the import was a no-op.
    pub created: bool,
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

/// Import one report snapshot with its keyword rows, idempotently.
///
/// A (source id, generated-at) pair already present is a no-op. Otherwise the
/// report insert, the bulk keyword insert, and the deactivation of prior
/// reports sharing the month+locale key all happen in one transaction, so a
/// partially imported report is never visible as active.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any statement fails; integrity violations
/// (unique, foreign key) propagate to the caller unmodified.
pub async fn import_report(
    pool: &PgPool,
    meta: &ReportMeta,
    rows: &[NewKeywordRow],
) -> Result<ImportOutcome, DbError> {
    if let Some(existing) = sqlx::query_scalar::<_, i64>(
        "SELECT id FROM reports WHERE source_id = $1 AND generated_at = $2",
    )
    .bind(&meta.source_id)
    .bind(meta.generated_at)
    .fetch_optional(pool)
    .await?
    {
        return Ok(ImportOutcome {
            report_id: existing,
            created: false,
        });
    }

    let month_locale_key = meta.month_locale_key();
    let mut tx = pool.begin().await?;

    sqlx::query("UPDATE reports SET is_active = FALSE WHERE month_locale_key = $1")
        .bind(&month_locale_key)
        .execute(&mut *tx)
        .await?;

    let total = i32::try_from(rows.len()).unwrap_or(i32::MAX);
    let report_id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO reports \
             (source_id, generated_at, data_month, locale, month_locale_key, \
              source_filename, total_keywords, is_active) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, TRUE) \
         RETURNING id",
    )
    .bind(&meta.source_id)
    .bind(meta.generated_at)
    .bind(&meta.data_month)
    .bind(&meta.locale)
    .bind(&month_locale_key)
    .bind(meta.source_filename.as_deref())
    .bind(total)
    .fetch_one(&mut *tx)
    .await?;

    for row in rows {
        sqlx::query(
            "INSERT INTO keywords \
                 (report_id, country, genre, search_term, rank_in_genre, \
                  popularity_genre, popularity_overall, \
                  score_rank, score_genre, score_overall, total_score) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(report_id)
        .bind(&row.country)
        .bind(&row.genre)
        .bind(&row.search_term)
        .bind(row.rank_in_genre)
        .bind(row.popularity_genre)
        .bind(row.popularity_overall)
        .bind(i16::from(row.scores.rank))
        .bind(i16::from(row.scores.genre))
        .bind(i16::from(row.scores.overall))
        .bind(i16::from(row.scores.total))
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    Ok(ImportOutcome {
        report_id,
        created: true,
    })
}

/// Fetches a single report by id.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row exists with the given `id`, or
/// [`DbError::Sqlx`] if the query fails.
pub async fn get_report(pool: &PgPool, id: i64) -> Result<ReportRow, DbError> {
    let row = sqlx::query_as::<_, ReportRow>(
        "SELECT id, source_id, generated_at, data_month, locale, month_locale_key, \
                source_filename, total_keywords, is_active, created_at \
         FROM reports WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)?;

    Ok(row)
}

/// Returns the most recent `limit` reports, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_reports(pool: &PgPool, limit: i64) -> Result<Vec<ReportRow>, DbError> {
    let rows = sqlx::query_as::<_, ReportRow>(
        "SELECT id, source_id, generated_at, data_month, locale, month_locale_key, \
                source_filename, total_keywords, is_active, created_at \
         FROM reports \
         ORDER BY generated_at DESC, id DESC \
         LIMIT $1",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Finds the active report for a data month that has keywords for `country`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn find_active_report_for(
    pool: &PgPool,
    data_month: &str,
    country: &str,
) -> Result<Option<ReportRow>, DbError> {
    let row = sqlx::query_as::<_, ReportRow>(
        "SELECT DISTINCT r.id, r.source_id, r.generated_at, r.data_month, r.locale, \
                r.month_locale_key, r.source_filename, r.total_keywords, r.is_active, \
                r.created_at \
         FROM reports r \
         JOIN keywords k ON k.report_id = r.id \
         WHERE r.data_month = $1 AND r.is_active = TRUE AND k.country = $2 \
         ORDER BY r.generated_at DESC \
         LIMIT 1",
    )
    .bind(data_month)
    .bind(country)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}
