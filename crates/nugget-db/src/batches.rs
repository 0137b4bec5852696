//! Database operations for the `batches` and `batch_items` tables.
//!
//! Status transitions are guarded in SQL: every update names the status it
//! expects to leave, and zero affected rows surfaces as
//! [`DbError::InvalidBatchTransition`] instead of silently rewriting a
//! terminal state.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `batches` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct BatchRow {
    pub id: i64,
    pub public_id: Uuid,
    pub report_id: i64,
    pub status: String,
    pub total_items: i32,
    pub completed_items: i32,
    pub failed_items: i32,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_secs: Option<i64>,
}

/// A row from the `batch_items` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct BatchItemRow {
    pub id: i64,
    pub batch_id: i64,
    pub keyword_id: i64,
    pub search_term: String,
    pub country: String,
    pub genre: String,
    pub status: String,
    pub analysis_id: Option<i64>,
    pub processed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
}

/// One resolved selection entry for batch creation.
#[derive(Debug, Clone)]
pub struct NewBatchItem {
    pub keyword_id: i64,
    pub search_term: String,
    pub country: String,
    pub genre: String,
}

const BATCH_COLUMNS: &str = "id, public_id, report_id, status, total_items, completed_items, \
     failed_items, notes, created_at, started_at, completed_at, duration_secs";

const ITEM_COLUMNS: &str = "id, batch_id, keyword_id, search_term, country, genre, status, \
     analysis_id, processed_at, error_message";

// ---------------------------------------------------------------------------
// Batch operations
// ---------------------------------------------------------------------------

/// Creates a `pending` batch with its items in one transaction.
///
/// `total_items` is fixed to the number of resolved items, not the size of
/// the original selection.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any insert fails; nothing is left behind on
/// failure.
pub async fn create_batch(
    pool: &PgPool,
    report_id: i64,
    items: &[NewBatchItem],
    notes: Option<&str>,
) -> Result<BatchRow, DbError> {
    let public_id = Uuid::new_v4();
    let total = i32::try_from(items.len()).unwrap_or(i32::MAX);

    let mut tx = pool.begin().await?;

    let batch = sqlx::query_as::<_, BatchRow>(&format!(
        "INSERT INTO batches (public_id, report_id, status, total_items, notes) \
         VALUES ($1, $2, 'pending', $3, $4) \
         RETURNING {BATCH_COLUMNS}"
    ))
    .bind(public_id)
    .bind(report_id)
    .bind(total)
    .bind(notes)
    .fetch_one(&mut *tx)
    .await?;

    for item in items {
        sqlx::query(
            "INSERT INTO batch_items \
                 (batch_id, keyword_id, search_term, country, genre, status) \
             VALUES ($1, $2, $3, $4, $5, 'pending')",
        )
        .bind(batch.id)
        .bind(item.keyword_id)
        .bind(&item.search_term)
        .bind(&item.country)
        .bind(&item.genre)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(batch)
}

/// Fetches a single batch by id.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row exists with the given `id`, or
/// [`DbError::Sqlx`] if the query fails.
pub async fn get_batch(pool: &PgPool, id: i64) -> Result<BatchRow, DbError> {
    let row = sqlx::query_as::<_, BatchRow>(&format!(
        "SELECT {BATCH_COLUMNS} FROM batches WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)?;

    Ok(row)
}

/// Returns the most recent `limit` batches, optionally filtered by status.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_batches(
    pool: &PgPool,
    limit: i64,
    status_filter: Option<&str>,
) -> Result<Vec<BatchRow>, DbError> {
    let rows = match status_filter {
        Some(status) => {
            sqlx::query_as::<_, BatchRow>(&format!(
                "SELECT {BATCH_COLUMNS} FROM batches \
                 WHERE status = $1 \
                 ORDER BY created_at DESC, id DESC \
                 LIMIT $2"
            ))
            .bind(status)
            .bind(limit)
            .fetch_all(pool)
            .await?
        }
        None => {
            sqlx::query_as::<_, BatchRow>(&format!(
                "SELECT {BATCH_COLUMNS} FROM batches \
                 ORDER BY created_at DESC, id DESC \
                 LIMIT $1"
            ))
            .bind(limit)
            .fetch_all(pool)
            .await?
        }
    };

    Ok(rows)
}

/// Marks a batch `in_progress`, setting `started_at` only on the first start
/// so a resumed batch keeps its original start time.
///
/// # Errors
///
/// Returns [`DbError::InvalidBatchTransition`] when the batch is already in
/// a terminal state, or [`DbError::Sqlx`] if the update fails.
pub async fn start_batch(pool: &PgPool, id: i64) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE batches \
         SET status = 'in_progress', started_at = COALESCE(started_at, NOW()) \
         WHERE id = $1 AND status IN ('pending', 'in_progress')",
    )
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidBatchTransition {
            id,
            expected_status: "pending or in_progress",
        });
    }
    Ok(())
}

/// Recomputes the batch's completed/failed counters from its items.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn refresh_batch_counters(pool: &PgPool, id: i64) -> Result<(), DbError> {
    sqlx::query(
        "UPDATE batches SET \
             completed_items = (SELECT COUNT(*) FROM batch_items \
                                WHERE batch_id = $1 AND status = 'completed'), \
             failed_items    = (SELECT COUNT(*) FROM batch_items \
                                WHERE batch_id = $1 AND status = 'failed') \
         WHERE id = $1",
    )
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Moves an `in_progress` batch to its terminal status.
///
/// The batch completes only when every item completed and none failed;
/// otherwise it is marked failed (fail-soft: item processing has already run
/// to the end by the time this is called). Sets `completed_at` and the
/// elapsed `duration_secs`.
///
/// # Errors
///
/// Returns [`DbError::InvalidBatchTransition`] when the batch is not
/// `in_progress`, or [`DbError::Sqlx`] if the update fails.
pub async fn finalize_batch(pool: &PgPool, id: i64) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE batches \
         SET status = CASE \
                 WHEN failed_items = 0 AND completed_items = total_items THEN 'completed' \
                 ELSE 'failed' \
             END, \
             completed_at = NOW(), \
             duration_secs = CAST(EXTRACT(EPOCH FROM (NOW() - started_at)) AS BIGINT) \
         WHERE id = $1 AND status = 'in_progress'",
    )
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidBatchTransition {
            id,
            expected_status: "in_progress",
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Item operations
// ---------------------------------------------------------------------------

/// Returns the next `pending` item of a batch in creation order.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn next_pending_item(pool: &PgPool, batch_id: i64) -> Result<Option<BatchItemRow>, DbError> {
    let row = sqlx::query_as::<_, BatchItemRow>(&format!(
        "SELECT {ITEM_COLUMNS} FROM batch_items \
         WHERE batch_id = $1 AND status = 'pending' \
         ORDER BY id \
         LIMIT 1"
    ))
    .bind(batch_id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Counts items of a batch still waiting to be processed.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn count_pending_items(pool: &PgPool, batch_id: i64) -> Result<i64, DbError> {
    let count = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM batch_items WHERE batch_id = $1 AND status = 'pending'",
    )
    .bind(batch_id)
    .fetch_one(pool)
    .await?;
    Ok(count)
}

/// Marks a `pending` item as `in_progress`.
///
/// # Errors
///
/// Returns [`DbError::InvalidBatchTransition`] when the item is not pending,
/// or [`DbError::Sqlx`] if the update fails.
pub async fn mark_item_in_progress(pool: &PgPool, item_id: i64) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE batch_items SET status = 'in_progress' \
         WHERE id = $1 AND status = 'pending'",
    )
    .bind(item_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidBatchTransition {
            id: item_id,
            expected_status: "pending",
        });
    }
    Ok(())
}

/// Marks an `in_progress` item `completed`.
///
/// `analysis_id` is `None` for the no-apps-found outcome, in which case
/// `message` explains the empty result; the status is still `completed`.
///
/// # Errors
///
/// Returns [`DbError::InvalidBatchTransition`] when the item is not
/// in progress, or [`DbError::Sqlx`] if the update fails.
pub async fn complete_item(
    pool: &PgPool,
    item_id: i64,
    analysis_id: Option<i64>,
    message: Option<&str>,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE batch_items \
         SET status = 'completed', analysis_id = $1, processed_at = NOW(), error_message = $2 \
         WHERE id = $3 AND status = 'in_progress'",
    )
    .bind(analysis_id)
    .bind(message)
    .bind(item_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidBatchTransition {
            id: item_id,
            expected_status: "in_progress",
        });
    }
    Ok(())
}

/// Marks an `in_progress` item `failed` with an error message.
///
/// # Errors
///
/// Returns [`DbError::InvalidBatchTransition`] when the item is not
/// in progress, or [`DbError::Sqlx`] if the update fails.
pub async fn fail_item(pool: &PgPool, item_id: i64, error_message: &str) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE batch_items \
         SET status = 'failed', processed_at = NOW(), error_message = $1 \
         WHERE id = $2 AND status = 'in_progress'",
    )
    .bind(error_message)
    .bind(item_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidBatchTransition {
            id: item_id,
            expected_status: "in_progress",
        });
    }
    Ok(())
}

/// Resets items stranded `in_progress` by an abnormal termination back to
/// `pending`. Terminal statuses are never touched. Returns the number of
/// items reset.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn reset_stale_items(pool: &PgPool, batch_id: i64) -> Result<u64, DbError> {
    let result = sqlx::query(
        "UPDATE batch_items SET status = 'pending' \
         WHERE batch_id = $1 AND status = 'in_progress'",
    )
    .bind(batch_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

/// Returns all items of a batch, failures first, then by insertion order.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_batch_items(pool: &PgPool, batch_id: i64) -> Result<Vec<BatchItemRow>, DbError> {
    let rows = sqlx::query_as::<_, BatchItemRow>(&format!(
        "SELECT {ITEM_COLUMNS} FROM batch_items \
         WHERE batch_id = $1 \
         ORDER BY CASE status \
             WHEN 'failed' THEN 1 \
             WHEN 'in_progress' THEN 2 \
             WHEN 'pending' THEN 3 \
             WHEN 'completed' THEN 4 \
         END, id"
    ))
    .bind(batch_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
