//! Single-keyword analysis: fetch ranks, enrich, merge, score.

use chrono::{DateTime, Utc};
use nugget_core::{
    days_since, rating_score, summarize, title_match_score, AnalysisSummary, CompetitionResult,
};
use serde::{Deserialize, Serialize};

use crate::client::AppStoreClient;
use crate::error::FetchError;
use crate::merge::merge_ranked;
use crate::types::RankedApp;

/// The scored analysis of one keyword, persisted as the batch artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeywordAnalysis {
    pub results: Vec<CompetitionResult>,
    /// `None` when no ranked identifier survived enrichment.
    pub summary: Option<AnalysisSummary>,
    pub omitted_count: usize,
}

/// Outcome of one analysis attempt.
///
/// `NoResults` is a successful outcome, not a failure: the storefront simply
/// has no apps for the term.
#[derive(Debug)]
pub enum AnalysisOutcome {
    NoResults,
    Analyzed(KeywordAnalysis),
}

/// Run the full pipeline for one keyword.
///
/// Exactly two network interactions happen: the ranking fetch and the
/// (chunked) metadata lookup. The merge preserves the authoritative order
/// and the top `limit` merged results are scored against the keyword.
///
/// # Errors
///
/// Propagates [`FetchError`] from either endpoint; an empty ranking is
/// reported as [`AnalysisOutcome::NoResults`], not an error.
pub async fn analyze_keyword(
    client: &AppStoreClient,
    term: &str,
    country: &str,
    lang: &str,
    limit: usize,
    now: DateTime<Utc>,
) -> Result<AnalysisOutcome, FetchError> {
    let ids = client
        .fetch_ranked_ids(term, country, lang, limit, None)
        .await?;
    if ids.is_empty() {
        tracing::info!(term, country, "storefront returned no ranked apps");
        return Ok(AnalysisOutcome::NoResults);
    }

    let metadata = client.lookup_by_ids(&ids, country, lang).await?;
    let merged = merge_ranked(&ids, &metadata);
    if !merged.omitted.is_empty() {
        tracing::warn!(
            term,
            omitted = merged.omitted_count(),
            ids = ?merged.omitted,
            "ranked identifiers missing from enrichment"
        );
    }

    let results: Vec<CompetitionResult> = merged
        .apps
        .iter()
        .map(|ranked| score_ranked_app(term, ranked, now))
        .collect();
    let summary = summarize(&results);

    Ok(AnalysisOutcome::Analyzed(KeywordAnalysis {
        results,
        summary,
        omitted_count: merged.omitted_count(),
    }))
}

/// Score one merged app against the keyword.
///
/// Missing rating or date fields degrade the corresponding score to its
/// minimum; nothing here fails.
fn score_ranked_app(term: &str, ranked: &RankedApp, now: DateTime<Utc>) -> CompetitionResult {
    let app = &ranked.app;
    let rating_count = app.user_rating_count.unwrap_or(0).max(0);
    let age_days = app.release_date.map_or(0, |d| days_since(d, now));
    let freshness_days = app
        .current_version_release_date
        .map_or(0, |d| days_since(d, now));
    #[allow(clippy::cast_precision_loss)]
    let ratings_per_day = if age_days > 0 {
        rating_count as f64 / age_days as f64
    } else {
        rating_count as f64
    };

    CompetitionResult {
        rank: ranked.rank,
        app_id: app.app_id,
        title: app.title.clone(),
        title_match_score: title_match_score(term, &app.title),
        rating_score: rating_score(app.average_user_rating, app.user_rating_count),
        rating_average: app.average_user_rating,
        rating_count,
        age_days,
        freshness_days,
        ratings_per_day,
        first_release_date: app.release_date,
    }
}
