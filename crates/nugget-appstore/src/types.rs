//! Wire types for the storefront search and lookup endpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Response envelope of the ranking endpoint.
///
/// The ordered identifier list lives in the first bubble's `results`; the
/// endpoint returns the full ranked set with no server-side limit.
#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub bubbles: Vec<Bubble>,
}

#[derive(Debug, Deserialize)]
pub struct Bubble {
    #[serde(default)]
    pub results: Vec<BubbleEntry>,
}

#[derive(Debug, Deserialize)]
pub struct BubbleEntry {
    pub id: i64,
}

/// Response envelope of the lookup endpoint. Entry order is unrelated to the
/// id order of the request, so entries are kept as raw values and parsed
/// individually — a malformed entry is skipped, not fatal.
#[derive(Debug, Deserialize)]
pub struct LookupResponse {
    #[serde(rename = "resultCount")]
    pub result_count: i64,
    #[serde(default)]
    pub results: Vec<serde_json::Value>,
}

/// Full metadata record for one app from the lookup endpoint.
///
/// `release_date` is the date of the app's **first** released version;
/// `current_version_release_date` tracks the latest update. Both are kept
/// because app age and freshness are scored separately.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppRecord {
    #[serde(rename = "trackId")]
    pub app_id: i64,
    #[serde(rename = "trackName")]
    pub title: String,
    #[serde(rename = "artistName")]
    pub developer: Option<String>,
    pub average_user_rating: Option<f64>,
    pub user_rating_count: Option<i64>,
    pub release_date: Option<DateTime<Utc>>,
    pub current_version_release_date: Option<DateTime<Utc>>,
    pub version: Option<String>,
    pub primary_genre_name: Option<String>,
    pub content_advisory_rating: Option<String>,
    /// The endpoint reports this as a decimal string.
    pub file_size_bytes: Option<String>,
    pub minimum_os_version: Option<String>,
    #[serde(rename = "languageCodesISO2A", default)]
    pub language_codes: Vec<String>,
}

/// One merged result: an app with metadata attached at its authoritative rank.
#[derive(Debug, Clone)]
pub struct RankedApp {
    /// 1-based, contiguous over kept results.
    pub rank: u32,
    pub app: AppRecord,
}
