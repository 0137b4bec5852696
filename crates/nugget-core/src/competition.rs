//! Competitive-strength scoring for ranked search results.
//!
//! Every function here is pure: the inputs are a keyword, the metadata fields
//! of one app, or a finished result set. Missing rating data degrades the
//! score to its minimum instead of failing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Rating count at which the saturating rating score reaches half strength.
const RATING_COUNT_MIDPOINT: f64 = 500.0;

/// Daily rating volume at which the traffic signal reaches half strength.
const RATINGS_PER_DAY_MIDPOINT: f64 = 50.0;

/// Market age (days) at which the maturity signal reaches half strength.
const MARKET_AGE_MIDPOINT_DAYS: f64 = 365.0;

/// The scored view of one ranked app, persisted as the analysis artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompetitionResult {
    /// 1-based rank in the authoritative search order.
    pub rank: u32,
    pub app_id: i64,
    pub title: String,
    /// 0–5 tiered keyword-in-title match, see [`title_match_score`].
    pub title_match_score: u8,
    /// 0–5 saturating blend of rating count and average, see [`rating_score`].
    pub rating_score: f64,
    pub rating_average: Option<f64>,
    pub rating_count: i64,
    /// Days since the app's first released version.
    pub age_days: i64,
    /// Days since the current version shipped.
    pub freshness_days: i64,
    pub ratings_per_day: f64,
    pub first_release_date: Option<DateTime<Utc>>,
}

/// Aggregate statistics over one keyword's scored result set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisSummary {
    pub avg_rating: f64,
    pub avg_rating_count: f64,
    pub avg_title_match: f64,
    pub avg_age_days: f64,
    pub median_age_days: i64,
    pub avg_freshness_days: f64,
    pub avg_ratings_per_day: f64,
    /// 0–100 blended competition-strength estimate for the keyword.
    pub competitiveness: f64,
}

/// Tiered keyword-in-title match score, 0–5.
///
/// Tier 5 requires every keyword word to appear in the title in order with
/// only whitespace between them; unrelated leading or trailing text does not
/// matter. The lower tiers degrade monotonically: 4 = all words in order but
/// interrupted, 3 = all words present out of order, 2 = more than half
/// present, 1 = at least one present, 0 = none. Matching is case-insensitive
/// on alphanumeric word tokens.
#[must_use]
pub fn title_match_score(keyword: &str, title: &str) -> u8 {
    let kw_tokens = tokenize(keyword);
    if kw_tokens.is_empty() {
        return 0;
    }
    let title_tokens = tokenize(title);

    if has_adjacent_phrase(&kw_tokens, &title_tokens, title) {
        return 5;
    }
    if is_ordered_subsequence(&kw_tokens, &title_tokens) {
        return 4;
    }

    let mut kw_words: Vec<&str> = kw_tokens.iter().map(|t| t.word.as_str()).collect();
    kw_words.sort_unstable();
    kw_words.dedup();

    let present = kw_words
        .iter()
        .filter(|w| title_tokens.iter().any(|t| t.word == **w))
        .count();

    if present == kw_words.len() {
        3
    } else if present * 2 > kw_words.len() {
        2
    } else if present > 0 {
        1
    } else {
        0
    }
}

/// Saturating popularity/velocity score, 0–5.
///
/// The rating count saturates around [`RATING_COUNT_MIDPOINT`] and scales the
/// average rating, so an app with a 5.0 average from 3 reviews scores far
/// below one with a 4.5 average from 50k reviews. Missing fields yield 0.0.
#[must_use]
pub fn rating_score(average: Option<f64>, count: Option<i64>) -> f64 {
    let average = average.unwrap_or(0.0).clamp(0.0, 5.0);
    #[allow(clippy::cast_precision_loss)]
    let count = count.unwrap_or(0).max(0) as f64;
    average * (count / (count + RATING_COUNT_MIDPOINT))
}

/// Whole days elapsed from `date` to `now`, clamped at zero.
#[must_use]
pub fn days_since(date: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (now - date).num_days().max(0)
}

/// Aggregate a scored result set into an [`AnalysisSummary`].
///
/// Returns `None` for an empty set — a keyword with no scored results has no
/// meaningful competition statistics.
#[must_use]
pub fn summarize(results: &[CompetitionResult]) -> Option<AnalysisSummary> {
    if results.is_empty() {
        return None;
    }
    #[allow(clippy::cast_precision_loss)]
    let n = results.len() as f64;

    let mut sum_rating = 0.0;
    let mut sum_rating_count = 0.0;
    let mut sum_title_match = 0.0;
    let mut sum_age = 0.0;
    let mut sum_freshness = 0.0;
    let mut sum_ratings_per_day = 0.0;

    #[allow(clippy::cast_precision_loss)]
    for r in results {
        sum_rating += r.rating_average.unwrap_or(0.0);
        sum_rating_count += r.rating_count as f64;
        sum_title_match += f64::from(r.title_match_score);
        sum_age += r.age_days as f64;
        sum_freshness += r.freshness_days as f64;
        sum_ratings_per_day += r.ratings_per_day;
    }

    let avg_rating = sum_rating / n;
    let avg_rating_count = sum_rating_count / n;
    let avg_title_match = sum_title_match / n;
    let avg_age_days = sum_age / n;
    let avg_freshness_days = sum_freshness / n;
    let avg_ratings_per_day = sum_ratings_per_day / n;

    let median_age_days = median(results.iter().map(|r| r.age_days).collect());

    let competitiveness =
        competitiveness(avg_title_match, avg_ratings_per_day, median_age_days);

    Some(AnalysisSummary {
        avg_rating,
        avg_rating_count,
        avg_title_match,
        avg_age_days,
        median_age_days,
        avg_freshness_days,
        avg_ratings_per_day,
        competitiveness,
    })
}

/// Blended 0–100 competition-strength estimate.
///
/// 40% keyword presence in competitor titles, 40% saturating daily rating
/// traffic, 20% market maturity (older incumbents are harder to displace).
fn competitiveness(avg_title_match: f64, avg_ratings_per_day: f64, median_age_days: i64) -> f64 {
    let title_pct = avg_title_match / 5.0 * 100.0;
    let traffic_pct =
        100.0 * (avg_ratings_per_day / (avg_ratings_per_day + RATINGS_PER_DAY_MIDPOINT));
    #[allow(clippy::cast_precision_loss)]
    let age = median_age_days.max(0) as f64;
    let maturity_pct = 100.0 * (age / (age + MARKET_AGE_MIDPOINT_DAYS));

    (0.4 * title_pct + 0.4 * traffic_pct + 0.2 * maturity_pct).clamp(0.0, 100.0)
}

fn median(mut values: Vec<i64>) -> i64 {
    values.sort_unstable();
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2
    } else {
        values[mid]
    }
}

/// One alphanumeric word token with its byte span in the source text.
struct Token {
    start: usize,
    end: usize,
    word: String,
}

/// Split `text` into lowercase alphanumeric word tokens, keeping byte spans
/// so separator content between adjacent tokens can be inspected.
fn tokenize(text: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut current: Option<(usize, String)> = None;

    for (idx, ch) in text.char_indices() {
        if ch.is_alphanumeric() {
            match &mut current {
                Some((_, word)) => word.extend(ch.to_lowercase()),
                None => {
                    let mut word = String::new();
                    word.extend(ch.to_lowercase());
                    current = Some((idx, word));
                }
            }
        } else if let Some((start, word)) = current.take() {
            tokens.push(Token {
                start,
                end: idx,
                word,
            });
        }
    }
    if let Some((start, word)) = current.take() {
        tokens.push(Token {
            start,
            end: text.len(),
            word,
        });
    }
    tokens
}

/// True when the keyword tokens appear as a contiguous run of title tokens
/// with whitespace-only separators between them in the raw title.
fn has_adjacent_phrase(kw: &[Token], title: &[Token], raw_title: &str) -> bool {
    if kw.len() > title.len() {
        return false;
    }
    'outer: for start in 0..=(title.len() - kw.len()) {
        for (offset, kw_token) in kw.iter().enumerate() {
            if title[start + offset].word != kw_token.word {
                continue 'outer;
            }
        }
        let run = &title[start..start + kw.len()];
        let whitespace_joined = run.windows(2).all(|pair| {
            raw_title[pair[0].end..pair[1].start]
                .chars()
                .all(char::is_whitespace)
        });
        if whitespace_joined {
            return true;
        }
    }
    false
}

/// True when the keyword tokens appear in order (not necessarily adjacent)
/// within the title tokens.
fn is_ordered_subsequence(kw: &[Token], title: &[Token]) -> bool {
    let mut kw_iter = kw.iter();
    let mut needle = kw_iter.next();
    for token in title {
        match needle {
            Some(t) if t.word == token.word => needle = kw_iter.next(),
            Some(_) => {}
            None => break,
        }
    }
    needle.is_none()
}
