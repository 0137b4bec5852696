//! Banding of raw keyword report metrics into per-criterion scores.
//!
//! The bands come from the upstream keyword-ranking product: three reported
//! metrics (rank in genre, in-genre search popularity, overall search
//! popularity) each map to a small integer band, and the composite is their
//! sum (0–11). Inputs outside the documented ranges fall into the zero band
//! rather than erroring.

use serde::{Deserialize, Serialize};

/// Per-criterion bands plus the composite total for one keyword row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordScores {
    pub rank: u8,
    pub genre: u8,
    pub overall: u8,
    pub total: u8,
}

/// Score one keyword from its three reported metrics.
#[must_use]
pub fn score_keyword(
    rank_in_genre: i32,
    popularity_genre: i32,
    popularity_overall: i32,
) -> KeywordScores {
    let rank = band_rank_in_genre(rank_in_genre);
    let genre = band_popularity_in_genre(popularity_genre);
    let overall = band_overall_popularity(popularity_overall);
    KeywordScores {
        rank,
        genre,
        overall,
        total: rank + genre + overall,
    }
}

/// Band for the keyword's rank within its genre.
fn band_rank_in_genre(rank: i32) -> u8 {
    match rank {
        1..=10 => 3,
        11..=25 => 2,
        26..=50 => 1,
        _ => 0,
    }
}

/// Band for in-genre search popularity (reported on a 1–100 scale).
fn band_popularity_in_genre(popularity: i32) -> u8 {
    match popularity {
        76..=100 => 3,
        61..=75 => 2,
        50..=60 => 1,
        _ => 0,
    }
}

/// Band for overall search popularity (reported on a 1–100 scale).
fn band_overall_popularity(popularity: i32) -> u8 {
    match popularity {
        86..=100 => 5,
        71..=85 => 4,
        61..=70 => 3,
        50..=60 => 2,
        _ => 0,
    }
}
