//! Report ingestion from a tab-separated monthly rankings export.
//!
//! The ingestion boundary is deliberately thin: a fixed header names the
//! required columns, rows failing required-field validation are skipped and
//! counted, and everything that survives is scored and handed to the store
//! in one idempotent import.

use std::path::Path;

use chrono::NaiveDateTime;
use nugget_core::score_keyword;
use nugget_db::{NewKeywordRow, ReportMeta};
use sqlx::PgPool;

const COL_COUNTRY: &str = "Country or Region";
const COL_GENRE: &str = "Genre";
const COL_TERM: &str = "Search Term";
const COL_RANK: &str = "Rank in Genre";
const COL_POP_GENRE: &str = "Search Popularity in Genre (1-100)";
const COL_POP_OVERALL: &str = "Search Popularity (1-100)";

/// Counters reported after a parse pass over the export.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ImportStats {
    pub processed: usize,
    pub skipped: usize,
}

/// Column indices resolved from the export's header line.
struct ColumnMap {
    country: usize,
    genre: usize,
    term: usize,
    rank: usize,
    pop_genre: usize,
    pop_overall: usize,
}

impl ColumnMap {
    fn from_header(header: &str) -> anyhow::Result<Self> {
        let names: Vec<&str> = header.split('\t').map(str::trim).collect();
        let find = |name: &str| -> anyhow::Result<usize> {
            names
                .iter()
                .position(|n| *n == name)
                .ok_or_else(|| anyhow::anyhow!("required column \"{name}\" not found in header"))
        };
        Ok(Self {
            country: find(COL_COUNTRY)?,
            genre: find(COL_GENRE)?,
            term: find(COL_TERM)?,
            rank: find(COL_RANK)?,
            pop_genre: find(COL_POP_GENRE)?,
            pop_overall: find(COL_POP_OVERALL)?,
        })
    }
}

/// Parse the export contents into scored keyword rows for one country.
///
/// The first line must be the header. Rows with a missing search term,
/// short field count, or unparseable numeric fields are skipped and counted;
/// rows for other countries are skipped silently as well (the upstream
/// export mixes all storefronts into one file).
pub fn parse_report_rows(
    contents: &str,
    country_filter: &str,
) -> anyhow::Result<(Vec<NewKeywordRow>, ImportStats)> {
    let mut lines = contents.lines();
    let header = lines
        .next()
        .ok_or_else(|| anyhow::anyhow!("export is empty; expected a header line"))?;
    let columns = ColumnMap::from_header(header)?;
    let width = 1 + [
        columns.country,
        columns.genre,
        columns.term,
        columns.rank,
        columns.pop_genre,
        columns.pop_overall,
    ]
    .into_iter()
    .max()
    .unwrap_or(0);

    let mut rows = Vec::new();
    let mut stats = ImportStats::default();

    for line in lines {
        if line.trim().is_empty() {
            continue;
        }
        stats.processed += 1;

        let fields: Vec<&str> = line.split('\t').map(str::trim).collect();
        if fields.len() < width {
            stats.skipped += 1;
            continue;
        }

        let term = fields[columns.term];
        if term.is_empty() {
            stats.skipped += 1;
            continue;
        }

        let country = fields[columns.country];
        if country != country_filter {
            stats.skipped += 1;
            continue;
        }

        let (Ok(rank), Ok(pop_genre), Ok(pop_overall)) = (
            fields[columns.rank].parse::<i32>(),
            fields[columns.pop_genre].parse::<i32>(),
            fields[columns.pop_overall].parse::<i32>(),
        ) else {
            stats.skipped += 1;
            continue;
        };

        rows.push(NewKeywordRow {
            country: country.to_owned(),
            genre: fields[columns.genre].to_owned(),
            search_term: term.to_owned(),
            rank_in_genre: rank,
            popularity_genre: pop_genre,
            popularity_overall: pop_overall,
            scores: score_keyword(rank, pop_genre, pop_overall),
        });
    }

    Ok((rows, stats))
}

/// Parse the `--generated-at` argument (`YYYY-MM-DD HH:MM`).
fn parse_generated_at(raw: &str) -> anyhow::Result<chrono::DateTime<chrono::Utc>> {
    let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M")
        .map_err(|e| anyhow::anyhow!("invalid --generated-at \"{raw}\": {e}"))?;
    Ok(naive.and_utc())
}

/// Run the `import` command: parse the export, score the rows, and import
/// them idempotently.
pub async fn run_import(
    pool: &PgPool,
    file: &Path,
    source_id: &str,
    generated_at: &str,
    month: &str,
    locale: &str,
    country: &str,
) -> anyhow::Result<()> {
    let generated_at = parse_generated_at(generated_at)?;
    let contents = std::fs::read_to_string(file)
        .map_err(|e| anyhow::anyhow!("cannot read {}: {e}", file.display()))?;

    let (rows, stats) = parse_report_rows(&contents, country)?;
    tracing::info!(
        processed = stats.processed,
        skipped = stats.skipped,
        imported = rows.len(),
        country,
        "parsed rankings export"
    );

    if rows.is_empty() {
        anyhow::bail!("no keyword rows for country \"{country}\" in {}", file.display());
    }

    let meta = ReportMeta {
        source_id: source_id.to_owned(),
        generated_at,
        data_month: month.to_owned(),
        locale: locale.to_owned(),
        source_filename: file.file_name().map(|n| n.to_string_lossy().into_owned()),
    };

    let outcome = nugget_db::import_report(pool, &meta, &rows).await?;
    if outcome.created {
        println!(
            "imported report {} ({} keywords, {} rows skipped) as id {}",
            source_id,
            rows.len(),
            stats.skipped,
            outcome.report_id
        );
    } else {
        println!(
            "report {source_id} was already imported (id {}); nothing changed",
            outcome.report_id
        );
    }
    Ok(())
}
