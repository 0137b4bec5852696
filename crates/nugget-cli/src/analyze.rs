//! Ad-hoc analysis and lookup commands.

use nugget_appstore::{AnalysisOutcome, AppStoreClient, LookupTarget, SearchAttribute};
use nugget_core::AppConfig;

/// Run the `search` command: print the ranked identifiers for a term, in
/// authoritative order.
pub async fn run_search(
    config: &AppConfig,
    term: &str,
    attribute: Option<&str>,
    storefront: Option<&str>,
    limit: Option<usize>,
) -> anyhow::Result<()> {
    let attribute = attribute.map(SearchAttribute::parse).transpose()?;
    let client = AppStoreClient::new(config)?;
    let country = storefront.unwrap_or(&config.storefront);
    let limit = limit.unwrap_or(config.result_limit);

    let ids = client
        .fetch_ranked_ids(term, country, &config.language, limit, attribute)
        .await?;

    if ids.is_empty() {
        println!("no apps found for \"{term}\" in {country}");
        return Ok(());
    }
    for (position, id) in ids.iter().enumerate() {
        println!("{:>3}  {id}", position + 1);
    }
    Ok(())
}

/// Run the `analyze` command: full pipeline for one keyword, printed as a
/// table plus summary statistics.
pub async fn run_analyze(
    config: &AppConfig,
    term: &str,
    storefront: Option<&str>,
    limit: Option<usize>,
) -> anyhow::Result<()> {
    let client = AppStoreClient::new(config)?;
    let country = storefront.unwrap_or(&config.storefront);
    let limit = limit.unwrap_or(config.result_limit);

    let outcome = nugget_appstore::analyze_keyword(
        &client,
        term,
        country,
        &config.language,
        limit,
        chrono::Utc::now(),
    )
    .await?;

    match outcome {
        AnalysisOutcome::NoResults => {
            println!("no apps found for \"{term}\" in {country}");
        }
        AnalysisOutcome::Analyzed(analysis) => {
            println!(
                "{:<4} {:<12} {:<44} {:>5} {:>6} {:>8} {:>7} {:>9}",
                "rank", "app id", "title", "match", "rating", "age(d)", "fresh", "ratings/d"
            );
            for r in &analysis.results {
                println!(
                    "{:<4} {:<12} {:<44} {:>5} {:>6.2} {:>8} {:>7} {:>9.1}",
                    r.rank,
                    r.app_id,
                    truncate(&r.title, 42),
                    r.title_match_score,
                    r.rating_score,
                    r.age_days,
                    r.freshness_days,
                    r.ratings_per_day,
                );
            }
            if analysis.omitted_count > 0 {
                println!(
                    "({} ranked identifier(s) had no metadata and were omitted)",
                    analysis.omitted_count
                );
            }
            if let Some(summary) = &analysis.summary {
                println!();
                println!("competitiveness: {:.1}/100", summary.competitiveness);
                println!("avg rating:      {:.2} ({:.0} ratings avg)", summary.avg_rating, summary.avg_rating_count);
                println!("avg title match: {:.2}/5", summary.avg_title_match);
                println!("median app age:  {} days", summary.median_age_days);
                println!("avg freshness:   {:.0} days", summary.avg_freshness_days);
                println!("avg ratings/day: {:.1}", summary.avg_ratings_per_day);
            }
        }
    }
    Ok(())
}

/// Run the `lookup` command for a single app.
pub async fn run_lookup(config: &AppConfig, raw_target: &str) -> anyhow::Result<()> {
    let target = LookupTarget::detect(raw_target)
        .ok_or_else(|| anyhow::anyhow!("cannot interpret \"{raw_target}\" as an id, bundle id, or store URL"))?;

    let client = AppStoreClient::new(config)?;
    let record = client
        .lookup_target(&target, &config.storefront, &config.language)
        .await?;

    match record {
        Some(app) => {
            println!("{} ({})", app.title, app.app_id);
            if let Some(developer) = &app.developer {
                println!("developer:   {developer}");
            }
            if let Some(genre) = &app.primary_genre_name {
                println!("genre:       {genre}");
            }
            if let (Some(avg), Some(count)) = (app.average_user_rating, app.user_rating_count) {
                println!("rating:      {avg:.2} ({count} ratings)");
            }
            if let Some(first) = app.release_date {
                println!("released:    {}", first.format("%Y-%m-%d"));
            }
            if let Some(latest) = app.current_version_release_date {
                println!("last update: {}", latest.format("%Y-%m-%d"));
            }
            if let Some(version) = &app.version {
                println!("version:     {version}");
            }
            if let Some(min_os) = &app.minimum_os_version {
                println!("minimum os:  {min_os}");
            }
        }
        None => println!("no app found for \"{raw_target}\""),
    }
    Ok(())
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_owned()
    } else {
        s.chars().take(max_chars).collect()
    }
}
