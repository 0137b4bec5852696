use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod analyze;
mod batch;
mod import;
mod keywords;

#[derive(Debug, Parser)]
#[command(name = "nugget")]
#[command(about = "App-store keyword demand/competition analysis")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Database administration
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
    /// Import a monthly keyword rankings export
    Import {
        /// Path to the tab-separated rankings export
        file: PathBuf,
        /// Upstream extract producer id (e.g. 93070_144880)
        #[arg(long)]
        source_id: String,
        /// Extract generation time, `YYYY-MM-DD HH:MM`
        #[arg(long)]
        generated_at: String,
        /// Reporting month, `YYYY-MM`
        #[arg(long)]
        month: String,
        /// Report locale (e.g. en_US)
        #[arg(long, default_value = "en_US")]
        locale: String,
        /// Only import keyword rows for this country
        #[arg(long, default_value = "United States")]
        country: String,
    },
    /// List imported report snapshots
    Reports {
        /// Maximum reports to show
        #[arg(long, default_value = "20")]
        limit: i64,
    },
    /// Show the best-scoring keywords of the active report
    Keywords {
        /// Reporting month, `YYYY-MM`
        #[arg(long)]
        month: String,
        /// Country the keywords were reported for
        #[arg(long, default_value = "United States")]
        country: String,
        /// Minimum composite score (0-11)
        #[arg(long, default_value = "0")]
        min_score: i16,
        /// Maximum rows to show
        #[arg(long, default_value = "50")]
        limit: i64,
    },
    /// Print the ranked identifiers for a search term
    Search {
        /// Search term
        term: String,
        /// Narrow the term search to one metadata field
        /// (softwareDeveloper, descriptionTerm, keywordsTerm, genreIndex, ratingIndex)
        #[arg(long)]
        attribute: Option<String>,
        /// Storefront country override
        #[arg(long)]
        storefront: Option<String>,
        /// Cap on ranked results override
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Analyze one keyword's competition right now
    Analyze {
        /// Search term to analyze
        term: String,
        /// Storefront country override
        #[arg(long)]
        storefront: Option<String>,
        /// Cap on ranked results override
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Look up a single app by id, bundle id, or store URL
    Lookup {
        /// Numeric id, bundle id, or apps.apple.com URL
        target: String,
    },
    /// Manage keyword analysis batches
    Batch {
        #[command(subcommand)]
        command: batch::BatchCommands,
    },
}

#[derive(Debug, Subcommand)]
enum DbCommands {
    /// Apply pending schema migrations
    Migrate,
    /// Verify database connectivity
    Ping,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = nugget_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let cli = Cli::parse();
    let Some(command) = cli.command else {
        println!("nugget: run with --help for available commands");
        return Ok(());
    };

    match command {
        Commands::Db { command } => {
            let pool = connect(&config).await?;
            match command {
                DbCommands::Migrate => {
                    let applied = nugget_db::run_migrations(&pool).await?;
                    println!("applied {applied} migration(s)");
                }
                DbCommands::Ping => {
                    nugget_db::ping(&pool).await?;
                    println!("database connection ok");
                }
            }
        }
        Commands::Import {
            file,
            source_id,
            generated_at,
            month,
            locale,
            country,
        } => {
            let pool = connect(&config).await?;
            import::run_import(
                &pool,
                &file,
                &source_id,
                &generated_at,
                &month,
                &locale,
                &country,
            )
            .await?;
        }
        Commands::Reports { limit } => {
            let pool = connect(&config).await?;
            keywords::run_reports(&pool, limit).await?;
        }
        Commands::Keywords {
            month,
            country,
            min_score,
            limit,
        } => {
            let pool = connect(&config).await?;
            keywords::run_keywords(&pool, &month, &country, min_score, limit).await?;
        }
        Commands::Search {
            term,
            attribute,
            storefront,
            limit,
        } => {
            analyze::run_search(&config, &term, attribute.as_deref(), storefront.as_deref(), limit)
                .await?;
        }
        Commands::Analyze {
            term,
            storefront,
            limit,
        } => {
            analyze::run_analyze(&config, &term, storefront.as_deref(), limit).await?;
        }
        Commands::Lookup { target } => {
            analyze::run_lookup(&config, &target).await?;
        }
        Commands::Batch { command } => {
            let pool = connect(&config).await?;
            batch::run(&pool, &config, command).await?;
        }
    }

    Ok(())
}

async fn connect(config: &nugget_core::AppConfig) -> anyhow::Result<sqlx::PgPool> {
    let pool_config = nugget_db::PoolConfig::from_app_config(config);
    let pool = nugget_db::connect_pool(&config.database_url, pool_config).await?;
    Ok(pool)
}
