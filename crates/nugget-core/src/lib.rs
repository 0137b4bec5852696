use thiserror::Error;

pub mod app_config;
pub mod competition;
pub mod config;
pub mod keyword_score;

pub use app_config::{AppConfig, Environment};
pub use competition::{
    days_since, rating_score, summarize, title_match_score, AnalysisSummary, CompetitionResult,
};
pub use config::{load_app_config, load_app_config_from_env};
pub use keyword_score::{score_keyword, KeywordScores};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    #[error("invalid value for environment variable {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}
