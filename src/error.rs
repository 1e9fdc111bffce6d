use chrono::NaiveDate;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Source '{source_name}' unavailable: {reason}")]
    SourceUnavailable { source_name: String, reason: String },

    #[error("No forecast available for {region} on {date}")]
    NoForecastAvailable { region: String, date: NaiveDate },

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Cache unavailable: {0}")]
    CacheUnavailable(String),
}

impl AppError {
    /// Wrap any adapter-internal failure as a recoverable source failure.
    pub fn source_unavailable(source_name: &str, err: impl std::fmt::Display) -> Self {
        AppError::SourceUnavailable {
            source_name: source_name.to_string(),
            reason: err.to_string(),
        }
    }

    pub fn is_store_failure(&self) -> bool {
        matches!(self, AppError::Database(_) | AppError::StoreUnavailable(_))
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
