use crate::error::{AppError, Result};
use crate::fetcher::backoff_delay;
use serde::{Deserialize, Deserializer};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub server: ServerConfig,
    pub sources: SourcesConfig,
    #[serde(default)]
    pub freshness: FreshnessConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub host: String,
    #[serde(default = "default_db_port", deserialize_with = "deserialize_port")]
    pub port: u16,
    pub name: String,
    pub user: String,
    pub password: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_db_port() -> u16 {
    5432
}

fn default_max_connections() -> u32 {
    5
}

/// Custom deserializer that handles port as both number and string
///
/// Accepts:
/// - `port: 5432` (number)
/// - `port: "5432"` (string that parses to number)
/// - `port: ${DB_PORT}` (env var substituted to either)
fn deserialize_port<'de, D>(deserializer: D) -> std::result::Result<u16, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum PortValue {
        Number(u16),
        String(String),
    }

    match PortValue::deserialize(deserializer)? {
        PortValue::Number(n) => Ok(n),
        PortValue::String(s) => s
            .parse::<u16>()
            .map_err(|_| serde::de::Error::custom(format!("Invalid port number: '{}'", s))),
    }
}

impl DatabaseConfig {
    pub fn connection_string(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.user, self.password, self.host, self.port, self.name
        )
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
        }
    }
}

/// Forecast providers, tried in the order swell_table then marine_api.
#[derive(Debug, Deserialize, Clone)]
pub struct SourcesConfig {
    #[serde(default)]
    pub swell_table: Option<SwellTableConfig>,
    #[serde(default)]
    pub marine_api: Option<MarineApiConfig>,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

/// Retries beyond this hold a request open for too long.
pub const MAX_SOURCE_RETRIES: u32 = 5;

impl SourcesConfig {
    /// Longest a single source call may take, across every attempt and the
    /// backoff between them.
    pub fn call_budget(&self) -> Duration {
        let per_attempt = Duration::from_secs(self.timeout_seconds);
        (1..=self.max_retries).fold(per_attempt, |total, retry| {
            total
                .saturating_add(per_attempt)
                .saturating_add(backoff_delay(retry))
        })
    }
}

fn default_timeout_seconds() -> u64 {
    10
}

fn default_max_retries() -> u32 {
    1
}

#[derive(Debug, Deserialize, Clone)]
pub struct SwellTableConfig {
    pub base_url: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MarineApiConfig {
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct FreshnessConfig {
    #[serde(default = "default_max_age_hours")]
    pub max_age_hours: i64,
}

fn default_max_age_hours() -> i64 {
    crate::freshness::DEFAULT_MAX_AGE_HOURS
}

impl Default for FreshnessConfig {
    fn default() -> Self {
        Self {
            max_age_hours: default_max_age_hours(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    #[serde(default = "default_aggregate_ttl")]
    pub aggregate_ttl_seconds: u64,
}

fn default_aggregate_ttl() -> u64 {
    300
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            aggregate_ttl_seconds: default_aggregate_ttl(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SchedulerConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_interval_minutes")]
    pub interval_minutes: u64,
    #[serde(default = "default_initial_delay")]
    pub initial_delay_seconds: u64,
    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,
}

fn default_interval_minutes() -> u64 {
    60
}

fn default_initial_delay() -> u64 {
    10
}

fn default_request_delay_ms() -> u64 {
    500 // 500ms delay between regions
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_minutes: default_interval_minutes(),
            initial_delay_seconds: default_initial_delay(),
            request_delay_ms: default_request_delay_ms(),
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| AppError::Config(format!("Failed to read config file: {}", e)))?;

        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        // Substitute environment variables
        let expanded = expand_env_vars(content)?;

        let config: Config = serde_yaml::from_str(&expanded)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {}", e)))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    ///
    /// Checks for:
    /// - Unexpanded environment variables
    /// - Non-empty required database fields and sane pool size
    /// - A parseable bind address
    /// - At least one enabled source, each with an HTTPS base URL
    /// - Positive timeouts, TTLs and freshness window
    fn validate(&self) -> Result<()> {
        let fields_to_check = [
            ("DB_HOST", &self.database.host),
            ("DB_NAME", &self.database.name),
            ("DB_USER", &self.database.user),
            ("DB_PASSWORD", &self.database.password),
        ];

        for (field_name, value) in &fields_to_check {
            if value.contains("${") {
                return Err(AppError::Config(format!(
                    "{} environment variable is not set. \
                     Please set it or create a .env file. \
                     See .env.example for required variables.",
                    field_name
                )));
            }
        }

        if self.database.host.is_empty() {
            return Err(AppError::Config(
                "Database host cannot be empty".to_string(),
            ));
        }

        if self.database.name.is_empty() {
            return Err(AppError::Config(
                "Database name cannot be empty".to_string(),
            ));
        }

        if self.database.user.is_empty() {
            return Err(AppError::Config(
                "Database user cannot be empty".to_string(),
            ));
        }

        if self.database.port == 0 {
            return Err(AppError::Config("Database port cannot be 0".to_string()));
        }

        if self.database.max_connections == 0 {
            return Err(AppError::Config(
                "Database max_connections must be at least 1".to_string(),
            ));
        }

        if self.database.max_connections > 100 {
            return Err(AppError::Config(format!(
                "Database max_connections {} seems too high, maximum recommended is 100",
                self.database.max_connections
            )));
        }

        if let Err(e) = self.server.bind_addr.parse::<SocketAddr>() {
            return Err(AppError::Config(format!(
                "Invalid server bind_addr '{}': {}",
                self.server.bind_addr, e
            )));
        }

        let enabled_urls: Vec<(&str, &str)> = [
            self.sources
                .swell_table
                .as_ref()
                .filter(|s| s.enabled)
                .map(|s| ("swell_table", s.base_url.as_str())),
            self.sources
                .marine_api
                .as_ref()
                .filter(|s| s.enabled)
                .map(|s| ("marine_api", s.base_url.as_str())),
        ]
        .into_iter()
        .flatten()
        .collect();

        if enabled_urls.is_empty() {
            return Err(AppError::Config(
                "At least one forecast source must be configured and enabled".to_string(),
            ));
        }

        for (name, base_url) in enabled_urls {
            let parsed = url::Url::parse(base_url).map_err(|e| {
                AppError::Config(format!("Invalid {} base_url '{}': {}", name, base_url, e))
            })?;

            if parsed.scheme() != "https" {
                return Err(AppError::Config(format!(
                    "Source {} base_url must use HTTPS, got: {}",
                    name,
                    parsed.scheme()
                )));
            }
        }

        if self.sources.timeout_seconds == 0 {
            return Err(AppError::Config(
                "Source timeout_seconds must be greater than 0".to_string(),
            ));
        }

        if self.sources.max_retries > MAX_SOURCE_RETRIES {
            return Err(AppError::Config(format!(
                "Source max_retries {} exceeds the maximum of {}",
                self.sources.max_retries, MAX_SOURCE_RETRIES
            )));
        }

        if self.freshness.max_age_hours <= 0 {
            return Err(AppError::Config(
                "Freshness max_age_hours must be greater than 0".to_string(),
            ));
        }

        if self.cache.aggregate_ttl_seconds == 0 {
            return Err(AppError::Config(
                "Cache aggregate_ttl_seconds must be greater than 0".to_string(),
            ));
        }

        if self.scheduler.enabled && self.scheduler.interval_minutes == 0 {
            return Err(AppError::Config(
                "Scheduler interval_minutes must be greater than 0".to_string(),
            ));
        }

        if self.scheduler.enabled && self.scheduler.interval_minutes < 15 {
            tracing::warn!(
                "Scheduler interval of {} minutes is very short, consider using at least 15 minutes",
                self.scheduler.interval_minutes
            );
        }

        Ok(())
    }
}

fn expand_env_vars(content: &str) -> Result<String> {
    let mut result = content.to_string();
    let re = regex_lite::Regex::new(r"\$\{([^}]+)\}")
        .map_err(|e| AppError::Config(format!("Invalid env var pattern: {}", e)))?;

    let mut missing_vars = Vec::new();

    for cap in re.captures_iter(content) {
        let var_name = &cap[1];
        match std::env::var(var_name) {
            Ok(value) => {
                result = result.replace(&cap[0], &value);
            }
            Err(_) => {
                missing_vars.push(var_name.to_string());
            }
        }
    }

    if !missing_vars.is_empty() {
        return Err(AppError::Config(format!(
            "Missing required environment variable{}: {}\n\n\
             To fix this:\n\
             1. Create a .env file in the project root (copy .env.example)\n\
             2. Set the missing variable{}: export {}=<value>\n\
             3. Or set {} in your environment before running",
            if missing_vars.len() > 1 { "s" } else { "" },
            missing_vars.join(", "),
            if missing_vars.len() > 1 { "s" } else { "" },
            missing_vars[0],
            missing_vars.join(", ")
        )));
    }

    Ok(result)
}
