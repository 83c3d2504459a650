use serde::Deserialize;
use std::collections::HashMap;
use std::env;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub search: SearchConfig,
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub kafka: KafkaConfig,
    #[serde(default)]
    pub suggest: SuggestConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,
    /// Searches still running after this long are abandoned with 408.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_max_in_flight() -> usize { 512 }
fn default_request_timeout_ms() -> u64 { 35_000 }

impl ServerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    #[serde(default = "default_max_results")]
    pub max_results_default: usize,
    #[serde(default = "default_hard_cap")]
    pub max_results_hard_cap: usize,
    #[serde(default = "default_global_deadline_ms")]
    pub global_deadline_ms: u64,
    #[serde(default = "default_provider_timeout_ms")]
    pub provider_timeout_ms: u64,
    #[serde(default = "default_cache_ttl_seconds")]
    pub cache_ttl_seconds: u64,
    #[serde(default = "default_currency")]
    pub default_currency: String,
    /// Order matters: it decides deduplication winners and sort ties.
    pub enabled_providers: Vec<String>,
}

fn default_max_results() -> usize { 50 }
fn default_hard_cap() -> usize { 200 }
fn default_global_deadline_ms() -> u64 { 30_000 }
fn default_provider_timeout_ms() -> u64 { 20_000 }
fn default_cache_ttl_seconds() -> u64 { 900 }
fn default_currency() -> String { "EUR".to_string() }

impl SearchConfig {
    pub fn global_deadline(&self) -> Duration {
        Duration::from_millis(self.global_deadline_ms)
    }

    pub fn provider_timeout(&self) -> Duration {
        Duration::from_millis(self.provider_timeout_ms)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_seconds)
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Http,
    Index,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    pub url: Option<String>,
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Memory,
    Redis,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    pub redis_url: Option<String>,
    /// Expiry for offers committed to the Redis offer index. Unset keeps them until overwritten.
    pub index_ttl_seconds: Option<u64>,
}

impl StorageConfig {
    pub fn index_ttl(&self) -> Option<Duration> {
        self.index_ttl_seconds.map(Duration::from_secs)
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum HistoryBackend {
    #[default]
    Memory,
    Redis,
    Postgres,
}

#[derive(Debug, Deserialize, Clone)]
pub struct HistoryConfig {
    #[serde(default)]
    pub backend: HistoryBackend,
    pub database_url: Option<String>,
    #[serde(default = "default_retention_hours")]
    pub retention_hours: u64,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

fn default_retention_hours() -> u64 { 720 }
fn default_queue_capacity() -> usize { 1024 }

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            backend: HistoryBackend::default(),
            database_url: None,
            retention_hours: default_retention_hours(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

impl HistoryConfig {
    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_hours * 3600)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct KafkaConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub brokers: String,
    #[serde(default = "default_topic")]
    pub topic: String,
}

fn default_topic() -> String { "search.performed".to_string() }

impl Default for KafkaConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            brokers: String::new(),
            topic: default_topic(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SuggestConfig {
    #[serde(default = "default_suggest_ttl")]
    pub cache_ttl_seconds: u64,
    #[serde(default = "default_suggest_limit")]
    pub default_limit: usize,
}

fn default_suggest_ttl() -> u64 { 86_400 }
fn default_suggest_limit() -> usize { 10 }

impl Default for SuggestConfig {
    fn default() -> Self {
        Self {
            cache_ttl_seconds: default_suggest_ttl(),
            default_limit: default_suggest_limit(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Optional per-environment overrides
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Untracked developer overrides
            .add_source(config::File::with_name("config/local").required(false))
            // e.g. `FARESCOPE__SEARCH__CACHE_TTL_SECONDS=60`
            .add_source(config::Environment::with_prefix("FARESCOPE").separator("__"))
            .build()?;

        s.try_deserialize()
    }

    pub fn from_toml(source: &str) -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::File::from_str(source, config::FileFormat::Toml))
            .build()?
            .try_deserialize()
    }
}
