use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_TICK_SECS: u64 = 60; // polling loop period
pub const DEFAULT_TIMEZONE: &str = "America/Sao_Paulo";
pub const DEFAULT_MIN_INTERVAL_MS: u64 = 1_500; // rate-limit floor between scrolls
pub const DEFAULT_EMPTY_FETCH_LIMIT: u32 = 5; // consecutive empty fetches before NoNewItems
pub const DEFAULT_BLOCK_CHECK_EVERY: u32 = 5; // iterations between soft-block probes
pub const DEFAULT_CALL_TIMEOUT_SECS: u64 = 60; // per collaborator call
pub const DEFAULT_SEARCH_BASE_URL: &str = "https://x.com/search";

/// Top-level config (gleaner.toml + GLEANER_* env overrides).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GleanerConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub collector: CollectorConfig,
    #[serde(default)]
    pub exports: ExportsConfig,
    #[serde(default)]
    pub source: SourceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Seconds between polling ticks. Sub-minute precision is not a goal.
    #[serde(default = "default_tick_secs")]
    pub tick_secs: u64,
    /// Zone assumed by the CLI when `--tz` is not given.
    #[serde(default = "default_timezone")]
    pub default_timezone: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_secs: DEFAULT_TICK_SECS,
            default_timezone: default_timezone(),
        }
    }
}

/// Stop-policy and pacing knobs for the collection controller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectorConfig {
    #[serde(default = "default_min_interval_ms")]
    pub min_interval_ms: u64,
    #[serde(default = "default_empty_fetch_limit")]
    pub empty_fetch_limit: u32,
    #[serde(default = "default_block_check_every")]
    pub block_check_every: u32,
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,
    /// Base search locator used to turn a query target into a URL.
    #[serde(default = "default_search_base_url")]
    pub search_base_url: String,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            min_interval_ms: DEFAULT_MIN_INTERVAL_MS,
            empty_fetch_limit: DEFAULT_EMPTY_FETCH_LIMIT,
            block_check_every: DEFAULT_BLOCK_CHECK_EVERY,
            call_timeout_secs: DEFAULT_CALL_TIMEOUT_SECS,
            search_base_url: default_search_base_url(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportsConfig {
    #[serde(default = "default_exports_dir")]
    pub dir: String,
}

impl Default for ExportsConfig {
    fn default() -> Self {
        Self {
            dir: default_exports_dir(),
        }
    }
}

/// File-backed item source used by the daemon.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    #[serde(default = "default_snapshot_dir")]
    pub snapshot_dir: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            snapshot_dir: default_snapshot_dir(),
        }
    }
}

fn default_tick_secs() -> u64 {
    DEFAULT_TICK_SECS
}
fn default_timezone() -> String {
    DEFAULT_TIMEZONE.to_string()
}
fn default_min_interval_ms() -> u64 {
    DEFAULT_MIN_INTERVAL_MS
}
fn default_empty_fetch_limit() -> u32 {
    DEFAULT_EMPTY_FETCH_LIMIT
}
fn default_block_check_every() -> u32 {
    DEFAULT_BLOCK_CHECK_EVERY
}
fn default_call_timeout_secs() -> u64 {
    DEFAULT_CALL_TIMEOUT_SECS
}
fn default_search_base_url() -> String {
    DEFAULT_SEARCH_BASE_URL.to_string()
}
fn default_exports_dir() -> String {
    "./exports".to_string()
}
fn default_db_path() -> String {
    format!("{}/gleaner.db", gleaner_home())
}
fn default_snapshot_dir() -> String {
    format!("{}/snapshots", gleaner_home())
}

fn gleaner_home() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.gleaner", home)
}

impl GleanerConfig {
    /// Load config from a TOML file with GLEANER_* env var overrides.
    ///
    /// Falls back to `~/.gleaner/gleaner.toml` when no path is given. A
    /// missing file is not an error; every section has defaults.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        Self::from_figment(Figment::new().merge(Toml::file(&path)))
    }

    fn from_figment(base: Figment) -> crate::error::Result<Self> {
        base.merge(Env::prefixed("GLEANER_").split("__"))
            .extract()
            .map_err(|e| crate::error::GleanerError::Config(e.to_string()))
    }
}

fn default_config_path() -> String {
    format!("{}/gleaner.toml", gleaner_home())
}
