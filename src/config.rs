use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::duration::{deserialize_duration, serialize_duration};
use crate::market_data::{RetryPolicy, ScrapeTarget, DEFAULT_BASE_URL, DEFAULT_USER_AGENT};
use crate::models::Id;

fn default_owner() -> String {
    "default".to_string()
}

/// Display/output formatting configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// If set, money values are rounded to this many decimal places before
    /// being rendered as strings.
    ///
    /// This is purely a presentation setting and does not affect calculations.
    pub currency_decimals: Option<u32>,
}

/// Scrape target configuration. Mirrors [`ScrapeTarget`] with defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetConfig {
    pub base_url: String,
    pub landing_path: String,
    pub quote_path: String,
    pub code_param: String,
    pub user_agent: String,

    /// CSS class of the list holding the price.
    pub list_class: String,

    /// Element inside the first list item whose text is the price.
    pub value_element: String,

    /// Case-insensitive substrings that mark a bot-detection page.
    pub block_markers: Vec<String>,
}

impl Default for TargetConfig {
    fn default() -> Self {
        let target = ScrapeTarget::default();
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            landing_path: target.landing_path,
            quote_path: target.quote_path,
            code_param: target.code_param,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            list_class: "top-list".to_string(),
            value_element: "span".to_string(),
            block_markers: crate::market_data::DEFAULT_BLOCK_MARKERS
                .iter()
                .map(|m| m.to_string())
                .collect(),
        }
    }
}

impl TargetConfig {
    pub fn scrape_target(&self) -> ScrapeTarget {
        ScrapeTarget {
            base_url: self.base_url.clone(),
            landing_path: self.landing_path.clone(),
            quote_path: self.quote_path.clone(),
            code_param: self.code_param.clone(),
            user_agent: self.user_agent.clone(),
        }
    }
}

/// Default freshness window (1 hour).
fn default_freshness_window() -> Duration {
    crate::ingest::DEFAULT_FRESHNESS_WINDOW
}

/// Default daemon interval (1 hour).
fn default_interval() -> Duration {
    Duration::from_secs(60 * 60)
}

/// Default daemon jitter (5 minutes).
fn default_jitter() -> Duration {
    Duration::from_secs(5 * 60)
}

fn default_run_on_start() -> bool {
    true
}

/// Ingestion and daemon configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestionConfig {
    /// Instruments quoted more recently than this are skipped.
    #[serde(
        default = "default_freshness_window",
        deserialize_with = "deserialize_duration",
        serialize_with = "serialize_duration"
    )]
    pub freshness_window: Duration,

    /// Time between daemon runs.
    #[serde(
        default = "default_interval",
        deserialize_with = "deserialize_duration",
        serialize_with = "serialize_duration"
    )]
    pub interval: Duration,

    /// Each interval is moved by a random offset within +/- this much.
    #[serde(
        default = "default_jitter",
        deserialize_with = "deserialize_duration",
        serialize_with = "serialize_duration"
    )]
    pub jitter: Duration,

    /// Whether the daemon runs once immediately at startup.
    #[serde(default = "default_run_on_start")]
    pub run_on_start: bool,

    pub target: TargetConfig,

    pub retry: RetryPolicy,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            freshness_window: default_freshness_window(),
            interval: default_interval(),
            jitter: default_jitter(),
            run_on_start: default_run_on_start(),
            target: TargetConfig::default(),
            retry: RetryPolicy::default(),
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Path to data directory. If relative, resolved from config file location.
    /// If not specified, defaults to the config file's directory.
    pub data_dir: Option<PathBuf>,

    /// Owner identity used by ledger and valuation commands.
    #[serde(default = "default_owner")]
    pub owner: String,

    #[serde(default)]
    pub display: DisplayConfig,

    #[serde(default)]
    pub ingestion: IngestionConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: None,
            owner: default_owner(),
            display: DisplayConfig::default(),
            ingestion: IngestionConfig::default(),
        }
    }
}

impl Config {
    /// Load config from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Resolve the data directory path.
    ///
    /// If `data_dir` is set and relative, it's resolved relative to `config_dir`.
    /// If `data_dir` is not set, returns `config_dir`.
    pub fn resolve_data_dir(&self, config_dir: &Path) -> PathBuf {
        match &self.data_dir {
            Some(data_dir) if data_dir.is_absolute() => data_dir.clone(),
            Some(data_dir) => config_dir.join(data_dir),
            None => config_dir.to_path_buf(),
        }
    }
}

/// Loaded configuration with resolved paths.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub data_dir: PathBuf,
    pub owner: Id,
    pub display: DisplayConfig,
    pub ingestion: IngestionConfig,
}

/// Returns the default config file path.
///
/// Resolution order:
/// 1. `./fundbook.toml` if it exists in current directory
/// 2. `~/.local/share/fundbook/fundbook.toml` (XDG data directory)
pub fn default_config_path() -> PathBuf {
    let local_config = PathBuf::from("fundbook.toml");
    if local_config.exists() {
        return local_config;
    }

    if let Some(data_dir) = dirs::data_dir() {
        return data_dir.join("fundbook").join("fundbook.toml");
    }

    local_config
}

impl ResolvedConfig {
    fn from_config(config: Config, config_dir: &Path) -> Self {
        let data_dir = config.resolve_data_dir(config_dir);
        Self {
            data_dir,
            owner: Id::from_string(config.owner.trim()),
            display: config.display,
            ingestion: config.ingestion,
        }
    }

    /// Load and resolve config from a file path.
    ///
    /// The data directory is resolved relative to the config file's parent directory.
    pub fn load(config_path: &Path) -> Result<Self> {
        let config_path = config_path
            .canonicalize()
            .with_context(|| format!("Config file not found: {}", config_path.display()))?;

        let config_dir = config_path
            .parent()
            .context("Config file has no parent directory")?;

        let config = Config::load(&config_path)?;
        Ok(Self::from_config(config, config_dir))
    }

    /// Load config, falling back to defaults if the file doesn't exist.
    ///
    /// If the config file doesn't exist, uses the config file's intended
    /// parent directory as the data directory.
    pub fn load_or_default(config_path: &Path) -> Result<Self> {
        if config_path.exists() {
            return Self::load(config_path);
        }

        let config_path = if config_path.is_relative() {
            std::env::current_dir()
                .context("Failed to get current directory")?
                .join(config_path)
        } else {
            config_path.to_path_buf()
        };

        let config_dir = config_path
            .parent()
            .context("Config path has no parent directory")?;

        Ok(Self::from_config(Config::default(), config_dir))
    }
}
