//! Crawler configuration module.
//!
//! Handles loading, validating, and merging `crawler.toml`. The file is
//! sparse: stock defaults are the base layer and the user file overrides just
//! the keys it names.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [source]
//! subreddit = "crossview"   # Community to read
//! window = "month"          # hour | day | week | month | year | all
//! limit = 50                # Max posts returned (after filtering)
//! # year = 2018             # Keep only posts created in this year (UTC)
//! max_pages = 10            # Listing pages requested at most (100 posts each)
//! user_agent = "scene-crawler/0.3 (stereo photo collector)"
//!
//! [paths]
//! download_dir = "drop"     # Image cache + discovered snapshot
//! output_dir = "out"        # Accepted snapshot
//! snapshot_name = "posts.json"
//!
//! [network]
//! timeout_secs = 30         # Per-request timeout
//!
//! [processing]
//! max_processes = 4         # Max parallel workers (omit for auto = CPU cores)
//! min_width = 200           # Narrower images are rejected
//! min_aspect_ratio = 1.2    # width / height bounds for a side-by-side pair
//! max_aspect_ratio = 4.0
//! full_decode = true        # Decode every pixel to catch truncated files
//! timeout_secs = 60         # Per-image validation timeout
//!
//! [pipeline]
//! fan_out = "all"           # all | first: images kept per gallery link
//! ```
//!
//! Unknown keys are rejected to catch typos early.
//!
//! Credentials never live in the file. They are read from `REDDIT_CLIENT_ID`,
//! `REDDIT_CLIENT_SECRET`, `REDDIT_USERNAME` and `REDDIT_PASSWORD`; see
//! [`Credentials::from_env`].

use crate::discovery::{DiscoveryQuery, TimeWindow};
use crate::pipeline::FanOut;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Crawler configuration loaded from `crawler.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CrawlerConfig {
    /// Where and how much to discover.
    pub source: SourceConfig,
    /// Local directories and snapshot file name.
    pub paths: PathsConfig,
    /// HTTP client settings.
    pub network: NetworkConfig,
    /// Worker pool and image acceptance policy.
    pub processing: ProcessingConfig,
    /// Orchestration policy.
    pub pipeline: PipelineConfig,
}

impl CrawlerConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.source.subreddit.trim().is_empty() {
            return Err(ConfigError::Validation(
                "source.subreddit must not be empty".into(),
            ));
        }
        if self.source.limit == 0 {
            return Err(ConfigError::Validation(
                "source.limit must be at least 1".into(),
            ));
        }
        if self.source.max_pages == 0 {
            return Err(ConfigError::Validation(
                "source.max_pages must be at least 1".into(),
            ));
        }
        if self.paths.snapshot_name.is_empty() || self.paths.snapshot_name.contains('/') {
            return Err(ConfigError::Validation(
                "paths.snapshot_name must be a plain file name".into(),
            ));
        }
        if self.network.timeout_secs == 0 || self.processing.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "timeouts must be at least 1 second".into(),
            ));
        }
        let p = &self.processing;
        if !(p.min_aspect_ratio > 0.0 && p.min_aspect_ratio <= p.max_aspect_ratio) {
            return Err(ConfigError::Validation(
                "processing.min_aspect_ratio must be positive and <= max_aspect_ratio".into(),
            ));
        }
        if p.max_processes == Some(0) {
            return Err(ConfigError::Validation(
                "processing.max_processes must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// The discovery request described by `[source]`.
    pub fn discovery_query(&self) -> DiscoveryQuery {
        DiscoveryQuery {
            subreddit: self.source.subreddit.clone(),
            window: self.source.window,
            limit: self.source.limit,
            year: self.source.year,
            max_pages: self.source.max_pages,
        }
    }

    /// Snapshot of everything discovery returned.
    pub fn discovered_snapshot_path(&self) -> PathBuf {
        self.paths.download_dir.join(&self.paths.snapshot_name)
    }

    /// Snapshot of the accepted set.
    pub fn accepted_snapshot_path(&self) -> PathBuf {
        self.paths.output_dir.join(&self.paths.snapshot_name)
    }
}

/// Discovery settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SourceConfig {
    /// Community name without the `r/` prefix.
    pub subreddit: String,
    /// Period of the "top" listing.
    pub window: TimeWindow,
    /// Maximum number of posts returned after filtering.
    pub limit: usize,
    /// Keep only posts created in this calendar year (UTC).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    /// Upper bound on listing page requests.
    pub max_pages: usize,
    /// User-Agent sent with every request.
    pub user_agent: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            subreddit: "crossview".to_string(),
            window: TimeWindow::Month,
            limit: 50,
            year: None,
            max_pages: 10,
            user_agent: "scene-crawler/0.3 (stereo photo collector)".to_string(),
        }
    }
}

/// Local directories.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PathsConfig {
    /// Downloaded images and the discovered snapshot.
    pub download_dir: PathBuf,
    /// The accepted snapshot.
    pub output_dir: PathBuf,
    /// File name used for both snapshots.
    pub snapshot_name: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            download_dir: PathBuf::from("drop"),
            output_dir: PathBuf::from("out"),
            snapshot_name: "posts.json".to_string(),
        }
    }
}

/// HTTP client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NetworkConfig {
    /// Per-request timeout in seconds, covering connect and body transfer.
    pub timeout_secs: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self { timeout_secs: 30 }
    }
}

impl NetworkConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Worker pool and image acceptance settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel workers.
    /// When absent or null, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_processes: Option<usize>,
    /// Minimum accepted image width in pixels.
    pub min_width: u32,
    /// Smallest accepted width / height ratio.
    pub min_aspect_ratio: f64,
    /// Largest accepted width / height ratio.
    pub max_aspect_ratio: f64,
    /// Decode the full image instead of only reading its header.
    pub full_decode: bool,
    /// Per-image validation timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            max_processes: None,
            min_width: 200,
            min_aspect_ratio: 1.2,
            max_aspect_ratio: 4.0,
            full_decode: true,
            timeout_secs: 60,
        }
    }
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config.max_processes.map(|n| n.min(cores)).unwrap_or(cores)
}

/// Orchestration policy.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// How many images a multi-image link contributes.
    pub fan_out: FanOut,
}

/// OAuth script-app credentials for the content source.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl Credentials {
    /// Read credentials from the environment.
    ///
    /// Returns `None` unless all four variables are set and non-empty; a
    /// partial set falls back to anonymous access.
    pub fn from_env() -> Option<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Option<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Some(Self {
            client_id: get("REDDIT_CLIENT_ID")?,
            client_secret: get("REDDIT_CLIENT_SECRET")?,
            username: get("REDDIT_USERNAME")?,
            password: get("REDDIT_PASSWORD")?,
        })
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging user overrides on top.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    toml::Value::try_from(CrawlerConfig::default())
        .map_err(|e| ConfigError::Validation(format!("default config must serialize: {e}")))
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load `crawler.toml` from `path`, merged over stock defaults and validated.
///
/// A missing file yields the stock defaults.
pub fn load_config(path: &Path) -> Result<CrawlerConfig, ConfigError> {
    let overlay = if path.exists() {
        let content = fs::read_to_string(path)?;
        Some(toml::from_str::<toml::Value>(&content)?)
    } else {
        None
    };
    resolve_config(stock_defaults_value()?, overlay)
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<CrawlerConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: CrawlerConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// A documented `crawler.toml` with every option at its default.
pub fn stock_config_toml() -> &'static str {
    r#"# scene-crawler configuration
# All options are optional; the values below are the defaults.
# Credentials are read from REDDIT_CLIENT_ID, REDDIT_CLIENT_SECRET,
# REDDIT_USERNAME and REDDIT_PASSWORD. Without them the public listing is used.

[source]
# Community to read, without the r/ prefix.
subreddit = "crossview"
# Period of the "top" listing: hour, day, week, month, year or all.
window = "month"
# Maximum number of posts kept after filtering.
limit = 50
# Keep only posts created in this calendar year (UTC).
# year = 2018
# Listing pages requested at most (100 posts per page).
max_pages = 10
user_agent = "scene-crawler/0.3 (stereo photo collector)"

[paths]
# Downloaded images and the discovered snapshot.
download_dir = "drop"
# The accepted snapshot.
output_dir = "out"
snapshot_name = "posts.json"

[network]
# Per-request timeout, covering connect and body transfer.
timeout_secs = 30

[processing]
# Parallel workers; omit to use every core. Larger values are clamped.
# max_processes = 4
# Narrower images are rejected.
min_width = 200
# Accepted width / height range. A side-by-side pair of two square views is 2.0.
min_aspect_ratio = 1.2
max_aspect_ratio = 4.0
# Decode every pixel so truncated downloads are rejected.
full_decode = true
# Per-image validation timeout.
timeout_secs = 60

[pipeline]
# all: every image of a gallery link becomes its own scene.
# first: only the first image is kept.
fan_out = "all"
"#
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_targets_crossview() {
        let config = CrawlerConfig::default();
        assert_eq!(config.source.subreddit, "crossview");
        assert_eq!(config.source.window, TimeWindow::Month);
        assert_eq!(config.source.limit, 50);
        assert_eq!(config.source.year, None);
    }

    #[test]
    fn default_snapshot_paths() {
        let config = CrawlerConfig::default();
        assert_eq!(
            config.discovered_snapshot_path(),
            PathBuf::from("drop/posts.json")
        );
        assert_eq!(
            config.accepted_snapshot_path(),
            PathBuf::from("out/posts.json")
        );
    }

    #[test]
    fn parse_partial_config() {
        let toml = r#"
[source]
window = "all"
year = 2018
"#;
        let config: CrawlerConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.source.window, TimeWindow::All);
        assert_eq!(config.source.year, Some(2018));
        // Unspecified defaults preserved
        assert_eq!(config.source.subreddit, "crossview");
        assert_eq!(config.processing.min_width, 200);
        assert_eq!(config.pipeline.fan_out, FanOut::All);
    }

    #[test]
    fn parse_fan_out_first() {
        let config: CrawlerConfig = toml::from_str("[pipeline]\nfan_out = \"first\"").unwrap();
        assert_eq!(config.pipeline.fan_out, FanOut::First);
    }

    #[test]
    fn discovery_query_mirrors_source_section() {
        let mut config = CrawlerConfig::default();
        config.source.year = Some(2019);
        config.source.limit = 5;
        let query = config.discovery_query();
        assert_eq!(query.subreddit, "crossview");
        assert_eq!(query.year, Some(2019));
        assert_eq!(query.limit, 5);
        assert_eq!(query.max_pages, 10);
    }

    // =========================================================================
    // load_config tests
    // =========================================================================

    #[test]
    fn load_config_returns_default_when_no_file() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(&tmp.path().join("crawler.toml")).unwrap();
        assert_eq!(config.source.subreddit, "crossview");
        assert_eq!(config.paths.snapshot_name, "posts.json");
    }

    #[test]
    fn load_config_reads_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("crawler.toml");
        fs::write(
            &path,
            r#"
[source]
subreddit = "parallelview"
limit = 10

[processing]
max_processes = 2
"#,
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.source.subreddit, "parallelview");
        assert_eq!(config.source.limit, 10);
        assert_eq!(config.processing.max_processes, Some(2));
        // Unspecified values should be defaults
        assert_eq!(config.source.window, TimeWindow::Month);
        assert_eq!(config.network.timeout_secs, 30);
    }

    #[test]
    fn load_config_invalid_toml_is_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("crawler.toml");
        fs::write(&path, "this is not valid toml [[[").unwrap();

        let result = load_config(&path);
        assert!(matches!(result, Err(ConfigError::Toml(_))));
    }

    #[test]
    fn load_config_runs_validation() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("crawler.toml");
        fs::write(&path, "[source]\nlimit = 0\n").unwrap();

        let result = load_config(&path);
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn stock_config_parses_to_defaults() {
        let config: CrawlerConfig = toml::from_str(stock_config_toml()).unwrap();
        let defaults = CrawlerConfig::default();
        assert_eq!(config.source.subreddit, defaults.source.subreddit);
        assert_eq!(config.source.limit, defaults.source.limit);
        assert_eq!(config.paths.download_dir, defaults.paths.download_dir);
        assert_eq!(
            config.processing.max_aspect_ratio,
            defaults.processing.max_aspect_ratio
        );
        assert_eq!(config.pipeline.fan_out, defaults.pipeline.fan_out);
        config.validate().unwrap();
    }

    // =========================================================================
    // Processing config tests
    // =========================================================================

    #[test]
    fn effective_threads_auto() {
        let config = ProcessingConfig::default();
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        assert_eq!(effective_threads(&config), cores);
    }

    #[test]
    fn effective_threads_clamped_to_cores() {
        let config = ProcessingConfig {
            max_processes: Some(99999),
            ..Default::default()
        };
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        assert_eq!(effective_threads(&config), cores);
    }

    #[test]
    fn effective_threads_user_constrains_down() {
        let config = ProcessingConfig {
            max_processes: Some(1),
            ..Default::default()
        };
        assert_eq!(effective_threads(&config), 1);
    }

    // =========================================================================
    // merge_toml tests
    // =========================================================================

    #[test]
    fn merge_toml_table_merge() {
        let base: toml::Value = toml::from_str(
            r#"
[source]
subreddit = "crossview"
limit = 50
"#,
        )
        .unwrap();
        let overlay: toml::Value = toml::from_str("[source]\nlimit = 5").unwrap();
        let merged = merge_toml(base, overlay);
        let source = merged.get("source").unwrap();
        assert_eq!(source.get("limit").unwrap().as_integer(), Some(5));
        assert_eq!(
            source.get("subreddit").unwrap().as_str(),
            Some("crossview")
        );
    }

    #[test]
    fn merge_toml_scalar_override() {
        let base: toml::Value = toml::from_str("a = 1\nb = 2").unwrap();
        let overlay: toml::Value = toml::from_str("a = 10").unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged.get("a").unwrap().as_integer(), Some(10));
        assert_eq!(merged.get("b").unwrap().as_integer(), Some(2));
    }

    // =========================================================================
    // Unknown key rejection and validation
    // =========================================================================

    #[test]
    fn unknown_key_rejected() {
        let result: Result<CrawlerConfig, _> = toml::from_str("[source]\nsubredit = \"x\"");
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("unknown field"));
    }

    #[test]
    fn unknown_section_rejected() {
        let result: Result<CrawlerConfig, _> = toml::from_str("[sources]\nlimit = 3");
        assert!(result.is_err());
    }

    #[test]
    fn unknown_window_rejected() {
        let result: Result<CrawlerConfig, _> = toml::from_str("[source]\nwindow = \"decade\"");
        assert!(result.is_err());
    }

    #[test]
    fn validate_default_config_passes() {
        CrawlerConfig::default().validate().unwrap();
    }

    #[test]
    fn validate_inverted_aspect_range() {
        let mut config = CrawlerConfig::default();
        config.processing.min_aspect_ratio = 3.0;
        config.processing.max_aspect_ratio = 2.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn validate_snapshot_name_with_separator() {
        let mut config = CrawlerConfig::default();
        config.paths.snapshot_name = "a/posts.json".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_zero_workers() {
        let mut config = CrawlerConfig::default();
        config.processing.max_processes = Some(0);
        assert!(config.validate().is_err());
    }

    // =========================================================================
    // Credentials
    // =========================================================================

    #[test]
    fn credentials_require_all_four_values() {
        let full = |key: &str| Some(format!("{key}-value"));
        let creds = Credentials::from_lookup(full).unwrap();
        assert_eq!(creds.client_id, "REDDIT_CLIENT_ID-value");
        assert_eq!(creds.password, "REDDIT_PASSWORD-value");

        let missing_password = |key: &str| (key != "REDDIT_PASSWORD").then(|| "x".to_string());
        assert!(Credentials::from_lookup(missing_password).is_none());

        let blank = |_: &str| Some("  ".to_string());
        assert!(Credentials::from_lookup(blank).is_none());
    }

    #[test]
    fn credentials_debug_hides_secrets() {
        let creds = Credentials {
            client_id: "id".into(),
            client_secret: "s3cret".into(),
            username: "user".into(),
            password: "hunter2".into(),
        };
        let shown = format!("{creds:?}");
        assert!(!shown.contains("s3cret"));
        assert!(!shown.contains("hunter2"));
    }
}
