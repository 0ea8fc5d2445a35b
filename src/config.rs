use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::classify::DuplicateAxis;
use crate::video::ScoreWeights;

/// Top-level configuration for merge runs
#[derive(Debug, Deserialize, Clone, Default)]
pub struct MergeConfig {
    /// Identity axes and thresholds for duplicate detection
    #[serde(default)]
    pub identity: IdentityConfig,
    /// Store location settings
    #[serde(default)]
    pub store: StoreConfig,
    /// Candidate page fetching
    #[serde(default)]
    pub fetch: FetchConfig,
    /// Video matching
    #[serde(default)]
    pub video: VideoConfig,
}

/// Which identity axes are compared and how strict title matching is
#[derive(Debug, Deserialize, Clone)]
pub struct IdentityConfig {
    /// Active axes, in any order. Classification priority is always url, slug, title.
    #[serde(default = "default_axes")]
    pub axes: Vec<DuplicateAxis>,
    /// Minimum normalized title length before title equality counts as a duplicate
    #[serde(default = "default_min_title_len")]
    pub min_title_len: usize,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            axes: default_axes(),
            min_title_len: default_min_title_len(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct StoreConfig {
    /// Directory for backup snapshots. Defaults to the store's own directory.
    #[serde(default)]
    pub backup_dir: Option<PathBuf>,
}

/// Settings for fetching candidate pages
#[derive(Debug, Deserialize, Clone)]
pub struct FetchConfig {
    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Attempts per page before it is dropped
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    /// Base delay between attempts in milliseconds (multiplied by the attempt number)
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    /// Maximum requests in flight
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            retry_attempts: default_retry_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
            concurrency: default_concurrency(),
            user_agent: default_user_agent(),
        }
    }
}

/// Tunables for the video scoring heuristic
#[derive(Debug, Deserialize, Clone)]
pub struct VideoConfig {
    /// Minimum score for a video to be attached to a recipe
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    #[serde(default)]
    pub weights: ScoreWeights,
    #[serde(default = "default_min_duration_secs")]
    pub min_duration_secs: u32,
    #[serde(default = "default_max_duration_secs")]
    pub max_duration_secs: u32,
    /// Channels that earn the channel bonus
    #[serde(default)]
    pub whitelist: Vec<String>,
    /// Channels whose videos are never accepted
    #[serde(default)]
    pub blocklist: Vec<String>,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            weights: ScoreWeights::default(),
            min_duration_secs: default_min_duration_secs(),
            max_duration_secs: default_max_duration_secs(),
            whitelist: Vec::new(),
            blocklist: Vec::new(),
        }
    }
}

// Default value functions
fn default_axes() -> Vec<DuplicateAxis> {
    vec![DuplicateAxis::Url, DuplicateAxis::Slug, DuplicateAxis::Title]
}

fn default_min_title_len() -> usize {
    4
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    500
}

fn default_concurrency() -> usize {
    5
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (compatible; RecipeMergeBot/1.0)".to_string()
}

fn default_threshold() -> f64 {
    crate::video::ACCEPT_THRESHOLD
}

fn default_min_duration_secs() -> u32 {
    60
}

fn default_max_duration_secs() -> u32 {
    1800
}

impl MergeConfig {
    /// Load configuration from `recipe-merge.toml` and environment variables
    ///
    /// Configuration is loaded with the following priority (highest to lowest):
    /// 1. Environment variables with RECIPE_MERGE__ prefix
    /// 2. recipe-merge.toml in the current directory
    /// 3. Default values
    ///
    /// Environment variable format: RECIPE_MERGE__IDENTITY__MIN_TITLE_LEN
    pub fn load() -> Result<Self, ConfigError> {
        load_config(None)
    }
}

/// Load configuration, optionally from an explicit file path.
///
/// An explicit path must exist; the default `recipe-merge.toml` may be missing.
pub fn load_config(path: Option<&Path>) -> Result<MergeConfig, ConfigError> {
    let file = match path {
        Some(path) => File::from(path).required(true),
        None => File::with_name("recipe-merge").required(false),
    };

    let settings = Config::builder()
        .add_source(file)
        // Use double underscore for nested: RECIPE_MERGE__FETCH__TIMEOUT_SECS
        .add_source(
            Environment::with_prefix("RECIPE_MERGE")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    settings.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_values() {
        let config = MergeConfig::default();
        assert_eq!(config.identity.min_title_len, 4);
        assert_eq!(config.identity.axes.len(), 3);
        assert_eq!(config.fetch.concurrency, 5);
        assert_eq!(config.fetch.retry_attempts, 3);
        assert_eq!(config.fetch.timeout_secs, 10);
        assert!(config.store.backup_dir.is_none());
        assert_eq!(config.video.threshold, crate::video::ACCEPT_THRESHOLD);
    }

    #[test]
    fn test_load_from_explicit_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[identity]
axes = ["url", "title"]
min_title_len = 3

[store]
backup_dir = "backups"

[video]
threshold = 0.7
whitelist = ["GialloZafferano"]
"#
        )
        .unwrap();

        let config = load_config(Some(file.path())).unwrap();
        assert_eq!(
            config.identity.axes,
            vec![DuplicateAxis::Url, DuplicateAxis::Title]
        );
        assert_eq!(config.identity.min_title_len, 3);
        assert_eq!(config.store.backup_dir, Some(PathBuf::from("backups")));
        assert_eq!(config.video.threshold, 0.7);
        assert_eq!(config.video.whitelist, vec!["GialloZafferano"]);
        // untouched sections keep their defaults
        assert_eq!(config.fetch.concurrency, 5);
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let result = load_config(Some(Path::new("/nonexistent/recipe-merge.toml")));
        assert!(result.is_err());
    }
}
