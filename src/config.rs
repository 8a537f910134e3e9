use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub flowkg: FlowkgConfig,
    #[serde(default)]
    pub optimization: OptimizationConfig,
    #[serde(default)]
    pub refresh: RefreshConfig,
}

/// Snapshot location and logging
#[derive(Debug, Clone, Deserialize)]
pub struct FlowkgConfig {
    /// SQLite graph snapshot written by the `import` binary.
    pub snapshot_db: PathBuf,
    /// Optional JSON snapshot; takes precedence over `snapshot_db` when set.
    #[serde(default)]
    pub snapshot_json: Option<PathBuf>,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Tunables for pattern compilation, path search and score boosting
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct OptimizationConfig {
    /// Patterns retained per step count
    pub top_k: usize,
    /// Step counts (transitions per pattern) to enumerate
    pub pattern_steps: Vec<usize>,
    /// Partial paths retained per hop, and complete paths returned
    pub beam_width: usize,
    /// Path length ceiling in edges
    pub max_hops: usize,
    /// Relative boost applied to frequency share and transition probability
    pub boost_factor: f64,
    /// Minimum transition probability that earns a transition boost
    pub transition_threshold: f64,
    /// Synthetic start used for path suggestions when nothing is selected yet
    pub start_type: String,
    pub max_recommendations: usize,
    pub max_pattern_suggestions: usize,
}

impl Default for OptimizationConfig {
    fn default() -> Self {
        Self {
            top_k: 50,
            pattern_steps: vec![2, 3],
            beam_width: 5,
            max_hops: 4,
            boost_factor: 0.2,
            transition_threshold: 0.05,
            start_type: "StartEvent".to_string(),
            max_recommendations: 10,
            max_pattern_suggestions: 5,
        }
    }
}

/// Periodic snapshot refresh
#[derive(Debug, Clone, Deserialize)]
pub struct RefreshConfig {
    /// Seconds between refreshes; 0 disables the periodic refresh
    #[serde(default = "default_refresh_interval")]
    pub interval_secs: u64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_refresh_interval(),
        }
    }
}

impl RefreshConfig {
    pub fn interval(&self) -> Option<Duration> {
        (self.interval_secs > 0).then(|| Duration::from_secs(self.interval_secs))
    }
}

fn default_refresh_interval() -> u64 {
    300
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from file
    ///
    /// Loads environment variables from .env file (if present) before loading config.
    /// Looks for config file in this order:
    /// 1. Path specified in FLOWKG_CONFIG environment variable
    /// 2. ./config.toml in current directory
    pub fn load() -> Result<Self> {
        let _ = dotenv::dotenv();

        let config_path = std::env::var("FLOWKG_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config.toml"));

        Self::from_path(&config_path)
    }

    /// Load and validate a specific config file
    pub fn from_path(config_path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config: Config = toml::from_str(&config_str)
            .with_context(|| format!("Failed to parse {}", config_path.display()))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        self.optimization.validate()
    }

    /// Get snapshot database path
    pub fn snapshot_db(&self) -> &Path {
        &self.flowkg.snapshot_db
    }
}

impl OptimizationConfig {
    pub fn validate(&self) -> Result<()> {
        if self.top_k == 0 {
            anyhow::bail!("optimization.top_k must be greater than 0");
        }

        if self.beam_width == 0 {
            anyhow::bail!("optimization.beam_width must be greater than 0");
        }

        if self.pattern_steps.is_empty() {
            anyhow::bail!("optimization.pattern_steps must list at least one step count");
        }

        if self.pattern_steps.contains(&0) {
            anyhow::bail!("optimization.pattern_steps entries must be greater than 0");
        }

        if !(0.0..=1.0).contains(&self.boost_factor) {
            anyhow::bail!("optimization.boost_factor must be between 0.0 and 1.0");
        }

        if !(0.0..=1.0).contains(&self.transition_threshold) {
            anyhow::bail!("optimization.transition_threshold must be between 0.0 and 1.0");
        }

        if self.start_type.trim().is_empty() {
            anyhow::bail!("optimization.start_type must not be empty");
        }

        Ok(())
    }
}
