use anyhow::{anyhow, Context, Result};
use dirs::config_dir;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure for org-pull
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    /// Directory holding one checkout per `owner/name`, relative to the starting directory
    #[serde(default = "default_base_directory")]
    pub base_directory: String,

    /// GitHub listing settings
    #[serde(default)]
    pub github: GitHubConfig,

    /// Update command settings
    #[serde(default)]
    pub sync: SyncConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// GitHub configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct GitHubConfig {
    /// API base URL, for GitHub Enterprise (defaults to api.github.com)
    pub api_url: Option<String>,

    /// Repositories requested per page
    #[serde(default = "default_page_size")]
    pub page_size: u8,

    /// Timeout for a single page request in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,
}

/// Update command configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SyncConfig {
    /// Program run inside each working copy
    #[serde(default = "default_command")]
    pub command: String,

    /// Arguments placed before the clone URL
    #[serde(default = "default_args")]
    pub args: Vec<String>,

    /// Timeout for one update in seconds
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Seconds to keep relaying output after the command has exited
    #[serde(default = "default_output_grace")]
    pub output_grace: u64,
}

/// Logging configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String, // "info"

    /// Enable colored output
    #[serde(default = "default_true")]
    pub color: bool,
}

// Default value functions
fn default_base_directory() -> String {
    "..".to_string()
}
fn default_page_size() -> u8 {
    10
}
fn default_request_timeout() -> u64 {
    30
}
fn default_command() -> String {
    "git".to_string()
}
fn default_args() -> Vec<String> {
    vec!["pull".to_string()]
}
fn default_timeout() -> u64 {
    300
}
fn default_output_grace() -> u64 {
    5
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_true() -> bool {
    true
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            api_url: None,
            page_size: default_page_size(),
            request_timeout: default_request_timeout(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            command: default_command(),
            args: default_args(),
            timeout: default_timeout(),
            output_grace: default_output_grace(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            color: default_true(),
        }
    }
}

impl Config {
    /// Load configuration from the default location, or fall back to defaults
    pub fn load_or_default() -> Result<Self> {
        let config_path = Self::default_config_path()?;

        if config_path.exists() {
            Self::load(&config_path)
        } else {
            tracing::debug!("No configuration at {:?}, using defaults", config_path);
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let mut config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        config.expand_paths()?;
        config.validate()?;

        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_yaml::to_string(self).context("Failed to serialize configuration")?;

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {:?}", path))?;

        Ok(())
    }

    /// Get the default configuration file path (XDG compliant)
    pub fn default_config_path() -> Result<PathBuf> {
        let config_dir = config_dir().context("Failed to get user config directory")?;

        Ok(config_dir.join("org-pull").join("config.yml"))
    }

    /// Expand environment variables and `~` in configuration paths
    pub fn expand_paths(&mut self) -> Result<()> {
        self.base_directory = shellexpand::full(&self.base_directory)
            .context("Failed to expand base_directory path")?
            .into_owned();

        Ok(())
    }

    /// Reject settings the sync loop cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.base_directory.trim().is_empty() {
            return Err(anyhow!("base_directory must not be empty"));
        }
        if !(1..=100).contains(&self.github.page_size) {
            return Err(anyhow!(
                "github.page_size must be between 1 and 100, got {}",
                self.github.page_size
            ));
        }
        if self.github.request_timeout == 0 {
            return Err(anyhow!("github.request_timeout must be at least 1 second"));
        }
        if self.sync.command.trim().is_empty() {
            return Err(anyhow!("sync.command must not be empty"));
        }
        if self.sync.timeout == 0 {
            return Err(anyhow!("sync.timeout must be at least 1 second"));
        }
        if self.sync.output_grace == 0 {
            return Err(anyhow!("sync.output_grace must be at least 1 second"));
        }

        Ok(())
    }

    /// Absolute base directory, resolved once against the starting directory
    pub fn base_path(&self, start_dir: &Path) -> PathBuf {
        let base = Path::new(&self.base_directory);
        let joined = if base.is_absolute() {
            base.to_path_buf()
        } else {
            start_dir.join(base)
        };

        path_clean::clean(joined)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_directory: default_base_directory(),
            github: GitHubConfig::default(),
            sync: SyncConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}
