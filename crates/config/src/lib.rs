//! Configuration loading, validation, and management for Tessel.
//!
//! Loads configuration from `~/.tessel/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.tessel/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key (can be overridden per-provider)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Default LLM provider
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Default model
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Default temperature
    #[serde(default = "default_temperature")]
    pub default_temperature: f32,

    /// Default max tokens per LLM response
    #[serde(default = "default_max_tokens")]
    pub default_max_tokens: u32,

    /// Agent loop limits
    #[serde(default)]
    pub agent: AgentConfig,

    /// Sandbox resource policy
    #[serde(default)]
    pub sandbox: SandboxConfig,

    /// Tool restrictions
    #[serde(default)]
    pub tools: ToolsConfig,

    /// Provider-specific configurations
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
}

fn default_provider() -> String {
    "openai".into()
}
fn default_model() -> String {
    "gpt-4o-mini".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    4096
}

/// Limits governing the agent loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Maximum reasoning/acting rounds per task.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Consecutive identical tool calls that trigger loop detection.
    #[serde(default = "default_loop_repeat_threshold")]
    pub loop_repeat_threshold: u32,

    /// Consecutive unparseable responses before the turn is abandoned.
    #[serde(default = "default_parse_failure_limit")]
    pub parse_failure_limit: u32,

    /// System prompt prepended to every task.
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
}

fn default_max_iterations() -> u32 {
    15
}
fn default_loop_repeat_threshold() -> u32 {
    3
}
fn default_parse_failure_limit() -> u32 {
    3
}
fn default_system_prompt() -> String {
    "You are a capable assistant that accomplishes tasks step by step using the available tools. \
     When you have enough information, answer directly."
        .into()
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            loop_repeat_threshold: default_loop_repeat_threshold(),
            parse_failure_limit: default_parse_failure_limit(),
            system_prompt: default_system_prompt(),
        }
    }
}

/// Resource limits applied to sandboxed code submissions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxConfig {
    /// CPU time limit in seconds (RLIMIT_CPU).
    #[serde(default = "default_cpu_time_secs")]
    pub cpu_time_secs: u64,

    /// Address-space ceiling in megabytes (RLIMIT_AS).
    #[serde(default = "default_memory_mb")]
    pub memory_mb: u64,

    /// Process-count ceiling (RLIMIT_NPROC) — fork bomb protection.
    #[serde(default = "default_max_processes")]
    pub max_processes: u64,

    /// Open file descriptor ceiling (RLIMIT_NOFILE).
    #[serde(default = "default_max_open_files")]
    pub max_open_files: u64,

    /// Wall-clock timeout in seconds; the process is killed on expiry.
    #[serde(default = "default_wall_clock_secs")]
    pub wall_clock_secs: u64,
}

fn default_cpu_time_secs() -> u64 {
    5
}
fn default_memory_mb() -> u64 {
    256
}
fn default_max_processes() -> u64 {
    16
}
fn default_max_open_files() -> u64 {
    32
}
fn default_wall_clock_secs() -> u64 {
    10
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            cpu_time_secs: default_cpu_time_secs(),
            memory_mb: default_memory_mb(),
            max_processes: default_max_processes(),
            max_open_files: default_max_open_files(),
            wall_clock_secs: default_wall_clock_secs(),
        }
    }
}

/// Restrictions applied to built-in tools.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Shell commands the shell tool may run. Empty = all allowed.
    #[serde(default)]
    pub shell_allowlist: Vec<String>,

    /// Roots file tools may touch. Empty = all allowed.
    #[serde(default)]
    pub allowed_roots: Vec<String>,

    /// Path prefixes file tools must never touch.
    #[serde(default)]
    pub forbidden_paths: Vec<String>,

    /// URL prefixes the http tool may reach. Empty = all (non-private) allowed.
    #[serde(default)]
    pub allowed_endpoints: Vec<String>,
}

/// Per-provider connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Endpoint base URL (e.g., "https://api.openai.com/v1").
    pub base_url: String,

    /// API key override for this provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

impl AppConfig {
    /// Load configuration from the default path (~/.tessel/config.toml).
    ///
    /// Also checks environment variables for API keys:
    /// - `TESSEL_API_KEY` (highest priority)
    /// - `OPENROUTER_API_KEY`
    /// - `OPENAI_API_KEY`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;

        // Environment variable overrides (highest priority)
        if config.api_key.is_none() {
            config.api_key = std::env::var("TESSEL_API_KEY")
                .ok()
                .or_else(|| std::env::var("OPENROUTER_API_KEY").ok())
                .or_else(|| std::env::var("OPENAI_API_KEY").ok());
        }

        if let Ok(provider) = std::env::var("TESSEL_PROVIDER") {
            config.default_provider = provider;
        }

        if let Ok(model) = std::env::var("TESSEL_MODEL") {
            config.default_model = model;
        }

        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".tessel")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_temperature < 0.0 || self.default_temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "default_temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.agent.max_iterations == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_iterations must be at least 1".into(),
            ));
        }

        if self.agent.loop_repeat_threshold < 2 {
            return Err(ConfigError::ValidationError(
                "agent.loop_repeat_threshold must be at least 2".into(),
            ));
        }

        if self.sandbox.wall_clock_secs == 0 {
            return Err(ConfigError::ValidationError(
                "sandbox.wall_clock_secs must be at least 1".into(),
            ));
        }

        Ok(())
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            default_provider: default_provider(),
            default_model: default_model(),
            default_temperature: default_temperature(),
            default_max_tokens: default_max_tokens(),
            agent: AgentConfig::default(),
            sandbox: SandboxConfig::default(),
            tools: ToolsConfig::default(),
            providers: HashMap::new(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.agent.max_iterations, 15);
        assert_eq!(config.agent.loop_repeat_threshold, 3);
        assert_eq!(config.sandbox.wall_clock_secs, 10);
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.default_provider, config.default_provider);
        assert_eq!(parsed.agent.max_iterations, config.agent.max_iterations);
    }

    #[test]
    fn invalid_temperature_rejected() {
        let config = AppConfig {
            default_temperature: 5.0,
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_iterations_rejected() {
        let mut config = AppConfig::default();
        config.agent.max_iterations = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn repeat_threshold_below_two_rejected() {
        let mut config = AppConfig::default();
        config.agent.loop_repeat_threshold = 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let result = AppConfig::load_from(Path::new("/nonexistent/config.toml"));
        assert!(result.is_ok());
        assert_eq!(result.unwrap().default_provider, "openai");
    }

    #[test]
    fn partial_config_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "default_model = \"qwen2.5:7b\"").unwrap();
        writeln!(f, "[agent]").unwrap();
        writeln!(f, "max_iterations = 5").unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.default_model, "qwen2.5:7b");
        assert_eq!(config.agent.max_iterations, 5);
        // Untouched sections keep their defaults
        assert_eq!(config.agent.loop_repeat_threshold, 3);
        assert_eq!(config.sandbox.memory_mb, 256);
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("max_iterations"));
        assert!(toml_str.contains("wall_clock_secs"));
    }
}
