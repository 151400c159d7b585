use anyhow::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure for story-gate
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoryGateConfig {
    /// Database settings
    pub database: DatabaseConfig,
    /// Logging settings
    pub observability: ObservabilityConfig,
    /// Side-effect worker settings
    pub effects: EffectsConfig,
    /// Notification fan-out settings
    pub notifications: NotificationConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// SQLite file path or connection string
    pub url: String,
    /// Maximum connections in pool
    pub max_connections: u32,
    /// Enable automatic migrations
    pub auto_migrate: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Default log level when RUST_LOG is unset
    pub log_level: String,
    /// Emit JSON log lines instead of plain text
    pub json_logs: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EffectsConfig {
    /// Attempts per effect, including the first
    pub max_attempts: u32,
    /// Delay before the first retry
    pub base_delay_ms: u64,
    /// Upper bound for any retry delay
    pub max_delay_ms: u64,
    /// Pending effects held before new ones are dropped
    pub queue_capacity: usize,
    /// How long shutdown waits for pending effects
    pub flush_timeout_seconds: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelSelection {
    Log,
    InApp,
    Both,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NotificationConfig {
    /// Dispatch status-change notifications at all
    pub enabled: bool,
    /// Delivery channels to use
    pub channel: ChannelSelection,
}

impl Default for StoryGateConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://story-gate.db".to_string(),
                max_connections: 5,
                auto_migrate: true,
            },
            observability: ObservabilityConfig {
                log_level: "warn".to_string(),
                json_logs: false,
            },
            effects: EffectsConfig {
                max_attempts: 3,
                base_delay_ms: 200,
                max_delay_ms: 10_000,
                queue_capacity: 1024,
                flush_timeout_seconds: 10,
            },
            notifications: NotificationConfig {
                enabled: true,
                channel: ChannelSelection::Both,
            },
        }
    }
}

impl StoryGateConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Default values
    /// 2. Configuration file (story-gate.toml)
    /// 3. Environment variables (STORY_GATE_SECTION__KEY)
    pub fn load() -> Result<Self> {
        let defaults = Config::try_from(&StoryGateConfig::default())?;
        let mut builder = Config::builder().add_source(defaults);

        if Path::new("story-gate.toml").exists() {
            builder = builder.add_source(File::with_name("story-gate"));
        }

        builder = builder.add_source(
            Environment::with_prefix("STORY_GATE")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: StoryGateConfig = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let toml_content = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_content)?;
        Ok(())
    }

    /// Load .env file if it exists
    pub fn load_env_file() -> Result<()> {
        if Path::new(".env").exists() {
            dotenvy::dotenv()?;
            tracing::info!("Loaded environment variables from .env file");
        }
        Ok(())
    }
}

/// Global configuration instance
static CONFIG: std::sync::LazyLock<Result<StoryGateConfig, anyhow::Error>> =
    std::sync::LazyLock::new(|| {
        let _ = StoryGateConfig::load_env_file();
        StoryGateConfig::load()
    });

/// Get the global configuration
pub fn config() -> Result<&'static StoryGateConfig> {
    CONFIG
        .as_ref()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))
}
