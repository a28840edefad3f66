use anyhow::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::aggregator::{DEFAULT_RECENT_CAP, DEFAULT_WINDOW_DAYS};

/// Largest UTC offset accepted for the dashboard time zone (18 hours)
const MAX_OFFSET_MINUTES: i32 = 18 * 60;

/// Application configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Aggregation settings
    pub dashboard: DashboardConfig,
    /// Log output settings
    pub logging: LoggingConfig,
}

/// Dashboard aggregation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardConfig {
    /// Days covered by the sparkline series
    pub window_days: u32,
    /// Entries kept in the recent list
    pub recent_cap: u32,
    /// Fixed UTC offset for day boundaries; the host's local zone when unset
    pub utc_offset_minutes: Option<i32>,
    /// Collection holding contact messages
    pub messages_collection: String,
    /// Collection holding clients
    pub clients_collection: String,
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter level, overridden by `RUST_LOG`
    pub level: String,
    /// Daily rolling JSON log file written alongside stderr
    pub file_path: Option<String>,
    /// Console format, `text` or `json`
    pub format: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            dashboard: DashboardConfig {
                window_days: DEFAULT_WINDOW_DAYS,
                recent_cap: DEFAULT_RECENT_CAP as u32,
                utc_offset_minutes: None,
                messages_collection: crate::models::MESSAGES_COLLECTION.to_string(),
                clients_collection: crate::models::CLIENTS_COLLECTION.to_string(),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                file_path: None,
                format: "text".to_string(),
            },
        }
    }
}

impl AppConfig {
    /// Load configuration from multiple sources with precedence
    pub fn load() -> Result<Self> {
        Self::build(None)
    }

    /// Load configuration with an explicit file layered over the defaults
    /// and the conventional config files
    pub fn load_from(path: &Path) -> Result<Self> {
        Self::build(Some(path))
    }

    fn build(explicit: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();

        // Start with default values
        for (key, value) in Self::default() {
            builder = builder
                .set_default(key.as_str(), value)
                .map_err(|e| anyhow::anyhow!("Invalid default for {}: {}", key, e))?;
        }

        // Add config files if they exist
        builder = builder
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(File::with_name("config").required(false));

        if let Some(path) = explicit {
            builder = builder.add_source(File::from(path).required(true));
        }

        // Add environment variables with prefix, e.g. BACKOFFICE_DASHBOARD__WINDOW_DAYS
        let config = builder
            .add_source(
                Environment::with_prefix("BACKOFFICE")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;

        let app_config: Self = config
            .try_deserialize()
            .map_err(|e| anyhow::anyhow!("Failed to deserialize configuration: {}", e))?;

        // Validate configuration
        app_config.validate()?;

        Ok(app_config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        // Validate dashboard config
        if self.dashboard.window_days == 0 {
            return Err(anyhow::anyhow!("window_days must be greater than 0"));
        }
        if self.dashboard.window_days > 366 {
            return Err(anyhow::anyhow!("window_days must be at most 366"));
        }
        if self.dashboard.recent_cap == 0 {
            return Err(anyhow::anyhow!("recent_cap must be greater than 0"));
        }
        if let Some(offset) = self.dashboard.utc_offset_minutes {
            if offset.abs() >= MAX_OFFSET_MINUTES {
                return Err(anyhow::anyhow!(
                    "utc_offset_minutes must be within ±{} minutes, got {}",
                    MAX_OFFSET_MINUTES,
                    offset
                ));
            }
        }
        if self.dashboard.messages_collection.trim().is_empty()
            || self.dashboard.clients_collection.trim().is_empty()
        {
            return Err(anyhow::anyhow!("collection names cannot be empty"));
        }

        // Validate logging config
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(anyhow::anyhow!(
                "Invalid log level: {}. Must be one of: {:?}",
                self.logging.level,
                valid_levels
            ));
        }

        let valid_formats = ["text", "json"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            return Err(anyhow::anyhow!(
                "Invalid log format: {}. Must be one of: {:?}",
                self.logging.format,
                valid_formats
            ));
        }

        Ok(())
    }

    /// Get log level from environment or config
    pub fn get_log_level(&self) -> String {
        std::env::var("RUST_LOG").unwrap_or_else(|_| self.logging.level.clone())
    }
}

impl IntoIterator for AppConfig {
    type Item = (String, config::Value);
    type IntoIter = std::vec::IntoIter<(String, config::Value)>;

    fn into_iter(self) -> Self::IntoIter {
        let mut entries: Vec<(String, config::Value)> = Vec::new();

        // Flatten the configuration into key-value pairs
        entries.push((
            "dashboard.window_days".to_string(),
            config::Value::from(i64::from(self.dashboard.window_days)),
        ));
        entries.push((
            "dashboard.recent_cap".to_string(),
            config::Value::from(i64::from(self.dashboard.recent_cap)),
        ));
        if let Some(offset) = self.dashboard.utc_offset_minutes {
            entries.push((
                "dashboard.utc_offset_minutes".to_string(),
                config::Value::from(i64::from(offset)),
            ));
        }
        entries.push((
            "dashboard.messages_collection".to_string(),
            config::Value::from(self.dashboard.messages_collection),
        ));
        entries.push((
            "dashboard.clients_collection".to_string(),
            config::Value::from(self.dashboard.clients_collection),
        ));

        entries.push(("logging.level".to_string(), config::Value::from(self.logging.level)));
        if let Some(file_path) = self.logging.file_path {
            entries.push(("logging.file_path".to_string(), config::Value::from(file_path)));
        }
        entries.push(("logging.format".to_string(), config::Value::from(self.logging.format)));

        entries.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.dashboard.window_days, 14);
        assert_eq!(config.dashboard.recent_cap, 6);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_config_validation() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_config() {
        let mut config = AppConfig::default();
        config.dashboard.window_days = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_defaults_flatten_every_required_key() {
        let keys: Vec<String> = AppConfig::default().into_iter().map(|(k, _)| k).collect();
        assert!(keys.contains(&"dashboard.window_days".to_string()));
        assert!(keys.contains(&"logging.format".to_string()));
        assert!(!keys.contains(&"logging.file_path".to_string()));
    }
}
