//! Configuration for the revert CLI

use revert_engine::EngineConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main CLI configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevertConfig {
    /// Management API base URL
    #[serde(default = "default_api_endpoint")]
    pub api_endpoint: String,

    /// Management API version (path prefix `v{n}`)
    #[serde(default = "default_api_version")]
    pub api_version: u32,

    /// Stack api key
    #[serde(default)]
    pub api_key: Option<String>,

    /// Management token sent as `authorization`
    #[serde(default)]
    pub management_token: Option<String>,

    /// Pause before each paced publish batch
    #[serde(default = "default_publish_interval")]
    pub publish_interval_secs: u64,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Directory holding publish logs and run logs
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,

    /// Locale sent with asset publishes
    #[serde(default = "default_asset_locale")]
    pub default_asset_locale: String,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for RevertConfig {
    fn default() -> Self {
        Self {
            api_endpoint: default_api_endpoint(),
            api_version: default_api_version(),
            api_key: None,
            management_token: None,
            publish_interval_secs: default_publish_interval(),
            request_timeout_secs: default_request_timeout(),
            log_dir: default_log_dir(),
            default_asset_locale: default_asset_locale(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of text
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_api_endpoint() -> String {
    "https://api.contentstack.io".to_string()
}

fn default_api_version() -> u32 {
    3
}

fn default_publish_interval() -> u64 {
    3
}

fn default_request_timeout() -> u64 {
    30
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("bulk-publish-logs")
}

fn default_asset_locale() -> String {
    "en-us".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl RevertConfig {
    /// Load configuration: defaults, then the optional file, then `REVERT_*` variables
    ///
    /// Nested keys use a double underscore, e.g. `REVERT_LOGGING__JSON=true`.
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        builder = builder.add_source(config::Config::try_from(&RevertConfig::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(true));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("REVERT")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }

    /// Engine tuning derived from this configuration
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig::default().with_publish_interval(Duration::from_secs(self.publish_interval_secs))
    }

    /// Resolve a log file name; relative names live under `log_dir`
    pub fn resolve_log_path(&self, name: &str) -> PathBuf {
        let path = Path::new(name);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.log_dir.join(path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = RevertConfig::default();
        assert_eq!(config.api_endpoint, "https://api.contentstack.io");
        assert_eq!(config.api_version, 3);
        assert_eq!(config.publish_interval_secs, 3);
        assert_eq!(config.log_dir, PathBuf::from("bulk-publish-logs"));
        assert!(!config.logging.json);
    }

    #[test]
    fn test_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
api_key = "blt-stack"
management_token = "cs-token"
publish_interval_secs = 1
log_dir = "/var/log/revert"

[logging]
json = true
"#
        )
        .unwrap();

        let config = RevertConfig::load(file.path().to_str()).unwrap();
        assert_eq!(config.api_key.as_deref(), Some("blt-stack"));
        assert_eq!(config.management_token.as_deref(), Some("cs-token"));
        assert_eq!(config.publish_interval_secs, 1);
        assert_eq!(config.request_timeout_secs, 30);
        assert!(config.logging.json);
        assert_eq!(config.logging.level, "info");
        assert_eq!(
            config.engine_config().publish_interval,
            Duration::from_secs(1)
        );
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(RevertConfig::load(Some("/nonexistent/revert.toml")).is_err());
    }

    #[test]
    fn test_relative_log_names_resolve_under_log_dir() {
        let config = RevertConfig::default();
        assert_eq!(
            config.resolve_log_path("1587.publish-entries.success"),
            PathBuf::from("bulk-publish-logs/1587.publish-entries.success")
        );
        assert_eq!(
            config.resolve_log_path("/tmp/a.success"),
            PathBuf::from("/tmp/a.success")
        );
    }
}
