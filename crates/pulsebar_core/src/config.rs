//! Backend Configuration
//!
//! Loaded once at startup and immutable afterwards.
//!
//! # Storage Locations
//! - Linux: `~/.config/pulsebar/config.json`
//! - macOS: `~/Library/Application Support/pulsebar/config.json`

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{error, info, warn};

use crate::error::{CoreError, CoreResult};
use crate::resolver::IgnoreList;

/// How the backend reconnects after the server link fails
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectPolicy {
    /// Consecutive failed attempts allowed before giving up (`None` = never give up)
    pub max_attempts: Option<u32>,

    /// Delay before the first retry; 0 reconnects immediately every time
    pub initial_delay_ms: u64,

    /// Upper bound for the doubled delay
    pub max_delay_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: None,
            initial_delay_ms: 0,
            max_delay_ms: 0,
        }
    }
}

impl ReconnectPolicy {
    /// Whether attempt number `attempt` (1-based) may run
    pub fn allows(&self, attempt: u32) -> bool {
        self.max_attempts.map_or(true, |max| attempt <= max)
    }

    /// Delay before attempt number `attempt` (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        if self.initial_delay_ms == 0 {
            return Duration::ZERO;
        }
        let shift = attempt.saturating_sub(1).min(32);
        let delay = self.initial_delay_ms.saturating_mul(1u64 << shift);
        Duration::from_millis(delay.min(self.max_delay_ms))
    }

    fn backoff_enabled(&self) -> bool {
        self.initial_delay_ms > 0
    }
}

/// Everything the backend needs at construction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Application name announced to the server
    pub client_name: String,

    /// Sink descriptions that must never become the current output
    #[serde(deserialize_with = "strings_only")]
    pub ignored_sinks: Vec<String>,

    pub reconnect: ReconnectPolicy,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            client_name: "pulsebar".to_string(),
            ignored_sinks: Vec::new(),
            reconnect: ReconnectPolicy::default(),
        }
    }
}

/// Accept any JSON array, keeping only its string entries
fn strings_only<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let values = Vec::<serde_json::Value>::deserialize(deserializer)?;
    Ok(values
        .into_iter()
        .filter_map(|value| match value {
            serde_json::Value::String(s) => Some(s),
            other => {
                warn!("Skipping non-string ignored sink entry: {}", other);
                None
            }
        })
        .collect())
}

impl BackendConfig {
    pub fn ignore_list(&self) -> IgnoreList {
        IgnoreList::new(self.ignored_sinks.iter().cloned())
    }

    /// Validate configuration
    pub fn validate(&self) -> CoreResult<()> {
        if self.client_name.trim().is_empty() {
            return Err(CoreError::InvalidConfiguration(
                "client_name must not be empty".to_string(),
            ));
        }
        let reconnect = &self.reconnect;
        if reconnect.backoff_enabled() && reconnect.max_delay_ms < reconnect.initial_delay_ms {
            return Err(CoreError::InvalidConfiguration(format!(
                "reconnect.max_delay_ms ({}) is below initial_delay_ms ({})",
                reconnect.max_delay_ms, reconnect.initial_delay_ms
            )));
        }
        Ok(())
    }

    /// Read and validate a configuration file
    pub fn load_from(path: &Path) -> CoreResult<Self> {
        let file = fs::File::open(path)?;
        let config: Self = serde_json::from_reader(file)?;
        config.validate()?;
        info!("Configuration loaded from {:?}", path);
        Ok(config)
    }

    /// Load the configuration from its default location, or return defaults if missing/corrupt
    pub fn load() -> Self {
        match Self::default_path() {
            Ok(path) if path.exists() => match Self::load_from(&path) {
                Ok(config) => return config,
                Err(e) => error!("Failed to load configuration: {}", e),
            },
            Ok(_) => {}
            Err(e) => error!("{}", e),
        }

        info!("Using default configuration");
        Self::default()
    }

    /// Platform-specific configuration file path
    pub fn default_path() -> CoreResult<PathBuf> {
        ProjectDirs::from("", "", "pulsebar")
            .map(|dirs| dirs.config_dir().join("config.json"))
            .ok_or(CoreError::NoConfigDirectory)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = BackendConfig::default();
        assert_eq!(config.client_name, "pulsebar");
        assert!(config.ignored_sinks.is_empty());
        assert_eq!(config.reconnect.max_attempts, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_policy_is_immediate_and_unlimited() {
        let policy = ReconnectPolicy::default();
        assert!(policy.allows(1));
        assert!(policy.allows(u32::MAX));
        assert_eq!(policy.delay_for(1), Duration::ZERO);
        assert_eq!(policy.delay_for(50), Duration::ZERO);
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = ReconnectPolicy {
            max_attempts: Some(5),
            initial_delay_ms: 100,
            max_delay_ms: 1000,
        };
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(4), Duration::from_millis(800));
        assert_eq!(policy.delay_for(5), Duration::from_millis(1000));
        assert_eq!(policy.delay_for(200), Duration::from_millis(1000));
        assert!(policy.allows(5));
        assert!(!policy.allows(6));
    }

    #[test]
    fn test_ignored_sinks_skip_non_strings() {
        let json = r#"{ "ignored_sinks": ["Monitor of X", 42, null, "Dummy Output", {"a": 1}] }"#;
        let config: BackendConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.ignored_sinks, vec!["Monitor of X", "Dummy Output"]);
        assert_eq!(config.client_name, "pulsebar");
        assert!(config.ignore_list().contains("Monitor of X"));
    }

    #[test]
    fn test_validation_errors() {
        let mut config = BackendConfig::default();
        config.client_name = "  ".to_string();
        assert!(config.validate().is_err());

        let mut config = BackendConfig::default();
        config.reconnect.initial_delay_ms = 500;
        config.reconnect.max_delay_ms = 100;
        assert!(matches!(
            config.validate(),
            Err(CoreError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("pulsebar-config-{}.json", std::process::id()));
        let mut file = fs::File::create(&path).unwrap();
        write!(
            file,
            r#"{{ "client_name": "bar", "reconnect": {{ "max_attempts": 3 }} }}"#
        )
        .unwrap();
        drop(file);

        let config = BackendConfig::load_from(&path).unwrap();
        assert_eq!(config.client_name, "bar");
        assert_eq!(config.reconnect.max_attempts, Some(3));
        assert_eq!(config.reconnect.initial_delay_ms, 0);

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_load_from_missing_file() {
        let err = BackendConfig::load_from(Path::new("/nonexistent/pulsebar.json")).unwrap_err();
        assert!(matches!(err, CoreError::Io(_)));
    }
}
