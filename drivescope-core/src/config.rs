// Settings file and the per-run options derived from it

use crate::error::{AuditError, Result};
use crate::walker::{Budget, DEFAULT_MAX_DEPTH, WalkerConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_DIR: &str = "~/.config/drivescope";
pub const CONFIG_FILE_NAME: &str = "config.json";
pub const DATABASE_FILE_NAME: &str = "drivescope.db";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub api_base_url: String,
    /// Environment variable the bearer token is read from.
    pub token_env: String,
    pub database: String,
    pub company_domains: Vec<String>,
    /// Principals allowed to run the audit. Empty means nobody.
    pub allowed_users: Vec<String>,
    pub max_depth: u32,
    pub item_budget: usize,
    pub time_budget_secs: Option<u64>,
    pub call_delay_ms: u64,
    pub request_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base_url: "https://www.googleapis.com/drive/v3/".to_string(),
            token_env: "DRIVESCOPE_TOKEN".to_string(),
            database: format!("{}/{}", DEFAULT_CONFIG_DIR, DATABASE_FILE_NAME),
            company_domains: Vec::new(),
            allowed_users: Vec::new(),
            max_depth: DEFAULT_MAX_DEPTH,
            item_budget: 500,
            time_budget_secs: None,
            call_delay_ms: 100,
            request_timeout_secs: 30,
        }
    }
}

/// Expand a leading `~` in a configured path.
pub fn expand_path(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).as_ref())
}

pub fn default_config_path() -> PathBuf {
    expand_path(DEFAULT_CONFIG_DIR).join(CONFIG_FILE_NAME)
}

impl Settings {
    /// Read a settings file. Fields it leaves out take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|e| {
            AuditError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        let settings: Settings = serde_json::from_str(&raw).map_err(|e| {
            AuditError::Config(format!("invalid settings in {}: {}", path.display(), e))
        })?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.api_base_url.trim().is_empty() {
            return Err(AuditError::Config("api_base_url is empty".to_string()));
        }
        if self.token_env.trim().is_empty() {
            return Err(AuditError::Config("token_env is empty".to_string()));
        }
        if self.request_timeout_secs == 0 {
            return Err(AuditError::Config(
                "request_timeout_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn database_path(&self) -> PathBuf {
        expand_path(&self.database)
    }

    pub fn walker_config(&self) -> WalkerConfig {
        WalkerConfig {
            max_depth: self.max_depth,
            call_delay: Duration::from_millis(self.call_delay_ms),
            company_domains: self.company_domains.clone(),
        }
    }

    /// Item budget is never below one, so each invocation makes progress.
    pub fn budget(&self) -> Budget {
        let budget = Budget::items(self.item_budget.max(1));
        match self.time_budget_secs {
            Some(secs) => budget.with_time(Duration::from_secs(secs)),
            None => budget,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_fields_take_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.json");
        fs::write(&path, r#"{"company_domains": ["acme.co.jp"], "max_depth": 4}"#).unwrap();

        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.company_domains, vec!["acme.co.jp"]);
        assert_eq!(settings.max_depth, 4);
        assert_eq!(settings.item_budget, 500);
        assert_eq!(settings.token_env, "DRIVESCOPE_TOKEN");
    }

    #[test]
    fn test_save_then_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("config.json");
        let settings = Settings {
            allowed_users: vec!["admin@acme.co.jp".to_string()],
            time_budget_secs: Some(300),
            ..Settings::default()
        };

        settings.save(&path).unwrap();
        assert_eq!(Settings::load(&path).unwrap(), settings);
    }

    #[test]
    fn test_invalid_file_is_config_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();

        assert!(matches!(Settings::load(&path), Err(AuditError::Config(_))));
        assert!(matches!(
            Settings::load(&temp_dir.path().join("absent.json")),
            Err(AuditError::Config(_))
        ));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let settings = Settings {
            request_timeout_secs: 0,
            ..Settings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_budget_clamped_and_timed() {
        let settings = Settings {
            item_budget: 0,
            time_budget_secs: Some(60),
            ..Settings::default()
        };
        let budget = settings.budget();
        assert_eq!(budget.items, 1);
        assert_eq!(budget.time, Some(Duration::from_secs(60)));
    }

    #[test]
    fn test_walker_config_carries_domains() {
        let settings = Settings {
            company_domains: vec!["acme.co.jp".to_string()],
            call_delay_ms: 0,
            ..Settings::default()
        };
        let config = settings.walker_config();
        assert_eq!(config.max_depth, DEFAULT_MAX_DEPTH);
        assert!(config.call_delay.is_zero());
        assert_eq!(config.company_domains, vec!["acme.co.jp"]);
    }
}
