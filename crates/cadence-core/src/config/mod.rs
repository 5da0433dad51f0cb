use crate::error::{CadenceError, Result};
use config::{Config, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CadenceConfig {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub web: WebConfig,
    #[serde(default)]
    pub user: UserConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub habits: HabitsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StorageConfig {
    /// Custom path for the SQLite database. Defaults to `~/.config/cadence/cadence.db`.
    #[serde(default)]
    pub path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    #[serde(default = "default_web_port")]
    pub port: u16,
    #[serde(default = "default_web_host")]
    pub host: String,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            port: default_web_port(),
            host: default_web_host(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UserConfig {
    /// Identity used by the CLI. The web server takes identity per request.
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Custom path for the audit log. Defaults to `~/.config/cadence/history.jsonl`.
    #[serde(default)]
    pub path: Option<String>,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HabitsConfig {
    /// Category assigned when a habit is created without one.
    #[serde(default = "default_category")]
    pub default_category: String,
    /// Default session length in minutes for new habits.
    #[serde(default = "default_minimum_duration")]
    pub default_minimum_duration: u32,
}

impl Default for HabitsConfig {
    fn default() -> Self {
        Self {
            default_category: default_category(),
            default_minimum_duration: default_minimum_duration(),
        }
    }
}

/// Resolve the current user's identity for local use.
///
/// Priority: config `user_id` → `$CADENCE_USER` → `$USER` → `"anonymous"`
pub fn resolve_user_id(config: &UserConfig) -> String {
    if let Some(ref id) = config.user_id {
        if !id.is_empty() {
            return id.clone();
        }
    }

    for var in ["CADENCE_USER", "USER", "USERNAME"] {
        if let Ok(name) = std::env::var(var) {
            let name = name.trim().to_string();
            if !name.is_empty() {
                return name;
            }
        }
    }

    "anonymous".to_string()
}

// -- Defaults --

fn default_web_port() -> u16 {
    37780
}
fn default_web_host() -> String {
    "127.0.0.1".to_string()
}
fn default_true() -> bool {
    true
}
fn default_category() -> String {
    crate::model::DEFAULT_CATEGORY.to_string()
}
fn default_minimum_duration() -> u32 {
    crate::model::DEFAULT_MINIMUM_DURATION
}

impl CadenceConfig {
    /// Load configuration with three-layer TOML merge:
    /// 1. ~/.config/cadence/config.toml (global)
    /// 2. .cadence/config.toml (project)
    /// 3. .cadence/config.local.toml (local, gitignored)
    pub fn load(project_dir: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();

        // Layer 1: Global config
        if let Some(global_path) = global_config_path() {
            if global_path.exists() {
                builder = builder.add_source(File::from(global_path).required(false));
            }
        }

        // Layer 2: Project config
        if let Some(dir) = project_dir {
            let project_config = dir.join(".cadence").join("config.toml");
            if project_config.exists() {
                builder = builder.add_source(File::from(project_config).required(false));
            }

            // Layer 3: Local config (gitignored)
            let local_config = dir.join(".cadence").join("config.local.toml");
            if local_config.exists() {
                builder = builder.add_source(File::from(local_config).required(false));
            }
        }

        let config = builder
            .build()
            .map_err(|e| CadenceError::Config(e.to_string()))?;

        let mut cfg: Self = config
            .try_deserialize()
            .map_err(|e| CadenceError::Config(e.to_string()))?;

        cfg.validate();
        Ok(cfg)
    }

    /// Load with defaults only (no files).
    pub fn default_config() -> Self {
        Self {
            storage: StorageConfig::default(),
            web: WebConfig::default(),
            user: UserConfig::default(),
            history: HistoryConfig::default(),
            habits: HabitsConfig::default(),
        }
    }

    /// Validate config values, clamping out-of-range values and logging warnings.
    /// This is lenient — it fixes values rather than rejecting the config.
    pub fn validate(&mut self) -> Vec<String> {
        let mut warnings = Vec::new();

        let minutes = &mut self.habits.default_minimum_duration;
        if !(crate::model::MIN_DURATION_MINUTES..=crate::model::MAX_DURATION_MINUTES)
            .contains(&*minutes)
        {
            let clamped = (*minutes).clamp(
                crate::model::MIN_DURATION_MINUTES,
                crate::model::MAX_DURATION_MINUTES,
            );
            warnings.push(format!(
                "habits.default_minimum_duration = {minutes} out of range, setting to {clamped}"
            ));
            *minutes = clamped;
        }

        let category = self.habits.default_category.trim().to_lowercase();
        if category.is_empty() {
            warnings.push("habits.default_category is empty, using 'general'".to_string());
            self.habits.default_category = default_category();
        } else {
            self.habits.default_category = category;
        }

        if self.web.port == 0 {
            warnings.push(format!(
                "web.port = 0, setting to {}",
                default_web_port()
            ));
            self.web.port = default_web_port();
        }

        // Log warnings via tracing (if subscriber is set up)
        for w in &warnings {
            tracing::warn!("config: {}", w);
        }

        warnings
    }

    /// Resolved SQLite path.
    pub fn database_path(&self) -> Result<PathBuf> {
        match &self.storage.path {
            Some(p) => Ok(PathBuf::from(p)),
            None => config_dir()
                .map(|p| p.join("cadence.db"))
                .ok_or_else(|| CadenceError::Config("cannot determine config directory".into())),
        }
    }

    /// Resolved audit-log path.
    pub fn history_path(&self) -> Option<PathBuf> {
        match &self.history.path {
            Some(p) => Some(PathBuf::from(p)),
            None => config_dir().map(|p| p.join("history.jsonl")),
        }
    }
}

fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("cadence"))
}

fn global_config_path() -> Option<PathBuf> {
    config_dir().map(|p| p.join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CadenceConfig::default_config();
        assert_eq!(config.web.port, 37780);
        assert_eq!(config.web.host, "127.0.0.1");
        assert!(config.history.enabled);
        assert_eq!(config.habits.default_category, "general");
        assert_eq!(config.habits.default_minimum_duration, 10);
        assert!(config.storage.path.is_none());
    }

    #[test]
    fn test_load_config_no_files() {
        // Loading with a non-existent directory should give defaults
        let config = CadenceConfig::load(Some(Path::new("/nonexistent/path"))).unwrap();
        assert_eq!(config.web.port, 37780);
    }

    #[test]
    fn test_config_serde_roundtrip() {
        let config = CadenceConfig::default_config();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: CadenceConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.web.port, config.web.port);
        assert_eq!(parsed.habits.default_category, config.habits.default_category);
    }

    #[test]
    fn test_partial_toml_parsing() {
        let toml_str = r#"
[storage]
path = "/tmp/cadence-test.db"

[habits]
default_category = "Health"
"#;
        let mut config: CadenceConfig = toml::from_str(toml_str).unwrap();
        config.validate();
        assert_eq!(config.storage.path.as_deref(), Some("/tmp/cadence-test.db"));
        assert_eq!(config.habits.default_category, "health");
        assert_eq!(config.web.port, 37780);
        assert_eq!(
            config.database_path().unwrap(),
            PathBuf::from("/tmp/cadence-test.db")
        );
    }

    #[test]
    fn test_validate_clamps_duration() {
        let mut config = CadenceConfig::default_config();
        config.habits.default_minimum_duration = 1000;
        let warnings = config.validate();
        assert_eq!(warnings.len(), 1);
        assert_eq!(config.habits.default_minimum_duration, 480);
    }

    #[test]
    fn test_validate_default_config_no_warnings() {
        let mut config = CadenceConfig::default_config();
        assert!(config.validate().is_empty());
    }

    #[test]
    fn test_resolve_user_id_explicit() {
        let config = UserConfig {
            user_id: Some("alice".to_string()),
        };
        assert_eq!(resolve_user_id(&config), "alice");
    }

    #[test]
    fn test_resolve_user_id_fallback() {
        let config = UserConfig::default();
        assert!(!resolve_user_id(&config).is_empty());
    }
}
