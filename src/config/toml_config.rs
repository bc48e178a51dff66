use crate::app::assistant::GeminiSettings;
use crate::app::projection::{ProjectionMethod, DEFAULT_HORIZON, MAX_HORIZON};
use crate::app::services::{ServiceConfig, DEFAULT_AUTO_BACKUP_MINUTES, DEFAULT_AUTO_SAVE_SECS};
use crate::core::encoding::DEFAULT_MAX_FILE_SIZE_MB;
use crate::core::parser::DEFAULT_MAX_ERRORS;
use crate::core::store::BackupPolicy;
use crate::core::ConfigProvider;
use crate::utils::error::{CfoError, Result};
use crate::utils::validation::{
    validate_non_empty_string, validate_path, validate_positive_number, validate_range,
    validate_url, Validate,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_CONFIG_FILE: &str = "cfo-pro.toml";
pub const DEFAULT_DATA_DIR: &str = "./cfo-data";

/// Contents of `cfo-pro.toml`. Every section is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub storage: StorageConfig,
    pub import: ImportConfig,
    pub assistant: AssistantConfig,
    pub backup: BackupConfig,
    pub projection: ProjectionConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: DEFAULT_DATA_DIR.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    pub max_file_size_mb: u64,
    pub max_errors: usize,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            max_file_size_mb: DEFAULT_MAX_FILE_SIZE_MB,
            max_errors: DEFAULT_MAX_ERRORS,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantConfig {
    /// Used when the stored settings carry no key.
    pub api_key: Option<String>,
    #[serde(flatten)]
    pub gemini: GeminiSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackupConfig {
    pub auto_backup_minutes: u64,
    pub auto_save_secs: u64,
    pub max_manual: usize,
    pub keep_auto: usize,
}

impl Default for BackupConfig {
    fn default() -> Self {
        let policy = BackupPolicy::default();
        Self {
            auto_backup_minutes: DEFAULT_AUTO_BACKUP_MINUTES,
            auto_save_secs: DEFAULT_AUTO_SAVE_SECS,
            max_manual: policy.max_manual,
            keep_auto: policy.keep_auto,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectionConfig {
    pub horizon: u32,
    pub method: String,
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self {
            horizon: DEFAULT_HORIZON,
            method: "average".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub verbose: bool,
    pub json: bool,
}

impl AppConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(CfoError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// Loads `path` when it exists, defaults otherwise.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::from_file(path)
        } else {
            tracing::debug!(
                "No config file at {}, using defaults",
                path.as_ref().display()
            );
            Ok(Self::default())
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed = Self::substitute_env_vars(content)?;
        toml::from_str(&processed).map_err(|e| CfoError::ConfigError {
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// Replaces `${VAR}` with the environment value; unknown variables stay
    /// as written.
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = regex::Regex::new(r"\$\{([^}]+)\}").map_err(|e| CfoError::ConfigError {
            message: format!("invalid substitution pattern: {}", e),
        })?;
        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });
        Ok(result.to_string())
    }

    pub fn validate_config(&self) -> Result<()> {
        validate_path("storage.data_dir", &self.storage.data_dir)?;
        validate_range("import.max_file_size_mb", self.import.max_file_size_mb, 1, 1024)?;
        validate_positive_number("import.max_errors", self.import.max_errors, 1)?;
        validate_url("assistant.base_url", &self.assistant.gemini.base_url)?;
        validate_non_empty_string("assistant.model", &self.assistant.gemini.model)?;
        validate_range("assistant.timeout_secs", self.assistant.gemini.timeout_secs, 1, 600)?;
        validate_range("backup.auto_backup_minutes", self.backup.auto_backup_minutes, 1, 1440)?;
        validate_range("backup.auto_save_secs", self.backup.auto_save_secs, 1, 3600)?;
        validate_positive_number("backup.max_manual", self.backup.max_manual, 1)?;
        validate_positive_number("backup.keep_auto", self.backup.keep_auto, 1)?;
        validate_range("projection.horizon", self.projection.horizon, 1, MAX_HORIZON)?;
        self.projection_method()?;
        Ok(())
    }

    /// The configured key, unless it is blank or an unresolved `${VAR}`.
    pub fn api_key(&self) -> Option<&str> {
        self.assistant
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty() && !k.starts_with("${"))
    }

    pub fn projection_method(&self) -> Result<ProjectionMethod> {
        self.projection
            .method
            .parse()
            .map_err(|_| CfoError::InvalidConfigValueError {
                field: "projection.method".to_string(),
                value: self.projection.method.clone(),
                reason: "expected average, trend or seasonal".to_string(),
            })
    }

    pub fn backup_policy(&self) -> BackupPolicy {
        BackupPolicy {
            max_manual: self.backup.max_manual,
            keep_auto: self.backup.keep_auto,
        }
    }

    pub fn service_config(&self) -> ServiceConfig {
        ServiceConfig {
            auto_backup_every: Duration::from_secs(self.backup.auto_backup_minutes * 60),
            auto_save_every: Duration::from_secs(self.backup.auto_save_secs),
        }
    }
}

impl ConfigProvider for AppConfig {
    fn max_file_size_mb(&self) -> u64 {
        self.import.max_file_size_mb
    }

    fn max_errors(&self) -> usize {
        self.import.max_errors
    }
}

impl Validate for AppConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
