use std::{
    collections::BTreeSet,
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, anyhow};
use jsonschema::{JSONSchema, ValidationError};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{adapters::credentials::CredentialRef, extraction::ports::ModelIdentity};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub mock_mode: bool,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default)]
    pub backends: Vec<BackendConfig>,
    pub experts: Vec<ModelRouteConfig>,
    pub consolidator: ModelRouteConfig,
    pub mapper: ModelRouteConfig,
}

fn default_request_timeout_ms() -> u64 {
    120_000
}

fn default_tasks_dir() -> PathBuf {
    PathBuf::from("./storage/tasks")
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("./storage/cache")
}

fn default_enabled_true() -> bool {
    true
}

fn default_logging_dir() -> PathBuf {
    PathBuf::from("./logs")
}

fn default_logging_filter() -> String {
    "info".to_string()
}

fn default_logging_rotation() -> LoggingRotation {
    LoggingRotation::Daily
}

fn default_logging_retention_days() -> usize {
    14
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_tasks_dir")]
    pub tasks_dir: PathBuf,
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            tasks_dir: default_tasks_dir(),
            cache_dir: default_cache_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum LoggingRotation {
    Daily,
    Hourly,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_logging_filter")]
    pub filter: String,
    #[serde(default = "default_logging_rotation")]
    pub rotation: LoggingRotation,
    #[serde(default = "default_logging_retention_days")]
    pub retention_days: usize,
    #[serde(default = "default_enabled_true")]
    pub stderr_warn_enabled: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: default_logging_dir(),
            filter: default_logging_filter(),
            rotation: default_logging_rotation(),
            retention_days: default_logging_retention_days(),
            stderr_warn_enabled: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    pub id: String,
    pub endpoint: String,
    #[serde(default)]
    pub credential: CredentialRef,
    #[serde(default)]
    pub max_output_tokens: Option<u64>,
}

/// Which model on which backend plays a role. `provider` only selects the
/// pricing table; it is never sent to the backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelRouteConfig {
    pub backend_id: String,
    pub model_id: String,
    #[serde(default)]
    pub provider: Option<String>,
}

impl ModelRouteConfig {
    pub fn identity(&self) -> ModelIdentity {
        ModelIdentity::new(self.model_id.clone(), self.provider.clone())
    }
}

impl Config {
    pub fn load(config_path: &Path) -> Result<Self> {
        let config_content = fs::read_to_string(config_path)
            .with_context(|| format!("failed to read {}", config_path.display()))?;
        let config_value: Value = json5::from_str(&config_content)
            .with_context(|| format!("failed to parse {}", config_path.display()))?;

        let config_base = config_path.parent().unwrap_or_else(|| Path::new("."));
        let schema_path = resolve_schema_path(config_base, &config_value)?;
        validate_against_schema(&config_value, &schema_path)?;

        let mut config: Config =
            serde_json::from_value(config_value).context("failed to deserialize certex config")?;

        for path in [
            &mut config.storage.tasks_dir,
            &mut config.storage.cache_dir,
            &mut config.logging.dir,
        ] {
            if !path.is_absolute() {
                *path = config_base.join(&*path);
            }
        }

        Ok(config)
    }

    /// Experts in configuration order. A repeated model identity would collide
    /// on the same cache entry, so only its first occurrence is kept.
    pub fn enabled_experts(&self) -> Vec<&ModelRouteConfig> {
        let mut seen = BTreeSet::new();
        self.experts
            .iter()
            .filter(|expert| {
                let identity = expert.identity();
                let fresh = seen.insert((identity.model_id.clone(), identity.provider.clone()));
                if !fresh {
                    tracing::warn!(
                        target: "config",
                        model = %identity.model_id,
                        provider = identity.provider_label(),
                        backend_id = %expert.backend_id,
                        "duplicate_expert_skipped"
                    );
                }
                fresh
            })
            .collect()
    }
}

fn resolve_schema_path(config_base: &Path, config_value: &Value) -> Result<PathBuf> {
    if let Some(path_text) = config_value.get("$schema").and_then(|value| value.as_str()) {
        let configured = PathBuf::from(path_text);
        if configured.is_absolute() {
            return Ok(configured);
        }
        return Ok(config_base.join(&configured));
    }

    let local_default = config_base.join("certex.schema.json");
    if local_default.exists() {
        return Ok(local_default);
    }

    Err(anyhow!(
        "unable to resolve schema path: expected $schema in config or certex.schema.json next to it"
    ))
}

fn validate_against_schema(config_value: &Value, schema_path: &Path) -> Result<()> {
    let schema_content = fs::read_to_string(schema_path)
        .with_context(|| format!("failed to read schema {}", schema_path.display()))?;
    let schema: Value = serde_json::from_str(&schema_content)
        .with_context(|| format!("failed to parse schema {}", schema_path.display()))?;

    let compiled =
        JSONSchema::compile(&schema).map_err(|e| anyhow!("failed to compile schema: {e}"))?;

    match compiled.validate(config_value) {
        Ok(()) => Ok(()),
        Err(errors_iter) => {
            let validation_errors: Vec<ValidationError> = errors_iter.collect();
            let messages: Vec<String> = validation_errors
                .into_iter()
                .map(|error| error.to_string())
                .collect();
            Err(anyhow!("config validation failed: {}", messages.join("; ")))
        }
    }
}
