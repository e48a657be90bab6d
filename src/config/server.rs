use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::env::{self, EnvConfig};
use crate::error::{OcrMcpError, Result};

pub const DEFAULT_MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;
pub const DEFAULT_MAX_BATCH_SIZE: usize = 10;
pub const DEFAULT_CLASSIFIER_TIMEOUT_MS: u64 = 30_000;

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ResponseFormat {
    /// Whole envelope serialized as JSON.
    #[default]
    Json,
    /// Only the human-readable summary line(s).
    Summary,
}

impl FromStr for ResponseFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(ResponseFormat::Json),
            "summary" => Ok(ResponseFormat::Summary),
            other => Err(format!("expected `json` or `summary`, got `{other}`")),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ClassifierConfig {
    pub command: Option<String>,
    pub args: Vec<String>,
    pub thread_safe: bool,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            command: None,
            args: Vec::new(),
            thread_safe: true,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub max_image_bytes: usize,
    pub max_batch_size: usize,
    pub classifier_timeout_ms: u64,
    pub supported_extensions: Vec<String>,
    pub response_format: ResponseFormat,
    pub classifier: ClassifierConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_image_bytes: DEFAULT_MAX_IMAGE_BYTES,
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            classifier_timeout_ms: DEFAULT_CLASSIFIER_TIMEOUT_MS,
            supported_extensions: ["png", "jpg", "jpeg", "bmp", "gif", "webp"]
                .into_iter()
                .map(String::from)
                .collect(),
            response_format: ResponseFormat::Json,
            classifier: ClassifierConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Defaults, then the optional JSON file, then `OCRMCP_*` variables.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let base = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        base.with_overrides(EnvConfig::get_env_optional)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            OcrMcpError::Other(anyhow::anyhow!(
                "cannot read config `{}`: {e}",
                path.display()
            ))
        })?;
        debug!(path = %path.display(), "loaded config file");
        Self::from_json_str(&raw)
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(raw)?;
        config.checked()
    }

    /// Applies overrides from `lookup`, keyed by the `OCRMCP_*` names.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(env::MAX_IMAGE_BYTES) {
            self.max_image_bytes = EnvConfig::parse(env::MAX_IMAGE_BYTES, &raw)?;
        }
        if let Some(raw) = lookup(env::MAX_BATCH_SIZE) {
            self.max_batch_size = EnvConfig::parse(env::MAX_BATCH_SIZE, &raw)?;
        }
        if let Some(raw) = lookup(env::CLASSIFIER_TIMEOUT_MS) {
            self.classifier_timeout_ms = EnvConfig::parse(env::CLASSIFIER_TIMEOUT_MS, &raw)?;
        }
        if let Some(raw) = lookup(env::RESPONSE_FORMAT) {
            self.response_format = EnvConfig::parse(env::RESPONSE_FORMAT, &raw)?;
        }
        if let Some(command) = lookup(env::CLASSIFIER_CMD) {
            self.classifier.command = Some(command);
        }
        self.checked()
    }

    pub fn classifier_timeout(&self) -> Duration {
        Duration::from_millis(self.classifier_timeout_ms)
    }

    pub fn is_supported_extension(&self, extension: &str) -> bool {
        self.supported_extensions
            .iter()
            .any(|ext| ext.eq_ignore_ascii_case(extension))
    }

    fn checked(self) -> Result<Self> {
        if self.max_image_bytes == 0 {
            return Err(OcrMcpError::Other(anyhow::anyhow!(
                "max_image_bytes must be greater than zero"
            )));
        }
        if self.max_batch_size == 0 {
            return Err(OcrMcpError::Other(anyhow::anyhow!(
                "max_batch_size must be greater than zero"
            )));
        }
        if self.classifier_timeout_ms == 0 {
            return Err(OcrMcpError::Other(anyhow::anyhow!(
                "classifier_timeout_ms must be greater than zero"
            )));
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_match_documented_limits() {
        let config = ServerConfig::default();
        assert_eq!(config.max_image_bytes, 5_242_880);
        assert_eq!(config.max_batch_size, 10);
        assert_eq!(config.classifier_timeout(), Duration::from_secs(30));
        assert!(config.is_supported_extension("JPEG"));
        assert!(!config.is_supported_extension("tiff"));
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config = ServerConfig::from_json_str(
            r#"{"max_batch_size": 3, "classifier": {"command": "ocr-engine"}}"#,
        )
        .unwrap();
        assert_eq!(config.max_batch_size, 3);
        assert_eq!(config.max_image_bytes, DEFAULT_MAX_IMAGE_BYTES);
        assert_eq!(config.classifier.command.as_deref(), Some("ocr-engine"));
        assert!(config.classifier.thread_safe);
    }

    #[test]
    fn overrides_win_and_are_validated() {
        let vars: HashMap<&str, &str> = [
            (env::MAX_IMAGE_BYTES, "1024"),
            (env::RESPONSE_FORMAT, "summary"),
        ]
        .into_iter()
        .collect();
        let config = ServerConfig::default()
            .with_overrides(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.max_image_bytes, 1024);
        assert_eq!(config.response_format, ResponseFormat::Summary);

        let err = ServerConfig::default()
            .with_overrides(|key| (key == env::MAX_BATCH_SIZE).then(|| "0".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains("max_batch_size"));
    }
}
