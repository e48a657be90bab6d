use std::env;
use std::str::FromStr;

use crate::error::{OcrMcpError, Result};

pub const MAX_IMAGE_BYTES: &str = "OCRMCP_MAX_IMAGE_BYTES";
pub const MAX_BATCH_SIZE: &str = "OCRMCP_MAX_BATCH_SIZE";
pub const CLASSIFIER_TIMEOUT_MS: &str = "OCRMCP_CLASSIFIER_TIMEOUT_MS";
pub const CLASSIFIER_CMD: &str = "OCRMCP_CLASSIFIER_CMD";
pub const RESPONSE_FORMAT: &str = "OCRMCP_RESPONSE_FORMAT";
pub const DEBUG: &str = "OCRMCP_DEBUG";

/// Access to `OCRMCP_*` environment variables.
pub struct EnvConfig;

impl EnvConfig {
    /// Value of `key`, or an error naming the missing variable.
    pub fn get_env(key: &str) -> Result<String> {
        env::var(key).map_err(|_| {
            OcrMcpError::Other(anyhow::anyhow!("environment variable `{key}` is not set"))
        })
    }

    /// Value of `key`; blank values count as unset.
    pub fn get_env_optional(key: &str) -> Option<String> {
        env::var(key).ok().filter(|value| !value.trim().is_empty())
    }

    /// Parses `raw` for `key`, naming the variable in the error.
    pub fn parse<T>(key: &str, raw: &str) -> Result<T>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        raw.trim().parse::<T>().map_err(|e| {
            OcrMcpError::Other(anyhow::anyhow!("invalid value `{raw}` for `{key}`: {e}"))
        })
    }

    /// Whether `OCRMCP_DEBUG` is set.
    pub fn is_debug_mode() -> bool {
        env::var(DEBUG).is_ok()
    }
}
