use std::fs;

use anyhow::Result;
use ocrmcp::config::vars;
use ocrmcp::{ResponseFormat, ServerConfig};

#[test]
fn config_file_values_are_used() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("ocrmcp.json");
    fs::write(
        &path,
        r#"{
            "max_image_bytes": 2048,
            "response_format": "summary",
            "supported_extensions": ["png"],
            "classifier": { "command": "tesseract", "args": ["stdin", "stdout"], "thread_safe": false }
        }"#,
    )?;

    let config = ServerConfig::from_file(&path)?;
    assert_eq!(config.max_image_bytes, 2048);
    assert_eq!(config.max_batch_size, 10);
    assert_eq!(config.response_format, ResponseFormat::Summary);
    assert!(config.is_supported_extension("PNG"));
    assert!(!config.is_supported_extension("jpg"));
    assert_eq!(config.classifier.args, vec!["stdin", "stdout"]);
    assert!(!config.classifier.thread_safe);
    Ok(())
}

#[test]
fn overrides_apply_on_top_of_file() -> Result<()> {
    let base = ServerConfig::from_json_str(r#"{"max_batch_size": 4}"#)?;
    let config = base.with_overrides(|key| match key {
        k if k == vars::CLASSIFIER_TIMEOUT_MS => Some("1500".to_string()),
        k if k == vars::CLASSIFIER_CMD => Some("ocr-engine".to_string()),
        _ => None,
    })?;
    assert_eq!(config.max_batch_size, 4);
    assert_eq!(config.classifier_timeout_ms, 1500);
    assert_eq!(config.classifier.command.as_deref(), Some("ocr-engine"));
    Ok(())
}

#[test]
fn invalid_sources_are_errors() {
    assert!(ServerConfig::from_json_str(r#"{"max_image_bytes": "big"}"#).is_err());
    assert!(ServerConfig::from_json_str(r#"{"classifier_timeout_ms": 0}"#).is_err());
    assert!(ServerConfig::default()
        .with_overrides(|key| (key == vars::RESPONSE_FORMAT).then(|| "xml".to_string()))
        .is_err());
    assert!(ServerConfig::from_file(std::path::Path::new("/definitely/missing.json")).is_err());
}
