mod common;

use std::fs;
use std::path::Path;

use anyhow::Result;
use ocrmcp::{ErrorKind, ServerConfig, WarningKind};
use serde_json::json;

use common::{dispatcher, dispatcher_with, png_bytes, FixedClassifier};

fn path_str(path: &Path) -> String {
    path.to_str().unwrap().to_string()
}

#[tokio::test]
async fn recognizes_a_file_on_disk() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let file = dir.path().join("captcha.png");
    fs::write(&file, png_bytes(120, 40))?;

    let result = dispatcher(FixedClassifier::new("x7Kp"))
        .call("captcha_recognize_file", json!({ "file_path": path_str(&file) }))
        .await;
    assert!(result.is_success());
    let payload = result.payload().unwrap();
    assert_eq!(payload["result"], json!("x7Kp"));
    assert_eq!(payload["file_path"], json!(path_str(&file)));
    assert!(result.warnings().is_empty());
    Ok(())
}

#[tokio::test]
async fn missing_file_and_directory_are_file_errors() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let dispatcher = dispatcher(FixedClassifier::new("x7Kp"));

    let missing = dispatcher
        .call(
            "captcha_recognize_file",
            json!({ "file_path": path_str(&dir.path().join("nope.png")) }),
        )
        .await;
    assert_eq!(missing.error_kind(), Some(ErrorKind::FileError));
    assert!(missing.error().unwrap().message.contains("does not exist"));

    let directory = dispatcher
        .call("captcha_recognize_file", json!({ "file_path": path_str(dir.path()) }))
        .await;
    assert_eq!(directory.error_kind(), Some(ErrorKind::FileError));
    Ok(())
}

#[tokio::test]
async fn unexpected_extension_only_warns() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let file = dir.path().join("captcha.dat");
    fs::write(&file, png_bytes(60, 20))?;

    let result = dispatcher(FixedClassifier::new("ab12"))
        .call("captcha_recognize_file", json!({ "file_path": path_str(&file) }))
        .await;
    assert!(result.is_success());
    assert_eq!(result.warnings()[0].kind, WarningKind::UnsupportedExtension);
    Ok(())
}

#[tokio::test]
async fn oversized_file_is_rejected_before_decoding() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let file = dir.path().join("big.png");
    fs::write(&file, png_bytes(200, 80))?;
    let config = ServerConfig {
        max_image_bytes: 128,
        ..ServerConfig::default()
    };

    let result = dispatcher_with(FixedClassifier::new("ab12"), config)
        .call("captcha_recognize_file", json!({ "file_path": path_str(&file) }))
        .await;
    assert_eq!(result.error_kind(), Some(ErrorKind::OversizeError));
    Ok(())
}

#[tokio::test]
async fn batch_reports_each_file() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let first = dir.path().join("a.png");
    let second = dir.path().join("b.jpg");
    fs::write(&first, png_bytes(80, 30))?;
    fs::write(&second, png_bytes(90, 30))?;
    let missing = dir.path().join("c.png");

    let result = dispatcher(FixedClassifier::new("q9Z"))
        .call(
            "captcha_recognize_batch",
            json!({ "file_paths": [path_str(&first), path_str(&missing), path_str(&second)] }),
        )
        .await;
    assert!(result.is_success());
    let payload = result.payload().unwrap();
    assert_eq!(payload["total_files"], json!(3));
    assert_eq!(payload["successful_count"], json!(2));
    assert_eq!(payload["failed_count"], json!(1));

    let results = payload["results"].as_array().unwrap();
    assert_eq!(results[0]["file_path"], json!(path_str(&first)));
    assert_eq!(results[0]["result"], json!("q9Z"));
    assert_eq!(results[1]["success"], json!(false));
    assert_eq!(results[1]["error"]["kind"], json!("file_error"));
    assert_eq!(results[2]["success"], json!(true));
    Ok(())
}

#[tokio::test]
async fn batch_over_the_cap_is_rejected() {
    let config = ServerConfig {
        max_batch_size: 2,
        ..ServerConfig::default()
    };
    let engine = FixedClassifier::new("ab12");
    let result = dispatcher_with(engine.clone(), config)
        .call(
            "captcha_recognize_batch",
            json!({ "file_paths": ["a.png", "b.png", "c.png"] }),
        )
        .await;
    assert_eq!(result.error_kind(), Some(ErrorKind::ValidationError));
    assert_eq!(result.error().and_then(|e| e.field.as_deref()), Some("file_paths"));
}
