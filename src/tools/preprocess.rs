use std::sync::Arc;
use std::time::Instant;

use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use super::source::decode_inline;
use super::{parse_args, run_blocking, ToolContext, ToolOutput};
use crate::error::{OcrMcpError, Result, ToolWarning, WarningKind};
use crate::imaging::codec::{self, EncodeFormat};
use crate::imaging::{Operation, PreprocessParams};

#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(default)]
pub struct PreprocessOptions {
    pub contrast: f32,
    pub sharpness: f32,
    pub max_width: u32,
    pub max_height: u32,
    pub return_processed_image: bool,
}

impl Default for PreprocessOptions {
    fn default() -> Self {
        let params = PreprocessParams::default();
        Self {
            contrast: params.contrast,
            sharpness: params.sharpness,
            max_width: params.max_size.0,
            max_height: params.max_size.1,
            return_processed_image: false,
        }
    }
}

impl PreprocessOptions {
    pub fn params(&self) -> PreprocessParams {
        PreprocessParams {
            contrast: self.contrast,
            sharpness: self.sharpness,
            max_size: (self.max_width, self.max_height),
        }
    }
}

#[derive(Deserialize)]
struct PreprocessArgs {
    image_data: String,
    #[serde(default = "default_operations")]
    operations: Vec<String>,
    #[serde(default)]
    options: PreprocessOptions,
}

fn default_operations() -> Vec<String> {
    vec![
        Operation::Denoise.as_str().to_string(),
        Operation::Enhance.as_str().to_string(),
    ]
}

/// Maps requested names to operations, keeping caller order.
///
/// The tool schema already restricts names to the known set, so the skip
/// branch only matters for callers that bypass validation.
pub fn parse_operations(names: &[String]) -> (Vec<Operation>, Vec<ToolWarning>) {
    let mut operations = Vec::with_capacity(names.len());
    let mut warnings = Vec::new();
    for name in names {
        match name.parse::<Operation>() {
            Ok(operation) => operations.push(operation),
            Err(reason) => {
                warn!(operation = %name, "skipping unknown preprocessing operation");
                warnings.push(ToolWarning::new(WarningKind::UnknownOperation, reason));
            }
        }
    }
    (operations, warnings)
}

pub(super) async fn preprocess(ctx: &ToolContext, arguments: Value) -> Result<ToolOutput> {
    let started = Instant::now();
    let args: PreprocessArgs = parse_args(arguments)?;
    let (operations, mut warnings) = parse_operations(&args.operations);
    info!(?operations, "starting image preprocessing");

    let image = decode_inline(ctx, args.image_data).await?;
    let original_size = image.dimensions();
    debug!(width = original_size.0, height = original_size.1, "original image size");

    let pipeline = Arc::clone(&ctx.pipeline);
    let params = args.options.params();
    let output = tokio::task::spawn_blocking(move || pipeline.run(&image, &operations, &params))
        .await
        .map_err(|e| OcrMcpError::Preprocessing(e.to_string()))?;
    warnings.extend(output.warnings);

    let processed_size = output.image.dimensions();
    let processing_time = started.elapsed().as_secs_f64();
    let applied_text = if output.applied.is_empty() {
        "none".to_string()
    } else {
        output.applied.join(", ")
    };
    let summary = [
        "Image preprocessing complete".to_string(),
        format!("Applied operations: {applied_text}"),
        format!("Original size: {}x{}", original_size.0, original_size.1),
        format!("Processed size: {}x{}", processed_size.0, processed_size.1),
        format!("Processing time: {processing_time:.2}s"),
    ]
    .join("\n");

    let mut payload = json!({
        "text": summary,
        "applied_operations": output.applied,
        "original_size": [original_size.0, original_size.1],
        "processed_size": [processed_size.0, processed_size.1],
        "processing_time": processing_time,
    });

    if args.options.return_processed_image {
        let image = output.image;
        match run_blocking("encode", move || Ok(codec::encode(&image, EncodeFormat::Png)?)).await {
            Ok(encoded) => {
                debug!(chars = encoded.len(), "attached processed image");
                payload["processed_image_data"] = Value::String(encoded);
            }
            Err(err) => {
                warn!(error = %err, "failed to encode processed image");
                warnings.push(ToolWarning::new(
                    WarningKind::EncodeFailed,
                    format!("processed image omitted: {err}"),
                ));
            }
        }
    }

    info!(processing_time, "image preprocessing finished");
    Ok(ToolOutput {
        summary,
        payload,
        warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_names_are_skipped_with_warning() {
        let names: Vec<String> = ["resize", "sharpen", "denoise"]
            .into_iter()
            .map(String::from)
            .collect();
        let (operations, warnings) = parse_operations(&names);
        assert_eq!(operations, vec![Operation::Resize, Operation::Denoise]);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].kind, WarningKind::UnknownOperation);
        assert!(warnings[0].message.contains("sharpen"));
    }

    #[test]
    fn default_options_match_schema_defaults() {
        let options: PreprocessOptions = serde_json::from_value(json!({})).unwrap();
        assert_eq!(options.params(), PreprocessParams::default());
        assert!(!options.return_processed_image);
    }
}
