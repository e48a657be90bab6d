use std::sync::Arc;
use std::time::Instant;

use futures::future;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use super::source::{decode_file_bytes, decode_inline, read_image_file};
use super::{parse_args, run_blocking, ToolContext, ToolOutput};
use crate::error::{OcrMcpError, Result, ToolWarning, WarningKind};
use crate::imaging::codec::{self, CanonicalImage, EncodeFormat};
use crate::imaging::{Operation, PreprocessParams};

const BASE_CONFIDENCE: f64 = 0.7;
const IDEAL_LENGTH: f64 = 6.0;
const LENGTH_WEIGHT: f64 = 0.2;
const MIXED_BONUS: f64 = 0.20;
const LETTERS_BONUS: f64 = 0.15;
const DIGITS_BONUS: f64 = 0.10;
const MIN_CONFIDENCE: f64 = 0.1;
const MAX_CONFIDENCE: f64 = 0.99;

/// Operations applied when `options.preprocess` is on.
const RECOGNITION_OPERATIONS: [Operation; 2] = [Operation::Denoise, Operation::Enhance];

#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(default)]
pub struct RecognizeOptions {
    pub preprocess: bool,
    pub confidence_threshold: f64,
}

impl Default for RecognizeOptions {
    fn default() -> Self {
        Self {
            preprocess: true,
            confidence_threshold: 0.8,
        }
    }
}

#[derive(Deserialize)]
struct InlineArgs {
    image_data: String,
    #[serde(default)]
    options: RecognizeOptions,
}

#[derive(Deserialize)]
struct FileArgs {
    file_path: String,
    #[serde(default)]
    options: RecognizeOptions,
}

#[derive(Deserialize)]
struct BatchArgs {
    file_paths: Vec<String>,
    #[serde(default)]
    options: RecognizeOptions,
}

/// Heuristic confidence for recognized text; the engine reports none.
///
/// Base 0.7, plus up to 0.2 as the text approaches six characters, plus a
/// character-class bonus, clamped to `[0.1, 0.99]`. Empty text scores 0.
pub fn estimate_confidence(text: &str) -> f64 {
    if text.is_empty() {
        return 0.0;
    }
    let length_factor = (text.chars().count() as f64 / IDEAL_LENGTH).min(1.0);
    let all_alphanumeric = text.chars().all(char::is_alphanumeric);
    let has_letter = text.chars().any(char::is_alphabetic);
    let has_digit = text.chars().any(char::is_numeric);
    let class_bonus = match (all_alphanumeric, has_letter, has_digit) {
        (true, true, true) => MIXED_BONUS,
        (true, true, false) => LETTERS_BONUS,
        (true, false, true) => DIGITS_BONUS,
        _ => 0.0,
    };
    (BASE_CONFIDENCE + length_factor * LENGTH_WEIGHT + class_bonus).clamp(MIN_CONFIDENCE, MAX_CONFIDENCE)
}

pub(super) async fn recognize_inline(ctx: &ToolContext, arguments: Value) -> Result<ToolOutput> {
    let started = Instant::now();
    let args: InlineArgs = parse_args(arguments)?;
    info!(preprocess = args.options.preprocess, "starting captcha recognition");
    let image = decode_inline(ctx, args.image_data).await?;
    let recognition = recognize_image(ctx, image, &args.options).await?;
    Ok(recognition.into_output(started, None))
}

pub(super) async fn recognize_file(ctx: &ToolContext, arguments: Value) -> Result<ToolOutput> {
    let started = Instant::now();
    let args: FileArgs = parse_args(arguments)?;
    info!(path = %args.file_path, "starting captcha recognition from file");
    let recognition = recognize_path(ctx, &args.file_path, &args.options).await?;
    Ok(recognition.into_output(started, Some(&args.file_path)))
}

pub(super) async fn recognize_batch(ctx: &ToolContext, arguments: Value) -> Result<ToolOutput> {
    let started = Instant::now();
    let args: BatchArgs = parse_args(arguments)?;
    if args.file_paths.len() > ctx.config.max_batch_size {
        return Err(OcrMcpError::validation(
            "file_paths",
            format!("at most {} files per batch", ctx.config.max_batch_size),
        ));
    }
    info!(files = args.file_paths.len(), "starting batch captcha recognition");

    let items = args.file_paths.iter().map(|path| {
        let options = args.options;
        async move {
            let item_started = Instant::now();
            let outcome = recognize_path(ctx, path, &options).await;
            (path, item_started.elapsed().as_secs_f64(), outcome)
        }
    });
    let outcomes = future::join_all(items).await;

    let mut results = Vec::with_capacity(outcomes.len());
    let mut warnings = Vec::new();
    let mut successful = 0usize;
    for (path, elapsed, outcome) in outcomes {
        match outcome {
            Ok(recognition) => {
                successful += 1;
                warnings.extend(recognition.warnings.iter().cloned());
                results.push(json!({
                    "success": true,
                    "file_path": path,
                    "result": recognition.text,
                    "confidence": recognition.confidence,
                    "processing_time": elapsed,
                    "preprocess_applied": recognition.applied,
                }));
            }
            Err(err) => {
                warn!(path = %path, error = %err, "batch item failed");
                results.push(json!({
                    "success": false,
                    "file_path": path,
                    "processing_time": elapsed,
                    "error": { "kind": err.kind(), "message": err.to_string() },
                }));
            }
        }
    }

    let total = results.len();
    let failed = total - successful;
    let total_time = started.elapsed().as_secs_f64();
    Ok(ToolOutput {
        summary: format!(
            "Batch recognition finished: {successful}/{total} succeeded, {failed} failed\nProcessing time: {total_time:.2}s"
        ),
        payload: json!({
            "total_files": total,
            "successful_count": successful,
            "failed_count": failed,
            "results": results,
            "total_processing_time": total_time,
        }),
        warnings,
    })
}

async fn recognize_path(
    ctx: &ToolContext,
    file_path: &str,
    options: &RecognizeOptions,
) -> Result<Recognition> {
    let (bytes, file_warnings) = read_image_file(ctx, file_path).await?;
    let image = decode_file_bytes(ctx, bytes).await?;
    let mut recognition = recognize_image(ctx, image, options).await?;
    let mut warnings = file_warnings;
    warnings.append(&mut recognition.warnings);
    recognition.warnings = warnings;
    Ok(recognition)
}

struct Recognition {
    text: String,
    confidence: f64,
    threshold: f64,
    applied: Vec<String>,
    warnings: Vec<ToolWarning>,
}

impl Recognition {
    fn into_output(self, started: Instant, file_path: Option<&str>) -> ToolOutput {
        let processing_time = started.elapsed().as_secs_f64();
        let mut payload = json!({
            "result": self.text,
            "confidence": self.confidence,
            "confidence_threshold": self.threshold,
            "below_threshold": self.confidence < self.threshold,
            "processing_time": processing_time,
            "preprocess_applied": self.applied,
        });
        if let Some(path) = file_path {
            payload["file_path"] = Value::String(path.to_string());
        }
        let summary = format!(
            "Recognized: {}\nConfidence: {:.2}\nProcessing time: {:.2}s",
            self.text, self.confidence, processing_time
        );
        payload["text"] = Value::String(summary.clone());
        info!(result = %self.text, confidence = self.confidence, "captcha recognition finished");
        ToolOutput {
            summary,
            payload,
            warnings: self.warnings,
        }
    }
}

/// decoded -> [preprocessed] -> size-checked -> classified -> scored.
async fn recognize_image(
    ctx: &ToolContext,
    image: CanonicalImage,
    options: &RecognizeOptions,
) -> Result<Recognition> {
    let limit = ctx.config.max_image_bytes;
    let pipeline = Arc::clone(&ctx.pipeline);
    let preprocess = options.preprocess;

    let (png, applied, mut warnings) = run_blocking("preprocess", move || {
        let (image, applied, warnings) = if preprocess {
            let output = pipeline.run(&image, &RECOGNITION_OPERATIONS, &PreprocessParams::default());
            (output.image, output.applied, output.warnings)
        } else {
            (image, Vec::new(), Vec::new())
        };
        let png = codec::encode_bytes(&image, EncodeFormat::Png)?;
        codec::ensure_within_limit(png.len(), limit)?;
        Ok((png, applied, warnings))
    })
    .await?;

    let raw = ctx.classifier.classify(png).await?;
    let text = raw.trim().to_string();
    if text.is_empty() {
        return Err(OcrMcpError::EmptyRecognition);
    }

    let confidence = estimate_confidence(&text);
    if confidence < options.confidence_threshold {
        warn!(
            confidence,
            threshold = options.confidence_threshold,
            "recognition confidence below threshold"
        );
        warnings.push(ToolWarning::new(
            WarningKind::LowConfidence,
            format!(
                "confidence {confidence:.2} is below the threshold {:.2}",
                options.confidence_threshold
            ),
        ));
    }

    Ok(Recognition {
        text,
        confidence,
        threshold: options.confidence_threshold,
        applied,
        warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn empty_text_scores_zero() {
        assert_eq!(estimate_confidence(""), 0.0);
    }

    #[test]
    fn character_class_bonuses() {
        assert!(approx(estimate_confidence("ab"), 0.7 + 2.0 / 6.0 * 0.2 + 0.15));
        assert!(approx(estimate_confidence("12"), 0.7 + 2.0 / 6.0 * 0.2 + 0.10));
        assert!(approx(estimate_confidence("a1"), 0.7 + 2.0 / 6.0 * 0.2 + 0.20));
        assert!(approx(estimate_confidence("a-1"), 0.7 + 3.0 / 6.0 * 0.2));
    }

    #[test]
    fn long_mixed_text_is_clamped() {
        assert!(approx(estimate_confidence("ab12cd"), 0.99));
        assert!(approx(estimate_confidence("ab12cd34ef"), 0.99));
    }

    #[test]
    fn non_decreasing_with_length() {
        for sample in ["abcdef", "123456", "a1b2c3", "?!?!?!"] {
            let mut previous = 0.0;
            for len in 1..=6 {
                let prefix: String = sample.chars().take(len).collect();
                let score = estimate_confidence(&prefix);
                assert!(score >= previous, "{prefix}: {score} < {previous}");
                previous = score;
            }
        }
    }

    #[test]
    fn always_within_bounds() {
        for text in ["x", "验证码", "  ", "ab12cd34", "!!!!!!!!!!!!", "9"] {
            let score = estimate_confidence(text);
            assert!((0.0..=0.99).contains(&score), "{text}: {score}");
            assert!(score > 0.0);
        }
    }
}
