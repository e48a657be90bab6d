use std::path::Path;

use tracing::{debug, warn};

use super::{run_blocking, ToolContext};
use crate::error::{OcrMcpError, Result, ToolWarning, WarningKind};
use crate::imaging::codec::{self, CanonicalImage};

/// Decodes inline base64 data (data URL header allowed) and enforces the
/// size ceiling on both the raw payload and the re-encoded bitmap.
pub(super) async fn decode_inline(ctx: &ToolContext, image_data: String) -> Result<CanonicalImage> {
    let limit = ctx.config.max_image_bytes;
    run_blocking("decode", move || {
        let bytes = codec::decode_base64(&image_data, true)?;
        codec::ensure_within_limit(bytes.len(), limit)?;
        decode_checked(&bytes, limit)
    })
    .await
}

/// Decodes file bytes that already passed the read-time size check.
pub(super) async fn decode_file_bytes(ctx: &ToolContext, bytes: Vec<u8>) -> Result<CanonicalImage> {
    let limit = ctx.config.max_image_bytes;
    run_blocking("decode", move || decode_checked(&bytes, limit)).await
}

fn decode_checked(bytes: &[u8], limit: usize) -> Result<CanonicalImage> {
    let image = codec::decode_bytes(bytes)?;
    let footprint = codec::size_in_bytes(&image)?;
    codec::ensure_within_limit(footprint, limit)?;
    Ok(image)
}

/// Reads an image file from disk.
///
/// Missing paths and non-regular files fail; an unexpected extension only
/// produces a warning. The size ceiling is checked against the file
/// metadata before reading and against the bytes actually read.
pub(super) async fn read_image_file(
    ctx: &ToolContext,
    file_path: &str,
) -> Result<(Vec<u8>, Vec<ToolWarning>)> {
    let path = Path::new(file_path);
    let file_error = |reason: String| OcrMcpError::FileAccess {
        path: file_path.to_string(),
        reason,
    };

    let metadata = tokio::fs::metadata(path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => file_error("file does not exist".to_string()),
        _ => file_error(e.to_string()),
    })?;
    if !metadata.is_file() {
        return Err(file_error("path is not a regular file".to_string()));
    }

    let mut warnings = Vec::new();
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or_default();
    if !ctx.config.is_supported_extension(extension) {
        warn!(path = %file_path, %extension, "image file extension may not be supported");
        warnings.push(ToolWarning::new(
            WarningKind::UnsupportedExtension,
            format!("extension `{extension}` of `{file_path}` may not be supported"),
        ));
    }

    let limit = ctx.config.max_image_bytes;
    codec::ensure_within_limit(metadata.len() as usize, limit)?;

    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| file_error(e.to_string()))?;
    codec::ensure_within_limit(bytes.len(), limit)?;
    debug!(path = %file_path, bytes = bytes.len(), "read image file");
    Ok((bytes, warnings))
}
