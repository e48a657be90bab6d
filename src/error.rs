use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, OcrMcpError>;

#[derive(Debug, Error)]
pub enum OcrMcpError {
    #[error("unknown tool `{0}`")]
    UnknownTool(String),
    #[error("tool `{0}` already registered")]
    DuplicateTool(String),
    #[error("invalid argument `{field}`: {reason}")]
    Validation { field: String, reason: String },
    #[error("image decode failed: {0}")]
    Decode(String),
    #[error("image is {size} bytes, exceeding the {limit} byte limit")]
    Oversize { size: usize, limit: usize },
    #[error("recognition failed: {0}")]
    Classification(String),
    #[error("recognition returned no text")]
    EmptyRecognition,
    #[error("image preprocessing failed: {0}")]
    Preprocessing(String),
    #[error("{operation} timed out after {millis} ms")]
    Timeout { operation: &'static str, millis: u64 },
    #[error("cannot use image file `{path}`: {reason}")]
    FileAccess { path: String, reason: String },
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("internal error: {0}")]
    Internal(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl OcrMcpError {
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnknownTool(_) => ErrorKind::UnknownTool,
            Self::DuplicateTool(_) => ErrorKind::DuplicateTool,
            Self::Validation { .. } => ErrorKind::ValidationError,
            Self::Decode(_) => ErrorKind::DecodeError,
            Self::Oversize { .. } => ErrorKind::OversizeError,
            Self::Classification(_) => ErrorKind::ClassificationError,
            Self::EmptyRecognition => ErrorKind::EmptyRecognition,
            Self::Preprocessing(_) => ErrorKind::PreprocessingError,
            Self::Timeout { .. } => ErrorKind::TimeoutError,
            Self::FileAccess { .. } => ErrorKind::FileError,
            Self::Serialization(_) => ErrorKind::SerializationError,
            Self::Internal(_) | Self::Other(_) => ErrorKind::InternalError,
        }
    }
}

impl From<serde_json::Error> for OcrMcpError {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}

/// Stable tag carried by every failed envelope.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    UnknownTool,
    DuplicateTool,
    ValidationError,
    DecodeError,
    OversizeError,
    ClassificationError,
    EmptyRecognition,
    PreprocessingError,
    TimeoutError,
    FileError,
    SerializationError,
    InternalError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnknownTool => "unknown_tool",
            Self::DuplicateTool => "duplicate_tool",
            Self::ValidationError => "validation_error",
            Self::DecodeError => "decode_error",
            Self::OversizeError => "oversize_error",
            Self::ClassificationError => "classification_error",
            Self::EmptyRecognition => "empty_recognition",
            Self::PreprocessingError => "preprocessing_error",
            Self::TimeoutError => "timeout_error",
            Self::FileError => "file_error",
            Self::SerializationError => "serialization_error",
            Self::InternalError => "internal_error",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Non-fatal issue attached to an otherwise successful call.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToolWarning {
    pub kind: WarningKind,
    pub message: String,
}

impl ToolWarning {
    pub fn new(kind: WarningKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    UnknownOperation,
    StageFallback,
    PipelineAborted,
    LowConfidence,
    EncodeFailed,
    UnsupportedExtension,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_serialize_to_their_tags() {
        for kind in [
            ErrorKind::UnknownTool,
            ErrorKind::ValidationError,
            ErrorKind::EmptyRecognition,
            ErrorKind::TimeoutError,
        ] {
            let encoded = serde_json::to_value(kind).unwrap();
            assert_eq!(encoded, serde_json::Value::String(kind.as_str().to_string()));
        }
    }

    #[test]
    fn other_errors_are_internal() {
        let err = OcrMcpError::Other(anyhow::anyhow!("boom"));
        assert_eq!(err.kind(), ErrorKind::InternalError);
        assert_eq!(
            OcrMcpError::validation("image_data", "missing").kind(),
            ErrorKind::ValidationError
        );
    }
}
