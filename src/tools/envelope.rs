use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::tool::ToolOutput;
use crate::config::ResponseFormat;
use crate::error::{ErrorKind, OcrMcpError, ToolWarning};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ErrorRecord {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl From<&OcrMcpError> for ErrorRecord {
    fn from(error: &OcrMcpError) -> Self {
        let field = match error {
            OcrMcpError::Validation { field, .. } => Some(field.clone()),
            _ => None,
        };
        Self {
            kind: error.kind(),
            message: error.to_string(),
            field,
        }
    }
}

/// Uniform outcome of one tool call. Built once by the dispatcher and only
/// read afterwards.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ToolResult {
    success: bool,
    tool: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    payload: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<ErrorRecord>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    warnings: Vec<ToolWarning>,
    elapsed_seconds: f64,
    #[serde(skip)]
    summary: String,
}

impl ToolResult {
    pub fn success(tool: impl Into<String>, output: ToolOutput, elapsed_seconds: f64) -> Self {
        Self {
            success: true,
            tool: tool.into(),
            payload: Some(output.payload),
            error: None,
            warnings: output.warnings,
            elapsed_seconds,
            summary: output.summary,
        }
    }

    pub fn failure(tool: impl Into<String>, error: &OcrMcpError, elapsed_seconds: f64) -> Self {
        let record = ErrorRecord::from(error);
        Self {
            success: false,
            tool: tool.into(),
            payload: None,
            summary: format!("Error [{}]: {}", record.kind, record.message),
            error: Some(record),
            warnings: Vec::new(),
            elapsed_seconds,
        }
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn tool(&self) -> &str {
        &self.tool
    }

    pub fn payload(&self) -> Option<&Value> {
        self.payload.as_ref()
    }

    pub fn error(&self) -> Option<&ErrorRecord> {
        self.error.as_ref()
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error.as_ref().map(|record| record.kind)
    }

    pub fn warnings(&self) -> &[ToolWarning] {
        &self.warnings
    }

    pub fn elapsed_seconds(&self) -> f64 {
        self.elapsed_seconds
    }

    pub fn summary(&self) -> &str {
        &self.summary
    }

    /// Text placed in the single content item of a call response.
    pub fn render(&self, format: ResponseFormat) -> String {
        match format {
            ResponseFormat::Json => serde_json::to_string_pretty(self)
                .unwrap_or_else(|_| self.render(ResponseFormat::Summary)),
            ResponseFormat::Summary => {
                let mut text = self.summary.clone();
                for warning in &self.warnings {
                    text.push_str("\nWarning: ");
                    text.push_str(&warning.message);
                }
                text
            }
        }
    }
}
