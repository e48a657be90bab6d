use thiserror::Error;

use crate::error::OcrMcpError;

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("schema validation failed at `{}`: {message}", field_name(path))]
    Validation { message: String, path: Vec<String> },
}

impl SchemaError {
    pub fn field(&self) -> String {
        match self {
            SchemaError::Validation { path, .. } => field_name(path),
        }
    }
}

fn field_name(path: &[String]) -> String {
    if path.is_empty() {
        "arguments".to_string()
    } else {
        path.join(".")
    }
}

impl From<SchemaError> for OcrMcpError {
    fn from(error: SchemaError) -> Self {
        let field = error.field();
        match error {
            SchemaError::Validation { message, .. } => OcrMcpError::Validation {
                field,
                reason: message,
            },
        }
    }
}
