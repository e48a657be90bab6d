pub mod descriptor;
pub mod dispatcher;
pub mod envelope;
pub mod preprocess;
pub mod recognize;
pub mod registry;
mod source;
pub mod tool;

use serde::de::DeserializeOwned;
use serde_json::Value;

pub use descriptor::ToolDescriptor;
pub use dispatcher::Dispatcher;
pub use envelope::{ErrorRecord, ToolResult};
pub use registry::ToolRegistry;
pub use tool::{ToolContext, ToolKind, ToolOutput};

use crate::error::{OcrMcpError, Result};

/// Deserializes already-validated arguments into the executor's typed form.
fn parse_args<T: DeserializeOwned>(arguments: Value) -> Result<T> {
    serde_json::from_value(arguments)
        .map_err(|e| OcrMcpError::validation("arguments", e.to_string()))
}

/// Runs CPU-bound image work on the blocking pool.
async fn run_blocking<T, F>(task: &'static str, work: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| OcrMcpError::Internal(format!("{task} task failed: {e}")))?
}
