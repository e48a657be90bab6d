use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt;
use serde_json::{Map, Value};
use tracing::{debug, error, info, info_span, Instrument};

use super::envelope::ToolResult;
use super::registry::ToolRegistry;
use super::tool::{ToolContext, ToolOutput};
use super::ToolDescriptor;
use crate::config::ServerConfig;
use crate::error::{OcrMcpError, Result};
use crate::schema;
use crate::utils::panic_message;

/// Resolves tool names, validates arguments, runs the executor and wraps
/// whatever happens into a [`ToolResult`]. Holds no per-call state.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<ToolRegistry>,
    context: ToolContext,
}

impl Dispatcher {
    pub fn new(registry: Arc<ToolRegistry>, context: ToolContext) -> Self {
        Self { registry, context }
    }

    /// Built-in tools backed by the configured recognition command.
    pub fn from_config(config: ServerConfig) -> Result<Self> {
        let registry = ToolRegistry::builtin(&config)?;
        Ok(Self::new(Arc::new(registry), ToolContext::from_config(config)))
    }

    /// Built-in tools over an explicit context.
    pub fn with_context(context: ToolContext) -> Result<Self> {
        let registry = ToolRegistry::builtin(&context.config)?;
        Ok(Self::new(Arc::new(registry), context))
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn context(&self) -> &ToolContext {
        &self.context
    }

    pub fn list_tools(&self) -> Vec<ToolDescriptor> {
        self.registry.list().cloned().collect()
    }

    /// Never fails: every error, including an executor panic, ends up in
    /// the returned envelope.
    pub async fn call(&self, name: &str, arguments: Value) -> ToolResult {
        let span = info_span!("tool_call", tool = %name);
        async {
            let started = Instant::now();
            let outcome = self.run(name, arguments).await;
            let elapsed = started.elapsed().as_secs_f64();
            match outcome {
                Ok(output) => {
                    info!(elapsed, warnings = output.warnings.len(), "tool call succeeded");
                    ToolResult::success(name, output, elapsed)
                }
                Err(err) => {
                    error!(kind = %err.kind(), error = %err, elapsed, "tool call failed");
                    ToolResult::failure(name, &err, elapsed)
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn run(&self, name: &str, arguments: Value) -> Result<ToolOutput> {
        let (descriptor, kind) = self
            .registry
            .entry(name)
            .ok_or_else(|| OcrMcpError::UnknownTool(name.to_string()))?;

        let arguments = match arguments {
            Value::Null => Value::Object(Map::new()),
            other => other,
        };
        schema::validate(&descriptor.schema, &arguments)?;
        debug!("arguments validated");

        AssertUnwindSafe(kind.execute(&self.context, arguments))
            .catch_unwind()
            .await
            .map_err(|payload| {
                OcrMcpError::Internal(format!("executor panicked: {}", panic_message(payload.as_ref())))
            })?
    }
}
