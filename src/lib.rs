pub mod classifier;
pub mod config;
pub mod error;
pub mod imaging;
pub mod protocol;
pub mod schema;
pub mod tools;
pub mod utils;

pub use classifier::{Classifier, ClassifierError, ClassifierFactory, ClassifierHandle, CommandClassifier};
pub use config::{ClassifierConfig, EnvConfig, ResponseFormat, ServerConfig};
pub use error::{ErrorKind, OcrMcpError, Result, ToolWarning, WarningKind};
pub use imaging::{CanonicalImage, Operation, Pipeline, PipelineOutput, PreprocessParams, Stage, StageOutcome};
pub use protocol::{RpcError, RpcRequest, RpcResponse, ToolServer};
pub use schema::{validate, Schema, SchemaError, SchemaKind};
pub use tools::{
    Dispatcher, ErrorRecord, ToolContext, ToolDescriptor, ToolKind, ToolOutput, ToolRegistry,
    ToolResult,
};
pub use utils::logging;
