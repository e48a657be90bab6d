pub mod codec;
pub mod pipeline;
pub mod stages;

pub use codec::{CanonicalImage, CodecError, EncodeFormat};
pub use pipeline::{Pipeline, PipelineOutput};
pub use stages::{Operation, PreprocessParams, Stage, StageOutcome};
