use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use super::codec::CanonicalImage;
use super::stages::{Denoise, Enhance, Operation, PreprocessParams, Resize, Stage, StageOutcome};
use crate::error::{ToolWarning, WarningKind};
use crate::utils::panic_message;

#[derive(Clone, Debug)]
pub struct PipelineOutput {
    pub image: CanonicalImage,
    pub applied: Vec<String>,
    pub warnings: Vec<ToolWarning>,
}

/// Runs a caller-ordered list of stages over an image.
///
/// A stage that reports [`StageOutcome::Unchanged`] or panics keeps the
/// previous image, omits its label and records a warning; later stages still
/// run. A panic outside the stages discards all work and returns the original
/// image with no applied operations.
#[derive(Clone)]
pub struct Pipeline {
    stages: HashMap<Operation, Arc<dyn Stage>>,
}

impl Default for Pipeline {
    fn default() -> Self {
        let mut stages: HashMap<Operation, Arc<dyn Stage>> = HashMap::new();
        stages.insert(Operation::Denoise, Arc::new(Denoise));
        stages.insert(Operation::Enhance, Arc::new(Enhance));
        stages.insert(Operation::Resize, Arc::new(Resize));
        Self { stages }
    }
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the implementation behind `operation`.
    pub fn with_stage(mut self, operation: Operation, stage: Arc<dyn Stage>) -> Self {
        self.stages.insert(operation, stage);
        self
    }

    pub fn run(
        &self,
        image: &CanonicalImage,
        operations: &[Operation],
        params: &PreprocessParams,
    ) -> PipelineOutput {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            self.run_stages(image, operations, params)
        }));
        match outcome {
            Ok(output) => {
                info!(applied = ?output.applied, "image preprocessing finished");
                output
            }
            Err(payload) => {
                let reason = panic_message(payload.as_ref());
                error!(%reason, "image preprocessing aborted, keeping original image");
                PipelineOutput {
                    image: image.clone(),
                    applied: Vec::new(),
                    warnings: vec![ToolWarning::new(
                        WarningKind::PipelineAborted,
                        format!("preprocessing aborted: {reason}"),
                    )],
                }
            }
        }
    }

    fn run_stages(
        &self,
        image: &CanonicalImage,
        operations: &[Operation],
        params: &PreprocessParams,
    ) -> PipelineOutput {
        let mut current = image.clone();
        let mut applied = Vec::with_capacity(operations.len());
        let mut warnings = Vec::new();

        for operation in operations {
            let Some(stage) = self.stages.get(operation) else {
                warn!(%operation, "no stage registered for operation, skipping");
                warnings.push(ToolWarning::new(
                    WarningKind::UnknownOperation,
                    format!("no stage registered for `{operation}`"),
                ));
                continue;
            };
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| stage.apply(&current, params)))
                .unwrap_or_else(|payload| {
                    let reason = panic_message(payload.as_ref());
                    StageOutcome::unchanged(format!("stage panicked: {reason}"))
                });
            match outcome {
                StageOutcome::Applied(next) => {
                    debug!(%operation, width = next.width(), height = next.height(), "stage applied");
                    current = next;
                    applied.push(operation.label().to_string());
                }
                StageOutcome::Unchanged { reason } => {
                    warn!(%operation, %reason, "stage failed, keeping previous image");
                    warnings.push(ToolWarning::new(
                        WarningKind::StageFallback,
                        format!("{operation} skipped: {reason}"),
                    ));
                }
            }
        }

        PipelineOutput {
            image: current,
            applied,
            warnings,
        }
    }
}
