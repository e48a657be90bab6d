use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde_json::Value;

use super::descriptor::{self, ToolDescriptor};
use super::{preprocess, recognize};
use crate::classifier::{Classifier, ClassifierHandle, CommandClassifier};
use crate::config::ServerConfig;
use crate::error::{Result, ToolWarning};
use crate::imaging::Pipeline;
use crate::schema::Schema;

/// The closed set of tools this server exposes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ToolKind {
    CaptchaRecognize,
    CaptchaRecognizeFile,
    CaptchaRecognizeBatch,
    ImagePreprocess,
}

impl ToolKind {
    pub const ALL: [ToolKind; 4] = [
        ToolKind::CaptchaRecognize,
        ToolKind::ImagePreprocess,
        ToolKind::CaptchaRecognizeFile,
        ToolKind::CaptchaRecognizeBatch,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ToolKind::CaptchaRecognize => "captcha_recognize",
            ToolKind::CaptchaRecognizeFile => "captcha_recognize_file",
            ToolKind::CaptchaRecognizeBatch => "captcha_recognize_batch",
            ToolKind::ImagePreprocess => "image_preprocess",
        }
    }

    pub fn descriptor(&self, config: &ServerConfig) -> ToolDescriptor {
        match self {
            ToolKind::CaptchaRecognize => ToolDescriptor::new(
                self.name(),
                "Recognize the text in a captcha image supplied as base64 data",
                Schema::object([
                    ("image_data", descriptor::image_data()),
                    ("options", descriptor::recognition_options()),
                ])
                .require(["image_data"]),
            ),
            ToolKind::CaptchaRecognizeFile => ToolDescriptor::new(
                self.name(),
                "Recognize the text in a captcha image read from a local file",
                Schema::object([
                    ("file_path", descriptor::file_path()),
                    ("options", descriptor::recognition_options()),
                ])
                .require(["file_path"]),
            ),
            ToolKind::CaptchaRecognizeBatch => ToolDescriptor::new(
                self.name(),
                "Recognize captchas in several local image files, reporting each file separately",
                Schema::object([
                    ("file_paths", descriptor::file_paths(config.max_batch_size)),
                    ("options", descriptor::recognition_options()),
                ])
                .require(["file_paths"]),
            ),
            ToolKind::ImagePreprocess => ToolDescriptor::new(
                self.name(),
                "Denoise, enhance and resize an image to prepare it for recognition",
                Schema::object([
                    ("image_data", descriptor::image_data()),
                    ("operations", descriptor::operations()),
                    ("options", descriptor::preprocess_options()),
                ])
                .require(["image_data"]),
            ),
        }
    }

    /// Runs the tool on arguments that already passed schema validation.
    pub async fn execute(&self, ctx: &ToolContext, arguments: Value) -> Result<ToolOutput> {
        match self {
            ToolKind::CaptchaRecognize => recognize::recognize_inline(ctx, arguments).await,
            ToolKind::CaptchaRecognizeFile => recognize::recognize_file(ctx, arguments).await,
            ToolKind::CaptchaRecognizeBatch => recognize::recognize_batch(ctx, arguments).await,
            ToolKind::ImagePreprocess => preprocess::preprocess(ctx, arguments).await,
        }
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ToolKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        ToolKind::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| format!("unknown tool `{s}`"))
    }
}

/// What an executor hands back to the dispatcher.
#[derive(Clone, Debug, PartialEq)]
pub struct ToolOutput {
    pub summary: String,
    pub payload: Value,
    pub warnings: Vec<ToolWarning>,
}

/// Shared collaborators for every executor. Holds no per-call state.
#[derive(Clone)]
pub struct ToolContext {
    pub config: Arc<ServerConfig>,
    pub classifier: ClassifierHandle,
    pub pipeline: Arc<Pipeline>,
}

impl ToolContext {
    pub fn new(config: ServerConfig, classifier: ClassifierHandle) -> Self {
        Self {
            config: Arc::new(config),
            classifier,
            pipeline: Arc::new(Pipeline::default()),
        }
    }

    /// Context whose classifier is the configured external command,
    /// constructed on first use.
    pub fn from_config(config: ServerConfig) -> Self {
        let classifier_config = config.classifier.clone();
        let deadline = config.classifier_timeout();
        let classifier = ClassifierHandle::from_fn(
            move || {
                CommandClassifier::from_config(&classifier_config)
                    .map(|engine| Arc::new(engine.with_deadline(deadline)) as Arc<dyn Classifier>)
            },
            deadline,
        );
        Self::new(config, classifier)
    }

    pub fn with_pipeline(mut self, pipeline: Pipeline) -> Self {
        self.pipeline = Arc::new(pipeline);
        self
    }
}
