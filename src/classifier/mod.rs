mod command;

use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, info};

use crate::error::{OcrMcpError, Result};

pub use command::CommandClassifier;

#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("recognition engine unavailable: {0}")]
    Unavailable(String),
    #[error("{0}")]
    Engine(String),
    #[error("recognition did not finish within {millis} ms")]
    Timeout { millis: u64 },
}

impl From<ClassifierError> for OcrMcpError {
    fn from(error: ClassifierError) -> Self {
        match error {
            ClassifierError::Timeout { millis } => OcrMcpError::Timeout {
                operation: "classification",
                millis,
            },
            other => OcrMcpError::Classification(other.to_string()),
        }
    }
}

/// Opaque recognition engine: image bytes in, text out.
pub trait Classifier: Send + Sync {
    fn classify(&self, image: &[u8]) -> std::result::Result<String, ClassifierError>;

    /// Engines returning `false` get their `classify` calls serialized.
    fn is_thread_safe(&self) -> bool {
        true
    }
}

pub type ClassifierFactory =
    Arc<dyn Fn() -> std::result::Result<Arc<dyn Classifier>, ClassifierError> + Send + Sync>;

struct Engine {
    classifier: Arc<dyn Classifier>,
    gate: Option<Mutex<()>>,
}

impl Engine {
    fn build(factory: &ClassifierFactory) -> std::result::Result<Self, ClassifierError> {
        let classifier = factory()?;
        let gate = (!classifier.is_thread_safe()).then(|| Mutex::new(()));
        info!(serialized = gate.is_some(), "recognition engine constructed");
        Ok(Self { classifier, gate })
    }

    fn classify(&self, image: &[u8]) -> std::result::Result<String, ClassifierError> {
        match &self.gate {
            Some(gate) => {
                let _guard = gate.lock();
                self.classifier.classify(image)
            }
            None => self.classifier.classify(image),
        }
    }
}

/// Shared, lazily constructed classifier.
///
/// The engine is built by the first call that needs it; concurrent first
/// calls block on the same [`OnceCell`] so the factory runs once. A failed
/// construction leaves the cell empty and the next call tries again. Both
/// construction and `classify` run on the blocking pool under `timeout`.
#[derive(Clone)]
pub struct ClassifierHandle {
    factory: ClassifierFactory,
    engine: Arc<OnceCell<Engine>>,
    timeout: Duration,
}

impl ClassifierHandle {
    pub fn new(factory: ClassifierFactory, timeout: Duration) -> Self {
        Self {
            factory,
            engine: Arc::new(OnceCell::new()),
            timeout,
        }
    }

    pub fn from_fn<F>(factory: F, timeout: Duration) -> Self
    where
        F: Fn() -> std::result::Result<Arc<dyn Classifier>, ClassifierError> + Send + Sync + 'static,
    {
        Self::new(Arc::new(factory), timeout)
    }

    /// Handle around an already constructed engine.
    pub fn from_classifier(classifier: Arc<dyn Classifier>, timeout: Duration) -> Self {
        Self::from_fn(move || Ok(Arc::clone(&classifier)), timeout)
    }

    pub fn is_initialized(&self) -> bool {
        self.engine.get().is_some()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn classify(&self, image: Vec<u8>) -> Result<String> {
        let engine = Arc::clone(&self.engine);
        let factory = Arc::clone(&self.factory);
        let task = tokio::task::spawn_blocking(move || {
            let engine = engine.get_or_try_init(|| Engine::build(&factory))?;
            engine.classify(&image)
        });

        match tokio::time::timeout(self.timeout, task).await {
            Err(_) => Err(OcrMcpError::Timeout {
                operation: "classification",
                millis: self.timeout.as_millis() as u64,
            }),
            Ok(Err(join_error)) => Err(OcrMcpError::Classification(format!(
                "recognition engine crashed: {join_error}"
            ))),
            Ok(Ok(result)) => {
                let text = result?;
                debug!(chars = text.chars().count(), "classifier returned");
                Ok(text)
            }
        }
    }
}
