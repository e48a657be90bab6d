#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use image::{Rgb, RgbImage};
use ocrmcp::imaging::codec::{self, EncodeFormat};
use ocrmcp::{
    CanonicalImage, Classifier, ClassifierError, ClassifierHandle, Dispatcher, ServerConfig,
    ToolContext,
};

/// Dark glyph-like bars on a light background with a few isolated specks.
pub fn sample_image(width: u32, height: u32) -> CanonicalImage {
    let pixels = RgbImage::from_fn(width, height, |x, y| {
        if (x / 6) % 3 == 0 && y > height / 4 && y < height * 3 / 4 {
            Rgb([30, 30, 40])
        } else if (x * 7 + y * 13) % 97 == 0 {
            Rgb([0, 0, 0])
        } else {
            Rgb([225, 228, 230])
        }
    });
    CanonicalImage::from_rgb(pixels)
}

pub fn png_base64(width: u32, height: u32) -> String {
    codec::encode(&sample_image(width, height), EncodeFormat::Png).unwrap()
}

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    codec::encode_bytes(&sample_image(width, height), EncodeFormat::Png).unwrap()
}

/// Returns fixed text and counts calls.
pub struct FixedClassifier {
    pub text: &'static str,
    pub calls: AtomicUsize,
}

impl FixedClassifier {
    pub fn new(text: &'static str) -> Arc<Self> {
        Arc::new(Self {
            text,
            calls: AtomicUsize::new(0),
        })
    }
}

impl Classifier for FixedClassifier {
    fn classify(&self, _image: &[u8]) -> Result<String, ClassifierError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.text.to_string())
    }
}

pub struct FailingClassifier;

impl Classifier for FailingClassifier {
    fn classify(&self, _image: &[u8]) -> Result<String, ClassifierError> {
        Err(ClassifierError::Engine("model exploded".to_string()))
    }
}

pub struct SleepingClassifier(pub Duration);

impl Classifier for SleepingClassifier {
    fn classify(&self, _image: &[u8]) -> Result<String, ClassifierError> {
        thread::sleep(self.0);
        Ok("late".to_string())
    }
}

/// Not thread-safe engine that records the peak number of overlapping calls.
pub struct ExclusiveClassifier {
    active: AtomicUsize,
    pub peak: AtomicUsize,
}

impl ExclusiveClassifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        })
    }
}

impl Classifier for ExclusiveClassifier {
    fn classify(&self, _image: &[u8]) -> Result<String, ClassifierError> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        thread::sleep(Duration::from_millis(20));
        self.active.fetch_sub(1, Ordering::SeqCst);
        Ok("ab12cd".to_string())
    }

    fn is_thread_safe(&self) -> bool {
        false
    }
}

pub fn handle_for(classifier: Arc<dyn Classifier>, config: &ServerConfig) -> ClassifierHandle {
    ClassifierHandle::from_classifier(classifier, config.classifier_timeout())
}

pub fn dispatcher_with(classifier: Arc<dyn Classifier>, config: ServerConfig) -> Dispatcher {
    let handle = handle_for(classifier, &config);
    Dispatcher::with_context(ToolContext::new(config, handle)).unwrap()
}

pub fn dispatcher(classifier: Arc<dyn Classifier>) -> Dispatcher {
    dispatcher_with(classifier, ServerConfig::default())
}
