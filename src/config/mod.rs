mod env;
mod server;

pub use env::EnvConfig;
pub use server::{ClassifierConfig, ResponseFormat, ServerConfig};

pub mod vars {
    pub use super::env::{
        CLASSIFIER_CMD, CLASSIFIER_TIMEOUT_MS, DEBUG, MAX_BATCH_SIZE, MAX_IMAGE_BYTES,
        RESPONSE_FORMAT,
    };
}
