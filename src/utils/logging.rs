use std::io;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::EnvConfig;

/// Logging setup.
pub struct LoggingConfig;

impl LoggingConfig {
    /// Installs the global subscriber.
    ///
    /// Logs go to stderr; stdout is reserved for protocol frames. Honors:
    /// - RUST_LOG: log level or filter directives
    /// - OCRMCP_DEBUG: verbose output with targets, files and thread ids
    ///
    /// Example:
    /// ```no_run
    /// use ocrmcp::utils::LoggingConfig;
    ///
    /// fn main() {
    ///     LoggingConfig::init();
    ///     tracing::info!("ready");
    /// }
    /// ```
    pub fn init() {
        let is_debug = Self::is_debug();

        let env_filter = match EnvFilter::try_from_default_env() {
            Ok(filter) => filter,
            Err(_) => EnvFilter::new(Self::default_filter(is_debug)),
        };

        let fmt_layer = if is_debug {
            fmt::layer()
                .with_writer(io::stderr)
                .with_ansi(false)
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .with_thread_ids(true)
        } else {
            fmt::layer()
                .with_writer(io::stderr)
                .with_ansi(false)
                .with_target(false)
                .with_file(false)
                .with_line_number(false)
                .with_thread_ids(false)
        };

        // A subscriber may already be installed by tests or an embedding host.
        let _ = tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init();

        if is_debug {
            tracing::debug!("debug mode enabled");
        }
    }

    /// Installs the global subscriber with an explicit filter.
    pub fn init_with_filter(filter: &str) {
        let _ = tracing_subscriber::registry()
            .with(EnvFilter::new(filter))
            .with(fmt::layer().with_writer(io::stderr).with_ansi(false))
            .try_init();
    }

    /// Whether `OCRMCP_DEBUG` is set.
    pub fn is_debug() -> bool {
        EnvConfig::is_debug_mode()
    }

    fn default_filter(is_debug: bool) -> &'static str {
        if is_debug {
            "ocrmcp=debug,info"
        } else {
            "ocrmcp=info,warn"
        }
    }
}
