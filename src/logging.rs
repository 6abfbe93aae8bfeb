//! # Structured Logging Module
//!
//! Environment-aware structured logging for debugging the async scheduler
//! loop and correlation flows.

use std::sync::OnceLock;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging with environment-specific configuration.
///
/// Safe to call more than once; only the first call installs a subscriber.
/// `RUST_LOG` overrides the environment-derived default level.
pub fn init_structured_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let log_level = get_log_level(&environment);

        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

        // Production gets machine-readable output, everything else stays human-readable
        let fmt_layer = if environment == "production" {
            fmt::layer().with_target(true).json().boxed()
        } else {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
                .boxed()
        };

        let subscriber = tracing_subscriber::registry().with(fmt_layer.with_filter(filter));

        // Use try_init to avoid panic if a global subscriber already exists
        // (embedding services install their own)
        if subscriber.try_init().is_err() {
            tracing::debug!(
                "Global tracing subscriber already initialized - continuing with existing subscriber"
            );
        }

        tracing::info!(environment = %environment, "🔧 STRUCTURED LOGGING: Initialized");
    });
}

/// Get current environment from environment variables
fn get_environment() -> String {
    std::env::var("SCHEDULER_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

/// Get log level based on environment
fn get_log_level(environment: &str) -> String {
    match environment {
        "test" => "debug".to_string(),
        "development" => "debug".to_string(),
        "production" => "info".to_string(),
        _ => "debug".to_string(),
    }
}
