//! Logging setup for custom resource handlers.
//!
//! The dispatcher emits `tracing` events and spans; nothing is printed until a
//! subscriber is installed. These helpers install a formatter writing to
//! **stderr**, filtered by `RUST_LOG`.
//!
//! # Quick Start
//!
//! ```ignore
//! use custom_resource_sdk::{init_logging, handler::handle_event};
//!
//! async fn lambda_entry(event: serde_json::Value) -> Result<(), custom_resource_sdk::Error> {
//!     custom_resource_sdk::try_init_logging();
//!     handle_event(&event).await?;
//!     Ok(())
//! }
//! ```
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: Controls log levels (e.g., `info`, `debug`, `custom_resource_sdk=debug`)
//!
//! # Examples
//!
//! ```bash
//! # Show the dispatcher's debug output, including delivery hosts
//! RUST_LOG=custom_resource_sdk=debug ./bootstrap
//! ```

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

fn layer<S>() -> impl tracing_subscriber::Layer<S>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
}

/// Initialize the default logging subscriber at `info` level.
///
/// # Panics
///
/// Panics if a global subscriber has already been set.
pub fn init_logging() {
    init_logging_with_default("info");
}

/// Initialize logging with a custom default level, used when `RUST_LOG` is
/// not set.
///
/// # Panics
///
/// Panics if a global subscriber has already been set.
///
/// # Example
///
/// ```ignore
/// use custom_resource_sdk::init_logging_with_default;
///
/// init_logging_with_default("debug");
/// ```
pub fn init_logging_with_default(default_level: &str) {
    tracing_subscriber::registry()
        .with(filter(default_level))
        .with(layer())
        .init();
}

/// Try to initialize logging, returning false if already initialized.
///
/// Warm invocations of the same process call this again; only the first call
/// installs the subscriber.
pub fn try_init_logging() -> bool {
    tracing_subscriber::registry()
        .with(filter("info"))
        .with(layer())
        .try_init()
        .is_ok()
}
