//! Structured logging configuration.
//!
//! Installs a `tracing-subscriber` registry filtered by `RUST_LOG`. Records
//! emitted by the engine library through the `log` facade are forwarded into
//! the same subscriber.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Default directives when `RUST_LOG` is unset
pub const DEFAULT_FILTER: &str = "info,sqlx=warn,hyper=warn";

/// Initialize structured logging
///
/// # Example
///
/// ```no_run
/// use dice_server::logging;
///
/// #[tokio::main]
/// async fn main() {
///     logging::init();
///     tracing::info!("Server starting");
/// }
/// ```
pub fn init() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    // Also installs the log -> tracing bridge for the library's records
    if let Err(e) = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
    {
        eprintln!("Logging already initialized: {e}");
        return;
    }

    tracing::info!("Structured logging initialized");
}

/// Log a connection lifecycle event
///
/// # Arguments
///
/// * `connection_id` - Connection identifier
/// * `event` - What happened (`opened`, `closed`, ...)
/// * `reason` - Optional cause, e.g. why a connection closed
pub fn log_connection_event(connection_id: &str, event: &str, reason: Option<&str>) {
    tracing::info!(
        connection_id = connection_id,
        event = event,
        reason = reason,
        "Connection {}",
        event
    );
}

/// Log a request handled on a connection
///
/// Failed requests are logged at warn level with the full, unredacted cause.
pub fn log_request(
    connection_id: &str,
    message_type: &str,
    client_id: Option<i64>,
    error: Option<&str>,
) {
    match error {
        Some(error) => tracing::warn!(
            connection_id = connection_id,
            message_type = message_type,
            client_id = client_id,
            error = error,
            "Request failed"
        ),
        None => tracing::debug!(
            connection_id = connection_id,
            message_type = message_type,
            client_id = client_id,
            "Request handled"
        ),
    }
}
