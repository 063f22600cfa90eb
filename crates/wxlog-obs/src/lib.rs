use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Initialize logging for a binary.
/// - RUST_LOG respected; default to "info,wxlog=debug"
/// - WXLOG_LOG_FORMAT=json switches to JSON lines
/// - Logs go to stderr so stdout stays usable for query output
pub fn init(service_name: &str) {
    let default_filter = "info,wxlog=debug";
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| default_filter.to_string());
    let json = std::env::var("WXLOG_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let fmt_layer = if json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .boxed()
    };

    // A second init (tests, embedding) keeps the first subscriber
    let installed = tracing_subscriber::registry()
        .with(EnvFilter::new(env_filter))
        .with(fmt_layer)
        .try_init()
        .is_ok();

    if installed {
        tracing::debug!(service = %service_name, "Logging initialized");
    }
}
