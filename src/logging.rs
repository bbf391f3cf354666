use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Initialize the tracing subscriber with `json` (default) or `pretty`
/// output. `RUST_LOG` takes precedence over the configured level.
pub fn init(log_format: &str, log_level: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    match log_format.to_lowercase().as_str() {
        "pretty" | "compact" | "text" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().compact())
                .init();
        }
        other => {
            if other != "json" {
                eprintln!(
                    "WARN: Invalid log format '{log_format}', defaulting to 'json'. Valid options: json, pretty"
                );
            }
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .flatten_event(true)
                        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339()),
                )
                .init();
        }
    }

    tracing::debug!(log_format = %log_format, log_level = %log_level, "Logging initialized");
}
