use anyhow::Result;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Initialize the tracing subscriber: JSON-formatted stdout, level from
/// `RUST_LOG` with a verbose-flag fallback.
pub fn init_telemetry(verbose: bool) -> Result<()> {
    let fallback = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    let json_layer = tracing_subscriber::fmt::layer().json().flatten_event(true);

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .try_init()?;
    Ok(())
}
