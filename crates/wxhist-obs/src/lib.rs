use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// RUST_LOG fallback
pub const DEFAULT_FILTER: &str = "info,wxhist=debug";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Initialize JSON logging.
/// - RUST_LOG respected; default to "info,wxhist=debug"
/// - Safe to call more than once; later calls are no-ops
pub fn init(service_name: &str) {
    let installed = tracing_subscriber::registry()
        .with(env_filter())
        .with(tracing_subscriber::fmt::layer().json())
        .try_init()
        .is_ok();

    if installed {
        tracing::info!(service = %service_name, "Observability initialized");
    }
}

/// Human-readable logging on stderr for interactive use
pub fn init_pretty(service_name: &str) {
    let installed = tracing_subscriber::registry()
        .with(env_filter())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init()
        .is_ok();

    if installed {
        tracing::debug!(service = %service_name, "Observability initialized");
    }
}
