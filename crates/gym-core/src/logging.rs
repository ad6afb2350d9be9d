use tracing_subscriber::EnvFilter;

/// Installs the global JSON subscriber. Logs go to stderr so that commands
/// printing JSON results on stdout stay machine-readable.
pub fn init(service_name: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    tracing::info!(service = service_name, "logging initialized");
}
