//! Logging setup for the refcam binary

use tracing::Level;

/// Initialize the tracing subscriber at INFO (overridable via `RUST_LOG`)
pub fn init_logger() {
    init_logger_with_level(Level::INFO)
}

/// Initialize the tracing subscriber with a custom default level
///
/// ```bash
/// RUST_LOG=refcam_core=trace refcam unproject --calibration cam0.yaml --pixel 400,300
/// ```
pub fn init_logger_with_level(default_level: Level) {
    use tracing_subscriber::fmt::time::SystemTime;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(default_level.into())
                .from_env_lossy(),
        )
        .with_timer(SystemTime)
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr)
        .init();
}
