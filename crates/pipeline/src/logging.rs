//! Tracing initialisation for the pipeline binary and library callers.

/// Installs a global `tracing` subscriber at `level`, honouring `RUST_LOG`
/// if set. Safe to call more than once; only the first call takes effect.
pub fn init_logging(level: &str) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("clinxml_pipeline={level},clinxml_parser={level}")));

    let _ = tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .try_init();
}
