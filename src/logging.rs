use color_eyre::Result;
use tracing_subscriber::{
    fmt,
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
    Layer,
};

const VERBOSE_FILTER: &str = "ssh_batch_plugin=debug,ssh_batch_plugin_orchestrator=debug,ssh_batch_plugin_config=debug,warn";

pub fn init_errors() -> Result<()> {
    color_eyre::install()
}

/// Diagnostics go to stderr only; stdout carries nothing but results.
pub fn init_logging(verbose: bool) -> Result<()> {
    let filter = if verbose {
        EnvFilter::new(VERBOSE_FILTER)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_filter(filter),
        )
        .with(tracing_error::ErrorLayer::default())
        .try_init()?;
    Ok(())
}
