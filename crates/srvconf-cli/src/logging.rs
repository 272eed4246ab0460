use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install a stderr subscriber that also receives `log` records from the
/// library.
///
/// Without `-v` the level comes from `RUST_LOG`, defaulting to `warn`.
/// `-v` forces `debug`, `-vv` forces `trace`.
pub fn init(verbosity: u8) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(verbosity > 0)
        .with_level(true)
        .compact();

    let filter_layer = match verbosity {
        0 => EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("warn"))?,
        1 => EnvFilter::try_new("debug")?,
        _ => EnvFilter::try_new("trace")?,
    };

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .try_init()?;

    Ok(())
}
