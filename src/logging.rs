use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::Result;

/// Where log events go.
pub enum LogTarget<'a> {
    Stderr,
    File(&'a Path),
    /// nothing is emitted (the terminal page owns the screen)
    Off
}

/// Initialize logging.
///
/// `verbose` lowers the crate's level from info to debug; `RUST_LOG`
/// directives are applied on top.
pub fn init_logging(verbose: bool, target: LogTarget<'_>) -> Result<()> {
    let directive = if verbose { "s7page=debug" } else { "s7page=info" };
    let filter = || {
        EnvFilter::from_default_env()
            .add_directive(directive.parse().expect("Invalid log directive"))
    };

    match target {
        LogTarget::Stderr => {
            tracing_subscriber::registry()
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .with(filter())
                .init();
        },
        LogTarget::File(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;

            tracing_subscriber::registry()
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(Mutex::new(file)),
                )
                .with(filter())
                .init();
        },
        LogTarget::Off => {}
    }

    Ok(())
}
