use std::env;

use log::Level;
use slog::Drain;

/// A logger usable before (or instead of) [`init`] has set a global one, so
/// that a [`crate::template::Template`] built without an explicit logger
/// still has somewhere to send its `debug!`/`trace!` phase-transition lines.
pub(crate) fn root_logger() -> slog::Logger {
    slog_scope::logger()
}

/// Initialises the logging backend: a term-formatted, async slog drain set
/// as the global logger, with the standard `log` facade routed through it at
/// the level named by `RUST_LOG` (defaulting to `info`).
///
/// Returns a guard; dropping it flushes the async drain and restores the
/// previous global logger.
pub fn init() -> impl Drop {
    let decorator = slog_term::TermDecorator::new().build();
    let drain = slog_term::FullFormat::new(decorator).build().fuse();
    let drain = slog_async::Async::new(drain).build().fuse();
    let logger = slog::Logger::root(
        drain,
        slog::slog_o!(
            "version" => env!("CARGO_PKG_VERSION"),
        ),
    );

    let guard = slog_scope::set_global_logger(logger);

    slog_stdlog::init_with_level(
        env::var("RUST_LOG")
            .map(|level| level.parse().expect("invalid log level in `RUST_LOG`"))
            .unwrap_or(Level::Info),
    )
    .unwrap();

    guard
}
