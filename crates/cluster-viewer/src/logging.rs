//! Logging setup for the viewer
//!
//! A single fmt layer filtered by `RUST_LOG`. With the `profiling` feature the
//! library's `profiling` scopes show up as tracing spans as well.

/// Install the global tracing subscriber
///
/// Must run before anything logs. If `RUST_LOG` is unset a quiet default is used.
pub fn setup_logging() {
    use tracing_subscriber::prelude::*;

    if std::env::var("RUST_LOG").is_err() {
        // Safety: single-threaded at startup
        unsafe {
            std::env::set_var("RUST_LOG", "info,wgpu_hal=warn,eframe=warn");
        }
    }

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_filter(tracing_subscriber::EnvFilter::from_default_env());

    tracing_subscriber::registry().with(fmt_layer).init();

    tracing::info!(
        "Starting {} v{}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    );
}
