//! Logging setup for the viewer
//!
//! The library only emits `tracing` events; installing the subscriber is the
//! application's job and must happen before anything logs.

use tracing_subscriber::prelude::*;

/// Install the `fmt` subscriber filtered by `RUST_LOG`
///
/// When `RUST_LOG` is unset a default is chosen: debug output for our crates in
/// debug builds, info otherwise, with the noisy UI crates kept at warn.
pub fn setup_logging() {
    use tracing_subscriber::EnvFilter;
    use tracing_subscriber::fmt;

    let defaulted = std::env::var("RUST_LOG").is_err();
    if defaulted {
        // Safety: single-threaded at startup
        unsafe {
            if cfg!(debug_assertions) {
                std::env::set_var("RUST_LOG", "debug,eframe=warn,egui=warn,wgpu=warn,naga=warn");
            } else {
                std::env::set_var("RUST_LOG", "info,eframe=warn,egui=warn,wgpu=warn");
            }
        }
    }

    let fmt_layer = fmt::layer().with_filter(EnvFilter::from_default_env());
    let registry = tracing_subscriber::registry().with(fmt_layer);
    if registry.try_init().is_err() {
        tracing::warn!("A global subscriber was already installed");
        return;
    }

    if defaulted {
        tracing::info!(
            "RUST_LOG set to default: {}",
            std::env::var("RUST_LOG").unwrap_or_default()
        );
    }
    tracing::info!(
        "{} {} starting",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    );
}
