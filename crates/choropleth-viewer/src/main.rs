#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")] // hide console window on Windows in release

// The binary uses the library, not duplicate modules
use choropleth_viewer::{APP_NAME, ChoroplethApp, Settings, setup_logging};

fn main() -> eframe::Result {
    // Parse first so `--help` does not initialize anything
    let settings = Settings::from_cli();
    setup_logging();

    // Background work (insight requests) runs on this runtime
    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!("Failed to start the async runtime: {}", e);
            std::process::exit(1);
        }
    };
    let _guard = rt.enter();

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 720.0])
            .with_title(APP_NAME)
            .with_drag_and_drop(true),
        ..Default::default()
    };

    eframe::run_native(
        APP_NAME,
        native_options,
        Box::new(move |cc| Ok(Box::new(ChoroplethApp::new(cc, settings)))),
    )
}
