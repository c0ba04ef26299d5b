//! Choropleth Viewer - Application Library
//!
//! Desktop shell around `choropleth-lib`: loads boundaries and tables, paints the
//! compiled outlines with their choropleth colors and forwards pointer input to the
//! map session.

mod app;
mod logging;

pub use app::ChoroplethApp;
pub use app::settings::Settings;
pub use logging::setup_logging;

/// Window title and application id
pub const APP_NAME: &str = "Choropleth Viewer";
