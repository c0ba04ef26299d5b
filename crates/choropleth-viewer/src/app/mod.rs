//! Application module
//!
//! This module provides the main application structure:
//! - Full-screen map canvas with hover tooltips and click popups
//! - Toggleable sidebar with tabs (Data, Style and Insight)
//! - Drag-and-drop support for boundary and table files
//! - Keyboard navigation for accessibility

mod canvas;
mod insight;
pub(crate) mod settings;
mod state;
mod ui_panels;

use crate::app::canvas::MapCanvas;
use crate::app::settings::Settings;
use crate::app::state::AppState;
use eframe::egui;
use geo::Coord;

/// Screen pixels moved per arrow key press
const KEY_PAN_STEP: f64 = 60.0;

/// Main application structure
pub struct ChoroplethApp {
    /// Application state (session, UI settings, files, etc.)
    state: AppState,

    /// Map canvas input bookkeeping
    canvas: MapCanvas,

    /// Show help overlay
    show_help: bool,
}

impl ChoroplethApp {
    pub fn new(_cc: &eframe::CreationContext<'_>, settings: Settings) -> Self {
        let state = AppState::new(&settings);

        tracing::info!(
            "Initialized with {} features and {} rows",
            state.session.features().len(),
            state.session.table().len()
        );

        Self {
            state,
            canvas: MapCanvas::default(),
            show_help: false,
        }
    }

    /// Keyboard shortcuts; ignored while a text field has focus
    fn handle_keys(&mut self, ctx: &egui::Context) {
        if ctx.wants_keyboard_input() {
            return;
        }
        let session = &mut self.state.session;
        let (w, h) = session.camera().screen_size();
        let center = Coord { x: w / 2.0, y: h / 2.0 };
        let zoom_step = session.config().zoom_step;

        ctx.input(|i| {
            if i.key_pressed(egui::Key::F1) || (i.key_pressed(egui::Key::H) && i.modifiers.ctrl) {
                self.show_help = !self.show_help;
            }
            if i.key_pressed(egui::Key::Escape) {
                session.close_popup();
            }
            if i.key_pressed(egui::Key::F) {
                session.fit_to_features();
            }
            if i.key_pressed(egui::Key::ArrowLeft) {
                session.pan_by(KEY_PAN_STEP, 0.0);
            }
            if i.key_pressed(egui::Key::ArrowRight) {
                session.pan_by(-KEY_PAN_STEP, 0.0);
            }
            if i.key_pressed(egui::Key::ArrowUp) {
                session.pan_by(0.0, KEY_PAN_STEP);
            }
            if i.key_pressed(egui::Key::ArrowDown) {
                session.pan_by(0.0, -KEY_PAN_STEP);
            }
            if i.key_pressed(egui::Key::Plus) || i.key_pressed(egui::Key::Equals) {
                session.zoom_at(center, 1.0 / zoom_step);
            }
            if i.key_pressed(egui::Key::Minus) {
                session.zoom_at(center, zoom_step);
            }
        });
    }
}

#[profiling::all_functions]
impl eframe::App for ChoroplethApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.handle_keys(ctx);

        // Pick up a finished insight request
        if self.state.insight.poll() || self.state.insight.is_pending() {
            ctx.request_repaint_after(std::time::Duration::from_millis(100));
        }

        ui_panels::handle_drag_and_drop(ctx, &mut self.state);
        ui_panels::show_file_picker(&mut self.state);

        if self.show_help {
            ui_panels::help_overlay(ctx, &mut self.show_help);
        }

        ui_panels::render_sidebar(ctx, &mut self.state);

        // Central panel: Map view (full screen)
        egui::CentralPanel::default()
            .frame(egui::Frame::NONE)
            .show(ctx, |ui| {
                profiling::scope!("map_panel");

                self.canvas.show(ui, &mut self.state);
                ui_panels::legend_overlay(ui, &self.state);
                ui_panels::sidebar_toggle_button(ui, &mut self.state);
            });
    }
}
