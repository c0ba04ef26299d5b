//! UI panels for the application
//!
//! Sidebar with Data / Style / Insight tabs, the legend overlay, the help window
//! and drag-and-drop support.

use crate::app::canvas::{feature_label, format_value, to_color32};
use crate::app::state::{AppState, FileKind, SidebarTab};
use choropleth_lib::{Aggregator, Palette, Rgb, StyleOverride, insight, legend_stops};
use egui::{Color32, RichText, Ui};

/// Render the sidebar toggle button (overlaid on top-right of map)
pub fn sidebar_toggle_button(ui: &mut Ui, state: &mut AppState) {
    let button_size = egui::vec2(40.0, 40.0);
    let margin = 10.0;

    let rect = ui.max_rect();
    let button_pos = rect.right_top() + egui::vec2(-button_size.x - margin, margin);
    let button_rect = egui::Rect::from_min_size(button_pos, button_size);

    let response = ui.allocate_rect(button_rect, egui::Sense::click());
    if response.clicked() {
        state.ui_settings.sidebar_open = !state.ui_settings.sidebar_open;
    }

    let bg_color = if response.hovered() {
        ui.visuals().widgets.hovered.bg_fill
    } else {
        ui.visuals().widgets.inactive.bg_fill
    };
    ui.painter().rect_filled(button_rect, 5.0, bg_color);

    let icon = if state.ui_settings.sidebar_open {
        "✕"
    } else {
        "☰"
    };
    ui.painter().text(
        button_rect.center(),
        egui::Align2::CENTER_CENTER,
        icon,
        egui::FontId::proportional(20.0),
        ui.visuals().text_color(),
    );
}

/// Render the main sidebar
pub fn render_sidebar(ctx: &egui::Context, state: &mut AppState) {
    if !state.ui_settings.sidebar_open {
        return;
    }

    egui::SidePanel::right("main_sidebar")
        .default_width(320.0)
        .min_width(260.0)
        .max_width(480.0)
        .resizable(true)
        .show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.selectable_value(&mut state.ui_settings.active_tab, SidebarTab::Data, "📂 Data");
                ui.selectable_value(&mut state.ui_settings.active_tab, SidebarTab::Style, "🎨 Style");
                ui.selectable_value(
                    &mut state.ui_settings.active_tab,
                    SidebarTab::Insight,
                    "💡 Insight",
                );
            });
            ui.separator();

            egui::ScrollArea::vertical()
                .auto_shrink([false, false])
                .show(ui, |ui| match state.ui_settings.active_tab {
                    SidebarTab::Data => render_data_tab(ui, state),
                    SidebarTab::Style => render_style_tab(ui, state),
                    SidebarTab::Insight => render_insight_tab(ui, state),
                });
        });
}

/// Render the Data tab: files, join controls and statistics
fn render_data_tab(ui: &mut Ui, state: &mut AppState) {
    ui.horizontal_wrapped(|ui| {
        if ui.button("🗺 Load Boundaries...").clicked() {
            state.file_loader.show_picker = Some(FileKind::Boundaries);
        }
        if ui.button("📋 Load Table...").clicked() {
            state.file_loader.show_picker = Some(FileKind::Table);
        }
    });
    ui.horizontal(|ui| {
        if ui.button("🎯 Fit to Features").clicked() {
            state.session.fit_to_features();
        }
        if ui.button("🌍 World").clicked() {
            state.session.fit_to_world();
        }
        if ui.button("🗑 Clear All").clicked() {
            state.clear_all();
        }
    });

    ui.add_space(8.0);
    ui.separator();

    render_join_section(ui, state);

    ui.add_space(8.0);
    ui.separator();

    render_stats_section(ui, state);

    if !state.file_loader.errors.is_empty() {
        ui.add_space(8.0);
        ui.separator();
        ui.label(
            RichText::new(format!("⚠ Errors ({} files)", state.file_loader.errors.len()))
                .strong()
                .color(Color32::RED),
        );
        ui.add_space(4.0);
        egui::ScrollArea::vertical()
            .id_salt("errors_scroll")
            .max_height(100.0)
            .show(ui, |ui| {
                for (file, error) in &state.file_loader.errors {
                    ui.label(
                        RichText::new(format!(
                            "• {}: {}",
                            file.file_name().unwrap_or_default().to_string_lossy(),
                            error
                        ))
                        .small()
                        .color(Color32::RED),
                    );
                }
            });
        if ui.button("Clear Errors").clicked() {
            state.file_loader.errors.clear();
        }
    }
}

fn render_join_section(ui: &mut Ui, state: &mut AppState) {
    ui.label(RichText::new("🔗 Join").strong());
    ui.add_space(4.0);

    if state.session.table().is_empty() {
        ui.label(RichText::new("Load a table to color the map").small().weak());
        return;
    }

    let join_choices = state.join_field_choices();
    let value_choices = state.value_field_choices();
    let before = state.join_draft.clone();

    egui::Grid::new("join_grid")
        .num_columns(2)
        .spacing([12.0, 6.0])
        .show(ui, |ui| {
            ui.label("Join field:");
            field_combo(ui, "join_field", &mut state.join_draft.join_field, &join_choices);
            ui.end_row();

            ui.label("Value field:");
            field_combo(ui, "value_field", &mut state.join_draft.value_field, &value_choices);
            ui.end_row();

            ui.label("Aggregate:");
            egui::ComboBox::from_id_salt("aggregator")
                .selected_text(state.join_draft.aggregator.label())
                .show_ui(ui, |ui| {
                    for aggregator in Aggregator::ALL {
                        ui.selectable_value(
                            &mut state.join_draft.aggregator,
                            aggregator,
                            aggregator.label(),
                        );
                    }
                });
            ui.end_row();
        });

    if state.join_draft != before {
        state.apply_join();
    }

    ui.add_space(4.0);
    match state.session.legend() {
        Some(legend) => {
            ui.label(
                RichText::new(format!(
                    "{} of {} features matched, range {} - {}",
                    legend.matched,
                    state.session.features().len(),
                    format_value(legend.range.min),
                    format_value(legend.range.max)
                ))
                .small(),
            );
        }
        None if state.join_draft.to_spec().is_some() => {
            ui.label(
                RichText::new("No values for this join")
                    .small()
                    .color(ui.visuals().warn_fg_color),
            );
        }
        None => {}
    }
}

fn field_combo(ui: &mut Ui, id: &str, value: &mut String, choices: &[String]) {
    let selected = if value.is_empty() { "(none)" } else { value.as_str() };
    egui::ComboBox::from_id_salt(id)
        .selected_text(selected.to_string())
        .show_ui(ui, |ui| {
            ui.selectable_value(value, String::new(), "(none)");
            for choice in choices {
                ui.selectable_value(value, choice.clone(), choice);
            }
        });
}

/// Render statistics section (used in Data tab)
fn render_stats_section(ui: &mut Ui, state: &AppState) {
    ui.label(RichText::new("📊 Statistics").strong());
    ui.add_space(4.0);

    let file_name = |path: &Option<std::path::PathBuf>| {
        path.as_ref()
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "-".to_string())
    };
    let session = &state.session;

    egui::Grid::new("stats_grid")
        .num_columns(2)
        .spacing([12.0, 4.0])
        .show(ui, |ui| {
            ui.label("Boundaries:");
            ui.label(RichText::new(file_name(&state.file_loader.boundaries)).strong());
            ui.end_row();

            ui.label("Features:");
            ui.label(RichText::new(session.features().len().to_string()).strong());
            ui.end_row();

            ui.label("Vertices:");
            let vertices: usize = session.outlines().iter().map(|o| o.vertex_count()).sum();
            ui.label(RichText::new(vertices.to_string()).strong());
            ui.end_row();

            ui.label("Table:");
            ui.label(RichText::new(file_name(&state.file_loader.table)).strong());
            ui.end_row();

            ui.label("Rows:");
            ui.label(
                RichText::new(format!(
                    "{} ({} columns)",
                    session.table().len(),
                    session.table().columns().len()
                ))
                .strong(),
            );
            ui.end_row();

            if state.stats.last_paint_time_ms > 0.0 {
                ui.label("Paint Time:");
                let time_color = if state.stats.last_paint_time_ms < 16.0 {
                    Color32::GREEN
                } else if state.stats.last_paint_time_ms < 50.0 {
                    Color32::YELLOW
                } else {
                    Color32::RED
                };
                ui.label(
                    RichText::new(format!(
                        "{:.1} ms ({} features)",
                        state.stats.last_paint_time_ms, state.stats.last_painted_features
                    ))
                    .color(time_color),
                );
                ui.end_row();
            }
        });
}

/// Render the Style tab: palette, outlines and manual overrides
fn render_style_tab(ui: &mut Ui, state: &mut AppState) {
    ui.label(RichText::new("🎨 Palette").strong());
    ui.add_space(6.0);

    let mut palette = state.session.config().palette;
    egui::Grid::new("palette_grid")
        .num_columns(2)
        .spacing([12.0, 8.0])
        .show(ui, |ui| {
            ui.label("Low:");
            color_edit(ui, &mut palette.low);
            ui.end_row();

            ui.label("High:");
            color_edit(ui, &mut palette.high);
            ui.end_row();
        });
    if ui.small_button("Reset").clicked() {
        palette = Palette::default();
    }
    if palette != state.session.config().palette {
        state.session.set_palette(palette);
    }

    ui.add_space(12.0);
    ui.separator();
    ui.add_space(8.0);

    ui.label(RichText::new("✏ Outlines").strong());
    ui.add_space(6.0);
    ui.horizontal(|ui| {
        ui.label("Line Width:");
        ui.add(
            egui::Slider::new(&mut state.ui_settings.line_width, 0.0..=6.0)
                .suffix(" px")
                .step_by(0.25),
        );
    });
    ui.checkbox(&mut state.ui_settings.show_legend, "Show legend");

    ui.add_space(12.0);
    ui.separator();
    ui.add_space(8.0);

    render_selection_section(ui, state);
}

fn color_edit(ui: &mut Ui, color: &mut Rgb) -> bool {
    let mut srgb = [color.r, color.g, color.b];
    let changed = egui::color_picker::color_edit_button_srgb(ui, &mut srgb).changed();
    if changed {
        *color = Rgb::new(srgb[0], srgb[1], srgb[2]);
    }
    ui.label(RichText::new(color.to_hex()).monospace().small());
    changed
}

/// Manual style of the selected feature
fn render_selection_section(ui: &mut Ui, state: &mut AppState) {
    ui.label(RichText::new("📍 Selected Feature").strong());
    ui.add_space(6.0);

    let Some(feature) = state.session.selected_feature() else {
        ui.label(RichText::new("Click a region to select it").small().weak());
        return;
    };
    let id = feature.id().to_string();
    ui.label(feature_label(feature));
    if let Some(index) = state.session.selected_index()
        && let Some(value) = state.session.feature_value(index)
    {
        ui.label(RichText::new(format!("Value: {}", format_value(value))).small());
    }

    let current = state
        .session
        .style_overlay()
        .get(&id)
        .copied()
        .unwrap_or_default();
    let mut edited = current;

    let mut fill_on = edited.fill.is_some();
    ui.horizontal(|ui| {
        ui.checkbox(&mut fill_on, "Fill");
        if fill_on {
            let mut fill = edited.fill.unwrap_or(state.session.fallback_fill());
            color_edit(ui, &mut fill);
            edited.fill = Some(fill);
        } else {
            edited.fill = None;
        }
    });

    let mut stroke_on = edited.stroke.is_some();
    ui.horizontal(|ui| {
        ui.checkbox(&mut stroke_on, "Stroke");
        if stroke_on {
            let mut stroke = edited.stroke.unwrap_or(choropleth_lib::DEFAULT_STROKE);
            color_edit(ui, &mut stroke);
            edited.stroke = Some(stroke);
        } else {
            edited.stroke = None;
        }
    });

    let mut width_on = edited.stroke_width.is_some();
    ui.horizontal(|ui| {
        ui.checkbox(&mut width_on, "Width");
        if width_on {
            let mut width = edited
                .stroke_width
                .unwrap_or(choropleth_lib::DEFAULT_STROKE_WIDTH);
            ui.add(egui::Slider::new(&mut width, 0.0..=8.0).step_by(0.5));
            edited.stroke_width = Some(width);
        } else {
            edited.stroke_width = None;
        }
    });

    if edited != current {
        state.session.set_style_override(&id, edited);
    }
    ui.horizontal(|ui| {
        if ui.button("Clear Style").clicked() {
            state.session.set_style_override(&id, StyleOverride::default());
        }
        if ui.button("Deselect").clicked() {
            state.session.clear_selection();
        }
    });
    if !state.session.style_overlay().is_empty() {
        ui.label(
            RichText::new(format!(
                "{} features styled by hand",
                state.session.style_overlay().len()
            ))
            .small()
            .weak(),
        );
    }
}

/// Render the Insight tab
fn render_insight_tab(ui: &mut Ui, state: &mut AppState) {
    ui.label(RichText::new("💡 Ask about this map").strong());
    ui.add_space(6.0);

    if !state.insight.is_available() {
        ui.label(
            RichText::new("Start with --insight-command to enable answers")
                .small()
                .color(ui.visuals().warn_fg_color),
        );
    }

    ui.add(
        egui::TextEdit::multiline(&mut state.insight.question)
            .hint_text("Which regions stand out?")
            .desired_rows(3)
            .desired_width(f32::INFINITY),
    );
    ui.horizontal(|ui| {
        let can_ask = !state.insight.is_pending() && !state.insight.question.trim().is_empty();
        if ui.add_enabled(can_ask, egui::Button::new("Ask")).clicked() {
            let context = insight::insight_context(&state.session);
            state.insight.request(context);
        }
        if state.insight.is_pending() {
            ui.spinner();
        }
    });

    ui.add_space(8.0);
    if let Some(outcome) = &state.insight.outcome {
        let text = RichText::new(outcome.text());
        ui.label(if outcome.is_error() {
            text.color(Color32::RED)
        } else {
            text
        });
    }

    ui.add_space(8.0);
    egui::CollapsingHeader::new("Context sent")
        .default_open(false)
        .show(ui, |ui| {
            ui.label(
                RichText::new(insight::insight_context(&state.session))
                    .monospace()
                    .small(),
            );
        });
}

/// Legend overlay in the bottom-left corner of the map
pub fn legend_overlay(ui: &mut Ui, state: &AppState) {
    if !state.ui_settings.show_legend {
        return;
    }
    let Some(legend) = state.session.legend() else {
        return;
    };

    let rect = ui.max_rect();
    egui::Area::new(egui::Id::new("legend"))
        .order(egui::Order::Foreground)
        .fixed_pos(rect.left_bottom() + egui::vec2(10.0, -150.0))
        .interactable(false)
        .show(ui.ctx(), |ui| {
            egui::Frame::popup(ui.style()).show(ui, |ui| {
                ui.label(
                    RichText::new(format!(
                        "{} ({})",
                        legend.join.value_field, legend.join.aggregator
                    ))
                    .strong(),
                );
                for stop in legend_stops(legend.range, &legend.palette, 5).iter().rev() {
                    legend_row(ui, to_color32(stop.color), &format_value(stop.value));
                }
                legend_row(ui, to_color32(legend.fallback), "No data");
            });
        });
}

fn legend_row(ui: &mut Ui, color: Color32, text: &str) {
    ui.horizontal(|ui| {
        let (rect, _) = ui.allocate_exact_size(egui::vec2(18.0, 12.0), egui::Sense::hover());
        ui.painter().rect_filled(rect, 2.0, color);
        ui.label(RichText::new(text).small());
    });
}

/// Show file picker dialog
pub fn show_file_picker(state: &mut AppState) {
    let Some(kind) = state.file_loader.show_picker.take() else {
        return;
    };
    let title = match kind {
        FileKind::Boundaries => "Select a boundary file (FeatureCollection)",
        FileKind::Table => "Select a table (JSON array of rows)",
    };
    if let Some(path) = rfd::FileDialog::new()
        .add_filter("JSON Files", &["json", "geojson"])
        .set_title(title)
        .pick_file()
    {
        let _ = state.load_file(&path, Some(kind));
    }
}

/// Help overlay
pub fn help_overlay(ctx: &egui::Context, show_help: &mut bool) {
    egui::Window::new("Help")
        .collapsible(false)
        .resizable(false)
        .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
        .show(ctx, |ui| {
            ui.heading("Choropleth Viewer");
            ui.add_space(8.0);

            ui.label("Colors regions by values joined from a table.");
            ui.add_space(12.0);

            ui.label(RichText::new("Loading Data").strong());
            ui.label("• 'Load Boundaries...' for a FeatureCollection file");
            ui.label("• 'Load Table...' for a JSON array of rows");
            ui.label("• Or drag and drop JSON files onto the window");
            ui.add_space(8.0);

            ui.label(RichText::new("Navigation").strong());
            ui.label("• Scroll wheel to zoom at the cursor");
            ui.label("• Drag empty space to pan");
            ui.label("• Click a region for its rows, hover for its value");
            ui.add_space(8.0);

            ui.label(RichText::new("Keyboard Shortcuts").strong());
            ui.label("• F1 or Ctrl+H - Toggle this help");
            ui.label("• Arrows - Pan, +/- - Zoom, F - Fit to features");
            ui.label("• Escape - Close the popup");
            ui.add_space(12.0);

            if ui.button("Close").clicked() {
                *show_help = false;
            }
        });
}

/// Handle drag and drop of JSON files
pub fn handle_drag_and_drop(ctx: &egui::Context, state: &mut AppState) {
    let hovered_files = ctx.input(|i| !i.raw.hovered_files.is_empty());
    let dropped_files: Vec<_> = ctx.input(|i| i.raw.dropped_files.clone());

    if hovered_files {
        let painter = ctx.layer_painter(egui::LayerId::new(
            egui::Order::Foreground,
            egui::Id::new("drop_preview"),
        ));
        let screen_rect = ctx.content_rect();
        let bg_rect = egui::Rect::from_center_size(screen_rect.center(), egui::vec2(380.0, 80.0));
        painter.rect_filled(bg_rect, 16.0, egui::Color32::from_black_alpha(180));
        painter.text(
            screen_rect.center(),
            egui::Align2::CENTER_CENTER,
            "📂 Drop JSON files here",
            egui::FontId::proportional(32.0),
            egui::Color32::WHITE,
        );
    }

    // Boundaries first so a table dropped alongside joins onto them
    let mut paths: Vec<_> = dropped_files.into_iter().filter_map(|f| f.path).collect();
    paths.sort_by_key(|path| {
        !path
            .extension()
            .is_some_and(|e| e.eq_ignore_ascii_case("geojson"))
    });
    for path in paths {
        let _ = state.load_file(&path, None);
    }
}
