//! Map canvas: paints compiled outlines and turns egui input into pointer events
//!
//! Fills are drawn as triangle meshes from the outline's triangulation (egui only
//! fills convex paths), strokes as closed lines over every ring.

use crate::app::state::AppState;
use choropleth_lib::{GeoFeature, MapSession, PointerEvent, PopupContent, Rgb, Scalar};
use egui::{Color32, Pos2, Rect, Sense, Shape, Stroke, Ui};
use geo::Coord;

/// Selected outlines are drawn on top with this stroke
const SELECTION_STROKE: Color32 = Color32::from_rgb(20, 20, 20);

/// Per-canvas input bookkeeping
#[derive(Default)]
pub struct MapCanvas {
    /// Whether the pointer was over the map last frame
    pointer_inside: bool,
}

impl MapCanvas {
    /// Allocate the whole panel, feed input to the session and paint the map
    pub fn show(&mut self, ui: &mut Ui, state: &mut AppState) {
        profiling::scope!("MapCanvas::show");

        let (response, painter) = ui.allocate_painter(ui.available_size(), Sense::click_and_drag());
        let rect = response.rect;
        state.canvas_resized(rect.width() as f64, rect.height() as f64);

        self.handle_input(ui, &response, &mut state.session);

        let paint_start = instant::Instant::now();
        painter.rect_filled(rect, 0.0, ui.visuals().extreme_bg_color);
        let painted = paint_features(&painter, rect, &state.session, state.ui_settings.line_width);
        state.stats.last_paint_time_ms = paint_start.elapsed().as_secs_f64() * 1000.0;
        state.stats.last_painted_features = painted;

        show_tooltip(ui.ctx(), rect, &state.session);
        show_popup(ui.ctx(), rect, &mut state.session);

        if state.session.take_redraw() {
            ui.ctx().request_repaint();
        }
    }

    fn handle_input(&mut self, ui: &Ui, response: &egui::Response, session: &mut MapSession) {
        let rect = response.rect;
        let to_local = |pos: Pos2| Coord {
            x: (pos.x - rect.min.x) as f64,
            y: (pos.y - rect.min.y) as f64,
        };

        let inside = response.contains_pointer();
        let (latest, moved, pressed, secondary, released, scroll, zoom) = ui.input(|i| {
            (
                i.pointer.latest_pos(),
                i.pointer.is_moving(),
                i.pointer.primary_pressed(),
                i.pointer.secondary_pressed(),
                i.pointer.primary_released(),
                i.raw_scroll_delta.y,
                i.zoom_delta(),
            )
        });

        if self.pointer_inside && !inside {
            session.handle_event(PointerEvent::Leave);
        }
        self.pointer_inside = inside;

        let Some(pos) = latest else {
            return;
        };
        let position = to_local(pos);

        if inside && (pressed || secondary) {
            session.handle_event(PointerEvent::Down {
                position,
                primary: pressed,
            });
        }
        if inside && moved {
            session.handle_event(PointerEvent::Move { position });
        }
        if released {
            session.handle_event(PointerEvent::Up { position });
        }

        if inside {
            if zoom != 1.0 {
                // Pinch or ctrl+scroll: egui reports a ready-made factor (> 1 zooms in)
                session.zoom_at(position, 1.0 / zoom as f64);
            } else if scroll != 0.0 {
                // egui scrolls up with positive y, wheel events zoom out with positive y
                session.handle_event(PointerEvent::Wheel {
                    position,
                    delta_y: -scroll as f64,
                });
            }
        }
    }
}

#[inline]
pub(crate) fn to_color32(color: Rgb) -> Color32 {
    Color32::from_rgb(color.r, color.g, color.b)
}

/// Paint every visible feature; returns how many were drawn
fn paint_features(painter: &egui::Painter, rect: Rect, session: &MapSession, line_width: f32) -> usize {
    profiling::scope!("paint_features");

    let camera = session.camera();
    let to_screen = |c: Coord<f64>| {
        let s = camera.planar_to_screen(c);
        Pos2::new(rect.min.x + s.x as f32, rect.min.y + s.y as f32)
    };
    let outlines = session.outlines();

    let mut painted = 0;
    let mut selected = None;
    for index in session.visible_features() {
        let outline = &outlines[index];
        let style = session.feature_style(index);

        let mut fill = to_color32(style.fill);
        if style.hovered {
            fill = fill.lerp_to_gamma(Color32::WHITE, 0.25);
        }
        let mut mesh = egui::Mesh::default();
        for triangle in outline.triangles() {
            let base = mesh.vertices.len() as u32;
            for corner in triangle {
                mesh.colored_vertex(to_screen(*corner), fill);
            }
            mesh.add_triangle(base, base + 1, base + 2);
        }
        painter.add(Shape::mesh(mesh));

        let stroke = Stroke::new(style.stroke_width * line_width, to_color32(style.stroke));
        for ring in outline.subpaths() {
            let points: Vec<Pos2> = ring.coords().map(|c| to_screen(*c)).collect();
            if points.len() >= 2 {
                painter.add(Shape::closed_line(points, stroke));
            }
        }

        if style.selected {
            selected = Some(index);
        }
        painted += 1;
    }

    // Selection outline above all neighbours
    if let Some(index) = selected {
        let stroke = Stroke::new(line_width * 3.0, SELECTION_STROKE);
        for ring in outlines[index].subpaths() {
            let points: Vec<Pos2> = ring.coords().map(|c| to_screen(*c)).collect();
            painter.add(Shape::closed_line(points, stroke));
        }
    }

    painted
}

/// Short display name of a feature
pub(crate) fn feature_label(feature: &GeoFeature) -> String {
    ["name", "NAME", "label", "admin"]
        .iter()
        .find_map(|key| feature.property(key))
        .map(Scalar::to_string)
        .unwrap_or_else(|| feature.id().to_string())
}

/// Integral values without decimals, others with two
pub(crate) fn format_value(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{value:.0}")
    } else {
        format!("{value:.2}")
    }
}

fn show_tooltip(ctx: &egui::Context, rect: Rect, session: &MapSession) {
    let Some(hover) = session.hover() else {
        return;
    };
    let Some(feature) = session.features().get(hover.feature_index) else {
        return;
    };
    let pos = rect.min + egui::vec2(hover.position.x as f32 + 14.0, hover.position.y as f32 + 14.0);

    egui::Area::new(egui::Id::new("map_tooltip"))
        .order(egui::Order::Tooltip)
        .fixed_pos(pos)
        .interactable(false)
        .show(ctx, |ui| {
            egui::Frame::popup(ui.style()).show(ui, |ui| {
                ui.strong(feature_label(feature));
                match (session.join_spec(), session.feature_value(hover.feature_index)) {
                    (Some(join), Some(value)) => {
                        ui.label(format!(
                            "{} ({}): {}",
                            join.value_field,
                            join.aggregator,
                            format_value(value)
                        ));
                    }
                    (Some(_), None) => {
                        ui.weak("No data");
                    }
                    (None, _) => {}
                }
            });
        });
}

fn show_popup(ctx: &egui::Context, rect: Rect, session: &mut MapSession) {
    let Some(popup) = session.popup() else {
        return;
    };
    let title = session
        .features()
        .get(popup.feature_index)
        .map(feature_label)
        .unwrap_or_else(|| popup.feature_id.clone());
    let pos = rect.min + egui::vec2(popup.position.x as f32, popup.position.y as f32);
    let columns = session.table().columns();

    let mut open = true;
    egui::Window::new(title)
        .id(egui::Id::new("feature_popup"))
        .collapsible(false)
        .resizable(true)
        .current_pos(pos)
        .default_width(280.0)
        .open(&mut open)
        .show(ctx, |ui| {
            egui::ScrollArea::both().max_height(260.0).show(ui, |ui| match &popup.content {
                PopupContent::Rows(rows) => {
                    ui.label(format!("{} joined rows", rows.len()));
                    egui::Grid::new("popup_rows").striped(true).show(ui, |ui| {
                        for column in columns {
                            ui.strong(column);
                        }
                        ui.end_row();
                        for row in rows {
                            for column in columns {
                                ui.label(row.get(column).map(Scalar::to_string).unwrap_or_default());
                            }
                            ui.end_row();
                        }
                    });
                }
                PopupContent::Properties(properties) => {
                    egui::Grid::new("popup_properties")
                        .num_columns(2)
                        .striped(true)
                        .show(ui, |ui| {
                            for (key, value) in properties {
                                ui.strong(key);
                                ui.label(value.to_string());
                                ui.end_row();
                            }
                        });
                }
            });
        });

    if !open {
        session.close_popup();
    }
}
