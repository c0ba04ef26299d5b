//! End-to-end session flow: load, join, interact, reload

use choropleth_lib::{
    Aggregator, Config, InteractionMode, JoinSpec, MapSession, NEUTRAL_FALLBACK, PointerEvent,
    PopupContent, Rgb, StyleOverride, Table,
};
use geo::Coord;
use serde_json::{Value, json};

fn boundaries() -> Value {
    json!({
        "type": "FeatureCollection",
        "features": [
            {
                "id": "north",
                "geometry": {"type": "Polygon", "coordinates": [
                    [[0, 20], [40, 20], [40, 40], [0, 40], [0, 20]]
                ]},
                "properties": {"region": "N", "label": "North"}
            },
            {
                "id": "south",
                "geometry": {"type": "MultiPolygon", "coordinates": [
                    [
                        [[0, 0], [40, 0], [40, 18], [0, 18], [0, 0]],
                        [[15, 5], [25, 5], [25, 13], [15, 13], [15, 5]]
                    ],
                    [[[45, 0], [50, 0], [50, 5], [45, 5], [45, 0]]]
                ]},
                "properties": {"region": "S", "label": "South"}
            },
            {
                "id": "capital",
                "geometry": {"type": "Point", "coordinates": [20, 30]},
                "properties": {"region": "C"}
            }
        ]
    })
}

fn rows() -> Value {
    json!([
        {"region": "N", "population": 100, "year": "2020-01-01"},
        {"region": "N", "population": 300, "year": "2021-01-01"},
        {"region": "S", "population": 50, "year": "2020-01-01"},
        {"region": "S", "population": "", "year": "2021-01-01"},
        {"region": "X", "population": 999, "year": "2021-01-01"}
    ])
}

fn screen_of(session: &MapSession, lat: f64, lon: f64) -> Coord<f64> {
    let planar = session.camera().projection().project(lat, lon);
    session.camera().planar_to_screen(planar)
}

fn press(session: &mut MapSession, position: Coord<f64>) {
    session.handle_event(PointerEvent::Down {
        position,
        primary: true,
    });
    session.handle_event(PointerEvent::Up { position });
}

fn loaded_session() -> MapSession {
    let mut session = MapSession::new(Config::default());
    session.set_screen_size(1024.0, 768.0);
    session.load_features(&boundaries()).unwrap();
    session.set_table(Table::from_json(&rows()).unwrap());
    session
}

#[test]
fn test_full_flow() {
    let mut session = loaded_session();
    assert_eq!(session.features().len(), 3);
    // The point feature is kept but draws nothing
    assert!(session.outlines()[2].is_empty());

    session.set_join_spec(Some(JoinSpec::new(
        "region",
        "population",
        Aggregator::Average,
    )));
    let aggregation = session.aggregation().unwrap();
    assert_eq!(aggregation.get("N"), Some(200.0));
    assert_eq!(aggregation.get("S"), Some(50.0));
    assert_eq!(aggregation.get("X"), Some(999.0));

    // X has no feature, C has no rows
    let palette = session.config().palette;
    assert_ne!(session.feature_fill(0), NEUTRAL_FALLBACK);
    assert_eq!(session.feature_fill(1), palette.low);
    assert_eq!(session.feature_fill(2), NEUTRAL_FALLBACK);

    // Hovering the hole of "south" hits nothing
    let hole = screen_of(&session, 9.0, 20.0);
    session.handle_event(PointerEvent::Move { position: hole });
    assert!(session.hover().is_none());

    let island = screen_of(&session, 2.5, 47.5);
    session.handle_event(PointerEvent::Move { position: island });
    assert_eq!(session.hover().unwrap().feature_id, "south");

    press(&mut session, island);
    let popup = session.popup().unwrap();
    assert_eq!(popup.feature_id, "south");
    match &popup.content {
        PopupContent::Rows(rows) => assert_eq!(rows.len(), 2),
        other => panic!("expected joined rows, got {other:?}"),
    }
    assert_eq!(session.mode(), InteractionMode::Idle);
}

#[test]
fn test_count_and_count_non_empty_differ() {
    let mut session = loaded_session();
    session.set_join_spec(Some(JoinSpec::new("region", "population", Aggregator::Count)));
    assert_eq!(session.aggregation().unwrap().get("S"), Some(2.0));

    session.set_join_spec(Some(JoinSpec::new(
        "region",
        "population",
        Aggregator::CountNonEmpty,
    )));
    assert_eq!(session.aggregation().unwrap().get("S"), Some(1.0));
}

#[test]
fn test_reload_clears_state_with_reused_ids() {
    let mut session = loaded_session();
    session.set_join_spec(Some(JoinSpec::new("region", "population", Aggregator::Sum)));
    session.set_style_override(
        "north",
        StyleOverride {
            fill: Some(Rgb::new(0, 0, 255)),
            ..Default::default()
        },
    );
    let inside_north = screen_of(&session, 30.0, 20.0);
    session.handle_event(PointerEvent::Move {
        position: inside_north,
    });
    press(&mut session, inside_north);
    assert!(session.popup().is_some());

    // Same ids, different shapes
    session.load_features(&boundaries()).unwrap();

    assert!(session.selected_feature().is_none());
    assert!(session.hover().is_none());
    assert!(session.popup().is_none());
    assert!(session.join_spec().is_none());
    assert!(session.aggregation().is_none());
    assert!(session.style_overlay().is_empty());
    assert_eq!(session.feature_fill(0), NEUTRAL_FALLBACK);
    // The table stays loaded
    assert_eq!(session.table().len(), 5);
}

#[test]
fn test_pan_zoom_pan_keeps_ground_point() {
    let mut session = loaded_session();
    let ground = session.camera().projection().project(30.0, 20.0);

    let empty = screen_of(&session, -30.0, -60.0);
    session.handle_event(PointerEvent::Down {
        position: empty,
        primary: true,
    });
    session.handle_event(PointerEvent::Move {
        position: Coord {
            x: empty.x + 40.0,
            y: empty.y + 10.0,
        },
    });
    session.handle_event(PointerEvent::Up {
        position: Coord {
            x: empty.x + 40.0,
            y: empty.y + 10.0,
        },
    });

    let cursor = session.camera().planar_to_screen(ground);
    session.handle_event(PointerEvent::Wheel {
        position: cursor,
        delta_y: -120.0,
    });
    let after_zoom = session.camera().planar_to_screen(ground);
    assert!((after_zoom.x - cursor.x).abs() < 1e-6);
    assert!((after_zoom.y - cursor.y).abs() < 1e-6);

    session.pan_by(-40.0, -10.0);
    let after_pan = session.camera().planar_to_screen(ground);
    assert!((after_pan.x - (cursor.x - 40.0)).abs() < 1e-6);
    assert!((after_pan.y - (cursor.y - 10.0)).abs() < 1e-6);
}

#[test]
fn test_rejected_load_keeps_previous_map() {
    let mut session = loaded_session();
    let before = session.camera().viewport();

    assert!(session.load_features(&json!({"features": []})).is_err());
    assert!(session.load_features(&json!([1, 2, 3])).is_err());

    assert_eq!(session.features().len(), 3);
    assert_eq!(session.camera().viewport(), before);
}
