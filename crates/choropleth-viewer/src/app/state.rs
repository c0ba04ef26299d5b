//! Application state management
//!
//! This module owns the map session, the UI settings and the file loading
//! bookkeeping of the viewer.

use crate::app::insight::InsightPanel;
use crate::app::settings::Settings;
use choropleth_lib::{Aggregator, Config, JoinSpec, MapError, MapSession, Table};
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Why a file could not be used
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("Failed to open file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Map(#[from] MapError),

    #[error("Neither a FeatureCollection nor an array of rows")]
    UnknownContent,
}

/// What a JSON file holds
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FileKind {
    Boundaries,
    Table,
}

impl FileKind {
    /// Guess from the top-level shape of the document
    pub fn sniff(document: &Value) -> Option<Self> {
        match document {
            Value::Object(object) if object.get("type") == Some(&Value::from("FeatureCollection")) => {
                Some(FileKind::Boundaries)
            }
            Value::Array(_) => Some(FileKind::Table),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            FileKind::Boundaries => "boundaries",
            FileKind::Table => "table",
        }
    }
}

/// Main application state
pub struct AppState {
    /// Map session with features, table, join and interaction state
    pub session: MapSession,

    /// Current UI settings
    pub ui_settings: UiSettings,

    /// Join being edited in the sidebar
    pub join_draft: JoinDraft,

    /// File loading state
    pub file_loader: FileLoader,

    /// Insight question / answer state
    pub insight: InsightPanel,

    /// Statistics about the last frame
    pub stats: Stats,

    /// Fit the features once the canvas reports its real size
    pub pending_fit_bounds: bool,
}

/// UI-specific settings that can be adjusted at runtime
#[derive(Clone)]
pub struct UiSettings {
    /// Outline width multiplier in pixels
    pub line_width: f32,

    /// Whether sidebar is open
    pub sidebar_open: bool,

    /// Current active tab in sidebar
    pub active_tab: SidebarTab,

    /// Draw the legend over the map
    pub show_legend: bool,
}

/// Sidebar tabs
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SidebarTab {
    Data,
    Style,
    Insight,
}

/// Join fields as picked in the UI; applied to the session when complete
#[derive(Clone, Debug, Default, PartialEq)]
pub struct JoinDraft {
    pub join_field: String,
    pub value_field: String,
    pub aggregator: Aggregator,
}

impl JoinDraft {
    pub fn to_spec(&self) -> Option<JoinSpec> {
        let spec = JoinSpec::new(&self.join_field, &self.value_field, self.aggregator);
        spec.is_complete().then_some(spec)
    }
}

impl From<&JoinSpec> for JoinDraft {
    fn from(spec: &JoinSpec) -> Self {
        Self {
            join_field: spec.join_field.clone(),
            value_field: spec.value_field.clone(),
            aggregator: spec.aggregator,
        }
    }
}

/// File loading state and operations
#[derive(Default)]
pub struct FileLoader {
    /// Currently shown boundary file
    pub boundaries: Option<PathBuf>,

    /// Currently loaded table file
    pub table: Option<PathBuf>,

    /// Load errors
    pub errors: Vec<(PathBuf, String)>,

    /// Open the file picker for this kind on the next frame
    pub show_picker: Option<FileKind>,
}

/// Statistics about loaded data and rendering
#[derive(Default)]
pub struct Stats {
    /// Time spent painting the map in the last frame
    pub last_paint_time_ms: f64,

    /// Features painted in the last frame
    pub last_painted_features: usize,
}

impl AppState {
    /// Create new application state from CLI settings and load the files it names
    pub fn new(settings: &Settings) -> Self {
        let config = Config {
            palette: settings.palette(),
            ..Config::default()
        };

        let ui_settings = UiSettings {
            line_width: settings.line_width,
            ..UiSettings::default()
        };

        let mut state = Self {
            session: MapSession::new(config),
            ui_settings,
            join_draft: JoinDraft {
                aggregator: settings.aggregator,
                ..JoinDraft::default()
            },
            file_loader: FileLoader::default(),
            insight: InsightPanel::from_command(settings.insight_command.as_deref()),
            stats: Stats::default(),
            pending_fit_bounds: false,
        };

        if let Some(path) = &settings.boundaries {
            let _ = state.load_file(path, Some(FileKind::Boundaries));
        }
        if let Some(path) = &settings.table {
            let _ = state.load_file(path, Some(FileKind::Table));
        }
        if let Some(join) = settings.join_spec() {
            state.join_draft = JoinDraft::from(&join);
            state.apply_join();
        }
        state
    }

    /// Load a JSON file as boundaries or table; `None` guesses from its content
    pub fn load_file(&mut self, path: &Path, kind: Option<FileKind>) -> Result<FileKind, LoadError> {
        profiling::scope!("load_file");

        let result = Self::read_document(path).and_then(|document| {
            let kind = kind
                .or_else(|| FileKind::sniff(&document))
                .ok_or(LoadError::UnknownContent)?;
            match kind {
                FileKind::Boundaries => self.session.load_features(&document)?,
                FileKind::Table => self.session.set_table(Table::from_json(&document)?),
            }
            Ok(kind)
        });

        match result {
            Ok(kind) => {
                tracing::info!("Loaded {} from {}", kind.name(), path.display());
                match kind {
                    FileKind::Boundaries => {
                        self.file_loader.boundaries = Some(path.to_path_buf());
                        // The session dropped its join, re-apply the one in the sidebar
                        self.apply_join();
                        self.pending_fit_bounds = true;
                    }
                    FileKind::Table => self.file_loader.table = Some(path.to_path_buf()),
                }
                Ok(kind)
            }
            Err(e) => {
                tracing::warn!("Failed to load {}: {}", path.display(), e);
                self.file_loader
                    .errors
                    .push((path.to_path_buf(), e.to_string()));
                Err(e)
            }
        }
    }

    /// Track the canvas size and run a fit deferred until that size was known
    pub fn canvas_resized(&mut self, width: f64, height: f64) {
        self.session.set_screen_size(width, height);
        if self.pending_fit_bounds && width > 0.0 && height > 0.0 {
            self.session.fit_to_features();
            self.pending_fit_bounds = false;
        }
    }

    fn read_document(path: &Path) -> Result<Value, LoadError> {
        let file = std::fs::File::open(path)?;
        Ok(serde_json::from_reader(std::io::BufReader::new(file))?)
    }

    /// Push the draft join into the session (clears it when incomplete)
    pub fn apply_join(&mut self) {
        self.session.set_join_spec(self.join_draft.to_spec());
    }

    /// Columns offered as join fields: table columns, features' keys first
    pub fn join_field_choices(&self) -> Vec<String> {
        let feature_keys = self.session.features().property_keys();
        let (mut shared, other): (Vec<String>, Vec<String>) = self
            .session
            .table()
            .columns()
            .iter()
            .cloned()
            .partition(|column| feature_keys.contains(column));
        shared.extend(other);
        shared
    }

    /// Columns offered as value fields: numeric columns first
    pub fn value_field_choices(&self) -> Vec<String> {
        let table = self.session.table();
        let numeric = table.numeric_columns();
        let mut choices: Vec<String> = numeric.iter().map(|c| c.to_string()).collect();
        choices.extend(
            table
                .columns()
                .iter()
                .filter(|column| !numeric.contains(&column.as_str()))
                .cloned(),
        );
        choices
    }

    /// Forget everything that was loaded
    pub fn clear_all(&mut self) {
        let config = self.session.config().clone();
        self.session = MapSession::new(config);
        self.file_loader = FileLoader::default();
        self.pending_fit_bounds = false;
        self.join_draft = JoinDraft {
            aggregator: self.join_draft.aggregator,
            ..JoinDraft::default()
        };
    }
}

impl Default for UiSettings {
    fn default() -> Self {
        Self {
            line_width: 1.0,
            sidebar_open: true,
            active_tab: SidebarTab::Data,
            show_legend: true,
        }
    }
}
