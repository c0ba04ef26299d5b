use choropleth_lib::{Aggregator, JoinSpec, Palette, Rgb};
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
/// Choropleth Viewer - Join tabular data onto region boundaries and color them by value
pub struct Settings {
    /// Boundary file (FeatureCollection JSON) to load on startup
    #[clap(short, long, value_name = "FILE")]
    pub boundaries: Option<PathBuf>,

    /// Table file (JSON array of row objects) to load on startup
    #[clap(short, long, value_name = "FILE")]
    pub table: Option<PathBuf>,

    /// Column present in both the table rows and the feature properties
    #[clap(short, long)]
    pub join_field: Option<String>,

    /// Column whose values are aggregated per feature
    #[clap(short, long)]
    pub value_field: Option<String>,

    /// sum, average, count, min, max or countNonEmpty
    #[clap(short, long, default_value = "sum")]
    pub aggregator: Aggregator,

    /// Color of the lowest value
    #[clap(long, default_value = "#ffffcc")]
    pub low_color: Rgb,

    /// Color of the highest value
    #[clap(long, default_value = "#bd0026")]
    pub high_color: Rgb,

    /// Outline width in pixels
    #[clap(long, default_value = "1.0")]
    pub line_width: f32,

    /// Command answering insight questions (context and question on stdin)
    #[clap(long, value_name = "COMMAND")]
    pub insight_command: Option<String>,
}

impl Settings {
    /// Parse the command line, exiting with usage on error
    pub fn from_cli() -> Self {
        match Settings::try_parse() {
            Ok(args) => args,
            Err(e) => e.exit(),
        }
    }

    pub fn palette(&self) -> Palette {
        Palette::new(self.low_color, self.high_color)
    }

    /// Join requested on the command line, if both fields were given
    pub fn join_spec(&self) -> Option<JoinSpec> {
        match (&self.join_field, &self.value_field) {
            (Some(join), Some(value)) => Some(JoinSpec::new(join, value, self.aggregator)),
            _ => None,
        }
    }
}
