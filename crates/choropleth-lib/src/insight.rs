//! Bridge to an external text-generation service
//!
//! The engine only prepares a plain-text summary of the current map and turns the
//! service's answer (or failure) into something displayable. Insight calls never
//! touch session state.

use crate::MapSession;
use std::fmt::Write;

/// Errors reported by an insight service
#[derive(Debug, thiserror::Error)]
pub enum InsightError {
    #[error("Insight service unavailable")]
    Unavailable,

    #[error("Insight generation failed: {0}")]
    Failed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Opaque text-in / text-out collaborator
pub trait InsightService: Send + Sync {
    fn generate(&self, context: &str, question: &str) -> Result<String, InsightError>;
}

/// Displayable result of one insight request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsightOutcome {
    Answer(String),
    Error(String),
}

impl InsightOutcome {
    pub fn from_result(result: Result<String, InsightError>) -> Self {
        match result {
            Ok(text) => Self::Answer(text),
            Err(e) => {
                tracing::warn!("Insight request failed: {}", e);
                Self::Error(e.to_string())
            }
        }
    }

    pub fn text(&self) -> &str {
        match self {
            Self::Answer(text) | Self::Error(text) => text,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }
}

/// Plain-text description of what the session currently shows
pub fn insight_context(session: &MapSession) -> String {
    let mut context = String::new();
    let _ = writeln!(context, "Features: {}", session.features().len());
    let _ = writeln!(context, "Table rows: {}", session.table().len());

    match session.join_spec() {
        Some(join) => {
            let _ = writeln!(context, "Join field: {}", join.join_field);
            let _ = writeln!(context, "Value field: {}", join.value_field);
            let _ = writeln!(context, "Aggregator: {}", join.aggregator);
        }
        None => {
            let _ = writeln!(context, "Join: none");
        }
    }

    match session.legend() {
        Some(legend) => {
            let _ = writeln!(
                context,
                "Value range: {} to {} ({} of {} features matched)",
                legend.range.min,
                legend.range.max,
                legend.matched,
                session.features().len()
            );
        }
        None => {
            let _ = writeln!(context, "Value range: none");
        }
    }

    if let Some(feature) = session.selected_feature() {
        let _ = writeln!(context, "Selected feature: {}", feature.id());
    }
    context
}
