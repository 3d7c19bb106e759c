//! Structured chart descriptions, the sole contract with the presentation
//! layer.
//!
//! A description is a closed tagged variant: one payload shape per chart
//! kind, so an unknown kind or a mismatched payload is unrepresentable.
//! Two placeholder kinds close the taxonomy: `empty` for intentionally
//! blank output (nothing selected, cluster too small) and `error` for a
//! failed computation, so callers never have to sniff an opaque value to
//! tell the two apart.

use serde::Serialize;

use crate::correlation::CorrelationMatrix;
use crate::error::ViewError;
use crate::projection::ProjectedPoint;

/// A renderable chart or table, tagged by kind.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChartDescription {
    Scatter {
        title: String,
        x_label: String,
        y_label: String,
        color_label: String,
        points: Vec<ProjectedPoint>,
    },
    Pie {
        title: String,
        labels: Vec<String>,
        values: Vec<f64>,
    },
    Heatmap {
        title: String,
        color_label: String,
        columns: Vec<String>,
        values: Vec<Vec<Option<f64>>>,
    },
    Box {
        title: String,
        feature: String,
        groups: Vec<BoxSummary>,
    },
    Histogram {
        title: String,
        feature: String,
        edges: Vec<f64>,
        counts: Vec<u64>,
    },
    Line {
        title: String,
        x_label: String,
        y_label: String,
        points: Vec<[f64; 2]>,
    },
    Table {
        title: String,
        columns: Vec<String>,
        rows: Vec<Vec<String>>,
    },
    Empty {
        title: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    Error {
        title: String,
        reason: String,
    },
}

/// Five-number summary of one feature within one cluster.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoxSummary {
    pub cluster: i64,
    pub min: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub max: f64,
}

impl ChartDescription {
    /// An intentionally blank chart.
    pub fn empty(title: impl Into<String>) -> ChartDescription {
        ChartDescription::Empty {
            title: title.into(),
            reason: None,
        }
    }

    /// A blank chart carrying a human-readable explanation.
    pub fn empty_because(title: impl Into<String>, reason: impl Into<String>) -> ChartDescription {
        ChartDescription::Empty {
            title: title.into(),
            reason: Some(reason.into()),
        }
    }

    /// The error placeholder published for a failed computation.
    pub fn failed(title: impl Into<String>, reason: impl Into<String>) -> ChartDescription {
        ChartDescription::Error {
            title: title.into(),
            reason: reason.into(),
        }
    }

    /// Converts a computed heatmap into a description.
    pub fn heatmap(title: impl Into<String>, matrix: CorrelationMatrix) -> ChartDescription {
        ChartDescription::Heatmap {
            title: title.into(),
            color_label: "Correlation".to_string(),
            columns: matrix.columns,
            values: matrix.values,
        }
    }

    /// The tag the description serializes under.
    pub fn kind(&self) -> &'static str {
        match self {
            ChartDescription::Scatter { .. } => "scatter",
            ChartDescription::Pie { .. } => "pie",
            ChartDescription::Heatmap { .. } => "heatmap",
            ChartDescription::Box { .. } => "box",
            ChartDescription::Histogram { .. } => "histogram",
            ChartDescription::Line { .. } => "line",
            ChartDescription::Table { .. } => "table",
            ChartDescription::Empty { .. } => "empty",
            ChartDescription::Error { .. } => "error",
        }
    }
}

/// Downgrades a recoverable view error to an explanatory placeholder.
pub fn or_placeholder(
    title: &str,
    result: Result<ChartDescription, ViewError>,
) -> Result<ChartDescription, ViewError> {
    match result {
        Err(reason) => Ok(ChartDescription::empty_because(title, reason.to_string())),
        ok => ok,
    }
}

#[cfg(test)]
mod tests {
    use crate::chart::*;
    use crate::correlation::CorrelationMatrix;
    use crate::error::ViewError;

    #[test]
    fn test_serialized_tags() {
        let chart = ChartDescription::empty("Nothing");
        let json = serde_json::to_string(&chart).unwrap();
        assert_eq!(r#"{"kind":"empty","title":"Nothing"}"#, json);
        let chart = ChartDescription::empty_because("Nothing", "too small");
        let json = serde_json::to_string(&chart).unwrap();
        assert_eq!(
            r#"{"kind":"empty","title":"Nothing","reason":"too small"}"#,
            json
        );
        let chart = ChartDescription::failed("Broken", "boom");
        let json = serde_json::to_string(&chart).unwrap();
        assert_eq!(r#"{"kind":"error","title":"Broken","reason":"boom"}"#, json);
    }

    #[test]
    fn test_undefined_entries_serialize_as_null() {
        let chart = ChartDescription::heatmap(
            "Correlation",
            CorrelationMatrix {
                columns: vec!["a".to_string()],
                values: vec![vec![None]],
            },
        );
        let json = serde_json::to_string(&chart).unwrap();
        assert!(json.contains("[[null]]"));
    }

    #[test]
    fn test_placeholder_downgrade() {
        let result = or_placeholder(
            "Chart",
            Err(ViewError::InsufficientData { rows: 2, min: 4 }),
        );
        match result.unwrap() {
            ChartDescription::Empty { reason, .. } => {
                assert!(reason.unwrap().contains("at least 4"))
            }
            other => panic!("unexpected chart: {:?}", other.kind()),
        }
    }
}
