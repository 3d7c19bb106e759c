//! The chart dispatch resolver: a small state machine over "which chart
//! control was most recently activated".
//!
//! Several controls hold values at once; only the latest activation picks
//! the chart that is produced. The resolver is a pure function of the
//! current control state plus the dataset and is re-evaluated on every
//! relevant control event, including a repeated activation of the same
//! chart type.

use serde::{Deserialize, Serialize};

use crate::chart::{BoxSummary, ChartDescription};
use crate::correlation::{correlate, Correlation};
use crate::dataset::Dataset;
use crate::session::ControlState;

/// Column used as the horizontal axis of the line chart.
pub const ORDERING_COLUMN: &str = "customer_age";

const HISTOGRAM_BINS: usize = 20;

/// The chart-type controls a user can activate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartControl {
    NoSelection,
    BoxPlot,
    Histogram,
    LineChart,
    Heatmap,
}

/// Produces the chart for the most recently activated control.
pub fn resolve(data: &Dataset, state: &ControlState) -> ChartDescription {
    match state.last_activated {
        ChartControl::NoSelection => ChartDescription::empty("No chart selected"),
        ChartControl::BoxPlot => with_feature(data, state, box_plot),
        ChartControl::Histogram => with_feature(data, state, histogram),
        ChartControl::LineChart => with_feature(data, state, line_chart),
        ChartControl::Heatmap => heatmap(data, &state.heatmap_features),
    }
}

/// The single-feature charts share their prerequisite: a selected feature
/// that exists and is numeric. Anything missing keeps the placeholder
/// output, without error.
fn with_feature(
    data: &Dataset,
    state: &ControlState,
    chart: fn(&Dataset, &str, &[f64]) -> ChartDescription,
) -> ChartDescription {
    let feature = match &state.feature {
        Some(feature) => feature,
        None => return ChartDescription::empty("No feature selected"),
    };
    match data.numeric_column(feature) {
        Some(values) => chart(data, feature, values),
        None => ChartDescription::empty_because(
            "No chart",
            format!("feature {feature:?} is missing or not numeric"),
        ),
    }
}

fn box_plot(data: &Dataset, feature: &str, values: &[f64]) -> ChartDescription {
    let groups = data
        .cluster_labels()
        .into_iter()
        .map(|cluster| {
            let mut sample: Vec<f64> = data
                .cluster_rows(cluster)
                .into_iter()
                .map(|row| values[row])
                .collect();
            sample.sort_by(|a, b| a.total_cmp(b));
            five_number(cluster, &sample)
        })
        .collect();
    ChartDescription::Box {
        title: format!("{feature} per Cluster"),
        feature: feature.to_string(),
        groups,
    }
}

fn five_number(cluster: i64, sorted: &[f64]) -> BoxSummary {
    // A singleton sample collapses the whole summary onto its value.
    if let [value] = sorted {
        return BoxSummary {
            cluster,
            min: *value,
            q1: *value,
            median: *value,
            q3: *value,
            max: *value,
        };
    }
    let half = sorted.len() / 2;
    BoxSummary {
        cluster,
        min: sorted[0],
        q1: median(&sorted[..half]),
        median: median(sorted),
        q3: median(&sorted[sorted.len() - half..]),
        max: sorted[sorted.len() - 1],
    }
}

fn median(sorted: &[f64]) -> f64 {
    let n = sorted.len();
    if n == 0 {
        return f64::NAN;
    }
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.
    }
}

fn histogram(_data: &Dataset, feature: &str, values: &[f64]) -> ChartDescription {
    let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let (edges, counts) = if min == max {
        (vec![min, max], vec![values.len() as u64])
    } else {
        let width = (max - min) / HISTOGRAM_BINS as f64;
        let edges: Vec<f64> = (0..=HISTOGRAM_BINS)
            .map(|i| min + width * i as f64)
            .collect();
        let mut counts = vec![0; HISTOGRAM_BINS];
        for &value in values {
            let bin = (((value - min) / width) as usize).min(HISTOGRAM_BINS - 1);
            counts[bin] += 1;
        }
        (edges, counts)
    };
    ChartDescription::Histogram {
        title: format!("{feature} Distribution"),
        feature: feature.to_string(),
        edges,
        counts,
    }
}

fn line_chart(data: &Dataset, feature: &str, values: &[f64]) -> ChartDescription {
    let order = match data.numeric_column(ORDERING_COLUMN) {
        Some(order) => order,
        // No ordering axis in this dataset: fall back to the placeholder.
        None => return ChartDescription::empty("No chart selected"),
    };
    let mut pairs: Vec<(f64, f64)> = order.iter().cloned().zip(values.iter().cloned()).collect();
    pairs.sort_by(|a, b| a.0.total_cmp(&b.0));
    let mut points: Vec<[f64; 2]> = vec![];
    let mut at = 0;
    while at < pairs.len() {
        let x = pairs[at].0;
        let mut sum = 0.;
        let mut count = 0.;
        while at < pairs.len() && pairs[at].0 == x {
            sum += pairs[at].1;
            count += 1.;
            at += 1;
        }
        points.push([x, sum / count]);
    }
    ChartDescription::Line {
        title: format!("Mean {feature} by {ORDERING_COLUMN}"),
        x_label: ORDERING_COLUMN.to_string(),
        y_label: format!("mean {feature}"),
        points,
    }
}

fn heatmap(data: &Dataset, features: &[String]) -> ChartDescription {
    let title = "Feature Correlation Heatmap";
    if features.is_empty() {
        return ChartDescription::empty_because(title, "no features selected");
    }
    match correlate(data, features) {
        Ok(Correlation::Matrix(matrix)) => ChartDescription::heatmap(title, matrix),
        Ok(Correlation::Empty) => {
            ChartDescription::empty_because(title, "no numeric features selected")
        }
        Err(reason) => ChartDescription::empty_because(title, reason.to_string()),
    }
}
