//! One user session: the control state, the standard dashboard bindings
//! and the reaction entry point.
//!
//! The control state is created with defaults at session start and mutated
//! only by control events; computations never touch it. Each event batch
//! is processed to completion before the next one is read, and every
//! derived view is rebuilt from scratch on each pass.

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::bindings::{Binding, BindingGraph, ConfigError};
use crate::chart::{or_placeholder, ChartDescription};
use crate::dataset::Dataset;
use crate::dispatch::{resolve, ChartControl};
use crate::projection::project;

/// Input identifiers, one per user-facing control.
pub const CLUSTER_SELECT: &str = "cluster-select";
pub const FEATURE_GROUP_SELECT: &str = "feature-group-select";
pub const FEATURE_SELECT: &str = "feature-select";
pub const HEATMAP_FEATURE_SELECT: &str = "heatmap-feature-select";
pub const CHART_ACTIVATE: &str = "chart-activate";

/// Output identifiers of the standard dashboard bindings.
pub const CLUSTER_GRAPH: &str = "cluster-graph";
pub const CLUSTER_SUMMARY: &str = "cluster-summary";
pub const CLUSTER_PIE: &str = "cluster-pie";
pub const CHART_GRAPH: &str = "chart-graph";

/// The current value of every user-facing control.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlState {
    pub cluster: i64,
    pub feature_group: String,
    pub feature: Option<String>,
    pub heatmap_features: Vec<String>,
    pub last_activated: ChartControl,
}

impl ControlState {
    /// Session defaults: the first cluster, the first feature group, no
    /// chart selected.
    pub fn new(data: &Dataset) -> ControlState {
        ControlState {
            cluster: data.cluster_labels().first().copied().unwrap_or(0),
            feature_group: data
                .feature_groups()
                .next()
                .unwrap_or("preferences")
                .to_string(),
            feature: None,
            heatmap_features: vec![],
            last_activated: ChartControl::NoSelection,
        }
    }

    /// Applies one event and names the input it mutated. Re-selecting the
    /// current value still counts as a mutation: a re-activated chart
    /// control must recompute.
    fn apply(&mut self, event: &ControlEvent) -> &'static str {
        match event {
            ControlEvent::SelectCluster(cluster) => {
                self.cluster = *cluster;
                CLUSTER_SELECT
            }
            ControlEvent::SelectFeatureGroup(group) => {
                self.feature_group = group.clone();
                FEATURE_GROUP_SELECT
            }
            ControlEvent::SelectFeature(feature) => {
                self.feature = Some(feature.clone());
                FEATURE_SELECT
            }
            ControlEvent::SelectHeatmapFeatures(features) => {
                self.heatmap_features = features.clone();
                HEATMAP_FEATURE_SELECT
            }
            ControlEvent::Activate(control) => {
                self.last_activated = *control;
                CHART_ACTIVATE
            }
        }
    }
}

/// A control event crossing the presentation boundary: which control, and
/// its new value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlEvent {
    SelectCluster(i64),
    SelectFeatureGroup(String),
    SelectFeature(String),
    SelectHeatmapFeatures(Vec<String>),
    Activate(ChartControl),
}

/// One dashboard session over a shared read-only dataset.
pub struct Session {
    data: Arc<Dataset>,
    state: ControlState,
    graph: BindingGraph<ControlState>,
}

impl Session {
    pub fn new(data: Arc<Dataset>) -> Result<Session, ConfigError> {
        let state = ControlState::new(&data);
        let graph = BindingGraph::build(standard_bindings())?;
        Ok(Session { data, state, graph })
    }

    /// Applies one batch of control events and runs a single reaction
    /// pass over the coalesced set of changed inputs.
    pub fn apply(&mut self, events: &[ControlEvent]) -> Vec<(String, ChartDescription)> {
        let mut touched = HashSet::new();
        for event in events {
            touched.insert(self.state.apply(event).to_string());
        }
        self.graph.react(&touched, &self.data, &self.state)
    }

    pub fn state(&self) -> &ControlState {
        &self.state
    }

    pub fn dataset(&self) -> &Dataset {
        &self.data
    }
}

/// The four outputs of the dashboard, wired to the controls that drive
/// them.
fn standard_bindings() -> Vec<Binding<ControlState>> {
    vec![
        Binding::new(
            &[CLUSTER_SELECT, FEATURE_GROUP_SELECT],
            CLUSTER_GRAPH,
            |data, state| or_placeholder(CLUSTER_GRAPH, cluster_graph(data, state)),
        ),
        Binding::new(
            &[CLUSTER_SELECT, FEATURE_GROUP_SELECT],
            CLUSTER_SUMMARY,
            |data, state| or_placeholder(CLUSTER_SUMMARY, cluster_summary(data, state)),
        ),
        Binding::new(&[CLUSTER_SELECT], CLUSTER_PIE, |data, state| {
            Ok(cluster_pie(data, state))
        }),
        Binding::new(
            &[CHART_ACTIVATE, FEATURE_SELECT, HEATMAP_FEATURE_SELECT],
            CHART_GRAPH,
            |data, state| Ok(resolve(data, state)),
        ),
    ]
}

/// The embedding scatter of the selected cluster over the selected
/// feature group.
fn cluster_graph(
    data: &Dataset,
    state: &ControlState,
) -> Result<ChartDescription, crate::error::ViewError> {
    let features = data.feature_group(&state.feature_group)?;
    let rows = data.cluster_rows(state.cluster);
    let points = project(data, &rows, features)?;
    Ok(ChartDescription::Scatter {
        title: format!("t-SNE Plot for Cluster {}", state.cluster),
        x_label: "t-SNE Component 1".to_string(),
        y_label: "t-SNE Component 2".to_string(),
        color_label: "cluster".to_string(),
        points,
    })
}

/// Cluster id, point count and the per-feature means of the selected
/// group.
fn cluster_summary(
    data: &Dataset,
    state: &ControlState,
) -> Result<ChartDescription, crate::error::ViewError> {
    let features = data.feature_group(&state.feature_group)?;
    let rows = data.cluster_rows(state.cluster);
    let mut table = vec![
        vec!["Cluster".to_string(), state.cluster.to_string()],
        vec!["Number of Data Points".to_string(), rows.len().to_string()],
    ];
    for feature in features {
        let values = data.numeric_column(feature).unwrap_or_default();
        let mean = if rows.is_empty() {
            0.
        } else {
            rows.iter().map(|&row| values[row]).sum::<f64>() / rows.len() as f64
        };
        table.push(vec![format!("Mean {feature}"), format!("{mean:.4}")]);
    }
    Ok(ChartDescription::Table {
        title: format!("Cluster {} Summary", state.cluster),
        columns: vec!["Statistic".to_string(), "Value".to_string()],
        rows: table,
    })
}

/// Share of every cluster in the dataset, titled for the selection.
fn cluster_pie(data: &Dataset, state: &ControlState) -> ChartDescription {
    let labels = data.cluster_labels();
    let values = labels
        .iter()
        .map(|&label| data.cluster_rows(label).len() as f64)
        .collect();
    ChartDescription::Pie {
        title: format!("Cluster Sizes (selected: {})", state.cluster),
        labels: labels.iter().map(|label| format!("Cluster {label}")).collect(),
        values,
    }
}
