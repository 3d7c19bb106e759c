//! The dataset store: an immutable in-memory table loaded once per process.
//!
//! Rows are customers, columns are typed by inference (numeric when every
//! value parses as a finite number, categorical otherwise) and one
//! distinguished column carries the upstream-assigned cluster label.
//! All other components borrow the store read-only; nothing mutates it
//! after load.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use thiserror::Error;
use tracing::info;

use crate::error::ViewError;

/// Name of the column holding the upstream-assigned cluster label.
pub const CLUSTER_COLUMN: &str = "merged_labels";
/// Name of the unique row identifier column.
pub const ID_COLUMN: &str = "customer_id";

/// Feature groups registered by `Dataset::load`.
pub const DEFAULT_GROUPS: &[(&str, &[&str])] = &[
    (
        "preferences",
        &[
            "vendor_loyalty_score",
            "relative_cuisine_variety",
            "chain_consumption",
        ],
    ),
    (
        "behavioral",
        &[
            "first_order",
            "days_since_last_order",
            "order_frequency",
            "total_orders",
            "total_amount_spent",
            "average_spending",
        ],
    ),
];

/// A fatal dataset loading failure. Raised at startup only.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("cannot read dataset: {0}")]
    Io(#[from] std::io::Error),
    #[error("dataset is empty")]
    Empty,
    #[error("row {row} holds {found} fields where the header holds {expected}")]
    Ragged {
        row: usize,
        expected: usize,
        found: usize,
    },
    #[error("required column is missing: {0}")]
    MissingColumn(String),
    #[error("cluster label {value:?} on row {row} is not an integer")]
    BadLabel { row: usize, value: String },
    #[error("duplicate row id: {0}")]
    DuplicateId(String),
    #[error("feature group {group:?} references column {column:?} which is missing or not numeric")]
    BadGroupColumn { group: String, column: String },
}

/// A typed column of the dataset.
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    Numeric(Vec<f64>),
    Categorical(Vec<String>),
}

/// The immutable customer table plus its registered feature groups.
pub struct Dataset {
    names: Vec<String>,
    columns: HashMap<String, Column>,
    row_ids: Vec<String>,
    labels: Vec<i64>,
    groups: Vec<(String, Vec<String>)>,
}

impl Dataset {
    /// Loads the dataset from a CSV file with a header row and registers the
    /// standard feature groups. Any failure here is fatal to the process.
    pub fn load(path: impl AsRef<Path>) -> Result<Dataset, LoadError> {
        let text = fs::read_to_string(path)?;
        let data = Dataset::from_csv(&text, DEFAULT_GROUPS)?;
        info!(
            rows = data.len(),
            columns = data.names.len(),
            clusters = data.cluster_labels().len(),
            "dataset loaded"
        );
        Ok(data)
    }

    /// Parses CSV text and registers the given feature groups.
    ///
    /// The header must contain [`ID_COLUMN`] and [`CLUSTER_COLUMN`]; every
    /// group column must exist and be numeric, violating that is a load-time
    /// failure rather than a runtime one.
    pub fn from_csv(text: &str, groups: &[(&str, &[&str])]) -> Result<Dataset, LoadError> {
        let mut lines = text.lines().filter(|l| !l.trim().is_empty());
        let header: Vec<String> = match lines.next() {
            Some(line) => split_fields(line),
            None => return Err(LoadError::Empty),
        };
        let id_at = position(&header, ID_COLUMN)?;
        let cluster_at = position(&header, CLUSTER_COLUMN)?;

        let mut raw: Vec<Vec<String>> = vec![vec![]; header.len()];
        for (row, line) in lines.enumerate() {
            let fields = split_fields(line);
            if fields.len() != header.len() {
                return Err(LoadError::Ragged {
                    row: row + 1,
                    expected: header.len(),
                    found: fields.len(),
                });
            }
            for (at, field) in fields.into_iter().enumerate() {
                raw[at].push(field);
            }
        }
        if raw[0].is_empty() {
            return Err(LoadError::Empty);
        }

        let labels = parse_labels(&raw[cluster_at])?;
        let row_ids = parse_row_ids(&raw[id_at])?;

        let mut names = Vec::with_capacity(header.len() - 1);
        let mut columns = HashMap::new();
        for (at, name) in header.iter().enumerate() {
            if at == cluster_at {
                continue;
            }
            names.push(name.clone());
            columns.insert(name.clone(), infer_column(&raw[at]));
        }

        let data = Dataset {
            names,
            columns,
            row_ids,
            labels,
            groups: vec![],
        };
        data.with_groups(groups)
    }

    fn with_groups(mut self, groups: &[(&str, &[&str])]) -> Result<Dataset, LoadError> {
        for (group, group_columns) in groups {
            for column in *group_columns {
                if self.numeric_column(column).is_none() {
                    return Err(LoadError::BadGroupColumn {
                        group: (*group).to_string(),
                        column: (*column).to_string(),
                    });
                }
            }
            self.groups.push((
                (*group).to_string(),
                group_columns.iter().map(|c| (*c).to_string()).collect(),
            ));
        }
        Ok(self)
    }

    /// All column names in file order, excluding the cluster label column.
    /// This is what selectable-feature controls are populated from.
    pub fn columns(&self) -> &[String] {
        &self.names
    }

    /// The ordered column list of a registered feature group.
    pub fn feature_group(&self, name: &str) -> Result<&[String], ViewError> {
        self.groups
            .iter()
            .find(|(group, _)| group == name)
            .map(|(_, columns)| columns.as_slice())
            .ok_or_else(|| ViewError::UnknownGroup(name.to_string()))
    }

    /// Names of the registered feature groups, in registration order.
    pub fn feature_groups(&self) -> impl Iterator<Item = &str> {
        self.groups.iter().map(|(group, _)| group.as_str())
    }

    /// Sorted distinct cluster labels.
    pub fn cluster_labels(&self) -> Vec<i64> {
        let mut labels = self.labels.clone();
        labels.sort_unstable();
        labels.dedup();
        labels
    }

    /// Indices of the rows belonging to the given cluster.
    pub fn cluster_rows(&self, label: i64) -> Vec<usize> {
        self.labels
            .iter()
            .enumerate()
            .filter(|(_, l)| **l == label)
            .map(|(row, _)| row)
            .collect()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.get(name)
    }

    /// The values of a column when it is numeric.
    pub fn numeric_column(&self, name: &str) -> Option<&[f64]> {
        match self.columns.get(name) {
            Some(Column::Numeric(values)) => Some(values),
            _ => None,
        }
    }

    pub fn is_numeric(&self, name: &str) -> bool {
        matches!(self.columns.get(name), Some(Column::Numeric(_)))
    }

    pub fn row_id(&self, row: usize) -> &str {
        &self.row_ids[row]
    }

    pub fn label(&self, row: usize) -> i64 {
        self.labels[row]
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

fn position(header: &[String], name: &str) -> Result<usize, LoadError> {
    header
        .iter()
        .position(|h| h == name)
        .ok_or_else(|| LoadError::MissingColumn(name.to_string()))
}

fn split_fields(line: &str) -> Vec<String> {
    line.trim_end_matches('\r')
        .split(',')
        .map(|field| field.trim().to_string())
        .collect()
}

fn parse_labels(raw: &[String]) -> Result<Vec<i64>, LoadError> {
    raw.iter()
        .enumerate()
        .map(|(row, value)| {
            value.parse::<i64>().map_err(|_| LoadError::BadLabel {
                row: row + 1,
                value: value.clone(),
            })
        })
        .collect()
}

fn parse_row_ids(raw: &[String]) -> Result<Vec<String>, LoadError> {
    let mut seen = HashMap::new();
    for id in raw {
        if seen.insert(id.as_str(), ()).is_some() {
            return Err(LoadError::DuplicateId(id.clone()));
        }
    }
    Ok(raw.to_vec())
}

/// A column is numeric when every value parses as a finite number.
fn infer_column(raw: &[String]) -> Column {
    let numeric: Option<Vec<f64>> = raw
        .iter()
        .map(|v| v.parse::<f64>().ok().filter(|x| x.is_finite()))
        .collect();
    match numeric {
        Some(values) => Column::Numeric(values),
        None => Column::Categorical(raw.to_vec()),
    }
}
