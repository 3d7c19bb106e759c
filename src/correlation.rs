//! The correlation engine: a pairwise Pearson matrix over a user-chosen
//! feature subset.
//!
//! Non-numeric columns in the request are dropped without error; this
//! mirrors the dashboard convenience of letting users multi-select any
//! column and only correlating the numeric ones. When nothing numeric
//! remains the engine returns [`Correlation::Empty`], a valid terminal
//! value the caller renders as an explanatory placeholder.

use serde::Serialize;

use crate::dataset::Dataset;
use crate::error::ViewError;

/// The outcome of a correlation request.
#[derive(Debug, Clone, PartialEq)]
pub enum Correlation {
    /// No numeric column remained after dropping; not an error.
    Empty,
    Matrix(CorrelationMatrix),
}

/// A symmetric pairwise correlation matrix.
///
/// Entries involving a zero-variance column are undefined and held as
/// `None`, which serializes as `null`; they are never coerced to a number.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationMatrix {
    pub columns: Vec<String>,
    pub values: Vec<Vec<Option<f64>>>,
}

/// Computes the pairwise Pearson correlation over the numeric subset of the
/// requested columns.
///
/// Duplicates are collapsed keeping the first occurrence, non-numeric
/// columns are silently dropped, and an unknown column name fails with
/// [`ViewError::InvalidFeatureSelection`].
pub fn correlate(data: &Dataset, requested: &[String]) -> Result<Correlation, ViewError> {
    let mut columns: Vec<&str> = vec![];
    for name in requested {
        if data.column(name).is_none() {
            return Err(ViewError::InvalidFeatureSelection(format!(
                "unknown column {name:?}"
            )));
        }
        if data.is_numeric(name) && !columns.contains(&name.as_str()) {
            columns.push(name);
        }
    }
    if columns.is_empty() {
        return Ok(Correlation::Empty);
    }

    let series: Vec<&[f64]> = columns
        .iter()
        .map(|name| data.numeric_column(name).unwrap_or_default())
        .collect();
    let centered: Vec<Centered> = series.iter().map(|values| Centered::of(values)).collect();

    let k = columns.len();
    let mut values = vec![vec![None; k]; k];
    for i in 0..k {
        for j in i..k {
            let r = pearson(&centered[i], &centered[j]);
            values[i][j] = r;
            values[j][i] = r;
        }
    }
    Ok(Correlation::Matrix(CorrelationMatrix {
        columns: columns.into_iter().map(str::to_string).collect(),
        values,
    }))
}

/// A mean-centered series and its sum of squares.
struct Centered {
    deviations: Vec<f64>,
    sum_squares: f64,
}

impl Centered {
    fn of(values: &[f64]) -> Centered {
        let mean = values.iter().sum::<f64>() / values.len() as f64;
        let deviations: Vec<f64> = values.iter().map(|v| v - mean).collect();
        let sum_squares = deviations.iter().map(|d| d * d).sum();
        Centered {
            deviations,
            sum_squares,
        }
    }
}

/// Pearson coefficient of two centered series, `None` when either has zero
/// variance (the coefficient is undefined there, 1.0 on the diagonal
/// otherwise by construction).
fn pearson(x: &Centered, y: &Centered) -> Option<f64> {
    if x.sum_squares == 0. || y.sum_squares == 0. {
        return None;
    }
    if std::ptr::eq(x, y) {
        return Some(1.);
    }
    let covariance: f64 = x
        .deviations
        .iter()
        .zip(&y.deviations)
        .map(|(a, b)| a * b)
        .sum();
    Some(covariance / (x.sum_squares * y.sum_squares).sqrt())
}
