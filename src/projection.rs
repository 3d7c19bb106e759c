//! The projection engine: a 2-D stochastic neighbor embedding of a filtered,
//! feature-selected subset of the dataset.
//!
//! The embedding runs the exact t-SNE formulation with a fixed seed, so a
//! given (rows, columns) input always yields bit-identical coordinates.
//! This is the most expensive computation in the crate; callers invoke it at
//! most once per user action.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use serde::Serialize;

use crate::dataset::Dataset;
use crate::error::ViewError;

/// Fixed seed for the embedding initialization.
pub const PROJECTION_SEED: u64 = 42;
/// Minimum number of points the embedding accepts.
pub const MIN_POINTS: usize = 4;

/// One embedded row, joined back to its identity and cluster label.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectedPoint {
    pub row_id: String,
    pub x: f64,
    pub y: f64,
    pub cluster: i64,
}

/// Embeds the given rows of the dataset, described by the given numeric
/// feature columns, into two dimensions.
///
/// Fails with [`ViewError::InsufficientData`] when fewer than [`MIN_POINTS`]
/// rows are given (the numeric optimization below is ill-posed in that case
/// and must never be reached) and with
/// [`ViewError::InvalidFeatureSelection`] when the feature list is empty or
/// references a column that is missing or not numeric.
pub fn project(
    data: &Dataset,
    rows: &[usize],
    feature_columns: &[String],
) -> Result<Vec<ProjectedPoint>, ViewError> {
    if rows.len() < MIN_POINTS {
        return Err(ViewError::InsufficientData {
            rows: rows.len(),
            min: MIN_POINTS,
        });
    }
    if feature_columns.is_empty() {
        return Err(ViewError::InvalidFeatureSelection(
            "no feature columns selected".to_string(),
        ));
    }
    let mut features = Vec::with_capacity(feature_columns.len());
    for name in feature_columns {
        match data.numeric_column(name) {
            Some(values) => features.push(values),
            None => {
                return Err(ViewError::InvalidFeatureSelection(format!(
                    "column {name:?} is missing or not numeric"
                )))
            }
        }
    }
    let points: Vec<Vec<f64>> = rows
        .iter()
        .map(|&row| features.iter().map(|column| column[row]).collect())
        .collect();
    let embedding = Tsne::default().embed(&points);
    Ok(rows
        .iter()
        .zip(embedding)
        .map(|(&row, [x, y])| ProjectedPoint {
            row_id: data.row_id(row).to_string(),
            x,
            y,
            cluster: data.label(row),
        })
        .collect())
}

/// Exact t-SNE with momentum gradient descent and early exaggeration.
struct Tsne {
    perplexity: f64,
    learning_rate: f64,
    iterations: usize,
    exaggeration: f64,
    exaggeration_span: usize,
    seed: u64,
}

impl Default for Tsne {
    fn default() -> Self {
        Tsne {
            perplexity: 30.,
            learning_rate: 200.,
            iterations: 500,
            exaggeration: 12.,
            exaggeration_span: 100,
            seed: PROJECTION_SEED,
        }
    }
}

impl Tsne {
    /// Embeds the points into two dimensions.
    fn embed(&self, points: &[Vec<f64>]) -> Vec<[f64; 2]> {
        let n = points.len();
        let d2 = squared_distances(points);
        // The binary search is only well posed when each point can see
        // enough neighbors, so small inputs shrink the perplexity.
        let perplexity = self.perplexity.min((n - 1) as f64 / 3.).max(1.);
        let p = joint_affinities(&d2, perplexity);

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut init = || 1e-4 * rng.sample::<f64, _>(StandardNormal);
        let mut y: Vec<[f64; 2]> = (0..n).map(|_| [init(), init()]).collect();
        let mut velocity = vec![[0.; 2]; n];

        for iteration in 0..self.iterations {
            let exaggeration = if iteration < self.exaggeration_span {
                self.exaggeration
            } else {
                1.
            };
            let momentum = if iteration < self.exaggeration_span {
                0.5
            } else {
                0.8
            };
            let gradient = self.gradient(&p, &y, exaggeration);
            for i in 0..n {
                for d in 0..2 {
                    velocity[i][d] =
                        momentum * velocity[i][d] - self.learning_rate * gradient[i][d];
                    y[i][d] += velocity[i][d];
                }
            }
            center(&mut y);
        }
        y
    }

    /// Kullback-Leibler gradient of the embedding under a Student-t kernel.
    fn gradient(&self, p: &[Vec<f64>], y: &[[f64; 2]], exaggeration: f64) -> Vec<[f64; 2]> {
        let n = y.len();
        let mut kernel = vec![vec![0.; n]; n];
        let mut total = 0.;
        for i in 0..n {
            for j in (i + 1)..n {
                let dx = y[i][0] - y[j][0];
                let dy = y[i][1] - y[j][1];
                let k = 1. / (1. + dx * dx + dy * dy);
                kernel[i][j] = k;
                kernel[j][i] = k;
                total += 2. * k;
            }
        }
        let mut gradient = vec![[0.; 2]; n];
        for i in 0..n {
            for j in 0..n {
                if i == j {
                    continue;
                }
                let q = (kernel[i][j] / total).max(1e-12);
                let force = 4. * (exaggeration * p[i][j] - q) * kernel[i][j];
                gradient[i][0] += force * (y[i][0] - y[j][0]);
                gradient[i][1] += force * (y[i][1] - y[j][1]);
            }
        }
        gradient
    }
}

/// Pairwise squared Euclidean distances.
fn squared_distances(points: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let n = points.len();
    let mut d2 = vec![vec![0.; n]; n];
    for i in 0..n {
        for j in (i + 1)..n {
            let d: f64 = points[i]
                .iter()
                .zip(&points[j])
                .map(|(a, b)| {
                    let d = a - b;
                    d * d
                })
                .sum();
            d2[i][j] = d;
            d2[j][i] = d;
        }
    }
    d2
}

/// Symmetrized joint affinities whose per-point entropy matches the
/// target perplexity.
fn joint_affinities(d2: &[Vec<f64>], perplexity: f64) -> Vec<Vec<f64>> {
    let n = d2.len();
    let mut p = vec![vec![0.; n]; n];
    for i in 0..n {
        let conditional = conditional_affinities(&d2[i], i, perplexity);
        for j in 0..n {
            p[i][j] = conditional[j];
        }
    }
    // Symmetrize and normalize the conditionals into a joint distribution.
    let mut joint = vec![vec![0.; n]; n];
    for i in 0..n {
        for j in 0..n {
            joint[i][j] = ((p[i][j] + p[j][i]) / (2. * n as f64)).max(1e-12);
        }
    }
    for i in 0..n {
        joint[i][i] = 0.;
    }
    joint
}

/// Conditional affinities of one point, with its precision found by binary
/// search so the row entropy matches `ln(perplexity)`.
fn conditional_affinities(d2_row: &[f64], i: usize, perplexity: f64) -> Vec<f64> {
    let target = perplexity.ln();
    let mut beta = 1.;
    let mut beta_min = f64::NEG_INFINITY;
    let mut beta_max = f64::INFINITY;
    let mut row = vec![0.; d2_row.len()];
    for _ in 0..50 {
        let mut sum = 0.;
        for (j, &d) in d2_row.iter().enumerate() {
            row[j] = if j == i { 0. } else { (-beta * d).exp() };
            sum += row[j];
        }
        if sum <= 0. {
            sum = f64::MIN_POSITIVE;
        }
        let mut entropy = 0.;
        for value in row.iter_mut() {
            *value /= sum;
            if *value > 1e-12 {
                entropy -= *value * value.ln();
            }
        }
        let diff = entropy - target;
        if diff.abs() < 1e-5 {
            break;
        }
        if diff > 0. {
            beta_min = beta;
            beta = if beta_max.is_infinite() {
                beta * 2.
            } else {
                (beta + beta_max) / 2.
            };
        } else {
            beta_max = beta;
            beta = if beta_min.is_infinite() {
                beta / 2.
            } else {
                (beta + beta_min) / 2.
            };
        }
    }
    row
}

/// Recenters the embedding on its mean.
fn center(y: &mut [[f64; 2]]) {
    let n = y.len() as f64;
    let mut mean = [0.; 2];
    for point in y.iter() {
        mean[0] += point[0] / n;
        mean[1] += point[1] / n;
    }
    for point in y.iter_mut() {
        point[0] -= mean[0];
        point[1] -= mean[1];
    }
}

#[cfg(test)]
mod tests {
    use crate::dataset::Dataset;
    use crate::error::ViewError;
    use crate::projection::*;

    const CSV: &str = "\
customer_id,merged_labels,a,b,city
c1,0,1.0,2.0,Porto
c2,0,1.1,2.1,Porto
c3,0,0.9,1.9,Faro
c4,0,1.05,2.05,Faro
c5,1,9.0,9.0,Faro
";

    fn columns(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_projection_shape() {
        let data = Dataset::from_csv(CSV, &[]).unwrap();
        let rows = data.cluster_rows(0);
        let points = project(&data, &rows, &columns(&["a", "b"])).unwrap();
        assert_eq!(4, points.len());
        assert!(points.iter().all(|p| p.cluster == 0));
        assert_eq!("c1", points[0].row_id);
        assert!(points.iter().all(|p| p.x.is_finite() && p.y.is_finite()));
    }

    #[test]
    fn test_projection_is_deterministic() {
        let data = Dataset::from_csv(CSV, &[]).unwrap();
        let rows = data.cluster_rows(0);
        let first = project(&data, &rows, &columns(&["a", "b"])).unwrap();
        let second = project(&data, &rows, &columns(&["a", "b"])).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_insufficient_data() {
        let data = Dataset::from_csv(CSV, &[]).unwrap();
        let rows = data.cluster_rows(1);
        let result = project(&data, &rows, &columns(&["a", "b"]));
        assert_eq!(
            Err(ViewError::InsufficientData { rows: 1, min: 4 }),
            result
        );
    }

    #[test]
    fn test_invalid_feature_selection() {
        let data = Dataset::from_csv(CSV, &[]).unwrap();
        let rows = data.cluster_rows(0);
        assert!(matches!(
            project(&data, &rows, &columns(&["a", "city"])),
            Err(ViewError::InvalidFeatureSelection(_))
        ));
        assert!(matches!(
            project(&data, &rows, &columns(&["nope"])),
            Err(ViewError::InvalidFeatureSelection(_))
        ));
        assert!(matches!(
            project(&data, &rows, &[]),
            Err(ViewError::InvalidFeatureSelection(_))
        ));
    }

    #[test]
    fn test_embedding_separates_distant_groups() {
        // Two tight groups far apart must stay apart in the embedding.
        let mut points = vec![];
        for i in 0..5 {
            points.push(vec![i as f64 * 0.01, 0.]);
        }
        for i in 0..5 {
            points.push(vec![100. + i as f64 * 0.01, 0.]);
        }
        let y = Tsne::default().embed(&points);
        let within = mean_distance(&y, 0..5, 0..5) + mean_distance(&y, 5..10, 5..10);
        let between = mean_distance(&y, 0..5, 5..10);
        assert!(between > within);
    }

    fn mean_distance(
        y: &[[f64; 2]],
        left: std::ops::Range<usize>,
        right: std::ops::Range<usize>,
    ) -> f64 {
        let mut total = 0.;
        let mut count = 0.;
        for i in left {
            for j in right.clone() {
                if i == j {
                    continue;
                }
                let dx = y[i][0] - y[j][0];
                let dy = y[i][1] - y[j][1];
                total += (dx * dx + dy * dy).sqrt();
                count += 1.;
            }
        }
        total / count
    }
}
