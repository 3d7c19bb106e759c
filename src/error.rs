use thiserror::Error;

/// A recoverable failure of a view computation.
///
/// Every variant is converted into a placeholder chart description before it
/// reaches the presentation layer; none of them ends the session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ViewError {
    /// The requested feature group was never registered.
    #[error("unknown feature group: {0}")]
    UnknownGroup(String),
    /// A requested feature column is unknown, empty or unusable for the computation.
    #[error("invalid feature selection: {0}")]
    InvalidFeatureSelection(String),
    /// The filtered cluster holds fewer points than the projection accepts.
    #[error("cluster holds {rows} points, the projection needs at least {min}")]
    InsufficientData { rows: usize, min: usize },
}
