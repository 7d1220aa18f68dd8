//! Error types for grid construction.

/// Errors reported by fallible grid constructors.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum GridError {
    /// The cell size must be positive and finite.
    #[error("cell size must be positive and finite, got {0}")]
    InvalidCellSize(f64),

    /// The maximum element radius must leave room inside a single cell.
    #[error("max element radius {radius} must be less than half the cell size {cell_size}")]
    InvalidElementRadius {
        /// The offending radius.
        radius: f64,
        /// The configured cell size.
        cell_size: f64,
    },
}
