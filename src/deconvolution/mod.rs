//! Bulk deconvolution against single-cell reference profiles
//!
//! The pipeline is: canonical cell-type axis, marker means per cell type,
//! non-negative least squares against the bulk marker vector, normalization,
//! and scaling into target cell counts.

mod axis;
mod estimate;
mod nnls;
mod reference;

pub use axis::CellTypeAxis;
pub use estimate::{
    estimate_cell_proportions, normalize_weights, scale_target_counts, EstimatorParams,
    DEFAULT_TOP_MARKER_NUM,
};
pub use nnls::{nnls, NnlsParams, NnlsSolution};
pub use reference::CellTypeReference;
