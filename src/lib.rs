//! rust_bulk2single: bulk-to-single-cell deconvolution prep in Rust
//!
//! Aligns a bulk expression profile with an annotated single-cell reference,
//! selects marker genes per cell type, and estimates how many cells of each
//! type a synthetic single-cell dataset generated from the bulk sample should
//! contain.
//!
//! # Example
//!
//! ```ignore
//! use rust_bulk2single::prelude::*;
//!
//! // Load and align the three tables
//! let input = DeconvolutionInput::from_csv(
//!     "bulk.csv",
//!     "sc_data.csv",
//!     "sc_meta.csv",
//!     &MetadataColumns::default(),
//! )?;
//!
//! // Estimate target cell counts
//! let result = estimate_cell_proportions(&input, &EstimatorParams::default())?;
//! println!("{}", result.summary());
//! ```

pub mod cli;
pub mod data;
pub mod deconvolution;
pub mod error;
pub mod io;
pub mod markers;
pub mod plot;
pub mod stats;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::data::{
        intersect_genes, AnnotatedSingleCell, CellAnnotations, CellTypeTable, DeconvolutionInput,
        ExpressionMatrix,
    };
    pub use crate::deconvolution::{
        estimate_cell_proportions, nnls, CellTypeAxis, CellTypeReference, EstimatorParams,
        NnlsParams,
    };
    pub use crate::error::{Bulk2SingleError, Result};
    pub use crate::io::{
        read_cell_type_table, read_expression_matrix, write_target_counts, DeconvolutionResult,
        MetadataColumns,
    };
    pub use crate::markers::{rank_genes_groups, select_markers, MarkerRanking};
    pub use crate::plot::{
        cell_proportion_chart, cell_type_counts, correlation_heatmap, marker_correlation,
        write_chart, CorrelationTable, PlotlyChart,
    };
}

use prelude::*;

/// Prepare an annotated single-cell object and a bulk table, then estimate
/// target cell counts for the bulk sample.
///
/// Returns the aligned input alongside the result so callers can hand the
/// reference data to a downstream generator.
pub fn bulk2single(
    bulk: &ExpressionMatrix,
    adata: &AnnotatedSingleCell,
    celltype_key: &str,
    params: &EstimatorParams,
) -> Result<(DeconvolutionInput, DeconvolutionResult)> {
    log::info!("Preparing bulk and single-cell data...");
    let input = DeconvolutionInput::from_annotated(bulk, adata, celltype_key)?;

    let result = estimate_cell_proportions(&input, params)?;
    log::info!(
        "Estimated {} target cells across {} cell types",
        result.total_target(),
        result.cell_types.len()
    );

    Ok((input, result))
}
