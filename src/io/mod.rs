//! Input/Output operations

mod csv;
mod results;

pub use self::csv::{
    read_cell_annotations, read_cell_type_table, read_expression_matrix, write_correlation_table,
    write_json, write_markers, write_target_counts, MetadataColumns,
};
pub use results::{DeconvolutionResult, DeconvolutionSummary};
