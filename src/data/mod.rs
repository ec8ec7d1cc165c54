//! Data structures for bulk and single-cell expression

mod annotated;
mod expression_matrix;
mod input;
mod metadata;

pub use annotated::AnnotatedSingleCell;
pub use expression_matrix::ExpressionMatrix;
pub use input::{intersect_genes, DeconvolutionInput};
pub use metadata::{CellAnnotations, CellTypeTable, CELL_COLUMN, CELL_TYPE_COLUMN};
