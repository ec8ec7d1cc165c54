//! In-memory annotated single-cell object

use ndarray::{Array2, ArrayView2};

use super::{CellAnnotations, CellTypeTable, ExpressionMatrix};
use crate::error::{Bulk2SingleError, Result};

/// A single-cell dataset as held by an analysis session: a cells x genes
/// expression matrix with per-cell annotations.
#[derive(Debug, Clone)]
pub struct AnnotatedSingleCell {
    /// Expression values (cells x genes)
    x: Array2<f64>,
    gene_ids: Vec<String>,
    obs: CellAnnotations,
}

impl AnnotatedSingleCell {
    pub fn new(x: Array2<f64>, gene_ids: Vec<String>, obs: CellAnnotations) -> Result<Self> {
        let (n_cells, n_genes) = x.dim();
        if obs.n_cells() != n_cells {
            return Err(Bulk2SingleError::DimensionMismatch {
                expected: format!("{} cells in obs", n_cells),
                got: format!("{} cells in obs", obs.n_cells()),
            });
        }
        if gene_ids.len() != n_genes {
            return Err(Bulk2SingleError::DimensionMismatch {
                expected: format!("{} gene IDs", n_genes),
                got: format!("{} gene IDs", gene_ids.len()),
            });
        }
        Ok(Self { x, gene_ids, obs })
    }

    /// Build from a genes x cells matrix and its annotations
    pub fn from_expression(matrix: &ExpressionMatrix, obs: CellAnnotations) -> Result<Self> {
        if matrix.column_ids() != obs.cell_ids() {
            return Err(Bulk2SingleError::InvalidMetadata {
                reason: "Cell IDs in expression matrix and annotations do not match".to_string(),
            });
        }
        let cells_by_genes = matrix.transpose()?;
        let gene_ids = cells_by_genes.column_ids().to_vec();
        Self::new(cells_by_genes.into_values(), gene_ids, obs)
    }

    /// Build from a genes x cells matrix and a cell-type table, storing the
    /// labels under `celltype_key`. The table is aligned to the matrix columns.
    pub fn from_cell_types(
        matrix: &ExpressionMatrix,
        cell_types: &CellTypeTable,
        celltype_key: &str,
    ) -> Result<Self> {
        let aligned = cell_types.align_to(matrix.column_ids())?;
        let mut obs = CellAnnotations::new(aligned.cells().to_vec());
        obs.add_column(celltype_key, aligned.cell_types().to_vec())?;
        Self::from_expression(matrix, obs)
    }

    pub fn x(&self) -> ArrayView2<'_, f64> {
        self.x.view()
    }

    pub fn n_cells(&self) -> usize {
        self.x.nrows()
    }

    pub fn n_genes(&self) -> usize {
        self.x.ncols()
    }

    pub fn cell_ids(&self) -> &[String] {
        self.obs.cell_ids()
    }

    pub fn gene_ids(&self) -> &[String] {
        &self.gene_ids
    }

    pub fn obs(&self) -> &CellAnnotations {
        &self.obs
    }

    /// Cell/cell-type table from the annotation column `celltype_key`
    pub fn cell_type_table(&self, celltype_key: &str) -> Result<CellTypeTable> {
        CellTypeTable::from_annotations(&self.obs, None, celltype_key)
    }

    /// Expression as a genes x cells matrix
    pub fn to_expression(&self) -> Result<ExpressionMatrix> {
        ExpressionMatrix::new(
            self.x.t().to_owned(),
            self.gene_ids.clone(),
            self.obs.cell_ids().to_vec(),
        )
    }
}
