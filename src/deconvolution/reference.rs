//! Per-cell-type mean expression of the marker genes

use ndarray::{Array2, ArrayView2};

use super::CellTypeAxis;
use crate::data::ExpressionMatrix;
use crate::error::{Bulk2SingleError, Result};

/// Reference matrix `A` for the proportion fit.
///
/// Rows are marker genes in marker order, columns are cell types in axis
/// order. Entry (g, k) is the mean expression of gene g over the cells
/// labelled k.
#[derive(Debug, Clone, PartialEq)]
pub struct CellTypeReference {
    axis: CellTypeAxis,
    markers: Vec<String>,
    means: Array2<f64>,
    group_sizes: Vec<usize>,
}

impl CellTypeReference {
    /// Build the reference in a single pass over the cells.
    ///
    /// `sc_data` is genes x cells and `cell_types` holds one label per
    /// column. Every marker must be a gene of `sc_data`.
    pub fn build(sc_data: &ExpressionMatrix, cell_types: &[String], markers: &[String]) -> Result<Self> {
        if cell_types.len() != sc_data.n_columns() {
            return Err(Bulk2SingleError::DimensionMismatch {
                expected: format!("{} cell-type labels", sc_data.n_columns()),
                got: format!("{} cell-type labels", cell_types.len()),
            });
        }
        if cell_types.is_empty() {
            return Err(Bulk2SingleError::InsufficientData {
                reason: "no single cells to build a reference from".to_string(),
            });
        }

        let lookup = sc_data.gene_lookup();
        let marker_rows: Vec<usize> = markers
            .iter()
            .map(|m| {
                lookup
                    .get(m.as_str())
                    .copied()
                    .ok_or_else(|| Bulk2SingleError::missing_key(m.as_str(), "single-cell genes"))
            })
            .collect::<Result<_>>()?;

        let axis = CellTypeAxis::from_labels(cell_types);
        let group_ids = axis.encode(cell_types)?;

        let values = sc_data.values();
        let mut sums = Array2::<f64>::zeros((marker_rows.len(), axis.len()));
        let mut group_sizes = vec![0usize; axis.len()];

        for (cell, &k) in group_ids.iter().enumerate() {
            group_sizes[k] += 1;
            for (row, &gene) in marker_rows.iter().enumerate() {
                sums[[row, k]] += values[[gene, cell]];
            }
        }

        // Every axis label comes from at least one cell, so sizes are non-zero
        for (k, &size) in group_sizes.iter().enumerate() {
            let size = size as f64;
            sums.column_mut(k).mapv_inplace(|v| v / size);
        }

        log::debug!(
            "Reference matrix: {} markers x {} cell types",
            marker_rows.len(),
            axis.len()
        );

        Ok(Self {
            axis,
            markers: markers.to_vec(),
            means: sums,
            group_sizes,
        })
    }

    pub fn axis(&self) -> &CellTypeAxis {
        &self.axis
    }

    pub fn cell_types(&self) -> &[String] {
        self.axis.labels()
    }

    pub fn markers(&self) -> &[String] {
        &self.markers
    }

    /// markers x cell types
    pub fn matrix(&self) -> ArrayView2<'_, f64> {
        self.means.view()
    }

    /// Number of cells behind each column
    pub fn group_sizes(&self) -> &[usize] {
        &self.group_sizes
    }

    /// Mean marker profile of one cell type
    pub fn profile(&self, cell_type: &str) -> Option<Vec<f64>> {
        self.axis
            .id(cell_type)
            .map(|k| self.means.column(k).to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn ids(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn fixture() -> ExpressionMatrix {
        ExpressionMatrix::new(
            array![
                [10.0, 0.0, 10.0, 0.0],
                [0.0, 20.0, 0.0, 20.0],
                [0.0, 30.0, 0.0, 30.0],
                [1.0, 2.0, 3.0, 4.0],
            ],
            ids(&["g1", "g2", "g3", "g4"]),
            ids(&["c1", "c2", "c3", "c4"]),
        )
        .unwrap()
    }

    #[test]
    fn test_group_means_in_axis_order() {
        let sc = fixture();
        let labels = ids(&["B", "A", "B", "A"]);
        let reference = CellTypeReference::build(&sc, &labels, &ids(&["g1", "g4"])).unwrap();

        assert_eq!(reference.cell_types(), &ids(&["A", "B"])[..]);
        assert_eq!(reference.matrix(), array![[0.0, 10.0], [3.0, 2.0]]);
        assert_eq!(reference.group_sizes(), &[2, 2]);
        assert_eq!(reference.profile("A"), Some(vec![0.0, 3.0]));
    }

    #[test]
    fn test_rows_follow_marker_order() {
        let sc = fixture();
        let labels = ids(&["A", "B", "A", "B"]);
        let reference = CellTypeReference::build(&sc, &labels, &ids(&["g3", "g1"])).unwrap();
        assert_eq!(reference.matrix(), array![[0.0, 30.0], [10.0, 0.0]]);
    }

    #[test]
    fn test_unequal_group_sizes() {
        let sc = fixture();
        let labels = ids(&["A", "A", "A", "B"]);
        let reference = CellTypeReference::build(&sc, &labels, &ids(&["g4"])).unwrap();
        assert_eq!(reference.matrix(), array![[2.0, 4.0]]);
        assert_eq!(reference.group_sizes(), &[3, 1]);
    }

    #[test]
    fn test_unknown_marker() {
        let sc = fixture();
        let labels = ids(&["A", "A", "B", "B"]);
        let result = CellTypeReference::build(&sc, &labels, &ids(&["nope"]));
        assert!(matches!(result, Err(Bulk2SingleError::MissingKey { .. })));
    }
}
