//! Paired bulk / single-cell input aligned to a shared gene set

use std::collections::HashSet;
use std::path::Path;

use super::{AnnotatedSingleCell, CellTypeTable, ExpressionMatrix};
use crate::error::Result;
use crate::io::{read_cell_type_table, read_expression_matrix, MetadataColumns};

/// Genes of `sc_genes` that also occur in `bulk_genes`, in single-cell order
pub fn intersect_genes(sc_genes: &[String], bulk_genes: &[String]) -> Vec<String> {
    let bulk: HashSet<&str> = bulk_genes.iter().map(|g| g.as_str()).collect();
    let mut seen: HashSet<&str> = HashSet::new();
    sc_genes
        .iter()
        .filter(|g| bulk.contains(g.as_str()) && seen.insert(g.as_str()))
        .cloned()
        .collect()
}

/// Everything the estimator needs, restricted to the genes shared by the
/// bulk and single-cell tables.
#[derive(Debug, Clone, PartialEq)]
pub struct DeconvolutionInput {
    /// One row per single-cell column, in column order
    pub input_sc_meta: CellTypeTable,
    /// Genes of the single-cell table before intersection
    pub sc_gene: Vec<String>,
    /// Genes of the bulk table before intersection
    pub bulk_gene: Vec<String>,
    /// Shared genes, in single-cell order
    pub intersect_gene: Vec<String>,
    /// Single-cell expression (intersect_gene x cells)
    pub input_sc_data: ExpressionMatrix,
    /// Bulk expression (intersect_gene x samples)
    pub input_bulk: ExpressionMatrix,
}

impl DeconvolutionInput {
    /// Align already-loaded tables.
    ///
    /// `sc_data` is genes x cells. Every cell must have a row in `sc_meta`.
    pub fn from_tables(
        bulk: &ExpressionMatrix,
        sc_data: &ExpressionMatrix,
        sc_meta: &CellTypeTable,
    ) -> Result<Self> {
        let input_sc_meta = sc_meta.align_to(sc_data.column_ids())?;

        let sc_gene = sc_data.gene_ids().to_vec();
        let bulk_gene = bulk.gene_ids().to_vec();
        let intersect_gene = intersect_genes(&sc_gene, &bulk_gene);

        log::info!(
            "  {} single-cell genes, {} bulk genes, {} shared",
            sc_gene.len(),
            bulk_gene.len(),
            intersect_gene.len()
        );
        if intersect_gene.is_empty() {
            log::warn!("Bulk and single-cell tables share no genes");
        }

        let input_sc_data = sc_data.reindex_genes(&intersect_gene)?;
        let input_bulk = bulk.reindex_genes(&intersect_gene)?;

        Ok(Self {
            input_sc_meta,
            sc_gene,
            bulk_gene,
            intersect_gene,
            input_sc_data,
            input_bulk,
        })
    }

    /// Align a bulk table with an annotated single-cell object whose cell
    /// types live in the annotation column `celltype_key`.
    pub fn from_annotated(
        bulk: &ExpressionMatrix,
        adata: &AnnotatedSingleCell,
        celltype_key: &str,
    ) -> Result<Self> {
        let sc_meta = adata.cell_type_table(celltype_key)?;
        let sc_data = adata.to_expression()?;
        Self::from_tables(bulk, &sc_data, &sc_meta)
    }

    /// Read the three CSV tables and align them
    pub fn from_csv<P: AsRef<Path>>(
        bulk_path: P,
        sc_data_path: P,
        sc_meta_path: P,
        columns: &MetadataColumns,
    ) -> Result<Self> {
        log::info!("Loading bulk expression from: {}", bulk_path.as_ref().display());
        let bulk = read_expression_matrix(bulk_path)?;
        log::info!("Loading single-cell expression from: {}", sc_data_path.as_ref().display());
        let sc_data = read_expression_matrix(sc_data_path)?;
        log::info!("Loading single-cell metadata from: {}", sc_meta_path.as_ref().display());
        let sc_meta = read_cell_type_table(sc_meta_path, columns)?;

        Self::from_tables(&bulk, &sc_data, &sc_meta)
    }

    /// Number of single cells the target counts are scaled against
    pub fn n_cells(&self) -> usize {
        self.input_sc_meta.n_cells()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::CellAnnotations;
    use crate::error::Bulk2SingleError;
    use ndarray::array;

    fn ids(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn fixture() -> (ExpressionMatrix, ExpressionMatrix, CellTypeTable) {
        let bulk = ExpressionMatrix::new(
            array![[5.0], [7.0], [9.0]],
            ids(&["g3", "g1", "gx"]),
            ids(&["bulk"]),
        )
        .unwrap();
        let sc = ExpressionMatrix::new(
            array![[1.0, 0.0], [2.0, 3.0], [0.0, 4.0]],
            ids(&["g1", "g2", "g3"]),
            ids(&["c1", "c2"]),
        )
        .unwrap();
        let meta = CellTypeTable::new(ids(&["c2", "c1", "c9"]), ids(&["B", "A", "A"])).unwrap();
        (bulk, sc, meta)
    }

    #[test]
    fn test_intersect_genes() {
        let shared = intersect_genes(&ids(&["a", "b", "c", "b"]), &ids(&["c", "b", "z"]));
        assert_eq!(shared, ids(&["b", "c"]));
    }

    #[test]
    fn test_from_tables_aligns_everything() {
        let (bulk, sc, meta) = fixture();
        let input = DeconvolutionInput::from_tables(&bulk, &sc, &meta).unwrap();

        assert_eq!(input.intersect_gene, ids(&["g1", "g3"]));
        assert_eq!(input.input_sc_data.gene_ids(), &input.intersect_gene[..]);
        assert_eq!(input.input_bulk.gene_ids(), &input.intersect_gene[..]);
        assert_eq!(input.input_bulk.values(), array![[7.0], [5.0]]);
        assert_eq!(input.input_sc_meta.cells(), &ids(&["c1", "c2"])[..]);
        assert_eq!(input.input_sc_meta.cell_types(), &ids(&["A", "B"])[..]);
        assert_eq!(input.n_cells(), 2);
    }

    #[test]
    fn test_missing_metadata_rows() {
        let (bulk, sc, _) = fixture();
        let meta = CellTypeTable::new(ids(&["c1"]), ids(&["A"])).unwrap();
        let result = DeconvolutionInput::from_tables(&bulk, &sc, &meta);
        assert!(matches!(result, Err(Bulk2SingleError::MissingKey { .. })));
    }

    #[test]
    fn test_disjoint_genes_give_empty_intersection() {
        let (_, sc, meta) = fixture();
        let bulk = ExpressionMatrix::new(array![[1.0]], ids(&["other"]), ids(&["bulk"])).unwrap();
        let input = DeconvolutionInput::from_tables(&bulk, &sc, &meta).unwrap();
        assert!(input.intersect_gene.is_empty());
        assert_eq!(input.input_sc_data.n_genes(), 0);
        assert_eq!(input.input_bulk.n_genes(), 0);
    }

    #[test]
    fn test_annotated_adapter_matches_table_adapter() {
        let (bulk, sc, meta) = fixture();
        let from_tables = DeconvolutionInput::from_tables(&bulk, &sc, &meta).unwrap();

        let mut obs = CellAnnotations::new(ids(&["c1", "c2"]));
        obs.add_column("celltype", ids(&["A", "B"])).unwrap();
        let adata = AnnotatedSingleCell::from_expression(&sc, obs).unwrap();
        let from_annotated = DeconvolutionInput::from_annotated(&bulk, &adata, "celltype").unwrap();

        assert_eq!(from_tables, from_annotated);
    }
}
