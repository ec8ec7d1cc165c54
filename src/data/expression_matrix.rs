//! Expression matrix representation for bulk and single-cell data

use std::collections::HashMap;

use ndarray::{Array2, ArrayView1, ArrayView2, Axis};

use crate::error::{Bulk2SingleError, Result};

/// Deduplicate identifiers by appending _1, _2, etc. to repeats
fn deduplicate_names(names: Vec<String>) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    for name in &names {
        *seen.entry(name.clone()).or_insert(0) += 1;
    }
    if !seen.values().any(|&c| c > 1) {
        return names;
    }
    seen.clear();
    let mut result = Vec::with_capacity(names.len());
    for name in names {
        let count = seen.entry(name.clone()).or_insert(0);
        *count += 1;
        if *count == 1 {
            result.push(name);
        } else {
            let new_name = format!("{}_{}", name, *count - 1);
            log::warn!("Duplicate gene name '{}' renamed to '{}'", name, new_name);
            result.push(new_name);
        }
    }
    result
}

/// Gene expression values, rows are genes and columns are samples or cells.
///
/// A bulk table has a single column; a single-cell table has one column per cell.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpressionMatrix {
    values: Array2<f64>,
    gene_ids: Vec<String>,
    column_ids: Vec<String>,
}

impl ExpressionMatrix {
    /// Create a new expression matrix from raw values (genes x columns)
    pub fn new(values: Array2<f64>, gene_ids: Vec<String>, column_ids: Vec<String>) -> Result<Self> {
        let (n_genes, n_columns) = values.dim();

        if gene_ids.len() != n_genes {
            return Err(Bulk2SingleError::DimensionMismatch {
                expected: format!("{} gene IDs", n_genes),
                got: format!("{} gene IDs", gene_ids.len()),
            });
        }

        if column_ids.len() != n_columns {
            return Err(Bulk2SingleError::DimensionMismatch {
                expected: format!("{} column IDs", n_columns),
                got: format!("{} column IDs", column_ids.len()),
            });
        }

        if values.iter().any(|&x| x < 0.0 || !x.is_finite()) {
            return Err(Bulk2SingleError::InvalidExpressionMatrix {
                reason: "Expression values must be non-negative finite numbers".to_string(),
            });
        }

        let gene_ids = deduplicate_names(gene_ids);

        Ok(Self {
            values,
            gene_ids,
            column_ids,
        })
    }

    /// An expression matrix with no genes over the given columns
    pub fn empty(column_ids: Vec<String>) -> Self {
        Self {
            values: Array2::zeros((0, column_ids.len())),
            gene_ids: Vec::new(),
            column_ids,
        }
    }

    pub fn n_genes(&self) -> usize {
        self.values.nrows()
    }

    pub fn n_columns(&self) -> usize {
        self.values.ncols()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Get the values as a view
    pub fn values(&self) -> ArrayView2<'_, f64> {
        self.values.view()
    }

    pub fn into_values(self) -> Array2<f64> {
        self.values
    }

    pub fn gene_ids(&self) -> &[String] {
        &self.gene_ids
    }

    pub fn column_ids(&self) -> &[String] {
        &self.column_ids
    }

    /// Row index of every gene, for repeated lookups
    pub fn gene_lookup(&self) -> HashMap<&str, usize> {
        self.gene_ids
            .iter()
            .enumerate()
            .map(|(i, g)| (g.as_str(), i))
            .collect()
    }

    pub fn column_index(&self, column_id: &str) -> Option<usize> {
        self.column_ids.iter().position(|id| id == column_id)
    }

    /// Look up a column by name
    pub fn column(&self, column_id: &str) -> Result<ArrayView1<'_, f64>> {
        self.column_index(column_id)
            .map(|j| self.values.column(j))
            .ok_or_else(|| Bulk2SingleError::missing_key(column_id, "expression matrix columns"))
    }

    /// Subset to specific genes
    pub fn subset_genes(&self, gene_indices: &[usize]) -> Result<Self> {
        let values = self.values.select(Axis(0), gene_indices);
        let gene_ids = gene_indices.iter().map(|&i| self.gene_ids[i].clone()).collect();
        Self::new(values, gene_ids, self.column_ids.clone())
    }

    /// Reorder rows to exactly the given gene list
    pub fn reindex_genes(&self, genes: &[String]) -> Result<Self> {
        let lookup = self.gene_lookup();

        let indices = genes
            .iter()
            .map(|g| {
                lookup
                    .get(g.as_str())
                    .copied()
                    .ok_or_else(|| Bulk2SingleError::missing_key(g.as_str(), "expression matrix genes"))
            })
            .collect::<Result<Vec<usize>>>()?;

        if indices.is_empty() {
            return Ok(Self::empty(self.column_ids.clone()));
        }
        self.subset_genes(&indices)
    }

    /// Swap the gene and column axes
    pub fn transpose(&self) -> Result<Self> {
        Self::new(
            self.values.t().to_owned(),
            self.column_ids.clone(),
            self.gene_ids.clone(),
        )
    }
}
