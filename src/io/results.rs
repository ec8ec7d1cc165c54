//! Deconvolution results structure

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Result of estimating cell-type composition for one bulk sample
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeconvolutionResult {
    /// Bulk sample the estimate was made for
    pub bulk_sample: String,
    /// Cell-type labels in sorted order; indexes `weights` and `proportions`
    pub cell_types: Vec<String>,
    /// Raw NNLS weights
    pub weights: Vec<f64>,
    /// Weights normalized to sum to one
    pub proportions: Vec<f64>,
    /// Target number of cells per cell type
    pub target_counts: BTreeMap<String, u64>,
    /// Marker genes the fit was made on
    pub markers: Vec<String>,
    /// Euclidean norm of the fit residual
    pub residual_norm: f64,
    /// Number of single cells the targets are scaled against
    pub total_cells: usize,
    /// Scale factor applied to the total cell count
    pub ratio_num: f64,
}

impl DeconvolutionResult {
    /// Proportion for one cell type
    pub fn proportion(&self, cell_type: &str) -> Option<f64> {
        self.cell_types
            .iter()
            .position(|c| c == cell_type)
            .and_then(|i| self.proportions.get(i).copied())
    }

    /// Sum of the target counts
    pub fn total_target(&self) -> u64 {
        self.target_counts.values().sum()
    }

    pub fn summary(&self) -> DeconvolutionSummary {
        DeconvolutionSummary {
            bulk_sample: self.bulk_sample.clone(),
            n_markers: self.markers.len(),
            residual_norm: self.residual_norm,
            total_cells: self.total_cells,
            ratio_num: self.ratio_num,
            rows: self
                .cell_types
                .iter()
                .zip(self.proportions.iter())
                .map(|(c, &p)| {
                    let n = self.target_counts.get(c).copied().unwrap_or(0);
                    (c.clone(), p, n)
                })
                .collect(),
            total_target: self.total_target(),
        }
    }
}

/// Printable overview of a deconvolution result
#[derive(Debug, Clone)]
pub struct DeconvolutionSummary {
    pub bulk_sample: String,
    pub n_markers: usize,
    pub residual_norm: f64,
    pub total_cells: usize,
    pub ratio_num: f64,
    /// (cell type, proportion, target count)
    pub rows: Vec<(String, f64, u64)>,
    pub total_target: u64,
}

impl std::fmt::Display for DeconvolutionSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Cell-type Deconvolution Summary")?;
        writeln!(f, "===============================")?;
        writeln!(f, "Bulk sample: {}", self.bulk_sample)?;
        writeln!(f, "Marker genes: {}", self.n_markers)?;
        writeln!(f, "Residual norm: {:.4}", self.residual_norm)?;
        writeln!(
            f,
            "Single cells: {} (ratio {}) -> target cells: {}",
            self.total_cells, self.ratio_num, self.total_target
        )?;
        for (cell_type, proportion, count) in &self.rows {
            writeln!(f, "  {:<24} {:>7.2}%  {:>8}", cell_type, proportion * 100.0, count)?;
        }
        Ok(())
    }
}
