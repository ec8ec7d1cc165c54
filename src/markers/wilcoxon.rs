//! One-vs-rest Wilcoxon rank-sum ranking of genes per cell type

use std::cmp::Ordering;

use rayon::prelude::*;
use serde::Serialize;
use statrs::distribution::{ContinuousCDF, Normal};

use super::fdr::benjamini_hochberg;
use crate::data::ExpressionMatrix;
use crate::deconvolution::CellTypeAxis;
use crate::error::{Bulk2SingleError, Result};
use crate::stats::average_ranks;

/// Offset added to group means before taking the log2 fold change
const LOGFC_EPS: f64 = 1e-9;

/// Ranked genes for a single cell type
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupRanking {
    pub group: String,
    /// Gene ids, best first
    pub names: Vec<String>,
    /// Rank-sum z-scores, aligned with `names`
    pub scores: Vec<f64>,
    pub pvals: Vec<f64>,
    pub pvals_adj: Vec<f64>,
    pub logfoldchanges: Vec<f64>,
}

impl GroupRanking {
    /// The first `n` gene ids
    pub fn top(&self, n: usize) -> &[String] {
        &self.names[..n.min(self.names.len())]
    }
}

/// Per-group gene rankings, groups in cell-type axis order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarkerRanking {
    pub groups: Vec<GroupRanking>,
}

impl MarkerRanking {
    pub fn group(&self, name: &str) -> Option<&GroupRanking> {
        self.groups.iter().find(|g| g.group == name)
    }

    /// Union of the first `n` genes of every group, sorted and deduplicated
    pub fn top_names(&self, n: usize) -> Vec<String> {
        let mut names: Vec<String> = self
            .groups
            .iter()
            .flat_map(|g| g.top(n).iter().cloned())
            .collect();
        names.sort();
        names.dedup();
        names
    }
}

/// Two-sided p-value of a standard normal statistic
fn normal_pvalue(normal: &Normal, z: f64) -> f64 {
    if !z.is_finite() {
        return f64::NAN;
    }
    2.0 * normal.cdf(-z.abs())
}

/// Score and fold change of one gene for every group
fn score_gene(values: &[f64], group_ids: &[usize], group_sizes: &[usize]) -> Vec<(f64, f64)> {
    let n_groups = group_sizes.len();
    let n = values.len();
    let ranks = average_ranks(values);

    let mut rank_sums = vec![0.0; n_groups];
    let mut value_sums = vec![0.0; n_groups];
    for ((&g, &r), &v) in group_ids.iter().zip(ranks.iter()).zip(values.iter()) {
        rank_sums[g] += r;
        value_sums[g] += v;
    }
    let total: f64 = values.iter().sum();

    (0..n_groups)
        .map(|g| {
            let n_in = group_sizes[g];
            let n_rest = n - n_in;
            if n_in == 0 || n_rest == 0 {
                return (0.0, 0.0);
            }

            let n_in_f = n_in as f64;
            let n_rest_f = n_rest as f64;
            let n_f = n as f64;
            let expected = n_in_f * (n_f + 1.0) / 2.0;
            let std = (n_in_f * n_rest_f * (n_f + 1.0) / 12.0).sqrt();
            let score = (rank_sums[g] - expected) / std;

            let mean_in = value_sums[g] / n_in_f;
            let mean_rest = (total - value_sums[g]) / n_rest_f;
            let logfc = ((mean_in + LOGFC_EPS) / (mean_rest + LOGFC_EPS)).log2();

            (score, logfc)
        })
        .collect()
}

/// Descending by score, NaN last, ties broken by gene id
fn ranking_order(scores: &[f64], gene_ids: &[String]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| {
        let (sa, sb) = (scores[a], scores[b]);
        let by_score = match (sa.is_nan(), sb.is_nan()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => sb.partial_cmp(&sa).unwrap_or(Ordering::Equal),
        };
        by_score.then_with(|| gene_ids[a].cmp(&gene_ids[b]))
    });
    order
}

/// Rank genes for every cell type against all other cells.
///
/// `matrix` is genes x cells and `cell_types` holds one label per column.
pub fn rank_genes_groups(matrix: &ExpressionMatrix, cell_types: &[String]) -> Result<MarkerRanking> {
    if cell_types.len() != matrix.n_columns() {
        return Err(Bulk2SingleError::DimensionMismatch {
            expected: format!("{} cell-type labels", matrix.n_columns()),
            got: format!("{} cell-type labels", cell_types.len()),
        });
    }

    let axis = CellTypeAxis::from_labels(cell_types);
    let group_ids = axis.encode(cell_types)?;
    let mut group_sizes = vec![0usize; axis.len()];
    for &g in &group_ids {
        group_sizes[g] += 1;
    }

    for (label, &size) in axis.labels().iter().zip(group_sizes.iter()) {
        if size == cell_types.len() {
            log::warn!(
                "Cell type '{}' covers every cell; no reference group to rank against",
                label
            );
        }
    }

    let values = matrix.values();
    let per_gene: Vec<Vec<(f64, f64)>> = (0..matrix.n_genes())
        .into_par_iter()
        .map(|i| {
            let row: Vec<f64> = values.row(i).to_vec();
            score_gene(&row, &group_ids, &group_sizes)
        })
        .collect();

    let normal = Normal::new(0.0, 1.0).map_err(|e| Bulk2SingleError::InvalidInput {
        reason: e.to_string(),
    })?;
    let gene_ids = matrix.gene_ids();

    let groups = axis
        .labels()
        .iter()
        .enumerate()
        .map(|(g, label)| {
            let scores: Vec<f64> = per_gene.iter().map(|s| s[g].0).collect();
            let logfc: Vec<f64> = per_gene.iter().map(|s| s[g].1).collect();
            let pvals: Vec<f64> = scores.iter().map(|&z| normal_pvalue(&normal, z)).collect();
            let pvals_adj = benjamini_hochberg(&pvals);

            let order = ranking_order(&scores, gene_ids);
            GroupRanking {
                group: label.clone(),
                names: order.iter().map(|&i| gene_ids[i].clone()).collect(),
                scores: order.iter().map(|&i| scores[i]).collect(),
                pvals: order.iter().map(|&i| pvals[i]).collect(),
                pvals_adj: order.iter().map(|&i| pvals_adj[i]).collect(),
                logfoldchanges: order.iter().map(|&i| logfc[i]).collect(),
            }
        })
        .collect();

    Ok(MarkerRanking { groups })
}
