//! Cell-type proportion estimation for one bulk sample

use std::collections::BTreeMap;

use ndarray::Array1;

use super::{nnls, CellTypeReference, NnlsParams};
use crate::data::DeconvolutionInput;
use crate::error::{Bulk2SingleError, Result};
use crate::io::DeconvolutionResult;
use crate::markers::select_markers;
use crate::stats::round_half_even;

/// Default number of marker genes taken per cell type
pub const DEFAULT_TOP_MARKER_NUM: usize = 200;

/// Estimator settings
#[derive(Debug, Clone)]
pub struct EstimatorParams {
    /// Marker genes taken per cell type
    pub top_marker_num: usize,
    /// Scale applied to the number of single cells when turning proportions
    /// into target counts
    pub ratio_num: f64,
    /// Bulk column to fit. `None` requires a single-column bulk table.
    pub bulk_sample: Option<String>,
    pub nnls: NnlsParams,
}

impl Default for EstimatorParams {
    fn default() -> Self {
        Self {
            top_marker_num: DEFAULT_TOP_MARKER_NUM,
            ratio_num: 1.0,
            bulk_sample: None,
            nnls: NnlsParams::default(),
        }
    }
}

/// Scale weights to sum to one.
///
/// A zero (or non-finite) total means the fit explained nothing and there is
/// no distribution to report.
pub fn normalize_weights(weights: &[f64]) -> Result<Vec<f64>> {
    let total: f64 = weights.iter().sum();
    if !(total > 0.0) || !total.is_finite() {
        return Err(Bulk2SingleError::DegenerateFit {
            reason: format!("NNLS weights sum to {}", total),
        });
    }
    Ok(weights.iter().map(|w| w / total).collect())
}

/// Target count per proportion: `round(p * total_cells * ratio_num)`,
/// halves rounded to even.
pub fn scale_target_counts(proportions: &[f64], total_cells: usize, ratio_num: f64) -> Vec<u64> {
    let scale = total_cells as f64 * ratio_num;
    proportions
        .iter()
        .map(|&p| round_half_even(p * scale).max(0.0) as u64)
        .collect()
}

fn select_bulk_column(input: &DeconvolutionInput, bulk_sample: Option<&str>) -> Result<String> {
    let columns = input.input_bulk.column_ids();
    match bulk_sample {
        Some(name) => {
            if input.input_bulk.column_index(name).is_none() {
                return Err(Bulk2SingleError::missing_key(name, "bulk samples"));
            }
            Ok(name.to_string())
        }
        None if columns.len() == 1 => Ok(columns[0].clone()),
        None => Err(Bulk2SingleError::InvalidInput {
            reason: format!(
                "bulk table has {} samples; choose one with a bulk sample name",
                columns.len()
            ),
        }),
    }
}

/// Estimate cell-type proportions of a bulk sample and turn them into target
/// cell counts.
///
/// Markers are selected from the single-cell data, the bulk profile is fitted
/// as a non-negative mixture of per-type marker means, the weights are
/// normalized and scaled by `n_cells * ratio_num`.
pub fn estimate_cell_proportions(
    input: &DeconvolutionInput,
    params: &EstimatorParams,
) -> Result<DeconvolutionResult> {
    if !(params.ratio_num > 0.0) || !params.ratio_num.is_finite() {
        return Err(Bulk2SingleError::InvalidInput {
            reason: format!("ratio_num must be positive and finite, got {}", params.ratio_num),
        });
    }
    if input.intersect_gene.is_empty() {
        return Err(Bulk2SingleError::InsufficientData {
            reason: "bulk and single-cell data share no genes".to_string(),
        });
    }
    if input.input_sc_data.n_columns() == 0 || input.n_cells() == 0 {
        return Err(Bulk2SingleError::InsufficientData {
            reason: "single-cell data has no cells".to_string(),
        });
    }

    let bulk_sample = select_bulk_column(input, params.bulk_sample.as_deref())?;
    let cell_types = input.input_sc_meta.cell_types();

    log::info!("Selecting marker genes (top {} per cell type)...", params.top_marker_num);
    let markers = select_markers(&input.input_sc_data, cell_types, params.top_marker_num)?;
    log::info!("  {} marker genes", markers.len());

    let reference = CellTypeReference::build(&input.input_sc_data, cell_types, &markers)?;

    let bulk_values = input.input_bulk.column(&bulk_sample)?;
    let bulk_rows = input.input_bulk.gene_lookup();
    let target: Array1<f64> = markers
        .iter()
        .map(|m| {
            bulk_rows
                .get(m.as_str())
                .map(|&i| bulk_values[i])
                .ok_or_else(|| Bulk2SingleError::missing_key(m.as_str(), "bulk genes"))
        })
        .collect::<Result<Vec<f64>>>()?
        .into();

    log::info!(
        "Fitting {} cell types to bulk sample '{}'...",
        reference.cell_types().len(),
        bulk_sample
    );
    let solution = nnls(reference.matrix(), target.view(), &params.nnls)?;
    let weights = solution.x.to_vec();

    let proportions = normalize_weights(&weights)?;
    let total_cells = input.n_cells();
    let counts = scale_target_counts(&proportions, total_cells, params.ratio_num);

    let cell_types = reference.cell_types().to_vec();
    let target_counts: BTreeMap<String, u64> = cell_types.iter().cloned().zip(counts).collect();

    for (label, p) in cell_types.iter().zip(proportions.iter()) {
        log::debug!("  {}: {:.4}", label, p);
    }

    Ok(DeconvolutionResult {
        bulk_sample,
        cell_types,
        weights,
        proportions,
        target_counts,
        markers,
        residual_norm: solution.residual_norm,
        total_cells,
        ratio_num: params.ratio_num,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{CellTypeTable, ExpressionMatrix};
    use ndarray::array;

    fn ids(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn scenario(bulk_values: ndarray::Array2<f64>) -> DeconvolutionInput {
        let bulk = ExpressionMatrix::new(
            bulk_values,
            ids(&["g1", "g2", "g3"]),
            ids(&["bulk"]),
        )
        .unwrap();
        let sc = ExpressionMatrix::new(
            array![[10.0, 0.0], [0.0, 20.0], [0.0, 30.0]],
            ids(&["g1", "g2", "g3"]),
            ids(&["c1", "c2"]),
        )
        .unwrap();
        let meta = CellTypeTable::new(ids(&["c1", "c2"]), ids(&["A", "B"])).unwrap();
        DeconvolutionInput::from_tables(&bulk, &sc, &meta).unwrap()
    }

    fn params(top: usize, ratio: f64) -> EstimatorParams {
        EstimatorParams {
            top_marker_num: top,
            ratio_num: ratio,
            ..Default::default()
        }
    }

    #[test]
    fn test_two_type_scenario() {
        let input = scenario(array![[10.0], [20.0], [30.0]]);
        let result = estimate_cell_proportions(&input, &params(3, 1.0)).unwrap();

        assert_eq!(result.cell_types, ids(&["A", "B"]));
        assert_eq!(result.markers, ids(&["g1", "g2", "g3"]));
        assert!((result.weights[0] - 1.0).abs() < 1e-9);
        assert!((result.weights[1] - 1.0).abs() < 1e-9);
        assert!((result.proportions[0] - 0.5).abs() < 1e-9);
        assert_eq!(result.target_counts["A"], 1);
        assert_eq!(result.target_counts["B"], 1);
        assert_eq!(result.total_cells, 2);
        assert_eq!(result.bulk_sample, "bulk");
    }

    #[test]
    fn test_proportions_sum_to_one() {
        let input = scenario(array![[3.0], [40.0], [55.0]]);
        let result = estimate_cell_proportions(&input, &params(3, 1.0)).unwrap();
        let total: f64 = result.proportions.iter().sum();
        assert!((total - 1.0).abs() < 1e-12);
        assert!(result.proportions.iter().all(|&p| p >= 0.0));
    }

    #[test]
    fn test_scaling_is_monotonic() {
        let input = scenario(array![[10.0], [20.0], [30.0]]);
        let small = estimate_cell_proportions(&input, &params(3, 1.0)).unwrap();
        let large = estimate_cell_proportions(&input, &params(3, 5.0)).unwrap();
        for label in ["A", "B"] {
            assert!(large.target_counts[label] >= small.target_counts[label]);
        }
        assert_eq!(large.target_counts["A"], 5);
    }

    #[test]
    fn test_all_zero_bulk_is_degenerate() {
        let input = scenario(array![[0.0], [0.0], [0.0]]);
        let result = estimate_cell_proportions(&input, &params(3, 1.0));
        assert!(matches!(result, Err(Bulk2SingleError::DegenerateFit { .. })));
    }

    #[test]
    fn test_empty_intersection() {
        let bulk = ExpressionMatrix::new(array![[1.0]], ids(&["x"]), ids(&["bulk"])).unwrap();
        let sc = ExpressionMatrix::new(array![[1.0, 2.0]], ids(&["g1"]), ids(&["c1", "c2"])).unwrap();
        let meta = CellTypeTable::new(ids(&["c1", "c2"]), ids(&["A", "B"])).unwrap();
        let input = DeconvolutionInput::from_tables(&bulk, &sc, &meta).unwrap();

        let result = estimate_cell_proportions(&input, &EstimatorParams::default());
        assert!(matches!(result, Err(Bulk2SingleError::InsufficientData { .. })));
    }

    #[test]
    fn test_zero_markers() {
        let input = scenario(array![[10.0], [20.0], [30.0]]);
        let result = estimate_cell_proportions(&input, &params(0, 1.0));
        assert!(matches!(result, Err(Bulk2SingleError::InsufficientMarkers { .. })));
    }

    #[test]
    fn test_invalid_ratio() {
        let input = scenario(array![[10.0], [20.0], [30.0]]);
        for ratio in [0.0, -1.0, f64::NAN] {
            let result = estimate_cell_proportions(&input, &params(3, ratio));
            assert!(matches!(result, Err(Bulk2SingleError::InvalidInput { .. })));
        }
    }

    #[test]
    fn test_bulk_sample_selection() {
        let bulk = ExpressionMatrix::new(
            array![[10.0, 0.0], [20.0, 20.0], [30.0, 30.0]],
            ids(&["g1", "g2", "g3"]),
            ids(&["s1", "s2"]),
        )
        .unwrap();
        let sc = ExpressionMatrix::new(
            array![[10.0, 0.0], [0.0, 20.0], [0.0, 30.0]],
            ids(&["g1", "g2", "g3"]),
            ids(&["c1", "c2"]),
        )
        .unwrap();
        let meta = CellTypeTable::new(ids(&["c1", "c2"]), ids(&["A", "B"])).unwrap();
        let input = DeconvolutionInput::from_tables(&bulk, &sc, &meta).unwrap();

        let ambiguous = estimate_cell_proportions(&input, &params(3, 1.0));
        assert!(matches!(ambiguous, Err(Bulk2SingleError::InvalidInput { .. })));

        let mut p = params(3, 1.0);
        p.bulk_sample = Some("s2".to_string());
        let result = estimate_cell_proportions(&input, &p).unwrap();
        assert_eq!(result.target_counts["A"], 0);
        assert_eq!(result.target_counts["B"], 2);

        p.bulk_sample = Some("s9".to_string());
        let missing = estimate_cell_proportions(&input, &p);
        assert!(matches!(missing, Err(Bulk2SingleError::MissingKey { .. })));
    }

    #[test]
    fn test_normalize_weights() {
        assert_eq!(normalize_weights(&[1.0, 3.0]).unwrap(), vec![0.25, 0.75]);
        assert!(normalize_weights(&[0.0, 0.0]).is_err());
    }

    #[test]
    fn test_scale_target_counts_rounds_half_even() {
        // 0.25 * 10 = 2.5 -> 2, 0.75 * 10 = 7.5 -> 8
        assert_eq!(scale_target_counts(&[0.25, 0.75], 10, 1.0), vec![2, 8]);
        assert_eq!(scale_target_counts(&[0.5, 0.5], 3, 1.0), vec![2, 2]);
    }
}
