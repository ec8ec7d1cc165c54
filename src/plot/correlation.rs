//! Expression correlation between reference and generated single cells

use std::collections::HashSet;

use ndarray::Array2;
use plotly::common::{ColorBar, ColorScale, ColorScaleElement, Title};
use plotly::layout::{Axis, AxisType};
use plotly::{HeatMap, Layout};
use serde_json::json;

use super::chart::{extend_trace, PlotlyChart};
use crate::data::AnnotatedSingleCell;
use crate::deconvolution::CellTypeReference;
use crate::error::{Bulk2SingleError, Result};
use crate::markers::rank_genes_groups;
use crate::stats::pearson_correlation;

/// Default number of marker genes per cell type used for the comparison
pub const DEFAULT_CORRELATION_MARKERS: usize = 200;

pub const CORRELATION_TITLE: &str = "Expression correlation";

/// Pearson correlation of per-type marker means.
///
/// Row i, column j compares reference type i with generated type j.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrelationTable {
    pub reference_types: Vec<String>,
    pub generated_types: Vec<String>,
    pub coefficients: Array2<f64>,
    /// Marker genes the means were taken over
    pub markers: Vec<String>,
}

impl CorrelationTable {
    /// Coefficients of matching cell types
    pub fn diagonal(&self) -> Vec<(String, f64)> {
        self.reference_types
            .iter()
            .filter_map(|t| {
                let i = self.reference_types.iter().position(|r| r == t)?;
                let j = self.generated_types.iter().position(|g| g == t)?;
                Some((t.clone(), self.coefficients[[i, j]]))
            })
            .collect()
    }
}

fn cell_type_labels<'a>(adata: &'a AnnotatedSingleCell, celltype_key: &str) -> Result<&'a Vec<String>> {
    adata
        .obs()
        .column(celltype_key)
        .ok_or_else(|| Bulk2SingleError::missing_key(celltype_key, "cell annotations"))
}

/// Correlate reference and generated single cells over reference markers.
///
/// Markers are the top `n_markers` genes per reference cell type that the
/// generated object also measures. Only cell types present in both objects
/// are compared, in sorted order.
pub fn marker_correlation(
    reference: &AnnotatedSingleCell,
    generated: &AnnotatedSingleCell,
    celltype_key: &str,
    n_markers: usize,
) -> Result<CorrelationTable> {
    let reference_labels = cell_type_labels(reference, celltype_key)?;
    let generated_labels = cell_type_labels(generated, celltype_key)?;

    let reference_expr = reference.to_expression()?;
    let ranking = rank_genes_groups(&reference_expr, reference_labels)?;

    let generated_genes: HashSet<&str> = generated.gene_ids().iter().map(|g| g.as_str()).collect();
    let markers: Vec<String> = ranking
        .top_names(n_markers)
        .into_iter()
        .filter(|g| generated_genes.contains(g.as_str()))
        .collect();
    if markers.is_empty() {
        return Err(Bulk2SingleError::InsufficientMarkers {
            reason: "no reference marker genes are measured in the generated data".to_string(),
        });
    }
    log::info!("Comparing {} marker genes", markers.len());

    let generated_expr = generated.to_expression()?;
    let reference_means = CellTypeReference::build(&reference_expr, reference_labels, &markers)?;
    let generated_means = CellTypeReference::build(&generated_expr, generated_labels, &markers)?;

    let shared: Vec<String> = reference_means
        .cell_types()
        .iter()
        .filter(|t| generated_means.axis().id(t).is_some())
        .cloned()
        .collect();
    if shared.is_empty() {
        return Err(Bulk2SingleError::InsufficientData {
            reason: "reference and generated data share no cell types".to_string(),
        });
    }

    let mut coefficients = Array2::<f64>::zeros((shared.len(), shared.len()));
    for (i, ref_type) in shared.iter().enumerate() {
        let Some(x) = reference_means.profile(ref_type) else {
            continue;
        };
        for (j, gen_type) in shared.iter().enumerate() {
            if let Some(y) = generated_means.profile(gen_type) {
                coefficients[[i, j]] = pearson_correlation(&x, &y);
            }
        }
    }

    Ok(CorrelationTable {
        reference_types: shared.clone(),
        generated_types: shared,
        coefficients,
        markers,
    })
}

/// Reversed red-blue diverging scale, blue at -1 and red at +1
fn red_blue_colorscale() -> ColorScale {
    ColorScale::Vector(
        [
            (0.0, "#053061"),
            (0.1, "#2166ac"),
            (0.2, "#4393c3"),
            (0.3, "#92c5de"),
            (0.4, "#d1e5f0"),
            (0.5, "#f7f7f7"),
            (0.6, "#fddbc7"),
            (0.7, "#f4a582"),
            (0.8, "#d6604d"),
            (0.9, "#b2182b"),
            (1.0, "#67001f"),
        ]
        .into_iter()
        .map(|(v, c)| ColorScaleElement(v, c.to_string()))
        .collect(),
    )
}

/// Heatmap of a correlation table: reference types on x, generated types on y
pub fn correlation_heatmap(table: &CorrelationTable) -> Result<PlotlyChart> {
    // plotly rows are y values
    let z: Vec<Vec<f64>> = (0..table.generated_types.len())
        .map(|j| {
            (0..table.reference_types.len())
                .map(|i| table.coefficients[[i, j]])
                .collect()
        })
        .collect();

    let mut trace = serde_json::to_value(
        HeatMap::new(table.reference_types.clone(), table.generated_types.clone(), z)
            .hover_template("Reference: %{x}<br>Generated: %{y}<br>r = %{z:.3f}")
            .color_bar(ColorBar::new().title("Pearson r").outline_width(0))
            .color_scale(red_blue_colorscale())
            .name(""),
    )?;
    extend_trace(&mut trace, vec![("zmin", json!(-1.0)), ("zmax", json!(1.0))])?;

    let layout = Layout::new()
        .title(Title::with_text(CORRELATION_TITLE))
        .x_axis(
            Axis::new()
                .type_(AxisType::Category)
                .tick_angle(-90.0)
                .title("scRNA-seq reference"),
        )
        .y_axis(
            Axis::new()
                .type_(AxisType::Category)
                .auto_margin(true)
                .title("deconvoluted bulk-seq"),
        );

    PlotlyChart::with_layout_and_data(layout, vec![trace])
}
