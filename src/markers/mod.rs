//! Marker gene selection for the deconvolution reference

mod fdr;
mod wilcoxon;

pub use fdr::benjamini_hochberg;
pub use wilcoxon::{rank_genes_groups, GroupRanking, MarkerRanking};

use crate::data::ExpressionMatrix;
use crate::error::{Bulk2SingleError, Result};

/// Take the `top_marker_num` best-ranked genes of every cell type.
///
/// Returns the sorted, deduplicated union. `matrix` is genes x cells with one
/// label per column in `cell_types`.
pub fn select_markers(
    matrix: &ExpressionMatrix,
    cell_types: &[String],
    top_marker_num: usize,
) -> Result<Vec<String>> {
    let ranking = rank_genes_groups(matrix, cell_types)?;
    let markers = ranking.top_names(top_marker_num);

    if markers.is_empty() {
        return Err(Bulk2SingleError::InsufficientMarkers {
            reason: format!(
                "no marker genes selected (top_marker_num = {}, {} genes, {} cell types)",
                top_marker_num,
                matrix.n_genes(),
                ranking.groups.len()
            ),
        });
    }

    log::debug!(
        "Selected {} marker genes across {} cell types",
        markers.len(),
        ranking.groups.len()
    );
    Ok(markers)
}
