//! Diagnostic charts as plotly JSON

mod chart;
mod correlation;

pub use chart::{
    cell_proportion_chart, cell_type_counts, default_plotly_config, write_chart, PlotlyChart,
    CELL_PROPORTION_TITLE, CELL_TYPE_PALETTE,
};
pub use correlation::{
    correlation_heatmap, marker_correlation, CorrelationTable, CORRELATION_TITLE,
    DEFAULT_CORRELATION_MARKERS,
};
