//! Plotly chart container and the cell-count bar chart

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use plotly::common::Title;
use plotly::layout::{Axis, AxisType, Margin};
use plotly::{Bar, Layout};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{Bulk2SingleError, Result};

/// Bar colors, cycled when there are more cell types than entries
pub const CELL_TYPE_PALETTE: [&str; 20] = [
    "#1f577b", "#279ad7", "#f0eee4", "#fdb462", "#e9484d", "#78c2c4", "#b3de69", "#fccde5",
    "#9fa0c6", "#a2d4a5", "#6d7f96", "#e1b5a7", "#53a4a9", "#f6a693", "#bc80bd", "#ccebc5",
    "#ffed6f", "#8dd3c7", "#80b1d3", "#d9d9d9",
];

pub const CELL_PROPORTION_TITLE: &str = "The number of cells per cell type in bulk-seq data";

/// Plotly figure as JSON: `{config, data, layout}`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct PlotlyChart {
    pub config: Value,
    pub data: Vec<Value>,
    pub layout: Value,
}

pub fn default_plotly_config() -> Value {
    json!({
        "displayModeBar": true,
        "staticPlot": false,
        "dragmode": "zoom",
        "modeBarButtons": [["toImage"]],
    })
}

impl PlotlyChart {
    pub fn with_layout_and_data<D: Serialize>(layout: Layout, data: Vec<D>) -> Result<Self> {
        Ok(PlotlyChart {
            config: default_plotly_config(),
            data: data
                .into_iter()
                .map(|d| serde_json::to_value(&d))
                .collect::<std::result::Result<_, _>>()?,
            layout: serde_json::to_value(&layout)?,
        })
    }
}

/// Insert extra keys into a serialized trace
pub(crate) fn extend_trace(trace: &mut Value, entries: Vec<(&str, Value)>) -> Result<()> {
    let map = trace.as_object_mut().ok_or_else(|| Bulk2SingleError::InvalidInput {
        reason: "plotly trace did not serialize to an object".to_string(),
    })?;
    for (key, value) in entries {
        map.insert(key.to_string(), value);
    }
    Ok(())
}

/// Count cells per label, largest first; equal counts ordered by label
pub fn cell_type_counts(labels: &[String]) -> Vec<(String, usize)> {
    let mut counts: std::collections::HashMap<&str, usize> = std::collections::HashMap::new();
    for label in labels {
        *counts.entry(label.as_str()).or_default() += 1;
    }
    let mut counts: Vec<(String, usize)> = counts
        .into_iter()
        .map(|(label, n)| (label.to_string(), n))
        .collect();
    counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    counts
}

/// Bar chart of cells per cell type, one palette color per bar
pub fn cell_proportion_chart(counts: &[(String, usize)]) -> Result<PlotlyChart> {
    let names: Vec<String> = counts.iter().map(|(label, _)| label.clone()).collect();
    let values: Vec<usize> = counts.iter().map(|(_, n)| *n).collect();
    let colors: Vec<&str> = (0..counts.len())
        .map(|i| CELL_TYPE_PALETTE[i % CELL_TYPE_PALETTE.len()])
        .collect();

    let mut trace = serde_json::to_value(
        Bar::new(names, values)
            .name("")
            .hover_template("%{x}: %{y} cells"),
    )?;
    extend_trace(&mut trace, vec![("marker", json!({ "color": colors }))])?;

    let layout = Layout::new()
        .title(Title::with_text(CELL_PROPORTION_TITLE))
        .show_legend(false)
        .margin(Margin::new().bottom(120))
        .x_axis(
            Axis::new()
                .type_(AxisType::Category)
                .tick_angle(-90.0)
                .title("Cell type"),
        )
        .y_axis(Axis::new().title("Cell number"));

    PlotlyChart::with_layout_and_data(layout, vec![trace])
}

/// Write the chart as pretty-printed JSON
pub fn write_chart<P: AsRef<Path>>(path: P, chart: &PlotlyChart) -> Result<()> {
    let writer = BufWriter::new(File::create(path.as_ref())?);
    serde_json::to_writer_pretty(writer, chart)?;
    log::info!("Chart written to: {}", path.as_ref().display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn ids(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_cell_type_counts_order() {
        let counts = cell_type_counts(&ids(&["T", "B", "T", "NK", "B", "T", "Mono"]));
        assert_eq!(
            counts,
            vec![
                ("T".to_string(), 3),
                ("B".to_string(), 2),
                ("Mono".to_string(), 1),
                ("NK".to_string(), 1),
            ]
        );
    }

    #[test]
    fn test_cell_proportion_chart() {
        let counts = vec![("T".to_string(), 3), ("B".to_string(), 2)];
        let chart = cell_proportion_chart(&counts).unwrap();

        assert_eq!(chart.data.len(), 1);
        let trace = &chart.data[0];
        assert_eq!(trace["type"], "bar");
        assert_eq!(trace["x"], json!(["T", "B"]));
        assert_eq!(trace["y"], json!([3, 2]));
        assert_eq!(trace["marker"]["color"][1], CELL_TYPE_PALETTE[1]);
        assert_eq!(chart.layout["title"]["text"], CELL_PROPORTION_TITLE);
        assert_eq!(chart.layout["xaxis"]["title"]["text"], "Cell type");
        assert_eq!(chart.layout["yaxis"]["title"]["text"], "Cell number");
        assert_eq!(chart.config["displayModeBar"], true);
    }

    #[test]
    fn test_palette_cycles() {
        let counts: Vec<(String, usize)> = (0..25).map(|i| (format!("t{}", i), 1)).collect();
        let chart = cell_proportion_chart(&counts).unwrap();
        assert_eq!(chart.data[0]["marker"]["color"][20], CELL_TYPE_PALETTE[0]);
    }

    #[test]
    fn test_write_chart() {
        let chart = cell_proportion_chart(&[("A".to_string(), 1)]).unwrap();
        let file = NamedTempFile::new().unwrap();
        write_chart(file.path(), &chart).unwrap();

        let text = std::fs::read_to_string(file.path()).unwrap();
        let parsed: PlotlyChart = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, chart);
    }
}
