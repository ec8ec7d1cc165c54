//! Command-line interface for rust_bulk2single

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "rust_bulk2single")]
#[command(version)]
#[command(about = "Bulk-to-single-cell deconvolution prep in Rust")]
#[command(disable_help_flag = true)]
#[command(disable_version_flag = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Number of threads (0 = all available)
    #[arg(short = 't', long, global = true, default_value = "0")]
    pub threads: usize,

    /// Print short help
    #[arg(short = 'h', action = clap::ArgAction::HelpShort, global = true)]
    pub short_help: Option<bool>,

    /// Print detailed help
    #[arg(long = "help", action = clap::ArgAction::HelpLong, global = true)]
    pub long_help: Option<bool>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Estimate target cell counts for a bulk sample
    #[command(
        about = "Estimate target cell counts for a bulk sample",
        long_about = "Estimate target cell counts for a bulk sample\n\n\
            Restricts the bulk and single-cell tables to their shared genes, selects\n\
            marker genes per cell type with a one-vs-rest Wilcoxon rank-sum test, fits\n\
            the bulk marker profile as a non-negative mixture of per-type mean profiles,\n\
            and scales the fitted proportions by the number of single cells.",
        after_long_help = "\
Examples:
  # Single-sample bulk table
  rust_bulk2single deconvolve -b bulk.csv -s sc_data.csv -m sc_meta.csv -o target_counts.csv

  # Pick one sample of a multi-sample bulk table and double the cell count
  rust_bulk2single deconvolve -b bulk.csv -s sc_data.csv -m sc_meta.csv \\
    --bulk-sample patient_3 --ratio-num 2

  # Write the full result as JSON
  rust_bulk2single deconvolve -b bulk.csv -s sc_data.csv -m sc_meta.csv --report result.json"
    )]
    Deconvolve {
        /// Path to bulk expression CSV file
        #[arg(short, long,
            long_help = "Path to bulk expression CSV file.\n\
                Format: first column = gene IDs, remaining columns = bulk samples.\n\
                Supports both CSV (comma) and TSV (tab) delimiters (auto-detected).")]
        bulk: String,

        /// Path to single-cell expression CSV file
        #[arg(short = 's', long,
            long_help = "Path to single-cell expression CSV file.\n\
                Format: first column = gene IDs, remaining columns = cells.")]
        sc_data: String,

        /// Path to single-cell metadata CSV file
        #[arg(short = 'm', long,
            long_help = "Path to single-cell metadata CSV file.\n\
                Format: first column = row index, plus a cell ID column and a cell-type\n\
                column (see --cell-column and --type-column). Every single-cell column\n\
                must have a row.")]
        sc_meta: String,

        /// Marker genes per cell type [default: 200]
        #[arg(long, default_value = "200")]
        top_marker_num: usize,

        /// Scale for the total target cell count [default: 1.0]
        #[arg(long, default_value = "1.0",
            long_help = "Scale for the total target cell count.\n\
                Target counts sum to roughly (number of single cells) x ratio.")]
        ratio_num: f64,

        /// Bulk sample to fit
        #[arg(long,
            long_help = "Bulk sample (column name) to fit.\n\
                Required when the bulk table has more than one sample.")]
        bulk_sample: Option<String>,

        /// Metadata column holding cell IDs [default: Cell]
        #[arg(long, default_value = "Cell")]
        cell_column: String,

        /// Metadata column holding cell-type labels [default: Cell_type]
        #[arg(long, default_value = "Cell_type")]
        type_column: String,

        /// Maximum NNLS iterations
        #[arg(long)]
        max_iter: Option<usize>,

        /// Output file path [default: target_counts.csv]
        #[arg(short, long, default_value = "target_counts.csv")]
        output: String,

        /// Write the full result as JSON
        #[arg(long)]
        report: Option<String>,
    },

    /// Select marker genes per cell type
    #[command(
        about = "Select marker genes per cell type",
        long_about = "Select marker genes per cell type\n\n\
            Ranks genes for every cell type against all other cells with a Wilcoxon\n\
            rank-sum test and writes the sorted union of the top genes, one per line.",
        after_long_help = "\
Examples:
  rust_bulk2single markers -s sc_data.csv -m sc_meta.csv --top-marker-num 100 -o markers.txt

  # Also keep the per-type rankings
  rust_bulk2single markers -s sc_data.csv -m sc_meta.csv --ranking ranking.json"
    )]
    Markers {
        /// Path to single-cell expression CSV file
        #[arg(short = 's', long)]
        sc_data: String,

        /// Path to single-cell metadata CSV file
        #[arg(short = 'm', long)]
        sc_meta: String,

        /// Marker genes per cell type [default: 200]
        #[arg(long, default_value = "200")]
        top_marker_num: usize,

        /// Metadata column holding cell IDs [default: Cell]
        #[arg(long, default_value = "Cell")]
        cell_column: String,

        /// Metadata column holding cell-type labels [default: Cell_type]
        #[arg(long, default_value = "Cell_type")]
        type_column: String,

        /// Output file path [default: markers.txt]
        #[arg(short, long, default_value = "markers.txt")]
        output: String,

        /// Write per-type scores and p-values as JSON
        #[arg(long)]
        ranking: Option<String>,
    },

    /// Bar chart of cells per cell type
    #[command(
        about = "Bar chart of cells per cell type",
        long_about = "Bar chart of cells per cell type\n\n\
            Counts the cells of every label in a metadata table, typically the\n\
            metadata of a generated single-cell dataset, and writes a plotly chart\n\
            as JSON.",
        after_long_help = "\
Examples:
  rust_bulk2single plot-counts -m generated_meta.csv -o cell_counts.json"
    )]
    PlotCounts {
        /// Path to metadata CSV file
        #[arg(short = 'm', long)]
        meta: String,

        /// Metadata column holding cell-type labels [default: Cell_type]
        #[arg(long, default_value = "Cell_type")]
        type_column: String,

        /// Output file path [default: cell_counts.json]
        #[arg(short, long, default_value = "cell_counts.json")]
        output: String,
    },

    /// Correlation heatmap of reference and generated cell types
    #[command(
        about = "Correlation heatmap of reference and generated cell types",
        long_about = "Correlation heatmap of reference and generated cell types\n\n\
            Takes the top reference marker genes per cell type that the generated data\n\
            also measures, averages them per cell type in both datasets, and computes\n\
            the Pearson correlation for every pair of shared cell types.",
        after_long_help = "\
Examples:
  rust_bulk2single plot-correlation \\
    --reference-data sc_data.csv --reference-meta sc_meta.csv \\
    --generated-data generated_data.csv --generated-meta generated_meta.csv \\
    -o correlation.json --table correlation.csv"
    )]
    PlotCorrelation {
        /// Path to reference single-cell expression CSV file
        #[arg(long)]
        reference_data: String,

        /// Path to reference single-cell metadata CSV file
        #[arg(long)]
        reference_meta: String,

        /// Path to generated single-cell expression CSV file
        #[arg(long)]
        generated_data: String,

        /// Path to generated single-cell metadata CSV file
        #[arg(long)]
        generated_meta: String,

        /// Marker genes per reference cell type [default: 200]
        #[arg(long, default_value = "200")]
        n_markers: usize,

        /// Metadata column holding cell IDs [default: Cell]
        #[arg(long, default_value = "Cell")]
        cell_column: String,

        /// Metadata column holding cell-type labels [default: Cell_type]
        #[arg(long, default_value = "Cell_type")]
        type_column: String,

        /// Output file path [default: correlation.json]
        #[arg(short, long, default_value = "correlation.json")]
        output: String,

        /// Also write the correlation table as CSV
        #[arg(long)]
        table: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_subcommand_long_help() {
        let err = Cli::try_parse_from(["rust_bulk2single", "deconvolve", "--help"])
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::DisplayHelp);
        let text = err.to_string();
        assert!(text.contains("--bulk-sample"));
        assert!(text.contains("Examples:"));
        assert!(text.contains("Required when the bulk table has more than one sample"));
    }

    #[test]
    fn test_subcommand_short_help() {
        let err = Cli::try_parse_from(["rust_bulk2single", "markers", "-h"])
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::DisplayHelp);
        assert!(!err.to_string().contains("Examples:"));
    }

    #[test]
    fn test_parse_deconvolve() {
        let cli = Cli::try_parse_from([
            "rust_bulk2single",
            "deconvolve",
            "-b",
            "bulk.csv",
            "-s",
            "sc.csv",
            "-m",
            "meta.csv",
            "--ratio-num",
            "2",
            "-v",
        ])
        .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Some(Commands::Deconvolve {
                bulk,
                ratio_num,
                top_marker_num,
                output,
                ..
            }) => {
                assert_eq!(bulk, "bulk.csv");
                assert_eq!(ratio_num, 2.0);
                assert_eq!(top_marker_num, 200);
                assert_eq!(output, "target_counts.csv");
            }
            _ => panic!("expected deconvolve"),
        }
    }
}
