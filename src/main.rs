//! rust_bulk2single command-line interface

use clap::Parser;
use log::{info, LevelFilter};

use rust_bulk2single::cli::{Cli, Commands};
use rust_bulk2single::io::{read_cell_annotations, write_correlation_table, write_json, write_markers};
use rust_bulk2single::prelude::*;

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn main() {
    let args: Vec<String> = std::env::args().collect();

    // Find the first non-flag argument (potential subcommand)
    let first_positional = args.iter().skip(1).find(|a| !a.starts_with('-'));
    let subcommands = ["deconvolve", "markers", "plot-counts", "plot-correlation", "help"];
    let has_subcommand = first_positional.is_some_and(|a| subcommands.contains(&a.as_str()));

    if !has_subcommand {
        if args.len() == 1 {
            print_no_args();
            return;
        }
        if args.iter().any(|a| a == "--help") {
            print_long_help();
            return;
        }
        if args.iter().any(|a| a == "-h") {
            print_short_help();
            return;
        }
        if args.iter().any(|a| a == "-V" || a == "--version") {
            println!("rust_bulk2single {}", VERSION);
            return;
        }
        print_no_args();
        return;
    }

    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    env_logger::Builder::new()
        .filter_level(log_level)
        .format_timestamp(None)
        .init();

    if cli.threads > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(cli.threads)
            .build_global()
            .ok();
    }

    let result = match cli.command {
        Some(Commands::Deconvolve {
            bulk,
            sc_data,
            sc_meta,
            top_marker_num,
            ratio_num,
            bulk_sample,
            cell_column,
            type_column,
            max_iter,
            output,
            report,
        }) => {
            let columns = MetadataColumns {
                cell_column,
                type_column,
            };
            let params = EstimatorParams {
                top_marker_num,
                ratio_num,
                bulk_sample,
                nnls: NnlsParams {
                    max_iter,
                    ..Default::default()
                },
            };
            run_deconvolve(&bulk, &sc_data, &sc_meta, &columns, &params, &output, report.as_deref())
        }
        Some(Commands::Markers {
            sc_data,
            sc_meta,
            top_marker_num,
            cell_column,
            type_column,
            output,
            ranking,
        }) => {
            let columns = MetadataColumns {
                cell_column,
                type_column,
            };
            run_markers(&sc_data, &sc_meta, &columns, top_marker_num, &output, ranking.as_deref())
        }
        Some(Commands::PlotCounts {
            meta,
            type_column,
            output,
        }) => run_plot_counts(&meta, &type_column, &output),
        Some(Commands::PlotCorrelation {
            reference_data,
            reference_meta,
            generated_data,
            generated_meta,
            n_markers,
            cell_column,
            type_column,
            output,
            table,
        }) => {
            let columns = MetadataColumns {
                cell_column,
                type_column,
            };
            run_plot_correlation(
                (&reference_data, &reference_meta),
                (&generated_data, &generated_meta),
                &columns,
                n_markers,
                &output,
                table.as_deref(),
            )
        }
        None => {
            print_no_args();
            return;
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

// ---------------------------------------------------------------------------
// Custom help output
// ---------------------------------------------------------------------------

fn print_no_args() {
    println!("rust_bulk2single v{}", VERSION);
    println!("Run `rust_bulk2single -h` for usage or `rust_bulk2single --help` for detailed information.");
}

fn print_short_help() {
    println!("rust_bulk2single v{}", VERSION);
    println!();
    println!("Usage: rust_bulk2single <COMMAND> [OPTIONS]");
    println!();
    println!("Commands:");
    println!("  deconvolve        Estimate target cell counts for a bulk sample");
    println!("  markers           Select marker genes per cell type");
    println!("  plot-counts       Bar chart of cells per cell type");
    println!("  plot-correlation  Correlation heatmap of reference and generated cell types");
    println!();
    println!("Run `rust_bulk2single <COMMAND> --help` for command-specific options.");
}

fn print_long_help() {
    println!("rust_bulk2single v{}", VERSION);
    println!("Bulk-to-single-cell deconvolution prep in Rust");
    println!();
    println!("Usage: rust_bulk2single <COMMAND> [OPTIONS]");
    println!();
    println!("Commands:");
    println!("  deconvolve        Estimate target cell counts for a bulk sample");
    println!("                      - gene intersection of bulk and single-cell tables");
    println!("                      - Wilcoxon rank-sum marker selection per cell type");
    println!("                      - non-negative least squares against per-type means");
    println!("  markers           Select marker genes per cell type");
    println!("  plot-counts       Bar chart of cells per cell type (plotly JSON)");
    println!("  plot-correlation  Correlation heatmap of reference and generated cell types");
    println!();
    println!("Global Options:");
    println!("  -v, --verbose    Enable verbose output");
    println!("  -t, --threads    Number of threads (0 = all available)");
    println!("  -h               Print short help");
    println!("      --help       Print detailed help");
    println!("  -V, --version    Print version");
    println!();
    println!("Examples:");
    println!("  rust_bulk2single deconvolve -b bulk.csv -s sc_data.csv -m sc_meta.csv \\");
    println!("    --top-marker-num 200 --ratio-num 1 -o target_counts.csv");
    println!();
    println!("  rust_bulk2single markers -s sc_data.csv -m sc_meta.csv -o markers.txt");
    println!();
    println!("  rust_bulk2single plot-counts -m generated_meta.csv -o cell_counts.json");
}

// ---------------------------------------------------------------------------
// Subcommand implementations
// ---------------------------------------------------------------------------

fn run_deconvolve(
    bulk_path: &str,
    sc_data_path: &str,
    sc_meta_path: &str,
    columns: &MetadataColumns,
    params: &EstimatorParams,
    output_path: &str,
    report_path: Option<&str>,
) -> Result<()> {
    let input = DeconvolutionInput::from_csv(bulk_path, sc_data_path, sc_meta_path, columns)?;
    info!(
        "  {} cells, {} shared genes",
        input.n_cells(),
        input.intersect_gene.len()
    );

    let result = estimate_cell_proportions(&input, params)?;

    info!("Writing target counts to: {}", output_path);
    write_target_counts(output_path, &result)?;

    if let Some(path) = report_path {
        info!("Writing report to: {}", path);
        write_json(path, &result)?;
    }

    println!("{}", result.summary());
    Ok(())
}

fn load_labelled_cells(
    data_path: &str,
    meta_path: &str,
    columns: &MetadataColumns,
) -> Result<(ExpressionMatrix, CellTypeTable)> {
    info!("Loading expression from: {}", data_path);
    let matrix = read_expression_matrix(data_path)?;
    info!("  {} genes, {} cells", matrix.n_genes(), matrix.n_columns());

    info!("Loading metadata from: {}", meta_path);
    let table = read_cell_type_table(meta_path, columns)?.align_to(matrix.column_ids())?;
    Ok((matrix, table))
}

fn run_markers(
    sc_data_path: &str,
    sc_meta_path: &str,
    columns: &MetadataColumns,
    top_marker_num: usize,
    output_path: &str,
    ranking_path: Option<&str>,
) -> Result<()> {
    let (matrix, table) = load_labelled_cells(sc_data_path, sc_meta_path, columns)?;

    info!("Ranking genes for {} cell types...", table.levels().len());
    let ranking = rank_genes_groups(&matrix, table.cell_types())?;
    let markers = ranking.top_names(top_marker_num);
    if markers.is_empty() {
        return Err(Bulk2SingleError::InsufficientMarkers {
            reason: format!("no marker genes selected (top_marker_num = {})", top_marker_num),
        });
    }

    info!("Writing {} marker genes to: {}", markers.len(), output_path);
    write_markers(output_path, &markers)?;

    if let Some(path) = ranking_path {
        info!("Writing ranking to: {}", path);
        write_json(path, &ranking)?;
    }
    Ok(())
}

fn run_plot_counts(meta_path: &str, type_column: &str, output_path: &str) -> Result<()> {
    info!("Loading metadata from: {}", meta_path);
    let annotations = read_cell_annotations(meta_path)?;
    let labels = annotations
        .column(type_column)
        .ok_or_else(|| Bulk2SingleError::missing_key(type_column, "metadata columns"))?;

    let counts = cell_type_counts(labels);
    for (label, n) in &counts {
        info!("  {}: {}", label, n);
    }

    write_chart(output_path, &cell_proportion_chart(&counts)?)
}

fn run_plot_correlation(
    reference: (&str, &str),
    generated: (&str, &str),
    columns: &MetadataColumns,
    n_markers: usize,
    output_path: &str,
    table_path: Option<&str>,
) -> Result<()> {
    let key = columns.type_column.as_str();

    let (matrix, table) = load_labelled_cells(reference.0, reference.1, columns)?;
    let reference = AnnotatedSingleCell::from_cell_types(&matrix, &table, key)?;

    let (matrix, table) = load_labelled_cells(generated.0, generated.1, columns)?;
    let generated = AnnotatedSingleCell::from_cell_types(&matrix, &table, key)?;

    let correlation = marker_correlation(&reference, &generated, key, n_markers)?;
    for (cell_type, r) in correlation.diagonal() {
        info!("  {}: r = {:.3}", cell_type, r);
    }

    if let Some(path) = table_path {
        info!("Writing correlation table to: {}", path);
        write_correlation_table(path, &correlation)?;
    }

    write_chart(output_path, &correlation_heatmap(&correlation)?)
}
