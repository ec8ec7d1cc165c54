//! CSV reading and writing for expression tables, metadata and results

use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use ndarray::Array2;
use serde::Serialize;

use super::results::DeconvolutionResult;
use crate::data::{CellAnnotations, CellTypeTable, ExpressionMatrix, CELL_COLUMN, CELL_TYPE_COLUMN};
use crate::error::{Bulk2SingleError, Result};
use crate::plot::CorrelationTable;

/// Names of the metadata columns holding cell ids and cell-type labels
#[derive(Debug, Clone)]
pub struct MetadataColumns {
    /// Cell id column; the index column is used when absent
    pub cell_column: String,
    /// Cell-type label column
    pub type_column: String,
}

impl Default for MetadataColumns {
    fn default() -> Self {
        Self {
            cell_column: CELL_COLUMN.to_string(),
            type_column: CELL_TYPE_COLUMN.to_string(),
        }
    }
}

/// Pick the delimiter from the header line: tab if present, comma otherwise
fn detect_delimiter<P: AsRef<Path>>(path: P) -> Result<u8> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut header_line = String::new();
    reader.read_line(&mut header_line)?;
    if header_line.trim().is_empty() {
        return Err(Bulk2SingleError::EmptyData {
            reason: "Empty CSV file".to_string(),
        });
    }
    Ok(if header_line.contains('\t') { b'\t' } else { b',' })
}

fn open_table<P: AsRef<Path>>(path: P) -> Result<csv::Reader<File>> {
    let delimiter = detect_delimiter(&path)?;
    let reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)?;
    Ok(reader)
}

/// Read an expression table.
///
/// Expected format: first column is gene IDs, first row is sample or cell IDs.
pub fn read_expression_matrix<P: AsRef<Path>>(path: P) -> Result<ExpressionMatrix> {
    let mut reader = open_table(path)?;

    let headers = reader.headers()?.clone();
    if headers.len() < 2 {
        return Err(Bulk2SingleError::InvalidExpressionMatrix {
            reason: "Not enough columns in header".to_string(),
        });
    }
    let column_ids: Vec<String> = headers.iter().skip(1).map(|s| s.to_string()).collect();
    let n_columns = column_ids.len();

    let mut gene_ids: Vec<String> = Vec::new();
    let mut flat: Vec<f64> = Vec::new();

    for record in reader.records() {
        let record = record?;
        if record.iter().all(|f| f.is_empty()) {
            continue;
        }
        if record.len() != n_columns + 1 {
            return Err(Bulk2SingleError::InvalidExpressionMatrix {
                reason: format!("Row has {} columns, expected {}", record.len(), n_columns + 1),
            });
        }

        gene_ids.push(record[0].to_string());
        for field in record.iter().skip(1) {
            let value = field
                .parse::<f64>()
                .map_err(|_| Bulk2SingleError::InvalidExpressionMatrix {
                    reason: format!("Invalid expression value: {}", field),
                })?;
            flat.push(value);
        }
    }

    if gene_ids.is_empty() {
        return Err(Bulk2SingleError::EmptyData {
            reason: "No genes found in expression table".to_string(),
        });
    }

    let values = Array2::from_shape_vec((gene_ids.len(), n_columns), flat).map_err(|e| {
        Bulk2SingleError::InvalidExpressionMatrix {
            reason: e.to_string(),
        }
    })?;

    ExpressionMatrix::new(values, gene_ids, column_ids)
}

/// Read a per-cell annotation table.
///
/// Expected format: first column is the row index, remaining columns are annotations.
pub fn read_cell_annotations<P: AsRef<Path>>(path: P) -> Result<CellAnnotations> {
    let mut reader = open_table(path)?;

    let headers = reader.headers()?.clone();
    let column_names: Vec<String> = headers.iter().skip(1).map(|s| s.to_string()).collect();

    let mut cell_ids: Vec<String> = Vec::new();
    let mut columns: Vec<Vec<String>> = vec![Vec::new(); column_names.len()];

    for record in reader.records() {
        let record = record?;
        if record.iter().all(|f| f.is_empty()) {
            continue;
        }
        if record.len() != column_names.len() + 1 {
            return Err(Bulk2SingleError::InvalidMetadata {
                reason: format!(
                    "Row has {} columns, expected {}",
                    record.len(),
                    column_names.len() + 1
                ),
            });
        }

        cell_ids.push(record[0].to_string());
        for (values, field) in columns.iter_mut().zip(record.iter().skip(1)) {
            values.push(field.to_string());
        }
    }

    if cell_ids.is_empty() {
        return Err(Bulk2SingleError::EmptyData {
            reason: "No cells found in metadata".to_string(),
        });
    }

    let mut annotations = CellAnnotations::new(cell_ids);
    for (name, values) in column_names.iter().zip(columns) {
        annotations.add_column(name, values)?;
    }

    Ok(annotations)
}

/// Read the cell / cell-type metadata table.
///
/// Labels come from `columns.type_column`, or from the only annotation column
/// when the table has exactly one. Cell ids come from `columns.cell_column`
/// when present, otherwise from the index column.
pub fn read_cell_type_table<P: AsRef<Path>>(path: P, columns: &MetadataColumns) -> Result<CellTypeTable> {
    let annotations = read_cell_annotations(path)?;
    let names = annotations.column_names();

    let type_column = if annotations.has_column(&columns.type_column) {
        columns.type_column.clone()
    } else if names.len() == 1 {
        log::debug!(
            "Column '{}' not found, using '{}' as cell-type column",
            columns.type_column,
            names[0]
        );
        names[0].to_string()
    } else {
        return Err(Bulk2SingleError::missing_key(
            columns.type_column.as_str(),
            "single-cell metadata columns",
        ));
    };

    let cell_column = annotations
        .has_column(&columns.cell_column)
        .then_some(columns.cell_column.as_str());

    CellTypeTable::from_annotations(&annotations, cell_column, &type_column)
}

/// Write target cell counts as `cell_type,proportion,target_count`
pub fn write_target_counts<P: AsRef<Path>>(path: P, result: &DeconvolutionResult) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(["cell_type", "proportion", "target_count"])?;
    for (cell_type, proportion) in result.cell_types.iter().zip(&result.proportions) {
        let count = result.target_counts.get(cell_type).copied().unwrap_or(0);
        writer.write_record([
            cell_type.clone(),
            format!("{:.6}", proportion),
            count.to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

/// Write one marker gene per line
pub fn write_markers<P: AsRef<Path>>(path: P, markers: &[String]) -> Result<()> {
    let mut file = File::create(path)?;
    for gene in markers {
        writeln!(file, "{}", gene)?;
    }
    Ok(())
}

/// Write a correlation table, reference cell types as rows
pub fn write_correlation_table<P: AsRef<Path>>(path: P, table: &CorrelationTable) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;

    let mut header = vec![String::new()];
    header.extend(table.generated_types.iter().cloned());
    writer.write_record(&header)?;

    for (i, cell_type) in table.reference_types.iter().enumerate() {
        let mut row = vec![cell_type.clone()];
        row.extend(table.coefficients.row(i).iter().map(|r| format!("{:.6}", r)));
        writer.write_record(&row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Serialize any value as pretty JSON
pub fn write_json<P: AsRef<Path>, T: Serialize>(path: P, value: &T) -> Result<()> {
    let file = File::create(path)?;
    serde_json::to_writer_pretty(file, value)?;
    Ok(())
}
