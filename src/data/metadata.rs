//! Per-cell metadata: observation tables and the cell/cell-type table

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::error::{Bulk2SingleError, Result};

/// Column name holding cell identifiers in a cell-type table
pub const CELL_COLUMN: &str = "Cell";
/// Column name holding cell-type labels in a cell-type table
pub const CELL_TYPE_COLUMN: &str = "Cell_type";

/// Categorical per-cell annotations (the `obs` table of a single-cell object)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CellAnnotations {
    /// Cell identifiers
    cell_ids: Vec<String>,
    /// Annotation columns in insertion order (column name, values per cell)
    columns: Vec<(String, Vec<String>)>,
}

impl CellAnnotations {
    pub fn new(cell_ids: Vec<String>) -> Self {
        let mut seen = HashSet::new();
        for id in &cell_ids {
            if !seen.insert(id) {
                log::warn!("Duplicate cell ID detected: '{}'. Cell IDs should be unique.", id);
            }
        }
        Self {
            cell_ids,
            columns: Vec::new(),
        }
    }

    /// Add (or replace) an annotation column
    pub fn add_column(&mut self, name: &str, values: Vec<String>) -> Result<()> {
        if values.len() != self.cell_ids.len() {
            return Err(Bulk2SingleError::DimensionMismatch {
                expected: format!("{} values", self.cell_ids.len()),
                got: format!("{} values", values.len()),
            });
        }
        match self.columns.iter_mut().find(|(n, _)| n == name) {
            Some((_, existing)) => *existing = values,
            None => self.columns.push((name.to_string(), values)),
        }
        Ok(())
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|(n, _)| n == name)
    }

    pub fn column(&self, name: &str) -> Option<&Vec<String>> {
        self.columns.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|(n, _)| n.as_str()).collect()
    }

    pub fn cell_ids(&self) -> &[String] {
        &self.cell_ids
    }

    pub fn n_cells(&self) -> usize {
        self.cell_ids.len()
    }
}

/// The two-column `Cell` / `Cell_type` table used throughout the pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellTypeTable {
    cells: Vec<String>,
    cell_types: Vec<String>,
}

impl CellTypeTable {
    pub fn new(cells: Vec<String>, cell_types: Vec<String>) -> Result<Self> {
        if cells.len() != cell_types.len() {
            return Err(Bulk2SingleError::DimensionMismatch {
                expected: format!("{} cell types", cells.len()),
                got: format!("{} cell types", cell_types.len()),
            });
        }
        Ok(Self { cells, cell_types })
    }

    /// Build from an annotation table, taking labels from `type_column`.
    ///
    /// Cell identifiers come from `cell_column` when given, otherwise from the
    /// table's own cell ids.
    pub fn from_annotations(
        annotations: &CellAnnotations,
        cell_column: Option<&str>,
        type_column: &str,
    ) -> Result<Self> {
        let cell_types = annotations
            .column(type_column)
            .ok_or_else(|| Bulk2SingleError::missing_key(type_column, "cell metadata columns"))?
            .clone();

        let cells = match cell_column {
            Some(name) => annotations
                .column(name)
                .ok_or_else(|| Bulk2SingleError::missing_key(name, "cell metadata columns"))?
                .clone(),
            None => annotations.cell_ids().to_vec(),
        };

        Self::new(cells, cell_types)
    }

    pub fn cells(&self) -> &[String] {
        &self.cells
    }

    pub fn cell_types(&self) -> &[String] {
        &self.cell_types
    }

    pub fn n_cells(&self) -> usize {
        self.cells.len()
    }

    /// Distinct cell-type labels, sorted
    pub fn levels(&self) -> Vec<String> {
        let mut unique = self.cell_types.clone();
        unique.sort();
        unique.dedup();
        unique
    }

    /// Reorder rows to follow `cells`, failing if any cell has no row
    pub fn align_to(&self, cells: &[String]) -> Result<Self> {
        let lookup: HashMap<&str, usize> = self
            .cells
            .iter()
            .enumerate()
            .map(|(i, c)| (c.as_str(), i))
            .collect();

        let missing: Vec<&str> = cells
            .iter()
            .filter(|c| !lookup.contains_key(c.as_str()))
            .map(|c| c.as_str())
            .collect();
        if !missing.is_empty() {
            let shown: Vec<&str> = missing.iter().take(5).copied().collect();
            let key = if missing.len() > shown.len() {
                format!("{} (and {} more)", shown.join(", "), missing.len() - shown.len())
            } else {
                shown.join(", ")
            };
            return Err(Bulk2SingleError::missing_key(key, "single-cell metadata"));
        }

        if self.cells.len() > cells.len() {
            log::info!(
                "Dropping {} metadata rows without a matching single-cell column",
                self.cells.len() - cells.len()
            );
        }

        let cell_types = cells
            .iter()
            .map(|c| self.cell_types[lookup[c.as_str()]].clone())
            .collect();

        Self::new(cells.to_vec(), cell_types)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_cell_annotations() {
        let mut obs = CellAnnotations::new(ids(&["c1", "c2", "c3"]));
        obs.add_column("leiden", ids(&["0", "1", "0"])).unwrap();
        obs.add_column("cell_type", ids(&["B", "T", "B"])).unwrap();

        assert!(obs.has_column("leiden"));
        assert_eq!(obs.column_names(), vec!["leiden", "cell_type"]);
        assert!(obs.add_column("bad", ids(&["x"])).is_err());
    }

    #[test]
    fn test_cell_type_table_from_annotations() {
        let mut obs = CellAnnotations::new(ids(&["0", "1"]));
        obs.add_column(CELL_COLUMN, ids(&["c1", "c2"])).unwrap();
        obs.add_column(CELL_TYPE_COLUMN, ids(&["T", "B"])).unwrap();

        let table = CellTypeTable::from_annotations(&obs, Some(CELL_COLUMN), CELL_TYPE_COLUMN).unwrap();
        assert_eq!(table.cells(), &ids(&["c1", "c2"])[..]);
        assert_eq!(table.levels(), ids(&["B", "T"]));

        let missing = CellTypeTable::from_annotations(&obs, None, "celltype");
        assert!(matches!(missing, Err(Bulk2SingleError::MissingKey { .. })));
    }

    #[test]
    fn test_align_to() {
        let table = CellTypeTable::new(ids(&["c1", "c2", "c3"]), ids(&["A", "B", "A"])).unwrap();

        let aligned = table.align_to(&ids(&["c3", "c1"])).unwrap();
        assert_eq!(aligned.cells(), &ids(&["c3", "c1"])[..]);
        assert_eq!(aligned.cell_types(), &ids(&["A", "A"])[..]);

        let err = table.align_to(&ids(&["c1", "c9"])).unwrap_err();
        match err {
            Bulk2SingleError::MissingKey { key, .. } => assert_eq!(key, "c9"),
            other => panic!("unexpected error: {}", other),
        }
    }
}
