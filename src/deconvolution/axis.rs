//! Canonical cell-type ordering

use std::collections::HashMap;

use crate::error::{Bulk2SingleError, Result};

/// Sorted distinct cell-type labels; a label's id is its position.
///
/// Reference matrix columns, marker groups, proportions and target counts all
/// follow this ordering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellTypeAxis {
    labels: Vec<String>,
    ids: HashMap<String, usize>,
}

impl CellTypeAxis {
    pub fn from_labels(labels: &[String]) -> Self {
        let mut sorted = labels.to_vec();
        sorted.sort();
        sorted.dedup();
        let ids = sorted
            .iter()
            .enumerate()
            .map(|(i, label)| (label.clone(), i))
            .collect();
        Self { labels: sorted, ids }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn id(&self, label: &str) -> Option<usize> {
        self.ids.get(label).copied()
    }

    pub fn label(&self, id: usize) -> Option<&str> {
        self.labels.get(id).map(|s| s.as_str())
    }

    /// Map each label to its id
    pub fn encode(&self, labels: &[String]) -> Result<Vec<usize>> {
        labels
            .iter()
            .map(|l| {
                self.id(l)
                    .ok_or_else(|| Bulk2SingleError::missing_key(l.as_str(), "cell-type axis"))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_axis_is_lexicographic() {
        let axis = CellTypeAxis::from_labels(&ids(&["T", "B", "NK", "B", "Mono"]));
        assert_eq!(axis.labels(), &ids(&["B", "Mono", "NK", "T"])[..]);
        assert_eq!(axis.id("NK"), Some(2));
        assert_eq!(axis.label(3), Some("T"));
    }

    #[test]
    fn test_axis_independent_of_input_order() {
        let a = CellTypeAxis::from_labels(&ids(&["x", "a", "m"]));
        let b = CellTypeAxis::from_labels(&ids(&["m", "x", "a", "a"]));
        assert_eq!(a, b);
    }

    #[test]
    fn test_encode() {
        let axis = CellTypeAxis::from_labels(&ids(&["b", "a"]));
        assert_eq!(axis.encode(&ids(&["a", "b", "a"])).unwrap(), vec![0, 1, 0]);
        assert!(axis.encode(&ids(&["c"])).is_err());
    }
}
