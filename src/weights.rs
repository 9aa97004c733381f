use std::collections::BTreeMap;

/// Built-in relationship weights. Combined labels are the comma-joined
/// forms the CRIM export writes for multi-type relationships.
const BUILTIN_WEIGHTS: [(&str, i64); 11] = [
    ("Quotation", 1),
    ("Mechanical transformation", 2),
    ("Non-mechanical transformation", 3),
    ("New material", 4),
    ("Omission", 5),
    ("Quotation, Mechanical transformation", 6),
    ("Quotation, Non-mechanical transformation", 7),
    ("Non-mechanical transformation, Omission", 8),
    ("Mechanical transformation, Non-mechanical transformation", 9),
    ("Quotation, New material", 10),
    (
        "Quotation, Mechanical transformation, Non-mechanical transformation",
        11,
    ),
];

/// Relationship-type label → edge weight. Passed explicitly to whatever
/// needs weights; unknown labels weigh 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeightTable {
    weights: BTreeMap<String, i64>,
}

impl Default for WeightTable {
    fn default() -> Self {
        Self::builtin()
    }
}

impl WeightTable {
    pub fn builtin() -> Self {
        Self {
            weights: BUILTIN_WEIGHTS
                .iter()
                .map(|(label, w)| (label.to_string(), *w))
                .collect(),
        }
    }

    pub fn empty() -> Self {
        Self {
            weights: BTreeMap::new(),
        }
    }

    /// Add or replace entries. Overrides win over existing labels.
    pub fn with_overrides(mut self, overrides: &BTreeMap<String, i64>) -> Self {
        for (label, weight) in overrides {
            self.weights.insert(label.clone(), *weight);
        }
        self
    }

    pub fn weight(&self, label: &str) -> i64 {
        self.weights.get(label).copied().unwrap_or(0)
    }

    pub fn contains(&self, label: &str) -> bool {
        self.weights.contains_key(label)
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_builtin_label_maps_to_its_weight() {
        let table = WeightTable::builtin();
        assert_eq!(table.len(), 11);
        for (label, weight) in BUILTIN_WEIGHTS {
            assert_eq!(table.weight(label), weight, "{label}");
        }
    }

    #[test]
    fn test_unknown_label_weighs_zero() {
        let table = WeightTable::default();
        assert_eq!(table.weight("Imitative duo"), 0);
        assert_eq!(table.weight(""), 0);
        // Labels are exact; no case folding or reordering
        assert_eq!(table.weight("quotation"), 0);
        assert_eq!(table.weight("Mechanical transformation, Quotation"), 0);
    }

    #[test]
    fn test_overrides_replace_and_extend() {
        let mut extra = BTreeMap::new();
        extra.insert("Quotation".to_string(), 20);
        extra.insert("Parody".to_string(), 12);

        let table = WeightTable::builtin().with_overrides(&extra);
        assert_eq!(table.weight("Quotation"), 20);
        assert_eq!(table.weight("Parody"), 12);
        assert_eq!(table.weight("Omission"), 5);
        assert_eq!(table.len(), 12);
    }

    #[test]
    fn test_empty_table() {
        let table = WeightTable::empty();
        assert!(table.is_empty());
        assert!(!table.contains("Quotation"));
        assert_eq!(table.weight("Quotation"), 0);
    }
}
