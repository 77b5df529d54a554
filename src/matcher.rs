// 🔗 Cross-File Matcher - classify primary rows against a reference index
// Three strategies per row: matched, mismatched, not found

use crate::normalize::KeyNormalization;
use crate::table::{ColumnRef, Table};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

// ============================================================================
// REFERENCE INDEX
// ============================================================================

/// Key → every value observed for that key in the reference table
#[derive(Debug, Clone, Default)]
pub struct ReferenceIndex {
    entries: HashMap<String, HashSet<String>>,
    key_norm: Option<KeyNormalization>,
    value_norm: Option<KeyNormalization>,
}

impl ReferenceIndex {
    /// Index `value` by `key`; blank keys and blank values are skipped.
    ///
    /// A key repeated across rows accumulates all of its values.
    pub fn build(
        table: &Table,
        key: &ColumnRef,
        value: &ColumnRef,
        key_norm: KeyNormalization,
        value_norm: KeyNormalization,
    ) -> Self {
        let mut entries: HashMap<String, HashSet<String>> = HashMap::new();
        for row in 0..table.len() {
            let k = key_norm.apply(table.get(row, key));
            if k.is_empty() {
                continue;
            }
            let v = value_norm.apply(table.get(row, value));
            let values = entries.entry(k).or_default();
            if !v.is_empty() {
                values.insert(v);
            }
        }
        ReferenceIndex {
            entries,
            key_norm: Some(key_norm),
            value_norm: Some(value_norm),
        }
    }

    /// Index of keys alone, for presence checks
    pub fn keys_only(table: &Table, key: &ColumnRef, key_norm: KeyNormalization) -> Self {
        let mut entries: HashMap<String, HashSet<String>> = HashMap::new();
        for row in 0..table.len() {
            let k = key_norm.apply(table.get(row, key));
            if !k.is_empty() {
                entries.entry(k).or_default();
            }
        }
        ReferenceIndex {
            entries,
            key_norm: Some(key_norm),
            value_norm: None,
        }
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn values(&self, key: &str) -> Option<&HashSet<String>> {
        self.entries.get(key)
    }

    /// True when `value` was observed for `key`
    pub fn contains_pair(&self, key: &str, value: &str) -> bool {
        self.entries.get(key).map_or(false, |values| values.contains(value))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn key_normalization(&self) -> KeyNormalization {
        self.key_norm.unwrap_or(KeyNormalization::Trimmed)
    }

    pub fn value_normalization(&self) -> KeyNormalization {
        self.value_norm.unwrap_or(KeyNormalization::Trimmed)
    }
}

// ============================================================================
// MATCH PARTITION
// ============================================================================

/// Row indices of the primary table, split three ways in original order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchPartition {
    /// Key found and at least one auxiliary value is among the reference values
    pub matched: Vec<usize>,

    /// Key found but no auxiliary value is among the reference values
    pub mismatched: Vec<usize>,

    /// Key absent from the reference
    pub not_found: Vec<usize>,
}

impl MatchPartition {
    pub fn total(&self) -> usize {
        self.matched.len() + self.mismatched.len() + self.not_found.len()
    }

    /// Every row 0..len appears in exactly one list
    pub fn is_complete(&self, len: usize) -> bool {
        let mut seen = vec![false; len];
        for &i in self.matched.iter().chain(&self.mismatched).chain(&self.not_found) {
            match seen.get_mut(i) {
                Some(slot) if !*slot => *slot = true,
                _ => return false,
            }
        }
        seen.into_iter().all(|s| s)
    }

    pub fn summary(&self) -> String {
        format!(
            "Matched: {} | Mismatched: {} | Not found: {}",
            self.matched.len(),
            self.mismatched.len(),
            self.not_found.len()
        )
    }
}

// ============================================================================
// MATCHER
// ============================================================================

pub struct CrossFileMatcher<'a> {
    reference: &'a ReferenceIndex,
}

impl<'a> CrossFileMatcher<'a> {
    pub fn new(reference: &'a ReferenceIndex) -> Self {
        CrossFileMatcher { reference }
    }

    /// Classify every primary row.
    ///
    /// # Arguments
    /// * `primary` - table to classify
    /// * `key` - key column in `primary`
    /// * `aux` - columns whose values are checked against the reference values
    ///
    /// # Returns
    /// * `MatchPartition` - disjoint, complete, order-preserving
    pub fn partition(&self, primary: &Table, key: &ColumnRef, aux: &[ColumnRef]) -> MatchPartition {
        let key_norm = self.reference.key_normalization();
        let value_norm = self.reference.value_normalization();
        let mut result = MatchPartition::default();

        for row in 0..primary.len() {
            let k = key_norm.apply(primary.get(row, key));
            let Some(values) = self.reference.values(&k).filter(|_| !k.is_empty()) else {
                result.not_found.push(row);
                continue;
            };

            let hit = aux.is_empty()
                || aux.iter().any(|column| {
                    let v = value_norm.apply(primary.get(row, column));
                    !v.is_empty() && values.contains(&v)
                });
            if hit {
                result.matched.push(row);
            } else {
                result.mismatched.push(row);
            }
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Cell;
    use proptest::prelude::*;

    fn s(v: &str) -> Cell {
        Some(v.to_string())
    }

    fn create_reference() -> Table {
        Table::from_rows(
            vec!["CPF".into(), "Telefone".into()],
            vec![
                vec![s("00011122233"), s("11999998888")],
                vec![s("00011122233"), s("11777776666")],
            ],
        )
    }

    fn create_primary() -> Table {
        Table::from_rows(
            vec!["CPF".into(), "Tel1".into()],
            vec![
                vec![s("00011122233"), s("11999998888")],
                vec![s("00011122233"), s("11000000000")],
                vec![s("99999999999"), s("11999998888")],
            ],
        )
    }

    fn build_index(reference: &Table) -> ReferenceIndex {
        ReferenceIndex::build(
            reference,
            &reference.column("CPF").unwrap(),
            &reference.column("Telefone").unwrap(),
            KeyNormalization::Trimmed,
            KeyNormalization::Trimmed,
        )
    }

    #[test]
    fn test_reference_accumulates_values() {
        let index = build_index(&create_reference());
        assert_eq!(index.len(), 1);
        assert_eq!(index.values("00011122233").unwrap().len(), 2);
        assert!(index.contains_pair("00011122233", "11777776666"));
    }

    #[test]
    fn test_three_way_partition() {
        let index = build_index(&create_reference());
        let primary = create_primary();
        let key = primary.column("CPF").unwrap();
        let aux = vec![primary.column("Tel1").unwrap()];

        let result = CrossFileMatcher::new(&index).partition(&primary, &key, &aux);
        assert_eq!(result.matched, vec![0]);
        assert_eq!(result.mismatched, vec![1]);
        assert_eq!(result.not_found, vec![2]);
        assert_eq!(result.summary(), "Matched: 1 | Mismatched: 1 | Not found: 1");
    }

    #[test]
    fn test_empty_reference_means_not_found() {
        let empty = Table::new(vec!["CPF".into(), "Telefone".into()]);
        let index = build_index(&empty);
        let primary = create_primary();
        let key = primary.column("CPF").unwrap();
        let result = CrossFileMatcher::new(&index).partition(&primary, &key, &[primary.column("Tel1").unwrap()]);
        assert_eq!(result.not_found, vec![0, 1, 2]);
        assert!(result.matched.is_empty() && result.mismatched.is_empty());
    }

    #[test]
    fn test_empty_primary_gives_empty_partitions() {
        let index = build_index(&create_reference());
        let primary = Table::new(vec!["CPF".into(), "Tel1".into()]);
        let key = primary.column("CPF").unwrap();
        let result = CrossFileMatcher::new(&index).partition(&primary, &key, &[]);
        assert_eq!(result, MatchPartition::default());
    }

    #[test]
    fn test_no_aux_columns_never_mismatches() {
        let index = build_index(&create_reference());
        let primary = create_primary();
        let key = primary.column("CPF").unwrap();
        let result = CrossFileMatcher::new(&index).partition(&primary, &key, &[]);
        assert_eq!(result.matched, vec![0, 1]);
        assert!(result.mismatched.is_empty());
        assert_eq!(result.not_found, vec![2]);
    }

    #[test]
    fn test_blank_keys_and_values_are_not_indexed() {
        let reference = Table::from_rows(
            vec!["CPF".into(), "Telefone".into()],
            vec![vec![None, s("1")], vec![s("5"), None]],
        );
        let index = build_index(&reference);
        assert!(!index.contains_key(""));
        assert!(index.values("5").unwrap().is_empty());

        let primary = Table::from_rows(vec!["CPF".into(), "Tel1".into()], vec![vec![None, s("1")], vec![s("5"), None]]);
        let key = primary.column("CPF").unwrap();
        let result = CrossFileMatcher::new(&index).partition(&primary, &key, &[primary.column("Tel1").unwrap()]);
        assert_eq!(result.not_found, vec![0]);
        assert_eq!(result.mismatched, vec![1]);
    }

    #[test]
    fn test_identifier_normalization_matches_formatted_keys() {
        let reference = Table::from_rows(vec!["CPF".into()], vec![vec![s("111.222.333-44")]]);
        let index = ReferenceIndex::keys_only(&reference, &reference.column("CPF").unwrap(), KeyNormalization::Identifier);
        let primary = Table::from_rows(vec!["doc".into()], vec![vec![s("11122233344")], vec![s("1")]]);
        let key = primary.column("doc").unwrap();
        let result = CrossFileMatcher::new(&index).partition(&primary, &key, &[]);
        assert_eq!(result.matched, vec![0]);
        assert_eq!(result.not_found, vec![1]);
    }

    proptest! {
        #[test]
        fn prop_partition_is_complete_and_ordered(
            keys in proptest::collection::vec("[0-3]{0,1}", 0..30),
            phones in proptest::collection::vec("[0-2]{0,1}", 0..30),
        ) {
            let reference = create_reference();
            let index = ReferenceIndex::build(
                &reference,
                &reference.column("CPF").unwrap(),
                &reference.column("Telefone").unwrap(),
                KeyNormalization::Identifier,
                KeyNormalization::Digits,
            );
            let rows: Vec<Vec<Cell>> = keys
                .iter()
                .zip(phones.iter().cycle())
                .map(|(k, p)| vec![Some(format!("0001112223{}", k)), Some(p.clone())])
                .collect();
            let primary = Table::from_rows(vec!["CPF".into(), "Tel1".into()], rows);
            let key = primary.column("CPF").unwrap();
            let aux = vec![primary.column("Tel1").unwrap()];
            let result = CrossFileMatcher::new(&index).partition(&primary, &key, &aux);

            prop_assert!(result.is_complete(primary.len()));
            prop_assert_eq!(result.total(), primary.len());
            for list in [&result.matched, &result.mismatched, &result.not_found] {
                prop_assert!(list.windows(2).all(|w| w[0] < w[1]));
            }
        }
    }
}
