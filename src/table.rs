// 📋 Table - in-memory record set with a typed column view
// Every field is kept as text; an empty or missing field is None

use crate::error::RecordError;
use std::collections::{HashMap, HashSet};

/// One field of a record
pub type Cell = Option<String>;

// ============================================================================
// COLUMN REFERENCE
// ============================================================================

/// Validated handle to a column of a specific table.
///
/// Obtained only through `Table::column`, so holding one means the name was
/// present in the header when it was resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnRef {
    index: usize,
    name: String,
}

impl ColumnRef {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

// ============================================================================
// TABLE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl Table {
    /// Create an empty table; header names are made unique
    pub fn new(columns: Vec<String>) -> Self {
        Table {
            columns: unique_header(columns),
            rows: Vec::new(),
        }
    }

    /// Create a table from rows, padding or cutting each row to the header width
    pub fn from_rows(columns: Vec<String>, rows: Vec<Vec<Cell>>) -> Self {
        let mut table = Table::new(columns);
        for row in rows {
            table.push_row(row);
        }
        table
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn push_row(&mut self, mut row: Vec<Cell>) {
        row.resize(self.columns.len(), None);
        for cell in row.iter_mut() {
            if cell.as_deref() == Some("") {
                *cell = None;
            }
        }
        self.rows.push(row);
    }

    /// Resolve a column by exact header name
    pub fn column(&self, name: &str) -> Result<ColumnRef, RecordError> {
        self.columns
            .iter()
            .position(|c| c == name)
            .map(|index| ColumnRef {
                index,
                name: self.columns[index].clone(),
            })
            .ok_or_else(|| RecordError::MissingColumn {
                column: name.to_string(),
            })
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    pub fn get(&self, row: usize, column: &ColumnRef) -> Option<&str> {
        self.rows
            .get(row)
            .and_then(|r| r.get(column.index))
            .and_then(|c| c.as_deref())
    }

    pub fn value_or_empty(&self, row: usize, column: &ColumnRef) -> &str {
        self.get(row, column).unwrap_or("")
    }

    pub fn set(&mut self, row: usize, column: &ColumnRef, value: Cell) {
        if let Some(cell) = self.rows.get_mut(row).and_then(|r| r.get_mut(column.index)) {
            *cell = value.filter(|v| !v.is_empty());
        }
    }

    /// Add a column filled with empty cells; an existing column of that name is reused
    pub fn add_column(&mut self, name: &str) -> ColumnRef {
        if let Ok(existing) = self.column(name) {
            return existing;
        }
        self.columns.push(name.to_string());
        for row in self.rows.iter_mut() {
            row.push(None);
        }
        ColumnRef {
            index: self.columns.len() - 1,
            name: name.to_string(),
        }
    }

    /// Values of one column in row order
    pub fn column_values<'a>(&'a self, column: &ColumnRef) -> impl Iterator<Item = Option<&'a str>> + 'a {
        let index = column.index;
        self.rows
            .iter()
            .map(move |r| r.get(index).and_then(|c| c.as_deref()))
    }

    /// Distinct non-blank values in first-seen order
    pub fn unique_values(&self, column: &ColumnRef) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut values = Vec::new();
        for value in self.column_values(column).flatten() {
            if seen.insert(value) {
                values.push(value.to_string());
            }
        }
        values
    }

    pub fn first_non_blank(&self, column: &ColumnRef) -> Option<&str> {
        self.column_values(column)
            .flatten()
            .find(|v| !v.trim().is_empty())
    }

    /// New table with the given rows, in the given order
    pub fn subset(&self, indices: &[usize]) -> Table {
        Table {
            columns: self.columns.clone(),
            rows: indices
                .iter()
                .filter_map(|&i| self.rows.get(i).cloned())
                .collect(),
        }
    }

    /// Split rows into (accepted, rejected), keeping the original order in both
    pub fn partition_by<F>(&self, mut predicate: F) -> (Table, Table)
    where
        F: FnMut(usize) -> bool,
    {
        let (yes, no): (Vec<usize>, Vec<usize>) = (0..self.rows.len()).partition(|&i| predicate(i));
        (self.subset(&yes), self.subset(&no))
    }

    pub fn filter_rows<F>(&self, predicate: F) -> Table
    where
        F: FnMut(usize) -> bool,
    {
        self.partition_by(predicate).0
    }

    pub fn keep_columns(&self, columns: &[ColumnRef]) -> Table {
        Table {
            columns: columns.iter().map(|c| c.name.clone()).collect(),
            rows: self
                .rows
                .iter()
                .map(|r| columns.iter().map(|c| r[c.index].clone()).collect())
                .collect(),
        }
    }

    pub fn drop_columns(&self, columns: &[ColumnRef]) -> Table {
        let dropped: HashSet<usize> = columns.iter().map(|c| c.index).collect();
        let kept: Vec<ColumnRef> = (0..self.columns.len())
            .filter(|i| !dropped.contains(i))
            .map(|index| ColumnRef {
                index,
                name: self.columns[index].clone(),
            })
            .collect();
        self.keep_columns(&kept)
    }

    /// Keep the first row for each key
    pub fn dedup_by_key<F>(&self, mut key: F) -> Table
    where
        F: FnMut(usize) -> String,
    {
        let mut seen = HashSet::new();
        let keep: Vec<usize> = (0..self.rows.len()).filter(|&i| seen.insert(key(i))).collect();
        self.subset(&keep)
    }

    /// Rewrite one column in place; returns how many cells changed
    pub fn map_column<F>(&mut self, column: &ColumnRef, mut f: F) -> usize
    where
        F: FnMut(Option<&str>) -> Cell,
    {
        let mut changed = 0;
        for row in self.rows.iter_mut() {
            let cell = &mut row[column.index];
            let next = f(cell.as_deref()).filter(|v| !v.is_empty());
            if next != *cell {
                changed += 1;
                *cell = next;
            }
        }
        changed
    }

    /// Same rows laid out under `columns`; columns this table lacks come out empty
    pub fn reindexed(&self, columns: &[String]) -> Table {
        let positions: HashMap<&str, usize> = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, c)| (c.as_str(), i))
            .collect();
        let mapping: Vec<Option<usize>> = columns.iter().map(|c| positions.get(c.as_str()).copied()).collect();
        Table {
            columns: unique_header(columns.to_vec()),
            rows: self
                .rows
                .iter()
                .map(|r| mapping.iter().map(|m| m.and_then(|i| r[i].clone())).collect())
                .collect(),
        }
    }

    /// Append another table's rows aligned to this table's header
    pub fn append_reindexed(&mut self, other: &Table) {
        let aligned = other.reindexed(&self.columns);
        self.rows.extend(aligned.rows);
    }
}

/// Blank names become `Unnamed: <i>`, repeats get `.1`, `.2`, ...
fn unique_header(columns: Vec<String>) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut out = Vec::with_capacity(columns.len());
    for (i, name) in columns.into_iter().enumerate() {
        let base = if name.trim().is_empty() {
            format!("Unnamed: {}", i)
        } else {
            name
        };
        let mut candidate = base.clone();
        while seen.contains_key(&candidate) {
            let n = seen.entry(base.clone()).or_insert(0);
            *n += 1;
            candidate = format!("{}.{}", base, n);
        }
        seen.insert(candidate.clone(), 0);
        out.push(candidate);
    }
    out
}

/// Header names present in every table, in the first table's order
pub fn common_columns<'a, I>(headers: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a [String]>,
{
    let mut iter = headers.into_iter();
    let Some(first) = iter.next() else {
        return Vec::new();
    };
    let mut common: Vec<String> = first.to_vec();
    for header in iter {
        let present: HashSet<&String> = header.iter().collect();
        common.retain(|c| present.contains(c));
    }
    common
}
