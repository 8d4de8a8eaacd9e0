//! Labelled, row-indexed result tables.
//!
//! A [`Table`] is the tabular currency of the workspace: concentrations,
//! fluxes, parameter scans and aggregates are all tables. Each row carries an
//! index key with one entry per index level (e.g. `time`, or `(n, time)` for
//! time courses grouped by run), and one `f64` per named column.

use core::fmt;

use serde::Serialize;

use crate::error::{CoreError, CoreResult};

/// One level of a row key.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Key {
    Num(f64),
    Label(String),
}

impl Key {
    /// Numeric value of the key, if it is numeric.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Key::Num(v) => Some(*v),
            Key::Label(_) => None,
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Num(v) => write!(f, "{v}"),
            Key::Label(s) => write!(f, "{s}"),
        }
    }
}

impl From<f64> for Key {
    fn from(v: f64) -> Self {
        Key::Num(v)
    }
}

impl From<usize> for Key {
    fn from(v: usize) -> Self {
        Key::Num(v as f64)
    }
}

impl From<&str> for Key {
    fn from(v: &str) -> Self {
        Key::Label(v.to_string())
    }
}

impl From<String> for Key {
    fn from(v: String) -> Self {
        Key::Label(v)
    }
}

/// Row-major table with a (possibly multi-level) row index.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Table {
    index_names: Vec<String>,
    index: Vec<Vec<Key>>,
    columns: Vec<String>,
    data: Vec<Vec<f64>>,
}

impl Table {
    /// Create an empty table with the given index level names and columns.
    pub fn new(index_names: Vec<String>, columns: Vec<String>) -> Self {
        Self {
            index_names,
            index: Vec::new(),
            columns,
            data: Vec::new(),
        }
    }

    /// Create a table whose every cell is `NaN`.
    pub fn nan_filled(
        index_names: Vec<String>,
        index: Vec<Vec<Key>>,
        columns: Vec<String>,
    ) -> CoreResult<Self> {
        let mut table = Self::new(index_names, columns);
        let width = table.columns.len();
        for key in index {
            table.push_row(key, vec![f64::NAN; width])?;
        }
        Ok(table)
    }

    /// Append a row.
    pub fn push_row(&mut self, key: Vec<Key>, values: Vec<f64>) -> CoreResult<()> {
        if key.len() != self.index_names.len() {
            return Err(CoreError::IndexLength {
                expected: self.index_names.len(),
                got: key.len(),
            });
        }
        if values.len() != self.columns.len() {
            return Err(CoreError::RowLength {
                expected: self.columns.len(),
                got: values.len(),
            });
        }
        self.index.push(key);
        self.data.push(values);
        Ok(())
    }

    /// Remove and return the last row.
    pub fn pop_row(&mut self) -> Option<(Vec<Key>, Vec<f64>)> {
        let key = self.index.pop()?;
        let values = self.data.pop()?;
        Some((key, values))
    }

    pub fn n_rows(&self) -> usize {
        self.data.len()
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn index_names(&self) -> &[String] {
        &self.index_names
    }

    pub fn index(&self) -> &[Vec<Key>] {
        &self.index
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Values of row `i`.
    pub fn row(&self, i: usize) -> Option<&[f64]> {
        self.data.get(i).map(Vec::as_slice)
    }

    /// Values of the last row.
    pub fn last_row(&self) -> Option<&[f64]> {
        self.data.last().map(Vec::as_slice)
    }

    /// Iterate over `(key, values)` pairs in row order.
    pub fn rows(&self) -> impl Iterator<Item = (&[Key], &[f64])> {
        self.index
            .iter()
            .zip(&self.data)
            .map(|(k, v)| (k.as_slice(), v.as_slice()))
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Copy of one column.
    pub fn column(&self, name: &str) -> Option<Vec<f64>> {
        let j = self.column_index(name)?;
        Some(self.data.iter().map(|row| row[j]).collect())
    }

    /// Single cell by row position and column name.
    pub fn get(&self, row: usize, name: &str) -> Option<f64> {
        let j = self.column_index(name)?;
        self.data.get(row).map(|r| r[j])
    }

    /// Whether every cell in row `i` is `NaN`.
    pub fn row_is_nan(&self, i: usize) -> bool {
        self.data
            .get(i)
            .is_some_and(|r| !r.is_empty() && r.iter().all(|v| v.is_nan()))
    }

    /// Numeric values of one index level, in row order.
    pub fn index_level(&self, level: usize) -> Vec<Option<f64>> {
        self.index
            .iter()
            .map(|k| k.get(level).and_then(Key::as_f64))
            .collect()
    }

    /// Concatenate columns of `other` to the right. Rows are aligned by
    /// position; the index of `self` is kept.
    pub fn hcat(&self, other: &Table) -> CoreResult<Table> {
        if self.n_rows() != other.n_rows() {
            return Err(CoreError::RowLength {
                expected: self.n_rows(),
                got: other.n_rows(),
            });
        }
        let mut columns = self.columns.clone();
        columns.extend(other.columns.iter().cloned());
        let data = self
            .data
            .iter()
            .zip(&other.data)
            .map(|(a, b)| a.iter().chain(b).copied().collect())
            .collect();
        Ok(Table {
            index_names: self.index_names.clone(),
            index: self.index.clone(),
            columns,
            data,
        })
    }

    /// Append all rows of `other`, which must have the same layout.
    pub fn extend(&mut self, other: &Table) -> CoreResult<()> {
        if other.columns != self.columns {
            return Err(CoreError::InvalidArg {
                what: "tables have different columns".to_string(),
            });
        }
        for (key, values) in other.rows() {
            self.push_row(key.to_vec(), values.to_vec())?;
        }
        Ok(())
    }

    /// Table restricted to the named columns, in the given order.
    pub fn select(&self, names: &[&str]) -> CoreResult<Table> {
        let idx = names
            .iter()
            .map(|n| {
                self.column_index(n).ok_or_else(|| CoreError::UnknownColumn {
                    name: (*n).to_string(),
                })
            })
            .collect::<CoreResult<Vec<_>>>()?;
        Ok(Table {
            index_names: self.index_names.clone(),
            index: self.index.clone(),
            columns: names.iter().map(|n| (*n).to_string()).collect(),
            data: self
                .data
                .iter()
                .map(|row| idx.iter().map(|&j| row[j]).collect())
                .collect(),
        })
    }

    /// Prefix every index key with `prefix` (adds a leading index level).
    pub fn with_outer_level(&self, name: &str, prefix: Key) -> Table {
        let mut index_names = vec![name.to_string()];
        index_names.extend(self.index_names.iter().cloned());
        Table {
            index_names,
            index: self
                .index
                .iter()
                .map(|k| {
                    let mut key = vec![prefix.clone()];
                    key.extend(k.iter().cloned());
                    key
                })
                .collect(),
            columns: self.columns.clone(),
            data: self.data.clone(),
        }
    }

    /// Render as CSV with a header line (index levels first).
    pub fn to_csv(&self) -> String {
        let mut out = String::new();
        let header: Vec<&str> = self
            .index_names
            .iter()
            .chain(&self.columns)
            .map(String::as_str)
            .collect();
        out.push_str(&header.join(","));
        out.push('\n');
        for (key, values) in self.rows() {
            let cells: Vec<String> = key
                .iter()
                .map(Key::to_string)
                .chain(values.iter().map(f64::to_string))
                .collect();
            out.push_str(&cells.join(","));
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn time_table() -> Table {
        let mut t = Table::new(vec!["time".into()], vec!["x".into(), "y".into()]);
        t.push_row(vec![0.0.into()], vec![1.0, 2.0]).unwrap();
        t.push_row(vec![1.0.into()], vec![3.0, 4.0]).unwrap();
        t
    }

    #[test]
    fn push_rejects_wrong_width() {
        let mut t = time_table();
        assert!(matches!(
            t.push_row(vec![2.0.into()], vec![1.0]),
            Err(CoreError::RowLength { expected: 2, got: 1 })
        ));
        assert!(matches!(
            t.push_row(vec![], vec![1.0, 2.0]),
            Err(CoreError::IndexLength { .. })
        ));
    }

    #[test]
    fn column_and_cell_access() {
        let t = time_table();
        assert_eq!(t.column("y"), Some(vec![2.0, 4.0]));
        assert_eq!(t.get(1, "x"), Some(3.0));
        assert_eq!(t.get(1, "z"), None);
        assert_eq!(t.last_row(), Some(&[3.0, 4.0][..]));
    }

    #[test]
    fn hcat_keeps_left_index() {
        let t = time_table();
        let mut v = Table::new(vec!["time".into()], vec!["v1".into()]);
        v.push_row(vec![0.0.into()], vec![0.5]).unwrap();
        v.push_row(vec![1.0.into()], vec![0.25]).unwrap();
        let both = t.hcat(&v).unwrap();
        assert_eq!(both.columns(), &["x", "y", "v1"]);
        assert_eq!(both.row(1), Some(&[3.0, 4.0, 0.25][..]));
    }

    #[test]
    fn nan_rows_are_detected() {
        let t = Table::nan_filled(
            vec!["n".into()],
            vec![vec![0usize.into()], vec![1usize.into()]],
            vec!["x".into()],
        )
        .unwrap();
        assert!(t.row_is_nan(0));
        assert!(t.row_is_nan(1));
        assert!(!time_table().row_is_nan(0));
    }

    #[test]
    fn csv_has_header_and_rows() {
        let csv = time_table().to_csv();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "time,x,y");
        assert_eq!(lines[2], "1,3,4");
    }

    #[test]
    fn outer_level_prefixes_keys() {
        let t = time_table().with_outer_level("n", 3usize.into());
        assert_eq!(t.index_names(), &["n", "time"]);
        assert_eq!(t.index()[1], vec![Key::Num(3.0), Key::Num(1.0)]);
    }
}
