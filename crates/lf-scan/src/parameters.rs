//! Parameter combination tables.

use lf_core::{Key, Table};
use serde::{Deserialize, Serialize};

use crate::error::{ScanError, ScanResult};

/// One row per parameter combination, one column per parameter.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ParameterTable {
    names: Vec<String>,
    rows: Vec<Vec<f64>>,
}

impl ParameterTable {
    /// Empty table over the given parameter names.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Table from equally long columns; row `i` takes entry `i` of each.
    pub fn from_columns<I, S>(columns: I) -> ScanResult<Self>
    where
        I: IntoIterator<Item = (S, Vec<f64>)>,
        S: Into<String>,
    {
        let (names, columns): (Vec<String>, Vec<Vec<f64>>) =
            columns.into_iter().map(|(k, v)| (k.into(), v)).unzip();
        let n_rows = columns.first().map_or(0, Vec::len);
        if let Some((name, col)) = names.iter().zip(&columns).find(|(_, c)| c.len() != n_rows) {
            return Err(ScanError::InvalidArg {
                what: format!("column {name} has {} values, expected {n_rows}", col.len()),
            });
        }
        let rows = (0..n_rows)
            .map(|i| columns.iter().map(|c| c[i]).collect())
            .collect();
        Ok(Self { names, rows })
    }

    /// Every combination of the given values.
    ///
    /// The last parameter varies fastest and the first slowest, so
    /// `[("k1", [1, 2]), ("k2", [3, 4])]` yields `(1, 3), (1, 4), (2, 3),
    /// (2, 4)`. The row count is the product of all value counts; no
    /// parameters at all yield no rows.
    pub fn cartesian_product<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = (S, Vec<f64>)>,
        S: Into<String>,
    {
        let (names, columns): (Vec<String>, Vec<Vec<f64>>) =
            columns.into_iter().map(|(k, v)| (k.into(), v)).unzip();
        if columns.is_empty() {
            return Self::new(names);
        }
        let total: usize = columns.iter().map(Vec::len).product();
        let rows = (0..total)
            .map(|r| {
                let mut rest = r;
                let mut row = vec![0.0; columns.len()];
                for (c, values) in columns.iter().enumerate().rev() {
                    row[c] = values[rest % values.len()];
                    rest /= values.len();
                }
                row
            })
            .collect();
        Self { names, rows }
    }

    pub fn push_row(&mut self, values: Vec<f64>) -> ScanResult<&mut Self> {
        if values.len() != self.names.len() {
            return Err(ScanError::InvalidArg {
                what: format!(
                    "row has {} values for {} parameters",
                    values.len(),
                    self.names.len()
                ),
            });
        }
        self.rows.push(values);
        Ok(self)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn n_cols(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row(&self, i: usize) -> Option<&[f64]> {
        self.rows.get(i).map(Vec::as_slice)
    }

    pub fn rows(&self) -> impl Iterator<Item = &[f64]> {
        self.rows.iter().map(Vec::as_slice)
    }

    pub fn column(&self, name: &str) -> Option<Vec<f64>> {
        let j = self.names.iter().position(|n| n == name)?;
        Some(self.rows.iter().map(|r| r[j]).collect())
    }

    /// As a table indexed by row number.
    pub fn to_table(&self) -> Table {
        let mut table = Table::new(vec!["n".to_string()], self.names.clone());
        for (i, row) in self.rows.iter().enumerate() {
            // widths always match
            let _ = table.push_row(vec![Key::from(i)], row.clone());
        }
        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cartesian_product_varies_last_parameter_fastest() {
        let t = ParameterTable::cartesian_product([("k1", vec![1.0, 2.0]), ("k2", vec![3.0, 4.0])]);
        let rows: Vec<&[f64]> = t.rows().collect();
        assert_eq!(
            rows,
            vec![&[1.0, 3.0][..], &[1.0, 4.0][..], &[2.0, 3.0][..], &[2.0, 4.0][..]]
        );
        assert_eq!(t.names(), &["k1", "k2"]);
    }

    #[test]
    fn empty_inputs() {
        assert!(ParameterTable::cartesian_product(Vec::<(&str, Vec<f64>)>::new()).is_empty());
        let t = ParameterTable::cartesian_product([("a", vec![1.0]), ("b", vec![])]);
        assert_eq!(t.n_rows(), 0);
        assert_eq!(t.n_cols(), 2);
    }

    #[test]
    fn columns_must_have_equal_length() {
        let t = ParameterTable::from_columns([("a", vec![1.0, 2.0]), ("b", vec![3.0, 4.0])]).unwrap();
        assert_eq!(t.row(1), Some(&[2.0, 4.0][..]));
        assert_eq!(t.column("b"), Some(vec![3.0, 4.0]));
        assert!(ParameterTable::from_columns([("a", vec![1.0]), ("b", vec![])]).is_err());
    }

    #[test]
    fn push_row_checks_width() {
        let mut t = ParameterTable::new(["k"]);
        t.push_row(vec![1.0]).unwrap();
        assert!(t.push_row(vec![1.0, 2.0]).is_err());
        assert_eq!(t.to_table().get(0, "k"), Some(1.0));
    }
}
