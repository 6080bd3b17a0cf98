//! Named-column tabular data shared by the cleaning stages.
//!
//! Columns are located by header name, never by position, so a stage can
//! drop or rewrite columns without the others noticing.

use crate::domain::error::{PipelineError, Stage};
use std::cmp::Ordering;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Number(f64),
    Text(String),
    Missing,
}

impl Cell {
    /// Parse a raw CSV field: empty is missing, anything `f64` accepts is a number.
    pub fn parse(raw: &str) -> Cell {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Cell::Missing;
        }
        match trimmed.parse::<f64>() {
            Ok(v) => Cell::Number(v),
            Err(_) => Cell::Text(trimmed.to_string()),
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Number(v) => Some(*v),
            _ => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Cell::Missing)
    }

    /// Total order used for sorting: numbers, then text, then missing.
    pub fn sort_cmp(&self, other: &Cell) -> Ordering {
        match (self, other) {
            (Cell::Number(a), Cell::Number(b)) => a.total_cmp(b),
            (Cell::Text(a), Cell::Text(b)) => a.cmp(b),
            (Cell::Missing, Cell::Missing) => Ordering::Equal,
            (Cell::Number(_), _) => Ordering::Less,
            (_, Cell::Number(_)) => Ordering::Greater,
            (Cell::Text(_), Cell::Missing) => Ordering::Less,
            (Cell::Missing, Cell::Text(_)) => Ordering::Greater,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Number(v) => write!(f, "{}", v),
            Cell::Text(s) => f.write_str(s),
            Cell::Missing => Ok(()),
        }
    }
}

impl From<f64> for Cell {
    fn from(v: f64) -> Self {
        Cell::Number(v)
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Cell::Text(s.to_string())
    }
}

impl From<String> for Cell {
    fn from(s: String) -> Self {
        Cell::Text(s)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Frame {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl Frame {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Build a frame from rows that must all match the column count.
    pub fn from_rows(columns: Vec<String>, rows: Vec<Vec<Cell>>) -> Result<Self, String> {
        if let Some((i, row)) = rows
            .iter()
            .enumerate()
            .find(|(_, r)| r.len() != columns.len())
        {
            return Err(format!(
                "row {} has {} cells, expected {}",
                i,
                row.len(),
                columns.len()
            ));
        }
        Ok(Self { columns, rows })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Vec<Cell>> {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Like [`Frame::column_index`] but a missing column is an input shape error.
    pub fn require_column(&self, stage: Stage, name: &str) -> Result<usize, PipelineError> {
        self.column_index(name)
            .ok_or_else(|| PipelineError::InputShape {
                stage,
                column: name.to_string(),
            })
    }

    /// Append a row. Panics on width mismatch, which is always a caller bug.
    pub fn push_row(&mut self, row: Vec<Cell>) {
        assert_eq!(row.len(), self.columns.len(), "row width mismatch");
        self.rows.push(row);
    }

    pub fn get(&self, row: usize, column: &str) -> Option<&Cell> {
        let idx = self.column_index(column)?;
        self.rows.get(row).map(|r| &r[idx])
    }

    /// Drop every listed column that exists; absent names are ignored.
    /// Returns the names actually dropped, in frame order.
    pub fn drop_columns(&mut self, names: &[&str]) -> Vec<String> {
        let keep: Vec<bool> = self
            .columns
            .iter()
            .map(|c| !names.contains(&c.as_str()))
            .collect();
        if keep.iter().all(|k| *k) {
            return Vec::new();
        }

        let dropped = self
            .columns
            .iter()
            .zip(&keep)
            .filter(|(_, k)| !**k)
            .map(|(c, _)| c.clone())
            .collect();

        self.columns = retain_by_mask(std::mem::take(&mut self.columns), &keep);
        for row in &mut self.rows {
            *row = retain_by_mask(std::mem::take(row), &keep);
        }
        dropped
    }

    /// Rewrite every cell of one column in place.
    pub fn map_column<F>(&mut self, idx: usize, mut f: F)
    where
        F: FnMut(&Cell) -> Cell,
    {
        for row in &mut self.rows {
            row[idx] = f(&row[idx]);
        }
    }

    /// Stable sort of the rows by one column.
    pub fn sort_by_column(&mut self, idx: usize) {
        self.rows.sort_by(|a, b| a[idx].sort_cmp(&b[idx]));
    }

    /// Split rows at `at`: `self` keeps `[0, at)`, the returned frame gets `[at, len)`.
    pub fn split_off(&mut self, at: usize) -> Frame {
        Frame {
            columns: self.columns.clone(),
            rows: self.rows.split_off(at),
        }
    }

    /// Separate one column into its own frame, returning `(rest, column)`.
    pub fn take_column(self, stage: Stage, name: &str) -> Result<(Frame, Frame), PipelineError> {
        let idx = self.require_column(stage, name)?;
        let mut rest_columns = self.columns;
        let taken_name = rest_columns.remove(idx);

        let mut rest_rows = Vec::with_capacity(self.rows.len());
        let mut taken_rows = Vec::with_capacity(self.rows.len());
        for mut row in self.rows {
            taken_rows.push(vec![row.remove(idx)]);
            rest_rows.push(row);
        }

        Ok((
            Frame {
                columns: rest_columns,
                rows: rest_rows,
            },
            Frame {
                columns: vec![taken_name],
                rows: taken_rows,
            },
        ))
    }
}

fn retain_by_mask<T>(items: Vec<T>, keep: &[bool]) -> Vec<T> {
    items
        .into_iter()
        .zip(keep)
        .filter(|(_, k)| **k)
        .map(|(item, _)| item)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Frame {
        Frame::from_rows(
            vec!["a".into(), "b".into(), "c".into()],
            vec![
                vec![Cell::Number(1.0), "x".into(), Cell::Missing],
                vec![Cell::Number(2.0), "y".into(), Cell::Number(9.0)],
            ],
        )
        .unwrap()
    }

    #[test]
    fn parse_cells() {
        assert_eq!(Cell::parse(""), Cell::Missing);
        assert_eq!(Cell::parse(" 1.5 "), Cell::Number(1.5));
        assert_eq!(Cell::parse("2024-01-01"), Cell::Text("2024-01-01".into()));
    }

    #[test]
    fn display_formats_integral_numbers_without_fraction() {
        assert_eq!(Cell::Number(3.0).to_string(), "3");
        assert_eq!(Cell::Number(100.25).to_string(), "100.25");
        assert_eq!(Cell::Missing.to_string(), "");
    }

    #[test]
    fn from_rows_rejects_ragged_rows() {
        let err = Frame::from_rows(vec!["a".into()], vec![vec![]]).unwrap_err();
        assert!(err.contains("row 0"));
    }

    #[test]
    fn drop_columns_ignores_absent_names() {
        let mut f = sample();
        let dropped = f.drop_columns(&["b", "zzz"]);
        assert_eq!(dropped, vec!["b".to_string()]);
        assert_eq!(f.columns(), &["a".to_string(), "c".to_string()]);
        assert_eq!(f.rows()[1], vec![Cell::Number(2.0), Cell::Number(9.0)]);
    }

    #[test]
    fn take_column_separates_label() {
        let (rest, taken) = sample().take_column(Stage::Persist, "a").unwrap();
        assert_eq!(rest.columns(), &["b".to_string(), "c".to_string()]);
        assert_eq!(taken.columns(), &["a".to_string()]);
        assert_eq!(taken.rows()[1], vec![Cell::Number(2.0)]);
    }

    #[test]
    fn require_column_reports_stage() {
        let err = sample().require_column(Stage::Split, "date").unwrap_err();
        assert!(matches!(err, PipelineError::InputShape { stage: Stage::Split, .. }));
    }

    #[test]
    fn split_off_keeps_header() {
        let mut head = sample();
        let tail = head.split_off(1);
        assert_eq!(head.len(), 1);
        assert_eq!(tail.len(), 1);
        assert_eq!(tail.columns(), head.columns());
    }

    #[test]
    fn sort_is_stable() {
        let mut f = Frame::from_rows(
            vec!["k".into(), "id".into()],
            vec![
                vec!["b".into(), Cell::Number(0.0)],
                vec!["a".into(), Cell::Number(1.0)],
                vec!["b".into(), Cell::Number(2.0)],
                vec!["a".into(), Cell::Number(3.0)],
            ],
        )
        .unwrap();
        f.sort_by_column(0);
        let ids: Vec<f64> = f.rows().iter().map(|r| r[1].as_number().unwrap()).collect();
        assert_eq!(ids, vec![1.0, 3.0, 0.0, 2.0]);
    }
}
