//! Tabular results: column names plus fixed-width rows, with a cursor for
//! sequential access.

use crate::value::{FromValue, Value};
use serde::Serialize;
use thiserror::Error;

/// Errors from typed row access
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RowAccessError {
    /// The cursor has not been advanced onto a row, or has run past the end
    #[error("cursor is not positioned on a row")]
    NoCurrentRow,

    #[error("column {column} is out of range (row width {width})")]
    ColumnOutOfRange { column: usize, width: usize },

    #[error("unknown column '{0}'")]
    UnknownColumn(String),

    /// The cell holds the "no value" marker
    #[error("column {column} has no value")]
    NoValue { column: usize },

    #[error("column {column} holds a {found}, expected {expected}")]
    TypeMismatch {
        column: usize,
        expected: &'static str,
        found: &'static str,
    },
}

/// Ordered column names and rows aligned to them by position.
///
/// Every row is exactly as wide as the column list.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RowSet {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl RowSet {
    /// Build a row set, padding short rows with [`Value::Null`] and dropping
    /// cells beyond the declared columns.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        let width = columns.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, Value::Null);
                row
            })
            .collect();
        Self { columns, rows }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row(&self, index: usize) -> Option<Row<'_>> {
        self.rows.get(index).map(|values| Row {
            columns: &self.columns,
            values,
        })
    }

    pub fn rows(&self) -> impl Iterator<Item = Row<'_>> + '_ {
        self.rows.iter().map(move |values| Row {
            columns: &self.columns,
            values,
        })
    }

    /// Cell at `(row, column)`
    pub fn value(&self, row: usize, column: usize) -> Option<&Value> {
        self.rows.get(row).and_then(|r| r.get(column))
    }

    /// A cursor positioned before the first row.
    pub fn cursor(&self) -> RowCursor<'_> {
        RowCursor {
            set: self,
            position: None,
        }
    }
}

/// One row of a [`RowSet`]
#[derive(Debug, Clone, Copy)]
pub struct Row<'a> {
    columns: &'a [String],
    values: &'a [Value],
}

impl<'a> Row<'a> {
    pub fn values(&self) -> &'a [Value] {
        self.values
    }

    pub fn value(&self, column: usize) -> Option<&'a Value> {
        self.values.get(column)
    }

    pub fn value_by_name(&self, name: &str) -> Option<&'a Value> {
        self.columns
            .iter()
            .position(|c| c == name)
            .and_then(|i| self.values.get(i))
    }

    /// Convert the cell at `column` into `T`.
    ///
    /// Use `Option<T>` to accept the "no value" marker.
    pub fn get<T: FromValue>(&self, column: usize) -> Result<T, RowAccessError> {
        let value = self
            .values
            .get(column)
            .ok_or(RowAccessError::ColumnOutOfRange {
                column,
                width: self.values.len(),
            })?;

        T::from_value(value).ok_or_else(|| {
            if value.is_null() {
                RowAccessError::NoValue { column }
            } else {
                RowAccessError::TypeMismatch {
                    column,
                    expected: T::EXPECTED,
                    found: value.type_name(),
                }
            }
        })
    }

    pub fn get_by_name<T: FromValue>(&self, name: &str) -> Result<T, RowAccessError> {
        let column = self
            .columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| RowAccessError::UnknownColumn(name.to_string()))?;
        self.get(column)
    }

    pub fn string(&self, column: usize) -> Result<String, RowAccessError> {
        self.get(column)
    }

    pub fn int(&self, column: usize) -> Result<i64, RowAccessError> {
        self.get(column)
    }

    pub fn float(&self, column: usize) -> Result<f64, RowAccessError> {
        self.get(column)
    }

    pub fn boolean(&self, column: usize) -> Result<bool, RowAccessError> {
        self.get(column)
    }
}

/// Sequential reader over a [`RowSet`].
///
/// Starts before the first row; call [`RowCursor::next`] to move onto it.
#[derive(Debug, Clone)]
pub struct RowCursor<'a> {
    set: &'a RowSet,
    position: Option<usize>,
}

impl<'a> RowCursor<'a> {
    /// Advance to the next row. Returns `false` once the rows are exhausted.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> bool {
        let next = self.position.map_or(0, |p| p + 1);
        // park one past the end so repeated calls stay exhausted
        self.position = Some(next.min(self.set.len()));
        next < self.set.len()
    }

    /// Index of the current row, if the cursor is on one
    pub fn position(&self) -> Option<usize> {
        self.position.filter(|p| *p < self.set.len())
    }

    /// Move back before the first row
    pub fn reset(&mut self) {
        self.position = None;
    }

    pub fn current(&self) -> Option<Row<'a>> {
        self.position().and_then(|p| self.set.row(p))
    }

    pub fn get<T: FromValue>(&self, column: usize) -> Result<T, RowAccessError> {
        self.current()
            .ok_or(RowAccessError::NoCurrentRow)?
            .get(column)
    }

    pub fn string(&self, column: usize) -> Result<String, RowAccessError> {
        self.get(column)
    }

    pub fn int(&self, column: usize) -> Result<i64, RowAccessError> {
        self.get(column)
    }

    pub fn float(&self, column: usize) -> Result<f64, RowAccessError> {
        self.get(column)
    }

    pub fn boolean(&self, column: usize) -> Result<bool, RowAccessError> {
        self.get(column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn people() -> RowSet {
        RowSet::new(
            vec!["name".into(), "age".into()],
            vec![
                vec![Value::from("Ada"), Value::from(36)],
                vec![Value::from("Grace")],
            ],
        )
    }

    #[test]
    fn rows_are_padded_to_column_width() {
        let set = people();
        assert_eq!(set.column_count(), 2);
        assert!(set.rows().all(|r| r.values().len() == 2));
        assert!(set.value(1, 1).unwrap().is_null());
    }

    #[test]
    fn extra_cells_are_dropped() {
        let set = RowSet::new(
            vec!["a".into()],
            vec![vec![Value::from(1), Value::from(2)]],
        );
        assert_eq!(set.row(0).unwrap().values(), &[Value::from(1)]);
    }

    #[test]
    fn cursor_starts_before_first_row() {
        let set = people();
        let mut cursor = set.cursor();

        assert_eq!(cursor.get::<String>(0), Err(RowAccessError::NoCurrentRow));
        assert!(cursor.next());
        assert_eq!(cursor.string(0).unwrap(), "Ada");
        assert_eq!(cursor.int(1).unwrap(), 36);
        assert!(cursor.next());
        assert_eq!(cursor.string(0).unwrap(), "Grace");
        assert!(!cursor.next());
        assert!(!cursor.next());
        assert!(cursor.current().is_none());

        cursor.reset();
        assert!(cursor.next());
        assert_eq!(cursor.position(), Some(0));
    }

    #[test]
    fn typed_access_reports_mismatch_and_missing_values() {
        let set = people();
        let grace = set.row(1).unwrap();

        assert_eq!(grace.int(1), Err(RowAccessError::NoValue { column: 1 }));
        assert_eq!(grace.get::<Option<i64>>(1), Ok(None));
        assert_eq!(
            grace.int(0),
            Err(RowAccessError::TypeMismatch {
                column: 0,
                expected: "integer",
                found: "string",
            })
        );
        assert_eq!(
            grace.string(5),
            Err(RowAccessError::ColumnOutOfRange { column: 5, width: 2 })
        );
    }

    #[test]
    fn access_by_column_name() {
        let set = people();
        let ada = set.row(0).unwrap();
        assert_eq!(set.column_index("age"), Some(1));
        assert_eq!(ada.get_by_name::<i64>("age").unwrap(), 36);
        assert_eq!(
            ada.get_by_name::<i64>("height"),
            Err(RowAccessError::UnknownColumn("height".into()))
        );
    }
}
