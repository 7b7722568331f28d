//! Materialised query results
//!
//! Rows are copied out of SQLite into owned [`Value`]s so they can cross trait
//! object boundaries and outlive the pooled connection that produced them.

use std::sync::Arc;

use rusqlite::types::{FromSql, Value, ValueRef};

use super::error::{DataError, DataResult};

/// One result row.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    columns: Arc<[String]>,
    values: Vec<Value>,
}

impl Record {
    pub(crate) fn new(columns: Arc<[String]>, values: Vec<Value>) -> Self {
        Self { columns, values }
    }

    /// Column names in select order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Raw values in select order.
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the row has no columns.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Decode the value of the named column.
    ///
    /// # Errors
    /// [`DataError::Decode`] if the column is missing or has an incompatible type.
    pub fn get<T: FromSql>(&self, column: &str) -> DataResult<T> {
        let index = self.columns.iter().position(|name| name == column).ok_or_else(|| {
            DataError::Decode { column: column.to_string(), message: "no such column".to_string() }
        })?;
        self.decode(index, column)
    }

    /// Decode the value at `index`.
    ///
    /// # Errors
    /// [`DataError::Decode`] if out of range or the type is incompatible.
    pub fn get_index<T: FromSql>(&self, index: usize) -> DataResult<T> {
        self.decode(index, &index.to_string())
    }

    fn decode<T: FromSql>(&self, index: usize, label: &str) -> DataResult<T> {
        let value = self.values.get(index).ok_or_else(|| DataError::Decode {
            column: label.to_string(),
            message: format!("index out of range (row has {} columns)", self.values.len()),
        })?;

        T::column_result(ValueRef::from(value))
            .map_err(|e| DataError::Decode { column: label.to_string(), message: e.to_string() })
    }
}

/// All rows returned by a query, with their column names.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Rows {
    columns: Vec<String>,
    records: Vec<Record>,
}

impl Rows {
    pub(crate) fn new(columns: &[String], records: Vec<Record>) -> Self {
        Self { columns: columns.to_vec(), records }
    }

    /// Column names in select order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the query returned nothing.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterate over rows.
    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.records.iter()
    }

    /// Take ownership of the rows.
    pub fn into_records(self) -> Vec<Record> {
        self.records
    }
}

impl IntoIterator for Rows {
    type Item = Record;
    type IntoIter = std::vec::IntoIter<Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

impl<'a> IntoIterator for &'a Rows {
    type Item = &'a Record;
    type IntoIter = std::slice::Iter<'a, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

/// Map a [`Record`] onto a caller type.
pub trait FromRecord: Sized {
    /// Build `Self` from one row.
    ///
    /// # Errors
    /// Usually [`DataError::Decode`] from [`Record::get`].
    fn from_record(record: &Record) -> DataResult<Self>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> Record {
        let columns: Arc<[String]> = vec!["id".to_string(), "name".to_string()].into();
        Record::new(columns, vec![Value::Integer(7), Value::Text("ada".to_string())])
    }

    #[test]
    fn test_get_by_name_and_index() {
        let record = record();
        assert_eq!(record.get::<i64>("id").unwrap(), 7);
        assert_eq!(record.get::<String>("name").unwrap(), "ada");
        assert_eq!(record.get_index::<String>(1).unwrap(), "ada");
    }

    #[test]
    fn test_decode_errors() {
        let record = record();
        assert!(matches!(record.get::<i64>("missing"), Err(DataError::Decode { .. })));
        assert!(matches!(record.get::<i64>("name"), Err(DataError::Decode { .. })));
        assert!(matches!(record.get_index::<i64>(5), Err(DataError::Decode { .. })));
    }
}
