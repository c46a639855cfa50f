use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::{Column, Result, Row, Schema, StorageError, Value};

/// The auto-increment primary key column every generated table carries.
pub const ID_COLUMN: &str = "id";

/// The nullable foreign-key column linking a child table to its parent.
pub const PARENT_ID_COLUMN: &str = "parent_id";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableSchema {
    name: String,
    schema: Schema,
}

impl TableSchema {
    pub fn new(name: impl Into<String>, columns: Vec<Column>) -> Self {
        Self {
            name: name.into(),
            schema: Schema::new(columns),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }
}

/// One relational table: a schema plus rows keyed by their generated id.
/// Ids are allocated monotonically and never reused within a table's life.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Table {
    schema: TableSchema,
    rows: BTreeMap<i64, Row>,
    next_id: i64,
}

impl Table {
    pub fn new(schema: TableSchema) -> Self {
        Self {
            schema,
            rows: BTreeMap::new(),
            next_id: 1,
        }
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    /// Inserts a row from a column/value map, returning the generated id.
    /// Columns absent from the map are stored as NULL (their schema
    /// default); the id column is always engine-assigned.
    pub fn insert(&mut self, values: &BTreeMap<String, Value>) -> Result<i64> {
        for name in values.keys() {
            if self.schema.schema().find_column_index(name).is_none() {
                return Err(StorageError::ColumnNotFound(
                    name.clone(),
                    self.schema.name().to_string(),
                ));
            }
        }

        let id = self.next_id;
        let mut row = Vec::with_capacity(self.schema.schema().column_count());
        for column in self.schema.schema().columns() {
            let value = if column.name == ID_COLUMN {
                Value::Integer(id)
            } else {
                values.get(&column.name).cloned().unwrap_or(Value::Null)
            };
            column.validate(&value)?;
            row.push(value);
        }

        self.next_id += 1;
        self.rows.insert(id, row);
        Ok(id)
    }

    pub fn delete(&mut self, id: i64) -> bool {
        self.rows.remove(&id).is_some()
    }

    /// Deletes every row whose named column equals `value`, returning the
    /// count removed.
    pub fn delete_where(&mut self, column: &str, value: &Value) -> Result<usize> {
        let idx = self
            .schema
            .schema()
            .find_column_index(column)
            .ok_or_else(|| StorageError::ColumnNotFound(column.to_string(), self.schema.name().to_string()))?;
        let doomed: Vec<i64> = self
            .rows
            .iter()
            .filter(|(_, row)| &row[idx] == value)
            .map(|(id, _)| *id)
            .collect();
        for id in &doomed {
            self.rows.remove(id);
        }
        Ok(doomed.len())
    }

    pub fn scan(&self) -> Vec<(i64, Row)> {
        self.rows.iter().map(|(id, row)| (*id, row.clone())).collect()
    }

    /// Rows whose named column equals `value`, in id order.
    pub fn rows_where(&self, column: &str, value: &Value) -> Result<Vec<(i64, Row)>> {
        let idx = self
            .schema
            .schema()
            .find_column_index(column)
            .ok_or_else(|| StorageError::ColumnNotFound(column.to_string(), self.schema.name().to_string()))?;
        Ok(self
            .rows
            .iter()
            .filter(|(_, row)| &row[idx] == value)
            .map(|(id, row)| (*id, row.clone()))
            .collect())
    }

    /// Cell value by row id and column name.
    pub fn value_at(&self, id: i64, column: &str) -> Result<Value> {
        let idx = self
            .schema
            .schema()
            .find_column_index(column)
            .ok_or_else(|| StorageError::ColumnNotFound(column.to_string(), self.schema.name().to_string()))?;
        self.rows
            .get(&id)
            .map(|row| row[idx].clone())
            .ok_or_else(|| StorageError::ExecutionError(format!(
                "row {} not found in '{}'",
                id,
                self.schema.name()
            )))
    }

    /// Highest id currently present, the equivalent of
    /// `SELECT id ... ORDER BY id DESC LIMIT 1`.
    pub fn last_id(&self) -> Option<i64> {
        self.rows.keys().next_back().copied()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}
