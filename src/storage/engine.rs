use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use crate::core::{Result, Row, StorageError, Value};

use super::{Catalog, Table, TableSchema};

/// The in-memory relational backend the engine executes against.
///
/// One schema compile or one data-population pass runs synchronously and is
/// wrapped in [`StorageEngine::transaction`]: a partially-created table set
/// or a partially-inserted parent/child row tree is unrecoverable without a
/// matching rollback.
#[derive(Default)]
pub struct StorageEngine {
    tables: RwLock<HashMap<String, Table>>,
    catalog: RwLock<Catalog>,
}

impl StorageEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `f` all-or-nothing: on error the pre-call state is restored.
    /// State capture is a clone of the table map plus the copy-on-write
    /// catalog handle, which is proportionate for an in-memory backend.
    pub fn transaction<T>(&self, f: impl FnOnce(&Self) -> Result<T>) -> Result<T> {
        let table_snapshot = self.tables.read()?.clone();
        let catalog_snapshot = self.catalog.read()?.clone();
        match f(self) {
            Ok(value) => Ok(value),
            Err(err) => {
                *self.tables.write()? = table_snapshot;
                *self.catalog.write()? = catalog_snapshot;
                Err(err)
            }
        }
    }

    pub fn create_table(&self, schema: TableSchema) -> Result<()> {
        let name = schema.name().to_string();
        let mut tables = self.tables.write()?;
        if tables.contains_key(&name) {
            return Err(StorageError::TableExists(name));
        }
        let mut catalog = self.catalog.write()?;
        *catalog = catalog.clone().with_table(schema.clone())?;
        tables.insert(name, Table::new(schema));
        Ok(())
    }

    pub fn drop_table(&self, table_name: &str) -> Result<()> {
        let mut tables = self.tables.write()?;
        if tables.remove(table_name).is_none() {
            return Err(StorageError::TableNotFound(table_name.to_string()));
        }
        let mut catalog = self.catalog.write()?;
        *catalog = catalog.clone().without_table(table_name)?;
        Ok(())
    }

    /// Inserts a row, returning the generated primary key.
    pub fn insert(&self, table_name: &str, values: &BTreeMap<String, Value>) -> Result<i64> {
        let mut tables = self.tables.write()?;
        let table = tables
            .get_mut(table_name)
            .ok_or_else(|| StorageError::TableNotFound(table_name.to_string()))?;
        table.insert(values)
    }

    pub fn delete_row(&self, table_name: &str, id: i64) -> Result<bool> {
        let mut tables = self.tables.write()?;
        let table = tables
            .get_mut(table_name)
            .ok_or_else(|| StorageError::TableNotFound(table_name.to_string()))?;
        Ok(table.delete(id))
    }

    pub fn delete_where(&self, table_name: &str, column: &str, value: &Value) -> Result<usize> {
        let mut tables = self.tables.write()?;
        let table = tables
            .get_mut(table_name)
            .ok_or_else(|| StorageError::TableNotFound(table_name.to_string()))?;
        table.delete_where(column, value)
    }

    pub fn rows_where(&self, table_name: &str, column: &str, value: &Value) -> Result<Vec<(i64, Row)>> {
        let tables = self.tables.read()?;
        let table = tables
            .get(table_name)
            .ok_or_else(|| StorageError::TableNotFound(table_name.to_string()))?;
        table.rows_where(column, value)
    }

    pub fn scan(&self, table_name: &str) -> Result<Vec<(i64, Row)>> {
        let tables = self.tables.read()?;
        let table = tables
            .get(table_name)
            .ok_or_else(|| StorageError::TableNotFound(table_name.to_string()))?;
        Ok(table.scan())
    }

    pub fn value_at(&self, table_name: &str, id: i64, column: &str) -> Result<Value> {
        let tables = self.tables.read()?;
        let table = tables
            .get(table_name)
            .ok_or_else(|| StorageError::TableNotFound(table_name.to_string()))?;
        table.value_at(id, column)
    }

    /// Most recent id in a table, the fallback parent id used when a
    /// field-less statement has no freshly generated id to hand down.
    pub fn last_id(&self, table_name: &str) -> Result<Option<i64>> {
        let tables = self.tables.read()?;
        let table = tables
            .get(table_name)
            .ok_or_else(|| StorageError::TableNotFound(table_name.to_string()))?;
        Ok(table.last_id())
    }

    pub fn row_count(&self, table_name: &str) -> Result<usize> {
        let tables = self.tables.read()?;
        let table = tables
            .get(table_name)
            .ok_or_else(|| StorageError::TableNotFound(table_name.to_string()))?;
        Ok(table.row_count())
    }

    pub fn table_exists(&self, name: &str) -> bool {
        self.catalog
            .read()
            .map(|catalog| catalog.table_exists(name))
            .unwrap_or(false)
    }

    pub fn list_tables(&self) -> Vec<String> {
        self.catalog
            .read()
            .map(|catalog| catalog.list_tables().into_iter().map(str::to_string).collect())
            .unwrap_or_default()
    }

    pub fn table_count(&self) -> usize {
        self.catalog
            .read()
            .map(|catalog| catalog.table_count())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Column, DataType};
    use crate::storage::table::ID_COLUMN;

    fn visit_schema() -> TableSchema {
        TableSchema::new(
            "schema_visit",
            vec![
                Column::new(ID_COLUMN, DataType::Integer).not_null(),
                Column::new("name", DataType::Text),
            ],
        )
    }

    #[test]
    fn test_create_insert_scan() {
        let engine = StorageEngine::new();
        engine.create_table(visit_schema()).unwrap();

        let mut values = BTreeMap::new();
        values.insert("name".to_string(), Value::Text("a".into()));
        let id = engine.insert("schema_visit", &values).unwrap();
        assert_eq!(id, 1);
        assert_eq!(engine.scan("schema_visit").unwrap().len(), 1);
    }

    #[test]
    fn test_transaction_rolls_back_on_error() {
        let engine = StorageEngine::new();
        engine.create_table(visit_schema()).unwrap();

        let result: Result<()> = engine.transaction(|txn| {
            let mut values = BTreeMap::new();
            values.insert("name".to_string(), Value::Text("a".into()));
            txn.insert("schema_visit", &values)?;
            Err(StorageError::ExecutionError("boom".into()))
        });
        assert!(result.is_err());
        assert_eq!(engine.row_count("schema_visit").unwrap(), 0);
    }

    #[test]
    fn test_transaction_commits_on_success() {
        let engine = StorageEngine::new();
        engine
            .transaction(|txn| txn.create_table(visit_schema()))
            .unwrap();
        assert!(engine.table_exists("schema_visit"));
    }
}
