use std::collections::HashMap;
use std::sync::Arc;

use crate::core::{Result, StorageError};

use super::TableSchema;

/// Catalog of table schemas. Immutable after construction; mutation returns
/// a new catalog (copy-on-write), so readers never block and a transaction
/// can hold the pre-change catalog for rollback.
#[derive(Clone, Default)]
pub struct Catalog {
    tables: Arc<HashMap<String, TableSchema>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(self, schema: TableSchema) -> Result<Self> {
        let name = schema.name().to_string();
        if self.tables.contains_key(&name) {
            return Err(StorageError::TableExists(name));
        }

        let mut new_tables = (*self.tables).clone();
        new_tables.insert(name, schema);
        Ok(Self {
            tables: Arc::new(new_tables),
        })
    }

    pub fn without_table(self, name: &str) -> Result<Self> {
        if !self.tables.contains_key(name) {
            return Err(StorageError::TableNotFound(name.to_string()));
        }

        let mut new_tables = (*self.tables).clone();
        new_tables.remove(name);
        Ok(Self {
            tables: Arc::new(new_tables),
        })
    }

    pub fn get_table(&self, name: &str) -> Result<&TableSchema> {
        self.tables
            .get(name)
            .ok_or_else(|| StorageError::TableNotFound(name.to_string()))
    }

    pub fn table_exists(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    pub fn list_tables(&self) -> Vec<&str> {
        self.tables.keys().map(|s| s.as_str()).collect()
    }

    pub fn table_count(&self) -> usize {
        self.tables.len()
    }
}
