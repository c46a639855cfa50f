use std::collections::HashMap;
use std::sync::Mutex;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::core::{Result, StorageError};

use super::{NamingContext, NAMING_STRATEGIES};

/// One logical table created from a repeatable group in some form's schema
/// tree. Created at schema-registration time, destroyed only by explicit
/// schema removal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableDescriptor {
    pub table_name: String,
    pub parent_table_name: Option<String>,
    pub form_id: u64,
    /// Slash-joined path of the element this table stores.
    pub xpath: String,
    /// Column name / SQL type pairs, in DDL order (primary key and
    /// parent_id excluded).
    pub columns: Vec<(String, String)>,
}

#[derive(Default)]
struct RegistryState {
    by_name: HashMap<String, TableDescriptor>,
    /// Registration order; schema removal walks this in reverse so children
    /// drop before the parents their foreign keys reference.
    order: Vec<String>,
}

/// Shared registry of every currently-registered table.
///
/// This is the only shared mutable state in the engine; all access funnels
/// through one mutex so two concurrent schema compilations cannot allocate
/// the same identifier.
#[derive(Default)]
pub struct TableRegistry {
    inner: Mutex<RegistryState>,
}

impl TableRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a descriptor under its derived name.
    ///
    /// A collision with an already-registered table (a different xpath
    /// truncating or sanitizing to the same identifier) is logged and
    /// refused; no automatic disambiguation is performed.
    pub fn register(&self, descriptor: TableDescriptor) -> Result<()> {
        let mut state = self.inner.lock()?;
        if let Some(existing) = state.by_name.get(&descriptor.table_name) {
            if existing.xpath != descriptor.xpath || existing.form_id != descriptor.form_id {
                warn!(
                    "table name collision: '{}' already registered for '{}', requested for '{}'",
                    descriptor.table_name, existing.xpath, descriptor.xpath
                );
            }
            return Err(StorageError::TableExists(descriptor.table_name.clone()));
        }
        state.order.push(descriptor.table_name.clone());
        state.by_name.insert(descriptor.table_name.clone(), descriptor);
        Ok(())
    }

    pub fn exists(&self, table_name: &str) -> bool {
        self.inner
            .lock()
            .map(|state| state.by_name.contains_key(table_name))
            .unwrap_or(false)
    }

    pub fn get(&self, table_name: &str) -> Option<TableDescriptor> {
        self.inner
            .lock()
            .ok()
            .and_then(|state| state.by_name.get(table_name).cloned())
    }

    /// Finds the descriptor registered for an element path within a form.
    pub fn resolve_xpath(&self, form_id: u64, xpath: &str) -> Option<TableDescriptor> {
        self.inner.lock().ok().and_then(|state| {
            state
                .by_name
                .values()
                .find(|d| d.form_id == form_id && d.xpath == xpath)
                .cloned()
        })
    }

    /// Resolves a qualified path to a registered table name, trying every
    /// historical naming strategy newest-first and returning the first that
    /// matches an existing table.
    pub fn resolve_table_name(&self, qualified_path: &str, ctx: &NamingContext<'_>) -> Option<String> {
        for strategy in NAMING_STRATEGIES {
            let candidate = strategy(qualified_path, ctx);
            if self.exists(&candidate) {
                return Some(candidate);
            }
        }
        None
    }

    /// Direct children of a table, i.e. tables whose `parent_table_name`
    /// references it, in registration order.
    pub fn children_of(&self, table_name: &str) -> Vec<TableDescriptor> {
        self.inner
            .lock()
            .map(|state| {
                state
                    .order
                    .iter()
                    .filter_map(|name| state.by_name.get(name))
                    .filter(|d| d.parent_table_name.as_deref() == Some(table_name))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Every table registered for a form, in registration order (parents
    /// strictly before their children).
    pub fn tables_for_form(&self, form_id: u64) -> Vec<TableDescriptor> {
        self.inner
            .lock()
            .map(|state| {
                state
                    .order
                    .iter()
                    .filter_map(|name| state.by_name.get(name))
                    .filter(|d| d.form_id == form_id)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Every registered table across all forms, in registration order.
    pub fn all_tables(&self) -> Vec<TableDescriptor> {
        self.inner
            .lock()
            .map(|state| {
                state
                    .order
                    .iter()
                    .filter_map(|name| state.by_name.get(name))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn remove(&self, table_name: &str) -> Result<()> {
        let mut state = self.inner.lock()?;
        if state.by_name.remove(table_name).is_none() {
            return Err(StorageError::TableNotFound(table_name.to_string()));
        }
        state.order.retain(|name| name != table_name);
        Ok(())
    }

    pub fn clear(&self) {
        if let Ok(mut state) = self.inner.lock() {
            state.by_name.clear();
            state.order.clear();
        }
    }

    pub fn is_empty(&self) -> bool {
        self.inner
            .lock()
            .map(|state| state.by_name.is_empty())
            .unwrap_or(true)
    }
}
