//! Deletion paths: a single stored instance, a whole schema, or everything.
//!
//! Deletion is best-effort where the original registration may have been
//! damaged out-of-band: a table that was expected but is already gone is
//! reported as a [`CleanupIssue`] and the walk continues, so a half-broken
//! installation can still be cleaned up. Lookups that indicate a caller bug
//! (unknown form id) fail hard instead.

pub mod files;
pub mod handling;

pub use files::SubmissionStore;
pub use handling::{HandlingLedger, HandlingRecord, HandlingType, SubmissionId, APP_NAME};

use std::fmt;

use log::{debug, error, info, warn};

use crate::core::{Result, Value};
use crate::ident::TableRegistry;
use crate::meta::MetaStore;
use crate::storage::{StorageEngine, PARENT_ID_COLUMN};

/// One non-fatal problem encountered during a deletion walk.
#[derive(Debug, Clone)]
pub struct CleanupIssue {
    /// What was being cleaned up: a table name, a file path.
    pub context: String,
    pub detail: String,
}

impl CleanupIssue {
    pub fn new(context: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            context: context.into(),
            detail: detail.into(),
        }
    }
}

impl fmt::Display for CleanupIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.context, self.detail)
    }
}

/// Drives instance and schema teardown across the storage engine, the table
/// registry, the metadata store, and the handling ledger.
pub struct LifecycleManager<'a> {
    engine: &'a StorageEngine,
    registry: &'a TableRegistry,
    ledger: &'a HandlingLedger,
    meta: &'a MetaStore,
    submissions: Option<&'a SubmissionStore>,
}

impl<'a> LifecycleManager<'a> {
    pub fn new(
        engine: &'a StorageEngine,
        registry: &'a TableRegistry,
        ledger: &'a HandlingLedger,
        meta: &'a MetaStore,
        submissions: Option<&'a SubmissionStore>,
    ) -> Self {
        Self {
            engine,
            registry,
            ledger,
            meta,
            submissions,
        }
    }

    /// Removes one stored instance: child rows first (grandchildren before
    /// children), then the root row, then the instance metadata. The tables
    /// themselves stay, even if now empty.
    pub fn remove_instance(&self, form_id: u64, root_row_id: i64) -> Result<Vec<CleanupIssue>> {
        let form = self.meta.get_form(form_id)?;
        let mut issues = Vec::new();

        self.remove_child_rows(&form.root_table, root_row_id, &mut issues);
        match self.engine.delete_row(&form.root_table, root_row_id) {
            Ok(true) => {}
            Ok(false) => {
                warn!(
                    "instance row {root_row_id} not found in '{}'",
                    form.root_table
                );
                issues.push(CleanupIssue::new(form.root_table.clone(), "root row not found"));
            }
            Err(err) => {
                warn!("could not delete row {root_row_id} from '{}': {err}", form.root_table);
                issues.push(CleanupIssue::new(form.root_table.clone(), err.to_string()));
            }
        }

        // Submissions stored before metadata tracking existed have no
        // instance record; their rows are still gone, which is all we need.
        if let Some(instance) = self.meta.remove_instance(form_id, root_row_id)? {
            self.ledger
                .unhandled(instance.submission, &HandlingType::instance_data());
            self.ledger.handled(
                instance.submission,
                HandlingType::deleted(),
                Some(format!("form {form_id} instance {root_row_id}")),
            );
        } else {
            debug!("no instance metadata for form {form_id} row {root_row_id}");
        }
        info!("removed instance {root_row_id} of form {form_id}");
        Ok(issues)
    }

    fn remove_child_rows(&self, table_name: &str, row_id: i64, issues: &mut Vec<CleanupIssue>) {
        let parent_ref = Value::Integer(row_id);
        for child in self.registry.children_of(table_name) {
            let child_rows = match self.engine.rows_where(&child.table_name, PARENT_ID_COLUMN, &parent_ref) {
                Ok(rows) => rows,
                Err(err) => {
                    warn!("could not read child rows from '{}': {err}", child.table_name);
                    issues.push(CleanupIssue::new(child.table_name.clone(), err.to_string()));
                    continue;
                }
            };
            for (child_id, _) in child_rows {
                self.remove_child_rows(&child.table_name, child_id, issues);
            }
            if let Err(err) = self.engine.delete_where(&child.table_name, PARENT_ID_COLUMN, &parent_ref) {
                warn!("could not delete child rows from '{}': {err}", child.table_name);
                issues.push(CleanupIssue::new(child.table_name.clone(), err.to_string()));
            }
        }
    }

    /// Removes a whole schema: its tables (children before parents, so no
    /// foreign key ever dangles), its registry entries, and its form and
    /// instance metadata. Handling records of its stored submissions are
    /// reverted so the submissions show up as unhandled again.
    pub fn remove_schema(&self, form_id: u64) -> Result<Vec<CleanupIssue>> {
        let form = self.meta.get_form(form_id)?;
        let mut issues = Vec::new();

        for descriptor in self.registry.tables_for_form(form_id).into_iter().rev() {
            if self.engine.table_exists(&descriptor.table_name) {
                if let Err(err) = self.engine.drop_table(&descriptor.table_name) {
                    error!("could not drop '{}': {err}", descriptor.table_name);
                    issues.push(CleanupIssue::new(descriptor.table_name.clone(), err.to_string()));
                }
            } else {
                warn!("table '{}' was already gone", descriptor.table_name);
                issues.push(CleanupIssue::new(descriptor.table_name.clone(), "table was already gone"));
            }
            if let Err(err) = self.registry.remove(&descriptor.table_name) {
                issues.push(CleanupIssue::new(descriptor.table_name.clone(), err.to_string()));
            }
        }

        for instance in self.meta.instances_for(form_id) {
            self.ledger
                .unhandled(instance.submission, &HandlingType::instance_data());
        }
        self.meta.remove_form(form_id)?;
        info!("removed schema {form_id} ('{}')", form.name);
        Ok(issues)
    }

    /// Tears down every schema, all metadata, all handling records, and the
    /// stored submission payloads. Ends with an empty registry regardless of
    /// what the individual walks reported.
    pub fn clear(&self) -> Vec<CleanupIssue> {
        let mut issues = Vec::new();
        for form_id in self.meta.form_ids() {
            match self.remove_schema(form_id) {
                Ok(mut schema_issues) => issues.append(&mut schema_issues),
                Err(err) => issues.push(CleanupIssue::new(format!("form {form_id}"), err.to_string())),
            }
        }
        // Tables registered outside any surviving form metadata.
        for descriptor in self.registry.all_tables().into_iter().rev() {
            if self.engine.table_exists(&descriptor.table_name) {
                if let Err(err) = self.engine.drop_table(&descriptor.table_name) {
                    issues.push(CleanupIssue::new(descriptor.table_name.clone(), err.to_string()));
                }
            }
        }
        self.registry.clear();
        self.ledger.clear();
        self.meta.clear();
        if let Some(store) = self.submissions {
            store.clear(&mut issues);
        }
        info!("cleared all stored schemas and instances ({} issues)", issues.len());
        issues
    }
}
