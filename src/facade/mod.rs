//! The high-level entry point tying schema compilation, data population,
//! metadata, handling records, and lifecycle management together.

use std::path::PathBuf;

use log::{info, warn};

use crate::compiler::SchemaCompiler;
use crate::core::{Result, StorageError};
use crate::ident::TableRegistry;
use crate::lifecycle::{
    CleanupIssue, HandlingLedger, HandlingRecord, HandlingType, LifecycleManager, SubmissionId,
    SubmissionStore,
};
use crate::meta::{FormRecord, InstanceRecord, MetaStore};
use crate::populate::{DataNode, Populator};
use crate::schema::{Dialect, FormDef};
use crate::storage::StorageEngine;

/// One engine instance: registered schemas, their generated tables, and the
/// instance data stored in them.
///
/// All methods take `&self`; the engine is safe to share across threads.
pub struct FormStore {
    engine: StorageEngine,
    registry: TableRegistry,
    ledger: HandlingLedger,
    meta: MetaStore,
    submissions: Option<SubmissionStore>,
    dialect: Dialect,
}

impl Default for FormStore {
    fn default() -> Self {
        Self::new(Dialect::default())
    }
}

impl FormStore {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            engine: StorageEngine::new(),
            registry: TableRegistry::new(),
            ledger: HandlingLedger::new(),
            meta: MetaStore::new(),
            submissions: None,
            dialect,
        }
    }

    /// Enables on-disk retention of raw submission payloads.
    pub fn with_submission_dir(mut self, dir: impl Into<PathBuf>) -> Result<Self> {
        self.submissions = Some(SubmissionStore::new(dir)?);
        Ok(self)
    }

    fn lifecycle(&self) -> LifecycleManager<'_> {
        LifecycleManager::new(
            &self.engine,
            &self.registry,
            &self.ledger,
            &self.meta,
            self.submissions.as_ref(),
        )
    }

    /// Registers a form definition: compiles it to tables, creates them
    /// all-or-nothing, and records the form's identity. On any failure no
    /// trace of the form remains.
    pub fn add_schema(&self, form: &FormDef) -> Result<FormRecord> {
        let mut record = self.meta.register_form(form)?;
        let compiler = SchemaCompiler::new(form, record.id, &self.registry, self.dialect);
        let tables = match compiler.compile() {
            Ok(tables) => tables,
            Err(err) => {
                let _ = self.meta.remove_form(record.id);
                return Err(err);
            }
        };
        let created = self.engine.transaction(|txn| {
            for create in &tables {
                txn.create_table(create.table_schema())?;
            }
            Ok(())
        });
        if let Err(err) = created {
            for create in tables.iter().rev() {
                let _ = self.registry.remove(&create.table_name);
            }
            let _ = self.meta.remove_form(record.id);
            return Err(err);
        }
        self.meta.set_root_table(record.id, &tables[0].table_name)?;
        record.root_table = tables[0].table_name.clone();
        info!(
            "registered form {} ('{}') with {} tables",
            record.id,
            form.name,
            tables.len()
        );
        Ok(record)
    }

    /// Stores one submission's instance data, matching it to a registered
    /// form by the root element's namespace and declared version. Returns
    /// the generated root row id, or `None` when the form's root element
    /// holds no direct fields and only child group rows were stored.
    ///
    /// Data-quality problems inside the instance are logged and degraded;
    /// the pass only fails on configuration errors (no matching form, an
    /// unregistered table) and then leaves no rows behind.
    pub fn save_form_data(&self, data_tree: &DataNode, submission: SubmissionId) -> Result<Option<i64>> {
        let namespace = data_tree
            .namespace
            .as_deref()
            .ok_or_else(|| StorageError::SchemaNotFound("submission root carries no namespace".into()))?;
        let record = self
            .meta
            .find_form(namespace, data_tree.version)
            .ok_or_else(|| StorageError::SchemaNotFound(namespace.to_string()))?;
        let form = self.meta.get_form_def(record.id)?;

        let mut populator = Populator::new(&form, record.id, &self.registry, self.dialect);
        let statement = populator.populate(data_tree)?;
        if !populator.errors.is_empty() {
            info!("submission {submission} population issues:\n{}", populator.errors);
        }
        if statement.is_empty() {
            return Err(StorageError::EmptyForm(form.name.clone()));
        }

        let root_row_id = self.engine.transaction(|txn| statement.execute(txn))?;
        match root_row_id {
            Some(id) => {
                self.meta.record_instance(record.id, submission, id)?;
                self.ledger.handled(
                    submission,
                    HandlingType::instance_data(),
                    Some(format!("{}:{id}", record.root_table)),
                );
                info!("stored submission {submission} as row {id} of '{}'", record.root_table);
            }
            None => {
                // fieldless root: child rows were stored, but there is no
                // fresh root row to link instance metadata to
                self.ledger.handled(submission, HandlingType::instance_data(), None);
                warn!(
                    "submission {submission} stored without a new root row in '{}'",
                    record.root_table
                );
            }
        }
        Ok(root_row_id)
    }

    /// Keeps the raw payload of a submission, when a submission directory
    /// was configured.
    pub fn store_payload(&self, submission: SubmissionId, payload: &[u8]) -> Result<PathBuf> {
        match &self.submissions {
            Some(store) => store.store(submission, payload),
            None => Err(StorageError::IoError("no submission directory configured".into())),
        }
    }

    /// Deletes one stored instance's rows and metadata; the form's tables
    /// remain, even if now empty.
    pub fn remove_instance(&self, form_id: u64, root_row_id: i64) -> Result<Vec<CleanupIssue>> {
        self.lifecycle().remove_instance(form_id, root_row_id)
    }

    /// Drops a form's tables (children before parents) and forgets the form.
    pub fn remove_schema(&self, form_id: u64) -> Result<Vec<CleanupIssue>> {
        self.lifecycle().remove_schema(form_id)
    }

    /// Removes every schema, all stored data and metadata, and any retained
    /// payload files. Always ends with an empty registry.
    pub fn clear(&self) -> Vec<CleanupIssue> {
        self.lifecycle().clear()
    }

    pub fn get_form(&self, form_id: u64) -> Result<FormRecord> {
        self.meta.get_form(form_id)
    }

    pub fn find_form(&self, target_namespace: &str, version: Option<u32>) -> Option<FormRecord> {
        self.meta.find_form(target_namespace, version)
    }

    pub fn instances_for(&self, form_id: u64) -> Vec<InstanceRecord> {
        self.meta.instances_for(form_id)
    }

    pub fn handling_records(&self, submission: SubmissionId) -> Vec<HandlingRecord> {
        self.ledger.records_for(submission)
    }

    pub fn is_orphaned(&self, submission: SubmissionId) -> bool {
        self.ledger.is_orphaned(submission)
    }

    pub fn table_exists(&self, table_name: &str) -> bool {
        self.engine.table_exists(table_name)
    }

    pub fn row_count(&self, table_name: &str) -> Result<usize> {
        self.engine.row_count(table_name)
    }

    pub fn table_count(&self) -> usize {
        self.engine.table_count()
    }

    pub fn engine(&self) -> &StorageEngine {
        &self.engine
    }

    pub fn registry(&self) -> &TableRegistry {
        &self.registry
    }

    pub fn ledger(&self) -> &HandlingLedger {
        &self.ledger
    }
}
