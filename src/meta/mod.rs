//! Registered-form and stored-instance metadata.
//!
//! One [`FormRecord`] per registered schema and one [`InstanceRecord`] per
//! stored submission; the lifecycle manager consults both when tearing
//! things down.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::{Result, StorageError};
use crate::lifecycle::SubmissionId;
use crate::schema::FormDef;

/// Identity of a registered form schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormRecord {
    pub id: u64,
    pub name: String,
    pub target_namespace: String,
    pub version: Option<u32>,
    pub domain: Option<String>,
    /// Name of the table holding the form's root element rows. Filled in
    /// once the schema compiles.
    pub root_table: String,
}

/// One stored submission: which form it belongs to and where its root row
/// landed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceRecord {
    pub form_id: u64,
    pub submission: SubmissionId,
    pub root_row_id: i64,
    pub received_at: DateTime<Utc>,
}

#[derive(Default)]
struct MetaState {
    forms: HashMap<u64, (FormRecord, FormDef)>,
    instances: Vec<InstanceRecord>,
    next_form_id: u64,
}

#[derive(Default)]
pub struct MetaStore {
    inner: Mutex<MetaState>,
}

impl MetaStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assigns an id to a new form and keeps its definition for later
    /// submissions. The root table name is filled in after compilation.
    pub fn register_form(&self, form: &FormDef) -> Result<FormRecord> {
        let mut state = self.inner.lock()?;
        state.next_form_id += 1;
        let record = FormRecord {
            id: state.next_form_id,
            name: form.name.clone(),
            target_namespace: form.target_namespace.clone(),
            version: form.version,
            domain: form.domain.clone(),
            root_table: String::new(),
        };
        state.forms.insert(record.id, (record.clone(), form.clone()));
        Ok(record)
    }

    pub fn set_root_table(&self, form_id: u64, root_table: &str) -> Result<()> {
        let mut state = self.inner.lock()?;
        match state.forms.get_mut(&form_id) {
            Some((record, _)) => {
                record.root_table = root_table.to_string();
                Ok(())
            }
            None => Err(StorageError::SchemaNotFound(form_id.to_string())),
        }
    }

    pub fn get_form(&self, form_id: u64) -> Result<FormRecord> {
        let state = self.inner.lock()?;
        state
            .forms
            .get(&form_id)
            .map(|(record, _)| record.clone())
            .ok_or_else(|| StorageError::SchemaNotFound(form_id.to_string()))
    }

    pub fn get_form_def(&self, form_id: u64) -> Result<FormDef> {
        let state = self.inner.lock()?;
        state
            .forms
            .get(&form_id)
            .map(|(_, def)| def.clone())
            .ok_or_else(|| StorageError::SchemaNotFound(form_id.to_string()))
    }

    /// Finds the registered form a submission belongs to by its root
    /// namespace. A declared version must match exactly; without one the
    /// newest registered version wins (versionless forms rank oldest, ties
    /// go to the most recently registered form).
    pub fn find_form(&self, target_namespace: &str, version: Option<u32>) -> Option<FormRecord> {
        let state = self.inner.lock().ok()?;
        let candidates = state
            .forms
            .values()
            .map(|(record, _)| record)
            .filter(|record| record.target_namespace.eq_ignore_ascii_case(target_namespace));
        match version {
            Some(wanted) => candidates
                .filter(|record| record.version == Some(wanted))
                .max_by_key(|record| record.id),
            None => candidates.max_by_key(|record| (record.version, record.id)),
        }
        .cloned()
    }

    pub fn remove_form(&self, form_id: u64) -> Result<()> {
        let mut state = self.inner.lock()?;
        state.forms.remove(&form_id);
        state.instances.retain(|inst| inst.form_id != form_id);
        Ok(())
    }

    pub fn record_instance(
        &self,
        form_id: u64,
        submission: SubmissionId,
        root_row_id: i64,
    ) -> Result<InstanceRecord> {
        let record = InstanceRecord {
            form_id,
            submission,
            root_row_id,
            received_at: Utc::now(),
        };
        let mut state = self.inner.lock()?;
        state.instances.push(record.clone());
        Ok(record)
    }

    pub fn instances_for(&self, form_id: u64) -> Vec<InstanceRecord> {
        self.inner
            .lock()
            .map(|state| {
                state
                    .instances
                    .iter()
                    .filter(|inst| inst.form_id == form_id)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn find_instance(&self, form_id: u64, root_row_id: i64) -> Option<InstanceRecord> {
        self.inner.lock().ok()?.instances.iter().find(|inst| {
            inst.form_id == form_id && inst.root_row_id == root_row_id
        }).cloned()
    }

    pub fn remove_instance(&self, form_id: u64, root_row_id: i64) -> Result<Option<InstanceRecord>> {
        let mut state = self.inner.lock()?;
        let position = state
            .instances
            .iter()
            .position(|inst| inst.form_id == form_id && inst.root_row_id == root_row_id);
        Ok(position.map(|idx| state.instances.remove(idx)))
    }

    pub fn form_ids(&self) -> Vec<u64> {
        self.inner
            .lock()
            .map(|state| state.forms.keys().copied().collect())
            .unwrap_or_default()
    }

    pub fn form_count(&self) -> usize {
        self.inner.lock().map(|state| state.forms.len()).unwrap_or(0)
    }

    pub fn clear(&self) {
        if let Ok(mut state) = self.inner.lock() {
            state.forms.clear();
            state.instances.clear();
        }
    }
}
