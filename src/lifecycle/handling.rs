use std::collections::HashSet;
use std::fmt;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The app name this engine stamps on its own handling types.
pub const APP_NAME: &str = "formstore";

/// Opaque handle identifying one submission. The engine never interprets
/// its contents; it only links handling records and instance metadata to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubmissionId(Uuid);

impl SubmissionId {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SubmissionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An `(app, method)` pair describing how some consumer interpreted a
/// submission, e.g. `(formstore, instance_data)` or `(intake,
/// duplicate_attachment)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HandlingType {
    pub app: String,
    pub method: String,
}

impl HandlingType {
    pub fn new(app: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            app: app.into(),
            method: method.into(),
        }
    }

    /// Marks a submission whose instance data was stored by this engine.
    pub fn instance_data() -> Self {
        Self::new(APP_NAME, "instance_data")
    }

    /// Marks a submission intentionally deleted by this engine.
    pub fn deleted() -> Self {
        Self::new(APP_NAME, "deleted")
    }
}

impl fmt::Display for HandlingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.app, self.method)
    }
}

/// Audit marker linking one submission to one handling type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandlingRecord {
    pub submission: SubmissionId,
    pub handling_type: HandlingType,
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Default)]
struct LedgerState {
    types: HashSet<HandlingType>,
    records: Vec<HandlingRecord>,
}

/// Records how submissions were handled. The intake boundary uses this to
/// classify a submission as handled, duplicate, deleted, or orphaned (zero
/// records).
#[derive(Default)]
pub struct HandlingLedger {
    inner: Mutex<LedgerState>,
}

impl HandlingLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look-up-or-create for a handling type; always idempotent.
    pub fn handling_type(&self, app: &str, method: &str) -> HandlingType {
        let handling_type = HandlingType::new(app, method);
        if let Ok(mut state) = self.inner.lock() {
            state.types.insert(handling_type.clone());
        }
        handling_type
    }

    /// Records that a submission was handled. At most one record per
    /// (submission, type) pair is ever created; re-handling returns the
    /// existing record.
    pub fn handled(
        &self,
        submission: SubmissionId,
        handling_type: HandlingType,
        message: Option<String>,
    ) -> HandlingRecord {
        let mut state = match self.inner.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        state.types.insert(handling_type.clone());
        if let Some(existing) = state
            .records
            .iter()
            .find(|r| r.submission == submission && r.handling_type == handling_type)
        {
            return existing.clone();
        }
        let record = HandlingRecord {
            submission,
            handling_type,
            message,
            created_at: Utc::now(),
        };
        state.records.push(record.clone());
        record
    }

    /// Reverts a handling record, e.g. when the schema that stored a
    /// submission's data is removed. Returns whether a record was removed.
    pub fn unhandled(&self, submission: SubmissionId, handling_type: &HandlingType) -> bool {
        let mut state = match self.inner.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        let before = state.records.len();
        state
            .records
            .retain(|r| !(r.submission == submission && &r.handling_type == handling_type));
        state.records.len() != before
    }

    pub fn records_for(&self, submission: SubmissionId) -> Vec<HandlingRecord> {
        self.inner
            .lock()
            .map(|state| {
                state
                    .records
                    .iter()
                    .filter(|r| r.submission == submission)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn has_record(&self, submission: SubmissionId, handling_type: &HandlingType) -> bool {
        self.records_for(submission)
            .iter()
            .any(|r| &r.handling_type == handling_type)
    }

    /// A submission with zero handling records was never interpreted by
    /// anyone: an orphan.
    pub fn is_orphaned(&self, submission: SubmissionId) -> bool {
        self.records_for(submission).is_empty()
    }

    pub fn clear(&self) {
        if let Ok(mut state) = self.inner.lock() {
            state.records.clear();
            state.types.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handled_is_idempotent() {
        let ledger = HandlingLedger::new();
        let submission = SubmissionId::new();
        let first = ledger.handled(submission, HandlingType::instance_data(), Some("1 today".into()));
        let second = ledger.handled(submission, HandlingType::instance_data(), Some("2 today".into()));
        assert_eq!(first.created_at, second.created_at);
        assert_eq!(first.message, second.message);
        assert_eq!(ledger.records_for(submission).len(), 1);
    }

    #[test]
    fn test_unhandled_reverts() {
        let ledger = HandlingLedger::new();
        let submission = SubmissionId::new();
        ledger.handled(submission, HandlingType::instance_data(), None);
        assert!(!ledger.is_orphaned(submission));
        assert!(ledger.unhandled(submission, &HandlingType::instance_data()));
        assert!(ledger.is_orphaned(submission));
        assert!(!ledger.unhandled(submission, &HandlingType::instance_data()));
    }

    #[test]
    fn test_distinct_types_coexist() {
        let ledger = HandlingLedger::new();
        let submission = SubmissionId::new();
        ledger.handled(submission, HandlingType::instance_data(), None);
        ledger.handled(submission, HandlingType::deleted(), None);
        assert_eq!(ledger.records_for(submission).len(), 2);
        assert!(ledger.has_record(submission, &HandlingType::deleted()));
    }
}
