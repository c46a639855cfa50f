//! formstore: dynamic XML-schema-to-relational-storage mapping.
//!
//! A registered form definition is compiled into relational tables (one per
//! repeatable group, linked by parent-id foreign keys); each submitted
//! instance of the form is then co-traversed against its schema tree and
//! stored as rows in those tables. Schemas and instances can be removed
//! again without leaving rows, tables, or metadata behind.
//!
//! ```
//! use formstore::{DataNode, Dialect, ElementDef, FormDef, FormStore, SubmissionId};
//!
//! let store = FormStore::new(Dialect::MySql);
//! let form = FormDef::new(
//!     "visit",
//!     "http://example.org/visit",
//!     ElementDef::new("visit").with_child(ElementDef::new("date").with_type("date")),
//! );
//! let record = store.add_schema(&form).unwrap();
//!
//! let data = DataNode::new("visit")
//!     .with_namespace("http://example.org/visit")
//!     .with_child(DataNode::new("date").with_text("2009-01-02"));
//! let row_id = store.save_form_data(&data, SubmissionId::new()).unwrap();
//!
//! assert_eq!(store.row_count(&record.root_table).unwrap(), 1);
//! assert_eq!(row_id, Some(1));
//! ```

pub mod compiler;
pub mod core;
pub mod facade;
pub mod ident;
pub mod lifecycle;
pub mod meta;
pub mod populate;
pub mod schema;
pub mod storage;

pub use crate::compiler::{ColumnDef, CreateTable, SchemaCompiler};
pub use crate::core::{Column, DataType, Result, Row, Schema, StorageError, Value};
pub use crate::facade::FormStore;
pub use crate::ident::{NamingContext, TableDescriptor, TableRegistry, MAX_IDENTIFIER_LENGTH};
pub use crate::lifecycle::{
    CleanupIssue, HandlingLedger, HandlingRecord, HandlingType, LifecycleManager, SubmissionId,
    SubmissionStore,
};
pub use crate::meta::{FormRecord, InstanceRecord, MetaStore};
pub use crate::populate::{DataNode, PopulationErrors, Populator, Statement};
pub use crate::schema::{Dialect, ElementDef, FormDef, SchemaType, SimpleType};
pub use crate::storage::{StorageEngine, ID_COLUMN, PARENT_ID_COLUMN};
